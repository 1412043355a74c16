//! Shared vocabulary for repo-to-repo.
//!
//! Types in this crate are plain data: architecture spellings, package
//! formats, Debian policy whitelists, asset kinds, digests and the records
//! the pipeline passes between stages. Nothing here touches the network or
//! spawns processes.

pub mod arch;
pub mod asset;
pub mod format;
pub mod hash;
pub mod policy;
pub mod types;

// Re-exports
pub use arch::Architecture;
pub use asset::AssetKind;
pub use format::PackageFormat;
pub use hash::{Digests, HashAlgorithm};
pub use policy::Priority;
pub use types::*;
