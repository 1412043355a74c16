//! Multi-algorithm digests for repository index files.
//!
//! APT verifies every index it downloads against the `Release` file, which
//! lists each file under four hash algorithms. [`Digests`] holds one file's
//! worth of those values.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};

/// A hash algorithm listed in a `Release` document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgorithm {
    /// MD5, kept for old clients.
    Md5,
    /// SHA-1, kept for old clients.
    Sha1,
    /// SHA-256.
    Sha256,
    /// SHA-512.
    Sha512,
}

impl HashAlgorithm {
    /// Every algorithm, in the order sections appear in `Release`.
    pub const ALL: [Self; 4] = [Self::Md5, Self::Sha1, Self::Sha256, Self::Sha512];

    /// Section header used in the `Release` document (without the colon).
    pub fn release_field(&self) -> &'static str {
        match self {
            Self::Md5 => "MD5Sum",
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
            Self::Sha512 => "SHA512",
        }
    }
}

/// Hex digests and byte length of one file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digests {
    /// Lowercase hex MD5.
    pub md5: String,
    /// Lowercase hex SHA-1.
    pub sha1: String,
    /// Lowercase hex SHA-256.
    pub sha256: String,
    /// Lowercase hex SHA-512.
    pub sha512: String,
    /// Length in bytes.
    pub size: u64,
}

impl Digests {
    /// Hash `content` under every algorithm.
    pub fn compute(content: &[u8]) -> Self {
        Self {
            md5: format!("{:x}", md5::compute(content)),
            sha1: hex::encode(sha1_smol::Sha1::from(content).digest().bytes()),
            sha256: hex::encode(Sha256::digest(content)),
            sha512: hex::encode(Sha512::digest(content)),
            size: content.len() as u64,
        }
    }

    /// The hex digest for `algorithm`.
    pub fn get(&self, algorithm: HashAlgorithm) -> &str {
        match algorithm {
            HashAlgorithm::Md5 => &self.md5,
            HashAlgorithm::Sha1 => &self.sha1,
            HashAlgorithm::Sha256 => &self.sha256,
            HashAlgorithm::Sha512 => &self.sha512,
        }
    }
}
