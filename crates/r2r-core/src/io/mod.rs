//! Input/Output operations module
//!
//! Handles asset downloads and archive extraction.

pub mod download;
pub mod extract;

pub use download::{DownloadError, DownloadedFile, download_to};
pub use extract::{ExtractError, ExtractedFile, extract, locate_binary};
