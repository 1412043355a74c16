//! Streaming asset downloads.
//!
//! The body is written to disk as it arrives and hashed on the way through,
//! so large release assets never sit in memory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use reqwest::{Client, StatusCode};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Download of {url} failed with status {status}")]
    Status { url: String, status: u16 },
}

/// A file written by [`download_to`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub path: PathBuf,
    pub sha256: String,
    pub size: u64,
}

/// Stream `url` into `dest`.
///
/// Only `200 OK` counts as success. A partially written file is removed on
/// failure.
///
/// # Errors
///
/// Returns [`DownloadError::Status`] for any other status,
/// [`DownloadError::Http`] for transport errors and timeouts, and
/// [`DownloadError::Io`] if `dest` cannot be written.
pub async fn download_to(
    client: &Client,
    url: &str,
    dest: &Path,
    timeout: Duration,
) -> Result<DownloadedFile, DownloadError> {
    let resp = client
        .get(url)
        .header(reqwest::header::ACCEPT, "application/octet-stream")
        .timeout(timeout)
        .send()
        .await?;

    if resp.status() != StatusCode::OK {
        return Err(DownloadError::Status {
            url: url.to_string(),
            status: resp.status().as_u16(),
        });
    }

    let result = write_body(resp, dest).await;
    if result.is_err() {
        let _ = tokio::fs::remove_file(dest).await;
    }
    result
}

async fn write_body(resp: reqwest::Response, dest: &Path) -> Result<DownloadedFile, DownloadError> {
    let mut file = File::create(dest).await?;
    let mut hasher = Sha256::new();
    let mut size = 0u64;

    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        hasher.update(&chunk);
        size += chunk.len() as u64;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    Ok(DownloadedFile {
        path: dest.to_path_buf(),
        sha256: hex::encode(hasher.finalize()),
        size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_download_streams_and_hashes() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/assets/tool")
            .with_status(200)
            .with_body("abc")
            .create_async()
            .await;

        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("tool");
        let client = Client::new();
        let file = download_to(
            &client,
            &format!("{}/assets/tool", server.url()),
            &dest,
            Duration::from_secs(10),
        )
        .await
        .unwrap();

        assert_eq!(file.size, 3);
        assert_eq!(
            file.sha256,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(std::fs::read(dest).unwrap(), b"abc");
    }

    #[tokio::test]
    async fn test_non_200_is_an_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/assets/gone")
            .with_status(404)
            .create_async()
            .await;

        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("gone");
        let err = download_to(
            &Client::new(),
            &format!("{}/assets/gone", server.url()),
            &dest,
            Duration::from_secs(10),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DownloadError::Status { status: 404, .. }));
        assert!(!dest.exists());
    }
}
