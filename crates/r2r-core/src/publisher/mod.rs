//! Writing and signing `Release` documents, and switching `latest`.

pub mod lock;
pub mod release;
pub mod signer;

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::config::ReleaseFields;
use crate::indexer::SuiteIndex;
use crate::layout::{OutputLocation, RepoLayout};

pub use lock::PublishLock;
pub use release::{DATE_FORMAT, DEFAULT_DESCRIPTION, render_release};
pub use signer::{GpgSigner, KeySource, SignError, SignMode, Signer, SigningKey};

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Sign(#[from] SignError),

    #[error("Another run holds {}; remove it if no run is active", .0.display())]
    Locked(PathBuf),

    #[error("{} exists but is not a symlink; refusing to replace it", .0.display())]
    LatestNotSymlink(PathBuf),
}

/// Writes `Release`, `Release.gpg` and `InRelease` for each suite.
#[derive(Clone)]
pub struct RepositoryPublisher {
    signer: Arc<dyn Signer>,
    fields: ReleaseFields,
}

impl std::fmt::Debug for RepositoryPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryPublisher")
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

impl RepositoryPublisher {
    pub fn new(signer: Arc<dyn Signer>, fields: ReleaseFields) -> Self {
        Self { signer, fields }
    }

    /// Render, write and sign the suite's `Release`.
    ///
    /// Returns the path of the written `Release`.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Sign`] if either signature fails and
    /// [`PublishError::Io`] if a file cannot be written.
    pub fn publish_suite(
        &self,
        layout: &RepoLayout,
        index: &SuiteIndex,
        now: DateTime<Utc>,
    ) -> Result<PathBuf, PublishError> {
        let dir = layout.dists_dir(&index.suite);
        fs::create_dir_all(&dir)?;

        let release = render_release(&self.fields, index, now);
        let release_path = dir.join("Release");
        fs::write(&release_path, &release)?;

        let detached = self.signer.sign(release.as_bytes(), SignMode::Detached)?;
        fs::write(dir.join("Release.gpg"), detached)?;

        let clearsigned = self.signer.sign(release.as_bytes(), SignMode::Clearsign)?;
        fs::write(dir.join("InRelease"), clearsigned)?;

        tracing::info!(suite = %index.suite, path = %release_path.display(), "Published suite");
        Ok(release_path)
    }
}

/// Point `latest` at this run's stamp.
///
/// The new link is created under a temporary name and renamed over the old
/// one, so readers always see either the old tree or the new one. Does
/// nothing in clean mode.
///
/// # Errors
///
/// Returns [`PublishError::LatestNotSymlink`] when `latest` exists and is
/// not a symlink, and [`PublishError::Io`] if the link cannot be created.
pub fn finalize_latest(location: &OutputLocation) -> Result<(), PublishError> {
    let Some(stamp) = &location.stamp else {
        return Ok(());
    };

    let latest = location.latest();
    if let Ok(meta) = latest.symlink_metadata() {
        if !meta.file_type().is_symlink() {
            return Err(PublishError::LatestNotSymlink(latest));
        }
    }

    let tmp = location
        .base
        .join(format!(".{}.tmp-{}", crate::layout::LATEST, std::process::id()));
    if tmp.symlink_metadata().is_ok() {
        fs::remove_file(&tmp)?;
    }
    std::os::unix::fs::symlink(stamp, &tmp)?;
    fs::rename(&tmp, &latest)?;

    tracing::info!(latest = %latest.display(), %stamp, "Switched latest");
    Ok(())
}
