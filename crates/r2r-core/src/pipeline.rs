//! Driving every target from configuration to a signed repository.
//!
//! Fetching, downloading and building run concurrently, bounded by
//! `workers`. Everything that touches the published tree (placing artifacts
//! into the pool, indexing, signing, switching `latest`) runs serially
//! afterwards.
//!
//! A failing target never takes the others down with it: its reason is
//! collected, the rest are still published, and `latest` is left alone so
//! the previous tree stays servable.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use r2r_schema::{PackageArtifact, PackageFormat, TargetId, TargetState};
use thiserror::Error;

use crate::builder::{BuildRequest, PackageBuilder};
use crate::config::{Config, TargetSpec};
use crate::fetch::{FetchError, ReleaseFetcher, ResolvedRelease, UNKNOWN_LICENSE};
use crate::forges::{GitHubForge, build_github_client};
use crate::indexer::{ArchiveIndexer, DpkgScanPackages, IndexError};
use crate::layout::{OutputLocation, RepoLayout};
use crate::publisher::{PublishError, PublishLock, RepositoryPublisher, Signer, finalize_latest};
use crate::reporter::{Reporter, TracingReporter};
use crate::settings::RunSettings;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Aborted after {target} failed: {reason}")]
    Aborted { target: TargetId, reason: String },
}

/// What a run produced.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub built: Vec<TargetId>,
    pub skipped: Vec<TargetId>,
    pub failed: Vec<(TargetId, String)>,
    /// Every artifact in the published tree for this run's targets.
    pub artifacts: Vec<PackageArtifact>,
    /// Suites whose `Release` was written.
    pub suites: Vec<String>,
    pub latest_updated: bool,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    /// Freshly built in scratch; move it.
    Built,
    /// Present in the previous `latest` tree; link it.
    Previous,
    /// Already at its destination.
    InPlace,
}

#[derive(Debug, Clone)]
struct Placement {
    artifact: PackageArtifact,
    from: PathBuf,
    dest: PathBuf,
    source: Source,
}

/// Progress of one target through the pipeline.
#[derive(Debug)]
struct TargetOutcome {
    id: TargetId,
    label: String,
    suite: String,
    archive: String,
    state: TargetState,
    placements: Vec<Placement>,
    error: Option<String>,
}

impl TargetOutcome {
    fn new(spec: &TargetSpec) -> Self {
        Self {
            id: spec.id.clone(),
            label: spec.label(),
            suite: spec.suite.clone(),
            archive: spec.archive.clone(),
            state: TargetState::Pending,
            placements: Vec::new(),
            error: None,
        }
    }

    fn advance(&mut self, next: TargetState, reporter: &dyn Reporter) {
        if !self.state.can_transition_to(next) {
            debug_assert!(false, "{} -> {next} for {}", self.state, self.id);
            tracing::error!(target_id = %self.id, from = %self.state, to = %next, "Rejected state transition");
            return;
        }
        self.state = next;
        reporter.target_state(&self.id, &self.label, next);
    }

    fn fail(mut self, reason: impl std::fmt::Display, reporter: &dyn Reporter) -> Self {
        let reason = reason.to_string();
        self.advance(TargetState::Failed, reporter);
        reporter.target_failed(&self.id, &self.label, &reason);
        self.error = Some(reason);
        self.placements.clear();
        self
    }

    fn is_failed(&self) -> bool {
        self.state == TargetState::Failed
    }
}

/// Fetch, build, index and publish.
pub struct Pipeline {
    fetcher: ReleaseFetcher,
    builder: PackageBuilder,
    indexer: ArchiveIndexer,
    publisher: RepositoryPublisher,
    reporter: Arc<dyn Reporter>,
    workers: usize,
    fail_fast: bool,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("workers", &self.workers)
            .field("fail_fast", &self.fail_fast)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn new(
        fetcher: ReleaseFetcher,
        builder: PackageBuilder,
        indexer: ArchiveIndexer,
        publisher: RepositoryPublisher,
        settings: &RunSettings,
    ) -> Self {
        Self {
            fetcher,
            builder,
            indexer,
            publisher,
            reporter: Arc::new(TracingReporter),
            workers: settings.workers.max(1),
            fail_fast: settings.fail_fast,
        }
    }

    /// The production wiring: GitHub, `dpkg-deb`, `rpmbuild`,
    /// `dpkg-scanpackages` and the given signer.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if the HTTP client cannot be built.
    pub fn system(
        config: &Config,
        settings: &RunSettings,
        signer: Arc<dyn Signer>,
    ) -> Result<Self, FetchError> {
        let client = build_github_client(
            settings.github_token.as_deref(),
            &config.headers,
            settings.connect_timeout,
        )?;
        let forge = GitHubForge::new(
            client,
            &settings.api_base,
            settings.api_timeout,
            settings.download_timeout,
        );

        Ok(Self::new(
            ReleaseFetcher::new(Arc::new(forge)),
            PackageBuilder::system(settings.tool_timeout),
            ArchiveIndexer::new(Arc::new(DpkgScanPackages {
                timeout: settings.tool_timeout,
            })),
            RepositoryPublisher::new(signer, config.release.clone()),
            settings,
        ))
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Run every target and publish the result under `location`.
    ///
    /// Target failures are reported in the summary, not as an error.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Aborted`] on the first target failure when
    /// `fail_fast` is set, and any lock, indexing or signing failure.
    pub async fn run(
        &self,
        targets: &[TargetSpec],
        location: &OutputLocation,
    ) -> Result<RunSummary, PipelineError> {
        fs::create_dir_all(&location.base)?;
        let lock = PublishLock::acquire(&location.lock_path())?;

        let layout = location.layout();
        let previous = location.previous();
        let work = tempfile::Builder::new()
            .prefix(".r2r-work-")
            .tempdir_in(&location.base)?;
        tracing::debug!(
            root = %layout.root().display(),
            work = %work.path().display(),
            lock = %lock.path().display(),
            "Starting run"
        );

        let mut outcomes = Vec::with_capacity(targets.len());
        {
            let mut results = stream::iter(targets.iter().enumerate())
                .map(|(i, spec)| {
                    let scratch = work.path().join(format!("target-{i}"));
                    self.process_target(spec, &layout, previous.as_ref(), scratch)
                })
                .buffer_unordered(self.workers);

            while let Some(outcome) = results.next().await {
                if self.fail_fast && outcome.is_failed() {
                    return Err(PipelineError::Aborted {
                        target: outcome.id,
                        reason: outcome.error.unwrap_or_default(),
                    });
                }
                outcomes.push(outcome);
            }
        }
        outcomes.sort_by(|a, b| a.id.cmp(&b.id));

        let mut outcomes: Vec<TargetOutcome> = outcomes
            .into_iter()
            .map(|outcome| self.place(outcome))
            .collect();
        let placement_failure = outcomes.iter().find(|o| self.fail_fast && o.is_failed());
        if let Some(failed) = placement_failure {
            return Err(PipelineError::Aborted {
                target: failed.id.clone(),
                reason: failed.error.clone().unwrap_or_default(),
            });
        }

        let suites = self
            .index_and_publish(&layout, &outcomes, location.stamp.is_none())
            .await?;

        let mut summary = RunSummary {
            suites,
            ..RunSummary::default()
        };
        for outcome in &mut outcomes {
            if outcome.is_failed() {
                summary.failed.push((
                    outcome.id.clone(),
                    outcome.error.clone().unwrap_or_default(),
                ));
                continue;
            }
            if outcome.state == TargetState::Skipped {
                summary.skipped.push(outcome.id.clone());
            } else {
                summary.built.push(outcome.id.clone());
            }
            outcome.advance(TargetState::Indexed, self.reporter.as_ref());
            outcome.advance(TargetState::Published, self.reporter.as_ref());
            summary
                .artifacts
                .extend(outcome.placements.iter().map(|p| p.artifact.clone()));
        }

        if summary.is_success() {
            finalize_latest(location)?;
            summary.latest_updated = location.stamp.is_some();
        } else if location.stamp.is_some() {
            self.reporter.warning(&format!(
                "{} target(s) failed; leaving {} unchanged",
                summary.failed.len(),
                location.latest().display()
            ));
        }

        self.reporter.summary(&summary);
        Ok(summary)
    }

    async fn process_target(
        &self,
        spec: &TargetSpec,
        layout: &RepoLayout,
        previous: Option<&RepoLayout>,
        scratch: PathBuf,
    ) -> TargetOutcome {
        let reporter = self.reporter.as_ref();
        let mut outcome = TargetOutcome::new(spec);
        outcome.advance(TargetState::Fetching, reporter);

        let resolved = match self.fetcher.resolve(spec).await {
            Ok(resolved) => resolved,
            Err(e) => return outcome.fail(e, reporter),
        };

        let mut to_build = Vec::new();
        for &format in &spec.formats {
            let Some(file_name) = self.builder.artifact_name(spec, &resolved, format) else {
                reporter.warning(&format!(
                    "{}: asset {} is a pre-built package of another format; skipping {format}",
                    spec.label(),
                    resolved.asset.name
                ));
                continue;
            };
            let artifact = planned_artifact(spec, &resolved, format, file_name);
            let rel = artifact_rel(spec, &artifact);
            let dest = layout.root().join(&rel);

            if dest.is_file() {
                tracing::info!(target_id = %spec.id, path = %dest.display(), "Artifact exists; skipping");
                outcome.placements.push(Placement {
                    from: dest.clone(),
                    dest,
                    artifact,
                    source: Source::InPlace,
                });
            } else if let Some(prev) = previous.map(|p| p.root().join(&rel)).filter(|p| p.is_file()) {
                tracing::info!(target_id = %spec.id, path = %prev.display(), "Reusing artifact from previous tree");
                outcome.placements.push(Placement {
                    from: prev,
                    dest,
                    artifact,
                    source: Source::Previous,
                });
            } else {
                to_build.push((format, dest));
            }
        }

        if to_build.is_empty() {
            outcome.advance(TargetState::Skipped, reporter);
            return outcome;
        }

        outcome.advance(TargetState::Downloading, reporter);
        if let Err(e) = fs::create_dir_all(&scratch) {
            return outcome.fail(e, reporter);
        }
        let asset_path = match self.fetcher.download(&resolved, &scratch).await {
            Ok(file) => file.path,
            Err(e) => return outcome.fail(e, reporter),
        };

        let license = if to_build.iter().any(|(f, _)| *f == PackageFormat::Rpm) {
            self.fetcher.license(spec).await
        } else {
            UNKNOWN_LICENSE.to_string()
        };

        outcome.advance(TargetState::Building, reporter);
        let builder = self.builder.clone();
        let job_spec = spec.clone();
        let formats: Vec<PackageFormat> = to_build.iter().map(|(f, _)| *f).collect();
        let job_resolved = resolved.clone();
        let built = tokio::task::spawn_blocking(move || {
            let req = BuildRequest {
                spec: &job_spec,
                resolved: &job_resolved,
                asset_path: &asset_path,
                license: &license,
                scratch: &scratch,
            };
            builder.build(&req, &formats)
        })
        .await;

        let artifacts = match built {
            Ok(Ok(artifacts)) => artifacts,
            Ok(Err(e)) => return outcome.fail(e, reporter),
            Err(e) => return outcome.fail(e, reporter),
        };

        for (artifact, (_, dest)) in artifacts.into_iter().zip(to_build) {
            outcome.placements.push(Placement {
                from: artifact.path.clone(),
                dest,
                artifact,
                source: Source::Built,
            });
        }
        outcome.advance(TargetState::Built, reporter);
        outcome
    }

    /// Move or link a target's artifacts into the published tree.
    fn place(&self, mut outcome: TargetOutcome) -> TargetOutcome {
        if outcome.is_failed() {
            return outcome;
        }
        let mut placements = std::mem::take(&mut outcome.placements);
        for placement in &mut placements {
            if let Err(e) = place_one(placement) {
                let reason = format!("placing {}: {e}", placement.dest.display());
                return outcome.fail(reason, self.reporter.as_ref());
            }
            placement.artifact.path.clone_from(&placement.dest);
        }
        outcome.placements = placements;
        outcome
    }

    /// Index and sign every suite this run placed a `.deb` into.
    ///
    /// Publishing in place keeps every bucket the suite already lists, so a
    /// target that failed this time does not drop its architecture from
    /// `Release` while its packages are still in the pool.
    async fn index_and_publish(
        &self,
        layout: &RepoLayout,
        outcomes: &[TargetOutcome],
        in_place: bool,
    ) -> Result<Vec<String>, PipelineError> {
        let mut suites: BTreeMap<String, BTreeMap<String, BTreeSet<String>>> = BTreeMap::new();
        for outcome in outcomes.iter().filter(|o| !o.is_failed()) {
            for placement in &outcome.placements {
                if placement.artifact.format == PackageFormat::Deb {
                    suites
                        .entry(outcome.suite.clone())
                        .or_default()
                        .entry(outcome.archive.clone())
                        .or_default()
                        .insert(placement.artifact.arch.clone());
                }
            }
        }

        if in_place {
            for (suite, buckets) in &mut suites {
                for (archive, archs) in layout.published_buckets(suite)? {
                    buckets.entry(archive).or_default().extend(archs);
                }
            }
        }

        let mut published = Vec::with_capacity(suites.len());
        for (suite, buckets) in suites {
            let indexer = self.indexer.clone();
            let publisher = self.publisher.clone();
            let layout = layout.clone();
            let name = suite.clone();
            tokio::task::spawn_blocking(move || -> Result<(), PipelineError> {
                let index = indexer.index_suite(&layout, &name, &buckets)?;
                publisher.publish_suite(&layout, &index, Utc::now())?;
                Ok(())
            })
            .await??;
            published.push(suite);
        }
        Ok(published)
    }
}

fn planned_artifact(
    spec: &TargetSpec,
    resolved: &ResolvedRelease,
    format: PackageFormat,
    file_name: String,
) -> PackageArtifact {
    let arch = match format {
        PackageFormat::Deb => spec.architecture.debian(),
        PackageFormat::Rpm => spec.architecture.redhat(),
    };
    PackageArtifact {
        target: spec.id.clone(),
        format,
        file_name,
        path: PathBuf::new(),
        version: resolved.version.clone(),
        arch: arch.to_string(),
    }
}

fn artifact_rel(spec: &TargetSpec, artifact: &PackageArtifact) -> PathBuf {
    RepoLayout::artifact_rel(
        artifact.format,
        &spec.suite,
        &spec.archive,
        &artifact.arch,
        &artifact.file_name,
    )
}

fn place_one(placement: &Placement) -> io::Result<()> {
    if placement.source == Source::InPlace {
        return Ok(());
    }
    if placement.dest.is_file() {
        // Another target produced the same file this run; first one stays.
        tracing::warn!(path = %placement.dest.display(), "Artifact already placed; keeping existing file");
        return Ok(());
    }
    if let Some(parent) = placement.dest.parent() {
        fs::create_dir_all(parent)?;
    }
    match placement.source {
        Source::Previous => {
            if fs::hard_link(&placement.from, &placement.dest).is_err() {
                fs::copy(&placement.from, &placement.dest)?;
            }
        }
        Source::Built => move_file(&placement.from, &placement.dest)?,
        Source::InPlace => {}
    }
    Ok(())
}

fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if fs::rename(from, to).is_err() {
        fs::copy(from, to)?;
        fs::remove_file(from)?;
    }
    Ok(())
}
