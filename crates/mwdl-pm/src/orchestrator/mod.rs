//! Target orchestration.
//!
//! Each target runs through resolve, fetch, validate, extract and install.
//! Resolution happens once; the remaining four steps form one retryable unit
//! so a flaky mirror gets a fresh download on every attempt. Targets run
//! concurrently and a failing target never stops its siblings.

mod retry;


use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};

use crate::downloader::{validate_archive, ArchiveExtractor, FileDownloader};
use crate::http::HttpClient;
use crate::installer::Installer;
use crate::resolver::{ResolverEndpoints, UrlResolver};
use crate::state::RunState;
use crate::target::{Target, TargetId};
use crate::{DownloaderError, Result};

pub use retry::retry;

pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Targets processed at once unless configured otherwise
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Retry and scheduling settings for a run
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Attempts per target, values below 1 count as 1
    pub attempts: u32,
    /// Fixed pause between attempts
    pub retry_delay: Duration,
    /// Maximum targets in flight, 0 for one slot per target
    pub concurrency: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    fn slots(&self, targets: usize) -> usize {
        match self.concurrency {
            0 => targets.max(1),
            n => n,
        }
    }
}

/// Per-target outcome of a completed run, in configuration order
#[derive(Debug, Default, Clone)]
pub struct RunSummary {
    pub installed: Vec<TargetId>,
    pub failed: Vec<TargetId>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.installed.len() + self.failed.len()
    }
}

/// Drives every target through the acquisition pipeline
pub struct Orchestrator {
    http: HttpClient,
    resolver: UrlResolver,
    installer: Installer,
    options: RunOptions,
}

impl Orchestrator {
    pub fn new(http: HttpClient, endpoints: ResolverEndpoints, options: RunOptions) -> Self {
        Self {
            resolver: UrlResolver::new(http.clone(), endpoints),
            http,
            installer: Installer::new(),
            options,
        }
    }

    /// Process every target and wait for all of them to finish.
    ///
    /// Failures are logged and recorded on `state`; they never abort the
    /// run. The temporary workspace in `state` must outlive this call.
    pub async fn run(&self, targets: Vec<Target>, state: Arc<RunState>) -> RunSummary {
        let slots = self.options.slots(targets.len());
        log::debug!(
            "Processing {} targets with {} slots",
            targets.len(),
            slots
        );

        let mut outcomes: Vec<(usize, TargetId, bool)> = stream::iter(targets.iter().enumerate())
            .map(|(index, target)| {
                let state = Arc::clone(&state);
                async move {
                    let installed = self.process_target(target, &state).await;
                    (index, target.id.clone(), installed)
                }
            })
            .buffer_unordered(slots)
            .collect()
            .await;

        outcomes.sort_by_key(|(index, _, _)| *index);

        let mut summary = RunSummary::default();
        for (_, id, installed) in outcomes {
            if installed {
                summary.installed.push(id);
            } else {
                summary.failed.push(id);
            }
        }

        summary
    }

    /// Run one target to completion, returning whether it was installed
    async fn process_target(&self, target: &Target, state: &RunState) -> bool {
        log::info!("Start downloading {}", target.id);

        let resolved = self.resolver.resolve(target, state).await;
        let Some(url) = resolved.resolution.url() else {
            return false;
        };

        let dest = state.install_path(target.category(), target.name());
        let dest = dest.as_path();
        let description = format!("download {}", target.id);

        let result = retry(
            self.options.attempts,
            self.options.retry_delay,
            &description,
            || self.attempt(target, url, dest, state),
        )
        .await;

        match result {
            Ok(()) => {
                log::info!("Installed {} to {}", target.id, dest.display());
                true
            }
            Err(e) => {
                log::error!("{}", e);
                state.mark_failed();
                false
            }
        }
    }

    /// One pass of fetch, validate, extract and install
    async fn attempt(&self, target: &Target, url: &str, dest: &Path, state: &RunState) -> Result<()> {
        let stem = target.id.scratch_stem();
        let downloader = FileDownloader::new(self.http.clone(), state.temp_dir());
        let archive = downloader.fetch(&stem, url).await?;

        let extractor = ArchiveExtractor::new(state.temp_dir());
        let extracted = tokio::task::spawn_blocking(move || unpack(&extractor, &stem, archive))
            .await
            .map_err(|e| DownloaderError::Extraction(format!("extraction task failed: {}", e)))??;

        self.installer.install(&extracted, dest).await
    }
}

fn unpack(extractor: &ArchiveExtractor, stem: &str, archive: PathBuf) -> Result<PathBuf> {
    let kind = validate_archive(&archive)?;
    log::debug!("{} is a valid {} archive", archive.display(), kind);
    extractor.extract(stem, &archive)
}
