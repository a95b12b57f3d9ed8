pub mod config;
pub mod downloader;
pub mod error;
pub mod http;
pub mod installer;
pub mod orchestrator;
pub mod resolver;
pub mod state;
pub mod target;
pub mod workspace;

pub use config::{ConfigLoader, DownloaderConfig};
pub use downloader::{ArchiveExtractor, ArchiveType, FileDownloader};
pub use error::{DownloaderError, Result};
pub use installer::Installer;
pub use orchestrator::{Orchestrator, RunOptions, RunSummary};
pub use resolver::{Resolution, ResolvedDownload, ResolverEndpoints, UrlResolver};
pub use state::RunState;
pub use target::{Category, ForgeKind, ForgeSource, Target, TargetId, TargetSource};
