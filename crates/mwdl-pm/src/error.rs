use std::path::PathBuf;

use thiserror::Error;

use crate::downloader::ArchiveType;
use crate::http::HttpError;

#[derive(Error, Debug)]
pub enum DownloaderError {
    // JSON/parsing errors
    #[error("Failed to parse config: {0}")]
    Json(#[from] serde_json::Error),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Network errors
    #[error("{0}")]
    Http(#[from] HttpError),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(
        "Target folder {} already exists. Remove it yourself or pass --force-rm-target",
        .0.display()
    )]
    TargetExists(PathBuf),

    // Revision lookup errors
    #[error("Revision lookup failed: {0}")]
    Revision(String),

    // Validation errors
    #[error("Downloaded file is not a {kind} archive: {}", path.display())]
    ValidationRejected { path: PathBuf, kind: ArchiveType },

    #[error("Unsupported archive format: {}", path.display())]
    UnsupportedFormat { path: PathBuf },

    // Extraction errors
    #[error("Extraction failed: {0}")]
    Extraction(String),

    // Installation errors
    #[error("Destination already exists: {}", dest.display())]
    InstallConflict { dest: PathBuf },

    #[error("Failed to move into {}: {source}", dest.display())]
    Install {
        dest: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Retry errors
    #[error("failed to {description} after {attempts} attempts: {source}")]
    RetriesExhausted {
        description: String,
        attempts: u32,
        #[source]
        source: Box<DownloaderError>,
    },
}

pub type Result<T> = std::result::Result<T, DownloaderError>;
