//! Fetching archives into the temporary workspace.

use std::path::PathBuf;

use url::Url;

use crate::http::HttpClient;
use crate::Result;

/// File extension of the archive a URL points to, with its leading dot.
///
/// Compound tar suffixes stay together: `x.tar.gz` gives `.tar.gz`, not
/// `.gz`. Query strings and fragments are ignored. Returns an empty string
/// when the last path segment has no dot.
pub fn detect_extension(url: &str) -> String {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.to_string(),
    };

    let file_name = path.rsplit('/').next().unwrap_or_default();
    let Some(dot) = file_name.rfind('.') else {
        return String::new();
    };

    let ext = &file_name[dot..];
    let compound = format!(".tar{}", ext);
    if file_name.ends_with(&compound) {
        compound
    } else {
        ext.to_string()
    }
}

/// Downloads target archives into `<temp>/<stem><ext>`
#[derive(Debug, Clone)]
pub struct FileDownloader {
    http_client: HttpClient,
    temp_dir: PathBuf,
}

impl FileDownloader {
    pub fn new(http_client: HttpClient, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            http_client,
            temp_dir: temp_dir.into(),
        }
    }

    /// Where the archive fetched from `url` is written. `stem` must be unique
    /// among concurrently running targets.
    pub fn destination(&self, stem: &str, url: &str) -> PathBuf {
        self.temp_dir
            .join(format!("{}{}", stem, detect_extension(url)))
    }

    /// Download `url` to the file named after `stem` and return its path.
    /// A previous file at the same path is overwritten.
    pub async fn fetch(&self, stem: &str, url: &str) -> Result<PathBuf> {
        let dest = self.destination(stem, url);
        log::debug!("Downloading {} to {}", url, dest.display());

        let size = self.http_client.download(url, &dest).await?;
        log::debug!("Fetched {} bytes into {}", size, dest.display());

        Ok(dest)
    }
}
