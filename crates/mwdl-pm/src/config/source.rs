use std::env;
use std::fs;
use std::path::Path;

use super::schema::DownloaderConfig;
use crate::error::{DownloaderError, Result};

/// Ref used when neither the environment nor the config names one
pub const FALLBACK_REF: &str = "master";

/// Environment variable overriding the configured default ref
pub const MWREL_ENV: &str = "MWREL";

/// Loads the download configuration and resolves environment overrides
#[derive(Debug)]
pub struct ConfigLoader {
    use_environment: bool,
}

impl ConfigLoader {
    pub fn new(use_environment: bool) -> Self {
        Self { use_environment }
    }

    /// Get a non-empty environment variable
    pub fn get_env(&self, var: &str) -> Option<String> {
        if !self.use_environment {
            return None;
        }

        env::var(var).ok().filter(|s| !s.is_empty())
    }

    /// Load configuration from a JSON file
    pub fn load_config_file<P: AsRef<Path>>(&self, path: P) -> Result<DownloaderConfig> {
        let path = path.as_ref();

        let contents = fs::read_to_string(path).map_err(|e| {
            DownloaderError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config: DownloaderConfig = serde_json::from_str(&contents).map_err(|e| {
            DownloaderError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        Ok(config)
    }

    /// Default ref for the run: `MWREL` from the environment, then the
    /// config's `MWREL`, then `master`
    pub fn default_ref(&self, config: &DownloaderConfig) -> String {
        if let Some(mwrel) = self.get_env(MWREL_ENV) {
            return mwrel;
        }

        if !config.mwrel.is_empty() {
            return config.mwrel.clone();
        }

        FALLBACK_REF.to_string()
    }
}
