//! Target tree and temporary workspace preparation.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::target::Category;
use crate::{DownloaderError, Result};

/// Prefix of the temporary workspace directory
pub const TEMP_PREFIX: &str = "mediawiki-extension-downloader-";

/// Make `target` absolute and make sure both category directories exist.
///
/// When both already exist the run would overwrite a previous download, so
/// this fails unless `force` is set, in which case both are wiped first.
pub fn prepare_target_dir(target: &Path, force: bool) -> Result<PathBuf> {
    let target = if target.is_absolute() {
        target.to_path_buf()
    } else {
        std::env::current_dir()?.join(target)
    };

    let dirs = [Category::Extension, Category::Skin].map(|c| target.join(c.plural()));
    let all_exist = dirs.iter().all(|dir| dir.is_dir());

    if all_exist {
        if !force {
            return Err(DownloaderError::TargetExists(target));
        }

        for dir in &dirs {
            log::debug!("Removing {}", dir.display());
            fs::remove_dir_all(dir)?;
        }
    }

    for dir in &dirs {
        fs::create_dir_all(dir)?;
    }

    Ok(target)
}

/// Create the shared scratch directory, inside `parent` when given
pub fn create_temp_workspace(parent: Option<&Path>) -> Result<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(TEMP_PREFIX);

    let dir = match parent {
        Some(parent) => {
            fs::create_dir_all(parent)?;
            builder.tempdir_in(parent)?
        }
        None => builder.tempdir()?,
    };

    log::debug!("Using temporary workspace {}", dir.path().display());
    Ok(dir)
}

/// Delete the scratch directory. Failure only warrants a log line.
pub fn remove_temp_workspace(dir: TempDir) {
    let path = dir.path().to_path_buf();
    if let Err(e) = dir.close() {
        log::error!("Failed to remove temporary folder {}: {}", path.display(), e);
    }
}
