//! Installer - moves an extracted target into the target tree.

use std::io::ErrorKind;
use std::path::Path;

use crate::{DownloaderError, Result};

/// Installs extraction directories by renaming them into place
#[derive(Debug, Default, Clone, Copy)]
pub struct Installer;

impl Installer {
    pub fn new() -> Self {
        Self
    }

    /// Rename `extracted_dir` to `dest`.
    ///
    /// The rename is atomic when both paths share a filesystem. An existing
    /// `dest` is never merged into.
    pub async fn install(&self, extracted_dir: &Path, dest: &Path) -> Result<()> {
        if tokio::fs::try_exists(dest).await? {
            return Err(DownloaderError::InstallConflict {
                dest: dest.to_path_buf(),
            });
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::rename(extracted_dir, dest)
            .await
            .map_err(|source| match source.kind() {
                ErrorKind::AlreadyExists => {
                    DownloaderError::InstallConflict {
                        dest: dest.to_path_buf(),
                    }
                }
                _ => DownloaderError::Install {
                    dest: dest.to_path_buf(),
                    source,
                },
            })?;

        log::debug!("Moved {} to {}", extracted_dir.display(), dest.display());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn test_install_moves_directory() {
        let temp = tempfile::tempdir().unwrap();
        let extracted = temp.path().join("Foo-abc123");
        fs::create_dir_all(extracted.join("includes")).unwrap();
        fs::write(extracted.join("extension.json"), "{}").unwrap();

        let dest = temp.path().join("target/extensions/Foo");
        Installer::new().install(&extracted, &dest).await.unwrap();

        assert!(!extracted.exists());
        assert!(dest.join("extension.json").is_file());
        assert!(dest.join("includes").is_dir());
    }

    #[tokio::test]
    async fn test_install_existing_destination_conflicts() {
        let temp = tempfile::tempdir().unwrap();
        let extracted = temp.path().join("Foo-abc123");
        fs::create_dir_all(&extracted).unwrap();
        fs::write(extracted.join("new.txt"), "new").unwrap();

        let dest = temp.path().join("extensions/Foo");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("old.txt"), "old").unwrap();

        let result = Installer::new().install(&extracted, &dest).await;
        assert!(matches!(result, Err(DownloaderError::InstallConflict { .. })));

        // Neither side is touched
        assert!(extracted.join("new.txt").exists());
        assert!(dest.join("old.txt").exists());
        assert!(!dest.join("new.txt").exists());
    }

    #[tokio::test]
    async fn test_install_unreadable_destination_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let extracted = temp.path().join("Foo-abc123");
        fs::create_dir_all(&extracted).unwrap();
        fs::write(temp.path().join("extensions"), "not a directory").unwrap();

        let result = Installer::new()
            .install(&extracted, &temp.path().join("extensions/Foo"))
            .await;

        assert!(matches!(result, Err(DownloaderError::Io(_))));
        assert!(extracted.is_dir());
    }

    #[tokio::test]
    async fn test_install_missing_source_fails() {
        let temp = tempfile::tempdir().unwrap();
        let result = Installer::new()
            .install(&temp.path().join("gone"), &temp.path().join("skins/Bar"))
            .await;

        assert!(matches!(result, Err(DownloaderError::Install { .. })));
    }
}
