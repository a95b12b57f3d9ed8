//! Structural check of a downloaded file before extraction.
//!
//! Only the first entry header is read. That is enough to tell an archive
//! from an HTML error page or a truncated transfer without paying for a
//! full decode twice.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::archive::{tar_stream, ArchiveType};
use crate::{DownloaderError, Result};

/// Check that `path` is a readable archive of the type its name claims.
///
/// Returns the detected type. A recognised suffix with unreadable content
/// yields [`DownloaderError::ValidationRejected`], an unrecognised suffix
/// yields [`DownloaderError::UnsupportedFormat`].
pub fn validate_archive(path: &Path) -> Result<ArchiveType> {
    let archive_type = ArchiveType::from_path(path);

    let readable = match archive_type {
        ArchiveType::Unknown => {
            return Err(DownloaderError::UnsupportedFormat {
                path: path.to_path_buf(),
            })
        }
        ArchiveType::Zip => zip_has_readable_entry(path),
        ArchiveType::Rar => rar_has_readable_entry(path),
        tar_type => tar_has_readable_entry(path, tar_type),
    };

    if !readable {
        log::debug!("{} failed {} header check", path.display(), archive_type);
        return Err(DownloaderError::ValidationRejected {
            path: path.to_path_buf(),
            kind: archive_type,
        });
    }

    Ok(archive_type)
}

/// Boolean form of [`validate_archive`]
pub fn is_valid_archive(path: &Path) -> bool {
    validate_archive(path).is_ok()
}

fn tar_has_readable_entry(path: &Path, archive_type: ArchiveType) -> bool {
    let Ok(stream) = tar_stream(path, archive_type) else {
        return false;
    };

    let mut archive = tar::Archive::new(stream);
    let Ok(mut entries) = archive.entries() else {
        return false;
    };

    matches!(entries.next(), Some(Ok(_)))
}

fn zip_has_readable_entry(path: &Path) -> bool {
    let Ok(file) = File::open(path) else {
        return false;
    };

    let Ok(mut archive) = zip::ZipArchive::new(BufReader::new(file)) else {
        return false;
    };

    // An empty central directory is still a well-formed zip
    archive.is_empty() || archive.by_index_raw(0).is_ok()
}

fn rar_has_readable_entry(path: &Path) -> bool {
    let Ok(mut listing) = unrar::Archive::new(path).open_for_listing() else {
        return false;
    };

    matches!(listing.next(), Some(Ok(_)))
}
