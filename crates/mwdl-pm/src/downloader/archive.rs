//! Archive classification and extraction (tar, tar.gz, tar.bz2, tar.xz, zip, rar).
//!
//! Every archive is expected to wrap its content in a single top-level
//! directory, as forge snapshots and distribution tarballs do. Extraction
//! strips that directory so the content lands directly in the output dir.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use xz2::read::XzDecoder;

use crate::{DownloaderError, Result};

/// Number of leading path components removed from every entry
pub const STRIP_COMPONENTS: usize = 1;

/// Bytes needed to recognise every supported format, tar's `ustar` magic
/// ending at offset 262
const SNIFF_LEN: usize = 262;

/// Supported archive types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveType {
    Tar,
    TarGz,
    TarBz2,
    TarXz,
    Zip,
    Rar,
    Unknown,
}

impl ArchiveType {
    /// Classify a file by its name. This is the only place suffixes are
    /// interpreted; validation and extraction both go through it.
    pub fn from_path(path: &Path) -> Self {
        let path_str = path.to_string_lossy().to_lowercase();

        if path_str.ends_with(".zip") {
            ArchiveType::Zip
        } else if path_str.ends_with(".tar.gz") || path_str.ends_with(".tgz") {
            ArchiveType::TarGz
        } else if path_str.ends_with(".tar.bz2")
            || path_str.ends_with(".tbz2")
            || path_str.ends_with(".tbz")
        {
            ArchiveType::TarBz2
        } else if path_str.ends_with(".tar.xz") || path_str.ends_with(".txz") {
            ArchiveType::TarXz
        } else if path_str.ends_with(".tar") {
            ArchiveType::Tar
        } else if path_str.ends_with(".rar") {
            ArchiveType::Rar
        } else {
            ArchiveType::Unknown
        }
    }

    /// Classify a file by its leading bytes
    pub fn sniff(path: &Path) -> io::Result<Self> {
        let mut header = Vec::with_capacity(SNIFF_LEN);
        File::open(path)?
            .take(SNIFF_LEN as u64)
            .read_to_end(&mut header)?;
        Ok(Self::from_magic(&header))
    }

    /// Classify raw leading bytes. Compressed streams are assumed to hold a tar.
    pub fn from_magic(header: &[u8]) -> Self {
        if header.starts_with(&[0x1f, 0x8b]) {
            ArchiveType::TarGz
        } else if header.starts_with(b"BZh") {
            ArchiveType::TarBz2
        } else if header.starts_with(&[0xfd, b'7', b'z', b'X', b'Z', 0x00]) {
            ArchiveType::TarXz
        } else if header.starts_with(b"PK\x03\x04") || header.starts_with(b"PK\x05\x06") {
            ArchiveType::Zip
        } else if header.starts_with(b"Rar!\x1a\x07") {
            ArchiveType::Rar
        } else if header.len() >= SNIFF_LEN && &header[257..262] == b"ustar" {
            ArchiveType::Tar
        } else {
            ArchiveType::Unknown
        }
    }

    /// Whether this is a tar wrapped in a compression stream
    pub fn is_compressed_tar(&self) -> bool {
        matches!(
            self,
            ArchiveType::TarGz | ArchiveType::TarBz2 | ArchiveType::TarXz
        )
    }

    pub fn is_tar(&self) -> bool {
        *self == ArchiveType::Tar || self.is_compressed_tar()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveType::Tar => "tar",
            ArchiveType::TarGz => "tar.gz",
            ArchiveType::TarBz2 => "tar.bz2",
            ArchiveType::TarXz => "tar.xz",
            ArchiveType::Zip => "zip",
            ArchiveType::Rar => "rar",
            ArchiveType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ArchiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Open a tar-family file as a stream of plain tar bytes
pub(crate) fn tar_stream(path: &Path, archive_type: ArchiveType) -> Result<Box<dyn Read>> {
    let reader = BufReader::new(File::open(path)?);

    let stream: Box<dyn Read> = match archive_type {
        ArchiveType::Tar => Box::new(reader),
        ArchiveType::TarGz => Box::new(GzDecoder::new(reader)),
        ArchiveType::TarBz2 => Box::new(BzDecoder::new(reader)),
        ArchiveType::TarXz => Box::new(XzDecoder::new(reader)),
        _ => {
            return Err(DownloaderError::UnsupportedFormat {
                path: path.to_path_buf(),
            })
        }
    };

    Ok(stream)
}

/// Decompress a compressed tar into a plain tar file at `dest`
pub fn decompress(source: &Path, dest: &Path, archive_type: ArchiveType) -> Result<u64> {
    if !archive_type.is_compressed_tar() {
        return Err(DownloaderError::UnsupportedFormat {
            path: source.to_path_buf(),
        });
    }

    let mut stream = tar_stream(source, archive_type)?;
    let mut out = File::create(dest)?;

    io::copy(&mut stream, &mut out).map_err(|e| {
        DownloaderError::Extraction(format!("Failed to decompress {}: {}", source.display(), e))
    })
}

/// Archive extractor writing into per-attempt directories of a workspace
#[derive(Debug, Clone)]
pub struct ArchiveExtractor {
    temp_dir: PathBuf,
}

impl ArchiveExtractor {
    pub fn new(temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            temp_dir: temp_dir.into(),
        }
    }

    /// Extract the archive into a fresh `<temp>/<stem>-XXXXXX` directory and
    /// return that directory. `stem` also names the decompressed tar, so it
    /// must be unique among concurrently running targets.
    pub fn extract(&self, stem: &str, archive_path: &Path) -> Result<PathBuf> {
        let archive_type = match ArchiveType::from_path(archive_path) {
            ArchiveType::Unknown => {
                let sniffed = ArchiveType::sniff(archive_path)?;
                log::debug!(
                    "No known suffix on {}, content looks like {}",
                    archive_path.display(),
                    sniffed
                );
                sniffed
            }
            known => known,
        };
        log::debug!("Extracting {} as {}", archive_path.display(), archive_type);

        let dest_dir = self.create_output_dir(stem)?;
        self.extract_with_type(stem, archive_path, &dest_dir, archive_type)?;

        Ok(dest_dir)
    }

    /// Extract an archive with explicit type
    pub fn extract_with_type(
        &self,
        stem: &str,
        archive_path: &Path,
        dest_dir: &Path,
        archive_type: ArchiveType,
    ) -> Result<()> {
        fs::create_dir_all(dest_dir)?;

        match archive_type {
            ArchiveType::Tar => extract_tar(archive_path, dest_dir),
            ArchiveType::TarGz | ArchiveType::TarBz2 | ArchiveType::TarXz => {
                let tar_path = self.temp_dir.join(format!("{}.tar", stem));
                decompress(archive_path, &tar_path, archive_type)?;
                extract_tar(&tar_path, dest_dir)
            }
            ArchiveType::Zip => extract_zip(archive_path, dest_dir),
            ArchiveType::Rar => extract_rar(archive_path, dest_dir),
            ArchiveType::Unknown => Err(DownloaderError::UnsupportedFormat {
                path: archive_path.to_path_buf(),
            }),
        }
    }

    fn create_output_dir(&self, stem: &str) -> Result<PathBuf> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}-", stem))
            .tempdir_in(&self.temp_dir)?;
        Ok(dir.keep())
    }
}

/// Drop the first `strip` components of an archive entry path.
///
/// Returns `None` when nothing is left (the top-level directory itself) and
/// fails on absolute paths or `..` components.
pub fn strip_entry_path(path: &Path, strip: usize) -> Result<Option<PathBuf>> {
    let mut normal = Vec::new();

    for component in path.components() {
        match component {
            Component::Normal(part) => normal.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(DownloaderError::Extraction(format!(
                    "Path traversal detected in archive: {}",
                    path.display()
                )));
            }
        }
    }

    if normal.len() <= strip {
        return Ok(None);
    }

    Ok(Some(normal[strip..].iter().collect()))
}

fn traversal_error(path: &Path) -> DownloaderError {
    DownloaderError::Extraction(format!(
        "Path traversal detected in archive: {}",
        path.display()
    ))
}

/// Check that a symlink at `relative` pointing to `target` stays inside the
/// extraction directory, judged on the link text alone
fn check_symlink_target(relative: &Path, target: &Path) -> Result<()> {
    let mut depth = relative.components().count().saturating_sub(1);

    for component in target.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => {
                depth = depth.checked_sub(1).ok_or_else(|| traversal_error(relative))?;
            }
            Component::RootDir | Component::Prefix(_) => return Err(traversal_error(relative)),
        }
    }

    Ok(())
}

/// Fail unless `path` resolves inside `root` once symlinks already on disk
/// are followed. Checks the closest ancestor that exists; `root` must be
/// canonical.
fn ensure_within(root: &Path, path: &Path) -> Result<()> {
    let existing = path
        .ancestors()
        .find(|p| fs::symlink_metadata(p).is_ok())
        .unwrap_or(root);

    let resolved = existing
        .canonicalize()
        .map_err(|_| traversal_error(path))?;
    if !resolved.starts_with(root) {
        return Err(traversal_error(path));
    }

    Ok(())
}

/// Extract a plain tar file
pub fn extract_tar(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    let reader = BufReader::new(File::open(archive_path)?);
    extract_tar_with_strip(reader, dest_dir, STRIP_COMPONENTS)
}

/// Extract tar with prefix stripping
pub fn extract_tar_with_strip<R: Read>(reader: R, dest_dir: &Path, strip: usize) -> Result<()> {
    let mut archive = tar::Archive::new(reader);
    archive.set_overwrite(true);
    let root = dest_dir.canonicalize()?;

    let entries = archive
        .entries()
        .map_err(|e| DownloaderError::Extraction(format!("Failed to read tar: {}", e)))?;

    for entry in entries {
        let mut entry = entry
            .map_err(|e| DownloaderError::Extraction(format!("Failed to read tar entry: {}", e)))?;

        let entry_type = entry.header().entry_type();
        if entry_type.is_pax_global_extensions() {
            continue;
        }

        let path = entry
            .path()
            .map_err(|e| DownloaderError::Extraction(format!("Invalid path in tar: {}", e)))?
            .into_owned();

        let Some(relative) = strip_entry_path(&path, strip)? else {
            continue;
        };
        let outpath = dest_dir.join(&relative);
        ensure_within(&root, &outpath)?;

        if entry_type.is_dir() {
            fs::create_dir_all(&outpath)?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent)?;
        }

        if entry_type.is_symlink() {
            let target = entry
                .link_name()
                .map_err(|e| DownloaderError::Extraction(format!("Invalid link in tar: {}", e)))?
                .ok_or_else(|| {
                    DownloaderError::Extraction(format!(
                        "Symlink without target: {}",
                        path.display()
                    ))
                })?;
            check_symlink_target(&relative, &target)?;
        }

        if entry_type.is_hard_link() {
            // Link targets are archive paths too, so they need the same stripping
            let link = entry
                .link_name()
                .map_err(|e| DownloaderError::Extraction(format!("Invalid link in tar: {}", e)))?
                .ok_or_else(|| {
                    DownloaderError::Extraction(format!(
                        "Hard link without target: {}",
                        path.display()
                    ))
                })?;
            let link = strip_entry_path(&link, strip)?.ok_or_else(|| {
                DownloaderError::Extraction(format!(
                    "Hard link to top-level directory: {}",
                    path.display()
                ))
            })?;
            let source = dest_dir.join(link);
            ensure_within(&root, &source)?;
            if outpath.exists() {
                fs::remove_file(&outpath)?;
            }
            fs::hard_link(source, &outpath)?;
            continue;
        }

        entry.unpack(&outpath).map_err(|e| {
            DownloaderError::Extraction(format!("Failed to extract {}: {}", path.display(), e))
        })?;
    }

    Ok(())
}

/// Extract a zip archive
pub fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    let reader = BufReader::new(File::open(archive_path)?);
    let mut archive = zip::ZipArchive::new(reader)
        .map_err(|e| DownloaderError::Extraction(format!("Failed to open zip: {}", e)))?;

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| DownloaderError::Extraction(format!("Failed to read zip entry: {}", e)))?;

        let path = file.enclosed_name().ok_or_else(|| {
            DownloaderError::Extraction(format!(
                "Path traversal detected in archive: {}",
                file.name()
            ))
        })?;

        let Some(relative) = strip_entry_path(&path, STRIP_COMPONENTS)? else {
            continue;
        };
        let outpath = dest_dir.join(&relative);

        if file.is_dir() {
            fs::create_dir_all(&outpath)?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut outfile = File::create(&outpath)?;
        io::copy(&mut file, &mut outfile)?;

        // Set permissions on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = file.unix_mode() {
                fs::set_permissions(&outpath, fs::Permissions::from_mode(mode))?;
            }
        }
    }

    Ok(())
}

/// Extract a rar archive
pub fn extract_rar(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    let rar_error = |e| rar_failure(archive_path, e);

    let mut archive = unrar::Archive::new(archive_path)
        .open_for_processing()
        .map_err(rar_error)?;

    while let Some(header) = archive.read_header().map_err(rar_error)? {
        let entry = header.entry();
        let relative = strip_entry_path(&entry.filename, STRIP_COMPONENTS)?;

        archive = match relative {
            Some(relative) if entry.is_file() => {
                let outpath = dest_dir.join(relative);
                if let Some(parent) = outpath.parent() {
                    fs::create_dir_all(parent)?;
                }
                header.extract_to(&outpath).map_err(rar_error)?
            }
            Some(relative) => {
                if entry.is_directory() {
                    fs::create_dir_all(dest_dir.join(relative))?;
                }
                header.skip().map_err(rar_error)?
            }
            None => header.skip().map_err(rar_error)?,
        };
    }

    Ok(())
}

fn rar_failure(path: &Path, e: impl fmt::Display) -> DownloaderError {
    DownloaderError::Extraction(format!("Failed to read rar {}: {}", path.display(), e))
}
