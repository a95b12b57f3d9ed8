//! Fetching, validating and unpacking target archives.

mod archive;
mod file;
mod validator;

pub use archive::{
    decompress, extract_rar, extract_tar, extract_tar_with_strip, extract_zip, strip_entry_path,
    ArchiveExtractor, ArchiveType, STRIP_COMPONENTS,
};
pub use file::{detect_extension, FileDownloader};
pub use validator::{is_valid_archive, validate_archive};
