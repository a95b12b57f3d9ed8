//! Decoding of revision lookup responses.
//!
//! The lookup service guards its JSON against script inclusion: the body
//! carries 4 non-JSON bytes in front and 1 behind the document. The byte
//! counts are fixed by the upstream service; if it ever changes its framing
//! the decode below fails and resolution falls back to a forge snapshot.

use serde::Deserialize;

use crate::error::{DownloaderError, Result};

pub const FRAMING_PREFIX_LEN: usize = 4;
pub const FRAMING_SUFFIX_LEN: usize = 1;

/// Length of the abbreviated revision used in distribution file names
pub const SHORT_REVISION_LEN: usize = 9;

#[derive(Debug, Clone, Deserialize)]
pub struct BranchInfo {
    pub revision: String,
}

/// Remove the anti-hijacking framing around the JSON document
pub fn strip_framing(body: &[u8]) -> Result<&[u8]> {
    if body.len() < FRAMING_PREFIX_LEN + FRAMING_SUFFIX_LEN {
        return Err(DownloaderError::Revision(format!(
            "response too short ({} bytes)",
            body.len()
        )));
    }

    Ok(&body[FRAMING_PREFIX_LEN..body.len() - FRAMING_SUFFIX_LEN])
}

/// Extract the full revision hash from a framed lookup response
pub fn parse_revision(body: &[u8]) -> Result<String> {
    let info: BranchInfo = serde_json::from_slice(strip_framing(body)?)
        .map_err(|e| DownloaderError::Revision(format!("invalid response: {}", e)))?;

    if info.revision.is_empty() {
        return Err(DownloaderError::Revision("empty revision".to_string()));
    }

    Ok(info.revision)
}

pub fn short_revision(revision: &str) -> &str {
    revision.get(..SHORT_REVISION_LEN).unwrap_or(revision)
}
