//! Download configuration.
//!
//! The configuration file lists extensions and skins per source kind:
//!
//! ```json
//! {
//!   "MWREL": "REL1_40",
//!   "Extensions": {
//!     "WMF":  ["Cite"],
//!     "Git":  { "Foo": { "type": "github", "repo": "org/Foo", "branch": "main" } },
//!     "http": { "Bar": "https://example.org/Bar-$mwrel.zip" }
//!   },
//!   "Skins": { "WMF": ["Vector"] }
//! }
//! ```
//!
//! # Default ref (in priority order, highest to lowest)
//!
//! 1. `MWREL` environment variable
//! 2. `MWREL` key of the config file
//! 3. `master`

mod schema;
mod source;

pub use schema::{CategoryConfig, DownloaderConfig, GitConfig};
pub use source::{ConfigLoader, FALLBACK_REF, MWREL_ENV};
