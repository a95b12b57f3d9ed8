//! HTTP access for revision lookups and archive downloads.

mod client;

pub use client::{HttpClient, HttpClientConfig, HttpError};
