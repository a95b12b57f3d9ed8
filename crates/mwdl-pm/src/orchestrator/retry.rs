use std::future::Future;
use std::time::Duration;

use crate::{DownloaderError, Result};

/// Run `op` up to `attempts` times, sleeping `delay` between tries.
///
/// The delay is fixed. When every attempt fails, the last error is returned
/// wrapped in [`DownloaderError::RetriesExhausted`]. An `attempts` of zero
/// still runs the operation once.
pub async fn retry<F, Fut, T>(
    attempts: u32,
    delay: Duration,
    description: &str,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= attempts => {
                return Err(DownloaderError::RetriesExhausted {
                    description: description.to_string(),
                    attempts,
                    source: Box::new(e),
                });
            }
            Err(e) => {
                log::warn!(
                    "Attempt {}/{} to {} failed: {}",
                    attempt,
                    attempts,
                    description,
                    e
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                log::info!("Retrying {}... attempt {}", description, attempt);
            }
        }
    }
}
