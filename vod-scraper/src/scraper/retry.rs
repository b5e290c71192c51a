//! Uniform retry-once policy for transient upstream calls.

use std::fmt::Display;
use std::future::Future;

use tracing::warn;

/// Run `operation`, retrying exactly once on failure.
///
/// Transient upstream errors get one second chance and are otherwise
/// surfaced to the caller to handle per-item; nothing here escalates.
pub async fn retry_once<T, E, F, Fut>(operation: F) -> Result<T, E>
where
    E: Display,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    match operation().await {
        Ok(value) => Ok(value),
        Err(err) => {
            warn!(%err, "retrying after error");
            operation().await
        }
    }
}
