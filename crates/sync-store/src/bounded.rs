//! Timeout-bounded store calls.

use std::future::Future;
use std::time::Duration;
use sync_core::SyncError;

/// Await a store call, failing with [`SyncError::Timeout`] once `timeout` elapses.
///
/// `None` means unbounded. Store errors become [`SyncError::Storage`] tagged
/// with `operation`, so callers only decide whether the failure is fatal.
pub async fn bounded<T, F>(
    operation: &str,
    timeout: Option<Duration>,
    call: F,
) -> Result<T, SyncError>
where
    F: Future<Output = anyhow::Result<T>>,
{
    let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => {
                return Err(SyncError::Timeout {
                    operation: operation.to_string(),
                    timeout: limit,
                })
            }
        },
        None => call.await,
    };
    result.map_err(|e| SyncError::storage(operation, e))
}
