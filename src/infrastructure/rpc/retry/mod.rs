use crate::foundation::{NodeError, Result};
use log::debug;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Retries `op` with a fixed delay while it fails with a transient error.
/// Non-transient errors are returned immediately.
pub async fn retry<F, Fut, T>(operation: &str, mut attempts: usize, delay: Duration, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_err = None;
    while attempts > 0 {
        match op().await {
            Ok(v) => return Ok(v),
            Err(err) if err.is_transient() => {
                attempts -= 1;
                debug!("transient failure operation={} attempts_left={} error={}", operation, attempts, err);
                last_err = Some(err);
                if attempts > 0 {
                    sleep(delay).await;
                }
            }
            Err(err) => return Err(err),
        }
    }
    Err(last_err.unwrap_or_else(|| NodeError::Message(format!("retry exhausted for {}", operation))))
}
