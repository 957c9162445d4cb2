//! Polling helpers for assertions on detached work.

use std::time::Duration;

use anyhow::{Result, bail};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Poll `condition` until it holds or `timeout` elapses.
///
/// # Errors
///
/// Returns an error when the condition still fails after `timeout`.
pub async fn eventually<F>(timeout: Duration, condition: F) -> Result<()>
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            bail!("condition not met within {timeout:?}");
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn returns_once_condition_holds() -> Result<()> {
        let counter = Arc::new(AtomicUsize::new(0));
        let ticker = Arc::clone(&counter);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            ticker.store(1, Ordering::SeqCst);
        });
        eventually(Duration::from_secs(2), || counter.load(Ordering::SeqCst) == 1).await
    }

    #[tokio::test]
    async fn fails_after_timeout() {
        assert!(eventually(Duration::from_millis(30), || false).await.is_err());
    }
}
