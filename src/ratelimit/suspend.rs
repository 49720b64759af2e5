//! How a caller waits when it has to wait
//!
//! Admission waits and retry backoff share one algorithm; only the way the
//! caller is suspended differs. `Blocking` parks the calling thread,
//! `Cooperative` yields to the async scheduler so other requests can run on
//! the same thread in the meantime.

use crate::HarvestError;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Longest uninterrupted thread sleep while a blocking caller waits, so that
/// cancellation is still observed promptly
const BLOCKING_POLL_SLICE: Duration = Duration::from_millis(10);

/// Suspension strategy for waits inside the request path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Suspension {
    /// Halt the calling thread
    Blocking,
    /// Yield to the async runtime
    #[default]
    Cooperative,
}

impl Suspension {
    /// Waits for `duration`, returning early with `Cancelled` if the token fires
    pub async fn pause(
        self,
        duration: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), HarvestError> {
        if cancel.is_cancelled() {
            return Err(HarvestError::Cancelled);
        }

        match self {
            Self::Cooperative => {
                tokio::select! {
                    _ = cancel.cancelled() => Err(HarvestError::Cancelled),
                    _ = tokio::time::sleep(duration) => Ok(()),
                }
            }
            Self::Blocking => {
                let deadline = Instant::now() + duration;
                loop {
                    if cancel.is_cancelled() {
                        return Err(HarvestError::Cancelled);
                    }
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(());
                    }
                    std::thread::sleep((deadline - now).min(BLOCKING_POLL_SLICE));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_cooperative_pause_sleeps() {
        let cancel = CancellationToken::new();
        let start = tokio::time::Instant::now();

        Suspension::Cooperative
            .pause(Duration::from_secs(3), &cancel)
            .await
            .unwrap();

        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_cooperative_pause_observes_cancellation() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = Suspension::Cooperative
            .pause(Duration::from_secs(30), &cancel)
            .await;
        assert!(matches!(result, Err(HarvestError::Cancelled)));
    }

    #[tokio::test]
    async fn test_blocking_pause_halts_thread() {
        let cancel = CancellationToken::new();
        let start = Instant::now();

        Suspension::Blocking
            .pause(Duration::from_millis(30), &cancel)
            .await
            .unwrap();

        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn test_pause_with_cancelled_token_returns_immediately() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        for suspension in [Suspension::Blocking, Suspension::Cooperative] {
            let result = suspension.pause(Duration::from_secs(30), &cancel).await;
            assert!(matches!(result, Err(HarvestError::Cancelled)));
        }
    }
}
