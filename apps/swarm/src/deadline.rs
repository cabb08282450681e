//! Wall-clock bounds for network operations.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Run `work` under a wall-clock deadline.
///
/// Returns `Some(output)` when the work completes in time. On expiry the
/// work is dropped, so a timed-out operation can never touch session state
/// after control has returned to the caller.
pub async fn bounded<F>(label: &str, deadline: Duration, work: F) -> Option<F::Output>
where
    F: Future,
{
    match tokio::time::timeout(deadline, work).await {
        Ok(output) => Some(output),
        Err(_) => {
            warn!(label, ?deadline, "deadline exceeded, operation cancelled");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Instant;
    use tokio::time::sleep;

    #[tokio::test]
    async fn fast_work_returns_its_output() {
        let started = Instant::now();
        let out = bounded("fast", Duration::from_millis(500), async {
            sleep(Duration::from_millis(10)).await;
            7
        })
        .await;
        assert_eq!(out, Some(7));
        assert!(started.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test]
    async fn slow_work_is_cancelled_at_the_deadline() {
        let touched = Arc::new(AtomicBool::new(false));
        let flag = touched.clone();
        let started = Instant::now();

        let out = bounded("slow", Duration::from_millis(50), async move {
            sleep(Duration::from_millis(200)).await;
            flag.store(true, Ordering::SeqCst);
        })
        .await;

        assert!(out.is_none());
        assert!(started.elapsed() < Duration::from_millis(150));

        // The dropped work must never run to completion behind our back.
        sleep(Duration::from_millis(250)).await;
        assert!(!touched.load(Ordering::SeqCst));
    }
}
