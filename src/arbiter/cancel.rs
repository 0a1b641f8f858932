use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Monotonic cancellation epoch shared between the arbitrator and the
/// actuation worker.
///
/// Work is tagged with the epoch current when it was issued; bumping the
/// epoch invalidates everything issued earlier and wakes anyone waiting in
/// [`CancelToken::stale`].
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    epoch: Arc<AtomicU64>,
    bumped: Arc<Notify>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Invalidate all outstanding work; returns the new epoch
    pub fn bump(&self) -> u64 {
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        self.bumped.notify_waiters();
        epoch
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        self.current() == epoch
    }

    /// Resolves once `epoch` is no longer current
    pub async fn stale(&self, epoch: u64) {
        loop {
            let notified = self.bumped.notified();
            tokio::pin!(notified);
            // Register before checking so a bump in between is not missed
            notified.as_mut().enable();

            if !self.is_current(epoch) {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[test]
    fn test_bump_invalidates_clones() {
        let token = CancelToken::new();
        let worker_view = token.clone();

        let issued = token.current();
        assert!(worker_view.is_current(issued));

        assert_eq!(token.bump(), issued + 1);
        assert!(!worker_view.is_current(issued));
        assert!(worker_view.is_current(issued + 1));
    }

    #[tokio::test]
    async fn test_stale_wakes_on_bump() {
        let token = CancelToken::new();
        let epoch = token.bump();

        let waiter = token.clone();
        let handle = tokio::spawn(async move { waiter.stale(epoch).await });

        tokio::task::yield_now().await;
        assert!(!handle.is_finished());

        token.bump();
        timeout(Duration::from_millis(100), handle)
            .await
            .unwrap()
            .unwrap();

        // Already stale: resolves immediately
        timeout(Duration::from_millis(10), token.stale(epoch))
            .await
            .unwrap();
    }
}
