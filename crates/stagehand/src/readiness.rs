//! Process-wide readiness signals.
//!
//! A [`ReadyFlag`] is a monotonic boolean: once set it stays set for the
//! process lifetime (reconnections do not clear it). Handlers wait on it
//! with a bounded timeout and never block the dispatcher indefinitely.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

#[derive(Clone)]
pub struct ReadyFlag {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for ReadyFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadyFlag {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Set the flag. Idempotent; later calls are no-ops.
    pub fn set(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_set(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until the flag is set, at most `timeout`. Returns whether the
    /// flag was set when the wait ended.
    pub async fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_set() {
            return true;
        }
        let mut rx = self.tx.subscribe();
        let result = tokio::time::timeout(timeout, rx.wait_for(|ready| *ready)).await;
        matches!(result, Ok(Ok(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_is_monotonic_and_observable() {
        let flag = ReadyFlag::new();
        assert!(!flag.is_set());
        flag.set();
        flag.set();
        assert!(flag.is_set());
        assert!(flag.wait_timeout(Duration::from_millis(1)).await);
    }

    #[tokio::test]
    async fn wait_times_out_when_never_set() {
        let flag = ReadyFlag::new();
        let start = std::time::Instant::now();
        assert!(!flag.wait_timeout(Duration::from_millis(30)).await);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn wait_wakes_on_set_from_another_task() {
        let flag = ReadyFlag::new();
        let waiter = flag.clone();
        let handle = tokio::spawn(async move { waiter.wait_timeout(Duration::from_secs(5)).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        flag.set();
        assert!(handle.await.unwrap());
    }
}
