//! Single-shot reconnect timer.

use std::time::Duration;
use tokio::time::{sleep_until, Instant};

/// At most one pending reconnect deadline.
///
/// Scheduling again replaces the pending deadline, so a burst of failures
/// still yields exactly one reconnect attempt.
#[derive(Debug, Default)]
pub struct ReconnectTimer {
    deadline: Option<Instant>,
}

impl ReconnectTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, delay: Duration) {
        self.deadline = Some(Instant::now() + delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Resolves once the deadline passes and disarms the timer. Never
    /// resolves while disarmed.
    pub async fn expired(&mut self) {
        match self.deadline {
            Some(deadline) => {
                sleep_until(deadline).await;
                self.deadline = None;
            }
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_timer_is_disarmed() {
        assert!(!ReconnectTimer::new().is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expires_after_delay() {
        let mut timer = ReconnectTimer::new();
        let start = Instant::now();
        timer.schedule(Duration::from_secs(1));

        timer.expired().await;
        assert!(start.elapsed() >= Duration::from_secs(1));
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_replaces_deadline() {
        let mut timer = ReconnectTimer::new();
        let start = Instant::now();
        timer.schedule(Duration::from_secs(1));
        tokio::time::advance(Duration::from_millis(500)).await;
        timer.schedule(Duration::from_secs(1));

        timer.expired().await;
        assert!(start.elapsed() >= Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_disarms() {
        let mut timer = ReconnectTimer::new();
        timer.schedule(Duration::from_secs(1));
        timer.cancel();
        assert!(!timer.is_armed());

        let result = tokio::time::timeout(Duration::from_secs(5), timer.expired()).await;
        assert!(result.is_err());
    }
}
