use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

/// Spaces request starts at least `delay` apart.
///
/// Waiters queue on the lock, so concurrent callers are released one slot at
/// a time in arrival order.
#[derive(Debug)]
pub struct RequestPacer {
    delay: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RequestPacer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            next_slot: Mutex::new(None),
        }
    }

    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Waits until the caller may start a request; returns how long it waited.
    pub async fn wait_turn(&self) -> Duration {
        if self.delay.is_zero() {
            return Duration::ZERO;
        }

        let started = Instant::now();
        let mut next_slot = self.next_slot.lock().await;

        if let Some(slot) = *next_slot {
            if slot > Instant::now() {
                debug!("Pacing: waiting {:?} for next request slot", slot - Instant::now());
                sleep_until(slot).await;
            }
        }

        *next_slot = Some(Instant::now() + self.delay);
        started.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_requests_are_spaced() {
        let pacer = RequestPacer::new(Duration::from_millis(1000));

        assert_eq!(pacer.wait_turn().await, Duration::ZERO);

        let before = Instant::now();
        pacer.wait_turn().await;
        pacer.wait_turn().await;
        assert!(before.elapsed() >= Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_wait_after_idle_period() {
        let pacer = RequestPacer::new(Duration::from_millis(500));
        pacer.wait_turn().await;

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(pacer.wait_turn().await, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_are_serialized() {
        let pacer = Arc::new(RequestPacer::new(Duration::from_millis(100)));
        let start = Instant::now();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pacer = Arc::clone(&pacer);
                tokio::spawn(async move { pacer.wait_turn().await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_disabled_pacer_never_waits() {
        let pacer = RequestPacer::disabled();
        for _ in 0..5 {
            assert_eq!(pacer.wait_turn().await, Duration::ZERO);
        }
    }
}
