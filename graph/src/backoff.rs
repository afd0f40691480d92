//! Exponential backoff shared by graph-store write retries and
//! content-store fetch retries, grounded in the teacher's
//! `util::backoff::ExponentialBackoff` (used by `FirehoseBlockIngestor::run`).

use std::time::Duration;

use rand::Rng;

#[derive(Clone, Debug)]
pub struct ExponentialBackoff {
    base: Duration,
    max: Duration,
    attempt: u32,
}

impl ExponentialBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        ExponentialBackoff {
            base,
            max,
            attempt: 0,
        }
    }

    /// The delay the next `sleep_async` call would use, without advancing
    /// the attempt counter.
    pub fn delay(&self) -> Duration {
        let factor = 1u64.checked_shl(self.attempt).unwrap_or(u64::MAX);
        let scaled = self.base.checked_mul(factor as u32).unwrap_or(self.max);
        let capped = std::cmp::min(scaled, self.max);

        // Jitter by up to 20% so many retrying connections don't thunder
        // against the same endpoint in lockstep.
        let jitter_millis = rand::thread_rng().gen_range(0..=(capped.as_millis() as u64 / 5 + 1));
        capped + Duration::from_millis(jitter_millis)
    }

    pub async fn sleep_async(&mut self) {
        let delay = self.delay();
        self.attempt = self.attempt.saturating_add(1);
        tokio::time::sleep(delay).await;
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_is_capped() {
        let mut b = ExponentialBackoff::new(Duration::from_millis(250), Duration::from_secs(30));
        for _ in 0..20 {
            assert!(b.delay() <= Duration::from_secs(30) + Duration::from_secs(6));
            b.attempt += 1;
        }
    }

    #[tokio::test]
    async fn sleep_async_advances_attempt() {
        let mut b = ExponentialBackoff::new(Duration::from_millis(1), Duration::from_millis(5));
        assert_eq!(b.attempt(), 0);
        b.sleep_async().await;
        assert_eq!(b.attempt(), 1);
    }
}
