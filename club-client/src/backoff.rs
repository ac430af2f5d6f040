use std::time::Duration;

/// Capped exponential backoff: `min(base * 2^attempt, cap)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub cap: Duration,
}

impl Backoff {
    /// Listener re-subscribe delays: 1s, 2s, 4s, 8s, then 10s
    pub const SUBSCRIPTION: Self = Self::new(Duration::from_secs(1), Duration::from_secs(10));

    /// Store reconnect delays: 5s doubling up to 60s
    pub const CONNECTION: Self = Self::new(Duration::from_secs(5), Duration::from_secs(60));

    pub const fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap }
    }

    /// Delay before attempt number `attempt` (zero-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .map_or(self.cap, |delay| delay.min(self.cap))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::SUBSCRIPTION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_delays() {
        let delays: Vec<u64> = (0..6)
            .map(|n| Backoff::SUBSCRIPTION.delay(n).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 10000, 10000]);
    }

    #[test]
    fn test_connection_delays_and_overflow() {
        assert_eq!(Backoff::CONNECTION.delay(0), Duration::from_secs(5));
        assert_eq!(Backoff::CONNECTION.delay(3), Duration::from_secs(40));
        assert_eq!(Backoff::CONNECTION.delay(4), Duration::from_secs(60));
        assert_eq!(Backoff::CONNECTION.delay(200), Duration::from_secs(60));
    }
}
