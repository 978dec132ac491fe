use std::time::Duration;

/// Reconnect schedule: `base * factor^attempt`, capped at `max_delay`,
/// for at most `max_attempts` consecutive attempts.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Backoff {
    pub base_delay: Duration,
    pub growth_factor: u32,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff {
            base_delay: Duration::from_millis(1000),
            growth_factor: 2,
            max_delay: Duration::from_millis(30_000),
            max_attempts: 5,
        }
    }
}

impl Backoff {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.growth_factor.max(1).saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    pub fn exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }
}
