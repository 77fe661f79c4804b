use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// How a lost hub connection is re-established.
///
/// Delays grow geometrically from `initial_delay` by `multiplier`, capped at
/// `max_delay`. With `jitter` on, up to a quarter of each delay is added at
/// random so that many clients do not reconnect in lockstep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub jitter: bool,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl ReconnectPolicy {
    /// A policy that never reconnects.
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }

    pub fn with_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_delays(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_delay = initial;
        self.max_delay = max;
        self
    }

    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Delay before reconnect attempt number `attempt` (zero based), or
    /// `None` once the attempts are used up.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let factor = self.multiplier.max(1.0).powi(attempt as i32);
        let base = self.initial_delay.as_secs_f64() * factor;
        let capped = base.min(self.max_delay.as_secs_f64());
        let mut delay = Duration::from_secs_f64(capped);
        if self.jitter {
            let spread = (delay.as_millis() / 4) as u64;
            if spread > 0 {
                delay += Duration::from_millis(rand::rng().random_range(0..=spread));
            }
        }
        Some(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_grow_and_cap() {
        let policy = ReconnectPolicy::default()
            .with_attempts(6)
            .with_delays(Duration::from_millis(100), Duration::from_millis(500))
            .without_jitter();
        let delays: Vec<u128> = (0..6).map(|n| policy.delay_for(n).unwrap().as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400, 500, 500, 500]);
        assert_eq!(policy.delay_for(6), None);
    }

    #[test]
    fn test_disabled_policy_never_retries() {
        assert_eq!(ReconnectPolicy::disabled().delay_for(0), None);
    }

    #[test]
    fn test_jitter_stays_within_a_quarter() {
        let policy = ReconnectPolicy::default()
            .with_delays(Duration::from_millis(400), Duration::from_secs(10));
        for _ in 0..50 {
            let delay = policy.delay_for(0).unwrap().as_millis();
            assert!((400..=500).contains(&delay), "delay {delay} out of range");
        }
    }
}
