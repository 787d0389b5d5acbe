//! Heal strategies.
//!
//! A strategy only decides how long to wait before each retry of
//! `initialize`; the resource owns the retry loop.

use rand::Rng;
use std::time::Duration;

use crate::config::{HealConfig, HealStrategyKind, TimeUnit};

/// Default cap for exponential backoff, as a multiple of the initial delay.
const DEFAULT_BACKOFF_CAP_FACTOR: u32 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealStrategy {
    /// Retry every `delay`, starting `delay` after the failure.
    FixedInterval { delay: Duration },
    /// Double the delay after each failed retry, capped at `max`, with jitter.
    ExponentialBackoff { initial: Duration, max: Duration },
}

impl HealStrategy {
    pub fn fixed_interval(delay: Duration) -> Self {
        HealStrategy::FixedInterval { delay }
    }

    pub fn exponential_backoff(initial: Duration, max: Duration) -> Self {
        HealStrategy::ExponentialBackoff { initial, max }
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            HealStrategy::FixedInterval { delay } => delay,
            HealStrategy::ExponentialBackoff { initial, max } => {
                let base = initial
                    .saturating_mul(2u32.saturating_pow(attempt.min(31)))
                    .min(max);
                base + jitter(base)
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            HealStrategy::FixedInterval { .. } => "fixed-interval",
            HealStrategy::ExponentialBackoff { .. } => "exponential-backoff",
        }
    }
}

/// Random extra wait of up to 10% of `base`.
fn jitter(base: Duration) -> Duration {
    let spread = base.as_millis() as u64 / 10;
    if spread == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..spread))
}

fn to_duration(value: u64, unit: TimeUnit) -> Duration {
    match unit {
        TimeUnit::Ms => Duration::from_millis(value),
        TimeUnit::S => Duration::from_secs(value),
    }
}

impl From<&HealConfig> for HealStrategy {
    fn from(config: &HealConfig) -> Self {
        let initial = to_duration(config.initial_delay, config.time_unit);
        match config.strategy {
            HealStrategyKind::FixedInterval => HealStrategy::fixed_interval(initial),
            HealStrategyKind::ExponentialBackoff => {
                let max = config
                    .max_delay
                    .map(|max| to_duration(max, config.time_unit))
                    .unwrap_or_else(|| initial.saturating_mul(DEFAULT_BACKOFF_CAP_FACTOR));
                HealStrategy::exponential_backoff(initial, max)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_interval_is_constant() {
        let strategy = HealStrategy::fixed_interval(Duration::from_millis(250));
        assert_eq!(strategy.delay(0), Duration::from_millis(250));
        assert_eq!(strategy.delay(7), Duration::from_millis(250));
        assert_eq!(strategy.name(), "fixed-interval");
    }

    #[test]
    fn test_exponential_grows_and_caps() {
        let strategy =
            HealStrategy::exponential_backoff(Duration::from_millis(100), Duration::from_millis(800));
        assert!(strategy.delay(0) >= Duration::from_millis(100));
        assert!(strategy.delay(2) >= Duration::from_millis(400));
        assert!(strategy.delay(10) < Duration::from_millis(880));
    }

    #[test]
    fn test_exponential_does_not_overflow() {
        let strategy = HealStrategy::exponential_backoff(Duration::from_secs(1), Duration::from_secs(5));
        let delay = strategy.delay(u32::MAX);
        assert!(delay >= Duration::from_secs(5) && delay < Duration::from_millis(5_500));
    }

    #[test]
    fn test_from_config_units() {
        let strategy = HealStrategy::from(&HealConfig {
            strategy: HealStrategyKind::FixedInterval,
            initial_delay: 5,
            time_unit: TimeUnit::S,
            max_delay: None,
        });
        assert_eq!(strategy, HealStrategy::fixed_interval(Duration::from_secs(5)));

        let strategy = HealStrategy::from(&HealConfig {
            strategy: HealStrategyKind::ExponentialBackoff,
            initial_delay: 100,
            time_unit: TimeUnit::Ms,
            max_delay: None,
        });
        assert_eq!(
            strategy,
            HealStrategy::exponential_backoff(Duration::from_millis(100), Duration::from_millis(3200))
        );
    }
}
