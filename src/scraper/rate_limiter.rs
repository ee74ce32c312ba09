use rand::Rng;
use std::time::Duration;
use tracing::debug;

use crate::config::RateLimitConfig;
use crate::error::{LeadScrapeError, LeadScrapeResult};

/// Randomized pacing between network-facing actions.
///
/// Every call to [`RateLimiter::wait`] sleeps for a duration drawn uniformly from
/// `[min_delay, max_delay]`. Each extractor owns its own limiter; nothing is shared.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    min_delay: Duration,
    max_delay: Duration,
}

impl RateLimiter {
    /// Bounds are swapped if given in the wrong order
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        if min_delay <= max_delay {
            Self { min_delay, max_delay }
        } else {
            Self { min_delay: max_delay, max_delay: min_delay }
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> LeadScrapeResult<Self> {
        Ok(Self::new(
            delay_from_secs(config.min_delay_secs)?,
            delay_from_secs(config.max_delay_secs)?,
        ))
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Sample the next delay without sleeping
    pub fn next_delay(&self) -> Duration {
        if self.min_delay == self.max_delay {
            return self.min_delay;
        }
        let nanos = rand::thread_rng().gen_range(self.min_delay.as_nanos()..=self.max_delay.as_nanos());
        Duration::from_nanos(nanos as u64)
    }

    /// Sleep for a random delay within the configured bounds
    pub async fn wait(&self) {
        let delay = self.next_delay();
        if delay.is_zero() {
            return;
        }
        debug!("Rate limiting: waiting {}ms", delay.as_millis());
        tokio::time::sleep(delay).await;
    }
}

fn delay_from_secs(secs: f64) -> LeadScrapeResult<Duration> {
    Duration::try_from_secs_f64(secs.max(0.0))
        .map_err(|e| LeadScrapeError::config(format!("invalid rate limit delay {}: {}", secs, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_default_bounds() {
        let limiter = RateLimiter::from_config(&RateLimitConfig::default()).unwrap();
        assert_eq!(limiter.min_delay(), Duration::from_secs(1));
        assert_eq!(limiter.max_delay(), Duration::from_secs(3));
    }

    #[test]
    fn test_delays_stay_within_bounds() {
        let limiter = RateLimiter::new(Duration::from_millis(1000), Duration::from_millis(2000));
        for _ in 0..1000 {
            let delay = limiter.next_delay();
            assert!(delay >= limiter.min_delay());
            assert!(delay <= limiter.max_delay());
        }
    }

    #[test]
    fn test_equal_bounds_are_fixed() {
        let limiter = RateLimiter::new(Duration::from_millis(250), Duration::from_millis(250));
        assert_eq!(limiter.next_delay(), Duration::from_millis(250));
    }

    #[test]
    fn test_swapped_bounds_are_normalized() {
        let limiter = RateLimiter::new(Duration::from_secs(3), Duration::from_secs(1));
        assert_eq!(limiter.min_delay(), Duration::from_secs(1));
        assert_eq!(limiter.max_delay(), Duration::from_secs(3));
    }

    #[test]
    fn test_unrepresentable_delay_is_an_error() {
        let config = RateLimitConfig {
            min_delay_secs: 1.0,
            max_delay_secs: f64::INFINITY,
        };
        let err = RateLimiter::from_config(&config).unwrap_err();
        assert!(matches!(err, LeadScrapeError::Configuration { .. }));

        let huge = RateLimitConfig {
            min_delay_secs: 1e300,
            max_delay_secs: 1e300,
        };
        assert!(RateLimiter::from_config(&huge).is_err());
    }

    #[tokio::test]
    async fn test_wait_sleeps_at_least_min_delay() {
        let limiter = RateLimiter::new(Duration::from_millis(20), Duration::from_millis(40));
        let start = Instant::now();
        limiter.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
