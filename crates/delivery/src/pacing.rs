//! Send pacing: spaces deliveries evenly to stay under a per-minute rate.

use relay_core::ValidationError;
use std::time::Duration;

pub const MIN_RATE_PER_MINUTE: i64 = 1;
pub const MAX_RATE_PER_MINUTE: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendPacer {
    rate_per_minute: u32,
    interval: Duration,
}

impl SendPacer {
    pub fn new(rate_per_minute: i64) -> Result<Self, ValidationError> {
        if !(MIN_RATE_PER_MINUTE..=MAX_RATE_PER_MINUTE).contains(&rate_per_minute) {
            return Err(ValidationError::InvalidRate(rate_per_minute));
        }
        let rate = rate_per_minute as u32;
        let interval_ms = (60_000.0 / f64::from(rate)).round() as u64;
        Ok(Self {
            rate_per_minute: rate,
            interval: Duration::from_millis(interval_ms),
        })
    }

    pub fn rate_per_minute(&self) -> u32 {
        self.rate_per_minute
    }

    /// Gap between two consecutive sends.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Suspend the caller for one interval.
    pub async fn pause(&self) {
        tokio::time::sleep(self.interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        assert_eq!(SendPacer::new(0), Err(ValidationError::InvalidRate(0)));
        assert_eq!(SendPacer::new(61), Err(ValidationError::InvalidRate(61)));
        assert_eq!(SendPacer::new(-5), Err(ValidationError::InvalidRate(-5)));
        assert!(SendPacer::new(1).is_ok());
        assert!(SendPacer::new(60).is_ok());
    }

    #[test]
    fn test_interval_rounding() {
        assert_eq!(SendPacer::new(60).unwrap().interval(), Duration::from_millis(1000));
        assert_eq!(SendPacer::new(1).unwrap().interval(), Duration::from_secs(60));
        assert_eq!(SendPacer::new(20).unwrap().interval(), Duration::from_millis(3000));
        // 60000 / 7 = 8571.43
        assert_eq!(SendPacer::new(7).unwrap().interval(), Duration::from_millis(8571));
        // 60000 / 45 = 1333.33
        assert_eq!(SendPacer::new(45).unwrap().interval(), Duration::from_millis(1333));
        // 60000 / 9 = 6666.67
        assert_eq!(SendPacer::new(9).unwrap().interval(), Duration::from_millis(6667));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_waits_one_interval() {
        let pacer = SendPacer::new(30).unwrap();
        let start = tokio::time::Instant::now();
        pacer.pause().await;
        assert!(start.elapsed() >= Duration::from_millis(2000));
    }
}
