use std::time::Duration;

use tokio::time::{interval, Interval, MissedTickBehavior};

/// Spaces out successive calls to rate-limited providers.
///
/// The first call to [`Pacer::ready`] completes immediately; each later call
/// waits until at least one period has elapsed since the previous one.
pub struct Pacer {
    ticker: Option<Interval>,
}

impl Pacer {
    /// Builds a pacer; a zero period disables pacing.
    pub fn new(period: Duration) -> Self {
        if period.is_zero() {
            return Self { ticker: None };
        }
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            ticker: Some(ticker),
        }
    }

    pub async fn ready(&mut self) {
        if let Some(ticker) = self.ticker.as_mut() {
            ticker.tick().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn spaces_calls_by_period() {
        let mut pacer = Pacer::new(Duration::from_secs(2));
        let start = Instant::now();

        pacer.ready().await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        pacer.ready().await;
        pacer.ready().await;
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_work_does_not_cause_bursts() {
        let mut pacer = Pacer::new(Duration::from_secs(1));
        pacer.ready().await;
        tokio::time::sleep(Duration::from_secs(5)).await;

        let before = Instant::now();
        pacer.ready().await;
        pacer.ready().await;
        assert_eq!(before.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn zero_period_never_waits() {
        let mut pacer = Pacer::new(Duration::ZERO);
        let start = Instant::now();
        for _ in 0..100 {
            pacer.ready().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
