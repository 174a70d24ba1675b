//! Battery level derived from an interval tick count.
//!
//! The panel has no battery topic; it shows a level that drains by one
//! percent per tick and stays empty once it reaches zero.

use std::time::Duration;

use botpanel_stream::{Stream, interval};

/// `(100 − tick) / 100`, clamped to `[0.0, 1.0]`.
pub fn battery_fraction(tick: u64) -> f64 {
    (100 - tick.min(100)) as f64 / 100.0
}

/// One fraction per `period`, starting one period after subscription.
pub fn battery_level(period: Duration) -> Stream<f64> {
    interval(period).map(battery_fraction)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tokio::time::Instant;

    use super::*;

    #[test]
    fn fraction_drains_one_percent_per_tick() {
        assert_eq!(battery_fraction(0), 1.0);
        assert_eq!(battery_fraction(1), 0.99);
        assert_eq!(battery_fraction(50), 0.5);
        assert_eq!(battery_fraction(100), 0.0);
    }

    #[test]
    fn fraction_is_clamped_after_one_hundred_ticks() {
        assert_eq!(battery_fraction(101), 0.0);
        assert_eq!(battery_fraction(u64::MAX), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn levels_arrive_every_period() {
        let start = Instant::now();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sub = battery_level(Duration::from_secs(2))
            .take(3)
            .subscribe(move |level| {
                sink.lock().expect("lock").push((start.elapsed().as_secs(), level));
            });
        sub.join().await;

        assert_eq!(
            *seen.lock().expect("lock"),
            vec![(2, 1.0), (4, 0.99), (6, 0.98)]
        );
    }
}
