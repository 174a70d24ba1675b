//! Periodic tick source.

use std::time::Duration;

use botpanel_types::PanelError;
use futures_util::stream;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::stream::Stream;

/// Emit `0, 1, 2, …` with tick `n` at `(n + 1) * period` after subscribing.
///
/// The stream never completes on its own; a zero `period` fails it with
/// [`PanelError::Config`].
pub fn interval(period: Duration) -> Stream<u64> {
    if period.is_zero() {
        return Stream::fail(PanelError::Config(
            "interval period must be greater than zero".to_string(),
        ));
    }

    Stream::from_fn(move || {
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        stream::unfold((ticker, 0u64), |(mut ticker, n)| async move {
            ticker.tick().await;
            Some((Ok(n), (ticker, n + 1)))
        })
    })
}
