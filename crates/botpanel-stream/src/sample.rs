//! Sampler – time-gated backpressure.
//!
//! `stream.sample(period)` divides time into consecutive windows of
//! `period`, starting when the subscription opens.  At the end of each
//! window it forwards the most recent value that arrived during that window
//! and forgets it; windows in which nothing arrived emit nothing.  Values
//! overwritten within a window are dropped, which keeps slow consumers (a
//! display, a detector) at a bounded rate regardless of the producer.

use std::time::Duration;

use botpanel_types::PanelError;
use futures_util::StreamExt;
use futures_util::stream;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use crate::stream::{Flow, Stream};

struct SampleState<T> {
    upstream: Flow<T>,
    ticker: Interval,
    pending: Option<T>,
    done: bool,
}

impl<T: Send + 'static> Stream<T> {
    /// Forward at most one value per `period`: the latest one seen in that
    /// window.
    ///
    /// Completion of the upstream completes the sampled stream immediately;
    /// a value still pending at that point is discarded.  A zero `period`
    /// yields a stream that fails with [`PanelError::Config`].
    pub fn sample(self, period: Duration) -> Stream<T> {
        if period.is_zero() {
            return Stream::fail(PanelError::Config(
                "sample period must be greater than zero".to_string(),
            ));
        }

        Stream::from_fn(move || {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let state = SampleState {
                upstream: self.open(),
                ticker,
                pending: None,
                done: false,
            };
            stream::unfold(state, |mut state| async move {
                if state.done {
                    return None;
                }
                loop {
                    // The ticker is polled first so a producer that is always
                    // ready cannot starve the window boundary.
                    tokio::select! {
                        biased;
                        _ = state.ticker.tick() => {
                            if let Some(value) = state.pending.take() {
                                return Some((Ok(value), state));
                            }
                        }
                        item = state.upstream.next() => match item {
                            Some(Ok(value)) => state.pending = Some(value),
                            Some(Err(error)) => {
                                state.done = true;
                                return Some((Err(error), state));
                            }
                            None => return None,
                        },
                    }
                }
            })
        })
    }
}
