//! Combine-latest join.
//!
//! The joined stream keeps the most recent value of every input.  Until each
//! input has produced at least once it stays silent; afterwards every new
//! arrival on any input emits `combine(latest...)`, in arrival order.
//!
//! Termination follows the first input to finish: when any input completes
//! the joined stream completes, and when any input fails the failure is
//! forwarded and the joined stream ends.  In both cases every other input is
//! dropped with the flow, which releases its timers and receivers.
//!
//! The latest-value cache lives inside the flow and is only touched by the
//! subscription task, so no lock is needed.

use std::sync::Arc;

use botpanel_types::PanelError;
use futures_util::future;
use futures_util::stream::{self, StreamExt};

use crate::stream::Stream;

enum Arrival<A, B> {
    Left(A),
    Right(B),
}

struct LatestPair<A, B> {
    left: Option<A>,
    right: Option<B>,
}

struct LatestSlots<T> {
    slots: Vec<Option<T>>,
    filled: usize,
}

/// Append an end marker to a tagged flow so the merged stream can tell
/// "this input completed" apart from "the merge completed".
fn with_end_marker<S, V>(flow: S) -> impl futures_util::Stream<Item = Option<V>> + Send
where
    S: futures_util::Stream<Item = V> + Send,
    V: Send,
{
    flow.map(Some).chain(stream::once(future::ready(None)))
}

/// Cut a merged stream at the first end marker from any input.
fn first_completion<S, V>(merged: S) -> impl futures_util::Stream<Item = V> + Send
where
    S: futures_util::Stream<Item = Option<V>> + Send,
    V: Send,
{
    merged
        .take_while(|marker| future::ready(marker.is_some()))
        .filter_map(future::ready)
}

/// Join two heterogeneous streams on their latest values.
pub fn combine_latest<A, B, R, F>(left: Stream<A>, right: Stream<B>, combine: F) -> Stream<R>
where
    A: Send + 'static,
    B: Send + 'static,
    R: Send + 'static,
    F: Fn(&A, &B) -> R + Send + Sync + 'static,
{
    let combine = Arc::new(combine);
    Stream::from_fn(move || {
        let combine = Arc::clone(&combine);
        let lefts = with_end_marker(
            left.open()
                .map(|item| item.map(Arrival::<A, B>::Left)),
        );
        let rights = with_end_marker(
            right
                .open()
                .map(|item| item.map(Arrival::<A, B>::Right)),
        );
        let latest = LatestPair {
            left: None,
            right: None,
        };

        first_completion(stream::select(lefts, rights))
            .scan(latest, move |latest, item| {
                let out = match item {
                    Ok(Arrival::Left(value)) => {
                        latest.left = Some(value);
                        latest.emit(combine.as_ref())
                    }
                    Ok(Arrival::Right(value)) => {
                        latest.right = Some(value);
                        latest.emit(combine.as_ref())
                    }
                    Err(error) => Some(Err(error)),
                };
                future::ready(Some(out))
            })
            .filter_map(future::ready)
    })
}

impl<A, B> LatestPair<A, B> {
    fn emit<R>(&self, combine: &dyn Fn(&A, &B) -> R) -> Option<Result<R, PanelError>> {
        match (&self.left, &self.right) {
            (Some(left), Some(right)) => Some(Ok(combine(left, right))),
            _ => None,
        }
    }
}

/// Join any number of homogeneous streams, emitting a snapshot of every
/// input's latest value in input order.
///
/// An empty input list completes immediately.
pub fn combine_latest_all<T>(inputs: Vec<Stream<T>>) -> Stream<Vec<T>>
where
    T: Clone + Send + 'static,
{
    if inputs.is_empty() {
        return Stream::empty();
    }

    Stream::from_fn(move || {
        let tagged = inputs.iter().enumerate().map(|(index, input)| {
            with_end_marker(input.open().map(move |item| item.map(|value| (index, value)))).boxed()
        });
        let latest = LatestSlots {
            slots: vec![None; inputs.len()],
            filled: 0,
        };

        first_completion(stream::select_all(tagged))
            .scan(latest, |latest, item| {
                let out = match item {
                    Ok((index, value)) => latest.update(index, value),
                    Err(error) => Some(Err(error)),
                };
                future::ready(Some(out))
            })
            .filter_map(future::ready)
    })
}

impl<T: Clone> LatestSlots<T> {
    fn update(&mut self, index: usize, value: T) -> Option<Result<Vec<T>, PanelError>> {
        let slot = &mut self.slots[index];
        if slot.is_none() {
            self.filled += 1;
        }
        *slot = Some(value);

        (self.filled == self.slots.len())
            .then(|| Ok(self.slots.iter().flatten().cloned().collect()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::*;
    use crate::testing::{Seen, drain, probed, record, settle};

    #[tokio::test(start_paused = true)]
    async fn silent_until_every_input_has_a_value() {
        let (ltx, lrx) = mpsc::unbounded_channel();
        let (rtx, rrx) = mpsc::unbounded_channel();
        let joined = combine_latest(Stream::from_channel(lrx), Stream::from_channel(rrx), |l: &i32, r: &&str| {
            format!("{l}{r}")
        });
        let (_sub, mut seen) = record(&joined);
        settle().await;

        let _ = ltx.send(1);
        let _ = ltx.send(2);
        settle().await;
        assert!(drain(&mut seen).is_empty());

        let _ = rtx.send("a");
        settle().await;
        let _ = ltx.send(3);
        settle().await;
        let _ = rtx.send("b");
        settle().await;

        assert_eq!(
            drain(&mut seen),
            vec![
                Seen::Next("2a".to_string()),
                Seen::Next("3a".to_string()),
                Seen::Next("3b".to_string()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn completes_when_first_input_completes() {
        let (ltx, lrx) = mpsc::unbounded_channel::<i32>();
        let (rtx, rrx) = mpsc::unbounded_channel::<i32>();
        let joined = combine_latest(Stream::from_channel(lrx), Stream::from_channel(rrx), |l, r| l + r);
        let (sub, mut seen) = record(&joined);
        settle().await;

        let _ = ltx.send(1);
        let _ = rtx.send(10);
        settle().await;
        drop(ltx);
        sub.join().await;

        assert_eq!(drain(&mut seen), vec![Seen::Next(11), Seen::Complete]);
        assert!(rtx.is_closed(), "surviving input must be released");
    }

    #[tokio::test(start_paused = true)]
    async fn input_failure_tears_the_join_down() {
        let (ltx, lrx) = mpsc::unbounded_channel::<i32>();
        let (rtx, rrx) = mpsc::unbounded_channel::<i32>();
        let left = Stream::from_channel(lrx).try_map(|v| {
            if v < 0 {
                Err(PanelError::Conversion("negative reading".to_string()))
            } else {
                Ok(v)
            }
        });
        let joined = combine_latest(left, Stream::from_channel(rrx), |l, r| l * r);
        let (sub, mut seen) = record(&joined);
        settle().await;

        let _ = ltx.send(2);
        let _ = rtx.send(3);
        settle().await;
        let _ = ltx.send(-1);
        sub.join().await;

        assert_eq!(
            drain(&mut seen),
            vec![
                Seen::Next(6),
                Seen::Error(PanelError::Conversion("negative reading".to_string())),
            ]
        );
        assert!(rtx.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn n_ary_join_snapshots_in_input_order() {
        let (txs, streams): (Vec<_>, Vec<_>) = (0..3)
            .map(|_| {
                let (tx, rx) = mpsc::unbounded_channel::<u8>();
                (tx, Stream::from_channel(rx))
            })
            .unzip();
        let (_sub, mut seen) = record(&combine_latest_all(streams));
        settle().await;

        let _ = txs[2].send(30);
        let _ = txs[0].send(10);
        settle().await;
        assert!(drain(&mut seen).is_empty());

        let _ = txs[1].send(20);
        settle().await;
        let _ = txs[0].send(11);
        settle().await;

        assert_eq!(
            drain(&mut seen),
            vec![Seen::Next(vec![10, 20, 30]), Seen::Next(vec![11, 20, 30])]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn n_ary_join_of_nothing_completes() {
        let (sub, mut seen) = record(&combine_latest_all(Vec::<Stream<u8>>::new()));
        sub.join().await;
        assert_eq!(drain(&mut seen), vec![Seen::Complete]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_releases_sampled_inputs() {
        const WINDOW: Duration = Duration::from_millis(100);
        let (ltx, lrx) = mpsc::unbounded_channel::<i32>();
        let (rtx, rrx) = mpsc::unbounded_channel::<i32>();
        let left_dropped = Arc::new(AtomicBool::new(false));
        let right_dropped = Arc::new(AtomicBool::new(false));

        let left = probed(Stream::from_channel(lrx).sample(WINDOW), Arc::clone(&left_dropped));
        let right = probed(Stream::from_channel(rrx).sample(WINDOW), Arc::clone(&right_dropped));
        let (sub, mut seen) = record(&combine_latest(left, right, |l, r| l + r));
        settle().await;

        let _ = ltx.send(1);
        let _ = rtx.send(2);
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(drain(&mut seen), vec![Seen::Next(3)]);

        sub.shutdown().await;
        assert!(left_dropped.load(Ordering::SeqCst));
        assert!(right_dropped.load(Ordering::SeqCst));
        assert!(ltx.is_closed());
        assert!(rtx.is_closed());

        let _ = ltx.send(5);
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(drain(&mut seen).is_empty());
    }
}
