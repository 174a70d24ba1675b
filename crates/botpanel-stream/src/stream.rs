//! [`Stream`] – the cold, push-based sequence type.
//!
//! A `Stream<T>` is a recipe, not a running pipeline: it holds a shareable
//! factory that opens a fresh [`Flow`] every time somebody subscribes.
//! Nothing is produced before [`Stream::subscribe`] is called, and every
//! subscription gets its own upstream resources (transport receivers,
//! timers, caches), which are released when the subscription ends.
//!
//! A failure travels as the first `Err` item of a flow.  Every flow built by
//! this module stops right after its first failure, so downstream operators
//! never observe values after a terminal error.
//!
//! # Example
//!
//! ```rust
//! use botpanel_stream::Stream;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let doubled = Stream::iter(vec![1, 2, 3]).map(|v| v * 2).take(2);
//! let subscription = doubled.subscribe(|v| println!("{v}"));
//! subscription.join().await;
//! # }
//! ```

use std::sync::{Arc, Mutex};

use botpanel_types::PanelError;
use futures_util::future;
use futures_util::stream::{self, BoxStream, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tracing::warn;

use crate::subscription::{FnObserver, Observer, Subscription};

/// One opened, running instance of a [`Stream`].
pub type Flow<T> = BoxStream<'static, Result<T, PanelError>>;

/// An external push source that can be opened once per subscription.
///
/// Transport backends implement this to hand their topic feeds to the
/// stream engine without the engine knowing how the data arrives.
pub trait Source<T>: Send + Sync {
    /// Start delivery for one subscriber.
    fn open(&self) -> Flow<T>;
}

/// A typed, cold, composable sequence of `T` values.
///
/// Cloning a `Stream` clones the recipe; each subscription still opens its
/// own upstream.
pub struct Stream<T> {
    factory: Arc<dyn Fn() -> Flow<T> + Send + Sync>,
}

impl<T> Clone for Stream<T> {
    fn clone(&self) -> Self {
        Self {
            factory: Arc::clone(&self.factory),
        }
    }
}

impl<T> std::fmt::Debug for Stream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream").finish_non_exhaustive()
    }
}

impl<T: Send + 'static> Stream<T> {
    // -----------------------------------------------------------------------
    // Sources
    // -----------------------------------------------------------------------

    /// Wrap a factory of asynchronous sources.  `factory` runs once per
    /// subscription.
    pub fn from_fn<F, S>(factory: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: futures_util::Stream<Item = Result<T, PanelError>> + Send + 'static,
    {
        Self {
            factory: Arc::new(move || stop_after_failure(factory()).boxed()),
        }
    }

    /// Wrap a [`Source`] implementation.
    pub fn from_source<S>(source: S) -> Self
    where
        S: Source<T> + 'static,
    {
        let source = Arc::new(source);
        Self::from_fn(move || source.open())
    }

    /// Wrap a receiver that is already being fed by another task or thread.
    ///
    /// The receiver can only be handed out once: a second subscription fails
    /// with [`PanelError::Channel`].
    pub fn from_channel(receiver: mpsc::UnboundedReceiver<T>) -> Self {
        let slot = Arc::new(Mutex::new(Some(receiver)));
        Self::from_fn(move || -> Flow<T> {
            let taken = slot.lock().ok().and_then(|mut guard| guard.take());
            match taken {
                Some(receiver) => stream::unfold(receiver, |mut receiver| async move {
                    receiver.recv().await.map(|value| (Ok(value), receiver))
                })
                .boxed(),
                None => stream::once(future::ready(Err(PanelError::Channel(
                    "channel source already subscribed".to_string(),
                ))))
                .boxed(),
            }
        })
    }

    /// Every subscription opens its own receiver on `sender`.
    ///
    /// A subscriber that falls behind skips the dropped values and carries on
    /// with the newest ones; the stream completes when the channel closes.
    pub fn from_broadcast(sender: broadcast::Sender<T>) -> Self
    where
        T: Clone,
    {
        Self::from_fn(move || {
            stream::unfold(sender.subscribe(), |mut receiver| async move {
                loop {
                    match receiver.recv().await {
                        Ok(value) => return Some((Ok(value), receiver)),
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(lagged_by = n, "broadcast source lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            })
        })
    }

    /// A stream that emits `value` once and completes.
    pub fn just(value: T) -> Self
    where
        T: Clone + Sync,
    {
        Self::from_fn(move || stream::once(future::ready(Ok(value.clone()))))
    }

    /// A stream that emits every element of `values` and completes.
    pub fn iter<I>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Clone + Sync,
    {
        let values: Vec<T> = values.into_iter().collect();
        Self::from_fn(move || stream::iter(values.clone().into_iter().map(Ok)))
    }

    /// A stream that fails immediately with `error`.
    pub fn fail(error: PanelError) -> Self {
        Self::from_fn(move || stream::once(future::ready(Err(error.clone()))))
    }

    /// A stream that completes without emitting.
    pub fn empty() -> Self {
        Self::from_fn(|| stream::empty())
    }

    /// Open a new flow.  Usually only operators and [`Subscription`] need
    /// this; it must be polled inside a Tokio runtime.
    pub fn open(&self) -> Flow<T> {
        (self.factory)()
    }

    // -----------------------------------------------------------------------
    // Operators
    // -----------------------------------------------------------------------

    /// Transform every value.
    pub fn map<U, F>(self, f: F) -> Stream<U>
    where
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Stream::from_fn(move || {
            let f = Arc::clone(&f);
            self.open().map(move |item| item.map(|value| f(value)))
        })
    }

    /// Transform every value with a fallible function.  The first `Err`
    /// fails the stream.
    pub fn try_map<U, F>(self, f: F) -> Stream<U>
    where
        U: Send + 'static,
        F: Fn(T) -> Result<U, PanelError> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Stream::from_fn(move || {
            let f = Arc::clone(&f);
            self.open().map(move |item| item.and_then(|value| f(value)))
        })
    }

    /// Map every value to zero or one replacement.
    ///
    /// `Ok(Some(v))` forwards `v`, `Ok(None)` forwards nothing for that
    /// input, and `Err` fails the stream.
    pub fn flat_map<U, F>(self, f: F) -> Stream<U>
    where
        U: Send + 'static,
        F: Fn(T) -> Result<Option<U>, PanelError> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Stream::from_fn(move || {
            let f = Arc::clone(&f);
            self.open().filter_map(move |item| {
                future::ready(match item {
                    Ok(value) => f(value).transpose(),
                    Err(error) => Some(Err(error)),
                })
            })
        })
    }

    /// Forward the first `n` values, then complete and drop the upstream.
    pub fn take(self, n: usize) -> Stream<T> {
        Stream::from_fn(move || self.open().take(n))
    }

    // -----------------------------------------------------------------------
    // Terminal
    // -----------------------------------------------------------------------

    /// Start delivery, calling `on_next` for every value.
    ///
    /// Failures are logged through `tracing`; use [`Stream::subscribe_with`]
    /// to handle them.
    pub fn subscribe<F>(&self, on_next: F) -> Subscription
    where
        F: FnMut(T) + Send + 'static,
    {
        self.subscribe_with(FnObserver(on_next))
    }

    /// Start delivery to a full [`Observer`].
    pub fn subscribe_with<O>(&self, observer: O) -> Subscription
    where
        O: Observer<T>,
    {
        Subscription::spawn(self.clone(), observer)
    }
}

/// End the flow right after its first `Err` without polling `flow` again.
fn stop_after_failure<T, S>(flow: S) -> impl futures_util::Stream<Item = Result<T, PanelError>>
where
    T: Send + 'static,
    S: futures_util::Stream<Item = Result<T, PanelError>> + Send + 'static,
{
    stream::unfold(Some(flow.boxed()), |flow| async move {
        let mut flow = flow?;
        let item = flow.next().await?;
        let healthy = item.is_ok();
        Some((item, healthy.then_some(flow)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Seen, drain, record, settle};

    #[tokio::test(start_paused = true)]
    async fn nothing_is_opened_before_subscribe() {
        let opened = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&opened);
        let stream = Stream::from_fn(move || {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            stream::iter(vec![Ok(1)])
        })
        .map(|v| v + 1);

        settle().await;
        assert_eq!(opened.load(std::sync::atomic::Ordering::SeqCst), 0);

        let (sub, mut seen) = record(&stream);
        sub.join().await;
        assert_eq!(opened.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(drain(&mut seen), vec![Seen::Next(2), Seen::Complete]);
    }

    #[tokio::test(start_paused = true)]
    async fn map_preserves_arrival_order() {
        let (sub, mut seen) = record(&Stream::iter(vec![3, 1, 2]).map(|v| v * 10));
        sub.join().await;
        assert_eq!(
            drain(&mut seen),
            vec![Seen::Next(30), Seen::Next(10), Seen::Next(20), Seen::Complete]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn try_map_failure_terminates_stream() {
        let stream = Stream::iter(vec![1, 2, 3]).try_map(|v| {
            if v == 2 {
                Err(PanelError::Conversion("bad value".to_string()))
            } else {
                Ok(v)
            }
        });
        let (sub, mut seen) = record(&stream);
        sub.join().await;
        assert_eq!(
            drain(&mut seen),
            vec![
                Seen::Next(1),
                Seen::Error(PanelError::Conversion("bad value".to_string())),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn flat_map_skips_empty_results_and_fails_on_error() {
        let stream = Stream::iter(vec![1, 2, 3, 4]).flat_map(|v| match v {
            2 => Ok(None),
            4 => Err(PanelError::Conversion("unsupported".to_string())),
            other => Ok(Some(other * 100)),
        });
        let (sub, mut seen) = record(&stream);
        sub.join().await;
        assert_eq!(
            drain(&mut seen),
            vec![
                Seen::Next(100),
                Seen::Next(300),
                Seen::Error(PanelError::Conversion("unsupported".to_string())),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn take_completes_and_releases_upstream() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (sub, mut seen) = record(&Stream::from_channel(rx).take(2));

        for v in [1, 2, 3] {
            let _ = tx.send(v);
        }
        sub.join().await;

        assert_eq!(
            drain(&mut seen),
            vec![Seen::Next(1), Seen::Next(2), Seen::Complete]
        );
        assert!(tx.is_closed(), "take(n) must drop its upstream receiver");
    }

    #[tokio::test(start_paused = true)]
    async fn take_zero_completes_immediately() {
        let (sub, mut seen) = record(&Stream::iter(vec![1, 2]).take(0));
        sub.join().await;
        assert_eq!(drain(&mut seen), vec![Seen::Complete]);
    }

    #[tokio::test(start_paused = true)]
    async fn channel_source_rejects_second_subscriber() {
        let (_tx, rx) = mpsc::unbounded_channel::<i32>();
        let stream = Stream::from_channel(rx);
        let (_first, _) = record(&stream);
        settle().await;
        let (second, mut seen) = record(&stream);
        second.join().await;
        assert!(matches!(
            drain(&mut seen).as_slice(),
            [Seen::Error(PanelError::Channel(_))]
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn broadcast_source_is_cold_per_subscriber() {
        let (tx, _keepalive) = broadcast::channel(16);
        let stream = Stream::from_broadcast(tx.clone());

        let (_first, mut first_seen) = record(&stream);
        settle().await;
        let _ = tx.send(1);
        settle().await;

        let (_second, mut second_seen) = record(&stream);
        settle().await;
        let _ = tx.send(2);
        settle().await;

        assert_eq!(drain(&mut first_seen), vec![Seen::Next(1), Seen::Next(2)]);
        assert_eq!(drain(&mut second_seen), vec![Seen::Next(2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn fail_then_nothing() {
        let err = PanelError::Transport {
            topic: "/scan".to_string(),
            details: "disconnected".to_string(),
        };
        let (sub, mut seen) = record(&Stream::<i32>::fail(err.clone()));
        sub.join().await;
        assert_eq!(drain(&mut seen), vec![Seen::Error(err)]);
    }

    #[tokio::test(start_paused = true)]
    async fn values_after_a_failure_are_never_delivered() {
        let stream = Stream::from_fn(|| {
            stream::iter(vec![
                Ok(1),
                Err(PanelError::Channel("boom".to_string())),
                Ok(2),
            ])
        });
        let (sub, mut seen) = record(&stream);
        sub.join().await;
        assert_eq!(
            drain(&mut seen),
            vec![
                Seen::Next(1),
                Seen::Error(PanelError::Channel("boom".to_string())),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn opened_flow_ends_right_after_a_failure() {
        let (tx, rx) = mpsc::unbounded_channel::<i32>();
        let failing = Stream::from_channel(rx)
            .try_map(|_| Err::<i32, _>(PanelError::Conversion("bad".to_string())));
        let mut flow = failing.open();

        let _ = tx.send(1);
        assert_eq!(
            flow.next().await,
            Some(Err(PanelError::Conversion("bad".to_string())))
        );

        // `tx` is still alive, so only the failure can end the flow.
        let next = tokio::time::timeout(std::time::Duration::from_millis(500), flow.next()).await;
        assert!(matches!(next, Ok(None)), "flow kept waiting after its failure");
        assert!(tx.is_closed(), "failed flow must release its upstream");
    }
}
