//! Shared helpers for the operator tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use botpanel_types::PanelError;
use futures_util::StreamExt;
use tokio::sync::mpsc;

use crate::stream::Stream;
use crate::subscription::{Observer, Subscription};

/// Everything an observer can be told, in order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Seen<T> {
    Next(T),
    Error(PanelError),
    Complete,
}

struct Recorder<T> {
    tx: mpsc::UnboundedSender<Seen<T>>,
}

impl<T: Send + 'static> Observer<T> for Recorder<T> {
    fn on_next(&mut self, value: T) {
        let _ = self.tx.send(Seen::Next(value));
    }

    fn on_error(&mut self, error: PanelError) {
        let _ = self.tx.send(Seen::Error(error));
    }

    fn on_complete(&mut self) {
        let _ = self.tx.send(Seen::Complete);
    }
}

pub(crate) fn record<T: Send + 'static>(
    stream: &Stream<T>,
) -> (Subscription, mpsc::UnboundedReceiver<Seen<T>>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (stream.subscribe_with(Recorder { tx }), rx)
}

pub(crate) fn drain<T>(seen: &mut mpsc::UnboundedReceiver<Seen<T>>) -> Vec<Seen<T>> {
    let mut out = Vec::new();
    while let Ok(event) = seen.try_recv() {
        out.push(event);
    }
    out
}

/// Let every runnable task run until the runtime is idle.  Requires a
/// paused clock.
pub(crate) async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Wrap `stream` so that `dropped` flips once an opened flow is released.
pub(crate) fn probed<T: Send + 'static>(stream: Stream<T>, dropped: Arc<AtomicBool>) -> Stream<T> {
    Stream::from_fn(move || {
        let guard = DropFlag(Arc::clone(&dropped));
        stream.open().map(move |item| {
            let _ = &guard;
            item
        })
    })
}
