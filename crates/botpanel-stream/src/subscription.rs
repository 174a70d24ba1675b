//! [`Subscription`] – the live link between a [`Stream`] and its consumer.
//!
//! Subscribing spawns one Tokio task that opens the stream and feeds every
//! value to an [`Observer`], in order, never concurrently with itself.
//! Cancelling the subscription (explicitly or by dropping it) aborts that
//! task, which drops the opened flow and with it every upstream timer,
//! cache and transport receiver created for this subscription.

use botpanel_types::PanelError;
use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::stream::Stream;

/// Consumer side of a subscription.
///
/// Exactly one of [`Observer::on_error`] or [`Observer::on_complete`] is
/// called when the stream terminates on its own; neither is called after a
/// cancellation.
pub trait Observer<T>: Send + 'static {
    /// Called once per value, in delivery order.
    fn on_next(&mut self, value: T);

    /// Called once when the stream fails.  The default logs the error.
    fn on_error(&mut self, error: PanelError) {
        warn!(error = %error, "stream terminated with a failure");
    }

    /// Called once when the stream completes.
    fn on_complete(&mut self) {}
}

/// Adapts a plain `FnMut(T)` callback into an [`Observer`].
pub(crate) struct FnObserver<F>(pub(crate) F);

impl<T, F> Observer<T> for FnObserver<F>
where
    F: FnMut(T) + Send + 'static,
{
    fn on_next(&mut self, value: T) {
        (self.0)(value)
    }
}

/// Handle to a running delivery task.
///
/// Dropping the handle cancels delivery; call [`Subscription::detach`] to let
/// it run unattended instead.
#[derive(Debug)]
pub struct Subscription {
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    pub(crate) fn spawn<T, O>(stream: Stream<T>, mut observer: O) -> Self
    where
        T: Send + 'static,
        O: Observer<T>,
    {
        let handle = tokio::spawn(async move {
            let mut flow = stream.open();
            while let Some(item) = flow.next().await {
                match item {
                    Ok(value) => observer.on_next(value),
                    Err(error) => {
                        observer.on_error(error);
                        return;
                    }
                }
            }
            observer.on_complete();
        });
        Self {
            handle: Some(handle),
        }
    }

    /// `true` while the stream is still delivering.
    pub fn is_active(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop delivery.  Upstream resources are released the next time the
    /// runtime gets to the task; use [`Subscription::shutdown`] to wait for
    /// that.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Stop delivery and wait until every upstream resource has been dropped.
    pub async fn shutdown(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
    }

    /// Wait for the stream to complete or fail on its own.
    pub async fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    /// Let delivery continue after this handle is dropped.
    pub fn detach(mut self) {
        self.handle.take();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}
