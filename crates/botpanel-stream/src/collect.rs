//! Bounded fold.
//!
//! `stream.take(k).collect(seed, merge)` folds a finite prefix of a stream
//! into one aggregate: a fresh accumulator from `seed` per subscription,
//! `merge` applied in arrival order, and a single emission once the input
//! completes.  A failure discards the partial aggregate.

use botpanel_types::PanelError;
use futures_util::stream::{self, StreamExt};

use crate::stream::Stream;

impl<T: Send + 'static> Stream<T> {
    /// Fold every value into an accumulator and emit it once on completion.
    ///
    /// Applied to an unbounded stream this never emits; bound it with
    /// [`Stream::take`] first.
    pub fn collect<A, S, M>(self, seed: S, merge: M) -> Stream<A>
    where
        A: Send + 'static,
        S: Fn() -> A + Send + Sync + 'static,
        M: Fn(&mut A, T) + Send + Sync + 'static,
    {
        let seed = std::sync::Arc::new(seed);
        let merge = std::sync::Arc::new(merge);
        Stream::from_fn(move || {
            let mut upstream = self.open();
            let seed = std::sync::Arc::clone(&seed);
            let merge = std::sync::Arc::clone(&merge);
            stream::once(async move {
                let mut acc = seed();
                while let Some(item) = upstream.next().await {
                    merge(&mut acc, item?);
                }
                Ok::<A, PanelError>(acc)
            })
        })
    }
}
