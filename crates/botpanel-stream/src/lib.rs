//! `botpanel-stream` – The Stream Engine
//!
//! Push-based, cold sequences with the handful of operators the control
//! panel needs to fuse independently clocked sensor feeds.
//!
//! # Modules
//!
//! - [`stream`] – [`Stream`][stream::Stream]: the composable sequence type
//!   plus the per-value operators (`map`, `try_map`, `flat_map`, `take`).
//! - [`subscription`] – [`Subscription`][subscription::Subscription] and the
//!   [`Observer`][subscription::Observer] callback trait.  Subscribing is the
//!   only place delivery begins.
//! - [`sample`] – time-gated backpressure: forwards only the latest value
//!   per window.
//! - [`combine`] – combine-latest join over two heterogeneous or N
//!   homogeneous inputs.
//! - [`collect`] – bounded fold of a prefix into a single aggregate.
//! - [`interval`] – periodic tick generator.
//!
//! Every subscription runs on its own Tokio task, so `subscribe` must be
//! called from within a Tokio runtime.

pub mod collect;
pub mod combine;
pub mod interval;
pub mod sample;
pub mod stream;
pub mod subscription;

#[cfg(test)]
mod testing;

pub use combine::{combine_latest, combine_latest_all};
pub use interval::interval;
pub use stream::{Flow, Source, Stream};
pub use subscription::{Observer, Subscription};
