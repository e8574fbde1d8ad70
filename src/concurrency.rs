//! Concurrency-bounded fan-out for independent pipeline units.
//!
//! Both fan-out points in the pipeline (chunks of one page, pages of one
//! crawl) go through these helpers. Units are expected to catch their own
//! failures and return them as values; an `Err` output is just another
//! result and never cancels or blocks siblings.

use std::future::Future;

use futures_util::Stream;
use futures_util::stream::{self, StreamExt};

/// Default ceiling on in-flight units.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Drives `units` with at most `limit` in flight, yielding outputs in
/// submission order regardless of completion order.
///
/// Exposed as a stream so a caller can act between unit completions (the
/// orchestrator checkpoints its progress log this way).
pub fn bounded<I, F, T>(units: I, limit: usize) -> impl Stream<Item = T>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = T>,
{
    stream::iter(units).buffered(limit.max(1))
}

/// Runs `units` to completion with at most `limit` in flight and collects
/// every output, in submission order.
pub async fn run_bounded<I, F, T>(units: I, limit: usize) -> Vec<T>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = T>,
{
    bounded(units, limit).collect().await
}
