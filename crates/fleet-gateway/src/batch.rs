//! Throttled batch execution
//!
//! Endpoint quotas cap how many devices may provision, connect, or send
//! at once, so fleet sweeps run in consecutive chunks with a barrier
//! after each: every op in a chunk completes before the next chunk
//! starts. A chunk that finishes faster than its minimum spacing is
//! followed by a cooldown sleep so the endpoint sees a bounded rate.

use std::future::Future;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Throttle bounds for one sweep.
#[derive(Debug, Clone, Copy)]
pub struct BatchPolicy {
    /// Maximum ops in flight at once
    pub limit: usize,
    /// A chunk faster than this triggers the cooldown
    pub min_spacing: Duration,
    /// Sleep inserted after a too-fast chunk
    pub cooldown: Duration,
}

impl BatchPolicy {
    /// Provisioning sweep: registration services throttle hard, so a
    /// fast chunk waits out the full second.
    pub fn provision(limit: usize) -> Self {
        Self {
            limit,
            min_spacing: Duration::from_secs(1),
            cooldown: Duration::from_secs(1),
        }
    }

    /// Connect sweep: brief pause between fast chunks.
    pub fn connect(limit: usize) -> Self {
        Self {
            limit,
            min_spacing: Duration::from_secs(1),
            cooldown: Duration::from_millis(250),
        }
    }

    /// Send sweep: the barrier alone is the throttle.
    pub fn send(limit: usize) -> Self {
        Self {
            limit,
            min_spacing: Duration::ZERO,
            cooldown: Duration::ZERO,
        }
    }
}

/// Run `op` over `items` in chunks of at most `policy.limit`, with a
/// completion barrier and optional cooldown between chunks. Returns the
/// results in input order; `ceil(N / limit)` chunks for N items.
/// Cancellation is honored between chunks, never mid-chunk.
pub async fn run_batched<T, F, Fut, R>(
    items: Vec<T>,
    policy: &BatchPolicy,
    cancel: &CancellationToken,
    mut op: F,
) -> Vec<R>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = R>,
{
    let limit = policy.limit.max(1);
    let mut results = Vec::with_capacity(items.len());
    let mut iter = items.into_iter().peekable();

    while iter.peek().is_some() {
        if cancel.is_cancelled() {
            break;
        }

        let chunk: Vec<T> = iter.by_ref().take(limit).collect();
        let chunk_len = chunk.len();
        let started = Instant::now();
        results.extend(join_all(chunk.into_iter().map(&mut op)).await);
        let elapsed = started.elapsed();
        debug!(chunk_len, elapsed_ms = elapsed.as_millis() as u64, "chunk complete");

        // cooldown only between chunks
        if iter.peek().is_some() && elapsed < policy.min_spacing && !policy.cooldown.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(policy.cooldown) => {}
            }
        }
    }

    results
}
