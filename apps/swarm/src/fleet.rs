//! Fleet partitioning and the per-shard schedulers.

use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::session::{Session, TickContext};

/// Pause between consecutive session ticks within a shard. Throttles
/// aggregate load across the group rather than pacing whole passes.
pub const SESSION_SPACING: Duration = Duration::from_millis(20);

/// Split `total` sessions into contiguous index ranges, one per shard.
///
/// Every shard gets `total / shard_count` sessions and the final shard
/// absorbs the remainder, so it may be larger than the others. When fewer
/// sessions than shards exist, the effective shard count is capped at
/// `total` — no empty shards are ever produced.
pub fn partition(total: usize, shard_count: usize) -> Vec<Range<usize>> {
    let shards = shard_count.min(total);
    if shards == 0 {
        return Vec::new();
    }

    let per = total / shards;
    let mut ranges = Vec::with_capacity(shards);
    let mut start = 0;
    for shard in 0..shards {
        let end = if shard == shards - 1 {
            total
        } else {
            start + per
        };
        ranges.push(start..end);
        start = end;
    }
    ranges
}

/// All sessions, in ID-file order, each behind its own lock so a shard can
/// drive its range while the arena itself stays shared.
pub struct Fleet {
    sessions: Vec<AsyncMutex<Session>>,
    ctx: TickContext,
}

impl Fleet {
    pub fn new(
        device_ids: Vec<String>,
        reconnect_interval: Duration,
        dispatch_interval: Duration,
        ctx: TickContext,
    ) -> Self {
        let sessions = device_ids
            .into_iter()
            .map(|id| AsyncMutex::new(Session::new(id, reconnect_interval, dispatch_interval)))
            .collect();
        Self { sessions, ctx }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Start one scheduler per shard. Each owns its index range for the
    /// life of the process; there is no rebalancing and no shutdown path.
    pub fn spawn_schedulers(self: Arc<Self>, shard_count: usize) -> Vec<JoinHandle<()>> {
        partition(self.sessions.len(), shard_count)
            .into_iter()
            .enumerate()
            .map(|(shard, range)| {
                let fleet = self.clone();
                tokio::spawn(async move { fleet.run_shard(shard, range).await })
            })
            .collect()
    }

    async fn run_shard(&self, shard: usize, range: Range<usize>) {
        info!(shard, sessions = range.len(), "scheduler started");
        loop {
            for index in range.clone() {
                {
                    let mut session = self.sessions[index].lock().await;
                    if let Err(err) = session.tick(&self.ctx).await {
                        // One misbehaving session must not take down its shard.
                        error!(shard, device_id = %session.device_id(), error = %err, "tick failed");
                    }
                }
                tokio::time::sleep(SESSION_SPACING).await;
            }
        }
    }
}
