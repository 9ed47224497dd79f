//! Shard scan lifecycle guard
//!
//! Scoped acquisition of the shard context and the searcher's
//! main-query stage. Release runs on every exit path, including panics,
//! in a fixed order: finish the searcher stage first so its per-stage
//! buffers are flushed, then release and close the shard context.

use std::sync::Arc;

use crate::searcher::{Searcher, Stage};
use crate::shard::ShardContext;

/// Holds the shard context and searcher stage for the duration of one
/// scan. Dropping the guard performs the two-step release exactly once.
pub struct ShardScanGuard {
    shard: Arc<dyn ShardContext>,
    searcher: Arc<dyn Searcher>,
}

impl ShardScanGuard {
    pub fn acquire(shard: Arc<dyn ShardContext>, searcher: Arc<dyn Searcher>) -> Self {
        shard.acquire_context();
        searcher.enter_stage(Stage::MainQuery);
        Self { shard, searcher }
    }
}

impl Drop for ShardScanGuard {
    fn drop(&mut self) {
        self.searcher.finish_stage(Stage::MainQuery);
        self.shard.release_context();
        self.shard.close();
    }
}
