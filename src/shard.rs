//! Shard context
//!
//! The shard's search context is exclusively owned by a scan from
//! acquisition to release. The collector acquires it exactly once,
//! scans through the searcher it exposes, and releases and closes it
//! exactly once on every exit path.

use std::sync::Arc;

use crate::searcher::Searcher;

/// One shard's search context as seen by a collector.
pub trait ShardContext {
    /// The searcher over this shard's index.
    fn searcher(&self) -> Arc<dyn Searcher>;

    fn acquire_context(&self);

    fn release_context(&self);

    fn close(&self);

    /// Identifier of this search context within the distributed job,
    /// carried into doc-id system columns for later fetch phases.
    fn job_search_context_id(&self) -> i32;
}
