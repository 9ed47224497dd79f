//! Collector error types
//!
//! Every terminal failure of a shard scan is one of these kinds; the
//! first error ends the scan and is carried to the downstream's `fail`.
//! Early termination (limit reached, downstream satisfied) is control
//! flow, not an error - see `ScanFlow::Stop`.

use thiserror::Error;

use crate::breaker::RamAccounting;
use crate::downstream::DownstreamError;
use crate::searcher::SearchError;

/// Result type for collector operations
pub type CollectResult<T> = Result<T, CollectError>;

/// Terminal failures of a shard scan.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CollectError {
    /// The scan was killed externally.
    #[error("collect operation was cancelled")]
    Cancelled,

    /// The query's memory accounting context tripped its breaker.
    #[error("data for [{context_id}] would exceed the breaker limit of [{limit}] bytes")]
    BreakerTripped { context_id: String, limit: u64 },

    /// Index read failure.
    #[error(transparent)]
    Index(#[from] SearchError),

    /// The downstream consumer failed while accepting a row.
    #[error(transparent)]
    Downstream(#[from] DownstreamError),
}

impl CollectError {
    /// Builds the breaker error for a tripped accounting context.
    pub fn breaker_tripped(ram: &dyn RamAccounting) -> Self {
        CollectError::BreakerTripped {
            context_id: ram.context_id(),
            limit: ram.limit(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, CollectError::Cancelled)
    }
}
