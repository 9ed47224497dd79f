//! Downstream row sink
//!
//! The opaque consumer of collected rows. The collector delivers rows
//! synchronously and honors the consumer's per-row backpressure answer;
//! exactly one terminal call - `finish` or `fail` - ends every scan.

use thiserror::Error;

use crate::collector::{CollectError, Row};

/// Result type for downstream operations
pub type DownstreamResult<T> = Result<T, DownstreamError>;

/// Failures raised by the downstream consumer while accepting a row.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DownstreamError {
    /// The consumer is no longer accepting rows.
    #[error("downstream consumer is closed")]
    Closed,

    /// The consumer failed processing a row.
    #[error("downstream consumer failed: {0}")]
    Consumer(String),
}

/// Row sink fed by one shard collector.
pub trait RowDownstream {
    /// Accepts one row; `Ok(true)` requests more rows, `Ok(false)`
    /// requests graceful termination.
    fn deliver_row(&mut self, row: &dyn Row) -> DownstreamResult<bool>;

    /// The scan completed; no more rows will follow.
    fn finish(&mut self);

    /// The scan failed; no more rows will follow.
    fn fail(&mut self, error: CollectError);
}
