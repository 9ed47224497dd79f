//! Shard document collector
//!
//! One collector instance performs one scan of one shard: it streams
//! matching documents - optionally sorted and limited - through a
//! downstream row consumer.
//!
//! # Scan contract (strict order)
//!
//! 1. Bind every column expression to the scan-global context
//! 2. Acquire the shard context, enter the searcher's main-query stage
//! 3. Stream documents: unordered scan, or sorted pages with
//!    search-after continuation
//! 4. Per document: check kill flag, check memory breaker, load stored
//!    fields if required, position expressions, deliver the row
//! 5. Exactly one terminal downstream call: `finish` or `fail`
//! 6. Release and close the shard context on every exit path
//!
//! # Invariants
//!
//! - `row_count <= limit` at every observable moment
//! - an ordered scan delivers a document at most once
//! - once killed, no further row reaches the downstream

mod driver;
mod errors;
mod guard;
mod paginator;
mod row;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::searcher::{OrderBy, Query};

pub use driver::DocCollector;
pub use errors::{CollectError, CollectResult};
pub use guard::ShardScanGuard;
pub use row::{InputRow, Row};

/// Default number of documents fetched per sorted page.
pub const DEFAULT_PAGE_SIZE: usize = 500;

/// Thread-safe, idempotent kill handle for a running scan.
///
/// The scan observes the flag once per document; killing surfaces as a
/// `Cancelled` failure, never as a silent finish.
#[derive(Debug, Clone, Default)]
pub struct KillSwitch {
    killed: Arc<AtomicBool>,
}

impl KillSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kill(&self) {
        self.killed.store(true, Ordering::Release);
    }

    pub fn is_killed(&self) -> bool {
        self.killed.load(Ordering::Acquire)
    }
}

/// The immutable parameters of one shard scan.
///
/// `limit`, when set, must be positive. The row schema is defined by
/// the expression set handed to the collector alongside this request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectRequest {
    /// Identifier of the distributed job this scan belongs to.
    pub job_id: Uuid,
    pub query: Query,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
    pub page_size: usize,
}

impl CollectRequest {
    pub fn new(job_id: Uuid, query: Query) -> Self {
        Self {
            job_id,
            query,
            order_by: None,
            limit: None,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by = Some(order_by);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }
}
