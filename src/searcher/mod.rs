//! Searcher abstraction over one inverted-index shard
//!
//! The collector consumes the index engine through the capabilities
//! defined here:
//! - `scan`: enumerate matching documents in unspecified order
//! - `top_k`: up to k documents globally sorted by a sort spec
//! - `search_after`: like `top_k`, starting strictly after a cursor
//!
//! Document ids are segment-local; a document is addressed globally as
//! `segment.doc_base + doc`.

pub mod query;

use std::rc::Rc;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::collector::CollectResult;
use crate::expr::FieldsVisitor;

pub use query::{compare_values, range_query, Query, RangeQuery};

/// Segment-local document id.
pub type DocId = u32;

/// Result type for searcher operations
pub type SearchResult<T> = Result<T, SearchError>;

/// Index-side failures surfaced to the collector.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SearchError {
    /// Index read or I/O failure
    #[error("index read failed: {0}")]
    Index(String),
}

/// Stages of a search context's lifecycle the collector participates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    MainQuery,
}

/// Per-document control flow returned by the collector.
///
/// `Stop` is graceful early termination, not an error; the searcher must
/// end the scan and return `Ok`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanFlow {
    Continue,
    Stop,
}

/// Produces relevance scores for documents of the current segment.
pub trait Scorer {
    fn score(&self, doc: DocId) -> f32;
}

/// Read access to one immutable index segment.
pub trait SegmentReader {
    /// Fetches the stored fields of one document into the visitor.
    fn document(&self, doc: DocId, visitor: &mut FieldsVisitor) -> SearchResult<()>;

    /// Doc-values read of one column; `Value::Null` when absent.
    fn doc_value(&self, column: &str, doc: DocId) -> Value;
}

/// One segment of the shard's index.
pub struct SegmentContext {
    /// Position of the segment in the shard's leaves enumeration.
    pub ord: usize,
    /// Global doc id of the segment's first document.
    pub doc_base: u32,
    pub reader: Arc<dyn SegmentReader>,
}

impl std::fmt::Debug for SegmentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentContext")
            .field("ord", &self.ord)
            .field("doc_base", &self.doc_base)
            .finish()
    }
}

/// One document of a sorted page: global doc id, score, and the values
/// of the sort columns.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDoc {
    pub doc: u32,
    pub score: f32,
    pub fields: Vec<Value>,
}

/// A sorted page returned by `top_k` / `search_after`.
#[derive(Debug, Clone, Default)]
pub struct TopDocs {
    pub docs: Vec<ScoredDoc>,
}

impl TopDocs {
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

/// A sort symbol: either a direct column reference or a computed value.
///
/// Only direct references participate in pagination exclusion filters;
/// a computed symbol cannot be turned into an index range query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SortSymbol {
    Reference { column: String },
    Computed { name: String },
}

impl SortSymbol {
    pub fn reference(column: impl Into<String>) -> Self {
        SortSymbol::Reference {
            column: column.into(),
        }
    }

    pub fn computed(name: impl Into<String>) -> Self {
        SortSymbol::Computed { name: name.into() }
    }
}

/// One `(symbol, reverse, nulls_first)` sort triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortKey {
    pub symbol: SortSymbol,
    pub reverse: bool,
    pub nulls_first: bool,
}

impl SortKey {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            symbol: SortSymbol::reference(column),
            reverse: false,
            nulls_first: false,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            symbol: SortSymbol::reference(column),
            reverse: true,
            nulls_first: false,
        }
    }

    pub fn nulls_first(mut self, nulls_first: bool) -> Self {
        self.nulls_first = nulls_first;
        self
    }
}

/// Sort specification of an ordered scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub keys: Vec<SortKey>,
}

impl OrderBy {
    pub fn new(keys: Vec<SortKey>) -> Self {
        Self { keys }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Callback surface the searcher pushes matching documents into.
///
/// `set_segment` and `set_scorer` are called before any document of the
/// corresponding segment is delivered.
pub trait SegmentCollector {
    fn set_segment(&mut self, segment: &Arc<SegmentContext>) -> CollectResult<()>;

    fn set_scorer(&mut self, scorer: Rc<dyn Scorer>);

    /// Delivers one matching document; the returned flow must be honored.
    fn collect(&mut self, doc: DocId) -> CollectResult<ScanFlow>;

    /// Whether the collector tolerates out-of-order document delivery.
    fn accepts_docs_out_of_order(&self) -> bool {
        false
    }
}

/// Search capabilities of one shard.
pub trait Searcher {
    /// The shard's segments in ascending `doc_base` order.
    fn segments(&self) -> Vec<Arc<SegmentContext>>;

    /// Enumerates matching documents through the collector.
    ///
    /// Delivery order is unspecified. `ScanFlow::Stop` ends the scan
    /// gracefully with `Ok(())`; collector errors are propagated.
    fn scan(&self, query: &Query, collector: &mut dyn SegmentCollector) -> CollectResult<()>;

    /// Up to `k` documents globally sorted by `sort`.
    fn top_k(&self, query: &Query, k: usize, sort: &OrderBy) -> SearchResult<TopDocs>;

    /// Like `top_k`, starting strictly after `cursor` in sort order.
    fn search_after(
        &self,
        cursor: &ScoredDoc,
        query: &Query,
        k: usize,
        sort: &OrderBy,
    ) -> SearchResult<TopDocs>;

    fn enter_stage(&self, stage: Stage);

    fn finish_stage(&self, stage: Stage);
}
