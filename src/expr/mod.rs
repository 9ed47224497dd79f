//! Column expressions
//!
//! A column expression binds one column of the row schema to a
//! mechanism that, positioned on a `(segment, doc)` pair, yields a typed
//! value. The collector drives every expression through the same
//! lifecycle:
//!
//! 1. `start_collect` - bind to the scan-global context
//! 2. `set_segment` - rebind on every segment transition
//! 3. `set_next_doc` - position on a document
//! 4. `value` - read the positioned value
//!
//! Two capability variants extend the base contract: score expressions
//! accept an injected score, order-by expressions accept the sort-field
//! values of the current sorted page. Capabilities are probed through
//! the variant accessors, not through downcasting.

mod expressions;
mod visitor;

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use serde_json::Value;

use crate::collector::CollectResult;
use crate::searcher::{DocId, Scorer, SegmentContext};

pub use expressions::{
    ColumnExpression, DocIdExpression, OrderByExpression, ScoreExpression, SourceExpression,
    StoredFieldExpression,
};
pub use visitor::{FieldsVisitor, SOURCE_FIELD};

/// Scan-global context handed to every expression at scan start.
#[derive(Clone)]
pub struct CollectorContext {
    visitor: Rc<RefCell<FieldsVisitor>>,
    job_search_context_id: i32,
}

impl CollectorContext {
    pub fn new(visitor: Rc<RefCell<FieldsVisitor>>, job_search_context_id: i32) -> Self {
        Self {
            visitor,
            job_search_context_id,
        }
    }

    /// The shared stored-field visitor of the scan.
    pub fn visitor(&self) -> &Rc<RefCell<FieldsVisitor>> {
        &self.visitor
    }

    /// Identifier of the shard's search context within the job.
    pub fn job_search_context_id(&self) -> i32 {
        self.job_search_context_id
    }
}

/// Score capability: the paginator injects the page score before
/// positioning the expression on the document.
pub trait ScoreCapability {
    fn set_score(&mut self, score: f32);
}

/// Order-by capability: the paginator injects the sort-field values of
/// the current page document; `value()` then reads the injected vector
/// instead of the index.
pub trait OrderByCapability {
    fn set_sort_fields(&mut self, fields: &[Value]);
}

/// One column of the row schema.
pub trait CollectorExpression {
    /// Binds to the scan-global context; stored-field requirements are
    /// registered here.
    fn start_collect(&mut self, ctx: &CollectorContext);

    /// Rebinds to a new segment; called before any `set_next_doc` of
    /// that segment.
    fn set_segment(&mut self, segment: &Arc<SegmentContext>) -> CollectResult<()>;

    /// Attaches the scorer of the current segment.
    fn set_scorer(&mut self, _scorer: Rc<dyn Scorer>) {}

    /// Positions the expression on a document of the current segment.
    fn set_next_doc(&mut self, doc: DocId) -> CollectResult<()>;

    /// The value at the current position.
    fn value(&self) -> Value;

    /// Score capability of this expression, if any.
    fn score_capability(&mut self) -> Option<&mut dyn ScoreCapability> {
        None
    }

    /// Order-by capability of this expression, if any.
    fn order_by_capability(&mut self) -> Option<&mut dyn OrderByCapability> {
        None
    }
}
