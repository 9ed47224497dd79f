//! Concrete column expressions
//!
//! The expression set a shard scan can reference:
//! - `ColumnExpression` - doc-values read of one column
//! - `SourceExpression` - the whole stored document
//! - `StoredFieldExpression` - one stored field, loaded via the visitor
//! - `DocIdExpression` - packed (job search context id, global doc id)
//! - `ScoreExpression` - relevance score (scorer or injected)
//! - `OrderByExpression` - sort-field value injected by sorted pages

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use serde_json::{json, Value};

use super::{
    CollectorContext, CollectorExpression, FieldsVisitor, OrderByCapability, ScoreCapability,
};
use crate::collector::CollectResult;
use crate::searcher::{DocId, Scorer, SegmentContext};

/// Doc-values read of one column from the current segment.
pub struct ColumnExpression {
    column: String,
    segment: Option<Arc<SegmentContext>>,
    value: Value,
}

impl ColumnExpression {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            segment: None,
            value: Value::Null,
        }
    }
}

impl CollectorExpression for ColumnExpression {
    fn start_collect(&mut self, _ctx: &CollectorContext) {}

    fn set_segment(&mut self, segment: &Arc<SegmentContext>) -> CollectResult<()> {
        self.segment = Some(Arc::clone(segment));
        Ok(())
    }

    fn set_next_doc(&mut self, doc: DocId) -> CollectResult<()> {
        self.value = match &self.segment {
            Some(segment) => segment.reader.doc_value(&self.column, doc),
            None => Value::Null,
        };
        Ok(())
    }

    fn value(&self) -> Value {
        self.value.clone()
    }
}

/// The whole stored document, read from the shared fields visitor.
pub struct SourceExpression {
    visitor: Option<Rc<RefCell<FieldsVisitor>>>,
}

impl SourceExpression {
    pub fn new() -> Self {
        Self { visitor: None }
    }
}

impl Default for SourceExpression {
    fn default() -> Self {
        Self::new()
    }
}

impl CollectorExpression for SourceExpression {
    fn start_collect(&mut self, ctx: &CollectorContext) {
        // source is loaded unconditionally by the visitor; the visitor
        // still has to be enabled for this scan
        ctx.visitor().borrow_mut().set_required(true);
        self.visitor = Some(Rc::clone(ctx.visitor()));
    }

    fn set_segment(&mut self, _segment: &Arc<SegmentContext>) -> CollectResult<()> {
        Ok(())
    }

    fn set_next_doc(&mut self, _doc: DocId) -> CollectResult<()> {
        Ok(())
    }

    fn value(&self) -> Value {
        match &self.visitor {
            Some(visitor) => visitor.borrow().source().cloned().unwrap_or(Value::Null),
            None => Value::Null,
        }
    }
}

/// One stored field, loaded through the fields visitor.
pub struct StoredFieldExpression {
    field: String,
    visitor: Option<Rc<RefCell<FieldsVisitor>>>,
}

impl StoredFieldExpression {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            visitor: None,
        }
    }
}

impl CollectorExpression for StoredFieldExpression {
    fn start_collect(&mut self, ctx: &CollectorContext) {
        ctx.visitor().borrow_mut().add_field(self.field.clone());
        self.visitor = Some(Rc::clone(ctx.visitor()));
    }

    fn set_segment(&mut self, _segment: &Arc<SegmentContext>) -> CollectResult<()> {
        Ok(())
    }

    fn set_next_doc(&mut self, _doc: DocId) -> CollectResult<()> {
        Ok(())
    }

    fn value(&self) -> Value {
        match &self.visitor {
            Some(visitor) => visitor
                .borrow()
                .field(&self.field)
                .cloned()
                .unwrap_or(Value::Null),
            None => Value::Null,
        }
    }
}

/// System column identifying a document for later fetch phases: the job
/// search context id packed with the global doc id.
pub struct DocIdExpression {
    job_search_context_id: i32,
    doc_base: u32,
    value: Value,
}

impl DocIdExpression {
    pub fn new() -> Self {
        Self {
            job_search_context_id: 0,
            doc_base: 0,
            value: Value::Null,
        }
    }
}

impl Default for DocIdExpression {
    fn default() -> Self {
        Self::new()
    }
}

impl CollectorExpression for DocIdExpression {
    fn start_collect(&mut self, ctx: &CollectorContext) {
        self.job_search_context_id = ctx.job_search_context_id();
    }

    fn set_segment(&mut self, segment: &Arc<SegmentContext>) -> CollectResult<()> {
        self.doc_base = segment.doc_base;
        Ok(())
    }

    fn set_next_doc(&mut self, doc: DocId) -> CollectResult<()> {
        let global = u64::from(self.doc_base) + u64::from(doc);
        let packed = (i64::from(self.job_search_context_id) << 32) | global as i64;
        self.value = json!(packed);
        Ok(())
    }

    fn value(&self) -> Value {
        self.value.clone()
    }
}

/// Relevance score of the current document.
///
/// In unordered scans the score comes from the segment scorer; sorted
/// pages inject the page score instead and never attach a scorer.
pub struct ScoreExpression {
    scorer: Option<Rc<dyn Scorer>>,
    score: f32,
}

impl ScoreExpression {
    pub fn new() -> Self {
        Self {
            scorer: None,
            score: 0.0,
        }
    }
}

impl Default for ScoreExpression {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoreCapability for ScoreExpression {
    fn set_score(&mut self, score: f32) {
        self.score = score;
    }
}

impl CollectorExpression for ScoreExpression {
    fn start_collect(&mut self, _ctx: &CollectorContext) {}

    fn set_segment(&mut self, _segment: &Arc<SegmentContext>) -> CollectResult<()> {
        Ok(())
    }

    fn set_scorer(&mut self, scorer: Rc<dyn Scorer>) {
        self.scorer = Some(scorer);
    }

    fn set_next_doc(&mut self, doc: DocId) -> CollectResult<()> {
        if let Some(scorer) = &self.scorer {
            self.score = scorer.score(doc);
        }
        Ok(())
    }

    fn value(&self) -> Value {
        json!(self.score)
    }

    fn score_capability(&mut self) -> Option<&mut dyn ScoreCapability> {
        Some(self)
    }
}

/// Sort column of an ordered scan.
///
/// The value is taken from the sort-field vector of the current page
/// document, not from the index; `index` selects the order-by column.
pub struct OrderByExpression {
    index: usize,
    value: Value,
}

impl OrderByExpression {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            value: Value::Null,
        }
    }
}

impl OrderByCapability for OrderByExpression {
    fn set_sort_fields(&mut self, fields: &[Value]) {
        self.value = fields.get(self.index).cloned().unwrap_or(Value::Null);
    }
}

impl CollectorExpression for OrderByExpression {
    fn start_collect(&mut self, _ctx: &CollectorContext) {}

    fn set_segment(&mut self, _segment: &Arc<SegmentContext>) -> CollectResult<()> {
        Ok(())
    }

    fn set_next_doc(&mut self, _doc: DocId) -> CollectResult<()> {
        Ok(())
    }

    fn value(&self) -> Value {
        self.value.clone()
    }

    fn order_by_capability(&mut self) -> Option<&mut dyn OrderByCapability> {
        Some(self)
    }
}
