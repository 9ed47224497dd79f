//! Collector driver
//!
//! Orchestrates one shard scan: wires the column expressions to the
//! searcher's segments, enforces the limit, observes the kill flag and
//! the memory breaker once per document, forwards rows downstream and
//! honors the consumer's backpressure.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use tracing::{debug, trace};
use uuid::Uuid;

use super::errors::{CollectError, CollectResult};
use super::guard::ShardScanGuard;
use super::row::InputRow;
use super::{CollectRequest, KillSwitch};
use crate::breaker::RamAccounting;
use crate::downstream::RowDownstream;
use crate::expr::{CollectorContext, CollectorExpression, FieldsVisitor};
use crate::searcher::{
    DocId, OrderBy, Query, ScanFlow, Scorer, SearchError, Searcher, SegmentCollector,
    SegmentContext,
};
use crate::shard::ShardContext;

pub(crate) const TARGET: &str = "shardscan::collect";

/// Collects the documents of one shard matching a query-plan fragment.
///
/// A collector performs exactly one scan; after `do_collect` returns,
/// the instance is terminal and only the state accessors remain useful.
pub struct DocCollector<D: RowDownstream> {
    shard: Arc<dyn ShardContext>,
    searcher: Arc<dyn Searcher>,
    ram: Option<Arc<dyn RamAccounting>>,
    downstream: D,
    job_id: Uuid,
    query: Query,
    order_by: Option<OrderBy>,
    limit: Option<usize>,
    page_size: usize,
    killed: KillSwitch,
    visitor: Rc<RefCell<FieldsVisitor>>,
    visitor_enabled: bool,
    expressions: Vec<Box<dyn CollectorExpression>>,
    order_by_indices: Vec<usize>,
    score_indices: Vec<usize>,
    current_segment: Option<Arc<SegmentContext>>,
    row_count: usize,
    produced_rows: bool,
    failed: bool,
}

impl<D: RowDownstream> DocCollector<D> {
    pub fn new(
        request: CollectRequest,
        mut expressions: Vec<Box<dyn CollectorExpression>>,
        shard: Arc<dyn ShardContext>,
        ram: Option<Arc<dyn RamAccounting>>,
        downstream: D,
    ) -> Self {
        let mut order_by_indices = Vec::new();
        let mut score_indices = Vec::new();
        for (i, expr) in expressions.iter_mut().enumerate() {
            if expr.order_by_capability().is_some() {
                order_by_indices.push(i);
            }
            if expr.score_capability().is_some() {
                score_indices.push(i);
            }
        }
        let searcher = shard.searcher();
        Self {
            shard,
            searcher,
            ram,
            downstream,
            job_id: request.job_id,
            query: request.query,
            order_by: request.order_by,
            limit: request.limit,
            page_size: request.page_size,
            killed: KillSwitch::new(),
            visitor: Rc::new(RefCell::new(FieldsVisitor::new())),
            visitor_enabled: false,
            expressions,
            order_by_indices,
            score_indices,
            current_segment: None,
            row_count: 0,
            produced_rows: false,
            failed: false,
        }
    }

    /// The kill handle for this scan; killing is idempotent and safe
    /// from any thread.
    pub fn kill_switch(&self) -> KillSwitch {
        self.killed.clone()
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Whether at least one row was delivered downstream.
    pub fn produced_rows(&self) -> bool {
        self.produced_rows
    }

    /// Whether the scan ended on the error path.
    pub fn failed(&self) -> bool {
        self.failed
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size;
    }

    /// Runs the scan to completion.
    ///
    /// Every outcome is reported through the downstream: `finish` on
    /// normal completion and early stops, `fail` on the first error.
    /// The shard context is released on every exit path.
    pub fn do_collect(&mut self) {
        trace!(target: TARGET, job_id = %self.job_id, "starting shard collect");
        let ctx = CollectorContext::new(
            Rc::clone(&self.visitor),
            self.shard.job_search_context_id(),
        );
        for expr in &mut self.expressions {
            expr.start_collect(&ctx);
        }
        self.visitor_enabled = self.visitor.borrow().required();

        let _guard = ShardScanGuard::acquire(Arc::clone(&self.shard), Arc::clone(&self.searcher));
        match self.run_scan() {
            Ok(()) => {
                trace!(
                    target: TARGET,
                    job_id = %self.job_id,
                    rows = self.row_count,
                    "shard collect finished"
                );
                self.downstream.finish();
            }
            Err(error) => {
                debug!(
                    target: TARGET,
                    job_id = %self.job_id,
                    rows = self.row_count,
                    %error,
                    "shard collect failed"
                );
                self.failed = true;
                self.downstream.fail(error);
            }
        }
    }

    fn run_scan(&mut self) -> CollectResult<()> {
        match self.order_by.clone() {
            Some(order_by) => self.collect_ordered(&order_by),
            None => {
                let searcher = Arc::clone(&self.searcher);
                let query = self.query.clone();
                searcher.scan(&query, self)
            }
        }
    }

    pub(super) fn searcher(&self) -> Arc<dyn Searcher> {
        Arc::clone(&self.searcher)
    }

    pub(super) fn query(&self) -> &Query {
        &self.query
    }

    pub(super) fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub(super) fn page_size(&self) -> usize {
        self.page_size
    }

    pub(super) fn is_killed(&self) -> bool {
        self.killed.is_killed()
    }

    pub(super) fn inject_sort_fields(&mut self, fields: &[serde_json::Value], score: f32) {
        for &i in &self.order_by_indices {
            if let Some(cap) = self.expressions[i].order_by_capability() {
                cap.set_sort_fields(fields);
            }
        }
        for &i in &self.score_indices {
            if let Some(cap) = self.expressions[i].score_capability() {
                cap.set_score(score);
            }
        }
    }
}

impl<D: RowDownstream> SegmentCollector for DocCollector<D> {
    fn set_segment(&mut self, segment: &Arc<SegmentContext>) -> CollectResult<()> {
        self.current_segment = Some(Arc::clone(segment));
        for expr in &mut self.expressions {
            expr.set_segment(segment)?;
        }
        Ok(())
    }

    fn set_scorer(&mut self, scorer: Rc<dyn Scorer>) {
        for expr in &mut self.expressions {
            expr.set_scorer(Rc::clone(&scorer));
        }
    }

    fn collect(&mut self, doc: DocId) -> CollectResult<ScanFlow> {
        if self.killed.is_killed() {
            return Err(CollectError::Cancelled);
        }
        if let Some(ram) = &self.ram {
            if ram.tripped() {
                return Err(CollectError::breaker_tripped(ram.as_ref()));
            }
        }

        self.row_count += 1;
        self.produced_rows = true;

        if self.visitor_enabled {
            let segment = self.current_segment.as_ref().ok_or_else(|| {
                SearchError::Index("document delivered before any segment".to_string())
            })?;
            let mut visitor = self.visitor.borrow_mut();
            visitor.reset();
            segment.reader.document(doc, &mut visitor)?;
        }
        for expr in &mut self.expressions {
            expr.set_next_doc(doc)?;
        }

        let row = InputRow::new(&self.expressions);
        let want_more = self.downstream.deliver_row(&row)?;
        if !want_more || self.limit.is_some_and(|limit| self.row_count == limit) {
            trace!(target: TARGET, rows = self.row_count, "collection finished early");
            return Ok(ScanFlow::Stop);
        }
        Ok(ScanFlow::Continue)
    }

    fn accepts_docs_out_of_order(&self) -> bool {
        true
    }
}
