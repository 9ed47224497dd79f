//! Shared in-memory fixtures for collector integration tests.
//!
//! `MemSearcher` is a reference index over JSON documents: unordered
//! scans walk segments in order, sorted pages are produced with a
//! deterministic (sort keys, doc id) comparator. `MemShard` tracks
//! context lifecycle calls, `TestSink` records everything the collector
//! sends downstream and can answer backpressure, kill the scan or trip
//! the breaker at a configured row.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use shardscan::breaker::RamAccounting;
use shardscan::collector::{
    CollectError, CollectRequest, DocCollector, KillSwitch, Row,
};
use shardscan::downstream::{DownstreamError, DownstreamResult, RowDownstream};
use shardscan::expr::{CollectorExpression, FieldsVisitor};
use shardscan::searcher::{
    compare_values, DocId, OrderBy, Query, ScanFlow, ScoredDoc, Scorer, SearchResult, Searcher,
    SegmentCollector, SegmentContext, SegmentReader, SortSymbol, Stage, TopDocs,
};
use shardscan::shard::ShardContext;

pub const JOB_SEARCH_CONTEXT_ID: i32 = 11;

// =============================================================================
// Segment reader
// =============================================================================

pub struct MemReader {
    docs: Vec<Value>,
    pub document_calls: Cell<usize>,
}

impl MemReader {
    fn new(docs: Vec<Value>) -> Self {
        Self {
            docs,
            document_calls: Cell::new(0),
        }
    }
}

impl SegmentReader for MemReader {
    fn document(&self, doc: DocId, visitor: &mut FieldsVisitor) -> SearchResult<()> {
        self.document_calls.set(self.document_calls.get() + 1);
        let source = self.docs[doc as usize].clone();
        if let Value::Object(fields) = &source {
            for (name, value) in fields {
                if visitor.needs_field(name) {
                    visitor.add_value(name.clone(), value.clone());
                }
            }
        }
        visitor.set_source(source);
        Ok(())
    }

    fn doc_value(&self, column: &str, doc: DocId) -> Value {
        self.docs
            .get(doc as usize)
            .and_then(|source| source.get(column))
            .cloned()
            .unwrap_or(Value::Null)
    }
}

struct ConstScorer;

impl Scorer for ConstScorer {
    fn score(&self, _doc: DocId) -> f32 {
        1.0
    }
}

// =============================================================================
// In-memory searcher
// =============================================================================

#[derive(Default)]
pub struct SearchCalls {
    /// `k` of every `top_k` call, in call order.
    pub top_k: Vec<usize>,
    /// `k` of every `search_after` call, in call order.
    pub search_after: Vec<usize>,
}

pub struct MemSearcher {
    segments: Vec<Arc<SegmentContext>>,
    pub readers: Vec<Arc<MemReader>>,
    segment_docs: Vec<Vec<Value>>,
    pub calls: RefCell<SearchCalls>,
    pub events: Rc<RefCell<Vec<String>>>,
}

impl MemSearcher {
    pub fn new(segment_docs: Vec<Vec<Value>>, events: Rc<RefCell<Vec<String>>>) -> Self {
        let mut segments = Vec::new();
        let mut readers = Vec::new();
        let mut doc_base = 0;
        for (ord, docs) in segment_docs.iter().enumerate() {
            let reader = Arc::new(MemReader::new(docs.clone()));
            readers.push(Arc::clone(&reader));
            segments.push(Arc::new(SegmentContext {
                ord,
                doc_base,
                reader,
            }));
            doc_base += docs.len() as u32;
        }
        Self {
            segments,
            readers,
            segment_docs,
            calls: RefCell::new(SearchCalls::default()),
            events,
        }
    }

    fn sort_fields(doc: &Value, order_by: &OrderBy) -> Vec<Value> {
        order_by
            .keys
            .iter()
            .map(|key| match &key.symbol {
                SortSymbol::Reference { column } => {
                    doc.get(column).cloned().unwrap_or(Value::Null)
                }
                SortSymbol::Computed { .. } => Value::Null,
            })
            .collect()
    }

    /// All matching documents as scored docs with global ids.
    fn sorted_matches(&self, query: &Query, order_by: &OrderBy) -> Vec<ScoredDoc> {
        let mut matches = Vec::new();
        for (segment, docs) in self.segments.iter().zip(&self.segment_docs) {
            for (local, doc) in docs.iter().enumerate() {
                if query.matches(doc) {
                    let global = segment.doc_base + local as u32;
                    matches.push(ScoredDoc {
                        doc: global,
                        score: global as f32,
                        fields: Self::sort_fields(doc, order_by),
                    });
                }
            }
        }
        matches.sort_by(|a, b| {
            cmp_sort_keys(&a.fields, &b.fields, order_by).then(a.doc.cmp(&b.doc))
        });
        matches
    }
}

/// Compares two sort-key vectors under an order-by spec.
pub fn cmp_sort_keys(a: &[Value], b: &[Value], order_by: &OrderBy) -> Ordering {
    for (i, key) in order_by.keys.iter().enumerate() {
        let a_value = a.get(i).unwrap_or(&Value::Null);
        let b_value = b.get(i).unwrap_or(&Value::Null);
        let ord = match (a_value.is_null(), b_value.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => {
                if key.nulls_first {
                    Ordering::Less
                } else {
                    Ordering::Greater
                }
            }
            (false, true) => {
                if key.nulls_first {
                    Ordering::Greater
                } else {
                    Ordering::Less
                }
            }
            (false, false) => {
                let ord = compare_values(a_value, b_value);
                if key.reverse {
                    ord.reverse()
                } else {
                    ord
                }
            }
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

impl Searcher for MemSearcher {
    fn segments(&self) -> Vec<Arc<SegmentContext>> {
        self.segments.clone()
    }

    fn scan(
        &self,
        query: &Query,
        collector: &mut dyn SegmentCollector,
    ) -> Result<(), CollectError> {
        assert!(collector.accepts_docs_out_of_order());
        for (segment, docs) in self.segments.iter().zip(&self.segment_docs) {
            collector.set_segment(segment)?;
            collector.set_scorer(Rc::new(ConstScorer));
            for (local, doc) in docs.iter().enumerate() {
                if query.matches(doc) {
                    if let ScanFlow::Stop = collector.collect(local as DocId)? {
                        return Ok(());
                    }
                }
            }
        }
        Ok(())
    }

    fn top_k(&self, query: &Query, k: usize, sort: &OrderBy) -> SearchResult<TopDocs> {
        self.calls.borrow_mut().top_k.push(k);
        let mut docs = self.sorted_matches(query, sort);
        docs.truncate(k);
        Ok(TopDocs { docs })
    }

    fn search_after(
        &self,
        cursor: &ScoredDoc,
        query: &Query,
        k: usize,
        sort: &OrderBy,
    ) -> SearchResult<TopDocs> {
        self.calls.borrow_mut().search_after.push(k);
        let mut docs: Vec<ScoredDoc> = self
            .sorted_matches(query, sort)
            .into_iter()
            .filter(|scored| {
                cmp_sort_keys(&scored.fields, &cursor.fields, sort)
                    .then(scored.doc.cmp(&cursor.doc))
                    == Ordering::Greater
            })
            .collect();
        docs.truncate(k);
        Ok(TopDocs { docs })
    }

    fn enter_stage(&self, _stage: Stage) {
        self.events.borrow_mut().push("enter_stage".to_string());
    }

    fn finish_stage(&self, _stage: Stage) {
        self.events.borrow_mut().push("finish_stage".to_string());
    }
}

// =============================================================================
// Shard context
// =============================================================================

pub struct MemShard {
    searcher: Arc<dyn Searcher>,
    pub acquired: Cell<usize>,
    pub released: Cell<usize>,
    pub closed: Cell<usize>,
    pub events: Rc<RefCell<Vec<String>>>,
}

impl MemShard {
    pub fn new(searcher: Arc<dyn Searcher>, events: Rc<RefCell<Vec<String>>>) -> Self {
        Self {
            searcher,
            acquired: Cell::new(0),
            released: Cell::new(0),
            closed: Cell::new(0),
            events,
        }
    }
}

impl ShardContext for MemShard {
    fn searcher(&self) -> Arc<dyn Searcher> {
        Arc::clone(&self.searcher)
    }

    fn acquire_context(&self) {
        self.acquired.set(self.acquired.get() + 1);
        self.events.borrow_mut().push("acquire".to_string());
    }

    fn release_context(&self) {
        self.released.set(self.released.get() + 1);
        self.events.borrow_mut().push("release".to_string());
    }

    fn close(&self) {
        self.closed.set(self.closed.get() + 1);
        self.events.borrow_mut().push("close".to_string());
    }

    fn job_search_context_id(&self) -> i32 {
        JOB_SEARCH_CONTEXT_ID
    }
}

// =============================================================================
// Breaker
// =============================================================================

pub struct TripBreaker {
    tripped: AtomicBool,
    context_id: String,
    limit: u64,
}

impl TripBreaker {
    pub fn new(context_id: impl Into<String>, limit: u64) -> Self {
        Self {
            tripped: AtomicBool::new(false),
            context_id: context_id.into(),
            limit,
        }
    }

    pub fn trip(&self) {
        self.tripped.store(true, AtomicOrdering::Release);
    }
}

impl RamAccounting for TripBreaker {
    fn tripped(&self) -> bool {
        self.tripped.load(AtomicOrdering::Acquire)
    }

    fn context_id(&self) -> String {
        self.context_id.clone()
    }

    fn limit(&self) -> u64 {
        self.limit
    }
}

// =============================================================================
// Downstream sink
// =============================================================================

#[derive(Default)]
pub struct SinkState {
    pub rows: Vec<Vec<Value>>,
    pub finished: usize,
    pub failures: Vec<CollectError>,
}

/// Recording downstream with per-row triggers.
pub struct TestSink {
    pub state: Rc<RefCell<SinkState>>,
    /// Answer `want_more = false` once this many rows were delivered.
    pub stop_after: Option<usize>,
    /// Flip the kill switch once this many rows were delivered.
    pub kill_after: Option<usize>,
    /// Trip the breaker once this many rows were delivered.
    pub trip_after: Option<usize>,
    /// Raise a consumer error instead of accepting this row (0-based).
    pub fail_at: Option<usize>,
    pub kill_switch: Rc<RefCell<Option<KillSwitch>>>,
    pub breaker: Option<Arc<TripBreaker>>,
}

impl RowDownstream for TestSink {
    fn deliver_row(&mut self, row: &dyn Row) -> DownstreamResult<bool> {
        let mut state = self.state.borrow_mut();
        if self.fail_at == Some(state.rows.len()) {
            return Err(DownstreamError::Consumer("sink rejected the row".to_string()));
        }
        state.rows.push(row.materialize());
        let delivered = state.rows.len();

        if self.kill_after == Some(delivered) {
            if let Some(switch) = self.kill_switch.borrow().as_ref() {
                switch.kill();
            }
        }
        if self.trip_after == Some(delivered) {
            if let Some(breaker) = &self.breaker {
                breaker.trip();
            }
        }
        Ok(self.stop_after.map_or(true, |n| delivered < n))
    }

    fn finish(&mut self) {
        self.state.borrow_mut().finished += 1;
    }

    fn fail(&mut self, error: CollectError) {
        self.state.borrow_mut().failures.push(error);
    }
}

// =============================================================================
// Fixture
// =============================================================================

#[derive(Default)]
pub struct SinkOptions {
    pub stop_after: Option<usize>,
    pub kill_after: Option<usize>,
    pub trip_after: Option<usize>,
    pub fail_at: Option<usize>,
}

pub struct Fixture {
    pub searcher: Arc<MemSearcher>,
    pub shard: Arc<MemShard>,
    pub state: Rc<RefCell<SinkState>>,
    pub events: Rc<RefCell<Vec<String>>>,
    pub kill_slot: Rc<RefCell<Option<KillSwitch>>>,
    pub breaker: Option<Arc<TripBreaker>>,
}

impl Fixture {
    pub fn new(segment_docs: Vec<Vec<Value>>) -> Self {
        let events = Rc::new(RefCell::new(Vec::new()));
        let searcher = Arc::new(MemSearcher::new(segment_docs, Rc::clone(&events)));
        let shard = Arc::new(MemShard::new(
            Arc::clone(&searcher) as Arc<dyn Searcher>,
            Rc::clone(&events),
        ));
        Self {
            searcher,
            shard,
            state: Rc::new(RefCell::new(SinkState::default())),
            events,
            kill_slot: Rc::new(RefCell::new(None)),
            breaker: None,
        }
    }

    pub fn with_breaker(mut self, breaker: TripBreaker) -> Self {
        self.breaker = Some(Arc::new(breaker));
        self
    }

    pub fn build(
        &self,
        request: CollectRequest,
        expressions: Vec<Box<dyn CollectorExpression>>,
        options: SinkOptions,
    ) -> DocCollector<TestSink> {
        let sink = TestSink {
            state: Rc::clone(&self.state),
            stop_after: options.stop_after,
            kill_after: options.kill_after,
            trip_after: options.trip_after,
            fail_at: options.fail_at,
            kill_switch: Rc::clone(&self.kill_slot),
            breaker: self.breaker.clone(),
        };
        let collector = DocCollector::new(
            request,
            expressions,
            Arc::clone(&self.shard) as Arc<dyn ShardContext>,
            self.breaker
                .clone()
                .map(|breaker| breaker as Arc<dyn RamAccounting>),
            sink,
        );
        *self.kill_slot.borrow_mut() = Some(collector.kill_switch());
        collector
    }

    /// Stored-field fetches across all segments.
    pub fn document_fetches(&self) -> usize {
        self.searcher
            .readers
            .iter()
            .map(|reader| reader.document_calls.get())
            .sum()
    }
}

pub fn request(query: Query) -> CollectRequest {
    CollectRequest::new(Uuid::new_v4(), query)
}
