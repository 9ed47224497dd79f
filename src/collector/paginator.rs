//! Ordered pagination
//!
//! Sorted, limited streaming over a shard: a first top-K page followed
//! by search-after continuations. Because the index may return
//! equal-key documents non-deterministically across calls, every
//! continuation additionally subtracts an exclusion filter built from
//! the cursor's sort keys; this keeps pagination idempotent under ties
//! and is what makes two consecutive pages never overlap.

use std::sync::Arc;

use serde_json::Value;
use tracing::trace;

use super::driver::{DocCollector, TARGET};
use super::errors::{CollectError, CollectResult};
use crate::downstream::RowDownstream;
use crate::searcher::{
    range_query, OrderBy, Query, ScanFlow, ScoredDoc, SegmentCollector, SegmentContext, SortSymbol,
    TopDocs,
};

/// Outcome of delivering one sorted page.
enum PageOutcome {
    /// All page documents were delivered; carries the last one as the
    /// continuation cursor.
    Delivered(Option<ScoredDoc>),
    /// The collector requested early termination mid-page.
    Stopped,
}

impl<D: RowDownstream> DocCollector<D> {
    /// Streams the scan in sort order, page by page.
    pub(super) fn collect_ordered(&mut self, order_by: &OrderBy) -> CollectResult<()> {
        let searcher = self.searcher();
        let mut batch = batch_size(self.page_size(), self.limit(), 0);
        let mut page = searcher.top_k(self.query(), batch, order_by)?;
        let mut collected = page.len();
        trace!(target: TARGET, batch, fetched = page.len(), "fetched first sorted page");

        let mut last = match self.deliver_page(&page)? {
            PageOutcome::Stopped => return Ok(()),
            PageOutcome::Delivered(last) => last,
        };

        loop {
            let Some(cursor) = last else { break };
            if self.limit().is_some_and(|limit| collected >= limit) {
                break;
            }
            if page.len() < batch {
                break;
            }
            if self.is_killed() {
                return Err(CollectError::Cancelled);
            }

            batch = batch_size(self.page_size(), self.limit(), collected);
            page = match already_collected_query(&cursor, order_by) {
                Some(exclusion) => {
                    let query = Query::bool(vec![self.query().clone()], vec![exclusion]);
                    searcher.search_after(&cursor, &query, batch, order_by)?
                }
                None => searcher.search_after(&cursor, self.query(), batch, order_by)?,
            };
            collected += page.len();
            trace!(
                target: TARGET,
                batch,
                fetched = page.len(),
                collected,
                "fetched continuation page"
            );

            last = match self.deliver_page(&page)? {
                PageOutcome::Stopped => return Ok(()),
                PageOutcome::Delivered(last) => last,
            };
        }
        Ok(())
    }

    /// Delivers one sorted page through the unordered per-document path.
    ///
    /// Global doc ids are resolved to their owning segment, sort-field
    /// values and scores are injected into the capable expressions, and
    /// the regular `collect` routine then honors kill, breaker, limit
    /// and backpressure.
    fn deliver_page(&mut self, page: &TopDocs) -> CollectResult<PageOutcome> {
        let searcher = self.searcher();
        let segments = searcher.segments();
        if segments.is_empty() {
            return Ok(PageOutcome::Delivered(None));
        }

        let mut last = None;
        for scored in &page.docs {
            let segment = &segments[segment_index(&segments, scored.doc)];
            let doc = scored.doc - segment.doc_base;
            self.set_segment(segment)?;
            self.inject_sort_fields(&scored.fields, scored.score);
            if let ScanFlow::Stop = self.collect(doc)? {
                return Ok(PageOutcome::Stopped);
            }
            last = Some(scored.clone());
        }
        Ok(PageOutcome::Delivered(last))
    }
}

/// Documents requested for the next page, bounded by the remaining limit.
fn batch_size(page_size: usize, limit: Option<usize>, collected: usize) -> usize {
    match limit {
        Some(limit) => page_size.min(limit.saturating_sub(collected)),
        None => page_size,
    }
}

/// Locates the segment owning a global doc id.
///
/// Segments are in ascending `doc_base` order; the first segment starts
/// at base 0.
fn segment_index(segments: &[Arc<SegmentContext>], doc: u32) -> usize {
    segments.partition_point(|segment| segment.doc_base <= doc) - 1
}

/// Builds the tie-breaking exclusion filter for a continuation cursor.
///
/// One open range clause per direct-reference sort column, excluding
/// everything that sorted strictly before the cursor's key:
/// `column > value` for reversed columns, `column < value` otherwise.
/// A null key with nulls sorting last turns into an unbounded range
/// ("column has a value"), since every valued document precedes the
/// cursor. Clauses are omitted for computed sort symbols and for null
/// keys that sort first.
fn already_collected_query(cursor: &ScoredDoc, order_by: &OrderBy) -> Option<Query> {
    let mut clauses = Vec::new();
    for (i, key) in order_by.keys.iter().enumerate() {
        let SortSymbol::Reference { column } = &key.symbol else {
            continue;
        };
        let value = cursor.fields.get(i).cloned().unwrap_or(Value::Null);
        if value.is_null() && key.nulls_first {
            continue;
        }
        let bound = if value.is_null() { None } else { Some(value) };
        let range = if key.reverse {
            range_query(column.clone(), bound, None, false, false)
        } else {
            range_query(column.clone(), None, bound, false, false)
        };
        clauses.push(Query::Range(range));
    }
    if clauses.is_empty() {
        None
    } else {
        Some(Query::bool(clauses, Vec::new()))
    }
}
