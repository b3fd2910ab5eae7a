//! Document Index — reusable, sheet-wide classification lookups.
//!
//! Built once per document, then answers arbitrarily many range queries
//! without re-scanning the record set: records are bucketed per sheet by
//! scope (sheet maximum, column map, cell map, rectangle list) on top of a
//! document-level maximum. Queries fold buckets least-specific-first and
//! return early once the accumulator reaches `Restricted`.
//!
//! The index is a derived, read-only view: all queries take `&self`, so one
//! build may be shared across parallel tasks for the lifetime of a logical
//! operation. Callers rebuild when the record set changes.

use std::collections::HashMap;
use std::ops::ControlFlow;

use tracing::{debug, warn};

use crate::cancel::CancelSignal;
use crate::guard::{BuildStats, IndexError, QueryStats};
use crate::types::{
    CellRange, Classification, ClassificationLevel, ClassificationRecord, Selector,
};

/// How to fold cell-level (or column-level) buckets into a range query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScanStrategy {
    /// Iterate the query's span and probe the map per key.
    ProbeRange,
    /// Iterate the map's entries and test membership in the span.
    ScanEntries,
}

/// Pick the cheaper side: probe the span when it is no larger than the map,
/// otherwise walk the map.
pub(crate) fn choose_strategy(range_area: usize, map_size: usize) -> ScanStrategy {
    if range_area <= map_size {
        ScanStrategy::ProbeRange
    } else {
        ScanStrategy::ScanEntries
    }
}

/// Per-sheet lookup buckets keyed by scope.
#[derive(Debug, Default)]
struct SheetBuckets {
    /// Running maximum over sheet-scoped records.
    sheet_max: Option<Classification>,
    /// Column index → running maximum.
    columns: HashMap<usize, Classification>,
    /// (row, col) → running maximum.
    cells: HashMap<(usize, usize), Classification>,
    /// Rectangle records, unordered.
    ranges: Vec<(CellRange, Classification)>,
}

/// Reusable classification index over one document.
#[derive(Debug)]
pub struct DocumentIndex {
    document_id: String,
    /// Running maximum over document-scoped records.
    doc_max: Classification,
    sheets: HashMap<String, SheetBuckets>,
    stats: BuildStats,
}

impl DocumentIndex {
    /// Bucket `records` for `document_id` in a single pass.
    ///
    /// Records for other documents are discarded — document isolation is
    /// absolute. Malformed range records are skipped, not fatal.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Cancelled`] if the cancellation signal fires
    /// mid-build; no partial index is returned.
    pub fn build(
        records: &[ClassificationRecord],
        document_id: impl Into<String>,
        cancel: &CancelSignal,
    ) -> Result<Self, IndexError> {
        let document_id = document_id.into();
        let mut stats = BuildStats::default();
        let mut doc_max = Classification::default();
        let mut sheets: HashMap<String, SheetBuckets> = HashMap::new();

        for record in records {
            if cancel.is_cancelled() {
                return Err(IndexError::Cancelled);
            }
            stats.count_seen();

            if record.selector.document_id() != document_id {
                stats.count_skipped();
                continue;
            }

            match &record.selector {
                Selector::Document { .. } => {
                    doc_max.merge(&record.classification);
                    stats.count_indexed();
                }
                Selector::Sheet { sheet_id, .. } => {
                    let bucket = sheets.entry(sheet_id.clone()).or_default();
                    merge_slot(&mut bucket.sheet_max, &record.classification);
                    stats.count_indexed();
                }
                Selector::Column {
                    sheet_id, column, ..
                } => {
                    let bucket = sheets.entry(sheet_id.clone()).or_default();
                    bucket
                        .columns
                        .entry(*column)
                        .and_modify(|slot| slot.merge(&record.classification))
                        .or_insert_with(|| record.classification.clone());
                    stats.count_indexed();
                }
                Selector::Cell {
                    sheet_id, row, col, ..
                } => {
                    let bucket = sheets.entry(sheet_id.clone()).or_default();
                    bucket
                        .cells
                        .entry((*row, *col))
                        .and_modify(|slot| slot.merge(&record.classification))
                        .or_insert_with(|| record.classification.clone());
                    stats.count_indexed();
                }
                Selector::Range {
                    sheet_id, range, ..
                } => {
                    if !range.is_normalized() {
                        warn!(?range, "skipping malformed range selector");
                        stats.count_skipped();
                    } else {
                        let bucket = sheets.entry(sheet_id.clone()).or_default();
                        bucket.ranges.push((*range, record.classification.clone()));
                        stats.count_indexed();
                    }
                }
            }
        }

        debug!(
            document_id,
            records_indexed = stats.records_indexed,
            sheets = sheets.len(),
            "document index built"
        );
        Ok(Self {
            document_id,
            doc_max,
            sheets,
            stats,
        })
    }

    /// The document this index covers.
    #[must_use]
    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    /// Build counters.
    #[must_use]
    pub const fn build_stats(&self) -> &BuildStats {
        &self.stats
    }

    /// Effective classification of a range, without query counters.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Cancelled`] if the cancellation signal fires
    /// mid-scan.
    pub fn classify_range(
        &self,
        sheet_id: &str,
        range: &CellRange,
        cancel: &CancelSignal,
    ) -> Result<Classification, IndexError> {
        self.classify_range_with_stats(sheet_id, range, cancel)
            .map(|(classification, _)| classification)
    }

    /// Effective classification of a range: the combine over every record
    /// bucket that applies, folded least-specific-first with an early
    /// return once the accumulator reaches `Restricted`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Cancelled`] if the cancellation signal fires
    /// mid-scan; a cancelled query never yields a partial classification.
    pub fn classify_range_with_stats(
        &self,
        sheet_id: &str,
        range: &CellRange,
        cancel: &CancelSignal,
    ) -> Result<(Classification, QueryStats), IndexError> {
        let mut stats = QueryStats::default();
        if cancel.is_cancelled() {
            return Err(IndexError::Cancelled);
        }

        let mut acc = self.doc_max.clone();
        if acc.level == ClassificationLevel::Restricted {
            stats.short_circuit = true;
            return Ok((acc, stats));
        }

        let Some(bucket) = self.sheets.get(sheet_id) else {
            return Ok((acc, stats));
        };

        if let Some(sheet_max) = &bucket.sheet_max {
            stats.count_bucket();
            if fold_step(&mut acc, sheet_max, &mut stats).is_break() {
                return Ok((acc, stats));
            }
        }

        // Column buckets inside the query's column span.
        match choose_strategy(range.col_count(), bucket.columns.len()) {
            ScanStrategy::ProbeRange => {
                for col in range.start_col..=range.end_col {
                    if cancel.is_cancelled() {
                        return Err(IndexError::Cancelled);
                    }
                    if let Some(classification) = bucket.columns.get(&col) {
                        stats.count_bucket();
                        if fold_step(&mut acc, classification, &mut stats).is_break() {
                            return Ok((acc, stats));
                        }
                    }
                }
            }
            ScanStrategy::ScanEntries => {
                for (col, classification) in &bucket.columns {
                    if cancel.is_cancelled() {
                        return Err(IndexError::Cancelled);
                    }
                    stats.count_bucket();
                    if *col >= range.start_col && *col <= range.end_col {
                        if fold_step(&mut acc, classification, &mut stats).is_break() {
                            return Ok((acc, stats));
                        }
                    }
                }
            }
        }

        // Rectangle buckets intersecting the query.
        for (rect, classification) in &bucket.ranges {
            if cancel.is_cancelled() {
                return Err(IndexError::Cancelled);
            }
            stats.count_bucket();
            if rect.intersects(range) {
                if fold_step(&mut acc, classification, &mut stats).is_break() {
                    return Ok((acc, stats));
                }
            }
        }

        // Cell buckets inside the query, via whichever side is smaller.
        match choose_strategy(range.area(), bucket.cells.len()) {
            ScanStrategy::ProbeRange => {
                for row in range.start_row..=range.end_row {
                    if cancel.is_cancelled() {
                        return Err(IndexError::Cancelled);
                    }
                    for col in range.start_col..=range.end_col {
                        if let Some(classification) = bucket.cells.get(&(row, col)) {
                            stats.count_cell();
                            if fold_step(&mut acc, classification, &mut stats).is_break() {
                                return Ok((acc, stats));
                            }
                        }
                    }
                }
            }
            ScanStrategy::ScanEntries => {
                for ((row, col), classification) in &bucket.cells {
                    if cancel.is_cancelled() {
                        return Err(IndexError::Cancelled);
                    }
                    stats.count_cell();
                    if range.contains(*row, *col) {
                        if fold_step(&mut acc, classification, &mut stats).is_break() {
                            return Ok((acc, stats));
                        }
                    }
                }
            }
        }

        Ok((acc, stats))
    }
}

fn merge_slot(slot: &mut Option<Classification>, classification: &Classification) {
    match slot {
        Some(existing) => existing.merge(classification),
        None => *slot = Some(classification.clone()),
    }
}

fn fold_step(
    acc: &mut Classification,
    next: &Classification,
    stats: &mut QueryStats,
) -> ControlFlow<()> {
    let flow = acc.fold_in(next);
    if flow.is_break() {
        stats.short_circuit = true;
    }
    flow
}
