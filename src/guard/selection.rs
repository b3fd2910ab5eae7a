//! Selection Index — point queries over one rectangular selection.
//!
//! Built once per query rectangle against a policy threshold, then answers
//! "is this point allowed?" for every cell of the selection in O(1)
//! amortized time. Records that cannot push any point above the threshold
//! are pruned at build time; surviving ranks land in dense per-column and
//! per-cell arrays plus a descending-rank range list.

use std::ops::ControlFlow;

use tracing::warn;

use crate::cancel::CancelSignal;
use crate::guard::{BuildStats, IndexError};
use crate::types::{CellRange, ClassificationLevel, ClassificationRecord, RangeQuery, Selector};

const RESTRICTED_RANK: u8 = ClassificationLevel::Restricted.rank();

/// Merge the next rank into the accumulator, signalling `Break` once the
/// result can no longer change the outcome: it reached `Restricted` (no
/// record ranks higher) or it already exceeds the threshold (the point is
/// disallowed whatever else applies).
pub(crate) fn fold_rank(acc: u8, next: u8, threshold: u8) -> ControlFlow<u8, u8> {
    let merged = acc.max(next);
    if merged >= RESTRICTED_RANK || merged > threshold {
        ControlFlow::Break(merged)
    } else {
        ControlFlow::Continue(merged)
    }
}

/// Point-query index over one rectangular selection.
///
/// Valid only for points inside the rectangle it was built for; querying
/// outside it is a caller contract violation and panics.
#[derive(Debug)]
pub struct SelectionIndex {
    range: CellRange,
    threshold: Option<u8>,
    /// Max rank over surviving document- and sheet-scoped records.
    base_rank: u8,
    /// Max rank per column offset of the selection.
    column_rank: Vec<u8>,
    /// Max rank per cell offset, allocated only if a cell record survives.
    cell_rank: Option<Vec<u8>>,
    /// Surviving range records intersecting the selection, rank-descending.
    range_records: Vec<(CellRange, u8)>,
    stats: BuildStats,
}

impl SelectionIndex {
    /// Build an index for `query` under the given visibility threshold.
    ///
    /// One O(records) pass. Records whose rank cannot exceed the threshold
    /// are pruned; records for other documents or sheets, records outside
    /// the rectangle, and malformed range records are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Cancelled`] if the cancellation signal fires
    /// mid-build; no partial index is returned.
    pub fn build(
        records: &[ClassificationRecord],
        query: &RangeQuery,
        max_allowed: Option<ClassificationLevel>,
        cancel: &CancelSignal,
    ) -> Result<Self, IndexError> {
        Self::build_inner(records, query, max_allowed, true, cancel)
    }

    /// Build variant with pruning switchable, kept for the pruning
    /// equivalence tests.
    pub(crate) fn build_inner(
        records: &[ClassificationRecord],
        query: &RangeQuery,
        max_allowed: Option<ClassificationLevel>,
        prune: bool,
        cancel: &CancelSignal,
    ) -> Result<Self, IndexError> {
        let mut stats = BuildStats::default();

        // A null threshold forbids everything; the index is never consulted.
        let Some(threshold) = max_allowed.map(ClassificationLevel::rank) else {
            return Ok(Self {
                range: query.range,
                threshold: None,
                base_rank: 0,
                column_rank: Vec::new(),
                cell_rank: None,
                range_records: Vec::new(),
                stats,
            });
        };

        let col_count = query.range.col_count();
        let mut base_rank = 0u8;
        let mut column_rank = vec![0u8; col_count];
        let mut cell_rank: Option<Vec<u8>> = None;
        let mut range_records: Vec<(CellRange, u8)> = Vec::new();

        for record in records {
            if cancel.is_cancelled() {
                return Err(IndexError::Cancelled);
            }
            stats.count_seen();

            let rank = record.classification.level.rank();
            if prune && rank <= threshold {
                // A pruned record can never push a point past the threshold.
                stats.count_pruned();
                continue;
            }
            if record.selector.document_id() != query.document_id {
                stats.count_skipped();
                continue;
            }
            if record
                .selector
                .sheet_id()
                .is_some_and(|sheet| sheet != query.sheet_id)
            {
                stats.count_skipped();
                continue;
            }

            match &record.selector {
                Selector::Document { .. } | Selector::Sheet { .. } => {
                    base_rank = base_rank.max(rank);
                    stats.count_indexed();
                }
                Selector::Column { column, .. } => {
                    if *column >= query.range.start_col && *column <= query.range.end_col {
                        let offset = column.saturating_sub(query.range.start_col);
                        if let Some(slot) = column_rank.get_mut(offset) {
                            *slot = (*slot).max(rank);
                        }
                        stats.count_indexed();
                    } else {
                        stats.count_skipped();
                    }
                }
                Selector::Cell { row, col, .. } => {
                    if query.range.contains(*row, *col) {
                        let cells = cell_rank
                            .get_or_insert_with(|| vec![0u8; query.range.area()]);
                        let offset = row
                            .saturating_sub(query.range.start_row)
                            .saturating_mul(col_count)
                            .saturating_add(col.saturating_sub(query.range.start_col));
                        if let Some(slot) = cells.get_mut(offset) {
                            *slot = (*slot).max(rank);
                        }
                        stats.count_indexed();
                    } else {
                        stats.count_skipped();
                    }
                }
                Selector::Range { range, .. } => {
                    if !range.is_normalized() {
                        warn!(?range, "skipping malformed range selector");
                        stats.count_skipped();
                    } else if range.intersects(&query.range) {
                        range_records.push((*range, rank));
                        stats.count_indexed();
                    } else {
                        stats.count_skipped();
                    }
                }
            }
        }

        // Rank-descending order lets point queries stop at the first match.
        range_records.sort_by(|a, b| b.1.cmp(&a.1));

        Ok(Self {
            range: query.range,
            threshold: Some(threshold),
            base_rank,
            column_rank,
            cell_rank,
            range_records,
            stats,
        })
    }

    /// The rectangle this index was built for.
    #[must_use]
    pub const fn range(&self) -> &CellRange {
        &self.range
    }

    /// Build counters.
    #[must_use]
    pub const fn build_stats(&self) -> &BuildStats {
        &self.stats
    }

    /// Whether the point may be released under the build threshold.
    ///
    /// # Panics
    ///
    /// Panics if the point lies outside the rectangle the index was built
    /// for — a caller contract violation, not a recoverable state.
    #[must_use]
    pub fn is_allowed(&self, row: usize, col: usize) -> bool {
        let Some(threshold) = self.threshold else {
            // Forbid-everything policy: disallowed without inspecting.
            return false;
        };
        assert!(
            self.range.contains(row, col),
            "point ({row}, {col}) lies outside the indexed selection {:?}",
            self.range
        );
        self.point_rank(row, col, threshold) <= threshold
    }

    /// Fold the point's rank sources from least to most specific scope,
    /// short-circuiting per [`fold_rank`].
    fn point_rank(&self, row: usize, col: usize, threshold: u8) -> u8 {
        let col_offset = col.saturating_sub(self.range.start_col);
        let column = self.column_rank.get(col_offset).copied().unwrap_or(0);
        let cell = self.cell_rank.as_ref().map_or(0, |cells| {
            let offset = row
                .saturating_sub(self.range.start_row)
                .saturating_mul(self.range.col_count())
                .saturating_add(col_offset);
            cells.get(offset).copied().unwrap_or(0)
        });

        let mut rank = 0u8;
        for next in [self.base_rank, column, cell] {
            match fold_rank(rank, next, threshold) {
                ControlFlow::Break(merged) => return merged,
                ControlFlow::Continue(merged) => rank = merged,
            }
        }

        for (rect, rect_rank) in &self.range_records {
            if *rect_rank <= rank {
                // Rank-descending: nothing further can raise the fold.
                break;
            }
            if rect.contains(row, col) {
                match fold_rank(rank, *rect_rank, threshold) {
                    ControlFlow::Break(merged) => return merged,
                    ControlFlow::Continue(merged) => rank = merged,
                }
                break;
            }
        }
        rank
    }
}
