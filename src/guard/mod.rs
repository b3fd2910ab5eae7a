//! Enforcement core — classification indices, policy decisions, egress glue.
//!
//! All DLP resolution happens here: threshold-pruned point indices over one
//! selection, reusable per-document range indices, the pure
//! classification-to-decision evaluator, and the egress evaluator that ties
//! them to the audit contract.

pub mod document;
pub mod egress;
pub mod policy;
pub mod selection;

use serde::Serialize;
use thiserror::Error;

/// Failure raised by index builds and range scans.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexError {
    /// The caller's cancellation signal fired mid-build or mid-query. Any
    /// partial index or result is discarded.
    #[error("classification scan cancelled by caller")]
    Cancelled,
}

/// Counters accumulated during one index build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BuildStats {
    /// Records inspected.
    pub records_seen: usize,
    /// Records bucketed into the index.
    pub records_indexed: usize,
    /// Records discarded by threshold pruning.
    pub records_pruned: usize,
    /// Records skipped: foreign document, foreign sheet, outside the
    /// indexed rectangle, or malformed.
    pub records_skipped: usize,
}

/// Counters accumulated during one range query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueryStats {
    /// Index entries read while folding document, sheet, column, and range
    /// buckets.
    pub buckets_inspected: usize,
    /// Cell-level entries read on the cell fallback path.
    pub cells_probed: usize,
    /// Whether the scan stopped early after reaching `Restricted`.
    pub short_circuit: bool,
}

impl QueryStats {
    pub(crate) fn count_bucket(&mut self) {
        self.buckets_inspected = self.buckets_inspected.saturating_add(1);
    }

    pub(crate) fn count_cell(&mut self) {
        self.cells_probed = self.cells_probed.saturating_add(1);
    }
}

impl BuildStats {
    pub(crate) fn count_seen(&mut self) {
        self.records_seen = self.records_seen.saturating_add(1);
    }

    pub(crate) fn count_indexed(&mut self) {
        self.records_indexed = self.records_indexed.saturating_add(1);
    }

    pub(crate) fn count_pruned(&mut self) {
        self.records_pruned = self.records_pruned.saturating_add(1);
    }

    pub(crate) fn count_skipped(&mut self) {
        self.records_skipped = self.records_skipped.saturating_add(1);
    }
}
