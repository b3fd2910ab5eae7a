// Core data model: levels, classifications, selectors, records, policies.

use std::collections::BTreeSet;
use std::ops::ControlFlow;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sensitivity levels ordered lowest to highest.
///
/// The derived `Ord` follows declaration order, so `max` implements the
/// "more severe wins" rule directly.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationLevel {
    /// Freely shareable content.
    #[default]
    Public,
    /// Workspace-internal content.
    Internal,
    /// Business-confidential content.
    Confidential,
    /// Maximum sensitivity — never egresses without a mutual override.
    Restricted,
}

/// Error for unrecognised classification level names.
#[derive(Debug, Error)]
#[error("unrecognised classification level '{0}'")]
pub struct ParseLevelError(String);

impl ClassificationLevel {
    /// Integer rank, strictly increasing with severity.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Public => 0,
            Self::Internal => 1,
            Self::Confidential => 2,
            Self::Restricted => 3,
        }
    }

    /// Returns the string representation used in config and store data.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Internal => "internal",
            Self::Confidential => "confidential",
            Self::Restricted => "restricted",
        }
    }

    /// Parse from a config or store text value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a recognised level name.
    pub fn parse(s: &str) -> Result<Self, ParseLevelError> {
        match s {
            "public" => Ok(Self::Public),
            "internal" => Ok(Self::Internal),
            "confidential" => Ok(Self::Confidential),
            "restricted" => Ok(Self::Restricted),
            other => Err(ParseLevelError(other.to_owned())),
        }
    }
}

/// A sensitivity level plus descriptive labels attached to data.
///
/// `Classification::default()` (Public, no labels) is the identity element
/// of [`Classification::combine`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Sensitivity level.
    pub level: ClassificationLevel,
    /// Descriptive labels (e.g. "pii", "finance"). Audit display data only;
    /// decisions depend solely on the level.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub labels: BTreeSet<String>,
}

impl Classification {
    /// A classification at the given level with no labels.
    #[must_use]
    pub const fn new(level: ClassificationLevel) -> Self {
        Self {
            level,
            labels: BTreeSet::new(),
        }
    }

    /// A classification at the given level with the given labels.
    pub fn with_labels<I, S>(level: ClassificationLevel, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            level,
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    /// Merge another classification into this one: max level, label union.
    pub fn merge(&mut self, other: &Self) {
        self.level = self.level.max(other.level);
        self.labels.extend(other.labels.iter().cloned());
    }

    /// Combine two classifications: max level, label union.
    ///
    /// Commutative, associative, idempotent.
    #[must_use]
    pub fn combine(&self, other: &Self) -> Self {
        let mut out = self.clone();
        out.merge(other);
        out
    }

    /// Merge another classification in and signal whether scanning may stop.
    ///
    /// Returns `Break` once the accumulator reaches `Restricted` — no further
    /// record can raise it, so a scan that stops early yields the same level
    /// as one that runs to completion.
    pub fn fold_in(&mut self, other: &Self) -> ControlFlow<()> {
        self.merge(other);
        if self.level == ClassificationLevel::Restricted {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }
}

/// An inclusive rectangle of cells inside one sheet.
///
/// Callers normalise ranges (start ≤ end on both axes) before handing them
/// to the core; records carrying un-normalised ranges are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRange {
    /// First row, inclusive.
    pub start_row: usize,
    /// First column, inclusive.
    pub start_col: usize,
    /// Last row, inclusive.
    pub end_row: usize,
    /// Last column, inclusive.
    pub end_col: usize,
}

impl CellRange {
    /// Rectangle spanning the given corners (inclusive).
    #[must_use]
    pub const fn new(start_row: usize, start_col: usize, end_row: usize, end_col: usize) -> Self {
        Self {
            start_row,
            start_col,
            end_row,
            end_col,
        }
    }

    /// Single-cell rectangle.
    #[must_use]
    pub const fn cell(row: usize, col: usize) -> Self {
        Self::new(row, col, row, col)
    }

    /// Whether start ≤ end on both axes.
    #[must_use]
    pub const fn is_normalized(&self) -> bool {
        self.start_row <= self.end_row && self.start_col <= self.end_col
    }

    /// Whether the point lies inside the rectangle.
    #[must_use]
    pub const fn contains(&self, row: usize, col: usize) -> bool {
        row >= self.start_row && row <= self.end_row && col >= self.start_col && col <= self.end_col
    }

    /// Whether two rectangles share at least one cell.
    #[must_use]
    pub const fn intersects(&self, other: &Self) -> bool {
        self.start_row <= other.end_row
            && other.start_row <= self.end_row
            && self.start_col <= other.end_col
            && other.start_col <= self.end_col
    }

    /// Number of rows spanned.
    #[must_use]
    pub const fn row_count(&self) -> usize {
        self.end_row.saturating_sub(self.start_row).saturating_add(1)
    }

    /// Number of columns spanned.
    #[must_use]
    pub const fn col_count(&self) -> usize {
        self.end_col.saturating_sub(self.start_col).saturating_add(1)
    }

    /// Number of cells covered.
    #[must_use]
    pub const fn area(&self) -> usize {
        self.row_count().saturating_mul(self.col_count())
    }
}

/// Where inside a document a classification record applies.
///
/// A closed set of scopes: adding a scope (or failing to handle one) is a
/// compile-time exhaustiveness error, not a silently ignored runtime case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum Selector {
    /// The whole document.
    Document {
        /// Target document.
        document_id: String,
    },
    /// One sheet of the document.
    Sheet {
        /// Target document.
        document_id: String,
        /// Target sheet.
        sheet_id: String,
    },
    /// One column of a sheet.
    Column {
        /// Target document.
        document_id: String,
        /// Target sheet.
        sheet_id: String,
        /// Zero-based column index.
        column: usize,
    },
    /// A single cell of a sheet.
    Cell {
        /// Target document.
        document_id: String,
        /// Target sheet.
        sheet_id: String,
        /// Zero-based row index.
        row: usize,
        /// Zero-based column index.
        col: usize,
    },
    /// A rectangular range of a sheet.
    Range {
        /// Target document.
        document_id: String,
        /// Target sheet.
        sheet_id: String,
        /// Covered rectangle (inclusive, normalised).
        range: CellRange,
    },
}

impl Selector {
    /// The document the selector targets. Document isolation is absolute: a
    /// record never applies outside this document.
    #[must_use]
    pub fn document_id(&self) -> &str {
        match self {
            Self::Document { document_id }
            | Self::Sheet { document_id, .. }
            | Self::Column { document_id, .. }
            | Self::Cell { document_id, .. }
            | Self::Range { document_id, .. } => document_id,
        }
    }

    /// The sheet the selector targets, if scoped below the document.
    #[must_use]
    pub fn sheet_id(&self) -> Option<&str> {
        match self {
            Self::Document { .. } => None,
            Self::Sheet { sheet_id, .. }
            | Self::Column { sheet_id, .. }
            | Self::Cell { sheet_id, .. }
            | Self::Range { sheet_id, .. } => Some(sheet_id),
        }
    }
}

/// A caller-supplied classification attached to a selector.
///
/// Records are immutable inputs; the core only reads them during index
/// construction and is never their system of record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRecord {
    /// Which part of which document the classification applies to.
    pub selector: Selector,
    /// The attached classification.
    pub classification: Classification,
}

/// A rectangular query inside a named sheet of a named document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeQuery {
    /// Target document.
    pub document_id: String,
    /// Target sheet.
    pub sheet_id: String,
    /// Queried rectangle (inclusive, normalised).
    pub range: CellRange,
}

/// Egress policy for one protected action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Highest level the action may see. `None` forbids every level.
    pub max_allowed: Option<ClassificationLevel>,
    /// Whether the action participates in the restricted-content override.
    pub allow_restricted_content: bool,
    /// Whether disallowed content is redacted point-by-point instead of
    /// blocked wholesale.
    pub redact_disallowed: bool,
}

/// Per-call evaluation options supplied by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecisionOptions {
    /// Caller opt-in half of the restricted-content override. Content at
    /// `Restricted` passes only when this and the policy's
    /// `allow_restricted_content` are both set.
    pub include_restricted_content: bool,
}

/// Outcome of evaluating a classification against a policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Decision {
    /// The content may be released as-is.
    Allow,
    /// Disallowed points must be masked before release; the carried
    /// threshold feeds a Selection Index build to find them.
    Redact {
        /// The policy ceiling to mask against.
        max_allowed: Option<ClassificationLevel>,
    },
    /// The whole query's content must be suppressed. No partial result.
    Block,
}

impl Decision {
    /// Whether the decision releases content unmodified.
    #[must_use]
    pub const fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn restricted_pii() -> Classification {
        Classification::with_labels(ClassificationLevel::Restricted, ["pii"])
    }

    // ── Level tests ──

    #[test]
    fn test_rank_strictly_increasing() {
        let levels = [
            ClassificationLevel::Public,
            ClassificationLevel::Internal,
            ClassificationLevel::Confidential,
            ClassificationLevel::Restricted,
        ];
        for pair in levels.windows(2) {
            assert!(pair[0].rank() < pair[1].rank());
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn test_level_parse_round_trip() {
        for level in [
            ClassificationLevel::Public,
            ClassificationLevel::Internal,
            ClassificationLevel::Confidential,
            ClassificationLevel::Restricted,
        ] {
            let parsed = ClassificationLevel::parse(level.as_str()).expect("round trip");
            assert_eq!(parsed, level);
        }
    }

    #[test]
    fn test_level_parse_unknown() {
        assert!(ClassificationLevel::parse("severe").is_err());
    }

    // ── Combine tests ──

    #[test]
    fn test_combine_idempotent() {
        let a = restricted_pii();
        assert_eq!(a.combine(&a), a);
    }

    #[test]
    fn test_combine_commutative() {
        let a = Classification::with_labels(ClassificationLevel::Internal, ["finance"]);
        let b = restricted_pii();
        assert_eq!(a.combine(&b), b.combine(&a));
    }

    #[test]
    fn test_combine_identity() {
        let a = restricted_pii();
        assert_eq!(a.combine(&Classification::default()), a);
        assert_eq!(Classification::default().combine(&a), a);
    }

    #[test]
    fn test_combine_unions_labels() {
        let a = Classification::with_labels(ClassificationLevel::Internal, ["finance"]);
        let b = Classification::with_labels(ClassificationLevel::Confidential, ["pii"]);
        let combined = a.combine(&b);
        assert_eq!(combined.level, ClassificationLevel::Confidential);
        assert!(combined.labels.contains("finance"));
        assert!(combined.labels.contains("pii"));
    }

    #[test]
    fn test_fold_in_breaks_on_restricted() {
        let mut acc = Classification::new(ClassificationLevel::Internal);
        assert!(acc
            .fold_in(&Classification::new(ClassificationLevel::Confidential))
            .is_continue());
        assert!(acc.fold_in(&restricted_pii()).is_break());
        assert_eq!(acc.level, ClassificationLevel::Restricted);
    }

    // ── Range tests ──

    #[test]
    fn test_range_contains_and_intersects() {
        let range = CellRange::new(1, 1, 3, 4);
        assert!(range.contains(1, 1));
        assert!(range.contains(3, 4));
        assert!(!range.contains(0, 1));
        assert!(!range.contains(1, 5));

        assert!(range.intersects(&CellRange::cell(2, 2)));
        assert!(range.intersects(&CellRange::new(3, 4, 10, 10)));
        assert!(!range.intersects(&CellRange::new(4, 0, 10, 10)));
    }

    #[test]
    fn test_range_counts() {
        let range = CellRange::new(1, 2, 3, 4);
        assert_eq!(range.row_count(), 3);
        assert_eq!(range.col_count(), 3);
        assert_eq!(range.area(), 9);
        assert_eq!(CellRange::cell(0, 0).area(), 1);
    }

    #[test]
    fn test_range_normalization_check() {
        assert!(CellRange::new(0, 0, 1, 1).is_normalized());
        assert!(!CellRange::new(2, 0, 1, 1).is_normalized());
        assert!(!CellRange::new(0, 3, 1, 1).is_normalized());
    }

    // ── Selector tests ──

    #[test]
    fn test_selector_accessors() {
        let selector = Selector::Column {
            document_id: "doc".to_owned(),
            sheet_id: "S1".to_owned(),
            column: 4,
        };
        assert_eq!(selector.document_id(), "doc");
        assert_eq!(selector.sheet_id(), Some("S1"));

        let doc = Selector::Document {
            document_id: "doc".to_owned(),
        };
        assert_eq!(doc.sheet_id(), None);
    }

    #[test]
    fn test_selector_serde_tagged_scope() {
        let selector = Selector::Cell {
            document_id: "doc".to_owned(),
            sheet_id: "S1".to_owned(),
            row: 1,
            col: 2,
        };
        let json = serde_json::to_string(&selector).expect("serialize");
        assert!(json.contains("\"scope\":\"cell\""));
        let back: Selector = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, selector);
    }
}
