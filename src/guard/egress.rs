//! Egress evaluation — classification-checked release of sheet content.
//!
//! Ties a per-action [`Policy`] to a shared [`DocumentIndex`] and the audit
//! contract: classify the queried range, decide, audit-log, return. Two-tier
//! evaluation additionally folds in the caller's heuristic classification and
//! keeps the stricter of the structured-only and combined decisions, so a
//! stale or missing detector result can only ever tighten the outcome.

use std::sync::Arc;

use tracing::warn;

use crate::audit::{AuditRecord, AuditSink};
use crate::cancel::CancelSignal;
use crate::guard::document::DocumentIndex;
use crate::guard::policy::{decide, more_restrictive};
use crate::guard::{IndexError, QueryStats};
use crate::types::{CellRange, Classification, Decision, DecisionOptions, Policy};

/// Result of one egress evaluation.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// The effective classification the decision was based on.
    pub classification: Classification,
    /// The decision to enforce.
    pub decision: Decision,
    /// Query counters for the backing range scan.
    pub stats: QueryStats,
}

/// Evaluates egress decisions for one protected action.
pub struct EgressEvaluator {
    action: String,
    policy: Policy,
    audit: Arc<dyn AuditSink>,
}

impl EgressEvaluator {
    /// Create an evaluator for a protected action.
    pub fn new(action: impl Into<String>, policy: Policy, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            action: action.into(),
            policy,
            audit,
        }
    }

    /// The policy this evaluator enforces.
    #[must_use]
    pub const fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Classify a range through the document index and decide.
    ///
    /// Steps:
    /// 1. Resolve the effective classification of the range
    /// 2. Evaluate the policy decision
    /// 3. Audit-log the decision (failures logged, never alter the result)
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Cancelled`] if the cancellation signal fires
    /// mid-scan; no decision is produced and nothing is audit-logged.
    pub fn evaluate_range(
        &self,
        index: &DocumentIndex,
        sheet_id: &str,
        range: &CellRange,
        options: &DecisionOptions,
        cancel: &CancelSignal,
    ) -> Result<Evaluation, IndexError> {
        let (classification, stats) = index.classify_range_with_stats(sheet_id, range, cancel)?;
        let decision = decide(&classification, &self.policy, options);
        self.emit_audit(index, sheet_id, &decision, &classification, stats);
        Ok(Evaluation {
            classification,
            decision,
            stats,
        })
    }

    /// Two-tier evaluation: structured classification alone, and combined
    /// with the caller's heuristic classification; the stricter decision
    /// wins. The heuristic input must be freshly computed for the current
    /// content — the evaluator never caches it.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Cancelled`] if the cancellation signal fires
    /// mid-scan; no decision is produced and nothing is audit-logged.
    pub fn evaluate_range_two_tier(
        &self,
        index: &DocumentIndex,
        sheet_id: &str,
        range: &CellRange,
        heuristic: &Classification,
        options: &DecisionOptions,
        cancel: &CancelSignal,
    ) -> Result<Evaluation, IndexError> {
        let (structured, stats) = index.classify_range_with_stats(sheet_id, range, cancel)?;
        let combined = structured.combine(heuristic);

        let structured_decision = decide(&structured, &self.policy, options);
        let combined_decision = decide(&combined, &self.policy, options);
        let decision = more_restrictive(structured_decision, combined_decision);

        self.emit_audit(index, sheet_id, &decision, &combined, stats);
        Ok(Evaluation {
            classification: combined,
            decision,
            stats,
        })
    }

    fn emit_audit(
        &self,
        index: &DocumentIndex,
        sheet_id: &str,
        decision: &Decision,
        classification: &Classification,
        stats: QueryStats,
    ) {
        let record = AuditRecord::new(
            self.action.clone(),
            index.document_id(),
            sheet_id,
            decision.clone(),
            classification.clone(),
            *index.build_stats(),
            stats,
        );
        if let Err(e) = self.audit.record(&record) {
            warn!(error = %e, action = %self.action, "failed to audit-log egress decision");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemorySink;
    use crate::types::{ClassificationLevel, ClassificationRecord, Selector};

    const DOC: &str = "doc-1";
    const SHEET: &str = "S1";

    fn index_with(records: &[ClassificationRecord]) -> DocumentIndex {
        DocumentIndex::build(records, DOC, &CancelSignal::new()).expect("build")
    }

    fn cell_record(row: usize, col: usize, level: ClassificationLevel) -> ClassificationRecord {
        ClassificationRecord {
            selector: Selector::Cell {
                document_id: DOC.to_owned(),
                sheet_id: SHEET.to_owned(),
                row,
                col,
            },
            classification: Classification::new(level),
        }
    }

    fn evaluator(policy: Policy, sink: Arc<MemorySink>) -> EgressEvaluator {
        EgressEvaluator::new("ai_cloud_processing", policy, sink)
    }

    fn redacting_policy() -> Policy {
        Policy {
            max_allowed: Some(ClassificationLevel::Internal),
            allow_restricted_content: false,
            redact_disallowed: true,
        }
    }

    // ── Single-tier evaluation ──

    #[test]
    fn test_evaluate_range_decides_and_audits() {
        let sink = Arc::new(MemorySink::new());
        let evaluator = evaluator(redacting_policy(), Arc::clone(&sink));
        let index = index_with(&[cell_record(0, 0, ClassificationLevel::Restricted)]);

        let evaluation = evaluator
            .evaluate_range(
                &index,
                SHEET,
                &CellRange::new(0, 0, 1, 1),
                &DecisionOptions::default(),
                &CancelSignal::new(),
            )
            .expect("evaluate");

        assert_eq!(
            evaluation.decision,
            Decision::Redact {
                max_allowed: Some(ClassificationLevel::Internal)
            }
        );
        assert_eq!(
            evaluation.classification.level,
            ClassificationLevel::Restricted
        );

        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].contains("\"outcome\":\"redact\""));
        assert!(entries[0].contains("\"document_id\":\"doc-1\""));
    }

    #[test]
    fn test_clean_range_allows() {
        let sink = Arc::new(MemorySink::new());
        let evaluator = evaluator(redacting_policy(), Arc::clone(&sink));
        let index = index_with(&[]);

        let evaluation = evaluator
            .evaluate_range(
                &index,
                SHEET,
                &CellRange::new(0, 0, 9, 9),
                &DecisionOptions::default(),
                &CancelSignal::new(),
            )
            .expect("evaluate");

        assert!(evaluation.decision.is_allow());
        assert_eq!(sink.entries().len(), 1);
    }

    #[test]
    fn test_cancelled_evaluation_produces_no_audit_entry() {
        let sink = Arc::new(MemorySink::new());
        let evaluator = evaluator(redacting_policy(), Arc::clone(&sink));
        let index = index_with(&[]);
        let fired = CancelSignal::new();
        fired.cancel();

        let result = evaluator.evaluate_range(
            &index,
            SHEET,
            &CellRange::cell(0, 0),
            &DecisionOptions::default(),
            &fired,
        );
        assert!(matches!(result, Err(IndexError::Cancelled)));
        assert!(sink.entries().is_empty());
    }

    // ── Two-tier evaluation ──

    #[test]
    fn test_heuristic_tier_can_only_tighten() {
        let sink = Arc::new(MemorySink::new());
        let evaluator = evaluator(
            Policy {
                max_allowed: Some(ClassificationLevel::Internal),
                allow_restricted_content: false,
                redact_disallowed: false,
            },
            Arc::clone(&sink),
        );
        // No structured records: structured tier alone would allow.
        let index = index_with(&[]);

        let evaluation = evaluator
            .evaluate_range_two_tier(
                &index,
                SHEET,
                &CellRange::new(0, 0, 4, 4),
                &Classification::with_labels(ClassificationLevel::Restricted, ["ssn"]),
                &DecisionOptions::default(),
                &CancelSignal::new(),
            )
            .expect("evaluate");

        assert_eq!(evaluation.decision, Decision::Block);
        assert_eq!(
            evaluation.classification.level,
            ClassificationLevel::Restricted
        );
        assert!(evaluation.classification.labels.contains("ssn"));
    }

    #[test]
    fn test_two_tier_agreement_keeps_allow() {
        let sink = Arc::new(MemorySink::new());
        let evaluator = evaluator(redacting_policy(), Arc::clone(&sink));
        let index = index_with(&[cell_record(0, 0, ClassificationLevel::Internal)]);

        let evaluation = evaluator
            .evaluate_range_two_tier(
                &index,
                SHEET,
                &CellRange::new(0, 0, 1, 1),
                &Classification::new(ClassificationLevel::Public),
                &DecisionOptions::default(),
                &CancelSignal::new(),
            )
            .expect("evaluate");

        assert!(evaluation.decision.is_allow());
    }

    // ── Audit resilience ──

    struct FailingSink;

    impl AuditSink for FailingSink {
        fn record(&self, _record: &AuditRecord) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("sink unavailable"))
        }
    }

    #[test]
    fn test_audit_failure_never_alters_the_decision() {
        let evaluator = EgressEvaluator::new(
            "ai_cloud_processing",
            redacting_policy(),
            Arc::new(FailingSink),
        );
        let index = index_with(&[]);

        let evaluation = evaluator
            .evaluate_range(
                &index,
                SHEET,
                &CellRange::cell(0, 0),
                &DecisionOptions::default(),
                &CancelSignal::new(),
            )
            .expect("evaluate");
        assert!(evaluation.decision.is_allow());
    }
}
