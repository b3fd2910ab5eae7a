//! Audit contract — structured decision records for an external sink.
//!
//! The core performs no audit I/O itself. After every egress decision it
//! hands a serializable [`AuditRecord`] to the injected [`AuditSink`]; sink
//! implementations (append-only files, event buses) live outside the crate.
//! Secrets never appear here: records carry classifications and counters,
//! not cell content.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::guard::{BuildStats, QueryStats};
use crate::types::{Classification, Decision};

/// A single structured audit entry for one egress decision.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    /// Unique id for cross-referencing with caller logs.
    pub audit_id: Uuid,
    /// When the decision was made.
    pub timestamp: DateTime<Utc>,
    /// The protected action the policy belongs to.
    pub action: String,
    /// Document the query targeted.
    pub document_id: String,
    /// Sheet the query targeted.
    pub sheet_id: String,
    /// The decision produced.
    pub decision: Decision,
    /// The effective classification the decision was based on.
    pub classification: Classification,
    /// Index build counters for the backing document index.
    pub build: BuildStats,
    /// Query counters for this decision's range scan.
    pub query: QueryStats,
}

impl AuditRecord {
    /// Assemble a record for one decision, stamping id and timestamp.
    #[must_use]
    pub fn new(
        action: impl Into<String>,
        document_id: impl Into<String>,
        sheet_id: impl Into<String>,
        decision: Decision,
        classification: Classification,
        build: BuildStats,
        query: QueryStats,
    ) -> Self {
        Self {
            audit_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            action: action.into(),
            document_id: document_id.into(),
            sheet_id: sheet_id.into(),
            decision,
            classification,
            build,
            query,
        }
    }
}

/// Destination for audit records. Implementations are external; failures
/// are reported to the caller's diagnostics and never alter decisions.
pub trait AuditSink: Send + Sync {
    /// Record one decision.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink cannot accept the record.
    fn record(&self, record: &AuditRecord) -> anyhow::Result<()>;
}

/// In-memory sink holding JSON lines, for tests and diagnostics.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<String>>,
}

impl MemorySink {
    /// An empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded JSON lines.
    ///
    /// # Panics
    ///
    /// Panics if a previous writer panicked while holding the lock.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().expect("audit sink lock").clone()
    }
}

impl AuditSink for MemorySink {
    fn record(&self, record: &AuditRecord) -> anyhow::Result<()> {
        let line = serde_json::to_string(record)?;
        self.entries
            .lock()
            .map_err(|_| anyhow::anyhow!("audit sink mutex poisoned"))?
            .push(line);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClassificationLevel;

    #[test]
    fn test_memory_sink_records_json_lines() {
        let sink = MemorySink::new();
        let record = AuditRecord::new(
            "ai_cloud_processing",
            "doc-1",
            "S1",
            Decision::Block,
            Classification::with_labels(ClassificationLevel::Restricted, ["pii"]),
            BuildStats::default(),
            QueryStats::default(),
        );
        sink.record(&record).expect("record");

        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].contains("\"outcome\":\"block\""));
        assert!(entries[0].contains("\"level\":\"restricted\""));
        assert!(entries[0].contains("pii"));
    }
}
