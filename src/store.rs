//! Classification record storage contract.
//!
//! Indices consume an immutable snapshot of records per logical operation;
//! where those records live is external. [`ClassificationStore`] is the
//! listing contract the core consumes, and [`InMemoryStore`] a minimal
//! implementation for tests and small deployments. The core never writes
//! records back — indices are derived views, not the system of record.

use std::sync::Mutex;

use crate::types::ClassificationRecord;

/// Source of classification records, keyed by document.
pub trait ClassificationStore: Send + Sync {
    /// All records attached to the given document.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn list(&self, document_id: &str) -> anyhow::Result<Vec<ClassificationRecord>>;
}

/// Vector-backed store guarded by a mutex.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: Mutex<Vec<ClassificationRecord>>,
}

impl InMemoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the store mutex is poisoned.
    pub fn insert(&self, record: ClassificationRecord) -> anyhow::Result<()> {
        self.records
            .lock()
            .map_err(|_| anyhow::anyhow!("classification store mutex poisoned"))?
            .push(record);
        Ok(())
    }
}

impl ClassificationStore for InMemoryStore {
    fn list(&self, document_id: &str) -> anyhow::Result<Vec<ClassificationRecord>> {
        let records = self
            .records
            .lock()
            .map_err(|_| anyhow::anyhow!("classification store mutex poisoned"))?;
        Ok(records
            .iter()
            .filter(|record| record.selector.document_id() == document_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Classification, ClassificationLevel, Selector};

    fn doc_record(document_id: &str) -> ClassificationRecord {
        ClassificationRecord {
            selector: Selector::Document {
                document_id: document_id.to_owned(),
            },
            classification: Classification::new(ClassificationLevel::Internal),
        }
    }

    #[test]
    fn test_list_filters_by_document() {
        let store = InMemoryStore::new();
        store.insert(doc_record("doc-1")).expect("insert");
        store.insert(doc_record("doc-2")).expect("insert");
        store.insert(doc_record("doc-1")).expect("insert");

        let records = store.list("doc-1").expect("list");
        assert_eq!(records.len(), 2);
        assert!(records
            .iter()
            .all(|record| record.selector.document_id() == "doc-1"));
        assert!(store.list("doc-3").expect("list").is_empty());
    }
}
