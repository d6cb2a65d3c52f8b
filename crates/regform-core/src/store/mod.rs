//! Persistence of documents, attempt history and iteration runs.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use std::collections::HashMap;

use crate::error::StoreError;
use crate::models::form::FormKind;
use crate::models::iteration::{AttemptRecord, DocumentRef, IterationRun};

/// Storage backend used by the tracker and comparator.
///
/// Attempt history is append-only. An iteration run is written in a single
/// atomic step and is never updated afterwards.
pub trait Store {
    /// Register a document. Returns false when it was already known.
    fn register_document(&self, document: &DocumentRef) -> Result<bool, StoreError>;

    /// Documents declared as `kind`, ordered by id.
    fn documents(&self, kind: FormKind) -> Result<Vec<DocumentRef>, StoreError>;

    /// Append one attempt history row.
    fn append_attempt(&self, record: &AttemptRecord) -> Result<(), StoreError>;

    /// Append several attempt history rows.
    fn append_attempts(&self, records: &[AttemptRecord]) -> Result<(), StoreError> {
        records.iter().try_for_each(|r| self.append_attempt(r))
    }

    /// Most recent attempt of each document of `kind`, keyed by document id.
    fn latest_attempts(&self, kind: FormKind) -> Result<HashMap<String, AttemptRecord>, StoreError>;

    /// Most recent attempt of each document within one iteration, ordered by document id.
    fn iteration_attempts(&self, kind: FormKind, iteration: u32) -> Result<Vec<AttemptRecord>, StoreError>;

    /// Persist a run snapshot. Fails with [`StoreError::Duplicate`] if the key exists.
    fn insert_run(&self, run: &IterationRun) -> Result<(), StoreError>;

    fn run(&self, kind: FormKind, iteration: u32) -> Result<Option<IterationRun>, StoreError>;

    /// All runs of `kind` in ascending iteration order.
    fn runs(&self, kind: FormKind) -> Result<Vec<IterationRun>, StoreError>;

    /// Highest stored iteration number of `kind`.
    fn latest_iteration(&self, kind: FormKind) -> Result<Option<u32>, StoreError> {
        Ok(self.runs(kind)?.last().map(|r| r.iteration))
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::collections::{BTreeMap, BTreeSet};

    use chrono::Utc;
    use rust_decimal::Decimal;

    use crate::models::iteration::{SelectionMode, success_rate};
    use crate::models::result::{ErrorKind, ParseResult};

    use super::*;

    pub fn attempt(document_id: &str, iteration: u32, success: bool, fingerprint: &str) -> AttemptRecord {
        let result = if success {
            ParseResult::new(document_id, "dividend", "v1", BTreeMap::new(), BTreeSet::new(), None)
        } else {
            ParseResult::failed(
                document_id,
                "dividend",
                "v1",
                ErrorKind::MissingCriticalFields,
                "missing critical fields: rut_emisor",
            )
        };
        AttemptRecord {
            document_id: document_id.to_string(),
            form_kind: FormKind::Dividend,
            iteration,
            input_fingerprint: Some(fingerprint.to_string()),
            result,
            recorded_at: Utc::now(),
        }
    }

    pub fn run(iteration: u32, success_count: usize, total_docs: usize) -> IterationRun {
        IterationRun {
            form_kind: FormKind::Dividend,
            iteration,
            parser_version: format!("v{}", iteration),
            mode: SelectionMode::ReparseAll,
            total_docs,
            success_count,
            failure_count: total_docs - success_count,
            success_rate: success_rate(success_count, total_docs),
            error_distribution: BTreeMap::new(),
            top_error: None,
            missing_fields: BTreeMap::new(),
            field_hits: BTreeMap::new(),
            notes: None,
            duration_ms: 12,
            cancelled: false,
            created_at: Utc::now(),
        }
    }

    /// Behaviour every store must share.
    pub fn exercise_store(store: &dyn Store) {
        assert!(store.register_document(&DocumentRef::new("b", "dividend")).unwrap());
        assert!(store.register_document(&DocumentRef::new("a", "dividend")).unwrap());
        assert!(!store.register_document(&DocumentRef::new("a", "dividend")).unwrap());
        store.register_document(&DocumentRef::new("z", "shareholding")).unwrap();

        let ids: Vec<String> = store
            .documents(FormKind::Dividend)
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);

        store.append_attempt(&attempt("a", 1, false, "fa")).unwrap();
        store
            .append_attempts(&[attempt("b", 1, true, "fb"), attempt("a", 1, true, "fa")])
            .unwrap();
        store.append_attempt(&attempt("a", 2, false, "fa")).unwrap();

        let latest = store.latest_attempts(FormKind::Dividend).unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest["a"].iteration, 2);
        assert!(!latest["a"].result.success());
        assert!(latest["b"].result.success());
        assert!(store.latest_attempts(FormKind::EssentialFact).unwrap().is_empty());

        let first = store.iteration_attempts(FormKind::Dividend, 1).unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].document_id, "a");
        assert!(first[0].result.success(), "latest attempt within the iteration wins");
        assert_eq!(first[0].input_fingerprint.as_deref(), Some("fa"));

        assert_eq!(store.latest_iteration(FormKind::Dividend).unwrap(), None);
        store.insert_run(&run(2, 1, 2)).unwrap();
        store.insert_run(&run(1, 1, 3)).unwrap();
        assert!(matches!(
            store.insert_run(&run(1, 3, 3)),
            Err(StoreError::Duplicate { .. })
        ));

        let stored = store.run(FormKind::Dividend, 1).unwrap().unwrap();
        assert_eq!(stored.success_count, 1);
        assert_eq!(stored.success_rate, Decimal::new(3333, 2));
        assert!(store.run(FormKind::Dividend, 7).unwrap().is_none());

        let iterations: Vec<u32> = store
            .runs(FormKind::Dividend)
            .unwrap()
            .iter()
            .map(|r| r.iteration)
            .collect();
        assert_eq!(iterations, vec![1, 2]);
        assert_eq!(store.latest_iteration(FormKind::Dividend).unwrap(), Some(2));
    }
}
