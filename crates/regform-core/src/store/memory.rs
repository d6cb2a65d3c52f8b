//! In-process store for tests and dry runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use crate::error::StoreError;
use crate::models::form::FormKind;
use crate::models::iteration::{AttemptRecord, DocumentRef, IterationRun};

use super::Store;

#[derive(Debug, Default)]
struct Inner {
    documents: BTreeMap<String, DocumentRef>,
    attempts: Vec<AttemptRecord>,
    runs: BTreeMap<(FormKind, u32), IterationRun>,
}

/// A [`Store`] kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl Store for MemoryStore {
    fn register_document(&self, document: &DocumentRef) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        if inner.documents.contains_key(&document.id) {
            return Ok(false);
        }
        inner.documents.insert(document.id.clone(), document.clone());
        Ok(true)
    }

    fn documents(&self, kind: FormKind) -> Result<Vec<DocumentRef>, StoreError> {
        Ok(self
            .lock()?
            .documents
            .values()
            .filter(|d| d.form_kind == kind.code())
            .cloned()
            .collect())
    }

    fn append_attempt(&self, record: &AttemptRecord) -> Result<(), StoreError> {
        self.lock()?.attempts.push(record.clone());
        Ok(())
    }

    fn latest_attempts(&self, kind: FormKind) -> Result<HashMap<String, AttemptRecord>, StoreError> {
        let inner = self.lock()?;
        let mut latest = HashMap::new();
        for record in inner.attempts.iter().filter(|r| r.form_kind == kind) {
            latest.insert(record.document_id.clone(), record.clone());
        }
        Ok(latest)
    }

    fn iteration_attempts(&self, kind: FormKind, iteration: u32) -> Result<Vec<AttemptRecord>, StoreError> {
        let inner = self.lock()?;
        let mut latest = BTreeMap::new();
        for record in inner
            .attempts
            .iter()
            .filter(|r| r.form_kind == kind && r.iteration == iteration)
        {
            latest.insert(record.document_id.clone(), record.clone());
        }
        Ok(latest.into_values().collect())
    }

    fn insert_run(&self, run: &IterationRun) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let key = (run.form_kind, run.iteration);
        if inner.runs.contains_key(&key) {
            return Err(StoreError::Duplicate {
                form_kind: run.form_kind.to_string(),
                iteration: run.iteration,
            });
        }
        inner.runs.insert(key, run.clone());
        Ok(())
    }

    fn run(&self, kind: FormKind, iteration: u32) -> Result<Option<IterationRun>, StoreError> {
        Ok(self.lock()?.runs.get(&(kind, iteration)).cloned())
    }

    fn runs(&self, kind: FormKind) -> Result<Vec<IterationRun>, StoreError> {
        Ok(self
            .lock()?
            .runs
            .range((kind, 0)..=(kind, u32::MAX))
            .map(|(_, run)| run.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fixtures::exercise_store;

    #[test]
    fn test_memory_store() {
        exercise_store(&MemoryStore::new());
    }
}
