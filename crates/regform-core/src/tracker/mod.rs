//! Batch runs over the registered documents of one form kind.
//!
//! A run moves through `selected → in_progress → completed | aborted`.
//! Documents are parsed on a bounded worker pool in chunks; every chunk is
//! appended to the attempt history before the next one starts, so an
//! interrupted run leaves resumable history behind. Statistics are reduced
//! once all submitted documents are done and persisted as one immutable
//! [`IterationRun`].

mod aggregate;

pub use aggregate::{RunStats, aggregate, error_pattern};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::Utc;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::error::RunError;
use crate::extract::TemplateRegistry;
use crate::models::config::{RegformConfig, TrackerConfig};
use crate::models::form::FormKind;
use crate::models::iteration::{
    AttemptRecord, DocumentRef, IterationRun, RunStatus, SelectionMode, success_rate,
};
use crate::parse::DocumentParser;
use crate::source::{TableSource, fingerprint};
use crate::store::Store;

/// Parameters of one batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub form_kind: FormKind,
    pub iteration: u32,
    pub parser_version: String,
    /// Maximum documents to select; the configured default when `None`.
    pub batch_size: Option<usize>,
    pub mode: SelectionMode,
    pub notes: Option<String>,
}

impl RunRequest {
    pub fn new(form_kind: FormKind, iteration: u32, parser_version: impl Into<String>) -> Self {
        Self {
            form_kind,
            iteration,
            parser_version: parser_version.into(),
            batch_size: None,
            mode: SelectionMode::Fresh,
            notes: None,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn with_mode(mut self, mode: SelectionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// Statistics were persisted. Document failures are part of a completed run.
    Completed(IterationRun),
    /// The run stopped on a batch-level fault. History rows written before
    /// the fault are kept.
    Aborted {
        reason: RunError,
        documents_recorded: usize,
    },
}

impl RunOutcome {
    pub fn status(&self) -> RunStatus {
        match self {
            Self::Completed(_) => RunStatus::Completed,
            Self::Aborted { .. } => RunStatus::Aborted,
        }
    }

    pub fn run(&self) -> Option<&IterationRun> {
        match self {
            Self::Completed(run) => Some(run),
            Self::Aborted { .. } => None,
        }
    }
}

/// Progress callback: documents processed so far and documents selected.
type ProgressFn<'a> = Box<dyn Fn(usize, usize) + 'a>;

/// Runs iterations against a store and a table source.
pub struct IterationTracker<'a> {
    store: &'a dyn Store,
    source: &'a dyn TableSource,
    registry: TemplateRegistry,
    parser: DocumentParser,
    config: TrackerConfig,
    cancel: Arc<AtomicBool>,
    progress: Option<ProgressFn<'a>>,
}

impl<'a> IterationTracker<'a> {
    /// Create a tracker with the built-in templates.
    pub fn new(store: &'a dyn Store, source: &'a dyn TableSource, config: &RegformConfig) -> Self {
        Self {
            store,
            source,
            registry: TemplateRegistry::builtin(),
            parser: DocumentParser::new(&config.extraction),
            config: config.tracker.clone(),
            cancel: Arc::new(AtomicBool::new(false)),
            progress: None,
        }
    }

    pub fn with_registry(mut self, registry: TemplateRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Share an externally owned cancellation flag.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Called after each chunk has been recorded.
    pub fn with_progress(mut self, progress: impl Fn(usize, usize) + 'a) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    /// Flag that stops submission of further chunks once set.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Run one iteration.
    ///
    /// Usage errors (reused or non-increasing iteration number, zero batch
    /// size, no worker pool) are returned as `Err` before anything is written.
    /// An empty selection, a cancellation before the first chunk or a
    /// persistence fault yields [`RunOutcome::Aborted`].
    pub fn run_iteration(&self, request: &RunRequest) -> Result<RunOutcome, RunError> {
        let mut recorded = 0;
        match self.execute(request, &mut recorded) {
            Ok(run) => {
                info!(
                    form_kind = %run.form_kind,
                    iteration = run.iteration,
                    status = ?RunStatus::Completed,
                    total = run.total_docs,
                    success_rate = %run.success_rate,
                    "iteration completed"
                );
                Ok(RunOutcome::Completed(run))
            }
            Err(
                reason @ (RunError::SelectionEmpty { .. }
                | RunError::Cancelled { .. }
                | RunError::Persistence(_)),
            ) => {
                warn!(
                    form_kind = %request.form_kind,
                    iteration = request.iteration,
                    status = ?RunStatus::Aborted,
                    documents_recorded = recorded,
                    error = %reason,
                    "iteration aborted"
                );
                Ok(RunOutcome::Aborted {
                    reason,
                    documents_recorded: recorded,
                })
            }
            Err(err) => Err(err),
        }
    }

    fn execute(&self, request: &RunRequest, recorded: &mut usize) -> Result<IterationRun, RunError> {
        let started = Instant::now();
        let batch_size = request.batch_size.unwrap_or(self.config.batch_size);
        if batch_size == 0 {
            return Err(RunError::InvalidBatchSize);
        }
        self.check_iteration(request)?;

        let selected = self.select(request.form_kind, request.mode, batch_size)?;
        if selected.is_empty() {
            return Err(RunError::SelectionEmpty {
                form_kind: request.form_kind.to_string(),
                mode: request.mode.to_string(),
            });
        }
        info!(
            form_kind = %request.form_kind,
            iteration = request.iteration,
            mode = %request.mode,
            status = ?RunStatus::Selected,
            documents = selected.len(),
            "documents selected"
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers)
            .thread_name(|i| format!("regform-worker-{}", i))
            .build()
            .map_err(|e| RunError::WorkerPool(e.to_string()))?;

        debug!(status = ?RunStatus::InProgress, threads = pool.current_num_threads(), "processing");

        let source = self.source;
        let parser = &self.parser;
        let registry = &self.registry;
        let mut results = Vec::with_capacity(selected.len());
        let mut cancelled = false;

        for (index, chunk) in selected.chunks(self.config.chunk_size.max(1)).enumerate() {
            if self.cancel.load(Ordering::SeqCst) {
                warn!(processed = results.len(), "cancellation requested, no further documents submitted");
                cancelled = true;
                break;
            }

            let attempts: Vec<AttemptRecord> = pool.install(|| {
                chunk
                    .par_iter()
                    .map(|document| attempt(source, parser, registry, document, request))
                    .collect()
            });

            self.store.append_attempts(&attempts)?;
            *recorded += attempts.len();
            results.extend(attempts.into_iter().map(|a| a.result));

            info!(
                chunk = index + 1,
                processed = results.len(),
                total = selected.len(),
                "chunk recorded"
            );
            if let Some(progress) = &self.progress {
                progress(results.len(), selected.len());
            }
        }

        // A run over zero documents is never stored.
        if results.is_empty() {
            return Err(RunError::Cancelled {
                form_kind: request.form_kind.to_string(),
                iteration: request.iteration,
            });
        }

        let stats = aggregate(&results, self.config.sample_limit);
        let run = IterationRun {
            form_kind: request.form_kind,
            iteration: request.iteration,
            parser_version: request.parser_version.clone(),
            mode: request.mode,
            total_docs: stats.total,
            success_count: stats.success_count,
            failure_count: stats.failure_count,
            success_rate: success_rate(stats.success_count, stats.total),
            error_distribution: stats.error_distribution,
            top_error: stats.top_error,
            missing_fields: stats.missing_fields,
            field_hits: stats.field_hits,
            notes: request.notes.clone(),
            duration_ms: started.elapsed().as_millis() as u64,
            cancelled,
            created_at: Utc::now(),
        };

        self.store.insert_run(&run)?;
        Ok(run)
    }

    fn check_iteration(&self, request: &RunRequest) -> Result<(), RunError> {
        let kind = request.form_kind;
        if self.store.run(kind, request.iteration)?.is_some() {
            return Err(RunError::IterationExists {
                form_kind: kind.to_string(),
                iteration: request.iteration,
            });
        }
        match self.store.latest_iteration(kind)? {
            Some(latest) if request.iteration <= latest => Err(RunError::IterationNotIncreasing {
                form_kind: kind.to_string(),
                iteration: request.iteration,
                latest,
            }),
            _ => Ok(()),
        }
    }

    /// Candidate documents, re-derived from persisted history every time.
    fn select(
        &self,
        kind: FormKind,
        mode: SelectionMode,
        batch_size: usize,
    ) -> Result<Vec<DocumentRef>, RunError> {
        let documents = self.store.documents(kind)?;
        let selected = match mode {
            SelectionMode::ReparseAll => documents.into_iter().take(batch_size).collect(),
            SelectionMode::Fresh => {
                let latest = self.store.latest_attempts(kind)?;
                documents
                    .into_iter()
                    .filter(|d| !latest.contains_key(&d.id))
                    .take(batch_size)
                    .collect()
            }
            SelectionMode::ReparseFailed => {
                let latest = self.store.latest_attempts(kind)?;
                documents
                    .into_iter()
                    .filter(|d| latest.get(&d.id).is_some_and(|a| !a.result.success()))
                    .take(batch_size)
                    .collect()
            }
        };
        Ok(selected)
    }
}

/// Parse one document. Runs on a worker thread.
fn attempt(
    source: &dyn TableSource,
    parser: &DocumentParser,
    registry: &TemplateRegistry,
    document: &DocumentRef,
    request: &RunRequest,
) -> AttemptRecord {
    let input = source.tables(document);
    let input_fingerprint = input.as_ref().ok().map(|e| fingerprint(&e.tables));
    let result = parser.parse(document, &request.parser_version, registry, input.as_ref());
    AttemptRecord {
        document_id: document.id.clone(),
        form_kind: request.form_kind,
        iteration: request.iteration,
        input_fingerprint,
        result,
        recorded_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::models::result::ErrorKind;
    use crate::models::table::{RawTable, TableExtraction};
    use crate::source::memory::MemoryTableSource;
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::collections::HashMap;
    use std::str::FromStr;

    fn dividend(with_rut: bool) -> TableExtraction {
        let mut rows = vec![vec![Some("Razón Social"), None, Some("Banco Ejemplo S.A.")]];
        if with_rut {
            rows.push(vec![Some("RUT"), Some("97.004.000-5")]);
        }
        rows.push(vec![Some("Fecha de pago"), Some("Monto por acción")]);
        rows.push(vec![Some("15/05/2024"), Some("$ 120,50")]);
        TableExtraction::from_tables(vec![RawTable::from_rows(rows)])
    }

    /// Three good dividend notices and one without the issuer RUT.
    fn fixture() -> (MemoryStore, MemoryTableSource) {
        let store = MemoryStore::new();
        let source = MemoryTableSource::default();
        for (id, good) in [("d1", true), ("d2", false), ("d3", true), ("d4", true)] {
            store.register_document(&DocumentRef::new(id, "dividend")).unwrap();
            source.insert(id, dividend(good));
        }
        store.register_document(&DocumentRef::new("s1", "shareholding")).unwrap();
        (store, source)
    }

    fn request(iteration: u32) -> RunRequest {
        RunRequest::new(FormKind::Dividend, iteration, format!("v{}", iteration))
    }

    fn completed(outcome: RunOutcome) -> IterationRun {
        match outcome {
            RunOutcome::Completed(run) => run,
            RunOutcome::Aborted { reason, .. } => panic!("run aborted: {}", reason),
        }
    }

    #[test]
    fn test_fresh_run_aggregates() {
        let (store, source) = fixture();
        let tracker = IterationTracker::new(&store, &source, &RegformConfig::default());

        let run = completed(tracker.run_iteration(&request(1).with_notes("baseline")).unwrap());

        assert_eq!(run.total_docs, 4);
        assert_eq!(run.success_count, 3);
        assert_eq!(run.failure_count, 1);
        assert_eq!(run.success_rate, Decimal::from_str("75.00").unwrap());
        assert_eq!(run.error_distribution[&ErrorKind::MissingCriticalFields], 1);
        assert_eq!(run.missing_fields["rut_emisor"], 1);
        assert_eq!(run.field_hits["razon_social"], 4);
        assert_eq!(run.field_hits.get("rut_emisor"), Some(&3));
        assert_eq!(run.notes.as_deref(), Some("baseline"));
        assert!(!run.cancelled);

        let top = run.top_error.as_ref().unwrap();
        assert_eq!(top.pattern, "missing_critical_fields: missing critical fields: rut_emisor");
        assert_eq!(top.examples, vec!["d2"]);

        assert_eq!(store.run(FormKind::Dividend, 1).unwrap(), Some(run));
        let history = store.iteration_attempts(FormKind::Dividend, 1).unwrap();
        assert_eq!(history.len(), 4);
        assert!(history.iter().all(|a| a.input_fingerprint.is_some()));
    }

    #[test]
    fn test_empty_selection_aborts() {
        let (store, source) = fixture();
        let tracker = IterationTracker::new(&store, &source, &RegformConfig::default());
        completed(tracker.run_iteration(&request(1)).unwrap());

        let outcome = tracker.run_iteration(&request(2)).unwrap();

        assert_eq!(outcome.status(), RunStatus::Aborted);
        assert!(matches!(
            outcome,
            RunOutcome::Aborted {
                reason: RunError::SelectionEmpty { .. },
                documents_recorded: 0
            }
        ));
        assert_eq!(store.run(FormKind::Dividend, 2).unwrap(), None);
    }

    #[test]
    fn test_reparse_failed_selects_only_failures() {
        let (store, source) = fixture();
        let tracker = IterationTracker::new(&store, &source, &RegformConfig::default());
        completed(tracker.run_iteration(&request(1)).unwrap());

        source.insert("d2", dividend(true));
        let run = completed(
            tracker
                .run_iteration(&request(2).with_mode(SelectionMode::ReparseFailed))
                .unwrap(),
        );

        assert_eq!(run.total_docs, 1);
        assert_eq!(run.success_count, 1);
        assert_eq!(run.success_rate, Decimal::from_str("100.00").unwrap());

        let latest = store.latest_attempts(FormKind::Dividend).unwrap();
        assert!(latest.values().all(|a| a.result.success()));
        assert_eq!(latest["d2"].iteration, 2);
        assert_eq!(latest["d1"].iteration, 1);
    }

    #[test]
    fn test_reparse_all_honours_batch_size() {
        let (store, source) = fixture();
        let tracker = IterationTracker::new(&store, &source, &RegformConfig::default());

        let run = completed(
            tracker
                .run_iteration(&request(1).with_mode(SelectionMode::ReparseAll).with_batch_size(2))
                .unwrap(),
        );
        assert_eq!(run.total_docs, 2);
        assert_eq!(run.mode, SelectionMode::ReparseAll);

        let fresh = completed(tracker.run_iteration(&request(2)).unwrap());
        assert_eq!(fresh.total_docs, 2, "only the two untouched documents are fresh");
    }

    #[test]
    fn test_iteration_numbers_are_guarded() {
        let (store, source) = fixture();
        let tracker = IterationTracker::new(&store, &source, &RegformConfig::default());
        completed(tracker.run_iteration(&request(3).with_mode(SelectionMode::ReparseAll)).unwrap());

        let reused = tracker.run_iteration(&request(3).with_mode(SelectionMode::ReparseAll));
        assert!(matches!(reused, Err(RunError::IterationExists { iteration: 3, .. })));

        let lower = tracker.run_iteration(&request(2).with_mode(SelectionMode::ReparseAll));
        assert!(matches!(
            lower,
            Err(RunError::IterationNotIncreasing { iteration: 2, latest: 3, .. })
        ));

        let zero = tracker.run_iteration(&request(4).with_batch_size(0));
        assert!(matches!(zero, Err(RunError::InvalidBatchSize)));

        assert_eq!(store.iteration_attempts(FormKind::Dividend, 2).unwrap().len(), 0);
    }

    #[test]
    fn test_unreadable_tables_are_document_failures() {
        let store = MemoryStore::new();
        let source = MemoryTableSource::default();
        store.register_document(&DocumentRef::new("gone", "dividend")).unwrap();
        let tracker = IterationTracker::new(&store, &source, &RegformConfig::default());

        let run = completed(tracker.run_iteration(&request(1)).unwrap());

        assert_eq!(run.failure_count, 1);
        assert_eq!(run.error_distribution[&ErrorKind::ExtractionException], 1);
        let history = store.iteration_attempts(FormKind::Dividend, 1).unwrap();
        assert_eq!(history[0].input_fingerprint, None);
    }

    #[test]
    fn test_cancellation_between_chunks() {
        let (store, source) = fixture();
        let mut config = RegformConfig::default();
        config.tracker.chunk_size = 1;
        config.tracker.workers = 2;

        let cancel = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancel);
        let tracker = IterationTracker::new(&store, &source, &config)
            .with_cancel_flag(cancel)
            .with_progress(move |done, _| {
                if done == 2 {
                    flag.store(true, Ordering::SeqCst);
                }
            });

        let run = completed(tracker.run_iteration(&request(1)).unwrap());

        assert!(run.cancelled);
        assert_eq!(run.total_docs, 2);
        assert_eq!(store.iteration_attempts(FormKind::Dividend, 1).unwrap().len(), 2);
    }

    #[test]
    fn test_cancellation_before_first_chunk_stores_nothing() {
        let (store, source) = fixture();
        let tracker = IterationTracker::new(&store, &source, &RegformConfig::default())
            .with_cancel_flag(Arc::new(AtomicBool::new(true)));

        let outcome = tracker.run_iteration(&request(1)).unwrap();

        assert_eq!(outcome.status(), RunStatus::Aborted);
        assert!(matches!(
            outcome,
            RunOutcome::Aborted {
                reason: RunError::Cancelled { iteration: 1, .. },
                documents_recorded: 0
            }
        ));
        assert_eq!(store.run(FormKind::Dividend, 1).unwrap(), None);
        assert!(store.latest_attempts(FormKind::Dividend).unwrap().is_empty());

        // The iteration number is still free.
        let tracker = IterationTracker::new(&store, &source, &RegformConfig::default());
        let run = completed(tracker.run_iteration(&request(1)).unwrap());
        assert_eq!(run.total_docs, 4);
    }

    /// Delegates to a memory store but refuses to persist run snapshots.
    struct BrokenRuns(MemoryStore);

    impl Store for BrokenRuns {
        fn register_document(&self, document: &DocumentRef) -> Result<bool, StoreError> {
            self.0.register_document(document)
        }

        fn documents(&self, kind: FormKind) -> Result<Vec<DocumentRef>, StoreError> {
            self.0.documents(kind)
        }

        fn append_attempt(&self, record: &AttemptRecord) -> Result<(), StoreError> {
            self.0.append_attempt(record)
        }

        fn latest_attempts(&self, kind: FormKind) -> Result<HashMap<String, AttemptRecord>, StoreError> {
            self.0.latest_attempts(kind)
        }

        fn iteration_attempts(&self, kind: FormKind, iteration: u32) -> Result<Vec<AttemptRecord>, StoreError> {
            self.0.iteration_attempts(kind, iteration)
        }

        fn insert_run(&self, _run: &IterationRun) -> Result<(), StoreError> {
            Err(StoreError::Poisoned)
        }

        fn run(&self, kind: FormKind, iteration: u32) -> Result<Option<IterationRun>, StoreError> {
            self.0.run(kind, iteration)
        }

        fn runs(&self, kind: FormKind) -> Result<Vec<IterationRun>, StoreError> {
            self.0.runs(kind)
        }
    }

    #[test]
    fn test_persistence_failure_keeps_history() {
        let (inner, source) = fixture();
        let store = BrokenRuns(inner);
        let tracker = IterationTracker::new(&store, &source, &RegformConfig::default());

        let outcome = tracker.run_iteration(&request(1)).unwrap();

        match outcome {
            RunOutcome::Aborted {
                reason: RunError::Persistence(_),
                documents_recorded,
            } => assert_eq!(documents_recorded, 4),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(store.latest_attempts(FormKind::Dividend).unwrap().len(), 4);

        // Nothing was stored under iteration 1, so the failed documents can be resumed.
        let resumed = tracker
            .run_iteration(&request(1).with_mode(SelectionMode::ReparseFailed))
            .unwrap();
        assert!(matches!(resumed, RunOutcome::Aborted { documents_recorded: 1, .. }));
    }
}
