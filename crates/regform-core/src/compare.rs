//! Read-only reporting over stored iterations.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::StoreError;
use crate::models::form::FormKind;
use crate::models::iteration::{AttemptRecord, IterationRun};
use crate::models::result::ErrorKind;
use crate::store::Store;

/// Success rate of one iteration and its change from the previous one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IterationPoint {
    pub iteration: u32,
    pub parser_version: String,
    pub total_docs: usize,
    pub success_rate: Decimal,
    /// `None` for the first iteration.
    pub delta: Option<Decimal>,
}

/// A document whose outcome flipped since its previous attempt in a stored iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentChange {
    pub document_id: String,
    pub from_iteration: u32,
    pub to_iteration: u32,
    /// Error kind on the failing side.
    pub error_kind: Option<ErrorKind>,
    pub error_detail: Option<String>,
}

/// All iterations of a form kind side by side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comparison {
    pub form_kind: FormKind,
    pub points: Vec<IterationPoint>,
    /// Succeeded earlier, failed later on unchanged input.
    pub regressions: Vec<DocumentChange>,
    /// Failed earlier, succeeded later on unchanged input.
    pub improvements: Vec<DocumentChange>,
}

/// A failed document of one iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedDocument {
    pub document_id: String,
    pub error_kind: Option<ErrorKind>,
    pub error_detail: Option<String>,
    pub missing_critical_fields: Vec<String>,
}

/// Stored statistics of one iteration plus its failed documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Feedback {
    pub run: IterationRun,
    pub failures: Vec<FailedDocument>,
}

pub struct Comparator<'a> {
    store: &'a dyn Store,
}

impl<'a> Comparator<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Feedback for one iteration, `None` when it was never stored.
    pub fn feedback(&self, kind: FormKind, iteration: u32) -> Result<Option<Feedback>, StoreError> {
        let Some(run) = self.store.run(kind, iteration)? else {
            return Ok(None);
        };
        let failures = self
            .store
            .iteration_attempts(kind, iteration)?
            .into_iter()
            .filter(|a| !a.result.success())
            .map(|a| FailedDocument {
                error_kind: a.result.error_kind(),
                error_detail: a.result.error_detail().map(str::to_string),
                missing_critical_fields: a.result.missing_critical_fields().iter().cloned().collect(),
                document_id: a.document_id,
            })
            .collect();
        Ok(Some(Feedback { run, failures }))
    }

    /// Compare every stored iteration of `kind` in ascending order.
    pub fn compare(&self, kind: FormKind) -> Result<Comparison, StoreError> {
        let runs = self.store.runs(kind)?;

        let mut points = Vec::with_capacity(runs.len());
        let mut previous: Option<Decimal> = None;
        for run in &runs {
            points.push(IterationPoint {
                iteration: run.iteration,
                parser_version: run.parser_version.clone(),
                total_docs: run.total_docs,
                success_rate: run.success_rate,
                delta: previous.map(|p| run.success_rate - p),
            });
            previous = Some(run.success_rate);
        }

        // Latest attempt of each document among the stored iterations walked so far.
        let mut last_known: HashMap<String, AttemptRecord> = HashMap::new();
        let mut regressions = Vec::new();
        let mut improvements = Vec::new();
        for run in &runs {
            let to = run.iteration;
            for later in self.store.iteration_attempts(kind, to)? {
                if let Some(before) = last_known.get(&later.document_id) {
                    if same_input(before, &later) {
                        let from = before.iteration;
                        match (before.result.success(), later.result.success()) {
                            (true, false) => regressions.push(change(from, to, &later)),
                            (false, true) => improvements.push(change(from, to, before)),
                            _ => {}
                        }
                    }
                }
                last_known.insert(later.document_id.clone(), later);
            }
        }

        Ok(Comparison {
            form_kind: kind,
            points,
            regressions,
            improvements,
        })
    }
}

/// Inputs match only when both fingerprints are known and equal.
fn same_input(a: &AttemptRecord, b: &AttemptRecord) -> bool {
    matches!((&a.input_fingerprint, &b.input_fingerprint), (Some(x), Some(y)) if x == y)
}

fn change(from: u32, to: u32, failing: &AttemptRecord) -> DocumentChange {
    DocumentChange {
        document_id: failing.document_id.clone(),
        from_iteration: from,
        to_iteration: to,
        error_kind: failing.result.error_kind(),
        error_detail: failing.result.error_detail().map(str::to_string),
    }
}
