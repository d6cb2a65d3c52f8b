//! Iteration runs and per-document attempt history.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::form::FormKind;
use super::result::{ErrorKind, ParseResult};

/// A document registered for parsing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentRef {
    pub id: String,
    /// Form kind code as declared by the document source.
    pub form_kind: String,
}

impl DocumentRef {
    pub fn new(id: impl Into<String>, form_kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            form_kind: form_kind.into(),
        }
    }
}

/// Which documents a run picks up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// Documents never attempted for this form kind.
    Fresh,
    /// Documents whose most recent attempt failed.
    ReparseFailed,
    /// Any documents, regardless of history.
    ReparseAll,
}

impl SelectionMode {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::ReparseFailed => "reparse_failed",
            Self::ReparseAll => "reparse_all",
        }
    }
}

impl fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for SelectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "fresh" => Ok(Self::Fresh),
            "reparse_failed" => Ok(Self::ReparseFailed),
            "reparse_all" => Ok(Self::ReparseAll),
            other => Err(format!("unknown selection mode: {}", other)),
        }
    }
}

/// Lifecycle of a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Selected,
    InProgress,
    Completed,
    Aborted,
}

/// One row of document attempt history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub document_id: String,
    pub form_kind: FormKind,
    pub iteration: u32,
    /// SHA-256 of the input tables, absent when the tables could not be read.
    pub input_fingerprint: Option<String>,
    pub result: ParseResult,
    pub recorded_at: DateTime<Utc>,
}

/// The dominant failure pattern of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPattern {
    pub pattern: String,
    pub count: usize,
    /// Bounded sample of offending document ids.
    pub examples: Vec<String>,
}

/// Immutable statistics snapshot of one iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationRun {
    pub form_kind: FormKind,
    pub iteration: u32,
    pub parser_version: String,
    pub mode: SelectionMode,
    pub total_docs: usize,
    pub success_count: usize,
    pub failure_count: usize,
    /// Percentage with two decimals.
    pub success_rate: Decimal,
    pub error_distribution: BTreeMap<ErrorKind, usize>,
    pub top_error: Option<ErrorPattern>,
    pub missing_fields: BTreeMap<String, usize>,
    /// Number of documents in which each field was extracted.
    pub field_hits: BTreeMap<String, usize>,
    pub notes: Option<String>,
    pub duration_ms: u64,
    /// True when the run stopped submitting documents early.
    pub cancelled: bool,
    pub created_at: DateTime<Utc>,
}

impl IterationRun {
    /// Success rate recomputed from the stored counts.
    pub fn recomputed_rate(&self) -> Decimal {
        success_rate(self.success_count, self.total_docs)
    }
}

/// Percentage of successes rounded to two decimals. Zero when `total` is zero.
pub fn success_rate(success: usize, total: usize) -> Decimal {
    if total == 0 {
        return Decimal::new(0, 2);
    }
    let mut rate =
        (Decimal::from(success as u64) * Decimal::ONE_HUNDRED / Decimal::from(total as u64)).round_dp(2);
    rate.rescale(2);
    rate
}
