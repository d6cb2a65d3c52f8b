//! Core library for Chilean regulatory filing parsing.
//!
//! This crate provides:
//! - Label-driven field extraction from layout-unstable tables
//! - Normalization of RUT identifiers, Spanish dates and es-CL amounts
//! - Total per-document parsing into `ParseResult` values
//! - Iteration tracking over batches with SQLite-backed attempt history
//! - Iteration comparison with per-document regression detection

pub mod compare;
pub mod error;
pub mod extract;
pub mod models;
pub mod normalize;
pub mod parse;
pub mod source;
pub mod store;
pub mod tracker;

pub use compare::{Comparator, Comparison, DocumentChange, Feedback, IterationPoint};
pub use error::{RegformError, Result, RunError, SourceError, StoreError};
pub use extract::{TableFieldExtractor, TemplateExtractor, TemplateRegistry};
pub use models::config::RegformConfig;
pub use models::form::{FieldSpec, FieldType, FormKind, FormTemplate};
pub use models::iteration::{AttemptRecord, DocumentRef, IterationRun, SelectionMode};
pub use models::result::{ErrorKind, NormalizationOutcome, NormalizedField, ParseResult};
pub use models::table::{RawTable, TableExtraction};
pub use parse::DocumentParser;
pub use source::{JsonTableSource, TableSource};
pub use store::{MemoryStore, SqliteStore, Store};
pub use tracker::{IterationTracker, RunOutcome, RunRequest};
