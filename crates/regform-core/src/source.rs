//! Table extraction collaborator.
//!
//! Extraction of tables from the original documents happens upstream; this
//! crate only reads what that step produced.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::SourceError;
use crate::models::iteration::DocumentRef;
use crate::models::table::{RawTable, TableExtraction};

/// Provides the tables of a document.
pub trait TableSource: Sync {
    fn tables(&self, document: &DocumentRef) -> Result<TableExtraction, SourceError>;
}

/// Reads `<dir>/<document_id>.json` files of the shape
/// `{"tables": [[[cell or null, ...], ...], ...], "text": "..."}`.
#[derive(Debug, Clone)]
pub struct JsonTableSource {
    dir: PathBuf,
}

impl JsonTableSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, document_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", document_id))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl TableSource for JsonTableSource {
    fn tables(&self, document: &DocumentRef) -> Result<TableExtraction, SourceError> {
        let path = self.path_for(&document.id);
        let content = std::fs::read_to_string(&path).map_err(|source| SourceError::Read {
            document_id: document.id.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| SourceError::Malformed {
            document_id: document.id.clone(),
            source,
        })
    }
}

/// SHA-256 over the serialized tables, used to tell whether a document's
/// input changed between iterations.
pub fn fingerprint(tables: &[RawTable]) -> String {
    let mut hasher = Sha256::new();
    for table in tables {
        hasher.update(b"table");
        for row in &table.rows {
            hasher.update(b"\x1erow");
            for cell in row {
                match cell {
                    Some(text) => {
                        hasher.update(b"\x1f+");
                        hasher.update(text.as_bytes());
                    }
                    None => hasher.update(b"\x1f-"),
                }
            }
        }
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
pub(crate) mod memory {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// In-memory table source for tests.
    #[derive(Debug, Default)]
    pub struct MemoryTableSource {
        tables: Mutex<HashMap<String, TableExtraction>>,
    }

    impl MemoryTableSource {
        pub fn insert(&self, document_id: &str, extraction: TableExtraction) {
            self.tables
                .lock()
                .unwrap()
                .insert(document_id.to_string(), extraction);
        }
    }

    impl TableSource for MemoryTableSource {
        fn tables(&self, document: &DocumentRef) -> Result<TableExtraction, SourceError> {
            self.tables
                .lock()
                .unwrap()
                .get(&document.id)
                .cloned()
                .ok_or_else(|| SourceError::Read {
                    document_id: document.id.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "no tables"),
                })
        }
    }
}
