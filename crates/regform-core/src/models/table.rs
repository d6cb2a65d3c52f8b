//! Raw tables handed over by the table extraction collaborator.

use serde::{Deserialize, Serialize};

/// A table as rows of optional cells. `None` marks a merged or empty region.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawTable {
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    pub fn new(rows: Vec<Vec<Option<String>>>) -> Self {
        Self { rows }
    }

    /// Build a table from string rows, mapping empty strings to present-but-empty cells.
    pub fn from_rows<R, C>(rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator<Item = Option<&'static str>>,
    {
        Self {
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(|c| c.map(str::to_string)).collect())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|r| r.is_empty())
    }

    /// Cell text at a position, if present.
    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .and_then(|c| c.as_deref())
    }
}

/// Everything the table extractor produced for one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableExtraction {
    #[serde(default)]
    pub tables: Vec<RawTable>,

    /// Plain-text rendering, when the extractor provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl TableExtraction {
    pub fn from_tables(tables: Vec<RawTable>) -> Self {
        Self { tables, text: None }
    }
}
