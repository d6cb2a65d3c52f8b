//! Position-independent label/value extraction over raw tables.

use tracing::trace;

use crate::models::config::ExtractionConfig;
use crate::models::form::{FieldSpec, FormTemplate, OccurrencePolicy, SearchPolicy, ValueValidator};
use crate::models::result::{CellPosition, ExtractedField};
use crate::models::table::RawTable;
use crate::normalize::amounts::is_numeric_cell;

use super::labels::{fold_label, visible_chars};
use super::{ExtractedFields, TemplateExtractor};

/// Locates each field by its label cell and takes the nearest acceptable
/// value to the right, falling back to the next row when the field allows.
#[derive(Debug, Clone)]
pub struct TableFieldExtractor {
    min_visible_chars: usize,
}

/// Result of scanning one stretch of cells.
#[derive(Debug, Default)]
struct Scan {
    accepted: Option<(usize, usize, String)>,
    rejected: Option<(usize, usize, String)>,
}

impl Scan {
    fn merge(self, other: Scan) -> Scan {
        Scan {
            accepted: self.accepted.or(other.accepted),
            rejected: self.rejected.or(other.rejected),
        }
    }
}

impl TableFieldExtractor {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            min_visible_chars: config.min_visible_chars,
        }
    }

    /// Locate one field across all tables of a document.
    pub fn locate(&self, tables: &[RawTable], spec: &FieldSpec) -> Option<ExtractedField> {
        self.locate_among(tables, spec, &[])
    }

    /// Like [`locate`](Self::locate), but cells matching a label of any of
    /// `others` are never taken as values.
    fn locate_among(
        &self,
        tables: &[RawTable],
        spec: &FieldSpec,
        others: &[FieldSpec],
    ) -> Option<ExtractedField> {
        let mut accepted: Option<ExtractedField> = None;
        let mut rejected: Option<ExtractedField> = None;

        for (table_idx, table) in tables.iter().enumerate() {
            for row_idx in 0..table.rows.len() {
                let Some(label_col) = self.label_column(&table.rows[row_idx], spec) else {
                    continue;
                };

                let mut scan = self.scan(table, spec, others, row_idx, label_col + 1);
                if scan.accepted.is_none() && spec.search == SearchPolicy::NextRowFallback {
                    scan = scan.merge(self.scan(table, spec, others, row_idx + 1, label_col));
                }

                if let Some((row, column, value)) = scan.accepted {
                    trace!(field = %spec.name, table = table_idx, row, column, "value accepted");
                    let field = build(spec, table_idx, row, column, value, true);
                    if spec.occurrence == OccurrencePolicy::First {
                        return Some(field);
                    }
                    accepted = Some(field);
                } else if let Some((row, column, value)) = scan.rejected {
                    let keep_existing =
                        rejected.is_some() && spec.occurrence == OccurrencePolicy::First;
                    if !keep_existing {
                        rejected = Some(build(spec, table_idx, row, column, value, false));
                    }
                }
            }
        }

        accepted.or(rejected)
    }

    /// Column of the first cell in the row matching the spec's labels.
    fn label_column(&self, row: &[Option<String>], spec: &FieldSpec) -> Option<usize> {
        row.iter().position(|cell| {
            cell.as_deref()
                .is_some_and(|text| spec.matches_label(&fold_label(text)))
        })
    }

    /// Scan `row` from `start_col` rightward for a value cell.
    fn scan(
        &self,
        table: &RawTable,
        spec: &FieldSpec,
        others: &[FieldSpec],
        row: usize,
        start_col: usize,
    ) -> Scan {
        let mut scan = Scan::default();
        let Some(cells) = table.rows.get(row) else {
            return scan;
        };

        for (column, cell) in cells.iter().enumerate().skip(start_col) {
            // Merged regions never end the scan.
            let Some(text) = cell.as_deref() else {
                continue;
            };
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            let folded = fold_label(text);
            if spec.matches_label(&folded) || others.iter().any(|o| o.labels_cell(&folded)) {
                continue;
            }
            if self.accepts(spec, text) {
                scan.accepted = Some((row, column, text.to_string()));
                return scan;
            }
            if scan.rejected.is_none() && visible_chars(text) > 0 {
                scan.rejected = Some((row, column, text.to_string()));
            }
        }

        scan
    }

    fn accepts(&self, spec: &FieldSpec, text: &str) -> bool {
        match &spec.validator {
            None => visible_chars(text) > self.min_visible_chars,
            Some(ValueValidator::ContainsAny(chars)) => {
                text.chars().any(|c| chars.contains(&c)) && visible_chars(text) > 0
            }
            Some(ValueValidator::Numeric) => is_numeric_cell(text),
            Some(ValueValidator::Pattern(re)) => re.is_match(text),
        }
    }
}

impl Default for TableFieldExtractor {
    fn default() -> Self {
        Self::new(&ExtractionConfig::default())
    }
}

impl TemplateExtractor for TableFieldExtractor {
    fn extract_tables(&self, tables: &[RawTable], template: &FormTemplate) -> ExtractedFields {
        template
            .fields
            .iter()
            .filter_map(|spec| self.locate_among(tables, spec, &template.fields))
            .map(|field| (field.name.clone(), field))
            .collect()
    }
}

fn build(
    spec: &FieldSpec,
    table: usize,
    row: usize,
    column: usize,
    value: String,
    validator_passed: bool,
) -> ExtractedField {
    ExtractedField {
        name: spec.name.clone(),
        raw_value: value,
        position: CellPosition { table, row, column },
        validator_passed,
    }
}
