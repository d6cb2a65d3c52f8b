//! Field extraction from raw tables.

mod engine;
pub mod labels;
pub mod templates;

pub use engine::TableFieldExtractor;
pub use templates::TemplateRegistry;

use std::collections::BTreeMap;

use crate::models::form::FormTemplate;
use crate::models::result::ExtractedField;
use crate::models::table::RawTable;

/// Extracted fields keyed by field name. Unmatched fields are absent.
pub type ExtractedFields = BTreeMap<String, ExtractedField>;

/// Trait for template-driven field extractors.
pub trait TemplateExtractor {
    /// Extract every field of the template from all tables of a document.
    fn extract_tables(&self, tables: &[RawTable], template: &FormTemplate) -> ExtractedFields;

    /// Extract every field of the template from a single table.
    fn extract(&self, table: &RawTable, template: &FormTemplate) -> ExtractedFields {
        self.extract_tables(std::slice::from_ref(table), template)
    }
}
