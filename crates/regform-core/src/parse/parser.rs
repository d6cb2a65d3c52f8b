//! Total per-document parsing: extraction, normalization and assembly.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, warn};

use crate::error::SourceError;
use crate::extract::{TableFieldExtractor, TemplateExtractor, TemplateRegistry};
use crate::models::config::ExtractionConfig;
use crate::models::form::{FieldType, FormKind, FormTemplate};
use crate::models::iteration::DocumentRef;
use crate::models::result::{ErrorKind, NormalizedField, ParseResult};
use crate::models::table::TableExtraction;
use crate::normalize::normalize;

use super::assembly::assemble;

/// Parses one document into a [`ParseResult`]. Never fails and never panics
/// to its caller: every fault becomes an error kind on the result.
#[derive(Debug, Clone)]
pub struct DocumentParser<E = TableFieldExtractor> {
    extractor: E,
    checksum_strict: bool,
}

impl DocumentParser {
    /// Create a parser using the table field extractor.
    pub fn new(config: &ExtractionConfig) -> Self {
        Self::with_extractor(TableFieldExtractor::new(config), config)
    }
}

impl Default for DocumentParser {
    fn default() -> Self {
        Self::new(&ExtractionConfig::default())
    }
}

impl<E: TemplateExtractor> DocumentParser<E> {
    /// Create a parser with a custom extraction strategy.
    pub fn with_extractor(extractor: E, config: &ExtractionConfig) -> Self {
        Self {
            extractor,
            checksum_strict: config.checksum_strict,
        }
    }

    /// Parse a document from whatever the table source returned for it.
    pub fn parse(
        &self,
        document: &DocumentRef,
        parser_version: &str,
        registry: &TemplateRegistry,
        input: Result<&TableExtraction, &SourceError>,
    ) -> ParseResult {
        let id = document.id.as_str();
        let kind = document.form_kind.as_str();

        let Some(template) = kind.parse::<FormKind>().ok().and_then(|k| registry.get(k)) else {
            debug!(document = id, form_kind = kind, "no template registered");
            return ParseResult::failed(
                id,
                kind,
                parser_version,
                ErrorKind::UnsupportedFormKind,
                format!("no template registered for form kind '{}'", kind),
            );
        };

        let extraction = match input {
            Ok(extraction) => extraction,
            Err(err) => {
                warn!(document = id, error = %err, "table source failed");
                return ParseResult::failed(
                    id,
                    kind,
                    parser_version,
                    ErrorKind::ExtractionException,
                    format!("table source: {}", err),
                );
            }
        };

        if extraction.tables.is_empty() {
            return ParseResult::failed(
                id,
                kind,
                parser_version,
                ErrorKind::NoTableFound,
                "table extraction returned 0 tables",
            );
        }

        let fields = panic::catch_unwind(AssertUnwindSafe(|| self.extract_fields(extraction, template)));

        match fields {
            Ok(fields) => {
                let result = assemble(id, kind, parser_version, template, fields, self.checksum_strict);
                debug!(
                    document = id,
                    success = result.success(),
                    fields = result.fields().len(),
                    "document parsed"
                );
                result
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(document = id, error = %message, "extraction panicked");
                ParseResult::failed(
                    id,
                    kind,
                    parser_version,
                    ErrorKind::ExtractionException,
                    format!("extraction fault: {}", message),
                )
            }
        }
    }

    fn extract_fields(
        &self,
        extraction: &TableExtraction,
        template: &FormTemplate,
    ) -> BTreeMap<String, NormalizedField> {
        self.extractor
            .extract_tables(&extraction.tables, template)
            .into_iter()
            .map(|(name, field)| {
                let field_type = template
                    .field(&name)
                    .map(|spec| spec.field_type)
                    .unwrap_or(FieldType::Text);
                (name, normalize(field, field_type))
            })
            .collect()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractedFields;
    use crate::models::table::RawTable;
    use pretty_assertions::assert_eq;

    fn cells(values: &[Option<&str>]) -> Vec<Option<String>> {
        values.iter().map(|c| c.map(str::to_string)).collect()
    }

    fn dividend_tables() -> TableExtraction {
        TableExtraction::from_tables(vec![RawTable::new(vec![
            cells(&[Some("Razón Social"), None, Some("Banco Ejemplo S.A.")]),
            cells(&[Some("RUT"), Some("97.004.000-5")]),
            cells(&[Some("Fecha de pago"), Some("Monto por acción")]),
            cells(&[Some("15/05/2024"), Some("$ 120,50")]),
        ])])
    }

    #[test]
    fn test_parse_dividend() {
        let parser = DocumentParser::default();
        let registry = TemplateRegistry::builtin();
        let doc = DocumentRef::new("div-1", "dividend");

        let result = parser.parse(&doc, "v1", &registry, Ok(&dividend_tables()));

        assert!(result.success(), "{:?}", result.error_detail());
        assert_eq!(result.field("razon_social").unwrap().value(), "Banco Ejemplo S.A.");
        assert_eq!(result.field("rut_emisor").unwrap().value(), "97.004.000-5");
        assert_eq!(result.field("fecha_pago").unwrap().value(), "2024-05-15");
        assert_eq!(result.field("monto_por_accion").unwrap().value(), "120.5");
    }

    #[test]
    fn test_unsupported_form_kind() {
        let parser = DocumentParser::default();
        let tables = dividend_tables();

        let unknown = DocumentRef::new("x-1", "balance_sheet");
        let result = parser.parse(&unknown, "v1", &TemplateRegistry::builtin(), Ok(&tables));
        assert_eq!(result.error_kind(), Some(ErrorKind::UnsupportedFormKind));

        let unregistered = DocumentRef::new("x-2", "dividend");
        let result = parser.parse(&unregistered, "v1", &TemplateRegistry::new(), Ok(&tables));
        assert_eq!(result.error_kind(), Some(ErrorKind::UnsupportedFormKind));
        assert!(!result.success());
    }

    #[test]
    fn test_no_tables() {
        let parser = DocumentParser::default();
        let doc = DocumentRef::new("div-2", "dividend");
        let empty = TableExtraction {
            tables: vec![],
            text: Some("Aviso de dividendo".to_string()),
        };

        let result = parser.parse(&doc, "v1", &TemplateRegistry::builtin(), Ok(&empty));
        assert_eq!(result.error_kind(), Some(ErrorKind::NoTableFound));
    }

    #[test]
    fn test_source_error_becomes_exception() {
        let parser = DocumentParser::default();
        let doc = DocumentRef::new("div-3", "dividend");
        let err = SourceError::Read {
            document_id: "div-3".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };

        let result = parser.parse(&doc, "v1", &TemplateRegistry::builtin(), Err(&err));
        assert_eq!(result.error_kind(), Some(ErrorKind::ExtractionException));
        assert!(result.error_detail().unwrap().contains("gone"));
    }

    #[test]
    fn test_malformed_tables_are_total() {
        let parser = DocumentParser::default();
        let registry = TemplateRegistry::builtin();
        let doc = DocumentRef::new("bad-1", "shareholding");
        let malformed = [
            TableExtraction::from_tables(vec![RawTable::default()]),
            TableExtraction::from_tables(vec![RawTable::new(vec![vec![], vec![], vec![]])]),
            TableExtraction::from_tables(vec![RawTable::new(vec![vec![None; 5], vec![None]])]),
            TableExtraction::from_tables(vec![RawTable::new(vec![cells(&[Some(""), Some("   ")])])]),
        ];

        for input in &malformed {
            let result = parser.parse(&doc, "v1", &registry, Ok(input));
            assert!(result.error_kind().is_some());
            assert!(!result.success());
            assert_eq!(
                result.success(),
                result.missing_critical_fields().is_empty() && result.error_kind().is_none()
            );
        }
    }

    struct Exploding;

    impl TemplateExtractor for Exploding {
        fn extract_tables(&self, _tables: &[RawTable], _template: &FormTemplate) -> ExtractedFields {
            panic!("cell index out of range");
        }
    }

    #[test]
    fn test_panic_becomes_exception() {
        let parser = DocumentParser::with_extractor(Exploding, &ExtractionConfig::default());
        let doc = DocumentRef::new("div-4", "dividend");

        let result = parser.parse(&doc, "v1", &TemplateRegistry::builtin(), Ok(&dividend_tables()));
        assert_eq!(result.error_kind(), Some(ErrorKind::ExtractionException));
        assert_eq!(
            result.error_detail(),
            Some("extraction fault: cell index out of range")
        );
    }
}
