//! Extracted fields and per-document parse results.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Location of the cell a value was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellPosition {
    /// Index of the table within the document.
    pub table: usize,
    pub row: usize,
    pub column: usize,
}

/// A raw value located by the extraction engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedField {
    pub name: String,
    pub raw_value: String,
    pub position: CellPosition,
    /// False when the label was found but no neighbouring cell passed the validator.
    pub validator_passed: bool,
}

/// Result of canonicalizing a raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NormalizationOutcome {
    Ok,
    UnparsableKeptRaw,
    FailedChecksumKeptRaw,
}

/// An extracted field together with its canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedField {
    #[serde(flatten)]
    pub extracted: ExtractedField,

    /// Canonical value; present only when `outcome` is `Ok`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical: Option<String>,

    pub outcome: NormalizationOutcome,
}

impl NormalizedField {
    pub fn name(&self) -> &str {
        &self.extracted.name
    }

    pub fn raw_value(&self) -> &str {
        &self.extracted.raw_value
    }

    /// Canonical value, falling back to the raw string.
    pub fn value(&self) -> &str {
        self.canonical
            .as_deref()
            .unwrap_or(&self.extracted.raw_value)
    }
}

/// Document-level error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NoTableFound,
    MissingCriticalFields,
    ExtractionException,
    UnsupportedFormKind,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoTableFound => "no_table_found",
            Self::MissingCriticalFields => "missing_critical_fields",
            Self::ExtractionException => "extraction_exception",
            Self::UnsupportedFormKind => "unsupported_form_kind",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Outcome of one parse attempt of one document.
///
/// Built only through [`crate::parse::assemble`] and [`ParseResult::failed`], so
/// `success` always equals "no missing critical fields and no error kind".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredParseResult")]
pub struct ParseResult {
    document_id: String,
    form_kind: String,
    parser_version: String,
    success: bool,
    fields: BTreeMap<String, NormalizedField>,
    missing_critical_fields: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_detail: Option<String>,
}

/// Stored shape of a [`ParseResult`]. The persisted `success` flag is ignored
/// and recomputed on load.
#[derive(Deserialize)]
struct StoredParseResult {
    document_id: String,
    form_kind: String,
    parser_version: String,
    #[serde(default)]
    fields: BTreeMap<String, NormalizedField>,
    #[serde(default)]
    missing_critical_fields: BTreeSet<String>,
    #[serde(default)]
    error_kind: Option<ErrorKind>,
    #[serde(default)]
    error_detail: Option<String>,
}

impl From<StoredParseResult> for ParseResult {
    fn from(stored: StoredParseResult) -> Self {
        let mut result = ParseResult::new(
            stored.document_id,
            stored.form_kind,
            stored.parser_version,
            stored.fields,
            stored.missing_critical_fields,
            None,
        );
        if let Some(kind) = stored.error_kind {
            result.success = false;
            result.error_kind = Some(kind);
        }
        result.error_detail = stored.error_detail;
        result
    }
}

impl ParseResult {
    pub(crate) fn new(
        document_id: impl Into<String>,
        form_kind: impl Into<String>,
        parser_version: impl Into<String>,
        fields: BTreeMap<String, NormalizedField>,
        missing_critical_fields: BTreeSet<String>,
        error: Option<(ErrorKind, String)>,
    ) -> Self {
        let (error_kind, error_detail) = match error {
            Some((kind, detail)) => (Some(kind), Some(detail)),
            None => (None, None),
        };
        Self {
            document_id: document_id.into(),
            form_kind: form_kind.into(),
            parser_version: parser_version.into(),
            success: missing_critical_fields.is_empty() && error_kind.is_none(),
            fields,
            missing_critical_fields,
            error_kind,
            error_detail,
        }
    }

    /// A result carrying no fields at all.
    pub fn failed(
        document_id: impl Into<String>,
        form_kind: impl Into<String>,
        parser_version: impl Into<String>,
        kind: ErrorKind,
        detail: impl Into<String>,
    ) -> Self {
        Self::new(
            document_id,
            form_kind,
            parser_version,
            BTreeMap::new(),
            BTreeSet::new(),
            Some((kind, detail.into())),
        )
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn form_kind(&self) -> &str {
        &self.form_kind
    }

    pub fn parser_version(&self) -> &str {
        &self.parser_version
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn fields(&self) -> &BTreeMap<String, NormalizedField> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&NormalizedField> {
        self.fields.get(name)
    }

    pub fn missing_critical_fields(&self) -> &BTreeSet<String> {
        &self.missing_critical_fields
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error_kind
    }

    pub fn error_detail(&self) -> Option<&str> {
        self.error_detail.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_result_is_not_success() {
        let result = ParseResult::failed("doc-1", "dividend", "v1", ErrorKind::NoTableFound, "0 tables");
        assert!(!result.success());
        assert_eq!(result.error_kind(), Some(ErrorKind::NoTableFound));
        assert_eq!(result.error_detail(), Some("0 tables"));
        assert!(result.fields().is_empty());
    }

    #[test]
    fn test_success_requires_no_missing_fields() {
        let missing: BTreeSet<String> = ["rut_emisor".to_string()].into();
        let result = ParseResult::new("doc-1", "dividend", "v1", BTreeMap::new(), missing, None);
        assert!(!result.success());

        let result = ParseResult::new("doc-1", "dividend", "v1", BTreeMap::new(), BTreeSet::new(), None);
        assert!(result.success());
    }

    #[test]
    fn test_serde_keeps_success_flag() {
        let result = ParseResult::failed("doc-9", "shareholding", "v2", ErrorKind::ExtractionException, "boom");
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"error_kind\":\"extraction_exception\""));

        let back: ParseResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn test_stored_success_flag_is_recomputed() {
        let result = ParseResult::failed("doc-9", "dividend", "v2", ErrorKind::NoTableFound, "0 tables");
        let mut json = serde_json::to_value(&result).unwrap();
        json["success"] = serde_json::Value::Bool(true);

        let back: ParseResult = serde_json::from_value(json).unwrap();
        assert!(!back.success());
        assert_eq!(back, result);

        let missing = r#"{"document_id":"doc-1","form_kind":"dividend","parser_version":"v1",
            "success":true,"fields":{},"missing_critical_fields":["rut_emisor"]}"#;
        let back: ParseResult = serde_json::from_str(missing).unwrap();
        assert!(!back.success());
    }
}
