//! Turning normalized fields into a [`ParseResult`].

use std::collections::{BTreeMap, BTreeSet};

use crate::models::form::FormTemplate;
use crate::models::result::{ErrorKind, NormalizationOutcome, NormalizedField, ParseResult};

/// Assemble the parse result of one document.
///
/// A critical field counts as missing when it is absent, when its label was
/// found but no value passed the validator, or, with `checksum_strict`, when
/// its identifier failed the checksum.
pub fn assemble(
    document_id: &str,
    form_kind: &str,
    parser_version: &str,
    template: &FormTemplate,
    fields: BTreeMap<String, NormalizedField>,
    checksum_strict: bool,
) -> ParseResult {
    let missing: BTreeSet<String> = template
        .critical_fields()
        .filter(|name| match fields.get(*name) {
            None => true,
            Some(field) => {
                !field.extracted.validator_passed
                    || (checksum_strict
                        && field.outcome == NormalizationOutcome::FailedChecksumKeptRaw)
            }
        })
        .map(str::to_string)
        .collect();

    let error = (!missing.is_empty()).then(|| {
        let names: Vec<&str> = missing.iter().map(String::as_str).collect();
        (
            ErrorKind::MissingCriticalFields,
            format!("missing critical fields: {}", names.join(", ")),
        )
    });

    ParseResult::new(document_id, form_kind, parser_version, fields, missing, error)
}
