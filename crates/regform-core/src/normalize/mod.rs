//! Canonicalization of raw field values.
//!
//! Normalization never drops the raw value: a value that cannot be
//! canonicalized stays in the result with an outcome saying why.

pub mod amounts;
pub mod dates;
pub mod patterns;
pub mod rut;

pub use amounts::{is_numeric_cell, parse_amount};
pub use dates::{DateFormat, parse_date};
pub use rut::{RutCheck, check_rut, format_rut, validate_rut};

use tracing::{debug, warn};

use crate::models::form::FieldType;
use crate::models::result::{ExtractedField, NormalizationOutcome, NormalizedField};

/// Canonicalize a raw string according to its field type.
pub fn normalize_value(raw: &str, field_type: FieldType) -> (Option<String>, NormalizationOutcome) {
    match field_type {
        FieldType::Rut => match check_rut(raw) {
            RutCheck::Valid(canonical) => (Some(canonical), NormalizationOutcome::Ok),
            RutCheck::BadChecksum => (None, NormalizationOutcome::FailedChecksumKeptRaw),
            RutCheck::Malformed => (None, NormalizationOutcome::UnparsableKeptRaw),
        },
        FieldType::Date => match parse_date(raw) {
            Some(date) => (Some(date.format("%Y-%m-%d").to_string()), NormalizationOutcome::Ok),
            None => (None, NormalizationOutcome::UnparsableKeptRaw),
        },
        FieldType::Amount => match parse_amount(raw) {
            Some(amount) => (Some(amount.normalize().to_string()), NormalizationOutcome::Ok),
            None => (None, NormalizationOutcome::UnparsableKeptRaw),
        },
        FieldType::Text => {
            let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
            if collapsed.is_empty() {
                (None, NormalizationOutcome::UnparsableKeptRaw)
            } else {
                (Some(collapsed), NormalizationOutcome::Ok)
            }
        }
    }
}

/// Normalize an extracted field.
pub fn normalize(field: ExtractedField, field_type: FieldType) -> NormalizedField {
    let (canonical, outcome) = normalize_value(&field.raw_value, field_type);
    match outcome {
        NormalizationOutcome::Ok => {}
        NormalizationOutcome::FailedChecksumKeptRaw => {
            warn!(field = %field.name, raw = %field.raw_value, "check character mismatch, value kept raw");
        }
        NormalizationOutcome::UnparsableKeptRaw => {
            debug!(field = %field.name, raw = %field.raw_value, "value kept raw");
        }
    }

    NormalizedField {
        extracted: field,
        canonical,
        outcome,
    }
}
