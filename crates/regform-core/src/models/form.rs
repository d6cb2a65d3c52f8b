//! Form kinds, field specifications and templates.

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::extract::labels::fold_label;

/// Closed set of declaration layouts this crate knows how to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormKind {
    /// Declaración de transacciones de acciones (insider share trades).
    Shareholding,
    /// Hecho esencial cover sheet.
    EssentialFact,
    /// Aviso de dividendo.
    Dividend,
}

impl FormKind {
    /// All form kinds, in a stable order.
    pub const ALL: [FormKind; 3] = [Self::Shareholding, Self::EssentialFact, Self::Dividend];

    /// Stable code used in storage and on the command line.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Shareholding => "shareholding",
            Self::EssentialFact => "essential_fact",
            Self::Dividend => "dividend",
        }
    }
}

impl fmt::Display for FormKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for FormKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|k| k.code() == code)
            .ok_or_else(|| format!("unknown form kind: {}", s))
    }
}

/// How a raw value is canonicalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Chilean RUT with check character.
    Rut,
    /// Calendar date.
    Date,
    /// Currency amount or count.
    Amount,
    /// Free text.
    Text,
}

/// A label-matching rule. The needle is stored already folded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelPattern {
    /// Folded cell text contains the needle.
    Contains(String),
    /// Folded cell text equals the needle.
    Exact(String),
}

impl LabelPattern {
    pub fn contains(needle: &str) -> Self {
        Self::Contains(fold_label(needle))
    }

    pub fn exact(needle: &str) -> Self {
        Self::Exact(fold_label(needle))
    }

    /// Match against cell text that has already been folded.
    pub fn matches_folded(&self, folded: &str) -> bool {
        match self {
            Self::Contains(needle) => folded.contains(needle.as_str()),
            Self::Exact(needle) => folded == needle,
        }
    }

    /// Whether the cell reads as this label rather than as a value that
    /// happens to mention it: the needle must cover at least half the text.
    pub fn labels_cell(&self, folded: &str) -> bool {
        match self {
            Self::Contains(needle) => {
                folded.contains(needle.as_str())
                    && needle.chars().count() * 2 >= folded.chars().count()
            }
            Self::Exact(needle) => folded == needle,
        }
    }
}

/// Acceptance test for a candidate value cell.
#[derive(Debug, Clone)]
pub enum ValueValidator {
    /// Value contains at least one of the given characters.
    ContainsAny(Vec<char>),
    /// Value looks like a number, optionally with currency marks.
    Numeric,
    /// Value matches the regular expression.
    Pattern(Regex),
}

/// Where to look for the value once a label is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPolicy {
    /// Only cells to the right of the label.
    SameRow,
    /// Cells to the right, then the next row starting below the label.
    NextRowFallback,
}

/// Which occurrence wins when a label appears more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OccurrencePolicy {
    First,
    Last,
}

/// Specification of one field in a template.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub labels: Vec<LabelPattern>,
    pub validator: Option<ValueValidator>,
    pub field_type: FieldType,
    pub search: SearchPolicy,
    pub occurrence: OccurrencePolicy,
    pub critical: bool,
}

impl FieldSpec {
    /// Create an optional text field with first-match, same-row search.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            labels: Vec::new(),
            validator: None,
            field_type,
            search: SearchPolicy::SameRow,
            occurrence: OccurrencePolicy::First,
            critical: false,
        }
    }

    /// Add a substring label pattern.
    pub fn label(mut self, needle: &str) -> Self {
        self.labels.push(LabelPattern::contains(needle));
        self
    }

    /// Add an exact label pattern.
    pub fn exact_label(mut self, needle: &str) -> Self {
        self.labels.push(LabelPattern::exact(needle));
        self
    }

    pub fn with_validator(mut self, validator: ValueValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn with_row_fallback(mut self) -> Self {
        self.search = SearchPolicy::NextRowFallback;
        self
    }

    pub fn last_match(mut self) -> Self {
        self.occurrence = OccurrencePolicy::Last;
        self
    }

    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }

    /// Check folded cell text against every label pattern.
    pub fn matches_label(&self, folded: &str) -> bool {
        self.labels.iter().any(|p| p.matches_folded(folded))
    }

    /// Stricter form of [`Self::matches_label`] used to skip another field's
    /// label while scanning for a value.
    pub fn labels_cell(&self, folded: &str) -> bool {
        self.labels.iter().any(|p| p.labels_cell(folded))
    }
}

/// Field layout of one form kind.
#[derive(Debug, Clone)]
pub struct FormTemplate {
    pub kind: FormKind,
    pub fields: Vec<FieldSpec>,
}

impl FormTemplate {
    pub fn new(kind: FormKind, fields: Vec<FieldSpec>) -> Self {
        Self { kind, fields }
    }

    /// Names of the critical fields, in template order.
    pub fn critical_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| f.critical)
            .map(|f| f.name.as_str())
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}
