//! Post-hoc reduction of a run's results into run statistics.

use std::collections::{BTreeMap, HashMap};

use crate::models::iteration::ErrorPattern;
use crate::models::result::{ErrorKind, ParseResult};
use crate::normalize::patterns::DIGIT_RUN;

/// Statistics of a set of parse results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub total: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub error_distribution: BTreeMap<ErrorKind, usize>,
    pub top_error: Option<ErrorPattern>,
    pub missing_fields: BTreeMap<String, usize>,
    pub field_hits: BTreeMap<String, usize>,
}

/// Failure pattern of a result: its error kind plus the detail with digit
/// runs masked, so that messages differing only in ids or counts group together.
pub fn error_pattern(result: &ParseResult) -> Option<String> {
    let kind = result.error_kind()?;
    Some(match result.error_detail() {
        Some(detail) => format!("{}: {}", kind, DIGIT_RUN.replace_all(detail, "#")),
        None => kind.to_string(),
    })
}

/// Reduce all results of a run. `sample_limit` bounds the example ids kept
/// for the most frequent failure pattern.
pub fn aggregate(results: &[ParseResult], sample_limit: usize) -> RunStats {
    let mut stats = RunStats {
        total: results.len(),
        ..RunStats::default()
    };
    let mut patterns: HashMap<String, (usize, Vec<String>)> = HashMap::new();

    for result in results {
        if result.success() {
            stats.success_count += 1;
        } else {
            stats.failure_count += 1;
        }

        if let Some(kind) = result.error_kind() {
            *stats.error_distribution.entry(kind).or_default() += 1;
        }

        for field in result.missing_critical_fields() {
            *stats.missing_fields.entry(field.clone()).or_default() += 1;
        }

        for (name, field) in result.fields() {
            if field.extracted.validator_passed {
                *stats.field_hits.entry(name.clone()).or_default() += 1;
            }
        }

        if let Some(pattern) = error_pattern(result) {
            let (count, examples) = patterns.entry(pattern).or_default();
            *count += 1;
            if examples.len() < sample_limit {
                examples.push(result.document_id().to_string());
            }
        }
    }

    // Most frequent pattern; ties go to the lexicographically smallest.
    stats.top_error = patterns
        .into_iter()
        .max_by(|(a, (ca, _)), (b, (cb, _))| ca.cmp(cb).then_with(|| b.cmp(a)))
        .map(|(pattern, (count, examples))| ErrorPattern {
            pattern,
            count,
            examples,
        });

    stats
}
