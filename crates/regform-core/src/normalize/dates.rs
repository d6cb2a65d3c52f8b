//! Date parsing for Spanish-language declarations.

use chrono::NaiveDate;
use regex::Captures;

use super::patterns::{DATE_DMY, DATE_SPANISH_ABBR, DATE_SPANISH_LONG, DATE_YMD};

/// Supported date layouts, in the order they are attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    /// `15/01/2024`, `15-01-2024`, `15.01.24`
    NumericDmy,
    /// `2024-01-15`
    IsoYmd,
    /// `15 de enero de 2024`
    SpanishLong,
    /// `15-ene-2024`
    SpanishAbbreviated,
}

pub const DATE_FORMATS: [DateFormat; 4] = [
    DateFormat::NumericDmy,
    DateFormat::IsoYmd,
    DateFormat::SpanishLong,
    DateFormat::SpanishAbbreviated,
];

impl DateFormat {
    /// Try to read a date in this format anywhere in `text`.
    pub fn parse(&self, text: &str) -> Option<NaiveDate> {
        match self {
            Self::NumericDmy => DATE_DMY.captures_iter(text).find_map(|caps| {
                // Mixed separators ("15/01-2024") are not a date.
                if caps[2] != caps[4] {
                    return None;
                }
                ymd(parse_year(&caps[5]), number(&caps, 3), number(&caps, 1))
            }),
            Self::IsoYmd => DATE_YMD.captures_iter(text).find_map(|caps| {
                ymd(caps[1].parse().ok()?, number(&caps, 2), number(&caps, 3))
            }),
            Self::SpanishLong => DATE_SPANISH_LONG.captures_iter(text).find_map(|caps| {
                ymd(caps[3].parse().ok()?, month_number(&caps[2])?, number(&caps, 1))
            }),
            Self::SpanishAbbreviated => DATE_SPANISH_ABBR.captures_iter(text).find_map(|caps| {
                ymd(parse_year(&caps[3]), month_number(&caps[2])?, number(&caps, 1))
            }),
        }
    }
}

/// Parse a date by attempting every supported format in order.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    DATE_FORMATS.iter().find_map(|format| format.parse(text))
}

fn ymd(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

fn number(caps: &Captures<'_>, group: usize) -> u32 {
    caps[group].parse().unwrap_or(0)
}

fn parse_year(s: &str) -> i32 {
    let year: i32 = s.parse().unwrap_or(0);
    if s.len() <= 2 {
        // Two-digit year: 00-50 is 2000s, 51-99 is 1900s
        if year <= 50 { 2000 + year } else { 1900 + year }
    } else {
        year
    }
}

/// Month number from a Spanish month name or abbreviation.
fn month_number(name: &str) -> Option<u32> {
    let name = name.to_lowercase();
    let month = match name.get(..3)? {
        "ene" => 1,
        "feb" => 2,
        "mar" => 3,
        "abr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "ago" => 8,
        "sep" | "set" => 9,
        "oct" => 10,
        "nov" => 11,
        "dic" => 12,
        _ => return None,
    };
    Some(month)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn test_numeric_formats() {
        assert_eq!(parse_date("15/01/2024"), date(2024, 1, 15));
        assert_eq!(parse_date("15-01-2024"), date(2024, 1, 15));
        assert_eq!(parse_date("5.3.2024"), date(2024, 3, 5));
        assert_eq!(parse_date("15/01/24"), date(2024, 1, 15));
        assert_eq!(parse_date("15/01/99"), date(1999, 1, 15));
    }

    #[test]
    fn test_iso_format() {
        assert_eq!(parse_date("2024-01-15"), date(2024, 1, 15));
    }

    #[test]
    fn test_spanish_formats() {
        assert_eq!(parse_date("15 de enero de 2024"), date(2024, 1, 15));
        assert_eq!(parse_date("Santiago, 3 de Septiembre del 2023"), date(2023, 9, 3));
        assert_eq!(parse_date("1 marzo 2022"), date(2022, 3, 1));
        assert_eq!(parse_date("15-ene-2024"), date(2024, 1, 15));
        assert_eq!(parse_date("30 dic. 23"), date(2023, 12, 30));
    }

    #[test]
    fn test_unparsable() {
        assert_eq!(parse_date("31/02/2024"), None);
        assert_eq!(parse_date("15/01-2024"), None);
        assert_eq!(parse_date("sin fecha"), None);
        assert_eq!(parse_date(""), None);
    }
}
