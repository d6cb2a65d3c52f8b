//! RUT (Chilean tax identifier) validation and formatting.

use super::patterns::RUT_PATTERN;

/// Outcome of checking a raw RUT string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RutCheck {
    /// Check character matches; carries the canonical `NN.NNN.NNN-D` form.
    Valid(String),
    /// Well-formed, but the check character does not match the body.
    BadChecksum,
    /// Not shaped like a RUT at all.
    Malformed,
}

/// Split a raw RUT into its body digits and supplied check character.
pub fn split_rut(raw: &str) -> Option<(String, char)> {
    let caps = RUT_PATTERN.captures(raw.trim())?;
    let body: String = caps[1].chars().filter(|c| c.is_ascii_digit()).collect();
    let check = caps[2].chars().next()?.to_ascii_uppercase();
    Some((body, check))
}

/// Compute the check character of a RUT body.
///
/// Digits are weighted 2..7 cyclically starting from the rightmost one; the
/// check value is `11 - (sum mod 11)`, written `0` for 11 and `K` for 10.
pub fn check_char(body: &str) -> Option<char> {
    if body.is_empty() || !body.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let sum: u32 = body
        .chars()
        .rev()
        .filter_map(|c| c.to_digit(10))
        .zip((2..=7).cycle())
        .map(|(d, w)| d * w)
        .sum();

    match 11 - (sum % 11) {
        11 => Some('0'),
        10 => Some('K'),
        n => char::from_digit(n, 10),
    }
}

/// Validate a RUT using the modulo 11 checksum.
pub fn validate_rut(raw: &str) -> bool {
    matches!(check_rut(raw), RutCheck::Valid(_))
}

/// Check a raw RUT and produce its canonical form when valid.
pub fn check_rut(raw: &str) -> RutCheck {
    let Some((body, supplied)) = split_rut(raw) else {
        return RutCheck::Malformed;
    };

    match check_char(&body) {
        Some(expected) if expected == supplied => RutCheck::Valid(format_rut(&body, supplied)),
        Some(_) => RutCheck::BadChecksum,
        None => RutCheck::Malformed,
    }
}

/// Format a RUT body and check character as `NN.NNN.NNN-D`.
pub fn format_rut(body: &str, check: char) -> String {
    let digits: Vec<char> = body.trim_start_matches('0').chars().collect();
    let mut grouped = String::with_capacity(digits.len() + 4);

    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(*c);
    }

    format!("{}-{}", grouped, check.to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_char() {
        assert_eq!(check_char("76732087"), Some('6'));
        assert_eq!(check_char("96505760"), Some('9'));
        assert_eq!(check_char("5126663"), Some('3'));
        assert_eq!(check_char("10000013"), Some('K'));
        assert_eq!(check_char("10000004"), Some('0'));
        assert_eq!(check_char(""), None);
        assert_eq!(check_char("12a"), None);
    }

    #[test]
    fn test_check_rut_valid() {
        assert_eq!(check_rut("76.732.087-6"), RutCheck::Valid("76.732.087-6".to_string()));
        assert_eq!(check_rut("767320876"), RutCheck::Valid("76.732.087-6".to_string()));
        assert_eq!(check_rut(" 76732087 - 6 "), RutCheck::Valid("76.732.087-6".to_string()));
        assert_eq!(check_rut("5.126.663-3"), RutCheck::Valid("5.126.663-3".to_string()));
        assert_eq!(check_rut("10.000.013-k"), RutCheck::Valid("10.000.013-K".to_string()));
    }

    #[test]
    fn test_check_rut_invalid() {
        assert_eq!(check_rut("76.732.087-5"), RutCheck::BadChecksum);
        assert_eq!(check_rut("76.732.087-K"), RutCheck::BadChecksum);
        assert_eq!(check_rut("no informado"), RutCheck::Malformed);
        assert_eq!(check_rut("123-4"), RutCheck::Malformed);
        assert!(!validate_rut("96.505.760-0"));
        assert!(validate_rut("96.505.760-9"));
    }

    #[test]
    fn test_format_rut() {
        assert_eq!(format_rut("76732087", '6'), "76.732.087-6");
        assert_eq!(format_rut("5126663", '3'), "5.126.663-3");
        assert_eq!(format_rut("10000013", 'k'), "10.000.013-K");
    }
}
