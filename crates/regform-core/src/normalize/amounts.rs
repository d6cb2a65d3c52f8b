//! Amount parsing for Chilean-formatted numbers.

use rust_decimal::Decimal;
use std::str::FromStr;

use super::patterns::CURRENCY_TOKENS;

/// Parse an amount such as `$ 1.234.567`, `1.234,56`, `US$ 12,50` or `(3.000)`.
///
/// `.` groups thousands and `,` marks decimals, unless the shape of the
/// number says otherwise (`1234.56`).
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let stripped = CURRENCY_TOKENS.replace_all(s, "");
    let mut body = stripped.trim();

    let mut negative = false;
    if let Some(inner) = body.strip_prefix('(').and_then(|b| b.strip_suffix(')')) {
        negative = true;
        body = inner.trim();
    }
    if let Some(rest) = body.strip_prefix('-') {
        negative = !negative;
        body = rest.trim_start();
    }

    if body.is_empty()
        || !body
            .chars()
            .all(|c| c.is_ascii_digit() || c == '.' || c == ',' || c == ' ' || c == '\u{00a0}')
    {
        return None;
    }

    let cleaned: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    let normalized = normalize_separators(&cleaned)?;
    let value = Decimal::from_str(&normalized).ok()?;

    Some(if negative { -value } else { value })
}

/// Rewrite separators so the string uses `.` as the only decimal point.
fn normalize_separators(s: &str) -> Option<String> {
    let commas = s.matches(',').count();
    let dots = s.matches('.').count();

    match (commas, dots) {
        (0, 0) => Some(s.to_string()),
        (_, _) if commas > 0 && dots > 0 => {
            // Whichever separator comes last is the decimal point
            let comma_pos = s.rfind(',')?;
            let dot_pos = s.rfind('.')?;
            if comma_pos > dot_pos {
                (commas == 1).then(|| s.replace('.', "").replace(',', "."))
            } else {
                (dots == 1).then(|| s.replace(',', ""))
            }
        }
        (1, 0) => Some(s.replace(',', ".")),
        (_, 0) => grouped_thousands(s, ',').then(|| s.replace(',', "")),
        // `1.000` groups thousands, `0.500` and `1234.567` do not.
        (0, 1) if grouped_thousands(s, '.') && !s.starts_with('0') => Some(s.replace('.', "")),
        (0, 1) => Some(s.to_string()),
        (0, _) => grouped_thousands(s, '.').then(|| s.replace('.', "")),
        _ => None,
    }
}

/// Every group after the first separator has exactly three digits.
fn grouped_thousands(s: &str, sep: char) -> bool {
    let mut groups = s.split(sep);
    let first_ok = groups.next().is_some_and(|g| (1..=3).contains(&g.len()));
    first_ok && groups.all(|g| g.len() == 3)
}

/// Whether a cell holds a number, optionally with currency marks.
pub fn is_numeric_cell(s: &str) -> bool {
    parse_amount(s).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Option<Decimal> {
        Some(Decimal::from_str(s).unwrap())
    }

    #[test]
    fn test_parse_amount_chilean() {
        assert_eq!(parse_amount("$ 1.234.567"), dec("1234567"));
        assert_eq!(parse_amount("1.234,56"), dec("1234.56"));
        assert_eq!(parse_amount("1.000"), dec("1000"));
        assert_eq!(parse_amount("12,5"), dec("12.5"));
        assert_eq!(parse_amount("CLP 450"), dec("450"));
        assert_eq!(parse_amount("US$ 12,50"), dec("12.50"));
        assert_eq!(parse_amount("UF 1.500,25"), dec("1500.25"));
    }

    #[test]
    fn test_parse_amount_other_shapes() {
        assert_eq!(parse_amount("1234.56"), dec("1234.56"));
        assert_eq!(parse_amount("1,234,567"), dec("1234567"));
        assert_eq!(parse_amount("1,234.56"), dec("1234.56"));
        assert_eq!(parse_amount("12 345 678"), dec("12345678"));
        assert_eq!(parse_amount("0.500"), dec("0.500"));
        assert_eq!(parse_amount("$ 0.250"), dec("0.250"));
        assert_eq!(parse_amount("1234.567"), dec("1234.567"));
    }

    #[test]
    fn test_parse_amount_negative() {
        assert_eq!(parse_amount("-3.000"), dec("-3000"));
        assert_eq!(parse_amount("(3.000)"), dec("-3000"));
        assert_eq!(parse_amount("$ -12,5"), dec("-12.5"));
    }

    #[test]
    fn test_parse_amount_rejects() {
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("$"), None);
        assert_eq!(parse_amount("no aplica"), None);
        assert_eq!(parse_amount("1.234 acciones"), None);
        assert_eq!(parse_amount("1.23.4"), None);
        assert_eq!(parse_amount("1,2,3"), None);
    }

    #[test]
    fn test_is_numeric_cell() {
        assert!(is_numeric_cell("15.000"));
        assert!(!is_numeric_cell("Monto total"));
    }
}
