//! Case and diacritic folding for label cells.

/// Fold text for label comparison: lower-case, strip Spanish diacritics,
/// collapse runs of whitespace and drop a trailing colon.
pub fn fold_label(text: &str) -> String {
    let mut folded = String::with_capacity(text.len());
    let mut pending_space = false;

    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_whitespace() {
            pending_space = !folded.is_empty();
            continue;
        }
        if pending_space {
            folded.push(' ');
            pending_space = false;
        }
        folded.push(strip_diacritic(c));
    }

    if folded.ends_with(':') {
        folded.truncate(folded.trim_end_matches(':').trim_end().len());
    }
    folded
}

fn strip_diacritic(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        other => other,
    }
}

/// Number of alphanumeric characters in a cell.
pub fn visible_chars(text: &str) -> usize {
    text.chars().filter(|c| c.is_alphanumeric()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_label() {
        assert_eq!(fold_label("  Razón   Social (1) "), "razon social (1)");
        assert_eq!(fold_label("NÚMERO DE ACCIONES"), "numero de acciones");
        assert_eq!(fold_label("Año\tPago"), "ano pago");
        assert_eq!(fold_label("Fecha :"), "fecha");
        assert_eq!(fold_label(""), "");
    }

    #[test]
    fn test_visible_chars() {
        assert_eq!(visible_chars(" - "), 0);
        assert_eq!(visible_chars("$"), 0);
        assert_eq!(visible_chars("Example Corp"), 11);
        assert_eq!(visible_chars("76.732.087-6"), 9);
    }
}
