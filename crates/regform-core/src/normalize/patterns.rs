//! Common regex patterns for value normalization.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // RUT: optional thousands dots, dash or space before the check character
    pub static ref RUT_PATTERN: Regex = Regex::new(
        r"(?i)^(\d{1,2}(?:\.?\d{3}){2})\s*[-\s]?\s*([0-9K])$"
    ).unwrap();

    // DD/MM/YYYY, DD-MM-YYYY, DD.MM.YYYY (two-digit years allowed)
    pub static ref DATE_DMY: Regex = Regex::new(
        r"\b(\d{1,2})([./\-])(\d{1,2})([./\-])(\d{4}|\d{2})\b"
    ).unwrap();

    // YYYY-MM-DD or YYYY/MM/DD
    pub static ref DATE_YMD: Regex = Regex::new(
        r"\b(\d{4})[./\-](\d{1,2})[./\-](\d{1,2})\b"
    ).unwrap();

    // "15 de enero de 2024", "15 enero 2024", "15 de enero del 2024"
    pub static ref DATE_SPANISH_LONG: Regex = Regex::new(
        r"(?i)\b(\d{1,2})\s+(?:de\s+)?(enero|febrero|marzo|abril|mayo|junio|julio|agosto|septiembre|setiembre|octubre|noviembre|diciembre)\s+(?:del?\s+)?(\d{4})\b"
    ).unwrap();

    // "15-ene-2024", "15 ene. 24"
    pub static ref DATE_SPANISH_ABBR: Regex = Regex::new(
        r"(?i)\b(\d{1,2})[\s./\-]+(ene|feb|mar|abr|may|jun|jul|ago|sept|sep|set|oct|nov|dic)\.?[\s./\-]+(\d{4}|\d{2})\b"
    ).unwrap();

    // Currency marks stripped before parsing amounts
    pub static ref CURRENCY_TOKENS: Regex = Regex::new(
        r"(?i)US\$|\bCLP\b|\bUSD\b|\bUF\b|\bpesos?\b|\$"
    ).unwrap();

    // Digit runs, masked when grouping error messages into patterns
    pub static ref DIGIT_RUN: Regex = Regex::new(r"\d+").unwrap();
}
