//! Serial line decoding and parsing.
//!
//! The device prints one reading per line as comma-separated `key:value`
//! tokens, e.g. `moisture:45,temperature:24.50`.

use std::collections::BTreeMap;

/// Parsed tokens of one line. A key maps to `None` when its value did not
/// parse as a finite number.
pub type ParsedLine = BTreeMap<String, Option<f64>>;

/// Decode raw serial bytes, dropping anything that is not valid UTF-8.
pub fn decode_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .chars()
        .filter(|c| *c != char::REPLACEMENT_CHARACTER)
        .collect()
}

/// Parse a line into its `key:value` tokens.
///
/// Tokens without a `:` are skipped. A bad value only nulls its own key; the
/// rest of the line is kept.
pub fn parse_line(line: &str) -> ParsedLine {
    let mut result = ParsedLine::new();
    for part in line.trim().split(',') {
        let Some((key, value)) = part.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value.trim().parse::<f64>().ok().filter(|v| v.is_finite());
        result.insert(key.to_string(), value);
    }
    result
}
