//! Regex patterns for hole and dimension descriptors.

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

lazy_static! {
    // Metric thread designator: "M6", "M 8", "M10x1.25", also glued to a count ("4xM6").
    // The M must not be part of a word, so "MM6" or "DIM 4" never match.
    pub static ref THREAD_DESIGNATOR: Regex = Regex::new(
        r"(?:^|[^A-Za-z]|\d[xX×])M\s?(\d+(?:[.,]\d+)?)"
    ).unwrap();

    // Leading count on a descriptor: "4x M6", "2 X Ø20"
    pub static ref COUNT_PREFIX: Regex = Regex::new(
        r"^\s*(\d+)\s*[xX×]\s*"
    ).unwrap();

    // Diameter symbol variants the model emits
    pub static ref DIAMETER_SYMBOL: Regex = Regex::new(
        r"^\s*(?:Ø|ø|⌀|(?i:dia\.?)|O(?:\s|\d))"
    ).unwrap();

    pub static ref NUMBER: Regex = Regex::new(
        r"\d+(?:[.,]\d+)?"
    ).unwrap();
}

/// Numeric size of the first thread designator in `text`.
pub fn thread_size(text: &str) -> Option<Decimal> {
    THREAD_DESIGNATOR
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| parse_decimal(m.as_str()))
}

/// Split a leading count off a descriptor: `"4x M6"` → `(Some(4), "M6")`.
pub fn split_count(text: &str) -> (Option<u32>, &str) {
    match COUNT_PREFIX.captures(text) {
        Some(caps) => {
            let count = caps.get(1).and_then(|m| m.as_str().parse().ok());
            let rest = caps.get(0).map_or(text, |m| &text[m.end()..]);
            (count, rest.trim())
        }
        None => (None, text.trim()),
    }
}

/// Diameter without any symbol prefix: `"Ø19.5"` → `"19.5"`.
pub fn bare_diameter(text: &str) -> &str {
    let text = text.trim();
    match DIAMETER_SYMBOL.find(text) {
        // "O20" consumes the first digit; keep it
        Some(m) if m.as_str().ends_with(|c: char| c.is_ascii_digit()) => text[m.end() - 1..].trim(),
        Some(m) => text[m.end()..].trim(),
        None => text,
    }
}

/// Numeric diameter value.
pub fn diameter_value(text: &str) -> Option<Decimal> {
    NUMBER
        .find(bare_diameter(text))
        .and_then(|m| parse_decimal(m.as_str()))
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    Decimal::from_str(&text.replace(',', ".")).ok()
}
