//! Locale formatting of numeric readouts
//!
//! Property inputs display values with comma thousands separators and two
//! fraction digits. The area readout adds a square-metre suffix.

use once_cell::sync::Lazy;
use regex::Regex;

static AREA_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([+-]?[0-9][0-9,]*(?:\.[0-9]+)?|[+-]?\.[0-9]+)\s*(?:m²|m\^2|m2|sq\.?\s*m)?\s*$")
        .expect("area pattern is valid")
});

/// Render a value the way the property panel does: `500000` -> `500,000.00`
pub fn format_property_value(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let negative =
        value.is_sign_negative() && fixed.chars().any(|c| c.is_ascii_digit() && c != '0');
    format!("{}{}.{}", if negative { "-" } else { "" }, grouped, frac_part)
}

/// Parse a property panel value such as `1,234.50`
pub fn parse_property_value(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse the area readout, e.g. `1,234.56 m²`
pub fn parse_area_text(text: &str) -> Option<f64> {
    let captures = AREA_PATTERN.captures(text)?;
    let number = captures.get(1)?.as_str().replace(',', "");
    number.parse::<f64>().ok().filter(|v| v.is_finite())
}
