// Utility helpers for key normalization and number parsing.
//
// Spreadsheet exports hand us codes like `5`, `5.0` or ` 05 `; everything that
// becomes a join key passes through here first so the rest of the code can
// compare plain strings.
use num_format::{Locale, ToFormattedString};

/// Read integer-valued text, accepting float renderings such as `2020.0`.
///
/// Returns `None` for blanks, non-numbers and numbers with a fractional part.
pub fn parse_integer_text(s: &str) -> Option<i64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(n) = s.parse::<i64>() {
        return Some(n);
    }
    let f = s.parse::<f64>().ok()?;
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

/// Parse a trimmed `f64`, returning `None` for blanks and garbage.
pub fn parse_f64_safe(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Zero-pad an area code to two digits (`5` -> `05`, `5.0` -> `05`).
///
/// Text that is not an integer is returned trimmed but otherwise untouched.
pub fn normalize_area_code(raw: &str) -> String {
    match parse_integer_text(raw) {
        Some(n) if n >= 0 => format!("{:02}", n),
        _ => raw.trim().to_string(),
    }
}

/// Render a year as plain integer text (`2020.0` -> `2020`).
pub fn normalize_year(raw: &str) -> String {
    match parse_integer_text(raw) {
        Some(n) => n.to_string(),
        None => raw.trim().to_string(),
    }
}

/// Replace a missing or blank attribute with the configured sentinel.
pub fn fill_missing(value: Option<&str>, sentinel: &str) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => sentinel.to_string(),
    }
}

/// Treat blank cells as missing.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    // Counts in console messages (e.g., `9,855 rows written`).
    n.to_formatted_string(&Locale::en)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn area_codes_are_zero_padded() {
        assert_eq!(normalize_area_code("5"), "05");
        assert_eq!(normalize_area_code("5.0"), "05");
        assert_eq!(normalize_area_code(" 31 "), "31");
        assert_eq!(normalize_area_code("123"), "123");
        assert_eq!(normalize_area_code("XX"), "XX");
    }

    #[test]
    fn years_drop_float_suffix() {
        assert_eq!(normalize_year("2020.0"), "2020");
        assert_eq!(normalize_year("2021"), "2021");
        assert_eq!(normalize_year("n/a"), "n/a");
    }

    #[test]
    fn blanks_become_the_sentinel() {
        assert_eq!(fill_missing(None, "-"), "-");
        assert_eq!(fill_missing(Some("  "), "-"), "-");
        assert_eq!(fill_missing(Some(" Jawa "), "-"), "Jawa");
    }

    #[test]
    fn integer_text_rejects_fractions() {
        assert_eq!(parse_integer_text("12.5"), None);
        assert_eq!(parse_integer_text(""), None);
        assert_eq!(parse_integer_text("-3"), Some(-3));
    }

    #[test]
    fn counts_use_thousands_separators() {
        assert_eq!(format_int(9855usize), "9,855");
    }
}
