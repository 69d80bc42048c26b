use crate::workflows::refinance::domain::NumericField;

fn strip_invisible(value: &str) -> String {
    value.replace(['\u{feff}', '\u{200b}'], "")
}

/// Canonical column name: invisible characters removed, lowercased, inner
/// whitespace folded into single underscores.
pub(crate) fn normalize_header(value: &str) -> String {
    let cleaned = strip_invisible(value);
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join("_");
    collapsed.to_ascii_lowercase()
}

pub(crate) fn normalize_key(value: &str) -> String {
    strip_invisible(value).trim().to_string()
}

pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

pub(crate) fn parse_decimal(value: Option<&str>) -> NumericField {
    let Some(raw) = value.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return NumericField::Missing;
    };

    let numeric = raw.strip_suffix('%').unwrap_or(raw).trim();
    match numeric.parse::<f64>() {
        Ok(parsed) if parsed.is_finite() => NumericField::Value(parsed),
        _ => NumericField::Invalid(raw.to_string()),
    }
}

pub(crate) fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Some(true),
        "false" | "f" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}
