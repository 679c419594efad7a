pub mod cart;
pub mod health;
pub mod plants;
pub mod users;

/// Trims and drops empty strings.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Trimmed, lower-cased identifier (email or username).
pub(crate) fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}
