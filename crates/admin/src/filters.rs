//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

/// Returns the current year, for the page footer.
///
/// Usage in templates: `{{ ""|current_year }}`
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// Upper-cased first character of a name or email, for the header badge.
///
/// Usage in templates: `{{ admin_email|initial }}`
#[askama::filter_fn]
pub fn initial(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(first_initial(&value.to_string()))
}

fn first_initial(value: &str) -> String {
    value
        .trim()
        .chars()
        .next()
        .map_or_else(|| "?".to_string(), |c| c.to_uppercase().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_initial() {
        assert_eq!(first_initial("admin@tttfootwears.ng"), "A");
        assert_eq!(first_initial("  ede@example.com"), "E");
        assert_eq!(first_initial(""), "?");
    }
}
