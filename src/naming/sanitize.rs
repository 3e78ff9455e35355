//! Identifier sanitization.

use std::sync::LazyLock;

use regex::Regex;

/// PostgreSQL's identifier length ceiling (`NAMEDATALEN - 1`).
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Fallback for names that sanitize to nothing.
pub const UNNAMED_OBJECT: &str = "unnamed_object";

/// Fallback for namespaces that sanitize to nothing.
pub const DEFAULT_NAMESPACE: &str = "public";

static SEPARATOR_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s\-.()]+").expect("static regex"));
static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_]").expect("static regex"));
static UNDERSCORE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_{2,}").expect("static regex"));

/// Turn arbitrary text into a safe relational identifier.
///
/// Steps, each applied to the previous result:
///
/// 1. trim surrounding whitespace
/// 2. lowercase (skipped for namespaces, which keep their casing)
/// 3. replace runs of whitespace, `-`, `.`, `(` and `)` with a single `_`
/// 4. drop every character that is not an ASCII letter, digit or `_`
/// 5. collapse repeated underscores
/// 6. trim leading and trailing underscores
/// 7. substitute [`UNNAMED_OBJECT`] (or [`DEFAULT_NAMESPACE`]) if nothing is left
/// 8. prefix `_` when a non-namespace identifier starts with a digit
/// 9. cut to [`MAX_IDENTIFIER_LEN`] characters
///
/// The result is never empty, never longer than 63 characters, and
/// `sanitize(&sanitize(x, ns), ns) == sanitize(x, ns)`.
///
/// ```rust
/// use tabload::naming::sanitize;
///
/// assert_eq!(sanitize("Unit Price (USD)", false), "unit_price_usd");
/// assert_eq!(sanitize("2024", false), "_2024");
/// assert_eq!(sanitize("2024", true), "2024");
/// assert_eq!(sanitize("###", false), "unnamed_object");
/// ```
pub fn sanitize(name: &str, is_namespace: bool) -> String {
    let trimmed = name.trim();
    let cased = if is_namespace {
        trimmed.to_string()
    } else {
        trimmed.to_lowercase()
    };

    let separated = SEPARATOR_RUNS.replace_all(&cased, "_");
    let stripped = DISALLOWED.replace_all(&separated, "");
    let collapsed = UNDERSCORE_RUNS.replace_all(&stripped, "_");
    let core = collapsed.trim_matches('_');

    let mut out = if core.is_empty() {
        let fallback = if is_namespace {
            DEFAULT_NAMESPACE
        } else {
            UNNAMED_OBJECT
        };
        fallback.to_string()
    } else {
        core.to_string()
    };

    if !is_namespace && out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }

    truncate_identifier(&mut out, MAX_IDENTIFIER_LEN);
    out
}

/// Cut an ASCII identifier to `max` characters without leaving a dangling underscore.
pub(crate) fn truncate_identifier(ident: &mut String, max: usize) {
    ident.truncate(max);
    while ident.len() > 1 && ident.ends_with('_') {
        ident.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_joins_separators() {
        assert_eq!(sanitize("  Customer Name ", false), "customer_name");
        assert_eq!(sanitize("first-name.last", false), "first_name_last");
        assert_eq!(sanitize("Amount (TRY)", false), "amount_try");
    }

    #[test]
    fn namespace_keeps_case_and_leading_digit() {
        assert_eq!(sanitize("Sales Data", true), "Sales_Data");
        assert_eq!(sanitize("2024", true), "2024");
        assert_eq!(sanitize("!!!", true), "public");
    }

    #[test]
    fn strips_non_ascii_word_characters() {
        assert_eq!(sanitize("Müşteri Adı", false), "mteri_ad");
        assert_eq!(sanitize("価格", false), "unnamed_object");
    }

    #[test]
    fn digit_prefix_survives_underscore_trim() {
        assert_eq!(sanitize("_2024_", false), "_2024");
        assert_eq!(sanitize("2024 Q1", false), "_2024_q1");
    }

    #[test]
    fn only_underscores_falls_back() {
        assert_eq!(sanitize("___", false), "unnamed_object");
        assert_eq!(sanitize("- . -", false), "unnamed_object");
    }

    #[test]
    fn truncates_without_trailing_underscore() {
        let long = format!("{}_{}", "a".repeat(62), "b".repeat(10));
        let out = sanitize(&long, false);
        assert_eq!(out, "a".repeat(62));
        assert_eq!(sanitize("x".repeat(100).as_str(), false).len(), MAX_IDENTIFIER_LEN);
    }
}
