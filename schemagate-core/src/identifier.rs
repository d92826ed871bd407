//! Identifier safety gate and name normalization helpers.
//!
//! `quote_identifier` is the only path by which a table or column name enters
//! SQL text. Everything that reaches it has already been resolved against the
//! schema catalog, and it still refuses anything outside `^[a-z][a-z0-9_]*$`.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{CompileError, CompileResult};

static SAFE_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("Invalid identifier regex"));

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("Invalid whitespace regex"));

// ============================================================================
// SAFETY GATE
// ============================================================================

/// Check whether `identifier` may appear in SQL text.
pub fn is_safe_identifier(identifier: &str) -> bool {
    SAFE_IDENTIFIER.is_match(identifier)
}

/// Reject any identifier that does not match `^[a-z][a-z0-9_]*$`.
pub fn assert_safe_identifier(identifier: &str) -> CompileResult<&str> {
    if is_safe_identifier(identifier) {
        Ok(identifier)
    } else {
        Err(CompileError::UnsafeIdentifier {
            identifier: identifier.to_string(),
        })
    }
}

/// Quote an identifier for SQL text after passing it through the gate.
pub fn quote_identifier(identifier: &str) -> CompileResult<String> {
    let safe = assert_safe_identifier(identifier)?;
    Ok(format!("\"{}\"", safe))
}

// ============================================================================
// NORMALIZATION
// ============================================================================

/// Trim, lowercase and collapse runs of whitespace to a single space.
pub fn normalize_alias(input: &str) -> String {
    WHITESPACE
        .replace_all(input.trim(), " ")
        .to_lowercase()
}

/// Normalize to database identifier form: spaces and hyphens become underscores.
pub fn to_db_identifier(input: &str) -> String {
    let normalized = normalize_alias(input);
    let mut out = String::with_capacity(normalized.len());
    for ch in normalized.chars() {
        let ch = if ch == ' ' || ch == '-' { '_' } else { ch };
        if ch == '_' && out.ends_with('_') {
            continue;
        }
        out.push(ch);
    }
    out
}

/// Convert `camelCase` / `PascalCase` input to `snake_case`.
///
/// Acronym runs stay together: `createdAtUTC` becomes `created_at_utc`.
pub fn camel_to_snake(input: &str) -> String {
    let chars: Vec<char> = input.trim().chars().collect();
    let mut out = String::with_capacity(chars.len() + 4);

    for (i, &ch) in chars.iter().enumerate() {
        if ch == ' ' || ch == '-' {
            if !out.ends_with('_') {
                out.push('_');
            }
            continue;
        }
        if ch.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|c| c.is_lowercase());
            let boundary = prev.is_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_uppercase() && next_is_lower);
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
        }
        out.extend(ch.to_lowercase());
    }
    out
}

/// Best-effort English singular form of a plural word, `None` when the word
/// does not look plural.
pub fn singularize(word: &str) -> Option<String> {
    if word.len() > 3 && word.ends_with("ies") {
        return Some(format!("{}y", &word[..word.len() - 3]));
    }
    for suffix in ["sses", "uses", "xes", "ches", "shes", "zzes"] {
        if word.ends_with(suffix) {
            return Some(word[..word.len() - 2].to_string());
        }
    }
    if word.ends_with("ss") || word.ends_with("us") || word.ends_with("is") {
        return None;
    }
    if word.len() > 1 && word.ends_with('s') {
        return Some(word[..word.len() - 1].to_string());
    }
    None
}

/// Best-effort English plural form of a singular word.
pub fn pluralize(word: &str) -> String {
    let consonant_y = word.len() > 1
        && word.ends_with('y')
        && !matches!(
            word.as_bytes()[word.len() - 2],
            b'a' | b'e' | b'i' | b'o' | b'u'
        );
    if consonant_y {
        return format!("{}ies", &word[..word.len() - 1]);
    }
    if ["s", "x", "z", "ch", "sh"].iter().any(|s| word.ends_with(s)) {
        return format!("{}es", word);
    }
    format!("{}s", word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_identifiers_pass_the_gate() {
        for ident in ["biz_id", "booking_orders", "a", "col2", "x_1_y"] {
            assert!(is_safe_identifier(ident), "{} should be safe", ident);
            assert_eq!(assert_safe_identifier(ident), Ok(ident));
        }
    }

    #[test]
    fn test_unsafe_identifiers_are_rejected() {
        for ident in [
            "",
            "1abc",
            "_hidden",
            "Booking",
            "booking orders",
            "status\"; DROP TABLE bizes; --",
            "name'",
            "a-b",
            "ünicode",
        ] {
            assert!(
                matches!(
                    quote_identifier(ident),
                    Err(CompileError::UnsafeIdentifier { .. })
                ),
                "{:?} should be rejected",
                ident
            );
        }
    }

    #[test]
    fn test_quote_identifier_wraps_in_double_quotes() -> CompileResult<()> {
        assert_eq!(quote_identifier("biz_id")?, "\"biz_id\"");
        Ok(())
    }

    #[test]
    fn test_normalize_alias_collapses_whitespace() {
        assert_eq!(normalize_alias("  Booking   Orders "), "booking orders");
        assert_eq!(normalize_alias("\tQueues\n"), "queues");
    }

    #[test]
    fn test_to_db_identifier() {
        assert_eq!(to_db_identifier("Booking Orders"), "booking_orders");
        assert_eq!(to_db_identifier("booking-orders"), "booking_orders");
        assert_eq!(to_db_identifier("booking - orders"), "booking_orders");
    }

    #[test]
    fn test_camel_to_snake() {
        assert_eq!(camel_to_snake("bizId"), "biz_id");
        assert_eq!(camel_to_snake("StartsAt"), "starts_at");
        assert_eq!(camel_to_snake("createdAtUTC"), "created_at_utc");
        assert_eq!(camel_to_snake("HTTPStatus"), "http_status");
        assert_eq!(camel_to_snake("line2Address"), "line2_address");
        assert_eq!(camel_to_snake("already_snake"), "already_snake");
    }

    #[test]
    fn test_singularize() {
        assert_eq!(singularize("booking_orders").as_deref(), Some("booking_order"));
        assert_eq!(singularize("categories").as_deref(), Some("category"));
        assert_eq!(singularize("addresses").as_deref(), Some("address"));
        assert_eq!(singularize("statuses").as_deref(), Some("status"));
        assert_eq!(singularize("batches").as_deref(), Some("batch"));
        assert_eq!(singularize("status"), None);
        assert_eq!(singularize("access"), None);
        assert_eq!(singularize("queue"), None);
    }

    #[test]
    fn test_pluralize() {
        assert_eq!(pluralize("queue"), "queues");
        assert_eq!(pluralize("category"), "categories");
        assert_eq!(pluralize("day"), "days");
        assert_eq!(pluralize("batch"), "batches");
    }
}
