use crate::error::{AtelierError, ValidationError};

/// Sanitize an externally supplied id for use as a filesystem path segment.
///
/// Path-traversal sequences are rejected outright; remaining characters are
/// folded to `[a-z0-9_-]`. An id that sanitizes to nothing is rejected.
pub fn sanitize_id(raw: &str) -> crate::error::Result<String> {
    if raw.contains("..") || raw.contains('/') || raw.contains('\\') {
        return Err(AtelierError::Validation(ValidationError {
            issues: vec![format!("id contains path traversal sequence: {raw:?}")],
        }));
    }

    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();

    if cleaned.trim_matches('-').is_empty() {
        return Err(AtelierError::Validation(ValidationError {
            issues: vec![format!("id is empty after sanitization: {raw:?}")],
        }));
    }
    Ok(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_clean_ids_through_lowercased() {
        assert_eq!(sanitize_id("Run-42_A").unwrap(), "run-42_a");
    }

    #[test]
    fn rejects_traversal_sequences() {
        assert!(sanitize_id("../etc/passwd").is_err());
        assert!(sanitize_id("a/b").is_err());
        assert!(sanitize_id("a\\b").is_err());
    }

    #[test]
    fn folds_odd_characters_to_dash() {
        assert_eq!(sanitize_id("run 42!").unwrap(), "run-42-");
    }

    #[test]
    fn rejects_empty_after_sanitization() {
        assert!(sanitize_id("###").is_err());
        assert!(sanitize_id("   ").is_err());
    }
}
