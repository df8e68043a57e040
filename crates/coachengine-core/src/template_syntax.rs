//! Shared placeholder syntax used by both the topic registry's eager
//! registration-time check and the template renderer's defensive re-check.
//!
//! Intentionally minimal: a placeholder is a double-braced bare name, no
//! conditionals, loops, nested paths, or filters.

use std::collections::BTreeSet;

/// Extract every distinct `{{name}}` placeholder appearing in `text`, in
/// first-seen order (returned as a sorted set since callers only care
/// about membership, and sorted output keeps error messages deterministic).
pub fn extract_placeholders(text: &str) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    let bytes = text.as_bytes();
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == b'{' && bytes[i + 1] == b'{' {
            if let Some(end) = text[i + 2..].find("}}") {
                let name = text[i + 2..i + 2 + end].trim();
                if is_bare_name(name) {
                    names.insert(name.to_string());
                }
                i += 2 + end + 2;
                continue;
            }
        }
        i += 1;
    }
    names
}

fn is_bare_name(s: &str) -> bool {
    !s.is_empty()
        && s.chars().next().map(|c| c.is_ascii_alphabetic() || c == '_').unwrap_or(false)
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_simple_placeholders() {
        let names = extract_placeholders("Hello {{name}}, welcome to {{ topic }}.");
        assert_eq!(names.len(), 2);
        assert!(names.contains("name"));
        assert!(names.contains("topic"));
    }

    #[test]
    fn ignores_non_bare_names() {
        let names = extract_placeholders("{{user.name}} and {{1abc}} and {{}}");
        assert!(names.is_empty());
    }

    #[test]
    fn dedupes_repeated_placeholders() {
        let names = extract_placeholders("{{x}} ... {{x}} ... {{y}}");
        assert_eq!(names.len(), 2);
    }
}
