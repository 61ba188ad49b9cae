//! Variable references inside prompt text and document bodies.
//!
//! Recognised forms: `$name`, `$context.name`, `{name}`, `{context.name}`.

use regex::{Captures, Regex};
use std::sync::LazyLock;

use crate::symbols::canonical_name;

static REFERENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{((?:context\.)?[A-Za-z_][A-Za-z0-9_]*)\}|\$((?:context\.)?[A-Za-z_][A-Za-z0-9_]*)")
        .expect("static reference regex")
});

/// One variable reference found in text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// The reference as written, without the `$` sigil (`{context.x}`, `x`).
    pub raw: String,
    /// 0-based line within the scanned text.
    pub line_offset: u32,
}

impl Reference {
    pub fn name(&self) -> &str {
        canonical_name(&self.raw)
    }

    /// `{name}` without the `context.` prefix. Prompt bodies often carry
    /// code where such braces are not meant as references.
    pub fn is_bare_braced(&self) -> bool {
        self.raw.starts_with('{') && !self.raw.starts_with("{context.")
    }
}

/// Find every variable reference in `text`, in order of appearance.
pub fn references(text: &str) -> Vec<Reference> {
    REFERENCE_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let raw = match (caps.get(1), caps.get(2)) {
                (Some(_), _) => whole.as_str().to_string(),
                (None, Some(m)) => m.as_str().to_string(),
                (None, None) => return None,
            };
            let line_offset = text[..whole.start()].matches('\n').count() as u32;
            Some(Reference { raw, line_offset })
        })
        .collect()
}

/// Replace every reference `lookup` can resolve. Unresolved references are
/// left as written.
pub fn interpolate(text: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    REFERENCE_RE
        .replace_all(text, |caps: &Captures| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| canonical_name(m.as_str()))
                .unwrap_or_default();
            lookup(name).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_all_reference_forms() {
        let refs = references("a $x b {y}\n{context.z} $context.w");
        let names: Vec<&str> = refs.iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["x", "y", "z", "w"]);
        assert_eq!(refs[1].raw, "{y}");
        assert_eq!(refs[2].raw, "{context.z}");
        assert_eq!(refs[3].raw, "context.w");
        assert_eq!(refs[2].line_offset, 1);
        let bare: Vec<bool> = refs.iter().map(Reference::is_bare_braced).collect();
        assert_eq!(bare, vec![false, true, false, false]);
    }

    #[test]
    fn ignores_json_like_braces_and_bare_dollars() {
        assert!(references(r#"{ "a": 1 } costs $5"#).is_empty());
    }

    #[test]
    fn interpolate_replaces_known_and_keeps_unknown() {
        let out = interpolate("hi $name, {context.lang} $other", |n| match n {
            "name" => Some("Ann".to_string()),
            "lang" => Some("rust".to_string()),
            _ => None,
        });
        assert_eq!(out, "hi Ann, rust $other");
    }
}
