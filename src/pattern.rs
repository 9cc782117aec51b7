//! Wildcard patterns used by string matchers in queries

use regex::Regex;
use std::sync::LazyLock;

static LEADING_STAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\*").expect("valid leading star pattern"));

static TRAILING_STAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-zA-Z0-9_|%@]+)\*").expect("valid trailing star pattern"));

static BACKSLASHES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\+").expect("valid backslash pattern"));

/// Translate a wildcard pattern into regular expression source.
///
/// Applied in order: a leading `*`, a `*` following identifier characters,
/// `/*`, and any run of backslashes all become `.*`. Everything else is left
/// as regex syntax.
///
/// # Examples
///
/// ```
/// use esox_resourcepool::pattern::translate;
///
/// assert_eq!(translate("*.js"), ".*.js");
/// assert_eq!(translate("package*"), "package.*");
/// assert_eq!(translate("src/*"), "src.*");
/// ```
pub fn translate(pattern: &str) -> String {
    let translated = LEADING_STAR.replace(pattern, ".*");
    let translated = TRAILING_STAR.replace_all(&translated, "${1}.*");
    let translated = translated.replace("/*", ".*");
    BACKSLASHES.replace_all(&translated, ".*").into_owned()
}

/// Compile a wildcard pattern into an anchored matcher.
///
/// Returns `None` when the translation is not a valid regular expression,
/// in which case callers fall back to exact comparison.
pub fn compile(pattern: &str) -> Option<Regex> {
    Regex::new(&format!("^(?:{})$", translate(pattern))).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leading_star() {
        assert_eq!(translate("*.json"), ".*.json");
        assert_eq!(translate("*"), ".*");
    }

    #[test]
    fn test_trailing_star_after_identifier() {
        assert_eq!(translate("index*"), "index.*");
        assert_eq!(translate("a_b%c@d*"), "a_b%c@d.*");
        assert_eq!(translate("foo*bar*"), "foo.*bar.*");
    }

    #[test]
    fn test_slash_star() {
        assert_eq!(translate("logs/*"), "logs.*");
        assert_eq!(translate("./*"), "..*");
    }

    #[test]
    fn test_backslash_runs() {
        assert_eq!(translate(r"a\b"), "a.*b");
        assert_eq!(translate(r"a\\\b"), "a.*b");
    }

    #[test]
    fn test_compiled_pattern_is_anchored() {
        let js = compile("*.js").unwrap();
        assert!(js.is_match("index.js"));
        assert!(js.is_match("test.js"));
        assert!(!js.is_match("package.json"));
        assert!(!js.is_match("index.js.map"));
    }

    #[test]
    fn test_literal_pattern() {
        let exact = compile("index.js").unwrap();
        assert!(exact.is_match("index.js"));
        assert!(!exact.is_match("test.js"));
    }

    #[test]
    fn test_invalid_translation() {
        assert!(compile("(").is_none());
    }
}
