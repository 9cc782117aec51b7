//! Attribute queries over pooled resources

use crate::pattern;
use crate::resource::Resource;

use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// Attribute value a resource exposes for querying
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Int(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

type PredicateFn = dyn Fn(Option<&Value>, &dyn Resource) -> bool + Send + Sync;

/// How a single attribute is matched
#[derive(Clone)]
pub enum Matcher {
    /// Wildcard pattern against the attribute's string form, falling back to
    /// exact string equality
    Pattern {
        source: String,
        compiled: Option<Regex>,
    },

    /// Unanchored regular expression against the attribute's string form
    Regex(Regex),

    /// Strict equality
    Exact(Value),

    /// Arbitrary test over the attribute and the resource exposing it
    Predicate(Arc<PredicateFn>),
}

impl Matcher {
    pub fn pattern(source: impl Into<String>) -> Self {
        let source = source.into();
        let compiled = pattern::compile(&source);
        Matcher::Pattern { source, compiled }
    }

    pub fn predicate<F>(predicate: F) -> Self
    where
        F: Fn(Option<&Value>, &dyn Resource) -> bool + Send + Sync + 'static,
    {
        Matcher::Predicate(Arc::new(predicate))
    }

    /// Test one attribute value
    pub fn matches(&self, value: Option<&Value>, resource: &dyn Resource) -> bool {
        match self {
            Matcher::Pattern { source, compiled } => {
                let Some(value) = value else {
                    return false;
                };
                if let Some(regex) = compiled
                    && regex.is_match(&value.to_string())
                {
                    return true;
                }
                matches!(value, Value::Str(s) if s == source)
            }
            Matcher::Regex(regex) => value.is_some_and(|v| regex.is_match(&v.to_string())),
            Matcher::Exact(expected) => value == Some(expected),
            Matcher::Predicate(predicate) => predicate(value, resource),
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Pattern { source, .. } => f.debug_tuple("Pattern").field(source).finish(),
            Matcher::Regex(regex) => f.debug_tuple("Regex").field(&regex.as_str()).finish(),
            Matcher::Exact(value) => f.debug_tuple("Exact").field(value).finish(),
            Matcher::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl From<&str> for Matcher {
    fn from(source: &str) -> Self {
        Matcher::pattern(source)
    }
}

impl From<String> for Matcher {
    fn from(source: String) -> Self {
        Matcher::pattern(source)
    }
}

impl From<Regex> for Matcher {
    fn from(regex: Regex) -> Self {
        Matcher::Regex(regex)
    }
}

impl From<Value> for Matcher {
    fn from(value: Value) -> Self {
        match value {
            Value::Str(source) => Matcher::pattern(source),
            other => Matcher::Exact(other),
        }
    }
}

impl From<i64> for Matcher {
    fn from(value: i64) -> Self {
        Matcher::Exact(value.into())
    }
}

impl From<i32> for Matcher {
    fn from(value: i32) -> Self {
        Matcher::Exact(value.into())
    }
}

impl From<bool> for Matcher {
    fn from(value: bool) -> Self {
        Matcher::Exact(value.into())
    }
}

/// Set of attribute clauses a resource must all satisfy
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{Query, Value};
///
/// let query = Query::new()
///     .with("filename", "*.js")
///     .predicate("fd", |fd, _| matches!(fd, Some(Value::Int(n)) if *n > 22));
///
/// assert_eq!(query.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Query {
    clauses: Vec<(String, Matcher)>,
}

impl Query {
    /// Query that matches every resource
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a clause for `key`, replacing any earlier clause for it
    pub fn with(mut self, key: impl Into<String>, matcher: impl Into<Matcher>) -> Self {
        let key = key.into();
        let matcher = matcher.into();
        match self.clauses.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = matcher,
            None => self.clauses.push((key, matcher)),
        }
        self
    }

    pub fn pattern(self, key: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.with(key, Matcher::pattern(pattern))
    }

    pub fn regex(self, key: impl Into<String>, regex: Regex) -> Self {
        self.with(key, Matcher::Regex(regex))
    }

    pub fn equals(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(key, Matcher::Exact(value.into()))
    }

    pub fn predicate<F>(self, key: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(Option<&Value>, &dyn Resource) -> bool + Send + Sync + 'static,
    {
        self.with(key, Matcher::predicate(predicate))
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Whether `resource` satisfies every clause
    pub fn matches(&self, resource: &dyn Resource) -> bool {
        self.clauses.iter().all(|(key, matcher)| {
            let value = resource.attribute(key);
            matcher.matches(value.as_ref(), resource)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PoolResult;
    use async_trait::async_trait;

    struct Entry {
        name: &'static str,
        size: i64,
    }

    #[async_trait]
    impl Resource for Entry {
        async fn open(&self) -> PoolResult<()> {
            Ok(())
        }

        async fn close(&self, _allow_active: bool) -> PoolResult<()> {
            Ok(())
        }

        fn attribute(&self, name: &str) -> Option<Value> {
            match name {
                "name" => Some(self.name.into()),
                "size" => Some(self.size.into()),
                _ => None,
            }
        }
    }

    fn entry(name: &'static str, size: i64) -> Entry {
        Entry { name, size }
    }

    #[test]
    fn test_empty_query_matches_everything() {
        assert!(Query::new().matches(&entry("a", 1)));
    }

    #[test]
    fn test_pattern_clause() {
        let query = Query::new().with("name", "*.js");
        assert!(query.matches(&entry("index.js", 1)));
        assert!(!query.matches(&entry("package.json", 1)));
    }

    #[test]
    fn test_pattern_against_numbers() {
        let query = Query::new().pattern("size", "2*");
        assert!(query.matches(&entry("a", 23)));
        assert!(!query.matches(&entry("a", 32)));
    }

    #[test]
    fn test_invalid_pattern_falls_back_to_equality() {
        let query = Query::new().with("name", "a(*");
        assert!(query.matches(&entry("a(*", 1)));
        assert!(!query.matches(&entry("a(b", 1)));
    }

    #[test]
    fn test_exact_clause() {
        let query = Query::new().with("size", 22);
        assert!(query.matches(&entry("a", 22)));
        assert!(!query.matches(&entry("a", 23)));
    }

    #[test]
    fn test_regex_clause_is_unanchored() {
        let query = Query::new().regex("name", Regex::new("lock").unwrap());
        assert!(query.matches(&entry("package-lock.json", 1)));
        assert!(!query.matches(&entry("package.json", 1)));
    }

    #[test]
    fn test_predicate_clause() {
        let query = Query::new().predicate("size", |size, _| {
            matches!(size, Some(Value::Int(n)) if *n > 22)
        });
        assert!(query.matches(&entry("a", 23)));
        assert!(!query.matches(&entry("a", 22)));
    }

    #[test]
    fn test_missing_attribute_never_matches() {
        assert!(!Query::new().with("owner", "*").matches(&entry("a", 1)));
        assert!(!Query::new().equals("owner", 1).matches(&entry("a", 1)));
    }

    #[test]
    fn test_every_clause_must_match() {
        let query = Query::new().with("name", "*.js").with("size", 2);
        assert!(query.matches(&entry("index.js", 2)));
        assert!(!query.matches(&entry("index.js", 3)));
    }

    #[test]
    fn test_later_clause_replaces_earlier() {
        let query = Query::new().with("name", "*.json").with("name", "*.js");
        assert_eq!(query.len(), 1);
        assert!(query.matches(&entry("test.js", 1)));
    }
}
