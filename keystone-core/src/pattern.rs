//! Path pattern matching for watch registrations
//!
//! A pattern is a comma-separated list of `/`-rooted glob alternatives:
//! `*` matches within a single segment, `**` matches any number of whole
//! segments (including none). A path matches the pattern when it matches
//! any alternative.
//!
//! Compilation lowers the whole pattern to one anchored regex, so matching
//! a candidate path is a single automaton run. Compiled patterns compare
//! and hash by their normalized alternative list, which makes value-equal
//! patterns collide in the registry's bucket map.

use lru::LruCache;
use regex::Regex;
use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::Arc;
use thiserror::Error;

/// Per-thread capacity of the compile cache.
const CACHE_CAPACITY: usize = 512;

// Thread-local cache of compiled patterns. Watch registrations tend to
// reuse a small set of patterns, so the common case is a lookup, not a
// regex compilation.
thread_local! {
    static PATTERN_CACHE: RefCell<LruCache<String, Arc<PathPattern>>> =
        RefCell::new(LruCache::new(NonZeroUsize::new(CACHE_CAPACITY).unwrap()));
}

/// A pattern string that failed validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid path pattern {pattern:?}: {reason}")]
pub struct PatternError {
    /// The offending pattern, as given.
    pub pattern: String,
    /// What was wrong with it.
    pub reason: &'static str,
}

impl PatternError {
    fn new(pattern: &str, reason: &'static str) -> PatternError {
        PatternError {
            pattern: pattern.to_string(),
            reason,
        }
    }
}

/// A compiled path pattern.
///
/// Equality and hashing consider only the normalized pattern text, so two
/// independently compiled copies of the same pattern are interchangeable
/// as map keys.
#[derive(Debug, Clone)]
pub struct PathPattern {
    /// Normalized form: trimmed alternatives joined with `,`.
    pattern: String,
    regex: Regex,
}

impl PathPattern {
    /// Compiles a pattern string.
    ///
    /// Each comma-separated alternative is trimmed of surrounding
    /// whitespace, must be non-empty, must start with `/`, and must not
    /// contain NUL.
    pub fn compile(pattern: &str) -> Result<PathPattern, PatternError> {
        if pattern.contains('\0') {
            return Err(PatternError::new(pattern, "pattern must not contain NUL"));
        }
        let mut alternatives = Vec::new();
        for alternative in pattern.split(',') {
            let alternative = alternative.trim();
            if alternative.is_empty() {
                return Err(PatternError::new(pattern, "empty alternative"));
            }
            if !alternative.starts_with('/') {
                return Err(PatternError::new(pattern, "alternative must start with '/'"));
            }
            alternatives.push(alternative);
        }
        let regex = build_regex(&alternatives)
            .map_err(|_| PatternError::new(pattern, "pattern does not compile"))?;
        Ok(PathPattern {
            pattern: alternatives.join(","),
            regex,
        })
    }

    /// Compiles through the per-thread cache.
    ///
    /// Returns a shared handle so registry keys and watch handles can
    /// reference the same compilation.
    pub fn of(pattern: &str) -> Result<Arc<PathPattern>, PatternError> {
        let cached = PATTERN_CACHE.with(|cache| cache.borrow_mut().get(pattern).cloned());
        if let Some(compiled) = cached {
            return Ok(compiled);
        }
        let compiled = Arc::new(PathPattern::compile(pattern)?);
        PATTERN_CACHE.with(|cache| {
            cache
                .borrow_mut()
                .put(pattern.to_string(), Arc::clone(&compiled));
        });
        Ok(compiled)
    }

    /// The pattern that matches every path.
    pub fn all() -> Arc<PathPattern> {
        PathPattern::of("/**").expect("'/**' always compiles")
    }

    /// Tests a candidate path.
    ///
    /// Paths must be `/`-rooted; a trailing `/` never matches.
    pub fn matches(&self, path: &str) -> bool {
        if !path.starts_with('/') {
            return false;
        }
        if path.len() > 1 && path.ends_with('/') {
            return false;
        }
        self.regex.is_match(path)
    }

    /// The normalized pattern text.
    pub fn as_str(&self) -> &str {
        &self.pattern
    }
}

impl PartialEq for PathPattern {
    fn eq(&self, other: &PathPattern) -> bool {
        self.pattern == other.pattern
    }
}

impl Eq for PathPattern {}

impl Hash for PathPattern {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.pattern.hash(state);
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}

fn build_regex(alternatives: &[&str]) -> Result<Regex, regex::Error> {
    let mut source = String::with_capacity(alternatives.len() * 16 + 8);
    source.push_str("^(?:");
    for (i, alternative) in alternatives.iter().enumerate() {
        if i > 0 {
            source.push('|');
        }
        translate_alternative(alternative, &mut source);
    }
    source.push_str(")$");
    Regex::new(&source)
}

/// Lowers one `/`-rooted alternative into `out`.
///
/// `**` consumes its leading slash so that it can match zero segments:
/// `/a/**/b` accepts both `/a/b` and `/a/x/y/b`.
fn translate_alternative(alternative: &str, out: &mut String) {
    for segment in alternative[1..].split('/') {
        if segment == "**" {
            out.push_str("(?:/[^/]+)*");
            continue;
        }
        out.push('/');
        let mut first = true;
        for literal in segment.split('*') {
            if !first {
                out.push_str("[^/]*");
            }
            out.push_str(&regex::escape(literal));
            first = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn rejects_malformed_patterns() {
        assert!(PathPattern::compile("").is_err());
        assert!(PathPattern::compile("a/b").is_err());
        assert!(PathPattern::compile("/a,,/b").is_err());
        assert!(PathPattern::compile("/a, ,/b").is_err());
        assert!(PathPattern::compile("/a\0b").is_err());
    }

    #[test]
    fn single_star_stays_within_a_segment() {
        let p = PathPattern::compile("/a/*").unwrap();
        assert!(p.matches("/a/b"));
        assert!(p.matches("/a/b.json"));
        assert!(!p.matches("/a/b/c"));
        assert!(!p.matches("/b/c"));

        let suffix = PathPattern::compile("/a/*.json").unwrap();
        assert!(suffix.matches("/a/config.json"));
        assert!(!suffix.matches("/a/config.yaml"));
        assert!(!suffix.matches("/a/b/config.json"));
    }

    #[test]
    fn double_star_matches_any_depth() {
        let p = PathPattern::compile("/a/**").unwrap();
        assert!(p.matches("/a/b"));
        assert!(p.matches("/a/b/c/d"));
        assert!(!p.matches("/b/c"));

        let mid = PathPattern::compile("/a/**/z.json").unwrap();
        assert!(mid.matches("/a/z.json"));
        assert!(mid.matches("/a/x/y/z.json"));
        assert!(!mid.matches("/a/x/y/q.json"));
    }

    #[test]
    fn all_matches_everything() {
        let p = PathPattern::all();
        assert!(p.matches("/a"));
        assert!(p.matches("/a/b/c.json"));
    }

    #[test]
    fn alternatives_match_any() {
        let p = PathPattern::compile("/a.json, /b/**").unwrap();
        assert!(p.matches("/a.json"));
        assert!(p.matches("/b/c/d"));
        assert!(!p.matches("/c"));
    }

    #[test]
    fn trailing_slash_never_matches() {
        let p = PathPattern::compile("/a/*").unwrap();
        assert!(!p.matches("/a/"));
        let any = PathPattern::all();
        assert!(!any.matches("/a/b/"));
    }

    #[test]
    fn literal_metacharacters_are_escaped() {
        let p = PathPattern::compile("/a.b/c+d").unwrap();
        assert!(p.matches("/a.b/c+d"));
        assert!(!p.matches("/aXb/c+d"));
    }

    #[test]
    fn compilation_is_idempotent() {
        let p = PathPattern::compile(" /a/** , /b/*.json").unwrap();
        let recompiled = PathPattern::compile(p.as_str()).unwrap();
        assert_eq!(p, recompiled);
        assert_eq!(p.as_str(), "/a/**,/b/*.json");
    }

    #[test]
    fn value_equal_patterns_collide_as_map_keys() {
        let a = PathPattern::compile("/x/**").unwrap();
        let b = PathPattern::compile("/x/**").unwrap();
        let mut map = HashMap::new();
        map.insert(a, 1);
        assert_eq!(map.get(&b), Some(&1));
    }

    #[test]
    fn of_returns_shared_compilations() {
        let a = PathPattern::of("/cached/**").unwrap();
        let b = PathPattern::of("/cached/**").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
