//! RFC 6901 JSON Pointers
//!
//! An owned token list with the standard escaping (`~0` for `~`, `~1` for
//! `/`). The empty pointer addresses the document root. Resolution returns
//! `None` as the missing-node sentinel rather than failing, so callers can
//! distinguish "absent" from "malformed" without exceptions.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A pointer string that failed to parse.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid JSON pointer {input:?}: {reason}")]
pub struct PointerError {
    /// The offending input, as given.
    pub input: String,
    /// What was wrong with it.
    pub reason: &'static str,
}

/// An RFC 6901 JSON Pointer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct JsonPointer {
    tokens: Vec<String>,
}

impl JsonPointer {
    /// The empty pointer, addressing the document root.
    pub fn root() -> JsonPointer {
        JsonPointer { tokens: Vec::new() }
    }

    /// Parses the escaped string form.
    ///
    /// The empty string is the root; any other form must start with `/`,
    /// and `~` must be followed by `0` or `1`.
    pub fn parse(input: &str) -> Result<JsonPointer, PointerError> {
        if input.is_empty() {
            return Ok(JsonPointer::root());
        }
        if !input.starts_with('/') {
            return Err(PointerError {
                input: input.to_string(),
                reason: "pointer must be empty or start with '/'",
            });
        }
        let mut tokens = Vec::new();
        for raw in input[1..].split('/') {
            tokens.push(unescape(raw, input)?);
        }
        Ok(JsonPointer { tokens })
    }

    /// Builds a pointer from pre-decoded tokens.
    pub fn from_tokens<I, T>(tokens: I) -> JsonPointer
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        JsonPointer {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }

    /// True for the empty pointer.
    pub fn is_root(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Number of tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// True when there are no tokens (same as [`JsonPointer::is_root`]).
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// The decoded tokens.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// The last token, or `None` for the root.
    pub fn last(&self) -> Option<&str> {
        self.tokens.last().map(String::as_str)
    }

    /// The pointer with the last token dropped. The root's parent is the
    /// root itself.
    pub fn parent(&self) -> JsonPointer {
        match self.tokens.split_last() {
            Some((_, parent)) => JsonPointer {
                tokens: parent.to_vec(),
            },
            None => JsonPointer::root(),
        }
    }

    /// Extends the pointer with one more (pre-decoded) token.
    pub fn child(&self, token: impl Into<String>) -> JsonPointer {
        let mut tokens = self.tokens.clone();
        tokens.push(token.into());
        JsonPointer { tokens }
    }

    /// True when `prefix`'s tokens lead this pointer's tokens.
    pub fn starts_with(&self, prefix: &JsonPointer) -> bool {
        self.tokens.len() >= prefix.tokens.len()
            && self.tokens[..prefix.tokens.len()] == prefix.tokens[..]
    }

    /// Walks the document, returning the addressed node or `None` when any
    /// step is missing. Array steps follow the strict index syntax of
    /// [`array_index`]; `-` never resolves (it names the append position,
    /// which holds no value).
    pub fn resolve<'a>(&self, doc: &'a Value) -> Option<&'a Value> {
        let mut node = doc;
        for token in &self.tokens {
            node = match node {
                Value::Object(map) => map.get(token)?,
                Value::Array(items) => items.get(array_index(token)?)?,
                _ => return None,
            };
        }
        Some(node)
    }
}

/// Parses an array-index token: decimal, unsigned, and without leading
/// zeros (`0` itself is fine). Returns `None` for anything else, including
/// the append token `-`.
pub fn array_index(token: &str) -> Option<usize> {
    if token == "0" {
        return Some(0);
    }
    if token.is_empty() || token.starts_with('0') {
        return None;
    }
    if !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

fn unescape(raw: &str, input: &str) -> Result<String, PointerError> {
    if !raw.contains('~') {
        return Ok(raw.to_string());
    }
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '~' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('~'),
            Some('1') => out.push('/'),
            _ => {
                return Err(PointerError {
                    input: input.to_string(),
                    reason: "'~' must be followed by '0' or '1'",
                })
            }
        }
    }
    Ok(out)
}

impl fmt::Display for JsonPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in &self.tokens {
            f.write_str("/")?;
            for c in token.chars() {
                match c {
                    '~' => f.write_str("~0")?,
                    '/' => f.write_str("~1")?,
                    _ => write!(f, "{c}")?,
                }
            }
        }
        Ok(())
    }
}

impl FromStr for JsonPointer {
    type Err = PointerError;

    fn from_str(s: &str) -> Result<JsonPointer, PointerError> {
        JsonPointer::parse(s)
    }
}

impl Serialize for JsonPointer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

struct PointerVisitor;

impl Visitor<'_> for PointerVisitor {
    type Value = JsonPointer;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON pointer string")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<JsonPointer, E> {
        JsonPointer::parse(v).map_err(de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for JsonPointer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<JsonPointer, D::Error> {
        deserializer.deserialize_str(PointerVisitor)
    }
}
