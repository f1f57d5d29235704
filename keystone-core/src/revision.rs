//! Revision numbers for the commit log
//!
//! A revision is the 1-based ordinal of a commit. Negative majors are
//! *relative* revisions counted back from the head of the repository:
//! `-1` is the head itself, `-2` the commit before it, and so on. Relative
//! revisions (including the `HEAD` sentinel) must be resolved against a
//! concrete head before they are compared or stored.
//!
//! ## Comparison Semantics
//!
//! Ordering is plain integer ordering on the major. It is only meaningful
//! between absolute revisions; resolve relative ones first. A watcher whose
//! baseline equals the current head is *not* eligible for that head: it
//! waits for the next commit (`advances_past` is strict).

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors from revision construction and resolution.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RevisionError {
    /// Zero, or a resolution result that falls before the first commit.
    #[error("revision out of range: {0}")]
    OutOfRange(i64),

    /// Text that is neither an integer nor the `HEAD` keyword.
    #[error("cannot parse revision: {0:?}")]
    Parse(String),

    /// A relative revision was used where an absolute one is required.
    #[error("relative revision must be resolved first: {0}")]
    Unresolved(i64),
}

/// A commit number. See the module docs for relative-revision semantics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Revision(i64);

impl Revision {
    /// The latest known revision, resolved by the storage engine.
    pub const HEAD: Revision = Revision(-1);

    /// The first commit of a repository.
    pub const INIT: Revision = Revision(1);

    /// Creates a revision from a non-zero major.
    pub fn new(major: i64) -> Result<Revision, RevisionError> {
        if major == 0 {
            return Err(RevisionError::OutOfRange(0));
        }
        Ok(Revision(major))
    }

    /// Returns the raw major number.
    pub fn major(&self) -> i64 {
        self.0
    }

    /// True for `HEAD` and any other head-relative revision.
    pub fn is_relative(&self) -> bool {
        self.0 < 0
    }

    /// True for the `HEAD` sentinel specifically.
    pub fn is_head(&self) -> bool {
        self.0 == -1
    }

    /// Steps `count` commits further into the past.
    ///
    /// `HEAD.backward(1)` is the commit before the head.
    pub fn backward(self, count: u32) -> Result<Revision, RevisionError> {
        Revision::new(self.0 - i64::from(count))
    }

    /// Steps `count` commits toward the head.
    pub fn forward(self, count: u32) -> Result<Revision, RevisionError> {
        Revision::new(self.0 + i64::from(count))
    }

    /// Maps a relative revision to the absolute one it denotes under `head`.
    ///
    /// Absolute revisions resolve to themselves. `head` itself must be
    /// absolute. Resolving past the first commit (e.g. `-5` against head
    /// `3`) is out of range.
    pub fn resolve(self, head: Revision) -> Result<Revision, RevisionError> {
        if head.is_relative() {
            return Err(RevisionError::Unresolved(head.0));
        }
        if !self.is_relative() {
            return Ok(self);
        }
        let major = head.0 + self.0 + 1;
        if major < 1 {
            return Err(RevisionError::OutOfRange(major));
        }
        Ok(Revision(major))
    }

    /// True if this revision is strictly newer than `baseline`.
    ///
    /// Equality is not enough: a watcher subscribed at the current head
    /// waits for the next commit.
    pub fn advances_past(self, baseline: Revision) -> bool {
        self.0 > baseline.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Revision {
    type Err = RevisionError;

    fn from_str(s: &str) -> Result<Revision, RevisionError> {
        if s.eq_ignore_ascii_case("head") {
            return Ok(Revision::HEAD);
        }
        let major: i64 = s
            .parse()
            .map_err(|_| RevisionError::Parse(s.to_string()))?;
        Revision::new(major).map_err(|_| RevisionError::Parse(s.to_string()))
    }
}

impl Serialize for Revision {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.0)
    }
}

struct RevisionVisitor;

impl Visitor<'_> for RevisionVisitor {
    type Value = Revision;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-zero integer or the string \"HEAD\"")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Revision, E> {
        Revision::new(v).map_err(de::Error::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Revision, E> {
        let major = i64::try_from(v).map_err(de::Error::custom)?;
        Revision::new(major).map_err(de::Error::custom)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Revision, E> {
        v.parse().map_err(de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for Revision {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Revision, D::Error> {
        deserializer.deserialize_any(RevisionVisitor)
    }
}
