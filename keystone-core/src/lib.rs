//! # Keystone Core
//!
//! Core value types for the keystone configuration store:
//! - `Revision`: total order over commit numbers, with `HEAD`/relative sentinels
//! - `PathPattern`: glob-like path matching for watch registrations
//! - `JsonPointer`: RFC 6901 navigation into JSON documents
//! - `JsonPatch`: RFC 6902 mutations plus repository extensions
//!   (`removeIfExists`, `safeReplace`, `testAbsence`), applied atomically
//!
//! ## Design Principles
//!
//! 1. **Pure values**: nothing in this crate does I/O or holds locks
//! 2. **Structured failures**: every error carries a machine-readable kind
//!    and the offending pointer/pattern, so callers can map them to wire
//!    responses without parsing messages
//! 3. **Inputs are never mutated**: `JsonPatch::apply` works on a clone and
//!    either returns the new document or leaves the caller's value untouched

pub mod pattern;
pub mod patch;
pub mod pointer;
pub mod revision;

pub use pattern::{PathPattern, PatternError};
pub use patch::{JsonPatch, PatchConflict, PatchOperation};
pub use pointer::{JsonPointer, PointerError};
pub use revision::{Revision, RevisionError};
