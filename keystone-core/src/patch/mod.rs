//! JSON Patch: RFC 6902 plus repository extensions
//!
//! The wire format is the RFC 6902 array-of-operations form, extended with
//! three operations used by structured repository mutations:
//!
//! - `removeIfExists`: `remove` that tolerates a missing target
//! - `safeReplace`: compare-and-swap on a single node
//! - `testAbsence`: asserts a node is missing
//!
//! ```json
//! [
//!   { "op": "test", "path": "/a", "value": 1 },
//!   { "op": "replace", "path": "/a", "value": 2 }
//! ]
//! ```
//!
//! Unknown properties on an operation object are ignored; unknown `op`
//! discriminators are rejected at parse time.
//!
//! ## Atomicity
//!
//! A patch applies in input order against a working copy of the document.
//! Any failing operation aborts the whole patch with a [`PatchConflict`]
//! and the caller's input is left untouched.

mod apply;
mod error;
mod op;

pub use error::PatchConflict;
pub use op::PatchOperation;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An ordered sequence of patch operations, applied atomically.
///
/// Serializes as a JSON array of operation objects. Equality is sequence
/// equality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct JsonPatch {
    ops: Vec<PatchOperation>,
}

impl JsonPatch {
    /// Wraps a list of operations.
    pub fn new(ops: Vec<PatchOperation>) -> JsonPatch {
        JsonPatch { ops }
    }

    /// Parses the wire form (a JSON array of operation objects).
    pub fn from_json(value: Value) -> Result<JsonPatch, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Renders the wire form.
    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// The operations, in application order.
    pub fn ops(&self) -> &[PatchOperation] {
        &self.ops
    }

    /// True when the patch contains no operations.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Applies the patch, returning the patched document.
    ///
    /// The input is cloned up front; on conflict the clone is discarded, so
    /// `doc` is observationally unchanged either way.
    pub fn apply(&self, doc: &Value) -> Result<Value, PatchConflict> {
        let mut working = doc.clone();
        for op in &self.ops {
            apply::apply_in_place(&mut working, op)?;
        }
        Ok(working)
    }
}

impl From<Vec<PatchOperation>> for JsonPatch {
    fn from(ops: Vec<PatchOperation>) -> JsonPatch {
        JsonPatch { ops }
    }
}

impl FromIterator<PatchOperation> for JsonPatch {
    fn from_iter<I: IntoIterator<Item = PatchOperation>>(iter: I) -> JsonPatch {
        JsonPatch {
            ops: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for JsonPatch {
    type Item = PatchOperation;
    type IntoIter = std::vec::IntoIter<PatchOperation>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}
