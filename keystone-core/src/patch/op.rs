//! Patch operation types and constructors.

use crate::pointer::JsonPointer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One JSON Patch operation.
///
/// The serde representation is the RFC 6902 wire form: an object tagged by
/// `op`, e.g. `{"op": "add", "path": "/a", "value": 1}`. `copy` and `move`
/// carry `from`; `safeReplace` carries `oldValue` and `newValue`.
///
/// Operations are pure descriptions and hold no state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum PatchOperation {
    /// Sets a child of an existing container, or replaces the whole
    /// document when `path` is the root.
    Add { path: JsonPointer, value: Value },

    /// Deep-copies the node at `from` to `path`.
    Copy { from: JsonPointer, path: JsonPointer },

    /// Removes the node at `from` and re-inserts it at `path`.
    Move { from: JsonPointer, path: JsonPointer },

    /// Removes an existing node. The root cannot be removed.
    Remove { path: JsonPointer },

    /// As `Remove`, but a missing target is a no-op.
    RemoveIfExists { path: JsonPointer },

    /// Replaces the value of an existing node in place.
    Replace { path: JsonPointer, value: Value },

    /// Compare-and-swap: replaces only when the current value deep-equals
    /// `old_value`.
    SafeReplace {
        path: JsonPointer,
        #[serde(rename = "oldValue")]
        old_value: Value,
        #[serde(rename = "newValue")]
        new_value: Value,
    },

    /// Asserts the node exists and deep-equals `value`.
    Test { path: JsonPointer, value: Value },

    /// Asserts the node is missing.
    TestAbsence { path: JsonPointer },
}

impl PatchOperation {
    /// Creates an `add` operation.
    pub fn add(path: JsonPointer, value: Value) -> PatchOperation {
        PatchOperation::Add { path, value }
    }

    /// Creates a `copy` operation.
    pub fn copy(from: JsonPointer, to: JsonPointer) -> PatchOperation {
        PatchOperation::Copy { from, path: to }
    }

    /// Creates a `move` operation.
    pub fn move_(from: JsonPointer, to: JsonPointer) -> PatchOperation {
        PatchOperation::Move { from, path: to }
    }

    /// Creates a `remove` operation.
    pub fn remove(path: JsonPointer) -> PatchOperation {
        PatchOperation::Remove { path }
    }

    /// Creates a `removeIfExists` operation.
    pub fn remove_if_exists(path: JsonPointer) -> PatchOperation {
        PatchOperation::RemoveIfExists { path }
    }

    /// Creates a `replace` operation.
    pub fn replace(path: JsonPointer, value: Value) -> PatchOperation {
        PatchOperation::Replace { path, value }
    }

    /// Creates a `safeReplace` operation.
    pub fn safe_replace(path: JsonPointer, old_value: Value, new_value: Value) -> PatchOperation {
        PatchOperation::SafeReplace {
            path,
            old_value,
            new_value,
        }
    }

    /// Creates a `test` operation.
    pub fn test(path: JsonPointer, value: Value) -> PatchOperation {
        PatchOperation::Test { path, value }
    }

    /// Creates a `testAbsence` operation.
    pub fn test_absence(path: JsonPointer) -> PatchOperation {
        PatchOperation::TestAbsence { path }
    }

    /// The wire discriminator of this operation.
    pub fn op_name(&self) -> &'static str {
        match self {
            PatchOperation::Add { .. } => "add",
            PatchOperation::Copy { .. } => "copy",
            PatchOperation::Move { .. } => "move",
            PatchOperation::Remove { .. } => "remove",
            PatchOperation::RemoveIfExists { .. } => "removeIfExists",
            PatchOperation::Replace { .. } => "replace",
            PatchOperation::SafeReplace { .. } => "safeReplace",
            PatchOperation::Test { .. } => "test",
            PatchOperation::TestAbsence { .. } => "testAbsence",
        }
    }

    /// The operation's target pointer.
    pub fn path(&self) -> &JsonPointer {
        match self {
            PatchOperation::Add { path, .. }
            | PatchOperation::Copy { path, .. }
            | PatchOperation::Move { path, .. }
            | PatchOperation::Remove { path }
            | PatchOperation::RemoveIfExists { path }
            | PatchOperation::Replace { path, .. }
            | PatchOperation::SafeReplace { path, .. }
            | PatchOperation::Test { path, .. }
            | PatchOperation::TestAbsence { path } => path,
        }
    }

    /// The source pointer of `copy` and `move`, `None` otherwise.
    pub fn from_path(&self) -> Option<&JsonPointer> {
        match self {
            PatchOperation::Copy { from, .. } | PatchOperation::Move { from, .. } => Some(from),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::JsonPatch;
    use serde_json::json;

    fn ptr(s: &str) -> JsonPointer {
        JsonPointer::parse(s).unwrap()
    }

    #[test]
    fn serializes_in_wire_form() {
        let patch = JsonPatch::new(vec![
            PatchOperation::add(ptr("/a/-"), json!(1)),
            PatchOperation::move_(ptr("/a/0"), ptr("/b")),
            PatchOperation::safe_replace(ptr("/c"), json!("old"), json!("new")),
        ]);
        assert_eq!(
            patch.to_json().unwrap(),
            json!([
                {"op": "add", "path": "/a/-", "value": 1},
                {"op": "move", "from": "/a/0", "path": "/b"},
                {"op": "safeReplace", "path": "/c", "oldValue": "old", "newValue": "new"},
            ])
        );
    }

    #[test]
    fn round_trips_every_operation() {
        let patch = JsonPatch::new(vec![
            PatchOperation::add(ptr("/a"), json!({"x": [1, 2]})),
            PatchOperation::copy(ptr("/a"), ptr("/b")),
            PatchOperation::move_(ptr("/b"), ptr("/c")),
            PatchOperation::remove(ptr("/c")),
            PatchOperation::remove_if_exists(ptr("/gone")),
            PatchOperation::replace(ptr("/a"), json!(null)),
            PatchOperation::safe_replace(ptr("/a"), json!(null), json!(true)),
            PatchOperation::test(ptr("/a"), json!(true)),
            PatchOperation::test_absence(ptr("/z")),
        ]);
        let parsed = JsonPatch::from_json(patch.to_json().unwrap()).unwrap();
        assert_eq!(parsed, patch);
    }

    #[test]
    fn rejects_unknown_op() {
        let result = JsonPatch::from_json(json!([
            {"op": "merge", "path": "/a", "value": 1},
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn ignores_unknown_properties() {
        let patch = JsonPatch::from_json(json!([
            {"op": "remove", "path": "/a", "comment": "cleanup"},
        ]))
        .unwrap();
        assert_eq!(patch.ops(), [PatchOperation::remove(ptr("/a"))]);
    }

    #[test]
    fn op_names_match_the_wire() {
        let op = PatchOperation::remove_if_exists(ptr("/a"));
        assert_eq!(op.op_name(), "removeIfExists");
        assert_eq!(op.path(), &ptr("/a"));
        let op = PatchOperation::copy(ptr("/x"), ptr("/y"));
        assert_eq!(op.from_path(), Some(&ptr("/x")));
        assert_eq!(op.path(), &ptr("/y"));
    }
}
