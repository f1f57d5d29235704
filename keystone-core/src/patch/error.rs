//! Structured conflicts raised while applying a patch.

use crate::pointer::JsonPointer;
use serde_json::Value;
use thiserror::Error;

/// Why a patch failed to apply.
///
/// Every variant carries the pointer it failed at, so the API layer can
/// surface the location in a conflict response without parsing messages.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PatchConflict {
    /// An operation required a node that is missing.
    #[error("non-existent path: {pointer}")]
    NonExistentPath { pointer: JsonPointer },

    /// The parent of an insertion target is missing.
    #[error("non-existent parent: {pointer}")]
    NonExistentParent { pointer: JsonPointer },

    /// The parent of an insertion target is neither object nor array.
    #[error("parent is not a container: {pointer}")]
    ParentNotContainer { pointer: JsonPointer },

    /// An array step that is not a strict decimal index (or `-` where
    /// appending is allowed).
    #[error("invalid array index {token:?} at {pointer}")]
    InvalidArrayIndex { pointer: JsonPointer, token: String },

    /// An array index past the permitted range.
    #[error("array index {index} out of bounds (length {len}) at {pointer}")]
    IndexOutOfBounds {
        pointer: JsonPointer,
        index: usize,
        len: usize,
    },

    /// `remove`/`removeIfExists` aimed at the document root.
    #[error("cannot remove the document root")]
    RootRemoval { pointer: JsonPointer },

    /// `move` whose source is a proper prefix of its destination.
    #[error("cannot move {from} into its own child {pointer}")]
    MoveIntoSelf {
        from: JsonPointer,
        pointer: JsonPointer,
    },

    /// `test`, `testAbsence` or `safeReplace` found something other than
    /// what it asserted. `expected: None` encodes an absence assertion;
    /// `actual: None` means the node was missing.
    #[error("test failed at {pointer}")]
    TestFailed {
        pointer: JsonPointer,
        expected: Option<Value>,
        actual: Option<Value>,
    },
}

impl PatchConflict {
    /// The pointer the conflict occurred at.
    pub fn pointer(&self) -> &JsonPointer {
        match self {
            PatchConflict::NonExistentPath { pointer }
            | PatchConflict::NonExistentParent { pointer }
            | PatchConflict::ParentNotContainer { pointer }
            | PatchConflict::InvalidArrayIndex { pointer, .. }
            | PatchConflict::IndexOutOfBounds { pointer, .. }
            | PatchConflict::RootRemoval { pointer }
            | PatchConflict::MoveIntoSelf { pointer, .. }
            | PatchConflict::TestFailed { pointer, .. } => pointer,
        }
    }
}
