//! Application of individual operations against a working document.

use crate::pointer::{array_index, JsonPointer};
use serde_json::Value;

use super::error::PatchConflict;
use super::op::PatchOperation;

/// Applies one operation in place. On error the working document may be
/// partially mutated; [`JsonPatch::apply`](super::JsonPatch::apply) works
/// on a clone, so the caller's input is still untouched.
pub(super) fn apply_in_place(doc: &mut Value, op: &PatchOperation) -> Result<(), PatchConflict> {
    match op {
        PatchOperation::Add { path, value } => add(doc, path, value.clone()),
        PatchOperation::Copy { from, path } => copy(doc, from, path),
        PatchOperation::Move { from, path } => move_value(doc, from, path),
        PatchOperation::Remove { path } => remove(doc, path).map(|_| ()),
        PatchOperation::RemoveIfExists { path } => remove_if_exists(doc, path),
        PatchOperation::Replace { path, value } => replace(doc, path, value.clone()),
        PatchOperation::SafeReplace {
            path,
            old_value,
            new_value,
        } => safe_replace(doc, path, old_value, new_value.clone()),
        PatchOperation::Test { path, value } => test(doc, path, value),
        PatchOperation::TestAbsence { path } => test_absence(doc, path),
    }
}

/// Mutable counterpart of [`JsonPointer::resolve`].
fn resolve_mut<'a>(doc: &'a mut Value, pointer: &JsonPointer) -> Option<&'a mut Value> {
    let mut node = doc;
    for token in pointer.tokens() {
        node = match node {
            Value::Object(map) => map.get_mut(token)?,
            Value::Array(items) => items.get_mut(array_index(token)?)?,
            _ => return None,
        };
    }
    Some(node)
}

fn add(doc: &mut Value, path: &JsonPointer, value: Value) -> Result<(), PatchConflict> {
    insert(doc, path, value)
}

/// Places `value` at `path`. The parent must exist and be a container;
/// object keys are set or overwritten, array indices insert (shifting) and
/// `-` appends. The root path replaces the whole document.
fn insert(doc: &mut Value, path: &JsonPointer, value: Value) -> Result<(), PatchConflict> {
    let token = match path.last() {
        Some(token) => token.to_string(),
        None => {
            *doc = value;
            return Ok(());
        }
    };
    let parent_ptr = path.parent();
    let parent = resolve_mut(doc, &parent_ptr).ok_or_else(|| PatchConflict::NonExistentParent {
        pointer: parent_ptr.clone(),
    })?;
    match parent {
        Value::Object(map) => {
            map.insert(token, value);
            Ok(())
        }
        Value::Array(items) => {
            if token == "-" {
                items.push(value);
                return Ok(());
            }
            let index =
                array_index(&token).ok_or_else(|| PatchConflict::InvalidArrayIndex {
                    pointer: path.clone(),
                    token: token.clone(),
                })?;
            if index > items.len() {
                return Err(PatchConflict::IndexOutOfBounds {
                    pointer: path.clone(),
                    index,
                    len: items.len(),
                });
            }
            items.insert(index, value);
            Ok(())
        }
        _ => Err(PatchConflict::ParentNotContainer {
            pointer: parent_ptr,
        }),
    }
}

/// Detaches and returns the node at `path`.
fn remove(doc: &mut Value, path: &JsonPointer) -> Result<Value, PatchConflict> {
    let token = match path.last() {
        Some(token) => token.to_string(),
        None => {
            return Err(PatchConflict::RootRemoval {
                pointer: JsonPointer::root(),
            })
        }
    };
    let missing = || PatchConflict::NonExistentPath {
        pointer: path.clone(),
    };
    let parent_ptr = path.parent();
    let parent = resolve_mut(doc, &parent_ptr).ok_or_else(missing)?;
    match parent {
        Value::Object(map) => map.remove(&token).ok_or_else(missing),
        Value::Array(items) => {
            let index = array_index(&token).ok_or_else(missing)?;
            if index >= items.len() {
                return Err(missing());
            }
            Ok(items.remove(index))
        }
        _ => Err(missing()),
    }
}

fn remove_if_exists(doc: &mut Value, path: &JsonPointer) -> Result<(), PatchConflict> {
    if path.is_root() {
        return Err(PatchConflict::RootRemoval {
            pointer: JsonPointer::root(),
        });
    }
    if path.resolve(doc).is_none() {
        return Ok(());
    }
    remove(doc, path).map(|_| ())
}

fn replace(doc: &mut Value, path: &JsonPointer, value: Value) -> Result<(), PatchConflict> {
    let target = resolve_mut(doc, path).ok_or_else(|| PatchConflict::NonExistentPath {
        pointer: path.clone(),
    })?;
    *target = value;
    Ok(())
}

fn safe_replace(
    doc: &mut Value,
    path: &JsonPointer,
    old_value: &Value,
    new_value: Value,
) -> Result<(), PatchConflict> {
    let target = resolve_mut(doc, path).ok_or_else(|| PatchConflict::TestFailed {
        pointer: path.clone(),
        expected: Some(old_value.clone()),
        actual: None,
    })?;
    if !deep_equal(target, old_value) {
        return Err(PatchConflict::TestFailed {
            pointer: path.clone(),
            expected: Some(old_value.clone()),
            actual: Some(target.clone()),
        });
    }
    *target = new_value;
    Ok(())
}

fn test(doc: &Value, path: &JsonPointer, value: &Value) -> Result<(), PatchConflict> {
    match path.resolve(doc) {
        Some(actual) if deep_equal(actual, value) => Ok(()),
        actual => Err(PatchConflict::TestFailed {
            pointer: path.clone(),
            expected: Some(value.clone()),
            actual: actual.cloned(),
        }),
    }
}

fn test_absence(doc: &Value, path: &JsonPointer) -> Result<(), PatchConflict> {
    match path.resolve(doc) {
        None => Ok(()),
        Some(actual) => Err(PatchConflict::TestFailed {
            pointer: path.clone(),
            expected: None,
            actual: Some(actual.clone()),
        }),
    }
}

fn copy(doc: &mut Value, from: &JsonPointer, to: &JsonPointer) -> Result<(), PatchConflict> {
    let value = from
        .resolve(doc)
        .ok_or_else(|| PatchConflict::NonExistentPath {
            pointer: from.clone(),
        })?
        .clone();
    insert(doc, to, value)
}

/// `remove(from)` then `add(to, value)`. Expressing the move this way makes
/// a same-array destination index count against the array state after the
/// removal, and `-` append to the array as it exists at insertion time.
fn move_value(doc: &mut Value, from: &JsonPointer, to: &JsonPointer) -> Result<(), PatchConflict> {
    if from == to {
        return Ok(());
    }
    if to.starts_with(from) {
        return Err(PatchConflict::MoveIntoSelf {
            from: from.clone(),
            pointer: to.clone(),
        });
    }
    let value = remove(doc, from)?;
    insert(doc, to, value)
}

/// Structural JSON equality with numbers compared by numeric value, so
/// `1` equals `1.0`.
fn deep_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => number_eq(x, y),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| deep_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| deep_equal(x, y)))
        }
        _ => a == b,
    }
}

fn number_eq(x: &serde_json::Number, y: &serde_json::Number) -> bool {
    if let (Some(a), Some(b)) = (x.as_i64(), y.as_i64()) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (x.as_u64(), y.as_u64()) {
        return a == b;
    }
    match (x.as_f64(), y.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
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

    fn apply(doc: &Value, patch: Value) -> Result<Value, PatchConflict> {
        JsonPatch::from_json(patch).unwrap().apply(doc)
    }

    #[test]
    fn add_to_object_sets_or_overwrites() {
        let doc = json!({"a": 1});
        assert_eq!(
            apply(&doc, json!([{"op": "add", "path": "/b", "value": 2}])).unwrap(),
            json!({"a": 1, "b": 2})
        );
        assert_eq!(
            apply(&doc, json!([{"op": "add", "path": "/a", "value": 9}])).unwrap(),
            json!({"a": 9})
        );
    }

    #[test]
    fn add_to_array_inserts_and_appends() {
        let doc = json!({"a": [1, 2, 3]});
        assert_eq!(
            apply(&doc, json!([{"op": "add", "path": "/a/1", "value": 9}])).unwrap(),
            json!({"a": [1, 9, 2, 3]})
        );
        assert_eq!(
            apply(&doc, json!([{"op": "add", "path": "/a/3", "value": 9}])).unwrap(),
            json!({"a": [1, 2, 3, 9]})
        );
        // Scenario: append with `-`.
        assert_eq!(
            apply(&doc, json!([{"op": "add", "path": "/a/-", "value": 4}])).unwrap(),
            json!({"a": [1, 2, 3, 4]})
        );
    }

    #[test]
    fn add_rejects_bad_targets() {
        let doc = json!({"a": [1], "s": "x"});
        assert!(matches!(
            apply(&doc, json!([{"op": "add", "path": "/a/4", "value": 0}])),
            Err(PatchConflict::IndexOutOfBounds { index: 4, len: 1, .. })
        ));
        assert!(matches!(
            apply(&doc, json!([{"op": "add", "path": "/a/01", "value": 0}])),
            Err(PatchConflict::InvalidArrayIndex { .. })
        ));
        assert!(matches!(
            apply(&doc, json!([{"op": "add", "path": "/missing/x", "value": 0}])),
            Err(PatchConflict::NonExistentParent { .. })
        ));
        assert!(matches!(
            apply(&doc, json!([{"op": "add", "path": "/s/x", "value": 0}])),
            Err(PatchConflict::ParentNotContainer { .. })
        ));
    }

    #[test]
    fn add_at_root_replaces_the_document() {
        let doc = json!({"a": 1});
        assert_eq!(
            apply(&doc, json!([{"op": "add", "path": "", "value": [1]}])).unwrap(),
            json!([1])
        );
    }

    #[test]
    fn remove_object_key_and_array_element() {
        let doc = json!({"a": {"b": 1}, "c": [1, 2, 3]});
        assert_eq!(
            apply(&doc, json!([{"op": "remove", "path": "/a/b"}])).unwrap(),
            json!({"a": {}, "c": [1, 2, 3]})
        );
        assert_eq!(
            apply(&doc, json!([{"op": "remove", "path": "/c/1"}])).unwrap(),
            json!({"a": {"b": 1}, "c": [1, 3]})
        );
        assert!(matches!(
            apply(&doc, json!([{"op": "remove", "path": "/c/3"}])),
            Err(PatchConflict::NonExistentPath { .. })
        ));
        assert!(matches!(
            apply(&doc, json!([{"op": "remove", "path": ""}])),
            Err(PatchConflict::RootRemoval { .. })
        ));
    }

    #[test]
    fn remove_if_exists_tolerates_missing() {
        let doc = json!({"a": 1});
        assert_eq!(
            apply(&doc, json!([{"op": "removeIfExists", "path": "/zzz"}])).unwrap(),
            doc
        );
        assert_eq!(
            apply(&doc, json!([{"op": "removeIfExists", "path": "/a"}])).unwrap(),
            json!({})
        );
    }

    #[test]
    fn replace_requires_existing_target() {
        let doc = json!({"a": 1});
        assert_eq!(
            apply(&doc, json!([{"op": "replace", "path": "/a", "value": 2}])).unwrap(),
            json!({"a": 2})
        );
        assert!(matches!(
            apply(&doc, json!([{"op": "replace", "path": "/b", "value": 2}])),
            Err(PatchConflict::NonExistentPath { .. })
        ));
    }

    #[test]
    fn safe_replace_is_compare_and_swap() {
        let doc = json!({"a": 1});
        assert_eq!(
            apply(
                &doc,
                json!([{"op": "safeReplace", "path": "/a", "oldValue": 1, "newValue": 2}])
            )
            .unwrap(),
            json!({"a": 2})
        );
        let err = apply(
            &doc,
            json!([{"op": "safeReplace", "path": "/a", "oldValue": 7, "newValue": 2}]),
        )
        .unwrap_err();
        match err {
            PatchConflict::TestFailed {
                expected, actual, ..
            } => {
                assert_eq!(expected, Some(json!(7)));
                assert_eq!(actual, Some(json!(1)));
            }
            other => panic!("unexpected conflict: {other:?}"),
        }
    }

    // Scenario: a passing test gates the rest of the patch.
    #[test]
    fn test_then_replace() {
        let doc = json!({"a": 1});
        let result = apply(
            &doc,
            json!([
                {"op": "test", "path": "/a", "value": 1},
                {"op": "replace", "path": "/a", "value": 2},
            ]),
        );
        assert_eq!(result.unwrap(), json!({"a": 2}));
    }

    // Scenario: a failing test aborts the patch and the input is unchanged.
    #[test]
    fn failing_test_leaves_input_untouched() {
        let doc = json!({"a": 1});
        let result = apply(
            &doc,
            json!([
                {"op": "test", "path": "/a", "value": 9},
                {"op": "replace", "path": "/a", "value": 2},
            ]),
        );
        assert!(matches!(
            result,
            Err(PatchConflict::TestFailed { .. })
        ));
        assert_eq!(doc, json!({"a": 1}));
    }

    #[test]
    fn atomicity_discards_earlier_effects() {
        let doc = json!({"a": 1});
        let result = apply(
            &doc,
            json!([
                {"op": "add", "path": "/b", "value": 2},
                {"op": "remove", "path": "/zzz"},
            ]),
        );
        assert!(result.is_err());
        assert_eq!(doc, json!({"a": 1}));
    }

    #[test]
    fn test_absence() {
        let doc = json!({"a": 1});
        assert!(apply(&doc, json!([{"op": "testAbsence", "path": "/b"}])).is_ok());
        let err = apply(&doc, json!([{"op": "testAbsence", "path": "/a"}])).unwrap_err();
        match err {
            PatchConflict::TestFailed {
                expected, actual, ..
            } => {
                assert_eq!(expected, None);
                assert_eq!(actual, Some(json!(1)));
            }
            other => panic!("unexpected conflict: {other:?}"),
        }
    }

    #[test]
    fn copy_deep_clones() {
        let doc = json!({"a": {"x": 1}, "b": {}});
        assert_eq!(
            apply(&doc, json!([{"op": "copy", "from": "/a", "path": "/b/a"}])).unwrap(),
            json!({"a": {"x": 1}, "b": {"a": {"x": 1}}})
        );
        assert!(matches!(
            apply(&doc, json!([{"op": "copy", "from": "/zzz", "path": "/b/a"}])),
            Err(PatchConflict::NonExistentPath { .. })
        ));
    }

    // Scenario: same-array move counts the destination index against the
    // array state after removal.
    #[test]
    fn move_within_one_array() {
        let doc = json!({"a": [1, 2, 3]});
        assert_eq!(
            apply(&doc, json!([{"op": "move", "from": "/a/0", "path": "/a/2"}])).unwrap(),
            json!({"a": [2, 3, 1]})
        );
        assert_eq!(
            apply(&doc, json!([{"op": "move", "from": "/a/2", "path": "/a/0"}])).unwrap(),
            json!({"a": [3, 1, 2]})
        );
        assert_eq!(
            apply(&doc, json!([{"op": "move", "from": "/a/0", "path": "/a/-"}])).unwrap(),
            json!({"a": [2, 3, 1]})
        );
    }

    #[test]
    fn move_across_containers() {
        let doc = json!({"a": {"x": 1}, "b": {}});
        assert_eq!(
            apply(&doc, json!([{"op": "move", "from": "/a/x", "path": "/b/y"}])).unwrap(),
            json!({"a": {}, "b": {"y": 1}})
        );
    }

    #[test]
    fn move_into_own_child_is_rejected() {
        let doc = json!({"a": {"b": {}}});
        assert!(matches!(
            apply(&doc, json!([{"op": "move", "from": "/a", "path": "/a/b/c"}])),
            Err(PatchConflict::MoveIntoSelf { .. })
        ));
        // Moving onto itself is a no-op, not a conflict.
        assert_eq!(
            apply(&doc, json!([{"op": "move", "from": "/a", "path": "/a"}])).unwrap(),
            doc
        );
    }

    #[test]
    fn deep_equality_compares_numbers_numerically() {
        let doc = json!({"n": 1});
        assert!(apply(&doc, json!([{"op": "test", "path": "/n", "value": 1.0}])).is_ok());
        let doc = json!({"n": [1, 2.5]});
        assert!(apply(&doc, json!([{"op": "test", "path": "/n", "value": [1.0, 2.5]}])).is_ok());
        assert!(apply(&doc, json!([{"op": "test", "path": "/n", "value": [1, 2]}])).is_err());
    }

    #[test]
    fn deep_equality_is_structural_for_objects() {
        let doc = json!({"o": {"a": 1, "b": 2}});
        assert!(apply(
            &doc,
            json!([{"op": "test", "path": "/o", "value": {"b": 2, "a": 1}}])
        )
        .is_ok());
        assert!(apply(
            &doc,
            json!([{"op": "test", "path": "/o", "value": {"a": 1}}])
        )
        .is_err());
    }

    #[test]
    fn conflicts_carry_the_offending_pointer() {
        let doc = json!({});
        let err = apply(&doc, json!([{"op": "remove", "path": "/a/b"}])).unwrap_err();
        assert_eq!(err.pointer().to_string(), "/a/b");
    }
}
