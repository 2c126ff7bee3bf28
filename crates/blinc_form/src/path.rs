//! Nested path addressing
//!
//! Paths are plain strings: mapping keys are separated by `.`, sequence
//! indices are numeric segments (`friends.0.name`). The bracket form
//! `friends[0].name` parses to the same segments.
//!
//! Writes are copy-on-write: [`set_in`] shallow-copies every ancestor along
//! the path and shares every sibling subtree with the input tree, which is
//! never modified.
//!
//! # Example
//!
//! ```rust
//! use blinc_form::path::{get_in, set_in, UndefinedPolicy};
//! use blinc_form::FormValue;
//! use serde_json::json;
//!
//! let before = FormValue::from(json!({ "friends": [{ "name": "A" }, { "name": "B" }] }));
//! let after = set_in(&before, "friends.1.name", "Ian".into(), UndefinedPolicy::Remove);
//!
//! assert_eq!(get_in(&after, "friends[1].name"), Some(&FormValue::from("Ian")));
//! assert!(get_in(&before, "friends.0").unwrap().ptr_eq(get_in(&after, "friends.0").unwrap()));
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::value::{FormMap, FormValue};

static UNDEFINED: FormValue = FormValue::Undefined;

/// Longest a sequence may grow by padding. Larger indices address a mapping.
pub const MAX_SPARSE_LEN: usize = 1 << 16;

/// Parsed path segments
pub type Segments<'a> = SmallVec<[&'a str; 8]>;

/// What writing `Undefined` at a path does
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndefinedPolicy {
    /// Remove the mapping key (sequence slots become holes)
    #[default]
    Remove,
    /// Store an explicit `Undefined` entry
    Preserve,
}

/// Split a path into its segments.
///
/// Empty segments are skipped and quotes inside brackets are stripped, so
/// `a..b`, `a[b]` and `a['b']` all address `a` → `b`.
pub fn segments(path: &str) -> Segments<'_> {
    path.split(['.', '[', ']'])
        .map(|segment| segment.trim_matches(|c| c == '\'' || c == '"'))
        .filter(|segment| !segment.is_empty())
        .collect()
}

/// Parse a segment as a sequence index.
///
/// Only canonical non-negative integers qualify: `"3"` does, `"03"`, `"-1"`
/// and `"3.0"` do not.
pub fn as_index(segment: &str) -> Option<usize> {
    let canonical = !segment.is_empty()
        && segment.bytes().all(|b| b.is_ascii_digit())
        && (segment.len() == 1 || !segment.starts_with('0'));
    if canonical {
        segment.parse().ok()
    } else {
        None
    }
}

/// Append a segment to a base path
pub fn join(base: &str, segment: impl std::fmt::Display) -> String {
    if base.is_empty() {
        segment.to_string()
    } else {
        format!("{}.{}", base, segment)
    }
}

/// Read the node at `path`.
///
/// Returns `None` when any segment is missing or the node is `Undefined`.
/// An empty path addresses the root.
pub fn get_in<'a>(tree: &'a FormValue, path: &str) -> Option<&'a FormValue> {
    let mut node = tree;
    for segment in segments(path) {
        node = node.get(segment)?;
    }
    if node.is_undefined() {
        None
    } else {
        Some(node)
    }
}

/// Read the node at `path`, falling back to `default`
pub fn get_in_or<'a>(tree: &'a FormValue, path: &str, default: &'a FormValue) -> &'a FormValue {
    get_in(tree, path).unwrap_or(default)
}

/// Return a new tree with the node at `path` replaced by `value`.
///
/// Missing intermediate containers are created: a sequence when the next
/// segment is an index below [`MAX_SPARSE_LEN`], a mapping otherwise.
/// Writing past the end of a sequence pads it with `Undefined`. A sequence
/// written with a key it cannot hold (a non-index key, or an index at or
/// beyond [`MAX_SPARSE_LEN`]) becomes a mapping keyed by the item indices,
/// so the written node is always readable at `path` afterwards. If the
/// existing node is already identical to `value` the input tree is returned
/// as-is.
pub fn set_in(tree: &FormValue, path: &str, value: FormValue, policy: UndefinedPolicy) -> FormValue {
    let segments = segments(path);
    if segments.is_empty() {
        return value;
    }
    assign(tree, &segments, value, policy).unwrap_or_else(|| tree.clone())
}

/// Return a new tree without the node at `path`
pub fn delete_in(tree: &FormValue, path: &str) -> FormValue {
    set_in(tree, path, FormValue::Undefined, UndefinedPolicy::Remove)
}

enum Slot {
    Put(FormValue),
    Remove,
}

/// Recursive copy-on-write write. `None` means nothing changed.
fn assign(
    node: &FormValue,
    segments: &[&str],
    value: FormValue,
    policy: UndefinedPolicy,
) -> Option<FormValue> {
    let (head, rest) = segments.split_first()?;
    let current = node.get(head);

    let slot = if rest.is_empty() {
        let removing = value.is_undefined() && policy == UndefinedPolicy::Remove;
        match current {
            Some(existing) if existing.ptr_eq(&value) && !(removing && existing.is_undefined()) => {
                return None;
            }
            None if removing => return None,
            _ if removing => Slot::Remove,
            _ => Slot::Put(value),
        }
    } else {
        let base = current.filter(|c| c.is_container()).unwrap_or(&UNDEFINED);
        Slot::Put(assign(base, rest, value, policy)?)
    };

    Some(write_child(node, head, slot))
}

fn write_child(node: &FormValue, key: &str, slot: Slot) -> FormValue {
    match node {
        FormValue::Map(map) => {
            let mut map = FormMap::clone(map);
            match slot {
                Slot::Put(value) => {
                    map.insert(key.to_string(), value);
                }
                Slot::Remove => {
                    map.shift_remove(key);
                }
            }
            FormValue::Map(Arc::new(map))
        }
        FormValue::List(list) => match sequence_index(key) {
            Some(index) => {
                let mut list = Vec::clone(list);
                match slot {
                    Slot::Put(value) => {
                        if index >= list.len() {
                            list.resize(index + 1, FormValue::Undefined);
                        }
                        list[index] = value;
                    }
                    Slot::Remove => {
                        if let Some(entry) = list.get_mut(index) {
                            *entry = FormValue::Undefined;
                        }
                    }
                }
                FormValue::List(Arc::new(list))
            }
            None => {
                tracing::warn!(
                    key,
                    len = list.len(),
                    "key does not fit a sequence; converting it to a mapping"
                );
                let map: FormMap = list
                    .iter()
                    .enumerate()
                    .map(|(index, item)| (index.to_string(), item.clone()))
                    .collect();
                write_child(&FormValue::Map(Arc::new(map)), key, slot)
            }
        },
        _ => {
            let empty = if sequence_index(key).is_some() {
                FormValue::list()
            } else {
                FormValue::map()
            };
            write_child(&empty, key, slot)
        }
    }
}

/// Index a sequence write may use without padding past [`MAX_SPARSE_LEN`]
fn sequence_index(key: &str) -> Option<usize> {
    as_index(key).filter(|index| *index < MAX_SPARSE_LEN)
}
