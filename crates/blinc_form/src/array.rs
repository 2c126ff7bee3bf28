//! Helpers for list-valued fields
//!
//! Each helper edits the sequence at one path in a single transition. Edits
//! that shift positions (`pop`, `insert`, `remove`, `swap`, `move_item`,
//! `unshift`) are mirrored on the errors and touched trees when those hold a
//! sequence at the same path, so messages stay attached to the right item.
//! A mirrored sequence left empty is removed.
//!
//! # Example
//!
//! ```rust
//! use blinc_form::{FormConfig, FormValue};
//! use serde_json::json;
//!
//! let form = FormConfig::new(json!({ "friends": ["A", "B"] })).build();
//! let friends = form.array("friends");
//!
//! friends.push("C");
//! friends.swap(0, 2);
//! assert_eq!(friends.remove(1), Some(FormValue::from("B")));
//!
//! assert_eq!(form.value("friends"), Some(FormValue::from(vec!["C", "A"])));
//! ```

use crate::path::{delete_in, get_in, set_in, UndefinedPolicy, MAX_SPARSE_LEN};
use crate::store::Form;
use crate::value::FormValue;

type Edit<'a> = &'a dyn Fn(&mut Vec<FormValue>);

/// Sequence operations on the list at one path
#[derive(Clone, Debug)]
pub struct ArrayHelpers {
    form: Form,
    path: String,
}

impl ArrayHelpers {
    pub(crate) fn new(form: &Form, path: &str) -> Self {
        Self {
            form: form.clone(),
            path: path.to_string(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Append to the end
    pub fn push(&self, value: impl Into<FormValue>) {
        let value = value.into();
        self.update(move |items| items.push(value), None);
    }

    /// Remove and return the last item
    pub fn pop(&self) -> Option<FormValue> {
        self.update(
            |items: &mut Vec<FormValue>| items.pop(),
            Some(&|items: &mut Vec<FormValue>| {
                items.pop();
            }),
        )
    }

    /// Insert at `index`, shifting later items. Indices past the end append.
    pub fn insert(&self, index: usize, value: impl Into<FormValue>) {
        let value = value.into();
        self.update(
            move |items| items.insert(index.min(items.len()), value),
            Some(&|items: &mut Vec<FormValue>| {
                items.insert(index.min(items.len()), FormValue::Undefined)
            }),
        );
    }

    /// Prepend; returns the new length
    pub fn unshift(&self, value: impl Into<FormValue>) -> usize {
        let value = value.into();
        self.update(
            move |items| {
                items.insert(0, value);
                items.len()
            },
            Some(&|items: &mut Vec<FormValue>| items.insert(0, FormValue::Undefined)),
        )
    }

    /// Remove and return the item at `index`
    pub fn remove(&self, index: usize) -> Option<FormValue> {
        self.update(
            move |items| (index < items.len()).then(|| items.remove(index)),
            Some(&|items: &mut Vec<FormValue>| {
                if index < items.len() {
                    items.remove(index);
                }
            }),
        )
    }

    /// Exchange two items, padding with `Undefined` if either is past the end.
    /// Indices at or beyond [`MAX_SPARSE_LEN`] are ignored.
    pub fn swap(&self, a: usize, b: usize) {
        if !self.fits(a.max(b)) {
            return;
        }
        let swap = |items: &mut Vec<FormValue>| {
            let needed = a.max(b) + 1;
            if items.len() < needed {
                items.resize(needed, FormValue::Undefined);
            }
            items.swap(a, b);
        };
        self.update(swap, Some(&swap));
    }

    /// Move the item at `from` to `to`, shifting the items in between
    pub fn move_item(&self, from: usize, to: usize) {
        let relocate = |items: &mut Vec<FormValue>| {
            if from < items.len() {
                let item = items.remove(from);
                items.insert(to.min(items.len()), item);
            }
        };
        self.update(relocate, Some(&relocate));
    }

    /// Replace the item at `index`, padding with `Undefined` if past the end.
    /// Indices at or beyond [`MAX_SPARSE_LEN`] are ignored.
    pub fn replace(&self, index: usize, value: impl Into<FormValue>) {
        if !self.fits(index) {
            return;
        }
        let value = value.into();
        self.update(
            move |items| {
                if items.len() <= index {
                    items.resize(index + 1, FormValue::Undefined);
                }
                items[index] = value;
            },
            None,
        );
    }

    fn fits(&self, index: usize) -> bool {
        if index < MAX_SPARSE_LEN {
            return true;
        }
        tracing::warn!(
            path = %self.path,
            index,
            "index beyond the sparse sequence limit; ignoring"
        );
        false
    }

    fn update<R>(
        &self,
        edit_values: impl FnOnce(&mut Vec<FormValue>) -> R,
        mirror: Option<Edit<'_>>,
    ) -> R {
        let state = self.form.state();
        let options = *self.form.options();

        let mut items = match get_in(&state.values, &self.path) {
            Some(FormValue::List(list)) => list.to_vec(),
            None => Vec::new(),
            Some(other) => {
                tracing::warn!(path = %self.path, value = ?other, "array helper on a non-sequence; starting empty");
                Vec::new()
            }
        };
        let result = edit_values(&mut items);

        let mut next = state.clone();
        next.values = set_in(&state.values, &self.path, items.into(), options.undefined_policy);
        if let Some(edit) = mirror {
            next.errors = mirror_edit(&state.errors, &self.path, edit);
            next.touched = mirror_edit(&state.touched, &self.path, edit);
        }
        self.form.set_form_state(next);

        if options.validate_on_change {
            self.form.spawn_validation();
        }
        result
    }
}

fn mirror_edit(tree: &FormValue, path: &str, edit: Edit<'_>) -> FormValue {
    let Some(list) = get_in(tree, path).and_then(FormValue::as_list) else {
        return tree.clone();
    };
    let mut items = list.to_vec();
    edit(&mut items);
    if items.is_empty() {
        delete_in(tree, path)
    } else {
        set_in(tree, path, items.into(), UndefinedPolicy::Preserve)
    }
}
