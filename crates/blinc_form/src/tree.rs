//! Structural operations over whole value trees
//!
//! - [`touch_all`]: mark every leaf of a values tree as touched
//! - [`deep_equal`]: structural equality used by selector comparers
//! - [`merge_trees`]: precedence-aware deep merge of error trees
//! - [`has_leaves`] / [`leaf_paths`]: inspect an errors tree

use std::sync::Arc;

use crate::path;
use crate::value::{FormMap, FormValue};

/// Map every leaf of `values` to `true`, keeping the mapping/sequence shape
pub fn touch_all(values: &FormValue) -> FormValue {
    fill_leaves(values, &FormValue::Bool(true))
}

/// Map every leaf of `values` to `leaf`
pub fn fill_leaves(values: &FormValue, leaf: &FormValue) -> FormValue {
    match values {
        FormValue::Map(map) => FormValue::Map(Arc::new(
            map.iter()
                .map(|(key, value)| (key.clone(), fill_leaves(value, leaf)))
                .collect(),
        )),
        FormValue::List(list) => FormValue::List(Arc::new(
            list.iter().map(|value| fill_leaves(value, leaf)).collect(),
        )),
        _ => leaf.clone(),
    }
}

/// Structural equality.
///
/// `NaN` equals `NaN`, mapping key order is ignored, and shared containers
/// short-circuit without being walked.
pub fn deep_equal(a: &FormValue, b: &FormValue) -> bool {
    match (a, b) {
        (FormValue::Undefined, FormValue::Undefined) | (FormValue::Null, FormValue::Null) => true,
        (FormValue::Bool(x), FormValue::Bool(y)) => x == y,
        (FormValue::Number(x), FormValue::Number(y)) => x == y || (x.is_nan() && y.is_nan()),
        (FormValue::String(x), FormValue::String(y)) => x == y,
        (FormValue::Map(x), FormValue::Map(y)) => {
            Arc::ptr_eq(x, y)
                || (x.len() == y.len()
                    && x.iter()
                        .all(|(key, value)| y.get(key).is_some_and(|other| deep_equal(value, other))))
        }
        (FormValue::List(x), FormValue::List(y)) => {
            Arc::ptr_eq(x, y)
                || (x.len() == y.len() && x.iter().zip(y.iter()).all(|(l, r)| deep_equal(l, r)))
        }
        _ => false,
    }
}

/// Deep merge where `high` wins wherever both trees hold a leaf.
///
/// Mappings merge key by key, sequences index by index. An `Undefined`
/// node in `high` never hides what `low` has at the same position.
pub fn merge_trees(high: &FormValue, low: &FormValue) -> FormValue {
    match (high, low) {
        (FormValue::Map(h), FormValue::Map(l)) => {
            if Arc::ptr_eq(h, l) {
                return high.clone();
            }
            let mut out = FormMap::clone(l);
            for (key, value) in h.iter() {
                let merged = match l.get(key) {
                    Some(lower) => merge_trees(value, lower),
                    None => value.clone(),
                };
                out.insert(key.clone(), merged);
            }
            FormValue::Map(Arc::new(out))
        }
        (FormValue::List(h), FormValue::List(l)) => {
            let len = h.len().max(l.len());
            let merged = (0..len)
                .map(|i| match (h.get(i), l.get(i)) {
                    (Some(hv), Some(lv)) => merge_trees(hv, lv),
                    (Some(hv), None) => hv.clone(),
                    (None, Some(lv)) => lv.clone(),
                    (None, None) => FormValue::Undefined,
                })
                .collect();
            FormValue::List(Arc::new(merged))
        }
        (FormValue::Undefined, _) => low.clone(),
        _ => high.clone(),
    }
}

/// Whether a tree holds any leaf other than `Undefined`/`Null`.
///
/// An errors tree is "empty" exactly when this is false, even if it still
/// contains hollow containers left over from array operations.
pub fn has_leaves(tree: &FormValue) -> bool {
    match tree {
        FormValue::Undefined | FormValue::Null => false,
        FormValue::Map(map) => map.values().any(has_leaves),
        FormValue::List(list) => list.iter().any(has_leaves),
        _ => true,
    }
}

/// Paths of every meaningful leaf, depth first
pub fn leaf_paths(tree: &FormValue) -> Vec<String> {
    let mut out = Vec::new();
    collect_leaf_paths(tree, String::new(), &mut out);
    out
}

fn collect_leaf_paths(tree: &FormValue, prefix: String, out: &mut Vec<String>) {
    match tree {
        FormValue::Undefined | FormValue::Null => {}
        FormValue::Map(map) => {
            for (key, value) in map.iter() {
                collect_leaf_paths(value, path::join(&prefix, key), out);
            }
        }
        FormValue::List(list) => {
            for (index, value) in list.iter().enumerate() {
                collect_leaf_paths(value, path::join(&prefix, index), out);
            }
        }
        _ => out.push(prefix),
    }
}
