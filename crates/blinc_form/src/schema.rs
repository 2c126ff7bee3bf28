//! Schema adapter contract
//!
//! A schema is an opaque validation engine. The form hands it a prepared
//! copy of the values and gets back either success or a
//! [`SchemaRejection`]. Rejections that carry issues become an errors
//! tree; rejections that carry a fault are execution failures handled by
//! the form's fault mode.
//!
//! # Example
//!
//! ```rust
//! use blinc_form::schema::{SchemaIssue, SchemaRejection, ValidationSchema};
//! use blinc_form::FormValue;
//! use futures::future::{FutureExt, LocalBoxFuture};
//!
//! struct RequiredEmail;
//!
//! impl ValidationSchema for RequiredEmail {
//!     fn validate(&self, values: &FormValue) -> LocalBoxFuture<'static, Result<(), SchemaRejection>> {
//!         let missing = values.get("email").map_or(true, FormValue::is_nullish);
//!         async move {
//!             if missing {
//!                 Err(SchemaRejection::Invalid(vec![SchemaIssue::new("email", "Required")]))
//!             } else {
//!                 Ok(())
//!             }
//!         }
//!         .boxed_local()
//!     }
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use futures::future::LocalBoxFuture;

use crate::path::{get_in, set_in, UndefinedPolicy};
use crate::value::FormValue;

/// A single failed constraint reported by a schema
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemaIssue {
    /// Where the constraint failed; empty for form-level issues
    pub path: String,
    pub message: String,
}

impl SchemaIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Why a schema did not accept the values
#[derive(Debug)]
pub enum SchemaRejection {
    /// The values broke one or more constraints
    Invalid(Vec<SchemaIssue>),
    /// The schema itself failed to run
    Fault(anyhow::Error),
}

impl fmt::Display for SchemaRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaRejection::Invalid(issues) => write!(f, "{} schema issue(s)", issues.len()),
            SchemaRejection::Fault(err) => write!(f, "schema fault: {:#}", err),
        }
    }
}

impl From<anyhow::Error> for SchemaRejection {
    fn from(err: anyhow::Error) -> Self {
        SchemaRejection::Fault(err)
    }
}

/// Schema-based validation engine
pub trait ValidationSchema {
    /// Validate a prepared snapshot of the form values
    fn validate(&self, values: &FormValue) -> LocalBoxFuture<'static, Result<(), SchemaRejection>>;
}

impl<S: ValidationSchema + ?Sized> ValidationSchema for Arc<S> {
    fn validate(&self, values: &FormValue) -> LocalBoxFuture<'static, Result<(), SchemaRejection>> {
        (**self).validate(values)
    }
}

/// Build an errors tree from schema issues.
///
/// The first message reported for a path wins; issues without a path are
/// dropped since they have nowhere to live in the tree.
pub fn errors_from_issues(issues: &[SchemaIssue]) -> FormValue {
    issues
        .iter()
        .filter(|issue| !issue.path.is_empty())
        .fold(FormValue::map(), |errors, issue| {
            if get_in(&errors, &issue.path).is_some() {
                errors
            } else {
                set_in(
                    &errors,
                    &issue.path,
                    issue.message.as_str().into(),
                    UndefinedPolicy::Remove,
                )
            }
        })
}

/// Prepare values for a schema: every empty string becomes `Undefined`.
///
/// Required-field constraints then treat a cleared input the same as a
/// missing one. Mapping entries keep their key with an `Undefined` value
/// so the schema still sees the field.
pub fn prepare_values(values: &FormValue) -> FormValue {
    match values {
        FormValue::String(s) if s.is_empty() => FormValue::Undefined,
        FormValue::Map(map) => FormValue::Map(Arc::new(
            map.iter()
                .map(|(key, value)| (key.clone(), prepare_values(value)))
                .collect(),
        )),
        FormValue::List(list) => {
            FormValue::List(Arc::new(list.iter().map(prepare_values).collect()))
        }
        other => other.clone(),
    }
}
