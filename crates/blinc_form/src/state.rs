//! Form state and the pure reducer
//!
//! [`FormState`] is the single shared resource of a form. It is never
//! mutated in place: [`reduce`] builds the next state from the previous one
//! and an [`Action`], sharing every unchanged subtree.
//!
//! # Example
//!
//! ```rust
//! use blinc_form::state::{reduce, Action, FormState};
//! use blinc_form::path::UndefinedPolicy;
//! use blinc_form::FormValue;
//! use serde_json::json;
//!
//! let state = FormState::new(FormValue::from(json!({ "email": "" })));
//! let next = reduce(
//!     &state,
//!     Action::SetFieldValue { path: "email".into(), value: "a@b.c".into() },
//!     UndefinedPolicy::Remove,
//! );
//!
//! assert_eq!(next.value("email"), Some(&FormValue::from("a@b.c")));
//! assert_eq!(state.value("email"), Some(&FormValue::from("")));
//! ```

use serde::Serialize;

use crate::path::{get_in, set_in, UndefinedPolicy};
use crate::tree::{deep_equal, has_leaves};
use crate::value::FormValue;

/// Snapshot of a form
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FormState {
    pub values: FormValue,
    /// Same shape as `values`, message leaves
    pub errors: FormValue,
    /// Same shape as `values`, boolean leaves
    pub touched: FormValue,
    /// Caller-defined, opaque to the engine
    pub status: Option<FormValue>,
    pub is_submitting: bool,
    pub is_validating: bool,
    pub submit_count: u32,
}

impl FormState {
    /// A pristine state over `values`
    pub fn new(values: FormValue) -> Self {
        Self {
            values,
            errors: FormValue::map(),
            touched: FormValue::map(),
            status: None,
            is_submitting: false,
            is_validating: false,
            submit_count: 0,
        }
    }

    /// Build the state a form starts from (or resets to)
    pub fn from_initial(initial: &InitialState) -> Self {
        Self {
            values: initial.values.clone(),
            errors: initial.errors.clone(),
            touched: initial.touched.clone(),
            status: initial.status.clone(),
            is_submitting: false,
            is_validating: false,
            submit_count: 0,
        }
    }

    pub fn value(&self, path: &str) -> Option<&FormValue> {
        get_in(&self.values, path)
    }

    /// Error message at `path`, if it is a string leaf
    pub fn error(&self, path: &str) -> Option<&str> {
        get_in(&self.errors, path).and_then(FormValue::as_str)
    }

    pub fn is_touched(&self, path: &str) -> bool {
        get_in(&self.touched, path).is_some_and(FormValue::is_truthy)
    }

    /// Whether the errors tree holds any message
    pub fn has_errors(&self) -> bool {
        has_leaves(&self.errors)
    }
}

impl Default for FormState {
    fn default() -> Self {
        Self::new(FormValue::map())
    }
}

/// What a form starts from and returns to on reset
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InitialState {
    pub values: FormValue,
    pub errors: FormValue,
    pub touched: FormValue,
    pub status: Option<FormValue>,
}

impl InitialState {
    pub fn new(values: FormValue) -> Self {
        Self {
            values,
            errors: FormValue::map(),
            touched: FormValue::map(),
            status: None,
        }
    }

    pub fn with_errors(mut self, errors: FormValue) -> Self {
        self.errors = errors;
        self
    }

    pub fn with_touched(mut self, touched: FormValue) -> Self {
        self.touched = touched;
        self
    }

    pub fn with_status(mut self, status: Option<FormValue>) -> Self {
        self.status = status;
        self
    }
}

/// State transitions understood by [`reduce`]
#[derive(Clone, Debug)]
pub enum Action {
    SetValues(FormValue),
    SetFieldValue { path: String, value: FormValue },
    SetFieldTouched { path: String, touched: bool },
    /// `None` clears the message at `path`
    SetFieldError { path: String, error: Option<String> },
    SetErrors(FormValue),
    SetTouched(FormValue),
    SetStatus(Option<FormValue>),
    SetSubmitting(bool),
    SetValidating(bool),
    /// Replace the whole state (array helpers use this to update values,
    /// errors and touched in one transition)
    SetFormState(Box<FormState>),
    SubmitAttempt,
    SubmitSuccess,
    SubmitFailure,
    ValidateAttempt,
    ValidateSuccess,
    ValidateFailure(FormValue),
    ResetForm(Box<InitialState>),
}

impl Action {
    /// Stable name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Action::SetValues(_) => "SET_VALUES",
            Action::SetFieldValue { .. } => "SET_FIELD_VALUE",
            Action::SetFieldTouched { .. } => "SET_FIELD_TOUCHED",
            Action::SetFieldError { .. } => "SET_FIELD_ERROR",
            Action::SetErrors(_) => "SET_ERRORS",
            Action::SetTouched(_) => "SET_TOUCHED",
            Action::SetStatus(_) => "SET_STATUS",
            Action::SetSubmitting(_) => "SET_ISSUBMITTING",
            Action::SetValidating(_) => "SET_ISVALIDATING",
            Action::SetFormState(_) => "SET_FORM_STATE",
            Action::SubmitAttempt => "SUBMIT_ATTEMPT",
            Action::SubmitSuccess => "SUBMIT_SUCCESS",
            Action::SubmitFailure => "SUBMIT_FAILURE",
            Action::ValidateAttempt => "VALIDATE_ATTEMPT",
            Action::ValidateSuccess => "VALIDATE_SUCCESS",
            Action::ValidateFailure(_) => "VALIDATE_FAILURE",
            Action::ResetForm(_) => "RESET_FORM",
        }
    }
}

/// Apply `action` to `state`.
///
/// `policy` decides what writing `Undefined` into `values` does. Errors and
/// touched trees always drop cleared entries.
pub fn reduce(state: &FormState, action: Action, policy: UndefinedPolicy) -> FormState {
    let mut next = state.clone();
    match action {
        Action::SetValues(values) => next.values = values,
        Action::SetFieldValue { path, value } => {
            next.values = set_in(&state.values, &path, value, policy);
        }
        Action::SetFieldTouched { path, touched } => {
            next.touched = set_in(&state.touched, &path, touched.into(), UndefinedPolicy::Remove);
        }
        Action::SetFieldError { path, error } => {
            next.errors = set_in(&state.errors, &path, error.into(), UndefinedPolicy::Remove);
        }
        Action::SetErrors(errors) => {
            if !deep_equal(&state.errors, &errors) {
                next.errors = errors;
            }
        }
        Action::SetTouched(touched) => {
            if !deep_equal(&state.touched, &touched) {
                next.touched = touched;
            }
        }
        Action::SetStatus(status) => next.status = status,
        Action::SetSubmitting(flag) => next.is_submitting = flag,
        Action::SetValidating(flag) => next.is_validating = flag,
        Action::SetFormState(replacement) => next = *replacement,
        Action::SubmitAttempt => {
            next.is_submitting = true;
            next.submit_count = state.submit_count.saturating_add(1);
        }
        Action::SubmitSuccess | Action::SubmitFailure => next.is_submitting = false,
        Action::ValidateAttempt => next.is_validating = true,
        Action::ValidateSuccess => {
            next.is_validating = false;
            if !(state.errors.is_map() && state.errors.is_empty()) {
                next.errors = FormValue::map();
            }
        }
        Action::ValidateFailure(errors) => {
            next.is_validating = false;
            if !deep_equal(&state.errors, &errors) {
                next.errors = errors;
            }
        }
        Action::ResetForm(initial) => next = FormState::from_initial(&initial),
    }
    next
}
