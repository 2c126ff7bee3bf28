//! Form configuration
//!
//! [`FormOptions`] holds the plain behavioural flags and is serde
//! (de)serializable with defaults, so hosts can keep them in their own
//! config files. [`FormConfig`] is the builder that adds initial state,
//! validators and the submit handler, and produces a [`Form`].
//!
//! # Example
//!
//! ```rust
//! use blinc_form::{FormConfig, FormValue};
//! use serde_json::json;
//!
//! let form = FormConfig::new(json!({ "email": "" }))
//!     .validate_on_blur(false)
//!     .on_submit(|values, _form| async move {
//!         println!("submitting {}", values);
//!         Ok(())
//!     })
//!     .build();
//!
//! assert_eq!(form.values(), FormValue::from(json!({ "email": "" })));
//! ```

use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture};
use serde::{Deserialize, Serialize};

use crate::path::UndefinedPolicy;
use crate::runtime::Spawn;
use crate::schema::ValidationSchema;
use crate::state::InitialState;
use crate::store::Form;
use crate::validation::{FaultMode, FormValidator, Precedence};
use crate::value::FormValue;

/// Caller-supplied submission handler
pub type SubmitHandler = Rc<dyn Fn(FormValue, Form) -> LocalBoxFuture<'static, anyhow::Result<()>>>;

/// Behavioural flags
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormOptions {
    /// Validate the whole form after every value change
    pub validate_on_change: bool,
    /// Validate the whole form after a field is touched
    pub validate_on_blur: bool,
    /// Validate once when the form is built
    pub validate_on_mount: bool,
    /// Let [`Form::reinitialize`] replace the initial values
    pub enable_reinitialize: bool,
    pub undefined_policy: UndefinedPolicy,
    pub fault_mode: FaultMode,
    pub precedence: Precedence,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            validate_on_change: true,
            validate_on_blur: true,
            validate_on_mount: false,
            enable_reinitialize: false,
            undefined_policy: UndefinedPolicy::default(),
            fault_mode: FaultMode::default(),
            precedence: Precedence::default(),
        }
    }
}

/// Builder for a [`Form`]
pub struct FormConfig {
    pub(crate) initial: InitialState,
    pub(crate) options: FormOptions,
    pub(crate) validate: Option<FormValidator>,
    pub(crate) schema: Option<Rc<dyn ValidationSchema>>,
    pub(crate) on_submit: Option<SubmitHandler>,
    pub(crate) spawner: Option<Rc<dyn Spawn>>,
}

impl FormConfig {
    pub fn new(initial_values: impl Into<FormValue>) -> Self {
        Self {
            initial: InitialState::new(initial_values.into()),
            options: FormOptions::default(),
            validate: None,
            schema: None,
            on_submit: None,
            spawner: None,
        }
    }

    pub fn initial_errors(mut self, errors: impl Into<FormValue>) -> Self {
        self.initial.errors = errors.into();
        self
    }

    pub fn initial_touched(mut self, touched: impl Into<FormValue>) -> Self {
        self.initial.touched = touched.into();
        self
    }

    pub fn initial_status(mut self, status: impl Into<FormValue>) -> Self {
        self.initial.status = Some(status.into());
        self
    }

    /// Whole-form validator
    pub fn validate(mut self, validator: FormValidator) -> Self {
        self.validate = Some(validator);
        self
    }

    pub fn validation_schema(mut self, schema: impl ValidationSchema + 'static) -> Self {
        self.schema = Some(Rc::new(schema));
        self
    }

    /// Handler called with the values once a submit passes validation
    pub fn on_submit<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(FormValue, Form) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<()>> + 'static,
    {
        self.on_submit = Some(Rc::new(move |values, form| handler(values, form).boxed_local()));
        self
    }

    /// Replace every flag at once
    pub fn options(mut self, options: FormOptions) -> Self {
        self.options = options;
        self
    }

    pub fn validate_on_change(mut self, enabled: bool) -> Self {
        self.options.validate_on_change = enabled;
        self
    }

    pub fn validate_on_blur(mut self, enabled: bool) -> Self {
        self.options.validate_on_blur = enabled;
        self
    }

    pub fn validate_on_mount(mut self, enabled: bool) -> Self {
        self.options.validate_on_mount = enabled;
        self
    }

    pub fn enable_reinitialize(mut self, enabled: bool) -> Self {
        self.options.enable_reinitialize = enabled;
        self
    }

    pub fn undefined_policy(mut self, policy: UndefinedPolicy) -> Self {
        self.options.undefined_policy = policy;
        self
    }

    pub fn fault_mode(mut self, mode: FaultMode) -> Self {
        self.options.fault_mode = mode;
        self
    }

    pub fn precedence(mut self, precedence: Precedence) -> Self {
        self.options.precedence = precedence;
        self
    }

    /// Where background validation runs. Defaults to an internal
    /// [`TaskPool`](crate::runtime::TaskPool) driven by
    /// [`Form::run_until_stalled`].
    pub fn spawner(mut self, spawner: impl Spawn + 'static) -> Self {
        self.spawner = Some(Rc::new(spawner));
        self
    }

    pub fn build(self) -> Form {
        Form::new(self)
    }
}

impl fmt::Debug for FormConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormConfig")
            .field("initial", &self.initial)
            .field("options", &self.options)
            .field("validate", &self.validate.is_some())
            .field("schema", &self.schema.is_some())
            .field("on_submit", &self.on_submit.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidationSource;
    use serde_json::json;

    #[test]
    fn test_default_options() {
        let options = FormOptions::default();
        assert!(options.validate_on_change);
        assert!(options.validate_on_blur);
        assert!(!options.validate_on_mount);
        assert!(!options.enable_reinitialize);
        assert_eq!(options.undefined_policy, UndefinedPolicy::Remove);
        assert_eq!(options.fault_mode, FaultMode::Forgiving);
        assert_eq!(options.precedence, Precedence::FIELD_FIRST);
    }

    #[test]
    fn test_options_from_partial_json() {
        let options: FormOptions = serde_json::from_value(json!({
            "validate_on_blur": false,
            "fault_mode": "strict",
            "undefined_policy": "preserve",
            "precedence": ["function", "schema", "field"],
        }))
        .unwrap();

        assert!(options.validate_on_change);
        assert!(!options.validate_on_blur);
        assert_eq!(options.fault_mode, FaultMode::Strict);
        assert_eq!(options.undefined_policy, UndefinedPolicy::Preserve);
        assert_eq!(options.precedence.order()[0], ValidationSource::Function);
    }

    #[test]
    fn test_builder_sets_initial_state() {
        let config = FormConfig::new(json!({ "a": 1 }))
            .initial_errors(json!({ "a": "bad" }))
            .initial_touched(json!({ "a": true }))
            .initial_status("draft")
            .validate_on_change(false)
            .enable_reinitialize(true);

        assert_eq!(config.initial.errors, FormValue::from(json!({ "a": "bad" })));
        assert_eq!(config.initial.touched, FormValue::from(json!({ "a": true })));
        assert_eq!(config.initial.status, Some(FormValue::from("draft")));
        assert!(!config.options.validate_on_change);
        assert!(config.options.enable_reinitialize);
    }
}
