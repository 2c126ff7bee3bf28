//! Validation orchestration
//!
//! Three sources can report errors for a values snapshot:
//!
//! - **field** validators, registered per path, see only their field's value
//! - the **function** validator sees the whole values tree
//! - the **schema** sees a prepared copy (see [`crate::schema::prepare_values`])
//!
//! [`run_validators`] starts every source against the same snapshot, awaits
//! them together and merges their error trees by [`Precedence`].
//!
//! Runs are tagged with a per-target generation ([`Generations`]); a result
//! is applied only if no newer run for the same target started meanwhile.

use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures::future::{join_all, FutureExt, LocalBoxFuture, OptionFuture};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{FormError, Result};
use crate::path::{get_in, set_in, UndefinedPolicy};
use crate::schema::{errors_from_issues, prepare_values, SchemaRejection, ValidationSchema};
use crate::tree::merge_trees;
use crate::value::FormValue;

// ─────────────────────────────────────────────────────────────────────────────
// Validators
// ─────────────────────────────────────────────────────────────────────────────

type FieldFn = dyn Fn(&FormValue) -> LocalBoxFuture<'static, anyhow::Result<Option<String>>>;
type FormFn = dyn Fn(&FormValue) -> LocalBoxFuture<'static, anyhow::Result<FormValue>>;

/// Validator for a single field.
///
/// Resolves to `Some(message)` when the value is invalid. An empty message
/// counts as valid.
#[derive(Clone)]
pub struct FieldValidator(Rc<FieldFn>);

impl FieldValidator {
    /// Synchronous validator
    pub fn new<F>(validate: F) -> Self
    where
        F: Fn(&FormValue) -> Option<String> + 'static,
    {
        Self(Rc::new(move |value: &FormValue| {
            futures::future::ready(Ok(validate(value))).boxed_local()
        }))
    }

    /// Synchronous validator that may fail to run
    pub fn fallible<F>(validate: F) -> Self
    where
        F: Fn(&FormValue) -> anyhow::Result<Option<String>> + 'static,
    {
        Self(Rc::new(move |value: &FormValue| {
            futures::future::ready(validate(value)).boxed_local()
        }))
    }

    /// Asynchronous validator. The closure runs immediately; only the
    /// returned future is awaited later.
    pub fn future<F, Fut>(validate: F) -> Self
    where
        F: Fn(&FormValue) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<Option<String>>> + 'static,
    {
        Self(Rc::new(move |value: &FormValue| validate(value).boxed_local()))
    }

    pub fn run(&self, value: &FormValue) -> LocalBoxFuture<'static, anyhow::Result<Option<String>>> {
        (self.0)(value)
    }
}

impl fmt::Debug for FieldValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FieldValidator(..)")
    }
}

/// Whole-form validator returning an errors tree
#[derive(Clone)]
pub struct FormValidator(Rc<FormFn>);

impl FormValidator {
    pub fn new<F>(validate: F) -> Self
    where
        F: Fn(&FormValue) -> FormValue + 'static,
    {
        Self(Rc::new(move |values: &FormValue| {
            futures::future::ready(Ok(validate(values))).boxed_local()
        }))
    }

    pub fn fallible<F>(validate: F) -> Self
    where
        F: Fn(&FormValue) -> anyhow::Result<FormValue> + 'static,
    {
        Self(Rc::new(move |values: &FormValue| {
            futures::future::ready(validate(values)).boxed_local()
        }))
    }

    pub fn future<F, Fut>(validate: F) -> Self
    where
        F: Fn(&FormValue) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<FormValue>> + 'static,
    {
        Self(Rc::new(move |values: &FormValue| validate(values).boxed_local()))
    }

    pub fn run(&self, values: &FormValue) -> LocalBoxFuture<'static, anyhow::Result<FormValue>> {
        (self.0)(values)
    }
}

impl fmt::Debug for FormValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FormValidator(..)")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Policies
// ─────────────────────────────────────────────────────────────────────────────

/// Where an error tree came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationSource {
    Field,
    Function,
    Schema,
}

impl fmt::Display for ValidationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValidationSource::Field => "field",
            ValidationSource::Function => "function",
            ValidationSource::Schema => "schema",
        })
    }
}

/// Order in which sources win when they report the same path, highest first
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ValidationSource>", into = "Vec<ValidationSource>")]
pub struct Precedence([ValidationSource; 3]);

impl Precedence {
    /// Field validators win, then the function validator, then the schema
    pub const FIELD_FIRST: Precedence = Precedence([
        ValidationSource::Field,
        ValidationSource::Function,
        ValidationSource::Schema,
    ]);

    /// The function validator wins, then the schema, then field validators
    pub const FUNCTION_FIRST: Precedence = Precedence([
        ValidationSource::Function,
        ValidationSource::Schema,
        ValidationSource::Field,
    ]);

    /// Custom order. Each source must appear exactly once.
    pub fn new(order: [ValidationSource; 3]) -> Option<Self> {
        let distinct = order[0] != order[1] && order[1] != order[2] && order[0] != order[2];
        distinct.then_some(Precedence(order))
    }

    /// Sources, highest priority first
    pub fn order(&self) -> [ValidationSource; 3] {
        self.0
    }

    /// Merge per-source error trees
    pub fn merge(&self, field: FormValue, function: FormValue, schema: FormValue) -> FormValue {
        let tree_for = |source: ValidationSource| match source {
            ValidationSource::Field => &field,
            ValidationSource::Function => &function,
            ValidationSource::Schema => &schema,
        };
        let [high, mid, low] = self.0;
        let lower = merge_trees(tree_for(mid), tree_for(low));
        merge_trees(tree_for(high), &lower)
    }
}

impl Default for Precedence {
    fn default() -> Self {
        Precedence::FIELD_FIRST
    }
}

impl TryFrom<Vec<ValidationSource>> for Precedence {
    type Error = String;

    fn try_from(order: Vec<ValidationSource>) -> std::result::Result<Self, String> {
        let order: [ValidationSource; 3] = order
            .try_into()
            .map_err(|v: Vec<_>| format!("precedence needs 3 sources, got {}", v.len()))?;
        Precedence::new(order).ok_or_else(|| "precedence sources must be distinct".to_string())
    }
}

impl From<Precedence> for Vec<ValidationSource> {
    fn from(precedence: Precedence) -> Self {
        precedence.0.to_vec()
    }
}

/// What happens when a validator fails to run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultMode {
    /// Field faults become that field's message; form and schema faults are
    /// logged and ignored
    #[default]
    Forgiving,
    /// Any fault aborts the run with [`FormError::Validator`]
    Strict,
}

// ─────────────────────────────────────────────────────────────────────────────
// Running
// ─────────────────────────────────────────────────────────────────────────────

/// Validators active for one run
#[derive(Clone, Default)]
pub(crate) struct Validators {
    pub fields: Vec<(String, FieldValidator)>,
    pub form: Option<FormValidator>,
    pub schema: Option<Rc<dyn ValidationSchema>>,
}

/// Start every validator against `values` and merge their errors.
///
/// All validators are invoked before this returns, so the snapshot they see
/// is fixed at call time.
pub(crate) fn run_validators(
    values: &FormValue,
    validators: &Validators,
    precedence: Precedence,
    mode: FaultMode,
) -> LocalBoxFuture<'static, Result<FormValue>> {
    let field_runs: Vec<_> = validators
        .fields
        .iter()
        .map(|(path, validator)| {
            let value = get_in(values, path).cloned().unwrap_or_default();
            let run = validator.run(&value);
            let path = path.clone();
            async move { (path, run.await) }
        })
        .collect();
    let form_run = OptionFuture::from(validators.form.as_ref().map(|v| v.run(values)));
    let schema_run = OptionFuture::from(
        validators
            .schema
            .as_ref()
            .map(|schema| schema.validate(&prepare_values(values))),
    );

    async move {
        let (field_results, form_result, schema_result) =
            futures::join!(join_all(field_runs), form_run, schema_run);

        let mut field_errors = FormValue::map();
        for (path, result) in field_results {
            if let Some(message) = field_message(&path, result, mode)? {
                field_errors = set_in(&field_errors, &path, message.into(), UndefinedPolicy::Remove);
            }
        }

        let function_errors = match form_result {
            None => FormValue::map(),
            Some(Ok(errors)) => errors,
            Some(Err(err)) => forgive(ValidationSource::Function, None, err, mode)?,
        };

        let schema_errors = match schema_result {
            None | Some(Ok(())) => FormValue::map(),
            Some(Err(rejection)) => schema_errors(rejection, mode)?,
        };

        Ok(precedence.merge(field_errors, function_errors, schema_errors))
    }
    .boxed_local()
}

/// Validate a single field.
///
/// Uses the field's own validator when there is one, otherwise the schema
/// (reading the message at `path` from its errors). Returns `None` when
/// neither exists.
pub(crate) fn run_field(
    values: &FormValue,
    path: &str,
    validator: Option<&FieldValidator>,
    schema: Option<&Rc<dyn ValidationSchema>>,
    mode: FaultMode,
) -> Option<LocalBoxFuture<'static, Result<Option<String>>>> {
    if let Some(validator) = validator {
        let value = get_in(values, path).cloned().unwrap_or_default();
        let run = validator.run(&value);
        let path = path.to_string();
        return Some(async move { field_message(&path, run.await, mode) }.boxed_local());
    }

    let run = schema?.validate(&prepare_values(values));
    let path = path.to_string();
    Some(
        async move {
            match run.await {
                Ok(()) => Ok(None),
                Err(rejection) => {
                    let errors = schema_errors(rejection, mode)?;
                    Ok(get_in(&errors, &path)
                        .and_then(FormValue::as_str)
                        .map(str::to_string))
                }
            }
        }
        .boxed_local(),
    )
}

fn field_message(
    path: &str,
    result: anyhow::Result<Option<String>>,
    mode: FaultMode,
) -> Result<Option<String>> {
    match result {
        Ok(message) => Ok(message.filter(|m| !m.is_empty())),
        Err(err) => match mode {
            FaultMode::Strict => Err(FormError::validator(ValidationSource::Field, Some(path), &err)),
            FaultMode::Forgiving => {
                tracing::warn!(path, error = %err, "field validator failed; using its error as the message");
                Ok(Some(err.to_string()))
            }
        },
    }
}

fn schema_errors(rejection: SchemaRejection, mode: FaultMode) -> Result<FormValue> {
    match rejection {
        SchemaRejection::Invalid(issues) => Ok(errors_from_issues(&issues)),
        SchemaRejection::Fault(err) => forgive(ValidationSource::Schema, None, err, mode),
    }
}

/// Turn a form or schema fault into "no errors" (forgiving) or a failure
fn forgive(
    origin: ValidationSource,
    path: Option<&str>,
    err: anyhow::Error,
    mode: FaultMode,
) -> Result<FormValue> {
    match mode {
        FaultMode::Strict => Err(FormError::validator(origin, path, &err)),
        FaultMode::Forgiving => {
            tracing::warn!(%origin, error = %err, "validator failed; ignoring its result");
            Ok(FormValue::map())
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Generations
// ─────────────────────────────────────────────────────────────────────────────

/// What a validation run covers
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Target {
    Form,
    Field(String),
}

/// Identity of one validation run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunTicket {
    pub target: Target,
    pub generation: u64,
}

/// Monotonic run counters, one per target
#[derive(Debug, Default)]
pub(crate) struct Generations {
    counters: FxHashMap<Target, u64>,
}

impl Generations {
    /// Start a new run, superseding every earlier run for the same target
    pub fn begin(&mut self, target: Target) -> RunTicket {
        let counter = self.counters.entry(target.clone()).or_default();
        *counter += 1;
        RunTicket {
            target,
            generation: *counter,
        }
    }

    /// Whether `ticket` is still the latest run for its target
    pub fn is_current(&self, ticket: &RunTicket) -> bool {
        self.counters.get(&ticket.target) == Some(&ticket.generation)
    }

    /// Supersede every run in flight
    pub fn invalidate_all(&mut self) {
        for counter in self.counters.values_mut() {
            *counter += 1;
        }
    }
}
