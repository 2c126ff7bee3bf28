//! The form handle
//!
//! [`Form`] owns one [`FormState`] and everything that drives it: the
//! reducer, registered field validators, validation generations, the event
//! emitter carrying state and lifecycle notifications, and the task
//! spawner used for background validation.
//!
//! Every mutation goes through [`Form::dispatch`]. The reducer builds the
//! next state, the state is swapped in, and only then are subscribers
//! notified, so no observer ever sees a half-applied transition.
//!
//! # Example
//!
//! ```rust
//! use blinc_form::{FieldValidator, FormConfig, FormValue};
//! use serde_json::json;
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let form = FormConfig::new(json!({ "email": "", "name": "" })).build();
//!
//! let _email = form.register_field(
//!     "email",
//!     FieldValidator::new(|v| v.as_str().filter(|s| !s.contains('@')).map(|_| "Invalid email".into())),
//! );
//!
//! let hits = Rc::new(Cell::new(0));
//! let counter = hits.clone();
//! let _sub = form.subscribe(
//!     |s| s.value("email").cloned(),
//!     move |_| counter.set(counter.get() + 1),
//! );
//!
//! form.set_field_value("name", "Ann");
//! assert_eq!(hits.get(), 0);
//!
//! form.set_field_value("email", "nope");
//! form.run_until_stalled();
//! assert_eq!(hits.get(), 1);
//! assert_eq!(form.state().error("email"), Some("Invalid email"));
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use futures::future::{FutureExt, LocalBoxFuture};
use indexmap::IndexMap;

use crate::array::ArrayHelpers;
use crate::config::{FormConfig, FormOptions, SubmitHandler};
use crate::error::Result;
use crate::events::{
    EventEmitter, ListenerOptions, SubscriptionHandle, RESET_CHANNEL, STATE_CHANNEL,
};
use crate::field::{BlurEvent, ChangeEvent, Field};
use crate::path::get_in;
use crate::runtime::{Spawn, TaskPool};
use crate::schema::ValidationSchema;
use crate::state::{reduce, Action, FormState, InitialState};
use crate::submit::SubmitPhase;
use crate::subscription::{default_comparer, SliceWatcher};
use crate::tree::{deep_equal, has_leaves};
use crate::validation::{
    run_field, run_validators, FieldValidator, FormValidator, Generations, RunTicket, Target,
    Validators,
};
use crate::value::FormValue;

struct FieldEntry {
    id: u64,
    validator: FieldValidator,
}

pub(crate) struct FormInner {
    pub(crate) state: RefCell<FormState>,
    pub(crate) initial: RefCell<InitialState>,
    pub(crate) options: FormOptions,
    validate: Option<FormValidator>,
    pub(crate) schema: Option<Rc<dyn ValidationSchema>>,
    pub(crate) on_submit: Option<SubmitHandler>,
    spawner: Rc<dyn Spawn>,
    pool: Option<Rc<TaskPool>>,
    pub(crate) events: EventEmitter<FormState>,
    fields: RefCell<IndexMap<String, FieldEntry>>,
    next_field_id: Cell<u64>,
    generations: RefCell<Generations>,
    notifying: Cell<bool>,
    notify_pending: Cell<bool>,
    pub(crate) submit_phase: Cell<SubmitPhase>,
}

/// Handle to a form. Clones share the same form.
#[derive(Clone)]
pub struct Form {
    pub(crate) inner: Rc<FormInner>,
}

impl Form {
    pub(crate) fn new(config: FormConfig) -> Self {
        let (spawner, pool) = match config.spawner {
            Some(spawner) => (spawner, None),
            None => {
                let pool = Rc::new(TaskPool::new());
                (pool.clone() as Rc<dyn Spawn>, Some(pool))
            }
        };

        let form = Form {
            inner: Rc::new(FormInner {
                state: RefCell::new(FormState::from_initial(&config.initial)),
                initial: RefCell::new(config.initial),
                options: config.options,
                validate: config.validate,
                schema: config.schema,
                on_submit: config.on_submit,
                spawner,
                pool,
                events: EventEmitter::new(),
                fields: RefCell::new(IndexMap::new()),
                next_field_id: Cell::new(0),
                generations: RefCell::new(Generations::default()),
                notifying: Cell::new(false),
                notify_pending: Cell::new(false),
                submit_phase: Cell::new(SubmitPhase::Idle),
            }),
        };

        tracing::debug!(options = ?form.inner.options, "form created");
        if form.inner.options.validate_on_mount {
            form.spawn_validation();
        }
        form
    }

    pub(crate) fn from_weak(inner: &Weak<FormInner>) -> Option<Self> {
        inner.upgrade().map(|inner| Form { inner })
    }

    pub(crate) fn downgrade(&self) -> Weak<FormInner> {
        Rc::downgrade(&self.inner)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // State access
    // ─────────────────────────────────────────────────────────────────────────

    /// Current state snapshot
    pub fn state(&self) -> FormState {
        self.inner.state.borrow().clone()
    }

    pub fn values(&self) -> FormValue {
        self.inner.state.borrow().values.clone()
    }

    pub fn errors(&self) -> FormValue {
        self.inner.state.borrow().errors.clone()
    }

    pub fn touched(&self) -> FormValue {
        self.inner.state.borrow().touched.clone()
    }

    /// Value at `path`, if defined
    pub fn value(&self, path: &str) -> Option<FormValue> {
        get_in(&self.inner.state.borrow().values, path).cloned()
    }

    pub fn initial_values(&self) -> FormValue {
        self.inner.initial.borrow().values.clone()
    }

    /// What [`reset_form`](Self::reset_form) returns to
    pub fn initial_state(&self) -> InitialState {
        self.inner.initial.borrow().clone()
    }

    pub fn options(&self) -> &FormOptions {
        &self.inner.options
    }

    /// Whether values differ from the initial values
    pub fn dirty(&self) -> bool {
        !deep_equal(&self.inner.initial.borrow().values, &self.inner.state.borrow().values)
    }

    /// Whether the errors tree holds no message
    pub fn is_valid(&self) -> bool {
        !has_leaves(&self.inner.state.borrow().errors)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Dispatch
    // ─────────────────────────────────────────────────────────────────────────

    /// Apply `action` and notify subscribers.
    ///
    /// Called from inside a subscriber, the state changes immediately but the
    /// notification runs after the current pass finishes.
    pub fn dispatch(&self, action: Action) {
        let name = action.name();
        {
            let mut state = self.inner.state.borrow_mut();
            let next = reduce(&state, action, self.inner.options.undefined_policy);
            *state = next;
        }
        tracing::debug!(action = name, "dispatched");
        self.notify();
    }

    fn notify(&self) {
        if self.inner.notifying.replace(true) {
            self.inner.notify_pending.set(true);
            return;
        }
        let _pass = NotifyPass(&self.inner.notifying);
        loop {
            self.inner.notify_pending.set(false);
            let snapshot = self.state();
            let invoked = self.inner.events.emit(STATE_CHANNEL, &snapshot);
            tracing::trace!(invoked, "state listeners notified");
            if !self.inner.notify_pending.get() {
                break;
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Set one value; validates if `validate_on_change` is set
    pub fn set_field_value(&self, path: &str, value: impl Into<FormValue>) {
        self.set_field_value_with(path, value, None);
    }

    /// Set one value, overriding `validate_on_change` when `validate` is `Some`
    pub fn set_field_value_with(&self, path: &str, value: impl Into<FormValue>, validate: Option<bool>) {
        self.dispatch(Action::SetFieldValue {
            path: path.to_string(),
            value: value.into(),
        });
        if validate.unwrap_or(self.inner.options.validate_on_change) {
            self.spawn_validation();
        }
    }

    /// Mark one field; validates if `validate_on_blur` is set
    pub fn set_field_touched(&self, path: &str, touched: bool) {
        self.set_field_touched_with(path, touched, None);
    }

    pub fn set_field_touched_with(&self, path: &str, touched: bool, validate: Option<bool>) {
        self.dispatch(Action::SetFieldTouched {
            path: path.to_string(),
            touched,
        });
        if validate.unwrap_or(self.inner.options.validate_on_blur) {
            self.spawn_validation();
        }
    }

    /// Set or clear (`None`) the message at `path`
    pub fn set_field_error(&self, path: &str, error: Option<String>) {
        self.dispatch(Action::SetFieldError {
            path: path.to_string(),
            error,
        });
    }

    /// Replace all values; validates if `validate_on_change` is set
    pub fn set_values(&self, values: impl Into<FormValue>) {
        self.dispatch(Action::SetValues(values.into()));
        if self.inner.options.validate_on_change {
            self.spawn_validation();
        }
    }

    /// Replace the touched tree; validates if `validate_on_blur` is set
    pub fn set_touched(&self, touched: impl Into<FormValue>) {
        self.dispatch(Action::SetTouched(touched.into()));
        if self.inner.options.validate_on_blur {
            self.spawn_validation();
        }
    }

    pub fn set_errors(&self, errors: impl Into<FormValue>) {
        self.dispatch(Action::SetErrors(errors.into()));
    }

    pub fn set_status(&self, status: Option<FormValue>) {
        self.dispatch(Action::SetStatus(status));
    }

    pub fn set_submitting(&self, submitting: bool) {
        self.dispatch(Action::SetSubmitting(submitting));
    }

    /// Replace the whole state in one transition
    pub fn set_form_state(&self, state: FormState) {
        self.dispatch(Action::SetFormState(Box::new(state)));
    }

    /// Derive the next state from the current one in one transition
    pub fn update_form_state(&self, update: impl FnOnce(&FormState) -> FormState) {
        let next = update(&self.inner.state.borrow());
        self.set_form_state(next);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reset
    // ─────────────────────────────────────────────────────────────────────────

    /// Return to the initial state
    pub fn reset_form(&self) {
        let initial = self.initial_state();
        self.apply_reset(initial);
    }

    /// Reset to `next`, which also becomes the new initial state
    pub fn reset_form_to(&self, next: InitialState) {
        *self.inner.initial.borrow_mut() = next.clone();
        self.apply_reset(next);
    }

    fn apply_reset(&self, next: InitialState) {
        // Results of runs started before the reset must not land afterwards
        self.inner.generations.borrow_mut().invalidate_all();
        self.dispatch(Action::ResetForm(Box::new(next)));
        self.inner.events.emit(RESET_CHANNEL, &self.state());
    }

    /// Adopt new initial values when reinitialization is enabled.
    ///
    /// Returns whether the form was reset.
    pub fn reinitialize(&self, values: impl Into<FormValue>) -> bool {
        let values = values.into();
        if !self.inner.options.enable_reinitialize {
            tracing::debug!("reinitialize ignored; enable_reinitialize is off");
            return false;
        }
        if deep_equal(&self.inner.initial.borrow().values, &values) {
            return false;
        }
        let current = self.initial_state();
        self.reset_form_to(InitialState {
            values,
            ..current
        });
        true
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Validation
    // ─────────────────────────────────────────────────────────────────────────

    /// Validate the current values against every source.
    ///
    /// Resolves to the merged errors of this run. They are written to state
    /// only if no newer form validation started meanwhile.
    pub fn validate_form(&self) -> LocalBoxFuture<'static, Result<FormValue>> {
        self.run_form_validation(&self.values())
    }

    pub(crate) fn run_form_validation(&self, values: &FormValue) -> LocalBoxFuture<'static, Result<FormValue>> {
        let ticket = self.inner.generations.borrow_mut().begin(Target::Form);
        self.dispatch(Action::ValidateAttempt);

        let options = self.inner.options;
        let run = run_validators(values, &self.validators(), options.precedence, options.fault_mode);
        let guard = RunGuard {
            form: self.downgrade(),
            ticket,
            finished: false,
        };
        async move {
            let result = run.await;
            guard.finish(result)
        }
        .boxed_local()
    }

    /// Validate a single field.
    ///
    /// Uses the field's registered validator, or the schema's message at
    /// `path` when the field has none. Resolves to the message, which is
    /// written to state only if no newer run for `path` started meanwhile.
    pub fn validate_field(&self, path: &str) -> LocalBoxFuture<'static, Result<Option<String>>> {
        let validator = self
            .inner
            .fields
            .borrow()
            .get(path)
            .map(|entry| entry.validator.clone());
        let run = run_field(
            &self.values(),
            path,
            validator.as_ref(),
            self.inner.schema.as_ref(),
            self.inner.options.fault_mode,
        );
        let Some(run) = run else {
            tracing::warn!(path, "no validator or schema for field; nothing to validate");
            return futures::future::ready(Ok(None)).boxed_local();
        };

        let ticket = self
            .inner
            .generations
            .borrow_mut()
            .begin(Target::Field(path.to_string()));
        let form = self.downgrade();
        let path = path.to_string();
        async move {
            let result = run.await;
            if let (Some(form), Ok(message)) = (Form::from_weak(&form), &result) {
                if form.inner.generations.borrow().is_current(&ticket) {
                    form.set_field_error(&path, message.clone());
                } else {
                    tracing::debug!(path, generation = ticket.generation, "discarding stale field validation");
                }
            }
            result
        }
        .boxed_local()
    }

    fn validators(&self) -> Validators {
        Validators {
            fields: self
                .inner
                .fields
                .borrow()
                .iter()
                .map(|(path, entry)| (path.clone(), entry.validator.clone()))
                .collect(),
            form: self.inner.validate.clone(),
            schema: self.inner.schema.clone(),
        }
    }

    /// Run form validation in the background
    pub(crate) fn spawn_validation(&self) {
        let run = self.validate_form();
        self.inner.spawner.spawn_local(
            async move {
                if let Err(err) = run.await {
                    tracing::warn!(error = %err, "background validation failed");
                }
            }
            .boxed_local(),
        );
    }

    /// Drive the internal task pool until every background task is blocked.
    ///
    /// Does nothing when the form was built with a custom spawner.
    pub fn run_until_stalled(&self) {
        if let Some(pool) = &self.inner.pool {
            pool.run_until_stalled();
        }
    }

    pub(crate) fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        self.inner.spawner.spawn_local(task);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Fields
    // ─────────────────────────────────────────────────────────────────────────

    /// Register a validator for `path`.
    ///
    /// Replaces any validator already registered there. Dropping the
    /// returned registration removes it again.
    pub fn register_field(&self, path: &str, validator: FieldValidator) -> FieldRegistration {
        let id = self.inner.next_field_id.get();
        self.inner.next_field_id.set(id + 1);
        self.inner
            .fields
            .borrow_mut()
            .insert(path.to_string(), FieldEntry { id, validator });
        tracing::debug!(path, "field registered");
        FieldRegistration {
            form: self.downgrade(),
            path: path.to_string(),
            id,
        }
    }

    /// Remove the validator for `path`, whoever registered it
    pub fn unregister_field(&self, path: &str) {
        if self.inner.fields.borrow_mut().shift_remove(path).is_some() {
            tracing::debug!(path, "field unregistered");
        }
    }

    /// Paths with a registered validator, in registration order
    pub fn registered_fields(&self) -> Vec<String> {
        self.inner.fields.borrow().keys().cloned().collect()
    }

    /// Binding for the field at `path`
    pub fn field(&self, path: &str) -> Field {
        Field::new(self, path)
    }

    /// Sequence helpers for the list at `path`
    pub fn array(&self, path: &str) -> ArrayHelpers {
        ArrayHelpers::new(self, path)
    }

    /// Set the value named by a change event
    pub fn handle_change(&self, event: &ChangeEvent) {
        let Some(path) = event.target() else {
            tracing::warn!(?event, "change event has neither name nor id; ignoring");
            return;
        };
        let current = self.value(path).unwrap_or_default();
        self.set_field_value(path, event.extract(&current));
    }

    /// Mark the field named by a blur event as touched
    pub fn handle_blur(&self, event: &BlurEvent) {
        let Some(path) = event.target() else {
            tracing::warn!(?event, "blur event has neither name nor id; ignoring");
            return;
        };
        self.set_field_touched(path, true);
    }

    /// Submit in the background, logging failures
    pub fn handle_submit(&self) {
        let run = self.submit_form();
        self.spawn(
            async move {
                if let Err(err) = run.await {
                    tracing::warn!(error = %err, "submit failed");
                }
            }
            .boxed_local(),
        );
    }

    pub fn handle_reset(&self) {
        self.reset_form();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Subscriptions
    // ─────────────────────────────────────────────────────────────────────────

    /// Call `callback` whenever the slice chosen by `selector` changes
    pub fn subscribe<S, Sel, F>(&self, selector: Sel, callback: F) -> SubscriptionHandle
    where
        S: PartialEq + 'static,
        Sel: Fn(&FormState) -> S + 'static,
        F: Fn(&S) + 'static,
    {
        self.subscribe_with(selector, default_comparer(), callback, ListenerOptions::default())
    }

    /// [`subscribe`](Self::subscribe) with a custom comparer and priority.
    ///
    /// `comparer` returns `true` when two slices are equal.
    pub fn subscribe_with<S, Sel, C, F>(
        &self,
        selector: Sel,
        comparer: C,
        callback: F,
        options: ListenerOptions,
    ) -> SubscriptionHandle
    where
        S: 'static,
        Sel: Fn(&FormState) -> S + 'static,
        C: Fn(&S, &S) -> bool + 'static,
        F: Fn(&S) + 'static,
    {
        let watcher = SliceWatcher::new(
            &self.inner.state.borrow(),
            Box::new(selector),
            Box::new(comparer),
            Box::new(callback),
        );
        self.inner.events.on(
            STATE_CHANNEL,
            move |state: &FormState| {
                watcher.observe(state);
            },
            options,
        )
    }

    /// Listen on a raw channel (`state`, `reset`, `submit`)
    pub fn on<F>(&self, channel: &str, listener: F, options: ListenerOptions) -> SubscriptionHandle
    where
        F: Fn(&FormState) + 'static,
    {
        self.inner.events.on(channel, listener, options)
    }

    /// Number of listeners on `channel`
    pub fn listener_count(&self, channel: &str) -> usize {
        self.inner.events.listener_count(channel)
    }
}

impl fmt::Debug for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Form")
            .field("state", &*self.inner.state.borrow())
            .field("fields", &self.inner.fields.borrow().len())
            .field("events", &self.inner.events)
            .finish_non_exhaustive()
    }
}

/// Clears the re-entrancy flag when a notification pass ends, even by panic
struct NotifyPass<'a>(&'a Cell<bool>);

impl Drop for NotifyPass<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Applies a form validation result if the run is still current, and
/// releases `is_validating` if the run is dropped unfinished.
struct RunGuard {
    form: Weak<FormInner>,
    ticket: RunTicket,
    finished: bool,
}

impl RunGuard {
    fn finish(mut self, result: Result<FormValue>) -> Result<FormValue> {
        self.finished = true;
        let Some(form) = Form::from_weak(&self.form) else {
            return result;
        };
        if !form.inner.generations.borrow().is_current(&self.ticket) {
            tracing::debug!(generation = self.ticket.generation, "discarding stale validation result");
            return result;
        }
        match &result {
            Ok(errors) if has_leaves(errors) => form.dispatch(Action::ValidateFailure(errors.clone())),
            Ok(_) => form.dispatch(Action::ValidateSuccess),
            Err(_) => form.dispatch(Action::SetValidating(false)),
        }
        result
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Some(form) = Form::from_weak(&self.form) {
            if form.inner.generations.borrow().is_current(&self.ticket) {
                form.dispatch(Action::SetValidating(false));
            }
        }
    }
}

/// Keeps a field validator registered
#[must_use = "dropping a FieldRegistration unregisters the validator"]
pub struct FieldRegistration {
    form: Weak<FormInner>,
    path: String,
    id: u64,
}

impl FieldRegistration {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Unregister now
    pub fn unregister(self) {}
}

impl Drop for FieldRegistration {
    fn drop(&mut self) {
        let Some(inner) = self.form.upgrade() else {
            return;
        };
        let mut fields = inner.fields.borrow_mut();
        // A later registration for the same path replaced ours
        if fields.get(&self.path).is_some_and(|entry| entry.id == self.id) {
            fields.shift_remove(&self.path);
            tracing::debug!(path = %self.path, "field unregistered");
        }
    }
}

impl fmt::Debug for FieldRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldRegistration")
            .field("path", &self.path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ListenerOptions;
    use pollster::block_on;
    use serde_json::json;
    use std::cell::Cell;

    fn required(value: &FormValue) -> Option<String> {
        match value.as_str() {
            Some(s) if !s.is_empty() => None,
            _ => Some("Required".to_string()),
        }
    }

    #[test]
    fn test_dispatch_notifies_after_swap() {
        let form = FormConfig::new(json!({ "a": "" })).build();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let log = seen.clone();
        let reader = form.clone();
        let _sub = form.on(
            STATE_CHANNEL,
            move |state| {
                // The handle already reports the state being delivered
                assert_eq!(reader.state(), *state);
                log.borrow_mut().push(state.value("a").cloned());
            },
            ListenerOptions::default(),
        );

        form.set_field_value_with("a", "x", Some(false));
        assert_eq!(*seen.borrow(), vec![Some(FormValue::from("x"))]);
    }

    #[test]
    fn test_nested_dispatch_is_deferred() {
        let form = FormConfig::new(json!({ "a": "", "b": "" }))
            .validate_on_change(false)
            .build();
        let order = Rc::new(RefCell::new(Vec::new()));

        let log = order.clone();
        let inner = form.clone();
        let _first = form.on(
            STATE_CHANNEL,
            move |state| {
                log.borrow_mut().push(format!("first:{}", state.values));
                if state.value("b").and_then(FormValue::as_str) == Some("") {
                    inner.set_field_value("b", "mirrored");
                }
            },
            ListenerOptions::default(),
        );
        let log = order.clone();
        let _second = form.on(
            STATE_CHANNEL,
            move |state| log.borrow_mut().push(format!("second:{}", state.values)),
            ListenerOptions::default(),
        );

        form.set_field_value("a", "x");

        // The first pass completes with the state it started with
        assert_eq!(
            *order.borrow(),
            vec![
                r#"first:{"a":"x","b":""}"#,
                r#"second:{"a":"x","b":""}"#,
                r#"first:{"a":"x","b":"mirrored"}"#,
                r#"second:{"a":"x","b":"mirrored"}"#,
            ]
        );
    }

    #[test]
    fn test_background_validation_on_change() {
        let form = FormConfig::new(json!({ "email": "" })).build();
        let _reg = form.register_field("email", FieldValidator::new(required));

        form.set_field_value("email", "");
        assert!(form.state().is_validating);
        form.run_until_stalled();

        let state = form.state();
        assert!(!state.is_validating);
        assert_eq!(state.error("email"), Some("Required"));

        form.set_field_value("email", "a@b.c");
        form.run_until_stalled();
        assert!(form.is_valid());
    }

    #[test]
    fn test_validate_on_blur_toggle() {
        let form = FormConfig::new(json!({ "email": "" }))
            .validate_on_blur(false)
            .build();
        let _reg = form.register_field("email", FieldValidator::new(required));

        form.set_field_touched("email", true);
        form.run_until_stalled();
        assert!(form.is_valid());

        form.set_field_touched_with("email", true, Some(true));
        form.run_until_stalled();
        assert!(!form.is_valid());
    }

    #[test]
    fn test_validate_on_mount() {
        let form = FormConfig::new(json!({ "name": "" }))
            .validate(FormValidator::new(|values| {
                if required(values.get("name").unwrap_or(&FormValue::Undefined)).is_some() {
                    FormValue::from(json!({ "name": "Required" }))
                } else {
                    FormValue::map()
                }
            }))
            .validate_on_mount(true)
            .build();

        form.run_until_stalled();
        assert_eq!(form.state().error("name"), Some("Required"));
    }

    #[test]
    fn test_validate_field_uses_registered_validator() {
        let form = FormConfig::new(json!({ "email": "" })).build();
        let _reg = form.register_field("email", FieldValidator::new(required));

        let message = block_on(form.validate_field("email")).unwrap();
        assert_eq!(message.as_deref(), Some("Required"));
        assert_eq!(form.state().error("email"), Some("Required"));

        assert_eq!(block_on(form.validate_field("unknown")).unwrap(), None);
    }

    #[test]
    fn test_field_registration_drop_unregisters() {
        let form = FormConfig::new(json!({ "a": "" })).build();
        let first = form.register_field("a", FieldValidator::new(required));
        let second = form.register_field("a", FieldValidator::new(|_| None));

        // The replaced registration must not remove its successor
        drop(first);
        assert_eq!(form.registered_fields(), vec!["a".to_string()]);

        second.unregister();
        assert!(form.registered_fields().is_empty());
    }

    #[test]
    fn test_reset_and_dirty() {
        let form = FormConfig::new(json!({ "a": "x" }))
            .initial_status("fresh")
            .validate_on_change(false)
            .build();
        let resets = Rc::new(Cell::new(0));
        let counter = resets.clone();
        let _on_reset = form.on(
            RESET_CHANNEL,
            move |_| counter.set(counter.get() + 1),
            ListenerOptions::default(),
        );

        form.set_field_value("a", "y");
        form.set_status(Some("edited".into()));
        assert!(form.dirty());

        form.reset_form();
        assert!(!form.dirty());
        assert_eq!(form.state().status, Some(FormValue::from("fresh")));
        assert_eq!(resets.get(), 1);

        form.reset_form_to(InitialState::new(FormValue::from(json!({ "a": "z" }))));
        assert_eq!(form.initial_values(), FormValue::from(json!({ "a": "z" })));
        assert!(!form.dirty());
    }

    #[test]
    fn test_reset_discards_in_flight_validation() {
        let form = FormConfig::new(json!({ "a": "" })).build();
        let _reg = form.register_field("a", FieldValidator::new(required));

        form.set_field_value("a", "");
        form.reset_form();
        form.run_until_stalled();

        assert!(form.is_valid());
        assert!(!form.state().is_validating);
    }

    #[test]
    fn test_reinitialize() {
        let form = FormConfig::new(json!({ "a": 1 })).build();
        assert!(!form.reinitialize(json!({ "a": 2 })));
        assert_eq!(form.values(), FormValue::from(json!({ "a": 1 })));

        let form = FormConfig::new(json!({ "a": 1 }))
            .enable_reinitialize(true)
            .build();
        assert!(!form.reinitialize(json!({ "a": 1 })));
        assert!(form.reinitialize(json!({ "a": 2 })));
        assert_eq!(form.values(), FormValue::from(json!({ "a": 2 })));
        assert_eq!(form.initial_values(), FormValue::from(json!({ "a": 2 })));
    }

    #[test]
    fn test_dropped_run_releases_validating() {
        let form = FormConfig::new(json!({ "a": "" })).build();
        let run = form.validate_form();
        assert!(form.state().is_validating);

        drop(run);
        assert!(!form.state().is_validating);
    }

    #[test]
    fn test_unsubscribed_callback_never_runs() {
        let form = FormConfig::new(json!({ "a": "" }))
            .validate_on_change(false)
            .build();
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        let handle = form.subscribe(|s| s.values.clone(), move |_| counter.set(counter.get() + 1));

        form.set_field_value("a", "1");
        handle.unsubscribe();
        form.set_field_value("a", "2");

        assert_eq!(hits.get(), 1);
        assert_eq!(form.listener_count(STATE_CHANNEL), 0);
    }
}
