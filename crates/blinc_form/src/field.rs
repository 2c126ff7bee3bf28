//! Field bindings and change extraction
//!
//! A [`Field`] is a lightweight handle bound to one path of a form. It
//! reads the field's slice of state, writes through the form's mutations,
//! and can subscribe to just its own slice.
//!
//! [`ChangeEvent`] carries what an input widget reports when it changes;
//! [`ChangeEvent::extract`] turns that into the value to store, according
//! to the input kind.
//!
//! # Example
//!
//! ```rust
//! use blinc_form::field::ChangeEvent;
//! use blinc_form::{FormConfig, FormValue};
//! use serde_json::json;
//!
//! let form = FormConfig::new(json!({ "age": 0, "toppings": ["cheese"] })).build();
//!
//! form.handle_change(&ChangeEvent::number("age", "42"));
//! form.handle_change(&ChangeEvent::checkbox("toppings", "olives", true));
//!
//! assert_eq!(form.value("age"), Some(FormValue::from(42)));
//! assert_eq!(form.value("toppings"), Some(FormValue::from(vec!["cheese", "olives"])));
//! ```

use std::rc::Weak;

use crate::events::{ListenerOptions, SubscriptionHandle};
use crate::path::get_in;
use crate::state::{FormState, InitialState};
use crate::store::{FieldRegistration, Form, FormInner};
use crate::validation::FieldValidator;
use crate::value::FormValue;

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

/// Kind of input that produced a change
#[derive(Clone, Debug, PartialEq)]
pub enum InputKind {
    Text,
    /// Parsed from the leading numeric text (`"12px"` reads as 12);
    /// anything else, including infinities, stores an empty string
    Number,
    /// Boolean toggle, or membership toggle when the field holds a list
    Checkbox { checked: bool },
    /// Every currently selected option
    SelectMultiple(Vec<String>),
}

/// Change reported by an input
#[derive(Clone, Debug, PartialEq)]
pub struct ChangeEvent {
    pub name: Option<String>,
    pub id: Option<String>,
    pub value: String,
    pub kind: InputKind,
}

impl ChangeEvent {
    fn named(name: impl Into<String>, value: impl Into<String>, kind: InputKind) -> Self {
        Self {
            name: Some(name.into()),
            id: None,
            value: value.into(),
            kind,
        }
    }

    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::named(name, value, InputKind::Text)
    }

    pub fn number(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::named(name, value, InputKind::Number)
    }

    pub fn checkbox(name: impl Into<String>, value: impl Into<String>, checked: bool) -> Self {
        Self::named(name, value, InputKind::Checkbox { checked })
    }

    pub fn select_multiple(name: impl Into<String>, selected: Vec<String>) -> Self {
        Self::named(name, String::new(), InputKind::SelectMultiple(selected))
    }

    /// Identify the input by id instead of name
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Path this event addresses: the name, or the id when the name is empty
    pub fn target(&self) -> Option<&str> {
        target_of(self.name.as_deref(), self.id.as_deref())
    }

    /// Value to store given the field's current value
    pub fn extract(&self, current: &FormValue) -> FormValue {
        match &self.kind {
            InputKind::Text => self.value.as_str().into(),
            InputKind::Number => match leading_number(&self.value) {
                Some(n) => n.into(),
                None => "".into(),
            },
            InputKind::Checkbox { checked } => checkbox_value(current, &self.value, *checked),
            InputKind::SelectMultiple(selected) => FormValue::from(selected.clone()),
        }
    }
}

/// Blur reported by an input
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlurEvent {
    pub name: Option<String>,
    pub id: Option<String>,
}

impl BlurEvent {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn target(&self) -> Option<&str> {
        target_of(self.name.as_deref(), self.id.as_deref())
    }
}

/// Longest decimal prefix of `text` as a finite number
fn leading_number(text: &str) -> Option<f64> {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let digits = |from: usize| bytes[from..].iter().take_while(|b| b.is_ascii_digit()).count();

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let whole = digits(end);
    end += whole;
    let mut fraction = 0;
    if bytes.get(end) == Some(&b'.') {
        fraction = digits(end + 1);
        if fraction > 0 {
            end += 1 + fraction;
        }
    }
    if whole + fraction == 0 {
        return None;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let sign = usize::from(matches!(bytes.get(end + 1), Some(b'+' | b'-')));
        let exponent = digits(end + 1 + sign);
        if exponent > 0 {
            end += 1 + sign + exponent;
        }
    }
    text[..end].parse::<f64>().ok().filter(|n| n.is_finite())
}

fn target_of<'a>(name: Option<&'a str>, id: Option<&'a str>) -> Option<&'a str> {
    name.filter(|n| !n.is_empty())
        .or(id.filter(|i| !i.is_empty()))
}

/// Checkbox semantics:
/// - a boolean field, or a checkbox without a meaningful value, stores `checked`
/// - a list field gains or loses `value` as the box is checked or cleared
fn checkbox_value(current: &FormValue, value: &str, checked: bool) -> FormValue {
    if matches!(current, FormValue::Bool(_)) {
        return checked.into();
    }
    let Some(list) = current.as_list() else {
        if value.is_empty() || value == "true" || value == "false" {
            return checked.into();
        }
        return if checked {
            FormValue::from(vec![value])
        } else {
            FormValue::list()
        };
    };

    let position = list.iter().position(|item| item.as_str() == Some(value));
    match (checked, position) {
        (true, None) if !value.is_empty() => {
            let mut next = list.to_vec();
            next.push(value.into());
            FormValue::from(next)
        }
        (false, Some(index)) => {
            let mut next = list.to_vec();
            next.remove(index);
            FormValue::from(next)
        }
        _ => current.clone(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Field binding
// ─────────────────────────────────────────────────────────────────────────────

/// Everything a field widget needs to render
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldMeta {
    pub value: FormValue,
    pub error: Option<String>,
    pub touched: bool,
    pub initial_value: FormValue,
    pub initial_error: Option<String>,
    pub initial_touched: bool,
}

impl FieldMeta {
    fn read(state: &FormState, initial: &InitialState, path: &str) -> Self {
        Self {
            value: state.value(path).cloned().unwrap_or_default(),
            error: state.error(path).map(str::to_string),
            touched: state.is_touched(path),
            initial_value: get_in(&initial.values, path).cloned().unwrap_or_default(),
            initial_error: get_in(&initial.errors, path)
                .and_then(FormValue::as_str)
                .map(str::to_string),
            initial_touched: get_in(&initial.touched, path).is_some_and(FormValue::is_truthy),
        }
    }
}

/// Handle bound to one path of a form.
///
/// Holds the form weakly; using a field after its form is dropped panics.
#[derive(Clone, Debug)]
pub struct Field {
    form: Weak<FormInner>,
    path: String,
}

impl Field {
    pub(crate) fn new(form: &Form, path: &str) -> Self {
        Self {
            form: form.downgrade(),
            path: path.to_string(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn form(&self) -> Form {
        match Form::from_weak(&self.form) {
            Some(form) => form,
            None => panic!("field `{}` used after its form was dropped", self.path),
        }
    }

    pub fn value(&self) -> FormValue {
        self.form().value(&self.path).unwrap_or_default()
    }

    pub fn meta(&self) -> FieldMeta {
        let form = self.form();
        let state = form.inner.state.borrow();
        let initial = form.inner.initial.borrow();
        FieldMeta::read(&state, &initial, &self.path)
    }

    pub fn set_value(&self, value: impl Into<FormValue>) {
        self.form().set_field_value(&self.path, value);
    }

    pub fn set_touched(&self, touched: bool) {
        self.form().set_field_touched(&self.path, touched);
    }

    pub fn set_error(&self, error: Option<String>) {
        self.form().set_field_error(&self.path, error);
    }

    /// Store the value carried by `event`, whatever name it reports
    pub fn handle_change(&self, event: &ChangeEvent) {
        let form = self.form();
        let current = form.value(&self.path).unwrap_or_default();
        form.set_field_value(&self.path, event.extract(&current));
    }

    pub fn handle_blur(&self) {
        self.set_touched(true);
    }

    /// Register a validator for this field
    pub fn register(&self, validator: FieldValidator) -> FieldRegistration {
        self.form().register_field(&self.path, validator)
    }

    /// Call `callback` whenever this field's meta changes
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn(&FieldMeta) + 'static,
    {
        let form = self.form();
        let inner = self.form.clone();
        let path = self.path.clone();
        form.subscribe_with(
            move |state: &FormState| match inner.upgrade() {
                Some(inner) => FieldMeta::read(state, &inner.initial.borrow(), &path),
                None => FieldMeta::default(),
            },
            |prev: &FieldMeta, next: &FieldMeta| prev == next,
            callback,
            ListenerOptions::default(),
        )
    }
}
