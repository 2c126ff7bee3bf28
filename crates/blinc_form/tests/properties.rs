//! End-to-end behaviour of the form engine through its public API

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use blinc_form::{
    get_in, FieldValidator, Form, FormConfig, FormError, FormValidator, FormValue, SchemaIssue,
    SchemaRejection, SubmitOutcome, ValidationSchema,
};
use futures::channel::oneshot;
use futures::future::{FutureExt, LocalBoxFuture};
use pollster::block_on;
use serde_json::json;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn required(value: &FormValue) -> Option<String> {
    match value.as_str() {
        Some(s) if !s.is_empty() => None,
        _ => Some("Required".to_string()),
    }
}

/// Schema requiring every listed field to be present after preparation
struct RequiredFields(&'static [&'static str]);

impl ValidationSchema for RequiredFields {
    fn validate(&self, values: &FormValue) -> LocalBoxFuture<'static, Result<(), SchemaRejection>> {
        let issues: Vec<_> = self
            .0
            .iter()
            .filter(|field| get_in(values, field).is_none())
            .map(|field| SchemaIssue::new(*field, "Required"))
            .collect();
        async move {
            if issues.is_empty() {
                Ok(())
            } else {
                Err(SchemaRejection::Invalid(issues))
            }
        }
        .boxed_local()
    }
}

#[test]
fn stale_validation_result_is_discarded() {
    init_tracing();
    let gates: Rc<RefCell<VecDeque<oneshot::Receiver<()>>>> = Rc::default();

    let queue = gates.clone();
    let form = FormConfig::new(json!({ "name": "" }))
        .validate_on_change(false)
        .validate(FormValidator::future(move |values: &FormValue| {
            let label = values.get("name").cloned().unwrap_or_default().to_string();
            let gate = queue.borrow_mut().pop_front();
            async move {
                if let Some(gate) = gate {
                    let _ = gate.await;
                }
                Ok(FormValue::from_pairs([("name", format!("from {}", label))]))
            }
        }))
        .build();

    let (release_a, gate_a) = oneshot::channel();
    let (release_b, gate_b) = oneshot::channel();
    gates.borrow_mut().extend([gate_a, gate_b]);

    form.set_field_value("name", "A");
    let run_a = form.validate_form();
    form.set_field_value("name", "B");
    let run_b = form.validate_form();

    release_b.send(()).unwrap();
    let errors_b = block_on(run_b).unwrap();
    assert_eq!(form.state().error("name"), Some("from B"));
    assert!(!form.state().is_validating);

    release_a.send(()).unwrap();
    let errors_a = block_on(run_a).unwrap();
    assert_eq!(errors_a, FormValue::from(json!({ "name": "from A" })));

    // A finished last but started first: state keeps B's result
    assert_eq!(form.errors(), errors_b);
    assert_eq!(form.state().error("name"), Some("from B"));
}

#[test]
fn only_changed_selectors_are_notified() {
    init_tracing();
    let count = 500;
    let initial: serde_json::Map<String, serde_json::Value> =
        (0..count).map(|i| (format!("f{}", i), json!(""))).collect();
    let form = FormConfig::new(serde_json::Value::Object(initial))
        .validate_on_change(false)
        .build();

    let hits: Rc<Vec<Cell<u32>>> = Rc::new((0..count).map(|_| Cell::new(0)).collect());
    let _subs: Vec<_> = (0..count)
        .map(|i| {
            let path = format!("f{}", i);
            let hits = hits.clone();
            form.subscribe(
                move |state| state.value(&path).cloned(),
                move |_| hits[i].set(hits[i].get() + 1),
            )
        })
        .collect();

    form.set_field_value("f42", "changed");

    for (i, hit) in hits.iter().enumerate() {
        let expected = u32::from(i == 42);
        assert_eq!(hit.get(), expected, "subscriber {}", i);
    }

    // Touching a field changes no value: nobody hears about it
    form.set_field_touched_with("f7", true, Some(false));
    assert_eq!(hits.iter().map(Cell::get).sum::<u32>(), 1);
}

#[test]
fn submit_touches_all_and_blocks_on_errors() {
    init_tracing();
    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    let form = FormConfig::new(json!({
        "email": "",
        "address": { "city": "", "zip": "" },
        "tags": ["a", "b"],
    }))
    .on_submit(move |_, _| {
        counter.set(counter.get() + 1);
        async { Ok(()) }
    })
    .build();
    let _email = form.register_field("email", FieldValidator::new(required));

    let outcome = block_on(form.submit_form()).unwrap();
    assert!(matches!(outcome, SubmitOutcome::Invalid(_)));
    assert_eq!(calls.get(), 0);

    let state = form.state();
    for path in ["email", "address.city", "address.zip", "tags.0", "tags.1"] {
        assert!(state.is_touched(path), "{} should be touched", path);
    }
    assert_eq!(state.submit_count, 1);
    assert!(!state.is_submitting);
}

#[test]
fn handler_error_releases_submitting_flag() {
    init_tracing();
    let form = FormConfig::new(json!({ "name": "ok" }))
        .on_submit(|_, _| async { Err(anyhow::anyhow!("server unavailable")) })
        .build();

    let result = block_on(form.submit_form());
    match result {
        Err(FormError::Submit(err)) => assert_eq!(err.to_string(), "server unavailable"),
        other => panic!("expected submit error, got {:?}", other),
    }

    let state = form.state();
    assert!(!state.is_submitting);
    assert_eq!(state.submit_count, 1);

    // The form accepts another attempt
    assert!(block_on(form.submit_form()).is_err());
    assert_eq!(form.state().submit_count, 2);
}

#[test]
fn login_form_with_required_schema() {
    init_tracing();
    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    let form = FormConfig::new(json!({ "username": "", "password": "" }))
        .validation_schema(RequiredFields(&["username", "password"]))
        .on_submit(move |_, _| {
            counter.set(counter.get() + 1);
            async { Ok(()) }
        })
        .build();

    let outcome = block_on(form.submit_form()).unwrap();

    let state = form.state();
    assert_eq!(
        state.touched,
        FormValue::from(json!({ "username": true, "password": true }))
    );
    assert_eq!(
        state.errors,
        FormValue::from(json!({ "username": "Required", "password": "Required" }))
    );
    assert_eq!(outcome, SubmitOutcome::Invalid(state.errors.clone()));
    assert!(!state.is_submitting);
    assert_eq!(calls.get(), 0);

    form.set_field_value("username", "ian");
    form.set_field_value("password", "hunter2");
    assert_eq!(block_on(form.submit_form()).unwrap(), SubmitOutcome::Submitted);
    assert_eq!(calls.get(), 1);
    assert!(form.is_valid());
}

#[test]
fn nested_update_shares_untouched_siblings() {
    let form = FormConfig::new(json!({
        "friends": [{ "name": "A" }, { "name": "B" }],
        "owner": { "name": "C" },
    }))
    .validate_on_change(false)
    .build();

    let before = form.values();
    form.set_field_value("friends.1.name", "Ian");
    let after = form.values();

    let first = |tree: &FormValue| get_in(tree, "friends.0").cloned().unwrap();
    assert!(first(&before).ptr_eq(&first(&after)));
    assert!(get_in(&before, "owner").unwrap().ptr_eq(get_in(&after, "owner").unwrap()));
    assert_eq!(get_in(&after, "friends.1.name"), Some(&FormValue::from("Ian")));
    assert_eq!(get_in(&before, "friends.1.name"), Some(&FormValue::from("B")));
}

#[test]
fn async_field_validator_runs_on_internal_pool() {
    init_tracing();
    let form = FormConfig::new(json!({ "username": "" })).build();
    let (release, gate) = oneshot::channel::<()>();
    let gate = RefCell::new(Some(gate));
    let _reg = form.register_field(
        "username",
        FieldValidator::future(move |value: &FormValue| {
            let taken = value.as_str() == Some("admin");
            let gate = gate.borrow_mut().take();
            async move {
                if let Some(gate) = gate {
                    let _ = gate.await;
                }
                Ok(taken.then(|| "Username taken".to_string()))
            }
        }),
    );

    form.set_field_value("username", "admin");
    form.run_until_stalled();
    assert!(form.state().is_validating);

    release.send(()).unwrap();
    form.run_until_stalled();
    let state = form.state();
    assert!(!state.is_validating);
    assert_eq!(state.error("username"), Some("Username taken"));
}

#[test]
fn whole_form_validator_and_field_errors_merge() {
    let form: Form = FormConfig::new(json!({ "password": "abc", "confirm": "abd" }))
        .validate(FormValidator::new(|values| {
            if values.get("password") != values.get("confirm") {
                FormValue::from(json!({ "confirm": "Passwords must match" }))
            } else {
                FormValue::map()
            }
        }))
        .build();
    let _reg = form.register_field(
        "password",
        FieldValidator::new(|v| {
            v.as_str()
                .filter(|s| s.len() < 8)
                .map(|_| "Too short".to_string())
        }),
    );

    let errors = block_on(form.validate_form()).unwrap();
    assert_eq!(
        errors,
        FormValue::from(json!({ "password": "Too short", "confirm": "Passwords must match" }))
    );
    assert_eq!(form.errors(), errors);
}

#[cfg(feature = "tokio")]
#[tokio::test]
async fn tokio_spawner_runs_background_validation() {
    use blinc_form::TokioSpawner;

    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let form = FormConfig::new(json!({ "email": "" }))
                .spawner(TokioSpawner)
                .build();
            let _reg = form.register_field("email", FieldValidator::new(required));

            form.set_field_value("email", "");
            for _ in 0..8 {
                if !form.state().is_validating {
                    break;
                }
                tokio::task::yield_now().await;
            }

            assert!(!form.state().is_validating);
            assert_eq!(form.state().error("email"), Some("Required"));
        })
        .await;
}
