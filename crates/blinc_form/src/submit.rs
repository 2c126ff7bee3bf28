//! Submission lifecycle
//!
//! ```text
//! Idle ─▶ TouchingAll ─▶ Validating ─┬─▶ Invalid ─────▶ Idle
//!                                    └─▶ Submitting ──▶ Idle
//! ```
//!
//! A submit marks every field touched, validates, and only calls the submit
//! handler when no error message remains. `is_submitting` is released on
//! every exit path, including the submit future being dropped mid-flight.

use std::rc::Weak;

use futures::future::{FutureExt, LocalBoxFuture};

use crate::error::{FormError, Result};
use crate::events::SUBMIT_CHANNEL;
use crate::state::Action;
use crate::store::{Form, FormInner};
use crate::tree::{has_leaves, leaf_paths, merge_trees, touch_all};
use crate::value::FormValue;

/// Where a submission currently is
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SubmitPhase {
    #[default]
    Idle,
    TouchingAll,
    Validating,
    Invalid,
    Submitting,
}

/// How a submit call ended
#[derive(Clone, Debug, PartialEq)]
pub enum SubmitOutcome {
    /// Validation passed and the handler completed
    Submitted,
    /// Validation found errors; the handler was not called
    Invalid(FormValue),
    /// Another submit was already in flight
    Ignored,
}

/// Ends a submission exactly once
struct SubmitGuard {
    form: Weak<FormInner>,
    finished: bool,
}

impl SubmitGuard {
    fn begin(form: &Form) -> Self {
        // Leave Idle before SubmitAttempt notifies observers
        form.set_phase(SubmitPhase::TouchingAll);
        form.dispatch(Action::SubmitAttempt);
        Self {
            form: form.downgrade(),
            finished: false,
        }
    }

    fn finish(mut self, action: Action) {
        self.finished = true;
        if let Some(form) = Form::from_weak(&self.form) {
            form.dispatch(action);
            form.set_phase(SubmitPhase::Idle);
        }
    }
}

impl Drop for SubmitGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Some(form) = Form::from_weak(&self.form) {
            tracing::debug!("submission abandoned; releasing is_submitting");
            form.dispatch(Action::SubmitFailure);
            form.set_phase(SubmitPhase::Idle);
        }
    }
}

impl Form {
    /// Current submission phase
    pub fn submit_phase(&self) -> SubmitPhase {
        self.inner.submit_phase.get()
    }

    fn set_phase(&self, phase: SubmitPhase) {
        tracing::trace!(?phase, "submit phase");
        self.inner.submit_phase.set(phase);
    }

    /// Touch every field, validate, and call the submit handler if valid.
    ///
    /// The submission starts immediately (`submit_count` and
    /// `is_submitting` change before this returns); a call made while a
    /// submission is in flight resolves to [`SubmitOutcome::Ignored`].
    ///
    /// The returned future only holds a weak handle to the form. If the form
    /// is dropped before validation completes it resolves to
    /// [`SubmitOutcome::Ignored`] without calling the handler.
    ///
    /// Handler failures resolve to [`FormError::Submit`]. With strict fault
    /// mode, validator failures resolve to [`FormError::Validator`].
    pub fn submit_form(&self) -> LocalBoxFuture<'static, Result<SubmitOutcome>> {
        if self.submit_phase() != SubmitPhase::Idle {
            tracing::debug!("submit already in flight; ignoring");
            return futures::future::ready(Ok(SubmitOutcome::Ignored)).boxed_local();
        }
        let Some(handler) = self.inner.on_submit.clone() else {
            return futures::future::ready(Err(FormError::MissingSubmitHandler)).boxed_local();
        };

        let guard = SubmitGuard::begin(self);

        let touched = merge_trees(&touch_all(&self.values()), &self.touched());
        self.dispatch(Action::SetTouched(touched));

        self.set_phase(SubmitPhase::Validating);
        let validation = self.run_form_validation(&self.values());
        let weak = self.downgrade();

        async move {
            let errors = validation.await?;
            let Some(form) = Form::from_weak(&weak) else {
                return Ok(SubmitOutcome::Ignored);
            };
            if has_leaves(&errors) {
                tracing::debug!(
                    fields = ?leaf_paths(&errors),
                    "submit blocked by validation errors"
                );
                form.set_phase(SubmitPhase::Invalid);
                guard.finish(Action::SubmitFailure);
                return Ok(SubmitOutcome::Invalid(errors));
            }

            form.set_phase(SubmitPhase::Submitting);
            let state = form.state();
            form.inner.events.emit(SUBMIT_CHANNEL, &state);

            let pending = handler(state.values, form.clone());
            drop(form);
            let result = pending.await;
            guard.finish(Action::SubmitSuccess);
            match result {
                Ok(()) => Ok(SubmitOutcome::Submitted),
                Err(err) => {
                    tracing::warn!(error = %format!("{:#}", err), "submit handler failed");
                    Err(FormError::Submit(err))
                }
            }
        }
        .boxed_local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FormConfig;
    use crate::validation::{FaultMode, FieldValidator, FormValidator};
    use futures::channel::oneshot;
    use pollster::block_on;
    use serde_json::json;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn counting_form(initial: serde_json::Value) -> (Form, Rc<Cell<u32>>) {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let form = FormConfig::new(initial)
            .on_submit(move |_values, _form| {
                counter.set(counter.get() + 1);
                async { Ok(()) }
            })
            .build();
        (form, calls)
    }

    #[test]
    fn test_valid_submit_calls_handler() {
        let (form, calls) = counting_form(json!({ "name": "Ann" }));

        let outcome = block_on(form.submit_form()).unwrap();
        assert_eq!(outcome, SubmitOutcome::Submitted);
        assert_eq!(calls.get(), 1);

        let state = form.state();
        assert!(!state.is_submitting);
        assert_eq!(state.submit_count, 1);
        assert!(state.is_touched("name"));
        assert_eq!(form.submit_phase(), SubmitPhase::Idle);
    }

    #[test]
    fn test_invalid_submit_skips_handler() {
        let (form, calls) = counting_form(json!({ "name": "" }));
        let _reg = form.register_field(
            "name",
            FieldValidator::new(|v| v.as_str().filter(|s| s.is_empty()).map(|_| "Required".to_string())),
        );

        let outcome = block_on(form.submit_form()).unwrap();
        assert_eq!(
            outcome,
            SubmitOutcome::Invalid(FormValue::from(json!({ "name": "Required" })))
        );
        assert_eq!(calls.get(), 0);
        assert!(!form.state().is_submitting);
        assert_eq!(form.state().error("name"), Some("Required"));
    }

    #[test]
    fn test_missing_handler() {
        let form = FormConfig::new(json!({})).build();
        let result = block_on(form.submit_form());
        assert!(matches!(result, Err(FormError::MissingSubmitHandler)));
        assert_eq!(form.state().submit_count, 0);
    }

    #[test]
    fn test_reentrant_submit_is_ignored() {
        let (release, gate) = oneshot::channel::<()>();
        let gate = RefCell::new(Some(gate));
        let form = FormConfig::new(json!({ "a": 1 }))
            .on_submit(move |_, _| {
                let gate = gate.borrow_mut().take();
                async move {
                    if let Some(gate) = gate {
                        let _ = gate.await;
                    }
                    Ok(())
                }
            })
            .build();

        let mut first = form.submit_form();
        // Drive the first submission into its handler
        assert!(first.as_mut().now_or_never().is_none());
        assert_eq!(form.submit_phase(), SubmitPhase::Submitting);

        let second = block_on(form.submit_form()).unwrap();
        assert_eq!(second, SubmitOutcome::Ignored);
        assert_eq!(form.state().submit_count, 1);

        release.send(()).unwrap();
        assert_eq!(block_on(first).unwrap(), SubmitOutcome::Submitted);
        assert!(!form.state().is_submitting);
    }

    #[test]
    fn test_submit_from_submitting_subscriber_is_ignored() {
        let (form, calls) = counting_form(json!({ "a": 1 }));
        let nested = Rc::new(RefCell::new(Vec::new()));
        let seen = nested.clone();
        let reader = form.clone();
        let _sub = form.subscribe(
            |state| state.is_submitting,
            move |submitting| {
                if *submitting {
                    let outcome = reader.submit_form().now_or_never();
                    seen.borrow_mut().push(matches!(outcome, Some(Ok(SubmitOutcome::Ignored))));
                }
            },
        );

        let outcome = block_on(form.submit_form()).unwrap();
        assert_eq!(outcome, SubmitOutcome::Submitted);
        assert_eq!(*nested.borrow(), vec![true]);
        assert_eq!(calls.get(), 1);

        let state = form.state();
        assert_eq!(state.submit_count, 1);
        assert!(!state.is_submitting);
    }

    #[test]
    fn test_pending_submit_does_not_keep_form_alive() {
        let (_release, gate) = oneshot::channel::<()>();
        let gate = RefCell::new(Some(gate));
        let form = FormConfig::new(json!({ "a": 1 }))
            .on_submit(move |_, _| {
                let gate = gate.borrow_mut().take();
                async move {
                    if let Some(gate) = gate {
                        let _ = gate.await;
                    }
                    Ok(())
                }
            })
            .build();

        form.handle_submit();
        form.run_until_stalled();
        assert_eq!(form.submit_phase(), SubmitPhase::Submitting);

        let weak = form.downgrade();
        drop(form);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_dropped_submit_releases_flag() {
        let (form, calls) = counting_form(json!({ "a": 1 }));
        let pending = form.submit_form();
        assert!(form.state().is_submitting);

        drop(pending);
        assert!(!form.state().is_submitting);
        assert_eq!(form.submit_phase(), SubmitPhase::Idle);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_strict_validator_fault_aborts_submit() {
        let form = FormConfig::new(json!({ "a": 1 }))
            .validate(FormValidator::fallible(|_| Err(anyhow::anyhow!("offline"))))
            .fault_mode(FaultMode::Strict)
            .on_submit(|_, _| async { Ok(()) })
            .build();

        let result = block_on(form.submit_form());
        assert!(matches!(result, Err(FormError::Validator { .. })));
        let state = form.state();
        assert!(!state.is_submitting);
        assert!(!state.is_validating);
    }

    #[test]
    fn test_submit_channel_fires_before_handler() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let log = order.clone();
        let form = FormConfig::new(json!({ "a": 1 }))
            .on_submit(move |_, _| {
                log.borrow_mut().push("handler");
                async { Ok(()) }
            })
            .build();

        let log = order.clone();
        let _sub = form.on(
            SUBMIT_CHANNEL,
            move |state| {
                assert!(state.is_submitting);
                log.borrow_mut().push("submit event");
            },
            Default::default(),
        );

        block_on(form.submit_form()).unwrap();
        assert_eq!(*order.borrow(), vec!["submit event", "handler"]);
    }
}
