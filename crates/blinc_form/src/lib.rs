//! Blinc Form
//!
//! Form state management for Blinc UIs:
//!
//! - **Form state**: values, errors and touched trees for arbitrarily nested
//!   forms, updated through a pure reducer
//! - **Path addressing**: `friends.0.name` style paths with copy-on-write
//!   updates that share untouched subtrees
//! - **Validation**: per-field, whole-form and schema validators, run
//!   concurrently and merged by configurable precedence, with stale results
//!   discarded
//! - **Selector subscriptions**: observers are notified only when the slice
//!   of state they select actually changes
//! - **Submission**: touch-all, validate, then call the submit handler
//!
//! # Example
//!
//! ```rust
//! use blinc_form::{FieldValidator, FormConfig, SubmitOutcome};
//! use serde_json::json;
//!
//! let form = FormConfig::new(json!({ "username": "", "password": "" }))
//!     .on_submit(|values, _form| async move {
//!         println!("logging in as {}", values.get("username").cloned().unwrap_or_default());
//!         Ok(())
//!     })
//!     .build();
//!
//! let _username = form.register_field(
//!     "username",
//!     FieldValidator::new(|v| v.as_str().filter(|s| s.is_empty()).map(|_| "Required".into())),
//! );
//!
//! let outcome = pollster::block_on(form.submit_form()).unwrap();
//! assert!(matches!(outcome, SubmitOutcome::Invalid(_)));
//! assert!(form.state().is_touched("password"));
//!
//! form.set_field_value("username", "ian");
//! let outcome = pollster::block_on(form.submit_form()).unwrap();
//! assert_eq!(outcome, SubmitOutcome::Submitted);
//! ```

pub mod array;
pub mod config;
pub mod error;
pub mod events;
pub mod field;
pub mod path;
pub mod runtime;
pub mod schema;
pub mod state;
pub mod store;
pub mod submit;
pub mod subscription;
pub mod tree;
pub mod validation;
pub mod value;

pub use array::ArrayHelpers;
pub use config::{FormConfig, FormOptions, SubmitHandler};
pub use error::{FormError, Result};
pub use events::{
    EventEmitter, ListenerId, ListenerOptions, SubscriptionHandle, RESET_CHANNEL, STATE_CHANNEL,
    SUBMIT_CHANNEL,
};
pub use field::{BlurEvent, ChangeEvent, Field, FieldMeta, InputKind};
pub use path::{delete_in, get_in, get_in_or, set_in, UndefinedPolicy, MAX_SPARSE_LEN};
pub use runtime::{Spawn, TaskPool};
#[cfg(feature = "tokio")]
pub use runtime::TokioSpawner;
pub use schema::{SchemaIssue, SchemaRejection, ValidationSchema};
pub use state::{reduce, Action, FormState, InitialState};
pub use store::{FieldRegistration, Form};
pub use submit::{SubmitOutcome, SubmitPhase};
pub use subscription::{default_comparer, identity_comparer, Comparer};
pub use tree::{deep_equal, has_leaves, merge_trees, touch_all};
pub use validation::{
    FaultMode, FieldValidator, FormValidator, Precedence, RunTicket, Target, ValidationSource,
};
pub use value::{FormMap, FormValue};
