//! Error types for blinc_form

use thiserror::Error;

use crate::validation::ValidationSource;

/// Errors returned by form operations.
///
/// Validation *messages* are never errors: they are data in the errors
/// tree. These variants cover execution faults only.
#[derive(Error, Debug)]
pub enum FormError {
    /// A validator failed to run (strict fault mode only)
    #[error("{origin} validator failed{}: {message}", at_path(.path))]
    Validator {
        origin: ValidationSource,
        path: Option<String>,
        message: String,
    },

    /// The submit handler returned an error
    #[error("submit handler failed: {0}")]
    Submit(#[source] anyhow::Error),

    /// `submit_form` was called on a form built without `on_submit`
    #[error("no submit handler configured")]
    MissingSubmitHandler,
}

impl FormError {
    pub(crate) fn validator(origin: ValidationSource, path: Option<&str>, err: &anyhow::Error) -> Self {
        FormError::Validator {
            origin,
            path: path.map(str::to_string),
            message: format!("{:#}", err),
        }
    }
}

fn at_path(path: &Option<String>) -> String {
    path.as_ref().map(|p| format!(" at `{}`", p)).unwrap_or_default()
}

/// Result type for blinc_form operations
pub type Result<T> = std::result::Result<T, FormError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validator_message_includes_path() {
        let err = FormError::validator(
            ValidationSource::Field,
            Some("email"),
            &anyhow::anyhow!("lookup timed out"),
        );
        assert_eq!(err.to_string(), "field validator failed at `email`: lookup timed out");

        let err = FormError::validator(ValidationSource::Schema, None, &anyhow::anyhow!("boom"));
        assert_eq!(err.to_string(), "schema validator failed: boom");
    }

    #[test]
    fn test_submit_keeps_source() {
        use std::error::Error as _;

        let err = FormError::Submit(anyhow::anyhow!("server said no"));
        assert_eq!(err.to_string(), "submit handler failed: server said no");
        assert!(err.source().is_some());
    }
}
