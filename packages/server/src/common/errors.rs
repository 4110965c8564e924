use thiserror::Error;

use crate::common::auth::AuthError;
use crate::domains::applications::models::Application;

/// Errors surfaced by workflow operations.
///
/// Business-rule violations are returned to the immediate caller. Delivery
/// failures only show up here inside background jobs, where they drive retries.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("invalid {entity} status transition: {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("pet cannot leave medical hold without an approved vet release")]
    ReleaseGate,

    #[error("expected_version is required for application status updates")]
    MissingVersion,

    #[error("version conflict: expected {expected}, current is {}", current.version)]
    VersionConflict {
        expected: i32,
        current: Box<Application>,
    },

    #[error(transparent)]
    AuthorizationDenied(#[from] AuthError),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("external delivery failed: {0}")]
    ExternalDeliveryFailure(String),

    #[error("saga {saga} failed at step {step}: {source}")]
    SagaStepFailure {
        saga: &'static str,
        step: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("store error: {0}")]
    Store(anyhow::Error),
}

/// A write refused by a uniqueness rule, e.g. a second open application for
/// the same pet and adopter. Raised by the stores, surfaced as `Conflict`.
#[derive(Error, Debug)]
#[error("{rule}")]
pub struct UniqueViolation {
    pub rule: String,
    /// Index name, when the database reports one
    pub constraint: Option<String>,
}

impl UniqueViolation {
    pub fn new(rule: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            constraint: None,
        }
    }
}

impl From<anyhow::Error> for CoreError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<UniqueViolation>() {
            Ok(violation) => CoreError::Conflict(violation.rule),
            Err(err) => CoreError::Store(err),
        }
    }
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        CoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid_transition(
        entity: &'static str,
        from: impl ToString,
        to: impl ToString,
    ) -> Self {
        CoreError::InvalidTransition {
            entity,
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// HTTP status class the error maps to at the API boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            CoreError::NotFound { .. } => 404,
            CoreError::InvalidTransition { .. }
            | CoreError::ReleaseGate
            | CoreError::Validation(_) => 422,
            CoreError::MissingVersion => 400,
            CoreError::VersionConflict { .. } | CoreError::Conflict(_) => 409,
            CoreError::AuthorizationDenied(AuthError::AuthenticationRequired) => 401,
            CoreError::AuthorizationDenied(_) => 403,
            CoreError::ExternalDeliveryFailure(_) => 502,
            CoreError::SagaStepFailure { .. } | CoreError::Store(_) => 503,
        }
    }

    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreError::SagaStepFailure { .. }
                | CoreError::Store(_)
                | CoreError::ExternalDeliveryFailure(_)
        )
    }
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_error_names_both_states() {
        let err = CoreError::invalid_transition("pet", "deceased", "available");
        assert_eq!(
            err.to_string(),
            "invalid pet status transition: deceased -> available"
        );
        assert_eq!(err.status_code(), 422);
    }

    #[test]
    fn saga_failures_are_retryable_server_errors() {
        let err = CoreError::SagaStepFailure {
            saga: "pet_transfer",
            step: "reassign_foster_assignments",
            source: anyhow::anyhow!("connection reset"),
        };
        assert_eq!(err.status_code(), 503);
        assert!(err.is_retryable());
        assert!(err.to_string().contains("reassign_foster_assignments"));
    }

    #[test]
    fn unique_violations_become_conflicts() {
        let err: CoreError = anyhow::Error::from(UniqueViolation::new(
            "a transfer is already pending for this pet",
        ))
        .into();

        match &err {
            CoreError::Conflict(msg) => assert_eq!(msg, "a transfer is already pending for this pet"),
            other => panic!("expected conflict, got {:?}", other),
        }
        assert_eq!(err.status_code(), 409);
        assert!(!err.is_retryable());
    }

    #[test]
    fn other_store_errors_stay_retryable() {
        let err: CoreError = anyhow::anyhow!("connection reset").into();
        assert!(matches!(err, CoreError::Store(_)));
        assert_eq!(err.status_code(), 503);
    }

    #[test]
    fn missing_version_is_a_client_error() {
        assert_eq!(CoreError::MissingVersion.status_code(), 400);
        assert!(!CoreError::MissingVersion.is_retryable());
    }
}
