//! Typed error hierarchy for the Courier relay.
//!
//! Two top-level enums cover the two subsystems:
//! - `RegistryError` — job registration and lookup failures
//! - `VerifyError` — inbound webhook verification failures
//!
//! `VerifyError` variants map one-to-one onto HTTP responses at the API
//! layer, so the verification pipeline itself never touches status codes.

use thiserror::Error;

/// Errors from the job registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Job {job_id} not found")]
    JobNotFound { job_id: String },

    #[error("Job {job_id} is already registered")]
    DuplicateJob { job_id: String },

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors from the inbound webhook verification pipeline.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Unrecognized event type: {0}")]
    UnrecognizedEvent(String),

    #[error("Unrecognized agent status: {0}")]
    UnrecognizedStatus(String),

    #[error("Job {job_id} not found")]
    UnknownJob { job_id: String },

    #[error("Missing signature header")]
    MissingSignature,

    #[error("Signature verification failed")]
    InvalidSignature,

    #[error("No signing secret on file and signature verification is required")]
    SignatureRequired,

    #[error("Completion handler failed: {0}")]
    HandlerFailed(#[source] anyhow::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_error_job_not_found_carries_id() {
        let err = RegistryError::JobNotFound {
            job_id: "bc-42".to_string(),
        };
        match &err {
            RegistryError::JobNotFound { job_id } => assert_eq!(job_id, "bc-42"),
            _ => panic!("Expected JobNotFound"),
        }
        assert!(err.to_string().contains("bc-42"));
    }

    #[test]
    fn registry_error_duplicate_job_is_matchable() {
        let err = RegistryError::DuplicateJob {
            job_id: "bc-42".to_string(),
        };
        assert!(matches!(err, RegistryError::DuplicateJob { .. }));
    }

    #[test]
    fn verify_error_missing_field_names_field() {
        let err = VerifyError::MissingField("status");
        assert!(err.to_string().contains("status"));
    }

    #[test]
    fn verify_error_unknown_job_carries_id() {
        let err = VerifyError::UnknownJob {
            job_id: "bc-7".to_string(),
        };
        match &err {
            VerifyError::UnknownJob { job_id } => assert_eq!(job_id, "bc-7"),
            _ => panic!("Expected UnknownJob"),
        }
    }

    #[test]
    fn verify_error_handler_failed_preserves_source() {
        use std::error::Error;
        let err = VerifyError::HandlerFailed(anyhow::anyhow!("downstream exploded"));
        assert!(err.source().is_some());
        assert!(err.to_string().contains("downstream exploded"));
    }

    #[test]
    fn verify_error_signature_variants_are_distinct() {
        assert!(matches!(
            VerifyError::MissingSignature,
            VerifyError::MissingSignature
        ));
        assert!(!matches!(
            VerifyError::InvalidSignature,
            VerifyError::MissingSignature
        ));
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        let registry_err = RegistryError::JobNotFound {
            job_id: "x".to_string(),
        };
        assert_std_error(&registry_err);
        let verify_err = VerifyError::InvalidSignature;
        assert_std_error(&verify_err);
    }
}
