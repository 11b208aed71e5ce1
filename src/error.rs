use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::validator::FieldViolation;

/// Message returned to clients for every failure that is not their fault.
pub const GENERIC_FAILURE: &str = "An unexpected error occurred. Please try again later.";

/// Message returned alongside validation details.
pub const INVALID_INPUT: &str = "Invalid input data";

/// Failures talking to the backing spreadsheet (or its token endpoint).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("network error: {0}")]
    Transport(String),
    #[error("sheets api returned http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("malformed response: {0}")]
    Decode(String),
}

/// The last row of the sheet does not hold a usable ID.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AllocError {
    #[error("row {row} has no submission id")]
    MissingId { row: usize },
    #[error("row {row} has non-numeric submission id {value:?}")]
    NotNumeric { row: usize, value: String },
    #[error("submission id overflow after {last}")]
    Overflow { last: u32 },
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("could not build message: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("smtp failure: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Outcome of a failed pass through the submission pipeline.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("invalid input data ({} violations)", .0.len())]
    Invalid(Vec<FieldViolation>),
    #[error("backing store error: {0}")]
    Store(#[from] StoreError),
    #[error("could not allocate submission id: {0}")]
    Alloc(#[from] AllocError),
}

impl SubmitError {
    pub fn status(&self) -> StatusCode {
        match self {
            SubmitError::Invalid(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for SubmitError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            SubmitError::Invalid(details) => {
                log::warn!("Rejected submission: {} field violation(s)", details.len());
                (
                    status,
                    Json(json!({
                        "success": false,
                        "error": INVALID_INPUT,
                        "details": details,
                    })),
                )
                    .into_response()
            }
            other => {
                log::error!("Error submitting form: {}", other);
                (
                    status,
                    Json(json!({
                        "success": false,
                        "error": GENERIC_FAILURE,
                    })),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_are_client_errors() {
        let err = SubmitError::Invalid(vec![FieldViolation::required("email")]);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_upstream_errors_are_server_errors() {
        let store = SubmitError::from(StoreError::Auth("denied".to_string()));
        let alloc = SubmitError::from(AllocError::MissingId { row: 3 });
        for err in [store, alloc] {
            assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }
}
