//! Mapping admission outcomes to HTTP responses.
//!
//! | Error                               | Status |
//! |-------------------------------------|--------|
//! | `InvalidCredential`                 | 400    |
//! | `DuplicateKey`                      | 409    |
//! | `PoolExhausted`, `AllocationError`  | 507    |
//! | `Backpressure`, `ProcessorClosed`   | 503    |
//!
//! The body is the error's reason string.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::admission::AdmissionError;

pub fn status_for(err: &AdmissionError) -> StatusCode {
    match err {
        AdmissionError::InvalidCredential(_) => StatusCode::BAD_REQUEST,
        AdmissionError::DuplicateKey => StatusCode::CONFLICT,
        AdmissionError::PoolExhausted { .. } | AdmissionError::AllocationError { .. } => {
            StatusCode::INSUFFICIENT_STORAGE
        }
        AdmissionError::Backpressure | AdmissionError::ProcessorClosed => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

impl IntoResponse for AdmissionError {
    fn into_response(self) -> Response {
        (status_for(&self), self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&AdmissionError::InvalidCredential("public key")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_for(&AdmissionError::DuplicateKey), StatusCode::CONFLICT);
        assert_eq!(
            status_for(&AdmissionError::PoolExhausted { index: 256 }),
            StatusCode::INSUFFICIENT_STORAGE
        );
        assert_eq!(
            status_for(&AdmissionError::Backpressure),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
