//! API error types and responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::service::{IssueError, ValidationError};

pub const MISSING_DOMAIN: &str = "Missing required query parameter: domain";
pub const INVALID_DOMAIN: &str = "Invalid domain parameter";
pub const DOMAIN_NOT_ALLOWED: &str = "Domain not found in whitelist";
pub const RETRIEVAL_FAILED: &str = "Failed to retrieve certificate for domain";
pub const SIGNING_FAILED: &str = "Failed to generate signed token";
pub const METHOD_NOT_ALLOWED: &str = "Method not allowed";
pub const REQUEST_TIMED_OUT: &str = "Request timed out";

/// API error type
///
/// Messages are fixed per class; internal detail stays in the logs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(&'static str),

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0}")]
    MethodNotAllowed(&'static str),

    #[error("{0}")]
    RequestTimeout(&'static str),

    #[error("{0}")]
    Unprocessable(&'static str),

    #[error("{0}")]
    Internal(&'static str),
}

/// API error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl ApiError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::RequestTimeout(_) => StatusCode::REQUEST_TIMEOUT,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            error: self.to_string(),
            code: status.as_u16(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<&IssueError> for ApiError {
    fn from(err: &IssueError) -> Self {
        match err {
            IssueError::Validation(ValidationError::Missing) => ApiError::BadRequest(MISSING_DOMAIN),
            IssueError::Validation(_) => ApiError::BadRequest(INVALID_DOMAIN),
            IssueError::NotWhitelisted(_) => ApiError::Forbidden(DOMAIN_NOT_ALLOWED),
            IssueError::Retrieval { .. } => ApiError::Unprocessable(RETRIEVAL_FAILED),
            IssueError::Signing(_) => ApiError::Internal(SIGNING_FAILED),
        }
    }
}

impl From<IssueError> for ApiError {
    fn from(err: IssueError) -> Self {
        ApiError::from(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::RetrievalError;
    use pinning_core::PinningError;

    #[test]
    fn test_classification() {
        let cases = [
            (IssueError::Validation(ValidationError::Missing), 400, MISSING_DOMAIN),
            (IssueError::Validation(ValidationError::TooLong(300)), 400, INVALID_DOMAIN),
            (IssueError::NotWhitelisted("evil.com".into()), 403, DOMAIN_NOT_ALLOWED),
            (
                IssueError::Retrieval {
                    domain: "example.com".into(),
                    source: RetrievalError::Other("refused".into()),
                },
                422,
                RETRIEVAL_FAILED,
            ),
            (
                IssueError::Signing(PinningError::SigningFailed("boom".into())),
                500,
                SIGNING_FAILED,
            ),
        ];

        for (err, status, message) in cases {
            let api = ApiError::from(err);
            assert_eq!(api.status().as_u16(), status);
            assert_eq!(api.to_string(), message);
        }
    }

    #[tokio::test]
    async fn test_response_body() {
        let response = ApiError::Forbidden(DOMAIN_NOT_ALLOWED).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(body, serde_json::json!({ "error": DOMAIN_NOT_ALLOWED, "code": 403 }));
    }

    #[tokio::test]
    async fn test_timeout_body() {
        let response = ApiError::RequestTimeout(REQUEST_TIMED_OUT).into_response();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: ErrorResponse = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(body.code, 408);
        assert_eq!(body.error, REQUEST_TIMED_OUT);
    }
}
