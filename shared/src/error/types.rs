//! `AppError` and the JSON envelope every club endpoint answers with

use super::category::{ErrorCategory, ErrorKind};
use super::codes::ErrorCode;
use axum::Json;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Structured context attached to an error (`requestId`, `status`, ...)
pub type Details = HashMap<String, Value>;

/// Failure raised by a club operation
///
/// `code` decides the HTTP status and the [`ErrorKind`] callers branch on;
/// `message` is what a reviewer sees in the admin console.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<Details>,
}

impl AppError {
    /// Error carrying the code's default message
    pub fn new(code: ErrorCode) -> Self {
        Self::with_message(code, code.message())
    }

    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Attach one piece of context, e.g. the offending request id
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details
            .get_or_insert_with(Details::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn http_status(&self) -> StatusCode {
        self.code.http_status()
    }

    pub fn kind(&self) -> ErrorKind {
        self.code.kind()
    }

    /// Transient failures a caller may resubmit unchanged
    pub fn is_retryable(&self) -> bool {
        self.http_status() == StatusCode::SERVICE_UNAVAILABLE
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::ValidationFailed, message)
    }

    /// Payload is missing `field` (a JSON path such as `children[0].name`)
    pub fn required_field(field: impl Into<String>) -> Self {
        let field = field.into();
        Self::with_message(ErrorCode::RequiredField, format!("{field} is required"))
            .with_detail("field", field)
    }

    /// Generic missing document; `path` is `collection/id`
    pub fn not_found(path: impl Into<String>) -> Self {
        let path = path.into();
        Self::with_message(ErrorCode::NotFound, format!("{path} does not exist"))
            .with_detail("path", path)
    }

    /// A transaction lost every optimistic commit attempt
    pub fn contention(attempts: u32) -> Self {
        Self::new(ErrorCode::TransactionContention).with_detail("attempts", attempts)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::InternalError, message)
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::DatabaseError, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(ErrorCode::NotAuthenticated)
    }

    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::TokenInvalid, message)
    }

    pub fn token_expired() -> Self {
        Self::new(ErrorCode::TokenExpired)
    }

    /// The caller's identity went away and could not be refreshed
    pub fn session_expired() -> Self {
        Self::new(ErrorCode::SessionExpired)
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Response envelope: `code` is 0 on success, an [`ErrorCode`] otherwise
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Details>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: Some(ErrorCode::Success.code()),
            message: "OK".into(),
            data: Some(data),
            details: None,
        }
    }

    fn status(&self) -> StatusCode {
        match self.code {
            None | Some(0) => StatusCode::OK,
            Some(raw) => ErrorCode::try_from(raw)
                .map(|code| code.http_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }
}

impl ApiResponse<()> {
    /// Success with no payload (sign-out, acknowledgements)
    pub fn ok() -> Self {
        Self {
            code: Some(ErrorCode::Success.code()),
            message: "OK".into(),
            data: None,
            details: None,
        }
    }

    pub fn error(err: &AppError) -> Self {
        err.clone().into()
    }
}

impl<T> From<AppError> for ApiResponse<T> {
    fn from(err: AppError) -> Self {
        Self {
            code: Some(err.code.code()),
            message: err.message,
            data: None,
            details: err.details,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.code.category() == ErrorCategory::System {
            tracing::error!(code = %self.code, message = %self.message, "Club operation failed");
        }
        let status = self.http_status();
        (status, Json(ApiResponse::<()>::from(self))).into_response()
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_message_comes_from_code() {
        let err = AppError::new(ErrorCode::RequestNotFound);
        assert_eq!(err.message, "Registration request not found");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.details.is_none());
    }

    #[test]
    fn test_details_accumulate() {
        let err = AppError::with_message(ErrorCode::RequestNotPending, "Request already approved")
            .with_detail("requestId", "r1")
            .with_detail("status", "approved");

        assert_eq!(err.to_string(), "Request already approved");
        let details = err.details.expect("details");
        assert_eq!(details["requestId"], "r1");
        assert_eq!(details["status"], "approved");
    }

    #[test]
    fn test_required_field_names_the_path() {
        let err = AppError::required_field("children[1].name");
        assert_eq!(err.message, "children[1].name is required");
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(err.http_status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_contention_is_the_only_retryable_store_failure() {
        let err = AppError::contention(5);
        assert!(err.is_retryable());
        assert_eq!(err.details.as_ref().map(|d| d["attempts"].clone()), Some(5.into()));

        assert!(!AppError::database("disk full").is_retryable());
        assert!(!AppError::not_found("members/m1").is_retryable());
        assert_eq!(AppError::session_expired().kind(), ErrorKind::Unauthenticated);
    }

    #[test]
    fn test_envelope_for_error() {
        let err = AppError::new(ErrorCode::UserNotFound).with_detail("userId", "u1");
        let body = ApiResponse::<()>::error(&err);

        assert_eq!(body.code, Some(4002));
        assert!(body.data.is_none());
        assert_eq!(body.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_envelope_for_success() {
        let body = ApiResponse::success(vec!["m1"]);
        assert_eq!(body.status(), StatusCode::OK);

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["code"], 0);
        assert_eq!(json["data"][0], "m1");
        assert!(json.get("details").is_none());
    }
}
