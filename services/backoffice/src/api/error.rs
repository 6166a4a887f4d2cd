//! API error types and helpers.
//!
//! # Purpose and responsibility
//! Centralizes HTTP error response construction so every endpoint and the
//! authorization layer return the same `{code, message, request_id}` shape.
//!
//! # Key invariants and assumptions
//! - Status codes align with the error category.
//! - Guard violations (super-role mutation, self-deletion) are client errors.
//!
//! # Security considerations
//! - Internal errors log details server-side but return generic messages.
use crate::api::types::ErrorResponse;
use crate::store::StoreError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use bastion_rbac::{AuthorizeError, RbacError};

/// Structured API error returned by handlers.
///
/// # Example
/// ```rust
/// use axum::http::StatusCode;
/// use backoffice::api::error::api_not_found;
///
/// let err = api_not_found("role not found");
/// assert_eq!(err.status, StatusCode::NOT_FOUND);
/// ```
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.body)).into_response()
    }
}

fn api_error(status: StatusCode, code: &str, message: &str) -> ApiError {
    ApiError {
        status,
        body: ErrorResponse {
            code: code.to_string(),
            message: message.to_string(),
            request_id: None,
        },
    }
}

pub fn api_not_found(message: &str) -> ApiError {
    api_error(StatusCode::NOT_FOUND, "not_found", message)
}

pub fn api_conflict(code: &str, message: &str) -> ApiError {
    api_error(StatusCode::CONFLICT, code, message)
}

/// Build a 500 from a store error, logging the cause.
pub fn api_internal(message: &str, err: &StoreError) -> ApiError {
    tracing::error!(error = ?err, "back-office storage error");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

pub fn api_internal_message(message: &str) -> ApiError {
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

pub fn api_unauthorized(message: &str) -> ApiError {
    api_error(StatusCode::UNAUTHORIZED, "unauthorized", message)
}

pub fn api_forbidden(message: &str) -> ApiError {
    api_error(StatusCode::FORBIDDEN, "forbidden", message)
}

pub fn api_validation_error(message: &str) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, "validation_error", message)
}

/// Map a store error: missing rows are 404, duplicates 409, the rest 500.
pub fn api_store_error(message: &str, err: StoreError) -> ApiError {
    match err {
        StoreError::NotFound(what) => api_not_found(&format!("{what} not found")),
        StoreError::Conflict(what) => api_conflict("already_exists", &format!("{what} already exists")),
        other => api_internal(message, &other),
    }
}

/// Map a policy error. Guard violations and invalid tuples are client errors.
pub fn api_rbac_error(message: &str, err: &RbacError) -> ApiError {
    match err {
        err if err.is_guard_violation() => api_validation_error(&err.to_string()),
        RbacError::InvalidRule(_) => api_validation_error(&err.to_string()),
        other => {
            tracing::error!(error = %other, "policy administration error");
            api_internal_message(message)
        }
    }
}

/// Map an authorization failure. Anything but a missing identity is a 500.
pub fn api_authorize_error(err: &AuthorizeError) -> ApiError {
    match err {
        AuthorizeError::Unauthenticated => api_unauthorized("authentication required"),
        other => {
            tracing::error!(error = %other, "authorization could not be decided");
            api_internal_message("authorization unavailable")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_helpers_build_expected_codes() {
        let not_found = api_not_found("missing");
        assert_eq!(not_found.status, StatusCode::NOT_FOUND);
        assert_eq!(not_found.body.code, "not_found");

        let conflict = api_conflict("already_exists", "conflict");
        assert_eq!(conflict.status, StatusCode::CONFLICT);
        assert_eq!(conflict.body.code, "already_exists");

        let unauthorized = api_unauthorized("nope");
        assert_eq!(unauthorized.status, StatusCode::UNAUTHORIZED);

        let forbidden = api_forbidden("nope");
        assert_eq!(forbidden.status, StatusCode::FORBIDDEN);
        assert_eq!(forbidden.body.code, "forbidden");

        let validation = api_validation_error("bad");
        assert_eq!(validation.status, StatusCode::BAD_REQUEST);
        assert_eq!(validation.body.code, "validation_error");
    }

    #[test]
    fn store_errors_map_by_kind() {
        let err = api_store_error("x", StoreError::NotFound("role editor".to_string()));
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        let err = api_store_error("x", StoreError::Conflict("role alias editor".to_string()));
        assert_eq!(err.status, StatusCode::CONFLICT);
        let err = api_store_error("storage failed", StoreError::Unexpected(anyhow::anyhow!("boom")));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.body.message, "storage failed");
    }

    #[test]
    fn protected_role_is_a_validation_error() {
        let err = api_rbac_error("x", &RbacError::ProtectedRole("super".to_string()));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.body.code, "validation_error");
        let err = api_rbac_error("policy failed", &RbacError::NotLoaded);
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn authorize_errors_split_401_and_500() {
        assert_eq!(
            api_authorize_error(&AuthorizeError::Unauthenticated).status,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            api_authorize_error(&AuthorizeError::PolicyLoad(RbacError::NotLoaded)).status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
