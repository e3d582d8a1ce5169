//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. Server-side failures are
//! captured to Sentry before the JSON error envelope is written; their
//! details never reach the client.

use std::collections::BTreeMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::checkout::CheckoutError;
use crate::services::inventory::InventoryError;
use crate::services::orders::OrderError;

/// Field name to list of messages.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("{0}")]
    Auth(#[from] AuthError),

    /// Checkout was rejected.
    #[error("{0}")]
    Checkout(#[from] CheckoutError),

    /// Order lifecycle rule violated.
    #[error("{0}")]
    Order(#[from] OrderError),

    /// Inventory rule violated.
    #[error("{0}")]
    Inventory(#[from] InventoryError),

    /// Request body failed validation.
    #[error("Validation failed")]
    Validation(FieldErrors),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User lacks the required role or ownership.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request conflicts with existing data.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error envelope.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Database(err) => repository_status(err),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::InvalidApiKey => {
                    StatusCode::UNAUTHORIZED
                }
                AuthError::AccountDisabled => StatusCode::FORBIDDEN,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::WeakPassword(_) | AuthError::InvalidEmail(_) => StatusCode::BAD_REQUEST,
                AuthError::Repository(err) => repository_status(err),
                AuthError::PasswordHash => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Checkout(err) => match err {
                CheckoutError::Repository(err) => repository_status(err),
                _ => StatusCode::BAD_REQUEST,
            },
            Self::Order(err) => match err {
                OrderError::NotFound => StatusCode::NOT_FOUND,
                OrderError::Repository(err) => repository_status(err),
                _ => StatusCode::BAD_REQUEST,
            },
            Self::Inventory(err) => match err {
                InventoryError::NotFound => StatusCode::NOT_FOUND,
                InventoryError::Repository(err) => repository_status(err),
                _ => StatusCode::BAD_REQUEST,
            },
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message.
    fn public_message(&self, status: StatusCode) -> String {
        if status.is_server_error() {
            return "Internal server error".to_string();
        }
        match self {
            Self::Database(err)
            | Self::Auth(AuthError::Repository(err))
            | Self::Checkout(CheckoutError::Repository(err))
            | Self::Order(OrderError::Repository(err))
            | Self::Inventory(InventoryError::Repository(err)) => repository_message(err),
            Self::Auth(AuthError::InvalidCredentials) => "Invalid email or password".to_string(),
            Self::Auth(AuthError::UserAlreadyExists) => {
                "An account with this email already exists".to_string()
            }
            Self::Auth(AuthError::WeakPassword(msg))
            | Self::NotFound(msg)
            | Self::Conflict(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::BadRequest(msg) => msg.clone(),
            _ => self.to_string(),
        }
    }
}

const fn repository_status(err: &RepositoryError) -> StatusCode {
    match err {
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Conflict(_) => StatusCode::CONFLICT,
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn repository_message(err: &RepositoryError) -> String {
    match err {
        RepositoryError::NotFound => "Not found".to_string(),
        RepositoryError::Conflict(msg) => msg.clone(),
        _ => err.to_string(),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let message = self.public_message(status);
        let errors = match self {
            Self::Validation(fields) => Some(fields),
            _ => None,
        };

        let body = ErrorBody {
            success: false,
            message,
            errors,
        };
        (status, Json(body)).into_response()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields = FieldErrors::new();
        for (field, errs) in errors.field_errors() {
            let field = field.to_string();
            let messages = errs
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map_or_else(|| format!("{field} is invalid ({})", e.code), ToString::to_string)
                })
                .collect();
            fields.insert(field, messages);
        }
        Self::Validation(fields)
    }
}

impl AppError {
    /// Single-field validation failure.
    #[must_use]
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut fields = FieldErrors::new();
        fields.insert(field.to_owned(), vec![message.into()]);
        Self::Validation(fields)
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context after authentication.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context on logout.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::checkout::CheckoutError;
    use validator::Validate;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(status_of(AppError::NotFound("order".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_of(AppError::Unauthorized("login".into())), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(AppError::Forbidden("admin".into())), StatusCode::FORBIDDEN);
        assert_eq!(status_of(AppError::Conflict("slug".into())), StatusCode::CONFLICT);
        assert_eq!(status_of(AppError::RateLimited), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            status_of(AppError::Internal("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_repository_errors_map_through() {
        assert_eq!(
            status_of(RepositoryError::Conflict("slug already exists".into()).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(status_of(RepositoryError::NotFound.into()), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(RepositoryError::DataCorruption("bad row".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_checkout_rejection_is_bad_request() {
        assert_eq!(
            status_of(CheckoutError::EmptyCart.into()),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_inventory_overflow_is_bad_request() {
        let err = AppError::Inventory(InventoryError::QuantityOutOfRange);
        let status = err.status();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err.public_message(status), "resulting quantity is out of range");
    }

    #[test]
    fn test_checkout_missing_line_is_bad_request() {
        assert_eq!(
            status_of(
                CheckoutError::Unavailable {
                    item: "product 7".into()
                }
                .into()
            ),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_wrapped_conflict_shows_inner_message() {
        let err = AppError::Inventory(InventoryError::Repository(RepositoryError::Conflict(
            "warehouse code already exists".into(),
        )));
        let status = err.status();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(err.public_message(status), "warehouse code already exists");
    }

    #[test]
    fn test_internal_details_hidden() {
        let err = AppError::Internal("connection string postgres://u:p@db".into());
        let status = err.status();
        assert_eq!(err.public_message(status), "Internal server error");
    }

    #[derive(Validate)]
    struct Signup {
        #[validate(length(min = 2, message = "name is too short"))]
        name: String,
    }

    #[test]
    fn test_validation_errors_collect_field_messages() {
        let err: AppError = Signup { name: "x".into() }.validate().unwrap_err().into();
        let AppError::Validation(fields) = err else {
            panic!("expected validation error");
        };
        assert_eq!(fields["name"], vec!["name is too short".to_string()]);
    }
}
