//! JSON success envelope.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// `{"success": true, "data": ..., "message": ...}`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip)]
    status: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    /// 200 with data.
    pub const fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            message: None,
            status: StatusCode::OK,
        }
    }

    /// 201 with the created resource.
    pub const fn created(data: T) -> Self {
        Self {
            success: true,
            data,
            message: None,
            status: StatusCode::CREATED,
        }
    }

    /// Attach a human-readable message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl ApiResponse<()> {
    /// 200 with only a message.
    pub fn message(message: impl Into<String>) -> Self {
        Self::ok(()).with_message(message)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status;
        (status, Json(self)).into_response()
    }
}

/// A page of results with the total count.
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shape() {
        let json = serde_json::to_value(ApiResponse::ok(vec![1, 2])).unwrap();
        assert_eq!(json, serde_json::json!({"success": true, "data": [1, 2]}));

        let json = serde_json::to_value(ApiResponse::message("Logged out")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"success": true, "data": null, "message": "Logged out"})
        );
    }

    #[test]
    fn test_created_status() {
        let response = ApiResponse::created(7).into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
    }
}
