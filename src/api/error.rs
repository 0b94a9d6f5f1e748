//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::CoreError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Clinic id header missing or malformed")]
    ClinicRequired,
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("{message}")]
    Conflict {
        code: &'static str,
        message: String,
        details: Option<serde_json::Value>,
    },
    #[error("Storage busy")]
    Busy,
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match self {
            ApiError::ClinicRequired => (
                StatusCode::BAD_REQUEST,
                "CLINIC_REQUIRED",
                "X-Clinic-Id header with a valid UUID is required".to_string(),
                None,
            ),
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail, None),
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail, None),
            ApiError::Conflict {
                code,
                message,
                details,
            } => (StatusCode::CONFLICT, code, message, details),
            ApiError::Busy => (
                StatusCode::SERVICE_UNAVAILABLE,
                "BUSY",
                "Storage busy, retry the request".to_string(),
                None,
            ),
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::Validation(detail) => ApiError::BadRequest(detail),
            CoreError::NotFound { .. } => ApiError::NotFound(message),
            CoreError::Conflict(reason) => ApiError::Conflict {
                code: "CONFLICT",
                message,
                details: serde_json::to_value(reason).ok(),
            },
            CoreError::InvalidTransition { from, to } => ApiError::Conflict {
                code: "INVALID_TRANSITION",
                message,
                details: Some(serde_json::json!({ "from": from, "to": to })),
            },
            CoreError::NotReschedulable { status } => ApiError::Conflict {
                code: "NOT_RESCHEDULABLE",
                message,
                details: Some(serde_json::json!({ "status": status })),
            },
            CoreError::InsufficientStock {
                item_id,
                item_name,
                required,
                on_hand,
            } => ApiError::Conflict {
                code: "INSUFFICIENT_STOCK",
                message,
                details: Some(serde_json::json!({
                    "item_id": item_id,
                    "item_name": item_name,
                    "required": required,
                    "on_hand": on_hand,
                })),
            },
            CoreError::Busy => ApiError::Busy,
            CoreError::Database(_) | CoreError::Io(_) => {
                ApiError::Internal(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use super::*;
    use crate::error::ConflictReason;
    use crate::models::enums::AppointmentStatus;

    async fn json_of(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 4096).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn validation_returns_400() {
        let response = ApiError::from(CoreError::Validation("bad room".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_of(response).await;
        assert_eq!(json["error"]["message"], "bad room");
    }

    #[tokio::test]
    async fn overlap_returns_409_with_reason() {
        let id = Uuid::new_v4();
        let err = CoreError::Conflict(ConflictReason::Overlap { appointment_id: id });
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let json = json_of(response).await;
        assert_eq!(json["error"]["code"], "CONFLICT");
        assert_eq!(json["error"]["details"]["kind"], "overlap");
        assert_eq!(json["error"]["details"]["appointment_id"], id.to_string());
    }

    #[tokio::test]
    async fn invalid_transition_returns_409() {
        let err = CoreError::InvalidTransition {
            from: AppointmentStatus::Confirmed,
            to: AppointmentStatus::Completed,
        };
        let json = json_of(ApiError::from(err).into_response()).await;
        assert_eq!(json["error"]["code"], "INVALID_TRANSITION");
        assert_eq!(json["error"]["details"]["from"], "confirmed");
    }

    #[tokio::test]
    async fn insufficient_stock_returns_409() {
        let err = CoreError::InsufficientStock {
            item_id: Uuid::new_v4(),
            item_name: "Gauze".into(),
            required: dec!(2),
            on_hand: dec!(1),
        };
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let json = json_of(response).await;
        assert_eq!(json["error"]["code"], "INSUFFICIENT_STOCK");
        assert_eq!(json["error"]["details"]["item_name"], "Gauze");
    }

    #[tokio::test]
    async fn not_found_returns_404() {
        let response = ApiError::from(CoreError::not_found("CommissionEntry", "x")).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn busy_returns_503() {
        let response = ApiError::from(CoreError::Busy).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn internal_hides_details() {
        let response = ApiError::from(CoreError::Database(crate::db::DatabaseError::InvalidValue {
            field: "appointments.start_at".into(),
            value: "garbage".into(),
        }))
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = json_of(response).await;
        assert_eq!(json["error"]["message"], "An internal error occurred");
    }
}
