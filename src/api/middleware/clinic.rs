//! Tenant resolution middleware.
//!
//! Every ledger route is scoped to one clinic. The id travels in the
//! `X-Clinic-Id` header and is injected as `ClinicContext` for handlers.

use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ClinicContext;

pub const CLINIC_HEADER: &str = "X-Clinic-Id";

pub async fn require_clinic(mut req: Request<axum::body::Body>, next: Next) -> Response {
    let clinic_id = req
        .headers()
        .get(CLINIC_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v.trim()).ok());

    match clinic_id {
        Some(clinic_id) => {
            req.extensions_mut().insert(ClinicContext { clinic_id });
            next.run(req).await
        }
        None => ApiError::ClinicRequired.into_response(),
    }
}
