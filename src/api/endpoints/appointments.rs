//! Appointment Scheduler endpoints.
//!
//! - `POST /api/appointments`: book
//! - `GET  /api/appointments/:id`
//! - `POST /api/appointments/:id/reschedule`
//! - `POST /api/appointments/:id/transition`
//! - `POST /api/appointments/:id/cancel`
//! - `GET  /api/appointments/:id/history`
//! - `GET  /api/professionals/:id/appointments?from=&to=`

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ClinicContext};
use crate::models::enums::AppointmentStatus;
use crate::models::{Appointment, BookingRequest, StatusChange};

pub async fn book(
    State(ctx): State<ApiContext>,
    Extension(clinic): Extension<ClinicContext>,
    Json(request): Json<BookingRequest>,
) -> Result<(StatusCode, Json<Appointment>), ApiError> {
    let appointment = ctx.run(move |core| core.book(&clinic.clinic_id, &request)).await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

pub async fn get(
    State(ctx): State<ApiContext>,
    Extension(clinic): Extension<ClinicContext>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Appointment>, ApiError> {
    ctx.run(move |core| core.get_appointment(&clinic.clinic_id, &appointment_id))
        .await
        .map(Json)
}

#[derive(Deserialize)]
pub struct RescheduleBody {
    pub start_at: NaiveDateTime,
}

pub async fn reschedule(
    State(ctx): State<ApiContext>,
    Extension(clinic): Extension<ClinicContext>,
    Path(appointment_id): Path<Uuid>,
    Json(body): Json<RescheduleBody>,
) -> Result<Json<Appointment>, ApiError> {
    ctx.run(move |core| core.reschedule(&clinic.clinic_id, &appointment_id, body.start_at))
        .await
        .map(Json)
}

#[derive(Deserialize)]
pub struct TransitionBody {
    pub status: AppointmentStatus,
    pub reason: Option<String>,
}

pub async fn transition(
    State(ctx): State<ApiContext>,
    Extension(clinic): Extension<ClinicContext>,
    Path(appointment_id): Path<Uuid>,
    Json(body): Json<TransitionBody>,
) -> Result<Json<Appointment>, ApiError> {
    ctx.run(move |core| {
        core.transition(&clinic.clinic_id, &appointment_id, body.status, body.reason.as_deref())
    })
    .await
    .map(Json)
}

#[derive(Deserialize, Default)]
pub struct CancelBody {
    pub reason: Option<String>,
}

pub async fn cancel(
    State(ctx): State<ApiContext>,
    Extension(clinic): Extension<ClinicContext>,
    Path(appointment_id): Path<Uuid>,
    body: Option<Json<CancelBody>>,
) -> Result<Json<Appointment>, ApiError> {
    let reason = body.and_then(|Json(b)| b.reason);
    ctx.run(move |core| core.cancel(&clinic.clinic_id, &appointment_id, reason.as_deref()))
        .await
        .map(Json)
}

pub async fn history(
    State(ctx): State<ApiContext>,
    Extension(clinic): Extension<ClinicContext>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Vec<StatusChange>>, ApiError> {
    ctx.run(move |core| core.status_history(&clinic.clinic_id, &appointment_id))
        .await
        .map(Json)
}

#[derive(Deserialize)]
pub struct RangeQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

pub async fn list_for_professional(
    State(ctx): State<ApiContext>,
    Extension(clinic): Extension<ClinicContext>,
    Path(professional_id): Path<Uuid>,
    Query(range): Query<RangeQuery>,
) -> Result<Json<Vec<Appointment>>, ApiError> {
    ctx.run(move |core| core.list_appointments(&clinic.clinic_id, &professional_id, range.from, range.to))
        .await
        .map(Json)
}
