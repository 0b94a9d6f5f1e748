//! Availability Calendar endpoints.
//!
//! - `GET  /api/professionals/:id/hours`
//! - `PUT  /api/professionals/:id/hours`: replace one weekday's windows
//! - `GET  /api/professionals/:id/availability?start=&end=`
//! - `GET  /api/professionals/:id/free-slots?date=&procedure_id=`
//! - `GET  /api/professionals/:id/exceptions`
//! - `POST /api/professionals/:id/exceptions`
//! - `DELETE /api/exceptions/:id`

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ClinicContext};
use crate::error::ConflictReason;
use crate::models::{AvailabilityException, NewException, WorkingWindow};

#[derive(Deserialize)]
pub struct WindowBody {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

#[derive(Deserialize)]
pub struct WeekdayHoursBody {
    pub weekday: Weekday,
    pub windows: Vec<WindowBody>,
}

pub async fn get_hours(
    State(ctx): State<ApiContext>,
    Extension(clinic): Extension<ClinicContext>,
    Path(professional_id): Path<Uuid>,
) -> Result<Json<Vec<WorkingWindow>>, ApiError> {
    ctx.run(move |core| core.weekly_hours(&clinic.clinic_id, &professional_id))
        .await
        .map(Json)
}

pub async fn set_hours(
    State(ctx): State<ApiContext>,
    Extension(clinic): Extension<ClinicContext>,
    Path(professional_id): Path<Uuid>,
    Json(body): Json<WeekdayHoursBody>,
) -> Result<Json<Vec<WorkingWindow>>, ApiError> {
    let windows: Vec<(NaiveTime, NaiveTime)> = body.windows.iter().map(|w| (w.open, w.close)).collect();
    ctx.run(move |core| core.set_weekly_hours(&clinic.clinic_id, &professional_id, body.weekday, &windows))
        .await
        .map(Json)
}

#[derive(Deserialize)]
pub struct IntervalQuery {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

#[derive(Serialize)]
pub struct AvailabilityResponse {
    pub available: bool,
    pub reason: Option<ConflictReason>,
}

pub async fn check(
    State(ctx): State<ApiContext>,
    Extension(clinic): Extension<ClinicContext>,
    Path(professional_id): Path<Uuid>,
    Query(q): Query<IntervalQuery>,
) -> Result<Json<AvailabilityResponse>, ApiError> {
    let reason = ctx
        .run(move |core| core.check_availability(&clinic.clinic_id, &professional_id, q.start, q.end))
        .await?;
    Ok(Json(AvailabilityResponse {
        available: reason.is_none(),
        reason,
    }))
}

#[derive(Deserialize)]
pub struct FreeSlotsQuery {
    pub date: NaiveDate,
    pub procedure_id: Uuid,
}

#[derive(Serialize)]
pub struct FreeSlotsResponse {
    pub date: NaiveDate,
    pub slots: Vec<NaiveDateTime>,
}

pub async fn free_slots(
    State(ctx): State<ApiContext>,
    Extension(clinic): Extension<ClinicContext>,
    Path(professional_id): Path<Uuid>,
    Query(q): Query<FreeSlotsQuery>,
) -> Result<Json<FreeSlotsResponse>, ApiError> {
    let date = q.date;
    let slots = ctx
        .run(move |core| core.free_slots(&clinic.clinic_id, &professional_id, &q.procedure_id, date))
        .await?;
    Ok(Json(FreeSlotsResponse { date, slots }))
}

pub async fn list_exceptions(
    State(ctx): State<ApiContext>,
    Extension(clinic): Extension<ClinicContext>,
    Path(professional_id): Path<Uuid>,
) -> Result<Json<Vec<AvailabilityException>>, ApiError> {
    ctx.run(move |core| core.list_exceptions(&clinic.clinic_id, &professional_id))
        .await
        .map(Json)
}

#[derive(Deserialize)]
pub struct ExceptionBody {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub is_full_day: bool,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub reason: Option<String>,
}

pub async fn add_exception(
    State(ctx): State<ApiContext>,
    Extension(clinic): Extension<ClinicContext>,
    Path(professional_id): Path<Uuid>,
    Json(body): Json<ExceptionBody>,
) -> Result<(StatusCode, Json<AvailabilityException>), ApiError> {
    let new = NewException {
        professional_id,
        start_date: body.start_date,
        end_date: body.end_date,
        is_full_day: body.is_full_day,
        start_time: body.start_time,
        end_time: body.end_time,
        reason: body.reason,
    };
    let exception = ctx.run(move |core| core.add_exception(&clinic.clinic_id, &new)).await?;
    Ok((StatusCode::CREATED, Json(exception)))
}

pub async fn remove_exception(
    State(ctx): State<ApiContext>,
    Extension(clinic): Extension<ClinicContext>,
    Path(exception_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    ctx.run(move |core| core.remove_exception(&clinic.clinic_id, &exception_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
