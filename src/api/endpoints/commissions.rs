//! Commission Ledger endpoints.
//!
//! - `POST /api/commissions/:id/settle`
//! - `POST /api/professionals/:id/commissions/settle`: period close-out
//! - `GET  /api/professionals/:id/commissions/summary?start=&end=`
//! - `GET  /api/professionals/:id/commissions?status=`
//! - `GET  /api/appointments/:id/commissions`
//! - `POST /api/appointments/:id/commissions/adjustments`

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ClinicContext};
use crate::models::enums::CommissionStatus;
use crate::models::{CommissionEntry, CommissionSummary};

pub async fn settle(
    State(ctx): State<ApiContext>,
    Extension(clinic): Extension<ClinicContext>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<CommissionEntry>, ApiError> {
    ctx.run(move |core| core.settle(&clinic.clinic_id, &entry_id))
        .await
        .map(Json)
}

#[derive(Deserialize)]
pub struct PeriodBody {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
}

#[derive(Serialize)]
pub struct SettlePeriodResponse {
    pub professional_id: Uuid,
    pub settled: usize,
}

pub async fn settle_period(
    State(ctx): State<ApiContext>,
    Extension(clinic): Extension<ClinicContext>,
    Path(professional_id): Path<Uuid>,
    Json(period): Json<PeriodBody>,
) -> Result<Json<SettlePeriodResponse>, ApiError> {
    let settled = ctx
        .run(move |core| {
            core.settle_period(&clinic.clinic_id, &professional_id, period.period_start, period.period_end)
        })
        .await?;
    Ok(Json(SettlePeriodResponse {
        professional_id,
        settled,
    }))
}

#[derive(Deserialize)]
pub struct SummaryQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

pub async fn summary(
    State(ctx): State<ApiContext>,
    Extension(clinic): Extension<ClinicContext>,
    Path(professional_id): Path<Uuid>,
    Query(q): Query<SummaryQuery>,
) -> Result<Json<CommissionSummary>, ApiError> {
    ctx.run(move |core| core.summarize(&clinic.clinic_id, &professional_id, q.start, q.end))
        .await
        .map(Json)
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub status: Option<CommissionStatus>,
}

pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(clinic): Extension<ClinicContext>,
    Path(professional_id): Path<Uuid>,
    Query(q): Query<ListQuery>,
) -> Result<Json<Vec<CommissionEntry>>, ApiError> {
    ctx.run(move |core| core.list_entries(&clinic.clinic_id, &professional_id, q.status))
        .await
        .map(Json)
}

pub async fn for_appointment(
    State(ctx): State<ApiContext>,
    Extension(clinic): Extension<ClinicContext>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Vec<CommissionEntry>>, ApiError> {
    ctx.run(move |core| core.entries_for_appointment(&clinic.clinic_id, &appointment_id))
        .await
        .map(Json)
}

#[derive(Deserialize)]
pub struct AdjustmentBody {
    pub amount: Decimal,
    pub note: String,
}

pub async fn post_adjustment(
    State(ctx): State<ApiContext>,
    Extension(clinic): Extension<ClinicContext>,
    Path(appointment_id): Path<Uuid>,
    Json(body): Json<AdjustmentBody>,
) -> Result<(StatusCode, Json<CommissionEntry>), ApiError> {
    let entry = ctx
        .run(move |core| core.post_adjustment(&clinic.clinic_id, &appointment_id, body.amount, &body.note))
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}
