//! Inventory Ledger and Kit Catalog endpoints.
//!
//! - `POST /api/inventory/items`
//! - `GET  /api/inventory/items/:id`
//! - `POST /api/inventory/items/:id/adjust`: quick ±n
//! - `POST /api/inventory/items/:id/restock`
//! - `GET  /api/inventory/items/:id/movements`
//! - `GET  /api/inventory/low-stock`
//! - `GET  /api/procedures/:id/kit`
//! - `PUT  /api/procedures/:id/kit/:item_id`
//! - `DELETE /api/procedures/:id/kit/:item_id`

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ClinicContext};
use crate::models::{InventoryItem, KitComponent, NewInventoryItem, StockMovement};

#[derive(Serialize)]
pub struct StockLevel {
    pub item_id: Uuid,
    pub on_hand: Decimal,
}

pub async fn create_item(
    State(ctx): State<ApiContext>,
    Extension(clinic): Extension<ClinicContext>,
    Json(new): Json<NewInventoryItem>,
) -> Result<(StatusCode, Json<InventoryItem>), ApiError> {
    let item = ctx.run(move |core| core.create_item(&clinic.clinic_id, &new)).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn get_item(
    State(ctx): State<ApiContext>,
    Extension(clinic): Extension<ClinicContext>,
    Path(item_id): Path<Uuid>,
) -> Result<Json<InventoryItem>, ApiError> {
    ctx.run(move |core| core.get_item(&clinic.clinic_id, &item_id))
        .await
        .map(Json)
}

#[derive(Deserialize)]
pub struct AdjustBody {
    pub delta: Decimal,
}

pub async fn adjust(
    State(ctx): State<ApiContext>,
    Extension(clinic): Extension<ClinicContext>,
    Path(item_id): Path<Uuid>,
    Json(body): Json<AdjustBody>,
) -> Result<Json<StockLevel>, ApiError> {
    let on_hand = ctx
        .run(move |core| core.adjust_stock(&clinic.clinic_id, &item_id, body.delta))
        .await?;
    Ok(Json(StockLevel { item_id, on_hand }))
}

#[derive(Deserialize)]
pub struct QuantityBody {
    pub quantity: Decimal,
}

pub async fn restock(
    State(ctx): State<ApiContext>,
    Extension(clinic): Extension<ClinicContext>,
    Path(item_id): Path<Uuid>,
    Json(body): Json<QuantityBody>,
) -> Result<Json<StockLevel>, ApiError> {
    let on_hand = ctx
        .run(move |core| core.increment(&clinic.clinic_id, &item_id, body.quantity))
        .await?;
    Ok(Json(StockLevel { item_id, on_hand }))
}

pub async fn movements(
    State(ctx): State<ApiContext>,
    Extension(clinic): Extension<ClinicContext>,
    Path(item_id): Path<Uuid>,
) -> Result<Json<Vec<StockMovement>>, ApiError> {
    ctx.run(move |core| core.stock_history(&clinic.clinic_id, &item_id))
        .await
        .map(Json)
}

pub async fn low_stock(
    State(ctx): State<ApiContext>,
    Extension(clinic): Extension<ClinicContext>,
) -> Result<Json<Vec<InventoryItem>>, ApiError> {
    ctx.run(move |core| core.low_stock(&clinic.clinic_id))
        .await
        .map(Json)
}

pub async fn kit(
    State(ctx): State<ApiContext>,
    Extension(clinic): Extension<ClinicContext>,
    Path(procedure_id): Path<Uuid>,
) -> Result<Json<Vec<KitComponent>>, ApiError> {
    ctx.run(move |core| core.items_for(&clinic.clinic_id, &procedure_id))
        .await
        .map(Json)
}

pub async fn set_kit_item(
    State(ctx): State<ApiContext>,
    Extension(clinic): Extension<ClinicContext>,
    Path((procedure_id, item_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<QuantityBody>,
) -> Result<Json<KitComponent>, ApiError> {
    ctx.run(move |core| core.set_kit_item(&clinic.clinic_id, &procedure_id, &item_id, body.quantity))
        .await
        .map(Json)
}

pub async fn remove_kit_item(
    State(ctx): State<ApiContext>,
    Extension(clinic): Extension<ClinicContext>,
    Path((procedure_id, item_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    ctx.run(move |core| core.remove_kit_item(&clinic.clinic_id, &procedure_id, &item_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
