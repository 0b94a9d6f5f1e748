//! Directory endpoints: the inbound professional and procedure records
//! the ledger needs.
//!
//! - `PUT /api/professionals/:id`
//! - `PUT /api/procedures/:id`

use axum::extract::{Path, State};
use axum::{Extension, Json};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ClinicContext};
use crate::models::{Procedure, Professional};

#[derive(Deserialize)]
pub struct ProfessionalBody {
    pub name: String,
    pub commission_rate: Decimal,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

pub async fn put_professional(
    State(ctx): State<ApiContext>,
    Extension(clinic): Extension<ClinicContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<ProfessionalBody>,
) -> Result<Json<Professional>, ApiError> {
    let prof = Professional {
        id,
        clinic_id: clinic.clinic_id,
        name: body.name,
        commission_rate: body.commission_rate,
        active: body.active,
    };
    ctx.run(move |core| {
        core.save_professional(&prof)?;
        core.get_professional(&prof.clinic_id, &prof.id)
    })
    .await
    .map(Json)
}

#[derive(Deserialize)]
pub struct ProcedureBody {
    pub name: String,
    pub duration_minutes: i64,
    pub price: Decimal,
}

pub async fn put_procedure(
    State(ctx): State<ApiContext>,
    Extension(clinic): Extension<ClinicContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<ProcedureBody>,
) -> Result<Json<Procedure>, ApiError> {
    let proc = Procedure {
        id,
        clinic_id: clinic.clinic_id,
        name: body.name,
        duration_minutes: body.duration_minutes,
        price: body.price,
    };
    ctx.run(move |core| {
        core.save_procedure(&proc)?;
        core.get_procedure(&proc.clinic_id, &proc.id)
    })
    .await
    .map(Json)
}
