//! Inbound reference data: professionals and procedures.
//!
//! These rows are owned by the surrounding directory and catalog modules;
//! the core only needs a validated upsert and lookups that fail with
//! `NotFound`. A procedure with a non-positive duration is refused here so
//! booking never sees one.

use rusqlite::Connection;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::db;
use crate::error::CoreError;
use crate::models::{Procedure, Professional};

const MAX_NAME_LEN: usize = 200;
const MAX_DURATION_MINUTES: i64 = 24 * 60;

fn validate_name(kind: &str, name: &str) -> Result<(), CoreError> {
    if name.trim().is_empty() {
        return Err(CoreError::Validation(format!("{kind} name is required")));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(CoreError::Validation(format!("{kind} name too long")));
    }
    Ok(())
}

pub fn save_professional(conn: &Connection, prof: &Professional) -> Result<(), CoreError> {
    validate_name("Professional", &prof.name)?;
    if prof.commission_rate < Decimal::ZERO || prof.commission_rate > Decimal::ONE_HUNDRED {
        return Err(CoreError::Validation(format!(
            "Commission rate must be between 0 and 100, got {}",
            prof.commission_rate
        )));
    }
    db::upsert_professional(conn, prof)?;
    tracing::debug!(professional_id = %prof.id, "professional saved");
    Ok(())
}

pub fn save_procedure(conn: &Connection, proc: &Procedure) -> Result<(), CoreError> {
    validate_name("Procedure", &proc.name)?;
    if proc.duration_minutes <= 0 {
        return Err(CoreError::Validation(format!(
            "Procedure duration must be positive, got {} minutes",
            proc.duration_minutes
        )));
    }
    if proc.duration_minutes > MAX_DURATION_MINUTES {
        return Err(CoreError::Validation("Procedure duration exceeds one day".into()));
    }
    if proc.price < Decimal::ZERO {
        return Err(CoreError::Validation("Procedure price cannot be negative".into()));
    }
    db::upsert_procedure(conn, proc)?;
    tracing::debug!(procedure_id = %proc.id, "procedure saved");
    Ok(())
}

pub fn require_professional(
    conn: &Connection,
    clinic_id: &Uuid,
    id: &Uuid,
) -> Result<Professional, CoreError> {
    db::get_professional(conn, clinic_id, id)?.ok_or_else(|| CoreError::not_found("Professional", id))
}

pub fn require_procedure(
    conn: &Connection,
    clinic_id: &Uuid,
    id: &Uuid,
) -> Result<Procedure, CoreError> {
    db::get_procedure(conn, clinic_id, id)?.ok_or_else(|| CoreError::not_found("Procedure", id))
}
