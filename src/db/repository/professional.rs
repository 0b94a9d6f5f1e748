use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{parse_decimal, parse_uuid};
use crate::db::DatabaseError;
use crate::models::*;

pub fn upsert_professional(conn: &Connection, prof: &Professional) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO professionals (id, clinic_id, name, commission_rate, active)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            commission_rate = excluded.commission_rate,
            active = excluded.active
         WHERE professionals.clinic_id = excluded.clinic_id",
        params![
            prof.id.to_string(),
            prof.clinic_id.to_string(),
            prof.name,
            prof.commission_rate.to_string(),
            prof.active as i32,
        ],
    )?;
    Ok(())
}

pub fn get_professional(
    conn: &Connection,
    clinic_id: &Uuid,
    id: &Uuid,
) -> Result<Option<Professional>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, clinic_id, name, commission_rate, active
         FROM professionals WHERE clinic_id = ?1 AND id = ?2",
    )?;

    let result = stmt.query_row(params![clinic_id.to_string(), id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, i32>(4)?,
        ))
    });

    match result {
        Ok((id, clinic_id, name, rate, active)) => Ok(Some(Professional {
            id: parse_uuid("professionals.id", &id)?,
            clinic_id: parse_uuid("professionals.clinic_id", &clinic_id)?,
            name,
            commission_rate: parse_decimal("professionals.commission_rate", &rate)?,
            active: active != 0,
        })),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
