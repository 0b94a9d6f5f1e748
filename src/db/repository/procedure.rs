use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{parse_decimal, parse_uuid};
use crate::db::DatabaseError;
use crate::models::*;

pub fn upsert_procedure(conn: &Connection, proc: &Procedure) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO procedures (id, clinic_id, name, duration_minutes, price)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            duration_minutes = excluded.duration_minutes,
            price = excluded.price
         WHERE procedures.clinic_id = excluded.clinic_id",
        params![
            proc.id.to_string(),
            proc.clinic_id.to_string(),
            proc.name,
            proc.duration_minutes,
            proc.price.to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_procedure(
    conn: &Connection,
    clinic_id: &Uuid,
    id: &Uuid,
) -> Result<Option<Procedure>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, clinic_id, name, duration_minutes, price
         FROM procedures WHERE clinic_id = ?1 AND id = ?2",
    )?;

    let result = stmt.query_row(params![clinic_id.to_string(), id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, i64>(3)?,
            row.get::<_, String>(4)?,
        ))
    });

    match result {
        Ok((id, clinic_id, name, duration_minutes, price)) => Ok(Some(Procedure {
            id: parse_uuid("procedures.id", &id)?,
            clinic_id: parse_uuid("procedures.clinic_id", &clinic_id)?,
            name,
            duration_minutes,
            price: parse_decimal("procedures.price", &price)?,
        })),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
