use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{fmt_datetime, parse_datetime, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::AppointmentStatus;
use crate::models::*;

const APPOINTMENT_COLUMNS: &str = "id, clinic_id, patient_id, professional_id, procedure_id,
     start_at, end_at, room, notes, status, created_at, updated_at";

pub fn insert_appointment(conn: &Connection, appt: &Appointment) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO appointments (id, clinic_id, patient_id, professional_id, procedure_id,
         start_at, end_at, room, notes, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            appt.id.to_string(),
            appt.clinic_id.to_string(),
            appt.patient_id.to_string(),
            appt.professional_id.to_string(),
            appt.procedure_id.to_string(),
            fmt_datetime(&appt.start_at),
            fmt_datetime(&appt.end_at),
            appt.room,
            appt.notes,
            appt.status.as_str(),
            fmt_datetime(&appt.created_at),
            fmt_datetime(&appt.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_appointment(
    conn: &Connection,
    clinic_id: &Uuid,
    id: &Uuid,
) -> Result<Option<Appointment>, DatabaseError> {
    let sql = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE clinic_id = ?1 AND id = ?2");
    let mut stmt = conn.prepare(&sql)?;

    let result = stmt.query_row(params![clinic_id.to_string(), id.to_string()], read_row);

    match result {
        Ok(row) => Ok(Some(appointment_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn update_appointment_schedule(
    conn: &Connection,
    id: &Uuid,
    start_at: &NaiveDateTime,
    end_at: &NaiveDateTime,
    updated_at: &NaiveDateTime,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE appointments SET start_at = ?1, end_at = ?2, updated_at = ?3 WHERE id = ?4",
        params![
            fmt_datetime(start_at),
            fmt_datetime(end_at),
            fmt_datetime(updated_at),
            id.to_string(),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Appointment".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Compare-and-set on status: only succeeds while the row is still in
/// `expected`, so a concurrent transition cannot be overwritten.
pub fn update_appointment_status(
    conn: &Connection,
    id: &Uuid,
    expected: AppointmentStatus,
    status: AppointmentStatus,
    updated_at: &NaiveDateTime,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE appointments SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
        params![
            status.as_str(),
            fmt_datetime(updated_at),
            id.to_string(),
            expected.as_str(),
        ],
    )?;
    Ok(changed == 1)
}

/// First active appointment of the professional whose `[start, end)`
/// overlaps the given interval, ignoring `exclude`.
pub fn find_overlapping_appointment(
    conn: &Connection,
    clinic_id: &Uuid,
    professional_id: &Uuid,
    start_at: &NaiveDateTime,
    end_at: &NaiveDateTime,
    exclude: Option<&Uuid>,
) -> Result<Option<Uuid>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id FROM appointments
         WHERE clinic_id = ?1 AND professional_id = ?2
           AND status IN ('scheduled', 'confirmed', 'arrived', 'in_service')
           AND start_at < ?3 AND ?4 < end_at
           AND (?5 IS NULL OR id != ?5)
         ORDER BY start_at LIMIT 1",
        params![
            clinic_id.to_string(),
            professional_id.to_string(),
            fmt_datetime(end_at),
            fmt_datetime(start_at),
            exclude.map(|id| id.to_string()),
        ],
        |row| row.get::<_, String>(0),
    );

    match result {
        Ok(id) => Ok(Some(parse_uuid("appointments.id", &id)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Appointments of a professional starting in `[from, to)`, any status.
pub fn list_appointments_for_professional(
    conn: &Connection,
    clinic_id: &Uuid,
    professional_id: &Uuid,
    from: &NaiveDateTime,
    to: &NaiveDateTime,
) -> Result<Vec<Appointment>, DatabaseError> {
    let sql = format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE clinic_id = ?1 AND professional_id = ?2 AND start_at >= ?3 AND start_at < ?4
         ORDER BY start_at"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            params![
                clinic_id.to_string(),
                professional_id.to_string(),
                fmt_datetime(from),
                fmt_datetime(to),
            ],
            read_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter().map(appointment_from_row).collect()
}

// ═══════════════════════════════════════════
// Status history
// ═══════════════════════════════════════════

pub fn insert_status_change(conn: &Connection, change: &StatusChange) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO appointment_status_history
         (appointment_id, from_status, to_status, start_at, reason, changed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            change.appointment_id.to_string(),
            change.from_status.map(|s| s.as_str()),
            change.to_status.as_str(),
            fmt_datetime(&change.start_at),
            change.reason,
            fmt_datetime(&change.changed_at),
        ],
    )?;
    Ok(())
}

pub fn list_status_history(
    conn: &Connection,
    appointment_id: &Uuid,
) -> Result<Vec<StatusChange>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT appointment_id, from_status, to_status, start_at, reason, changed_at
         FROM appointment_status_history WHERE appointment_id = ?1 ORDER BY id",
    )?;
    let rows = stmt
        .query_map(params![appointment_id.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(appointment_id, from, to, start_at, reason, changed_at)| {
            Ok(StatusChange {
                appointment_id: parse_uuid("appointment_status_history.appointment_id", &appointment_id)?,
                from_status: from.map(|s| AppointmentStatus::from_str(&s)).transpose()?,
                to_status: AppointmentStatus::from_str(&to)?,
                start_at: parse_datetime("appointment_status_history.start_at", &start_at)?,
                reason,
                changed_at: parse_datetime("appointment_status_history.changed_at", &changed_at)?,
            })
        })
        .collect()
}

// Internal row type for Appointment mapping
struct AppointmentRow {
    id: String,
    clinic_id: String,
    patient_id: String,
    professional_id: String,
    procedure_id: String,
    start_at: String,
    end_at: String,
    room: Option<String>,
    notes: Option<String>,
    status: String,
    created_at: String,
    updated_at: String,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AppointmentRow> {
    Ok(AppointmentRow {
        id: row.get(0)?,
        clinic_id: row.get(1)?,
        patient_id: row.get(2)?,
        professional_id: row.get(3)?,
        procedure_id: row.get(4)?,
        start_at: row.get(5)?,
        end_at: row.get(6)?,
        room: row.get(7)?,
        notes: row.get(8)?,
        status: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn appointment_from_row(row: AppointmentRow) -> Result<Appointment, DatabaseError> {
    Ok(Appointment {
        id: parse_uuid("appointments.id", &row.id)?,
        clinic_id: parse_uuid("appointments.clinic_id", &row.clinic_id)?,
        patient_id: parse_uuid("appointments.patient_id", &row.patient_id)?,
        professional_id: parse_uuid("appointments.professional_id", &row.professional_id)?,
        procedure_id: parse_uuid("appointments.procedure_id", &row.procedure_id)?,
        start_at: parse_datetime("appointments.start_at", &row.start_at)?,
        end_at: parse_datetime("appointments.end_at", &row.end_at)?,
        room: row.room,
        notes: row.notes,
        status: AppointmentStatus::from_str(&row.status)?,
        created_at: parse_datetime("appointments.created_at", &row.created_at)?,
        updated_at: parse_datetime("appointments.updated_at", &row.updated_at)?,
    })
}
