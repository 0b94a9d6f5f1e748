use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{fmt_datetime, parse_datetime, parse_decimal, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::{CommissionKind, CommissionStatus};
use crate::models::*;

const ENTRY_COLUMNS: &str = "e.id, e.clinic_id, e.professional_id, e.appointment_id, e.kind,
     e.amount, e.status, e.note, e.created_at, e.paid_at";

pub fn insert_commission_entry(
    conn: &Connection,
    entry: &CommissionEntry,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO commission_entries (id, clinic_id, professional_id, appointment_id, kind,
         amount, status, note, created_at, paid_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            entry.id.to_string(),
            entry.clinic_id.to_string(),
            entry.professional_id.to_string(),
            entry.appointment_id.to_string(),
            entry.kind.as_str(),
            entry.amount.to_string(),
            entry.status.as_str(),
            entry.note,
            fmt_datetime(&entry.created_at),
            entry.paid_at.as_ref().map(fmt_datetime),
        ],
    )?;
    Ok(())
}

pub fn get_commission_entry(
    conn: &Connection,
    clinic_id: &Uuid,
    id: &Uuid,
) -> Result<Option<CommissionEntry>, DatabaseError> {
    let sql = format!(
        "SELECT {ENTRY_COLUMNS} FROM commission_entries e WHERE e.clinic_id = ?1 AND e.id = ?2"
    );
    let mut stmt = conn.prepare(&sql)?;
    let result = stmt.query_row(params![clinic_id.to_string(), id.to_string()], read_row);

    match result {
        Ok(row) => Ok(Some(entry_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Flip one pending entry to paid. Returns false if the entry is missing
/// or already paid.
pub fn mark_entry_paid(
    conn: &Connection,
    clinic_id: &Uuid,
    id: &Uuid,
    paid_at: &NaiveDateTime,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE commission_entries SET status = 'paid', paid_at = ?1
         WHERE clinic_id = ?2 AND id = ?3 AND status = 'pending'",
        params![fmt_datetime(paid_at), clinic_id.to_string(), id.to_string()],
    )?;
    Ok(changed == 1)
}

/// Single-statement bulk settlement of pending entries whose source
/// appointment starts in `[from, to)`.
pub fn settle_pending_in_period(
    conn: &Connection,
    clinic_id: &Uuid,
    professional_id: &Uuid,
    from: &NaiveDateTime,
    to: &NaiveDateTime,
    paid_at: &NaiveDateTime,
) -> Result<usize, DatabaseError> {
    let changed = conn.execute(
        "UPDATE commission_entries SET status = 'paid', paid_at = ?1
         WHERE clinic_id = ?2 AND professional_id = ?3 AND status = 'pending'
           AND appointment_id IN (
               SELECT id FROM appointments
               WHERE clinic_id = ?2 AND start_at >= ?4 AND start_at < ?5
           )",
        params![
            fmt_datetime(paid_at),
            clinic_id.to_string(),
            professional_id.to_string(),
            fmt_datetime(from),
            fmt_datetime(to),
        ],
    )?;
    Ok(changed)
}

/// Entries of a professional whose source appointment starts in `[from, to)`.
pub fn list_entries_in_period(
    conn: &Connection,
    clinic_id: &Uuid,
    professional_id: &Uuid,
    from: &NaiveDateTime,
    to: &NaiveDateTime,
) -> Result<Vec<CommissionEntry>, DatabaseError> {
    let sql = format!(
        "SELECT {ENTRY_COLUMNS} FROM commission_entries e
         JOIN appointments a ON a.id = e.appointment_id
         WHERE e.clinic_id = ?1 AND e.professional_id = ?2
           AND a.start_at >= ?3 AND a.start_at < ?4
         ORDER BY a.start_at, e.created_at"
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
    rows.into_iter().map(entry_from_row).collect()
}

pub fn list_entries_for_professional(
    conn: &Connection,
    clinic_id: &Uuid,
    professional_id: &Uuid,
    status: Option<CommissionStatus>,
) -> Result<Vec<CommissionEntry>, DatabaseError> {
    let sql = format!(
        "SELECT {ENTRY_COLUMNS} FROM commission_entries e
         WHERE e.clinic_id = ?1 AND e.professional_id = ?2 AND (?3 IS NULL OR e.status = ?3)
         ORDER BY e.created_at"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            params![
                clinic_id.to_string(),
                professional_id.to_string(),
                status.map(|s| s.as_str()),
            ],
            read_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(entry_from_row).collect()
}

pub fn list_entries_for_appointment(
    conn: &Connection,
    clinic_id: &Uuid,
    appointment_id: &Uuid,
) -> Result<Vec<CommissionEntry>, DatabaseError> {
    let sql = format!(
        "SELECT {ENTRY_COLUMNS} FROM commission_entries e
         WHERE e.clinic_id = ?1 AND e.appointment_id = ?2
         ORDER BY e.created_at"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            params![clinic_id.to_string(), appointment_id.to_string()],
            read_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(entry_from_row).collect()
}

// Internal row type for CommissionEntry mapping
struct EntryRow {
    id: String,
    clinic_id: String,
    professional_id: String,
    appointment_id: String,
    kind: String,
    amount: String,
    status: String,
    note: Option<String>,
    created_at: String,
    paid_at: Option<String>,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EntryRow> {
    Ok(EntryRow {
        id: row.get(0)?,
        clinic_id: row.get(1)?,
        professional_id: row.get(2)?,
        appointment_id: row.get(3)?,
        kind: row.get(4)?,
        amount: row.get(5)?,
        status: row.get(6)?,
        note: row.get(7)?,
        created_at: row.get(8)?,
        paid_at: row.get(9)?,
    })
}

fn entry_from_row(row: EntryRow) -> Result<CommissionEntry, DatabaseError> {
    Ok(CommissionEntry {
        id: parse_uuid("commission_entries.id", &row.id)?,
        clinic_id: parse_uuid("commission_entries.clinic_id", &row.clinic_id)?,
        professional_id: parse_uuid("commission_entries.professional_id", &row.professional_id)?,
        appointment_id: parse_uuid("commission_entries.appointment_id", &row.appointment_id)?,
        kind: CommissionKind::from_str(&row.kind)?,
        amount: parse_decimal("commission_entries.amount", &row.amount)?,
        status: CommissionStatus::from_str(&row.status)?,
        note: row.note,
        created_at: parse_datetime("commission_entries.created_at", &row.created_at)?,
        paid_at: row
            .paid_at
            .map(|p| parse_datetime("commission_entries.paid_at", &p))
            .transpose()?,
    })
}
