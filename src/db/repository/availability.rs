use chrono::{NaiveDate, Weekday};
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{
    fmt_date, fmt_datetime, fmt_time, parse_date, parse_datetime, parse_time, parse_uuid,
    weekday_from_index, weekday_to_index,
};
use crate::db::DatabaseError;
use crate::models::*;

// ═══════════════════════════════════════════
// Weekly template
// ═══════════════════════════════════════════

/// Replace every window of one weekday for a professional.
pub fn replace_working_windows(
    conn: &Connection,
    clinic_id: &Uuid,
    professional_id: &Uuid,
    weekday: Weekday,
    windows: &[WorkingWindow],
) -> Result<(), DatabaseError> {
    conn.execute(
        "DELETE FROM working_hours WHERE clinic_id = ?1 AND professional_id = ?2 AND weekday = ?3",
        params![
            clinic_id.to_string(),
            professional_id.to_string(),
            weekday_to_index(weekday),
        ],
    )?;

    let mut stmt = conn.prepare(
        "INSERT INTO working_hours (id, clinic_id, professional_id, weekday, open_time, close_time)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for window in windows {
        stmt.execute(params![
            window.id.to_string(),
            window.clinic_id.to_string(),
            window.professional_id.to_string(),
            weekday_to_index(window.weekday),
            fmt_time(&window.open_time),
            fmt_time(&window.close_time),
        ])?;
    }
    Ok(())
}

pub fn list_working_windows(
    conn: &Connection,
    clinic_id: &Uuid,
    professional_id: &Uuid,
) -> Result<Vec<WorkingWindow>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, clinic_id, professional_id, weekday, open_time, close_time
         FROM working_hours WHERE clinic_id = ?1 AND professional_id = ?2
         ORDER BY weekday, open_time",
    )?;

    let rows = stmt
        .query_map(
            params![clinic_id.to_string(), professional_id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(id, clinic_id, professional_id, weekday, open, close)| {
            Ok(WorkingWindow {
                id: parse_uuid("working_hours.id", &id)?,
                clinic_id: parse_uuid("working_hours.clinic_id", &clinic_id)?,
                professional_id: parse_uuid("working_hours.professional_id", &professional_id)?,
                weekday: weekday_from_index(weekday)?,
                open_time: parse_time("working_hours.open_time", &open)?,
                close_time: parse_time("working_hours.close_time", &close)?,
            })
        })
        .collect()
}

// ═══════════════════════════════════════════
// Exceptions
// ═══════════════════════════════════════════

const EXCEPTION_COLUMNS: &str = "id, clinic_id, professional_id, start_date, end_date, is_full_day,
     start_time, end_time, reason, created_at";

pub fn insert_exception(
    conn: &Connection,
    exception: &AvailabilityException,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO availability_exceptions (id, clinic_id, professional_id, start_date, end_date,
         is_full_day, start_time, end_time, reason, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            exception.id.to_string(),
            exception.clinic_id.to_string(),
            exception.professional_id.to_string(),
            fmt_date(&exception.start_date),
            fmt_date(&exception.end_date),
            exception.is_full_day as i32,
            exception.start_time.as_ref().map(fmt_time),
            exception.end_time.as_ref().map(fmt_time),
            exception.reason,
            fmt_datetime(&exception.created_at),
        ],
    )?;
    Ok(())
}

/// Returns the number of rows removed (0 or 1).
pub fn delete_exception(
    conn: &Connection,
    clinic_id: &Uuid,
    id: &Uuid,
) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM availability_exceptions WHERE clinic_id = ?1 AND id = ?2",
        params![clinic_id.to_string(), id.to_string()],
    )?;
    Ok(deleted)
}

/// Non-expired exceptions (end date on or after `today`) touching
/// `[from, to]`.
pub fn list_exceptions_overlapping(
    conn: &Connection,
    clinic_id: &Uuid,
    professional_id: &Uuid,
    from: NaiveDate,
    to: NaiveDate,
    today: NaiveDate,
) -> Result<Vec<AvailabilityException>, DatabaseError> {
    let sql = format!(
        "SELECT {EXCEPTION_COLUMNS} FROM availability_exceptions
         WHERE clinic_id = ?1 AND professional_id = ?2
           AND end_date >= ?3 AND start_date <= ?4 AND end_date >= ?5
         ORDER BY start_date, start_time"
    );
    query_exceptions(
        conn,
        &sql,
        params![
            clinic_id.to_string(),
            professional_id.to_string(),
            fmt_date(&from),
            fmt_date(&to),
            fmt_date(&today),
        ],
    )
}

/// Every non-expired exception of a professional.
pub fn list_active_exceptions(
    conn: &Connection,
    clinic_id: &Uuid,
    professional_id: &Uuid,
    today: NaiveDate,
) -> Result<Vec<AvailabilityException>, DatabaseError> {
    let sql = format!(
        "SELECT {EXCEPTION_COLUMNS} FROM availability_exceptions
         WHERE clinic_id = ?1 AND professional_id = ?2 AND end_date >= ?3
         ORDER BY start_date, start_time"
    );
    query_exceptions(
        conn,
        &sql,
        params![clinic_id.to_string(), professional_id.to_string(), fmt_date(&today)],
    )
}

// Internal row type for exception mapping
struct ExceptionRow {
    id: String,
    clinic_id: String,
    professional_id: String,
    start_date: String,
    end_date: String,
    is_full_day: i32,
    start_time: Option<String>,
    end_time: Option<String>,
    reason: Option<String>,
    created_at: String,
}

fn query_exceptions(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<AvailabilityException>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, |row| {
            Ok(ExceptionRow {
                id: row.get(0)?,
                clinic_id: row.get(1)?,
                professional_id: row.get(2)?,
                start_date: row.get(3)?,
                end_date: row.get(4)?,
                is_full_day: row.get(5)?,
                start_time: row.get(6)?,
                end_time: row.get(7)?,
                reason: row.get(8)?,
                created_at: row.get(9)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter().map(exception_from_row).collect()
}

fn exception_from_row(row: ExceptionRow) -> Result<AvailabilityException, DatabaseError> {
    Ok(AvailabilityException {
        id: parse_uuid("availability_exceptions.id", &row.id)?,
        clinic_id: parse_uuid("availability_exceptions.clinic_id", &row.clinic_id)?,
        professional_id: parse_uuid(
            "availability_exceptions.professional_id",
            &row.professional_id,
        )?,
        start_date: parse_date("availability_exceptions.start_date", &row.start_date)?,
        end_date: parse_date("availability_exceptions.end_date", &row.end_date)?,
        is_full_day: row.is_full_day != 0,
        start_time: row
            .start_time
            .map(|t| parse_time("availability_exceptions.start_time", &t))
            .transpose()?,
        end_time: row
            .end_time
            .map(|t| parse_time("availability_exceptions.end_time", &t))
            .transpose()?,
        reason: row.reason,
        created_at: parse_datetime("availability_exceptions.created_at", &row.created_at)?,
    })
}
