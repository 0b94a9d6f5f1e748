//! Availability Calendar.
//!
//! Answers "is professional P bookable for `[start, end)`?" by folding the
//! weekly working-hours template with every non-expired exception touching
//! the requested days. Nothing computed here is persisted.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use rusqlite::Connection;
use uuid::Uuid;

use crate::db;
use crate::directory;
use crate::error::{ConflictReason, CoreError};
use crate::models::*;

const MAX_REASON_LEN: usize = 500;

// ═══════════════════════════════════════════
// Weekly template
// ═══════════════════════════════════════════

/// Replace the windows of one weekday. An empty slice makes the weekday a
/// day off. Windows may touch but not overlap.
pub fn set_weekly_hours(
    conn: &Connection,
    clinic_id: &Uuid,
    professional_id: &Uuid,
    weekday: Weekday,
    windows: &[(NaiveTime, NaiveTime)],
) -> Result<Vec<WorkingWindow>, CoreError> {
    directory::require_professional(conn, clinic_id, professional_id)?;

    let mut sorted = windows.to_vec();
    sorted.sort();
    for (open, close) in &sorted {
        if open_offset(*open) >= close_offset(*close) {
            return Err(CoreError::Validation(format!(
                "Working window must open before it closes ({open} >= {close})"
            )));
        }
    }
    for pair in sorted.windows(2) {
        if open_offset(pair[1].0) < close_offset(pair[0].1) {
            return Err(CoreError::Validation(format!(
                "Working windows overlap on {weekday}"
            )));
        }
    }

    let rows: Vec<WorkingWindow> = sorted
        .into_iter()
        .map(|(open_time, close_time)| WorkingWindow {
            id: Uuid::new_v4(),
            clinic_id: *clinic_id,
            professional_id: *professional_id,
            weekday,
            open_time,
            close_time,
        })
        .collect();

    db::replace_working_windows(conn, clinic_id, professional_id, weekday, &rows)?;
    tracing::info!(
        professional_id = %professional_id,
        weekday = %weekday,
        windows = rows.len(),
        "weekly hours updated"
    );
    Ok(rows)
}

pub fn weekly_hours(
    conn: &Connection,
    clinic_id: &Uuid,
    professional_id: &Uuid,
) -> Result<Vec<WorkingWindow>, CoreError> {
    Ok(db::list_working_windows(conn, clinic_id, professional_id)?)
}

// ═══════════════════════════════════════════
// Exceptions
// ═══════════════════════════════════════════

pub fn validate_exception(new: &NewException) -> Result<(), CoreError> {
    if new.start_date > new.end_date {
        return Err(CoreError::Validation(
            "Exception start date must not be after its end date".into(),
        ));
    }
    if !new.is_full_day {
        match (new.start_time, new.end_time) {
            (Some(start), Some(end)) if start < end => {}
            (Some(_), Some(_)) => {
                return Err(CoreError::Validation(
                    "Exception start time must be before its end time".into(),
                ))
            }
            _ => {
                return Err(CoreError::Validation(
                    "Partial-day exception requires both start and end time".into(),
                ))
            }
        }
    }
    if new.reason.as_ref().is_some_and(|r| r.chars().count() > MAX_REASON_LEN) {
        return Err(CoreError::Validation("Exception reason too long".into()));
    }
    Ok(())
}

pub fn add_exception(
    conn: &Connection,
    clinic_id: &Uuid,
    new: &NewException,
    now: NaiveDateTime,
) -> Result<AvailabilityException, CoreError> {
    validate_exception(new)?;
    directory::require_professional(conn, clinic_id, &new.professional_id)?;

    // Times carry no meaning on a full-day block.
    let (start_time, end_time) = if new.is_full_day {
        (None, None)
    } else {
        (new.start_time, new.end_time)
    };

    let exception = AvailabilityException {
        id: Uuid::new_v4(),
        clinic_id: *clinic_id,
        professional_id: new.professional_id,
        start_date: new.start_date,
        end_date: new.end_date,
        is_full_day: new.is_full_day,
        start_time,
        end_time,
        reason: new.reason.clone(),
        created_at: now,
    };
    db::insert_exception(conn, &exception)?;

    tracing::info!(
        exception_id = %exception.id,
        professional_id = %exception.professional_id,
        start_date = %exception.start_date,
        end_date = %exception.end_date,
        full_day = exception.is_full_day,
        "availability exception added"
    );
    Ok(exception)
}

pub fn remove_exception(conn: &Connection, clinic_id: &Uuid, id: &Uuid) -> Result<(), CoreError> {
    if db::delete_exception(conn, clinic_id, id)? == 0 {
        return Err(CoreError::not_found("AvailabilityException", id));
    }
    tracing::info!(exception_id = %id, "availability exception removed");
    Ok(())
}

/// Non-expired exceptions of a professional.
pub fn list_exceptions(
    conn: &Connection,
    clinic_id: &Uuid,
    professional_id: &Uuid,
    today: NaiveDate,
) -> Result<Vec<AvailabilityException>, CoreError> {
    Ok(db::list_active_exceptions(conn, clinic_id, professional_id, today)?)
}

// ═══════════════════════════════════════════
// Queries
// ═══════════════════════════════════════════

/// `None` when the interval is bookable, otherwise the first reason it is not.
pub fn check_availability(
    conn: &Connection,
    clinic_id: &Uuid,
    professional_id: &Uuid,
    start: NaiveDateTime,
    end: NaiveDateTime,
    today: NaiveDate,
) -> Result<Option<ConflictReason>, CoreError> {
    if end <= start {
        return Err(CoreError::Validation("Interval end must be after its start".into()));
    }

    let windows = db::list_working_windows(conn, clinic_id, professional_id)?;
    let exceptions = db::list_exceptions_overlapping(
        conn,
        clinic_id,
        professional_id,
        start.date(),
        last_day(end),
        today,
    )?;

    let verdict = evaluate(&windows, &exceptions, start, end);
    tracing::debug!(
        professional_id = %professional_id,
        start = %start,
        end = %end,
        available = verdict.is_none(),
        "availability checked"
    );
    Ok(verdict)
}

pub fn is_available(
    conn: &Connection,
    clinic_id: &Uuid,
    professional_id: &Uuid,
    start: NaiveDateTime,
    end: NaiveDateTime,
    today: NaiveDate,
) -> Result<bool, CoreError> {
    Ok(check_availability(conn, clinic_id, professional_id, start, end, today)?.is_none())
}

/// Start instants on `date` where a booking of `duration` passes both the
/// availability and the double-booking checks. Candidates step by `step`
/// from the opening of each working window.
pub fn free_slots(
    conn: &Connection,
    clinic_id: &Uuid,
    professional_id: &Uuid,
    date: NaiveDate,
    duration: Duration,
    step: Duration,
    today: NaiveDate,
) -> Result<Vec<NaiveDateTime>, CoreError> {
    if duration <= Duration::zero() || step <= Duration::zero() {
        return Err(CoreError::Validation(
            "Slot duration and step must be positive".into(),
        ));
    }

    let windows = db::list_working_windows(conn, clinic_id, professional_id)?;
    let exceptions = db::list_exceptions_overlapping(
        conn,
        clinic_id,
        professional_id,
        date,
        date,
        today,
    )?;
    let from = date.pred_opt().unwrap_or(date).and_time(NaiveTime::MIN);
    let to = next_midnight(date).unwrap_or(NaiveDateTime::MAX);
    let booked: Vec<(NaiveDateTime, NaiveDateTime)> = db::list_appointments_for_professional(
        conn,
        clinic_id,
        professional_id,
        &from,
        &to,
    )?
    .into_iter()
    .filter(|a| !a.status.is_terminal())
    .map(|a| (a.start_at, a.end_at))
    .collect();

    let mut slots = Vec::new();
    for (open, close) in merged_windows(&windows, date) {
        let mut candidate = open;
        while let Some(candidate_end) = candidate.checked_add_signed(duration) {
            if candidate_end > close {
                break;
            }
            let clashes = booked
                .iter()
                .any(|(s, e)| candidate < *e && *s < candidate_end);
            if !clashes && evaluate(&windows, &exceptions, candidate, candidate_end).is_none() {
                slots.push(candidate);
            }
            match candidate.checked_add_signed(step) {
                Some(next) => candidate = next,
                None => break,
            }
        }
    }
    Ok(slots)
}

// ═══════════════════════════════════════════
// Evaluation
// ═══════════════════════════════════════════

/// Last calendar day touched by a half-open interval ending at `end`.
fn last_day(end: NaiveDateTime) -> NaiveDate {
    (end - Duration::seconds(1)).date()
}

fn next_midnight(date: NaiveDate) -> Option<NaiveDateTime> {
    date.succ_opt().map(|next| next.and_time(NaiveTime::MIN))
}

/// Same-weekday windows as absolute instants on `date`, touching windows merged.
fn merged_windows(windows: &[WorkingWindow], date: NaiveDate) -> Vec<(NaiveDateTime, NaiveDateTime)> {
    let day_start = date.and_time(NaiveTime::MIN);
    let mut day: Vec<(NaiveDateTime, NaiveDateTime)> = windows
        .iter()
        .filter(|w| w.weekday == date.weekday())
        .map(|w| {
            let close = day_start
                .checked_add_signed(close_offset(w.close_time))
                .unwrap_or(NaiveDateTime::MAX);
            (date.and_time(w.open_time), close)
        })
        .collect();
    day.sort();

    let mut merged: Vec<(NaiveDateTime, NaiveDateTime)> = Vec::with_capacity(day.len());
    for (open, close) in day {
        match merged.last_mut() {
            Some(last) if open <= last.1 => last.1 = last.1.max(close),
            _ => merged.push((open, close)),
        }
    }
    merged
}

fn evaluate(
    windows: &[WorkingWindow],
    exceptions: &[AvailabilityException],
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Option<ConflictReason> {
    let mut day = start.date();
    let last = last_day(end);

    while day <= last {
        let day_start = day.and_time(NaiveTime::MIN);
        let seg_start = start.max(day_start);
        let seg_end = next_midnight(day).map_or(end, |midnight| end.min(midnight));

        // A full-day block wins over the template.
        for exception in exceptions.iter().filter(|e| e.covers_date(day)) {
            if exception.is_full_day {
                return Some(ConflictReason::Blocked {
                    exception_id: exception.id,
                });
            }
            if let (Some(from), Some(to)) = (exception.start_time, exception.end_time) {
                let (block_start, block_end) = (day.and_time(from), day.and_time(to));
                if seg_start < block_end && block_start < seg_end {
                    return Some(ConflictReason::Blocked {
                        exception_id: exception.id,
                    });
                }
            }
        }

        let covered = merged_windows(windows, day)
            .iter()
            .any(|(open, close)| *open <= seg_start && seg_end <= *close);
        if !covered {
            return Some(ConflictReason::OutsideWorkingHours);
        }

        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    None
}
