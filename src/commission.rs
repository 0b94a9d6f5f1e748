//! Commission Ledger.
//!
//! Entries are append-only: the amount never changes after insert (a
//! storage trigger refuses it) and corrections are posted as offsetting
//! `adjustment` entries. Settlement flips `pending` to `paid` and stamps
//! `paid_at` in the same statement.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use rusqlite::Connection;
use uuid::Uuid;

use crate::db;
use crate::directory;
use crate::error::CoreError;
use crate::models::enums::{AppointmentStatus, CommissionKind, CommissionStatus};
use crate::models::*;

const MAX_NOTE_LEN: usize = 500;

/// `price * rate / 100`, kept exact. Rounding is left to whoever displays it.
pub fn compute_commission(price: Decimal, rate: Decimal) -> Decimal {
    price * rate / Decimal::ONE_HUNDRED
}

/// Inclusive date range as half-open instants.
fn period_bounds(
    period_start: NaiveDate,
    period_end: NaiveDate,
) -> Result<(NaiveDateTime, NaiveDateTime), CoreError> {
    if period_start > period_end {
        return Err(CoreError::Validation(
            "Period start must not be after period end".into(),
        ));
    }
    Ok((
        period_start.and_time(NaiveTime::MIN),
        period_end
            .succ_opt()
            .map_or(NaiveDateTime::MAX, |next| next.and_time(NaiveTime::MIN)),
    ))
}

/// Record the pending accrual for a completed appointment.
pub fn post_accrual(
    conn: &Connection,
    appointment: &Appointment,
    procedure: &Procedure,
    professional: &Professional,
    now: NaiveDateTime,
) -> Result<CommissionEntry, CoreError> {
    let entry = CommissionEntry {
        id: Uuid::new_v4(),
        clinic_id: appointment.clinic_id,
        professional_id: professional.id,
        appointment_id: appointment.id,
        kind: CommissionKind::Accrual,
        amount: compute_commission(procedure.price, professional.commission_rate),
        status: CommissionStatus::Pending,
        note: None,
        created_at: now,
        paid_at: None,
    };
    db::insert_commission_entry(conn, &entry)?;

    tracing::info!(
        entry_id = %entry.id,
        appointment_id = %appointment.id,
        professional_id = %professional.id,
        amount = %entry.amount,
        "commission accrued"
    );
    Ok(entry)
}

/// Post an offsetting entry against a completed appointment's accrual.
pub fn post_adjustment(
    conn: &Connection,
    clinic_id: &Uuid,
    appointment_id: &Uuid,
    amount: Decimal,
    note: &str,
    now: NaiveDateTime,
) -> Result<CommissionEntry, CoreError> {
    if amount.is_zero() {
        return Err(CoreError::Validation("Adjustment amount must be non-zero".into()));
    }
    if note.trim().is_empty() || note.chars().count() > MAX_NOTE_LEN {
        return Err(CoreError::Validation(
            "Adjustment note must be 1-500 characters".into(),
        ));
    }

    let appointment = db::get_appointment(conn, clinic_id, appointment_id)?
        .ok_or_else(|| CoreError::not_found("Appointment", appointment_id))?;
    if appointment.status != AppointmentStatus::Completed {
        return Err(CoreError::Validation(format!(
            "Adjustments apply to completed appointments, this one is {}",
            appointment.status
        )));
    }

    let entry = CommissionEntry {
        id: Uuid::new_v4(),
        clinic_id: *clinic_id,
        professional_id: appointment.professional_id,
        appointment_id: appointment.id,
        kind: CommissionKind::Adjustment,
        amount,
        status: CommissionStatus::Pending,
        note: Some(note.trim().to_string()),
        created_at: now,
        paid_at: None,
    };
    db::insert_commission_entry(conn, &entry)?;

    tracing::info!(
        entry_id = %entry.id,
        appointment_id = %appointment.id,
        amount = %entry.amount,
        "commission adjustment posted"
    );
    Ok(entry)
}

/// Settle one entry. Settling an already-paid entry returns it unchanged.
pub fn settle(
    conn: &Connection,
    clinic_id: &Uuid,
    entry_id: &Uuid,
    now: NaiveDateTime,
) -> Result<CommissionEntry, CoreError> {
    let flipped = db::mark_entry_paid(conn, clinic_id, entry_id, &now)?;
    let entry = db::get_commission_entry(conn, clinic_id, entry_id)?
        .ok_or_else(|| CoreError::not_found("CommissionEntry", entry_id))?;

    if flipped {
        tracing::info!(entry_id = %entry_id, amount = %entry.amount, "commission settled");
    } else {
        tracing::debug!(entry_id = %entry_id, "commission already settled");
    }
    Ok(entry)
}

/// Settle every pending entry of a professional whose source appointment
/// starts within the inclusive period. Returns the number settled.
pub fn settle_period(
    conn: &Connection,
    clinic_id: &Uuid,
    professional_id: &Uuid,
    period_start: NaiveDate,
    period_end: NaiveDate,
    now: NaiveDateTime,
) -> Result<usize, CoreError> {
    let (from, to) = period_bounds(period_start, period_end)?;
    directory::require_professional(conn, clinic_id, professional_id)?;

    let settled = db::settle_pending_in_period(conn, clinic_id, professional_id, &from, &to, &now)?;
    tracing::info!(
        professional_id = %professional_id,
        period_start = %period_start,
        period_end = %period_end,
        settled,
        "commission period closed"
    );
    Ok(settled)
}

pub fn summarize(
    conn: &Connection,
    clinic_id: &Uuid,
    professional_id: &Uuid,
    period_start: NaiveDate,
    period_end: NaiveDate,
) -> Result<CommissionSummary, CoreError> {
    let (from, to) = period_bounds(period_start, period_end)?;
    let professional = directory::require_professional(conn, clinic_id, professional_id)?;
    let entries = db::list_entries_in_period(conn, clinic_id, professional_id, &from, &to)?;

    let mut total_paid = Decimal::ZERO;
    let mut total_pending = Decimal::ZERO;
    for entry in &entries {
        match entry.status {
            CommissionStatus::Paid => total_paid += entry.amount,
            CommissionStatus::Pending => total_pending += entry.amount,
        }
    }

    Ok(CommissionSummary {
        professional_id: *professional_id,
        period_start,
        period_end,
        total_generated: total_paid + total_pending,
        total_paid,
        total_pending,
        count: entries.len(),
        rate: professional.commission_rate,
    })
}

pub fn list_entries(
    conn: &Connection,
    clinic_id: &Uuid,
    professional_id: &Uuid,
    status: Option<CommissionStatus>,
) -> Result<Vec<CommissionEntry>, CoreError> {
    Ok(db::list_entries_for_professional(conn, clinic_id, professional_id, status)?)
}

pub fn entries_for_appointment(
    conn: &Connection,
    clinic_id: &Uuid,
    appointment_id: &Uuid,
) -> Result<Vec<CommissionEntry>, CoreError> {
    Ok(db::list_entries_for_appointment(conn, clinic_id, appointment_id)?)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::db::repository::fixtures::*;
    use crate::db::open_memory_database;

    struct Ledger {
        conn: Connection,
        clinic: Uuid,
        prof: Professional,
        proc: Procedure,
    }

    fn ledger() -> Ledger {
        let conn = open_memory_database().unwrap();
        let clinic = Uuid::new_v4();
        let prof = seed_professional(&conn, clinic, dec!(40));
        let proc = seed_procedure(&conn, clinic, 30, dec!(150));
        Ledger { conn, clinic, prof, proc }
    }

    /// Inserts a completed appointment directly and accrues its commission.
    fn completed(l: &Ledger, start: NaiveDateTime) -> (Appointment, CommissionEntry) {
        let appt = Appointment {
            id: Uuid::new_v4(),
            clinic_id: l.clinic,
            patient_id: Uuid::new_v4(),
            professional_id: l.prof.id,
            procedure_id: l.proc.id,
            start_at: start,
            end_at: start + Duration::minutes(30),
            room: None,
            notes: None,
            status: AppointmentStatus::Completed,
            created_at: start,
            updated_at: start,
        };
        db::insert_appointment(&l.conn, &appt).unwrap();
        let entry = post_accrual(&l.conn, &appt, &l.proc, &l.prof, start).unwrap();
        (appt, entry)
    }

    #[test]
    fn commission_is_price_times_rate_over_hundred() {
        assert_eq!(compute_commission(dec!(150), dec!(40)), dec!(60.00));
        assert_eq!(compute_commission(dec!(99.99), dec!(12.5)), dec!(12.49875));
        assert_eq!(compute_commission(dec!(99.99), dec!(33.33)), dec!(33.326667));
        assert_eq!(compute_commission(dec!(200), dec!(0)), dec!(0));
    }

    #[test]
    fn accrual_keeps_every_fractional_digit() {
        let conn = open_memory_database().unwrap();
        let clinic = Uuid::new_v4();
        let l = Ledger {
            prof: seed_professional(&conn, clinic, dec!(33.33)),
            proc: seed_procedure(&conn, clinic, 30, dec!(99.99)),
            conn,
            clinic,
        };
        let (appt, entry) = completed(&l, at("2025-03-03", "10:00"));
        assert_eq!(entry.amount, l.proc.price * l.prof.commission_rate / dec!(100));

        let stored = entries_for_appointment(&l.conn, &l.clinic, &appt.id).unwrap();
        assert_eq!(stored[0].amount, dec!(33.326667));
        assert_eq!(stored[0].amount.to_string(), "33.326667");
    }

    #[test]
    fn adjustment_note_limit_counts_characters() {
        let l = ledger();
        let (appt, _) = completed(&l, at("2025-03-03", "10:00"));
        let accented = "é".repeat(MAX_NOTE_LEN);
        assert!(post_adjustment(
            &l.conn, &l.clinic, &appt.id, dec!(1), &accented, at("2025-03-04", "09:00"),
        )
        .is_ok());
        let too_long = "é".repeat(MAX_NOTE_LEN + 1);
        assert!(matches!(
            post_adjustment(&l.conn, &l.clinic, &appt.id, dec!(1), &too_long, at("2025-03-04", "09:00")),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn settle_is_idempotent() {
        let l = ledger();
        let (_, entry) = completed(&l, at("2025-03-03", "10:00"));

        let first = settle(&l.conn, &l.clinic, &entry.id, at("2025-03-31", "18:00")).unwrap();
        assert_eq!(first.status, CommissionStatus::Paid);
        assert_eq!(first.paid_at, Some(at("2025-03-31", "18:00")));

        let second = settle(&l.conn, &l.clinic, &entry.id, at("2025-04-01", "09:00")).unwrap();
        assert_eq!(second, first);
    }

    #[test]
    fn settle_unknown_entry_is_not_found() {
        let l = ledger();
        let err = settle(&l.conn, &l.clinic, &Uuid::new_v4(), at("2025-03-31", "18:00")).unwrap_err();
        assert!(matches!(err, CoreError::NotFound { entity_type: "CommissionEntry", .. }));
    }

    #[test]
    fn settle_period_only_touches_pending_entries_in_range() {
        let l = ledger();
        let (_, march_a) = completed(&l, at("2025-03-03", "10:00"));
        let (_, march_b) = completed(&l, at("2025-03-31", "17:00"));
        let (_, april) = completed(&l, at("2025-04-01", "09:00"));
        settle(&l.conn, &l.clinic, &march_a.id, at("2025-03-10", "12:00")).unwrap();

        let settled = settle_period(
            &l.conn, &l.clinic, &l.prof.id,
            day("2025-03-01"), day("2025-03-31"), at("2025-04-01", "08:00"),
        )
        .unwrap();
        assert_eq!(settled, 1);

        let get = |id: &Uuid| db::get_commission_entry(&l.conn, &l.clinic, id).unwrap().unwrap();
        assert_eq!(get(&march_a.id).paid_at, Some(at("2025-03-10", "12:00")));
        assert_eq!(get(&march_b.id).status, CommissionStatus::Paid);
        assert_eq!(get(&april.id).status, CommissionStatus::Pending);
    }

    #[test]
    fn summarize_splits_paid_and_pending() {
        let l = ledger();
        let (_, first) = completed(&l, at("2025-03-03", "10:00"));
        completed(&l, at("2025-03-04", "10:00"));
        settle(&l.conn, &l.clinic, &first.id, at("2025-03-05", "10:00")).unwrap();

        let summary = summarize(&l.conn, &l.clinic, &l.prof.id, day("2025-03-01"), day("2025-03-31")).unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.total_generated, dec!(120));
        assert_eq!(summary.total_paid, dec!(60));
        assert_eq!(summary.total_pending, dec!(60));
        assert_eq!(summary.rate, dec!(40));
    }

    #[test]
    fn corrections_are_offsetting_entries() {
        let l = ledger();
        let (appt, accrual) = completed(&l, at("2025-03-03", "10:00"));

        let adjustment = post_adjustment(
            &l.conn, &l.clinic, &appt.id, dec!(-15), "discount honoured", at("2025-03-04", "09:00"),
        )
        .unwrap();
        assert_eq!(adjustment.kind, CommissionKind::Adjustment);

        let entries = entries_for_appointment(&l.conn, &l.clinic, &appt.id).unwrap();
        let net: Decimal = entries.iter().map(|e| e.amount).sum();
        assert_eq!(net, dec!(45));
        assert_eq!(
            db::get_commission_entry(&l.conn, &l.clinic, &accrual.id).unwrap().unwrap().amount,
            dec!(60)
        );
    }

    #[test]
    fn amount_is_immutable_in_storage() {
        let l = ledger();
        let (_, entry) = completed(&l, at("2025-03-03", "10:00"));
        let result = l.conn.execute(
            "UPDATE commission_entries SET amount = '1.00' WHERE id = ?1",
            rusqlite::params![entry.id.to_string()],
        );
        assert!(result.is_err());
    }

    #[test]
    fn second_accrual_for_same_appointment_is_refused() {
        let l = ledger();
        let (appt, _) = completed(&l, at("2025-03-03", "10:00"));
        let again = post_accrual(&l.conn, &appt, &l.proc, &l.prof, at("2025-03-03", "11:00"));
        assert!(again.is_err());
    }

    #[test]
    fn inverted_period_is_a_validation_error() {
        let l = ledger();
        let err = summarize(&l.conn, &l.clinic, &l.prof.id, day("2025-03-31"), day("2025-03-01")).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }
}
