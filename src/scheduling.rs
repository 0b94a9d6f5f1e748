//! Appointment Scheduler: booking, rescheduling and the status machine.
//!
//! Every function here runs on the connection it is given and expects the
//! caller to hold a write transaction (see `db::begin_immediate`) plus the
//! professional's lock, so the availability and overlap checks cannot be
//! invalidated between check and write.
//!
//! ```text
//! scheduled ─▶ confirmed ─▶ arrived ─▶ in_service ─▶ completed
//!     │            │           │            │
//!     └────────────┴───────────┴────────────┴──▶ canceled
//!     └────────────┴───────────┴──────────────▶ no_show
//! ```

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use rusqlite::Connection;
use uuid::Uuid;

use crate::availability;
use crate::db;
use crate::directory;
use crate::error::{ConflictReason, CoreError};
use crate::fulfillment;
use crate::models::enums::AppointmentStatus;
use crate::models::*;

const MAX_ROOM_LEN: usize = 100;
const MAX_NOTES_LEN: usize = 2000;
const MAX_REASON_LEN: usize = 500;

/// Statuses reachable in one step from `from`.
pub fn allowed_transitions(from: AppointmentStatus) -> &'static [AppointmentStatus] {
    use AppointmentStatus::*;
    match from {
        Scheduled => &[Confirmed, Arrived, NoShow, Canceled],
        Confirmed => &[Arrived, NoShow, Canceled],
        Arrived => &[InService, NoShow, Canceled],
        InService => &[Completed, Canceled],
        Completed | NoShow | Canceled => &[],
    }
}

pub fn can_transition(from: AppointmentStatus, to: AppointmentStatus) -> bool {
    allowed_transitions(from).contains(&to)
}

/// Only appointments that have not started can move.
pub fn is_reschedulable(status: AppointmentStatus) -> bool {
    matches!(status, AppointmentStatus::Scheduled | AppointmentStatus::Confirmed)
}

fn validate_text(field: &str, value: Option<&str>, max: usize) -> Result<(), CoreError> {
    if value.is_some_and(|v| v.chars().count() > max) {
        return Err(CoreError::Validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

/// End of an appointment of `length` starting at `start`. Starts must fall
/// on a whole minute so the checked interval is exactly the stored one.
fn appointment_end(start: NaiveDateTime, length: Duration) -> Result<NaiveDateTime, CoreError> {
    if start.second() != 0 || start.nanosecond() != 0 {
        return Err(CoreError::Validation(format!(
            "Appointment start {start} must fall on a whole minute"
        )));
    }
    start.checked_add_signed(length).ok_or_else(|| {
        CoreError::Validation(format!("Appointment starting at {start} ends past the calendar range"))
    })
}

/// Availability then double-booking check for `[start, end)`.
fn admit(
    conn: &Connection,
    clinic_id: &Uuid,
    professional_id: &Uuid,
    start: NaiveDateTime,
    end: NaiveDateTime,
    exclude: Option<&Uuid>,
    today: NaiveDate,
) -> Result<(), CoreError> {
    let reason = match availability::check_availability(conn, clinic_id, professional_id, start, end, today)? {
        Some(reason) => Some(reason),
        None => db::find_overlapping_appointment(conn, clinic_id, professional_id, &start, &end, exclude)?
            .map(|appointment_id| ConflictReason::Overlap { appointment_id }),
    };

    match reason {
        Some(reason) => {
            tracing::warn!(
                professional_id = %professional_id,
                start = %start,
                end = %end,
                reason = %reason,
                "booking conflict"
            );
            Err(CoreError::Conflict(reason))
        }
        None => Ok(()),
    }
}

pub fn book(
    conn: &Connection,
    clinic_id: &Uuid,
    request: &BookingRequest,
    today: NaiveDate,
    now: NaiveDateTime,
) -> Result<Appointment, CoreError> {
    validate_text("Room", request.room.as_deref(), MAX_ROOM_LEN)?;
    validate_text("Notes", request.notes.as_deref(), MAX_NOTES_LEN)?;

    let procedure = directory::require_procedure(conn, clinic_id, &request.procedure_id)?;
    let professional = directory::require_professional(conn, clinic_id, &request.professional_id)?;
    if !professional.active {
        return Err(CoreError::Validation(format!(
            "Professional {} is not active",
            professional.id
        )));
    }

    let start_at = request.start_at;
    let end_at = appointment_end(start_at, procedure.duration())?;
    admit(conn, clinic_id, &professional.id, start_at, end_at, None, today)?;

    let appointment = Appointment {
        id: Uuid::new_v4(),
        clinic_id: *clinic_id,
        patient_id: request.patient_id,
        professional_id: professional.id,
        procedure_id: procedure.id,
        start_at,
        end_at,
        room: request.room.clone(),
        notes: request.notes.clone(),
        status: AppointmentStatus::Scheduled,
        created_at: now,
        updated_at: now,
    };
    db::insert_appointment(conn, &appointment)?;
    db::insert_status_change(
        conn,
        &StatusChange {
            appointment_id: appointment.id,
            from_status: None,
            to_status: AppointmentStatus::Scheduled,
            start_at,
            reason: None,
            changed_at: now,
        },
    )?;

    tracing::info!(
        appointment_id = %appointment.id,
        professional_id = %professional.id,
        start = %start_at,
        end = %end_at,
        "appointment booked"
    );
    Ok(appointment)
}

/// Move an appointment, keeping its length.
pub fn reschedule(
    conn: &Connection,
    clinic_id: &Uuid,
    appointment_id: &Uuid,
    new_start: NaiveDateTime,
    today: NaiveDate,
    now: NaiveDateTime,
) -> Result<Appointment, CoreError> {
    let current = get(conn, clinic_id, appointment_id)?;
    if !is_reschedulable(current.status) {
        tracing::warn!(
            appointment_id = %appointment_id,
            status = %current.status,
            "reschedule refused"
        );
        return Err(CoreError::NotReschedulable {
            status: current.status,
        });
    }

    let length = current.end_at - current.start_at;
    let new_end = appointment_end(new_start, length)?;
    admit(
        conn,
        clinic_id,
        &current.professional_id,
        new_start,
        new_end,
        Some(&current.id),
        today,
    )?;

    db::update_appointment_schedule(conn, &current.id, &new_start, &new_end, &now)?;
    db::insert_status_change(
        conn,
        &StatusChange {
            appointment_id: current.id,
            from_status: Some(current.status),
            to_status: current.status,
            start_at: new_start,
            reason: Some("rescheduled".into()),
            changed_at: now,
        },
    )?;

    tracing::info!(
        appointment_id = %current.id,
        from = %current.start_at,
        to = %new_start,
        "appointment rescheduled"
    );
    Ok(Appointment {
        start_at: new_start,
        end_at: new_end,
        updated_at: now,
        ..current
    })
}

/// Apply one step of the status machine. Reaching `completed` runs the
/// fulfillment trigger on the same connection; if it fails the error is
/// returned and the caller's transaction must be dropped.
pub fn transition(
    conn: &Connection,
    clinic_id: &Uuid,
    appointment_id: &Uuid,
    to: AppointmentStatus,
    reason: Option<&str>,
    now: NaiveDateTime,
) -> Result<Appointment, CoreError> {
    validate_text("Reason", reason, MAX_REASON_LEN)?;
    let current = get(conn, clinic_id, appointment_id)?;
    let from = current.status;

    if !can_transition(from, to) {
        tracing::warn!(
            appointment_id = %appointment_id,
            from = %from,
            to = %to,
            "transition refused"
        );
        return Err(CoreError::InvalidTransition { from, to });
    }

    if !db::update_appointment_status(conn, &current.id, from, to, &now)? {
        let actual = get(conn, clinic_id, appointment_id)?.status;
        return Err(CoreError::InvalidTransition { from: actual, to });
    }

    let updated = Appointment {
        status: to,
        updated_at: now,
        ..current
    };
    if to == AppointmentStatus::Completed {
        fulfillment::fulfill(conn, &updated, now)?;
    }

    db::insert_status_change(
        conn,
        &StatusChange {
            appointment_id: updated.id,
            from_status: Some(from),
            to_status: to,
            start_at: updated.start_at,
            reason: reason.map(str::to_string),
            changed_at: now,
        },
    )?;

    tracing::info!(
        appointment_id = %updated.id,
        from = %from,
        to = %to,
        "appointment status changed"
    );
    Ok(updated)
}

pub fn cancel(
    conn: &Connection,
    clinic_id: &Uuid,
    appointment_id: &Uuid,
    reason: Option<&str>,
    now: NaiveDateTime,
) -> Result<Appointment, CoreError> {
    transition(conn, clinic_id, appointment_id, AppointmentStatus::Canceled, reason, now)
}

pub fn get(conn: &Connection, clinic_id: &Uuid, appointment_id: &Uuid) -> Result<Appointment, CoreError> {
    db::get_appointment(conn, clinic_id, appointment_id)?
        .ok_or_else(|| CoreError::not_found("Appointment", appointment_id))
}

/// Appointments of a professional starting on any day of the inclusive
/// date range, in every status.
pub fn list_for_professional(
    conn: &Connection,
    clinic_id: &Uuid,
    professional_id: &Uuid,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<Appointment>, CoreError> {
    if from > to {
        return Err(CoreError::Validation("Range start must not be after its end".into()));
    }
    let from = from.and_time(NaiveTime::MIN);
    let to = to
        .succ_opt()
        .map_or(NaiveDateTime::MAX, |next| next.and_time(NaiveTime::MIN));
    let appointments = db::list_appointments_for_professional(conn, clinic_id, professional_id, &from, &to)?;
    tracing::debug!(
        professional_id = %professional_id,
        count = appointments.len(),
        "appointments listed"
    );
    Ok(appointments)
}

/// The realized walk of an appointment through the status machine,
/// oldest first.
pub fn status_history(
    conn: &Connection,
    clinic_id: &Uuid,
    appointment_id: &Uuid,
) -> Result<Vec<StatusChange>, CoreError> {
    get(conn, clinic_id, appointment_id)?;
    Ok(db::list_status_history(conn, appointment_id)?)
}

#[cfg(test)]
mod tests {
    use chrono::Weekday;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::db::open_memory_database;
    use crate::db::repository::fixtures::*;
    use crate::inventory;

    const TODAY: &str = "2025-03-01";
    const MONDAY: &str = "2025-03-03";

    struct Setup {
        conn: Connection,
        clinic: Uuid,
        prof: Professional,
        proc: Procedure,
    }

    fn setup() -> Setup {
        let conn = open_memory_database().unwrap();
        let clinic = Uuid::new_v4();
        let prof = seed_professional(&conn, clinic, dec!(40));
        let proc = seed_procedure(&conn, clinic, 30, dec!(150));
        for weekday in [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri] {
            availability::set_weekly_hours(&conn, &clinic, &prof.id, weekday, &[(hm("09:00"), hm("18:00"))])
                .unwrap();
        }
        Setup { conn, clinic, prof, proc }
    }

    /// Runs `f` the way the service does: inside an immediate transaction,
    /// committed only on success.
    fn in_tx<T>(conn: &Connection, f: impl FnOnce(&Connection) -> Result<T, CoreError>) -> Result<T, CoreError> {
        let tx = db::begin_immediate(conn).unwrap();
        let out = f(&tx)?;
        tx.commit().unwrap();
        Ok(out)
    }

    fn request(s: &Setup, start: NaiveDateTime) -> BookingRequest {
        BookingRequest {
            patient_id: Uuid::new_v4(),
            professional_id: s.prof.id,
            procedure_id: s.proc.id,
            start_at: start,
            room: Some("Room 2".into()),
            notes: None,
        }
    }

    fn book_at(s: &Setup, time: &str) -> Result<Appointment, CoreError> {
        in_tx(&s.conn, |c| book(c, &s.clinic, &request(s, at(MONDAY, time)), day(TODAY), at(TODAY, "12:00")))
    }

    fn step(s: &Setup, id: &Uuid, to: AppointmentStatus) -> Result<Appointment, CoreError> {
        in_tx(&s.conn, |c| transition(c, &s.clinic, id, to, None, at(MONDAY, "11:00")))
    }

    #[test]
    fn transition_table_matches_lifecycle() {
        use AppointmentStatus::*;
        assert!(can_transition(Scheduled, Arrived));
        assert!(can_transition(InService, Canceled));
        assert!(!can_transition(InService, NoShow));
        assert!(!can_transition(Confirmed, Completed));
        assert!(!can_transition(Scheduled, Scheduled));
        for terminal in [Completed, NoShow, Canceled] {
            assert!(allowed_transitions(terminal).is_empty());
        }
    }

    #[test]
    fn book_derives_end_and_starts_scheduled() {
        let s = setup();
        let appt = book_at(&s, "10:00").unwrap();
        assert_eq!(appt.status, AppointmentStatus::Scheduled);
        assert_eq!(appt.end_at, at(MONDAY, "10:30"));

        let history = status_history(&s.conn, &s.clinic, &appt.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].from_status, None);
        assert_eq!(history[0].to_status, AppointmentStatus::Scheduled);
    }

    #[test]
    fn overlapping_booking_is_a_conflict() {
        let s = setup();
        let first = book_at(&s, "10:00").unwrap();
        let err = book_at(&s, "10:15").unwrap_err();
        match err {
            CoreError::Conflict(ConflictReason::Overlap { appointment_id }) => {
                assert_eq!(appointment_id, first.id)
            }
            other => panic!("expected overlap conflict, got {other:?}"),
        }
    }

    #[test]
    fn back_to_back_bookings_do_not_overlap() {
        let s = setup();
        book_at(&s, "10:00").unwrap();
        book_at(&s, "10:30").unwrap();
        book_at(&s, "09:30").unwrap();
    }

    #[test]
    fn canceled_appointment_frees_its_slot() {
        let s = setup();
        let first = book_at(&s, "10:00").unwrap();
        in_tx(&s.conn, |c| cancel(c, &s.clinic, &first.id, Some("patient called"), at(TODAY, "13:00"))).unwrap();
        book_at(&s, "10:00").unwrap();
    }

    #[test]
    fn booking_outside_hours_or_in_a_block_is_refused() {
        let s = setup();
        let err = book_at(&s, "17:45").unwrap_err();
        assert!(matches!(err, CoreError::Conflict(ConflictReason::OutsideWorkingHours)));

        let block = availability::add_exception(
            &s.conn,
            &s.clinic,
            &NewException {
                professional_id: s.prof.id,
                start_date: day(MONDAY),
                end_date: day(MONDAY),
                is_full_day: false,
                start_time: Some(hm("12:00")),
                end_time: Some(hm("13:00")),
                reason: Some("lunch meeting".into()),
            },
            at(TODAY, "08:00"),
        )
        .unwrap();
        match book_at(&s, "11:45").unwrap_err() {
            CoreError::Conflict(ConflictReason::Blocked { exception_id }) => assert_eq!(exception_id, block.id),
            other => panic!("expected blocked conflict, got {other:?}"),
        }
        book_at(&s, "13:00").unwrap();
    }

    #[test]
    fn booking_validates_references() {
        let s = setup();
        let mut req = request(&s, at(MONDAY, "10:00"));
        req.procedure_id = Uuid::new_v4();
        let err = book(&s.conn, &s.clinic, &req, day(TODAY), at(TODAY, "12:00")).unwrap_err();
        assert!(matches!(err, CoreError::NotFound { entity_type: "Procedure", .. }));

        let mut inactive = s.prof.clone();
        inactive.active = false;
        directory::save_professional(&s.conn, &inactive).unwrap();
        let err = book_at(&s, "10:00").unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn other_clinic_cannot_see_appointment() {
        let s = setup();
        let appt = book_at(&s, "10:00").unwrap();
        let err = get(&s.conn, &Uuid::new_v4(), &appt.id).unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[test]
    fn happy_path_walk_completes_and_accrues() {
        let s = setup();
        let appt = book_at(&s, "10:00").unwrap();
        for to in [
            AppointmentStatus::Confirmed,
            AppointmentStatus::Arrived,
            AppointmentStatus::InService,
            AppointmentStatus::Completed,
        ] {
            assert_eq!(step(&s, &appt.id, to).unwrap().status, to);
        }

        let entries = crate::commission::entries_for_appointment(&s.conn, &s.clinic, &appt.id).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].amount, dec!(60.00));

        let walk: Vec<_> = status_history(&s.conn, &s.clinic, &appt.id)
            .unwrap()
            .into_iter()
            .map(|c| c.to_status)
            .collect();
        assert_eq!(walk.len(), 5);
        assert_eq!(walk.last(), Some(&AppointmentStatus::Completed));
    }

    #[test]
    fn skipping_steps_is_refused_and_status_unchanged() {
        let s = setup();
        let appt = book_at(&s, "10:00").unwrap();
        step(&s, &appt.id, AppointmentStatus::Confirmed).unwrap();

        let err = step(&s, &appt.id, AppointmentStatus::Completed).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidTransition {
                from: AppointmentStatus::Confirmed,
                to: AppointmentStatus::Completed
            }
        ));
        assert_eq!(get(&s.conn, &s.clinic, &appt.id).unwrap().status, AppointmentStatus::Confirmed);
    }

    #[test]
    fn terminal_states_accept_nothing() {
        let s = setup();
        let appt = book_at(&s, "10:00").unwrap();
        step(&s, &appt.id, AppointmentStatus::NoShow).unwrap();
        for to in [AppointmentStatus::Scheduled, AppointmentStatus::Canceled, AppointmentStatus::Arrived] {
            assert!(matches!(step(&s, &appt.id, to), Err(CoreError::InvalidTransition { .. })));
        }
    }

    #[test]
    fn shortfall_keeps_appointment_in_service() {
        let s = setup();
        let item = seed_item(&s.conn, s.clinic, "Anesthetic", dec!(1));
        inventory::set_kit_item(&s.conn, &s.clinic, &s.proc.id, &item.id, dec!(2)).unwrap();
        let appt = book_at(&s, "10:00").unwrap();
        for to in [AppointmentStatus::Arrived, AppointmentStatus::InService] {
            step(&s, &appt.id, to).unwrap();
        }

        let err = step(&s, &appt.id, AppointmentStatus::Completed).unwrap_err();
        assert!(matches!(err, CoreError::InsufficientStock { .. }));
        assert_eq!(get(&s.conn, &s.clinic, &appt.id).unwrap().status, AppointmentStatus::InService);
        assert_eq!(inventory::get_item(&s.conn, &s.clinic, &item.id).unwrap().on_hand, dec!(1));
        assert!(crate::commission::entries_for_appointment(&s.conn, &s.clinic, &appt.id)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn reschedule_moves_and_ignores_itself() {
        let s = setup();
        let appt = book_at(&s, "10:00").unwrap();
        let moved = in_tx(&s.conn, |c| {
            reschedule(c, &s.clinic, &appt.id, at(MONDAY, "10:15"), day(TODAY), at(TODAY, "14:00"))
        })
        .unwrap();
        assert_eq!(moved.start_at, at(MONDAY, "10:15"));
        assert_eq!(moved.end_at, at(MONDAY, "10:45"));
        assert_eq!(get(&s.conn, &s.clinic, &appt.id).unwrap(), moved);
    }

    #[test]
    fn reschedule_into_another_booking_conflicts() {
        let s = setup();
        let appt = book_at(&s, "10:00").unwrap();
        book_at(&s, "11:00").unwrap();
        let err = reschedule(&s.conn, &s.clinic, &appt.id, at(MONDAY, "10:45"), day(TODAY), at(TODAY, "14:00"))
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict(ConflictReason::Overlap { .. })));
        assert_eq!(get(&s.conn, &s.clinic, &appt.id).unwrap().start_at, at(MONDAY, "10:00"));
    }

    #[test]
    fn reschedule_after_arrival_is_refused() {
        let s = setup();
        let appt = book_at(&s, "10:00").unwrap();
        step(&s, &appt.id, AppointmentStatus::Arrived).unwrap();
        let err = reschedule(&s.conn, &s.clinic, &appt.id, at(MONDAY, "14:00"), day(TODAY), at(TODAY, "14:00"))
            .unwrap_err();
        assert!(matches!(err, CoreError::NotReschedulable { status: AppointmentStatus::Arrived }));
    }

    #[test]
    fn list_for_professional_covers_inclusive_days() {
        let s = setup();
        book_at(&s, "09:00").unwrap();
        in_tx(&s.conn, |c| {
            book(c, &s.clinic, &request(&s, at("2025-03-04", "17:00")), day(TODAY), at(TODAY, "12:00"))
        })
        .unwrap();

        let monday = list_for_professional(&s.conn, &s.clinic, &s.prof.id, day(MONDAY), day(MONDAY)).unwrap();
        assert_eq!(monday.len(), 1);
        let both = list_for_professional(&s.conn, &s.clinic, &s.prof.id, day(MONDAY), day("2025-03-04")).unwrap();
        assert_eq!(both.len(), 2);
    }

    #[test]
    fn start_must_fall_on_a_whole_minute() {
        let s = setup();
        let first = book_at(&s, "10:00").unwrap();

        let fractional = at(MONDAY, "10:30") + Duration::milliseconds(200);
        let err = in_tx(&s.conn, |c| {
            book(c, &s.clinic, &request(&s, fractional), day(TODAY), at(TODAY, "12:00"))
        })
        .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        let with_seconds = at(MONDAY, "14:00") + Duration::seconds(30);
        let err = in_tx(&s.conn, |c| {
            reschedule(c, &s.clinic, &first.id, with_seconds, day(TODAY), at(TODAY, "12:00"))
        })
        .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        let stored = get(&s.conn, &s.clinic, &first.id).unwrap();
        assert_eq!(stored, first);
    }

    #[test]
    fn booking_past_the_calendar_end_is_rejected() {
        let s = setup();
        let start = NaiveDate::MAX.and_time(hm("23:45"));
        let err = in_tx(&s.conn, |c| book(c, &s.clinic, &request(&s, start), day(TODAY), at(TODAY, "12:00")))
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }
}
