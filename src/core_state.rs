//! Transport-agnostic service state.
//!
//! `CoreState` is the single entry point shared by the HTTP facade and
//! in-process callers. It owns the configuration, the clock and the
//! per-professional locks, opens one connection per operation and wraps
//! every write in an immediate transaction that commits only on success.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use rust_decimal::Decimal;
use rusqlite::Connection;
use uuid::Uuid;

use crate::availability;
use crate::clock::{Clock, SystemClock};
use crate::commission;
use crate::config::CoreConfig;
use crate::db;
use crate::directory;
use crate::error::{ConflictReason, CoreError};
use crate::inventory;
use crate::locks::ProfessionalLocks;
use crate::models::enums::{AppointmentStatus, CommissionStatus, StockMovementReason};
use crate::models::*;
use crate::scheduling;

pub struct CoreState {
    config: CoreConfig,
    locks: ProfessionalLocks,
    clock: Arc<dyn Clock>,
}

impl CoreState {
    /// Open (creating and migrating if needed) the configured database.
    pub fn open(config: CoreConfig) -> Result<Self, CoreError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: CoreConfig, clock: Arc<dyn Clock>) -> Result<Self, CoreError> {
        if let Some(parent) = config.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        db::open_database(&config.db_path, config.busy_timeout)?;
        tracing::info!(db = %config.db_path.display(), "ledger database ready");

        Ok(Self {
            config,
            locks: ProfessionalLocks::new(),
            clock,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Open a connection to the ledger database.
    pub fn open_db(&self) -> Result<Connection, CoreError> {
        Ok(db::connect(&self.config.db_path, self.config.busy_timeout)?)
    }

    fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T, CoreError>) -> Result<T, CoreError> {
        let conn = self.open_db()?;
        f(&conn)
    }

    /// Run `f` in an immediate transaction; any error rolls back.
    fn write<T>(&self, f: impl FnOnce(&Connection) -> Result<T, CoreError>) -> Result<T, CoreError> {
        let conn = self.open_db()?;
        let tx = db::begin_immediate(&conn)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    /// `write` under the professional's lock.
    fn write_for<T>(
        &self,
        clinic_id: &Uuid,
        professional_id: &Uuid,
        f: impl FnOnce(&Connection) -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        self.locks
            .with_lock(clinic_id, professional_id, || self.write(f))
    }

    // ── Directory ───────────────────────────────────────────

    pub fn save_professional(&self, prof: &Professional) -> Result<(), CoreError> {
        self.write(|conn| directory::save_professional(conn, prof))
    }

    pub fn save_procedure(&self, proc: &Procedure) -> Result<(), CoreError> {
        self.write(|conn| directory::save_procedure(conn, proc))
    }

    pub fn get_professional(&self, clinic_id: &Uuid, id: &Uuid) -> Result<Professional, CoreError> {
        self.read(|conn| directory::require_professional(conn, clinic_id, id))
    }

    pub fn get_procedure(&self, clinic_id: &Uuid, id: &Uuid) -> Result<Procedure, CoreError> {
        self.read(|conn| directory::require_procedure(conn, clinic_id, id))
    }

    // ── Availability Calendar ───────────────────────────────

    pub fn set_weekly_hours(
        &self,
        clinic_id: &Uuid,
        professional_id: &Uuid,
        weekday: Weekday,
        windows: &[(NaiveTime, NaiveTime)],
    ) -> Result<Vec<WorkingWindow>, CoreError> {
        self.write_for(clinic_id, professional_id, |conn| {
            availability::set_weekly_hours(conn, clinic_id, professional_id, weekday, windows)
        })
    }

    pub fn weekly_hours(&self, clinic_id: &Uuid, professional_id: &Uuid) -> Result<Vec<WorkingWindow>, CoreError> {
        self.read(|conn| availability::weekly_hours(conn, clinic_id, professional_id))
    }

    pub fn add_exception(&self, clinic_id: &Uuid, new: &NewException) -> Result<AvailabilityException, CoreError> {
        let now = self.clock.now();
        self.write_for(clinic_id, &new.professional_id, |conn| {
            availability::add_exception(conn, clinic_id, new, now)
        })
    }

    pub fn remove_exception(&self, clinic_id: &Uuid, exception_id: &Uuid) -> Result<(), CoreError> {
        self.write(|conn| availability::remove_exception(conn, clinic_id, exception_id))
    }

    pub fn list_exceptions(
        &self,
        clinic_id: &Uuid,
        professional_id: &Uuid,
    ) -> Result<Vec<AvailabilityException>, CoreError> {
        let today = self.clock.today();
        self.read(|conn| availability::list_exceptions(conn, clinic_id, professional_id, today))
    }

    pub fn check_availability(
        &self,
        clinic_id: &Uuid,
        professional_id: &Uuid,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Option<ConflictReason>, CoreError> {
        let today = self.clock.today();
        self.read(|conn| availability::check_availability(conn, clinic_id, professional_id, start, end, today))
    }

    pub fn is_available(
        &self,
        clinic_id: &Uuid,
        professional_id: &Uuid,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<bool, CoreError> {
        Ok(self.check_availability(clinic_id, professional_id, start, end)?.is_none())
    }

    /// Bookable start instants on `date` for a procedure, stepping by the
    /// configured slot granularity.
    pub fn free_slots(
        &self,
        clinic_id: &Uuid,
        professional_id: &Uuid,
        procedure_id: &Uuid,
        date: NaiveDate,
    ) -> Result<Vec<NaiveDateTime>, CoreError> {
        let today = self.clock.today();
        let step = Duration::minutes(self.config.slot_step_minutes);
        self.read(|conn| {
            let procedure = directory::require_procedure(conn, clinic_id, procedure_id)?;
            availability::free_slots(
                conn,
                clinic_id,
                professional_id,
                date,
                procedure.duration(),
                step,
                today,
            )
        })
    }

    // ── Appointment Scheduler ───────────────────────────────

    pub fn book(&self, clinic_id: &Uuid, request: &BookingRequest) -> Result<Appointment, CoreError> {
        let (today, now) = (self.clock.today(), self.clock.now());
        self.write_for(clinic_id, &request.professional_id, |conn| {
            scheduling::book(conn, clinic_id, request, today, now)
        })
    }

    pub fn reschedule(
        &self,
        clinic_id: &Uuid,
        appointment_id: &Uuid,
        new_start: NaiveDateTime,
    ) -> Result<Appointment, CoreError> {
        let (today, now) = (self.clock.today(), self.clock.now());
        let professional_id = self.get_appointment(clinic_id, appointment_id)?.professional_id;
        self.write_for(clinic_id, &professional_id, |conn| {
            scheduling::reschedule(conn, clinic_id, appointment_id, new_start, today, now)
        })
    }

    /// One status step; reaching `completed` commits the stock
    /// decrements and commission accrual together with the status.
    pub fn transition(
        &self,
        clinic_id: &Uuid,
        appointment_id: &Uuid,
        to: AppointmentStatus,
        reason: Option<&str>,
    ) -> Result<Appointment, CoreError> {
        let now = self.clock.now();
        self.write(|conn| scheduling::transition(conn, clinic_id, appointment_id, to, reason, now))
    }

    pub fn cancel(&self, clinic_id: &Uuid, appointment_id: &Uuid, reason: Option<&str>) -> Result<Appointment, CoreError> {
        let now = self.clock.now();
        self.write(|conn| scheduling::cancel(conn, clinic_id, appointment_id, reason, now))
    }

    pub fn get_appointment(&self, clinic_id: &Uuid, appointment_id: &Uuid) -> Result<Appointment, CoreError> {
        self.read(|conn| scheduling::get(conn, clinic_id, appointment_id))
    }

    pub fn list_appointments(
        &self,
        clinic_id: &Uuid,
        professional_id: &Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Appointment>, CoreError> {
        self.read(|conn| scheduling::list_for_professional(conn, clinic_id, professional_id, from, to))
    }

    pub fn status_history(&self, clinic_id: &Uuid, appointment_id: &Uuid) -> Result<Vec<StatusChange>, CoreError> {
        self.read(|conn| scheduling::status_history(conn, clinic_id, appointment_id))
    }

    // ── Inventory Ledger & Kit Catalog ──────────────────────

    pub fn create_item(&self, clinic_id: &Uuid, new: &NewInventoryItem) -> Result<InventoryItem, CoreError> {
        self.write(|conn| inventory::create_item(conn, clinic_id, new))
    }

    pub fn get_item(&self, clinic_id: &Uuid, item_id: &Uuid) -> Result<InventoryItem, CoreError> {
        self.read(|conn| inventory::get_item(conn, clinic_id, item_id))
    }

    /// Receive stock. Returns the new on-hand quantity.
    pub fn increment(&self, clinic_id: &Uuid, item_id: &Uuid, quantity: Decimal) -> Result<Decimal, CoreError> {
        let now = self.clock.now();
        self.write(|conn| {
            inventory::increment(conn, clinic_id, item_id, quantity, StockMovementReason::Restock, now)
        })
    }

    /// Take stock out by hand. Fails without change when on-hand is short.
    pub fn decrement(&self, clinic_id: &Uuid, item_id: &Uuid, quantity: Decimal) -> Result<Decimal, CoreError> {
        let now = self.clock.now();
        self.write(|conn| {
            inventory::decrement(
                conn,
                clinic_id,
                item_id,
                quantity,
                StockMovementReason::ManualAdjustment,
                None,
                now,
            )
        })
    }

    pub fn adjust_stock(&self, clinic_id: &Uuid, item_id: &Uuid, delta: Decimal) -> Result<Decimal, CoreError> {
        let now = self.clock.now();
        self.write(|conn| inventory::adjust_stock(conn, clinic_id, item_id, delta, now))
    }

    pub fn low_stock(&self, clinic_id: &Uuid) -> Result<Vec<InventoryItem>, CoreError> {
        self.read(|conn| inventory::low_stock(conn, clinic_id))
    }

    pub fn stock_history(&self, clinic_id: &Uuid, item_id: &Uuid) -> Result<Vec<StockMovement>, CoreError> {
        self.read(|conn| {
            inventory::get_item(conn, clinic_id, item_id)?;
            inventory::stock_history(conn, clinic_id, item_id)
        })
    }

    pub fn set_kit_item(
        &self,
        clinic_id: &Uuid,
        procedure_id: &Uuid,
        item_id: &Uuid,
        quantity: Decimal,
    ) -> Result<KitComponent, CoreError> {
        self.write(|conn| inventory::set_kit_item(conn, clinic_id, procedure_id, item_id, quantity))
    }

    pub fn remove_kit_item(&self, clinic_id: &Uuid, procedure_id: &Uuid, item_id: &Uuid) -> Result<(), CoreError> {
        self.write(|conn| inventory::remove_kit_item(conn, clinic_id, procedure_id, item_id))
    }

    pub fn items_for(&self, clinic_id: &Uuid, procedure_id: &Uuid) -> Result<Vec<KitComponent>, CoreError> {
        self.read(|conn| {
            directory::require_procedure(conn, clinic_id, procedure_id)?;
            inventory::items_for(conn, clinic_id, procedure_id)
        })
    }

    // ── Commission Ledger ───────────────────────────────────

    pub fn settle(&self, clinic_id: &Uuid, entry_id: &Uuid) -> Result<CommissionEntry, CoreError> {
        let now = self.clock.now();
        self.write(|conn| commission::settle(conn, clinic_id, entry_id, now))
    }

    pub fn settle_period(
        &self,
        clinic_id: &Uuid,
        professional_id: &Uuid,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> Result<usize, CoreError> {
        let now = self.clock.now();
        self.write(|conn| {
            commission::settle_period(conn, clinic_id, professional_id, period_start, period_end, now)
        })
    }

    pub fn summarize(
        &self,
        clinic_id: &Uuid,
        professional_id: &Uuid,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> Result<CommissionSummary, CoreError> {
        self.read(|conn| commission::summarize(conn, clinic_id, professional_id, period_start, period_end))
    }

    pub fn post_adjustment(
        &self,
        clinic_id: &Uuid,
        appointment_id: &Uuid,
        amount: Decimal,
        note: &str,
    ) -> Result<CommissionEntry, CoreError> {
        let now = self.clock.now();
        self.write(|conn| commission::post_adjustment(conn, clinic_id, appointment_id, amount, note, now))
    }

    pub fn list_entries(
        &self,
        clinic_id: &Uuid,
        professional_id: &Uuid,
        status: Option<CommissionStatus>,
    ) -> Result<Vec<CommissionEntry>, CoreError> {
        self.read(|conn| commission::list_entries(conn, clinic_id, professional_id, status))
    }

    pub fn entries_for_appointment(
        &self,
        clinic_id: &Uuid,
        appointment_id: &Uuid,
    ) -> Result<Vec<CommissionEntry>, CoreError> {
        self.read(|conn| {
            scheduling::get(conn, clinic_id, appointment_id)?;
            commission::entries_for_appointment(conn, clinic_id, appointment_id)
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::clock::FixedClock;

    pub const MONDAY: &str = "2025-03-03";

    pub fn at(date: &str, time: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%Y-%m-%d %H:%M").unwrap()
    }

    /// A clinic with one professional (40%, Mon-Fri 09-18) and one
    /// 30-minute procedure priced 150.
    pub struct Clinic {
        pub state: CoreState,
        pub clock: Arc<FixedClock>,
        pub clinic: Uuid,
        pub prof: Professional,
        pub proc: Procedure,
        _dir: tempfile::TempDir,
    }

    pub fn clinic() -> Clinic {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(FixedClock::new(at("2025-03-01", "08:00")));
        let state = CoreState::with_clock(CoreConfig::with_db_path(dir.path().join("ledger.db")), clock.clone())
            .unwrap();

        let clinic = Uuid::new_v4();
        let prof = Professional {
            id: Uuid::new_v4(),
            clinic_id: clinic,
            name: "Dr. Ana Ruiz".into(),
            commission_rate: dec!(40),
            active: true,
        };
        state.save_professional(&prof).unwrap();
        let proc = Procedure {
            id: Uuid::new_v4(),
            clinic_id: clinic,
            name: "Cleaning".into(),
            duration_minutes: 30,
            price: dec!(150),
        };
        state.save_procedure(&proc).unwrap();
        for weekday in [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri] {
            let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
            let six = NaiveTime::from_hms_opt(18, 0, 0).unwrap();
            state.set_weekly_hours(&clinic, &prof.id, weekday, &[(nine, six)]).unwrap();
        }

        Clinic { state, clock, clinic, prof, proc, _dir: dir }
    }

    pub fn request(c: &Clinic, start: NaiveDateTime) -> BookingRequest {
        BookingRequest {
            patient_id: Uuid::new_v4(),
            professional_id: c.prof.id,
            procedure_id: c.proc.id,
            start_at: start,
            room: None,
            notes: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::test_support::*;
    use super::*;

    #[test]
    fn racing_bookings_yield_exactly_one_success() {
        let c = clinic();
        let start = at(MONDAY, "10:00");

        let results: Vec<Result<Appointment, CoreError>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let c = &c;
                    scope.spawn(move || {
                        let offset = Duration::minutes(5 * (i % 3));
                        c.state.book(&c.clinic, &request(c, start + offset))
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, CoreError::Conflict(ConflictReason::Overlap { .. }))));
    }

    #[test]
    fn separate_states_on_one_file_still_serialize() {
        let c = clinic();
        let second = CoreState::with_clock(c.state.config().clone(), c.clock.clone()).unwrap();
        let start = at(MONDAY, "11:00");

        let (a, b) = std::thread::scope(|scope| {
            let a = scope.spawn(|| c.state.book(&c.clinic, &request(&c, start)));
            let b = scope.spawn(|| second.book(&c.clinic, &request(&c, start + Duration::minutes(10))));
            (a.join().unwrap(), b.join().unwrap())
        });
        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
    }

    #[test]
    fn failed_completion_commits_nothing() {
        let c = clinic();
        let item = c
            .state
            .create_item(
                &c.clinic,
                &NewInventoryItem {
                    name: "Fluoride varnish".into(),
                    on_hand: dec!(1),
                    min_quantity: dec!(0),
                    unit_cost: dec!(3.20),
                },
            )
            .unwrap();
        c.state.set_kit_item(&c.clinic, &c.proc.id, &item.id, dec!(2)).unwrap();
        let appt = c.state.book(&c.clinic, &request(&c, at(MONDAY, "10:00"))).unwrap();
        for to in [AppointmentStatus::Arrived, AppointmentStatus::InService] {
            c.state.transition(&c.clinic, &appt.id, to, None).unwrap();
        }

        let err = c
            .state
            .transition(&c.clinic, &appt.id, AppointmentStatus::Completed, None)
            .unwrap_err();
        assert!(matches!(err, CoreError::InsufficientStock { .. }));
        assert_eq!(
            c.state.get_appointment(&c.clinic, &appt.id).unwrap().status,
            AppointmentStatus::InService
        );
        assert_eq!(c.state.get_item(&c.clinic, &item.id).unwrap().on_hand, dec!(1));

        c.state.increment(&c.clinic, &item.id, dec!(5)).unwrap();
        let done = c
            .state
            .transition(&c.clinic, &appt.id, AppointmentStatus::Completed, None)
            .unwrap();
        assert_eq!(done.status, AppointmentStatus::Completed);
        assert_eq!(c.state.get_item(&c.clinic, &item.id).unwrap().on_hand, dec!(4));
    }

    #[test]
    fn free_slots_use_configured_step_and_skip_bookings() {
        let c = clinic();
        c.state.book(&c.clinic, &request(&c, at(MONDAY, "09:00"))).unwrap();
        let slots = c
            .state
            .free_slots(&c.clinic, &c.prof.id, &c.proc.id, at(MONDAY, "00:00").date())
            .unwrap();
        assert_eq!(slots.first(), Some(&at(MONDAY, "09:30")));
        assert_eq!(slots.last(), Some(&at(MONDAY, "17:30")));
        assert!(!slots.contains(&at(MONDAY, "09:15")));
    }

    #[test]
    fn exceptions_follow_the_clock() {
        let c = clinic();
        let monday = at(MONDAY, "00:00").date();
        c.state
            .add_exception(
                &c.clinic,
                &NewException {
                    professional_id: c.prof.id,
                    start_date: monday,
                    end_date: monday,
                    is_full_day: true,
                    start_time: None,
                    end_time: None,
                    reason: Some("conference".into()),
                },
            )
            .unwrap();
        assert!(!c.state.is_available(&c.clinic, &c.prof.id, at(MONDAY, "10:00"), at(MONDAY, "10:30")).unwrap());
        assert_eq!(c.state.list_exceptions(&c.clinic, &c.prof.id).unwrap().len(), 1);

        c.clock.set(at("2025-03-04", "08:00"));
        assert!(c.state.list_exceptions(&c.clinic, &c.prof.id).unwrap().is_empty());
    }

    #[test]
    fn rejected_overflowing_booking_leaves_professional_bookable() {
        let c = clinic();
        let start = NaiveDate::MAX.and_hms_opt(23, 45, 0).unwrap();
        let err = c.state.book(&c.clinic, &request(&c, start)).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        let appt = c.state.book(&c.clinic, &request(&c, at(MONDAY, "10:00"))).unwrap();
        assert_eq!(appt.status, AppointmentStatus::Scheduled);
    }
}
