//! Fulfillment trigger: the side effects of an appointment reaching
//! `completed`.
//!
//! Runs on the caller's connection. The scheduler calls it inside the same
//! transaction as the status write, so a shortfall on any kit component
//! rolls back every decrement already applied.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::commission;
use crate::directory;
use crate::error::CoreError;
use crate::inventory;
use crate::models::enums::StockMovementReason;
use crate::models::*;

/// One kit component consumed by a fulfillment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsumedItem {
    pub inventory_item_id: Uuid,
    pub item_name: String,
    pub quantity: Decimal,
    pub remaining: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FulfillmentOutcome {
    pub consumed: Vec<ConsumedItem>,
    pub commission: CommissionEntry,
}

pub fn fulfill(
    conn: &Connection,
    appointment: &Appointment,
    now: NaiveDateTime,
) -> Result<FulfillmentOutcome, CoreError> {
    let clinic_id = &appointment.clinic_id;
    let procedure = directory::require_procedure(conn, clinic_id, &appointment.procedure_id)?;
    let professional =
        directory::require_professional(conn, clinic_id, &appointment.professional_id)?;

    let components = inventory::items_for(conn, clinic_id, &procedure.id)?;
    let mut consumed = Vec::with_capacity(components.len());
    for component in components {
        let remaining = inventory::decrement(
            conn,
            clinic_id,
            &component.inventory_item_id,
            component.quantity_required,
            StockMovementReason::Fulfillment,
            Some(appointment.id),
            now,
        )?;
        consumed.push(ConsumedItem {
            inventory_item_id: component.inventory_item_id,
            item_name: component.item_name,
            quantity: component.quantity_required,
            remaining,
        });
    }

    let commission = commission::post_accrual(conn, appointment, &procedure, &professional, now)?;

    tracing::info!(
        appointment_id = %appointment.id,
        items = consumed.len(),
        commission = %commission.amount,
        "appointment fulfilled"
    );
    Ok(FulfillmentOutcome {
        consumed,
        commission,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::db;
    use crate::db::open_memory_database;
    use crate::db::repository::fixtures::*;
    use crate::models::enums::AppointmentStatus;

    fn appointment(clinic: Uuid, prof: &Professional, proc: &Procedure) -> Appointment {
        let start = at("2025-03-03", "10:00");
        Appointment {
            id: Uuid::new_v4(),
            clinic_id: clinic,
            patient_id: Uuid::new_v4(),
            professional_id: prof.id,
            procedure_id: proc.id,
            start_at: start,
            end_at: start + Duration::minutes(proc.duration_minutes),
            room: None,
            notes: None,
            status: AppointmentStatus::InService,
            created_at: start,
            updated_at: start,
        }
    }

    #[test]
    fn consumes_kit_and_accrues_commission() {
        let conn = open_memory_database().unwrap();
        let clinic = Uuid::new_v4();
        let prof = seed_professional(&conn, clinic, dec!(40));
        let proc = seed_procedure(&conn, clinic, 30, dec!(150));
        let gloves = seed_item(&conn, clinic, "Gloves", dec!(10));
        let resin = seed_item(&conn, clinic, "Resin", dec!(2.5));
        inventory::set_kit_item(&conn, &clinic, &proc.id, &gloves.id, dec!(2)).unwrap();
        inventory::set_kit_item(&conn, &clinic, &proc.id, &resin.id, dec!(0.75)).unwrap();
        let appt = appointment(clinic, &prof, &proc);
        db::insert_appointment(&conn, &appt).unwrap();

        let outcome = fulfill(&conn, &appt, at("2025-03-03", "10:30")).unwrap();

        assert_eq!(outcome.consumed.len(), 2);
        assert_eq!(outcome.commission.amount, dec!(60.00));
        assert_eq!(inventory::get_item(&conn, &clinic, &gloves.id).unwrap().on_hand, dec!(8));
        assert_eq!(inventory::get_item(&conn, &clinic, &resin.id).unwrap().on_hand, dec!(1.75));

        let history = inventory::stock_history(&conn, &clinic, &gloves.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].appointment_id, Some(appt.id));
        assert_eq!(history[0].reason, StockMovementReason::Fulfillment);
    }

    #[test]
    fn shortfall_inside_a_transaction_leaves_nothing_behind() {
        let mut conn = open_memory_database().unwrap();
        let clinic = Uuid::new_v4();
        let prof = seed_professional(&conn, clinic, dec!(40));
        let proc = seed_procedure(&conn, clinic, 30, dec!(150));
        // "A gloves" sorts first, so it is decremented before the shortfall.
        let gloves = seed_item(&conn, clinic, "A gloves", dec!(10));
        let resin = seed_item(&conn, clinic, "B resin", dec!(1));
        inventory::set_kit_item(&conn, &clinic, &proc.id, &gloves.id, dec!(2)).unwrap();
        inventory::set_kit_item(&conn, &clinic, &proc.id, &resin.id, dec!(2)).unwrap();
        let appt = appointment(clinic, &prof, &proc);
        db::insert_appointment(&conn, &appt).unwrap();

        {
            let tx = conn.transaction().unwrap();
            let err = fulfill(&tx, &appt, at("2025-03-03", "10:30")).unwrap_err();
            assert!(matches!(err, CoreError::InsufficientStock { .. }));
        }

        assert_eq!(inventory::get_item(&conn, &clinic, &gloves.id).unwrap().on_hand, dec!(10));
        assert_eq!(inventory::get_item(&conn, &clinic, &resin.id).unwrap().on_hand, dec!(1));
        assert!(commission::entries_for_appointment(&conn, &clinic, &appt.id).unwrap().is_empty());
    }

    #[test]
    fn empty_kit_still_accrues() {
        let conn = open_memory_database().unwrap();
        let clinic = Uuid::new_v4();
        let prof = seed_professional(&conn, clinic, dec!(25));
        let proc = seed_procedure(&conn, clinic, 45, dec!(80));
        let appt = appointment(clinic, &prof, &proc);
        db::insert_appointment(&conn, &appt).unwrap();

        let outcome = fulfill(&conn, &appt, at("2025-03-03", "11:00")).unwrap();
        assert!(outcome.consumed.is_empty());
        assert_eq!(outcome.commission.amount, dec!(20.00));
    }
}
