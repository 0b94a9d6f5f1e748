//! Inventory Ledger and Kit Catalog.
//!
//! All stock arithmetic happens inside SQLite through a conditional update,
//! so quick adjustments and fulfillment decrements on the same item cannot
//! interleave into a lost update. A decrement larger than the on-hand
//! quantity fails with `InsufficientStock` and writes nothing.

use chrono::NaiveDateTime;
use rusqlite::Connection;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::db;
use crate::directory;
use crate::error::CoreError;
use crate::models::enums::StockMovementReason;
use crate::models::*;

const MAX_ITEM_NAME_LEN: usize = 200;

fn to_milli(field: &str, quantity: Decimal) -> Result<i64, CoreError> {
    quantity_to_milli(quantity).ok_or_else(|| {
        CoreError::Validation(format!(
            "{field} {quantity} has more than {QUANTITY_SCALE} decimal places"
        ))
    })
}

fn positive_milli(quantity: Decimal) -> Result<i64, CoreError> {
    if quantity <= Decimal::ZERO {
        return Err(CoreError::Validation(format!(
            "Quantity must be positive, got {quantity}"
        )));
    }
    to_milli("Quantity", quantity)
}

// ═══════════════════════════════════════════
// Items
// ═══════════════════════════════════════════

pub fn create_item(
    conn: &Connection,
    clinic_id: &Uuid,
    new: &NewInventoryItem,
) -> Result<InventoryItem, CoreError> {
    if new.name.trim().is_empty() || new.name.chars().count() > MAX_ITEM_NAME_LEN {
        return Err(CoreError::Validation("Item name must be 1-200 characters".into()));
    }
    if new.on_hand < Decimal::ZERO || new.min_quantity < Decimal::ZERO {
        return Err(CoreError::Validation("Stock quantities cannot be negative".into()));
    }
    if new.unit_cost < Decimal::ZERO {
        return Err(CoreError::Validation("Unit cost cannot be negative".into()));
    }
    to_milli("On-hand quantity", new.on_hand)?;
    to_milli("Minimum quantity", new.min_quantity)?;

    let item = InventoryItem {
        id: Uuid::new_v4(),
        clinic_id: *clinic_id,
        name: new.name.trim().to_string(),
        on_hand: new.on_hand,
        min_quantity: new.min_quantity,
        unit_cost: new.unit_cost,
    };

    match db::insert_inventory_item(conn, &item) {
        Ok(()) => {}
        Err(db::DatabaseError::Sqlite(rusqlite::Error::SqliteFailure(e, _)))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            return Err(CoreError::Validation(format!(
                "Inventory item '{}' already exists",
                item.name
            )));
        }
        Err(e) => return Err(e.into()),
    }

    tracing::info!(item_id = %item.id, name = %item.name, on_hand = %item.on_hand, "inventory item created");
    Ok(item)
}

pub fn get_item(conn: &Connection, clinic_id: &Uuid, id: &Uuid) -> Result<InventoryItem, CoreError> {
    db::get_inventory_item(conn, clinic_id, id)?
        .ok_or_else(|| CoreError::not_found("InventoryItem", id))
}

/// Atomically remove `quantity` from an item. Returns the new on-hand amount.
pub fn decrement(
    conn: &Connection,
    clinic_id: &Uuid,
    item_id: &Uuid,
    quantity: Decimal,
    reason: StockMovementReason,
    appointment_id: Option<Uuid>,
    now: NaiveDateTime,
) -> Result<Decimal, CoreError> {
    let milli = positive_milli(quantity)?;

    let Some(remaining) = db::try_decrement_stock(conn, clinic_id, item_id, milli)? else {
        let item = get_item(conn, clinic_id, item_id)?;
        tracing::warn!(
            item_id = %item_id,
            required = %quantity,
            on_hand = %item.on_hand,
            "insufficient stock"
        );
        return Err(CoreError::InsufficientStock {
            item_id: *item_id,
            item_name: item.name,
            required: quantity,
            on_hand: item.on_hand,
        });
    };

    db::insert_stock_movement(
        conn,
        clinic_id,
        &StockMovement {
            inventory_item_id: *item_id,
            delta: -quantity,
            reason,
            appointment_id,
            created_at: now,
        },
    )?;

    let remaining = quantity_from_milli(remaining);
    signal_low_stock(conn, clinic_id, item_id, remaining)?;
    Ok(remaining)
}

/// Atomically add `quantity` to an item. Returns the new on-hand amount.
pub fn increment(
    conn: &Connection,
    clinic_id: &Uuid,
    item_id: &Uuid,
    quantity: Decimal,
    reason: StockMovementReason,
    now: NaiveDateTime,
) -> Result<Decimal, CoreError> {
    let milli = positive_milli(quantity)?;

    let on_hand = db::increment_stock(conn, clinic_id, item_id, milli)?
        .ok_or_else(|| CoreError::not_found("InventoryItem", item_id))?;

    db::insert_stock_movement(
        conn,
        clinic_id,
        &StockMovement {
            inventory_item_id: *item_id,
            delta: quantity,
            reason,
            appointment_id: None,
            created_at: now,
        },
    )?;

    let on_hand = quantity_from_milli(on_hand);
    tracing::debug!(item_id = %item_id, added = %quantity, on_hand = %on_hand, "stock incremented");
    Ok(on_hand)
}

/// Quick ±n adjustment from inventory management. Routes through the same
/// atomic primitives as fulfillment.
pub fn adjust_stock(
    conn: &Connection,
    clinic_id: &Uuid,
    item_id: &Uuid,
    delta: Decimal,
    now: NaiveDateTime,
) -> Result<Decimal, CoreError> {
    let reason = StockMovementReason::ManualAdjustment;
    if delta > Decimal::ZERO {
        increment(conn, clinic_id, item_id, delta, reason, now)
    } else if delta < Decimal::ZERO {
        decrement(conn, clinic_id, item_id, -delta, reason, None, now)
    } else {
        Err(CoreError::Validation("Adjustment must be non-zero".into()))
    }
}

pub fn low_stock(conn: &Connection, clinic_id: &Uuid) -> Result<Vec<InventoryItem>, CoreError> {
    Ok(db::list_low_stock_items(conn, clinic_id)?)
}

pub fn stock_history(
    conn: &Connection,
    clinic_id: &Uuid,
    item_id: &Uuid,
) -> Result<Vec<StockMovement>, CoreError> {
    Ok(db::list_stock_movements(conn, clinic_id, item_id)?)
}

fn signal_low_stock(
    conn: &Connection,
    clinic_id: &Uuid,
    item_id: &Uuid,
    remaining: Decimal,
) -> Result<(), CoreError> {
    let item = get_item(conn, clinic_id, item_id)?;
    if item.is_low_stock() {
        tracing::warn!(
            item_id = %item_id,
            name = %item.name,
            on_hand = %remaining,
            minimum = %item.min_quantity,
            "low stock"
        );
    }
    Ok(())
}

// ═══════════════════════════════════════════
// Kit Catalog
// ═══════════════════════════════════════════

/// Set the quantity of one item in a procedure's kit (insert or replace).
pub fn set_kit_item(
    conn: &Connection,
    clinic_id: &Uuid,
    procedure_id: &Uuid,
    item_id: &Uuid,
    quantity: Decimal,
) -> Result<KitComponent, CoreError> {
    let milli = positive_milli(quantity)?;
    directory::require_procedure(conn, clinic_id, procedure_id)?;
    let item = get_item(conn, clinic_id, item_id)?;

    db::upsert_kit_item(conn, clinic_id, procedure_id, item_id, milli)?;
    tracing::info!(procedure_id = %procedure_id, item_id = %item_id, quantity = %quantity, "kit item set");

    Ok(KitComponent {
        procedure_id: *procedure_id,
        inventory_item_id: *item_id,
        item_name: item.name,
        quantity_required: quantity_from_milli(milli),
    })
}

pub fn remove_kit_item(
    conn: &Connection,
    clinic_id: &Uuid,
    procedure_id: &Uuid,
    item_id: &Uuid,
) -> Result<(), CoreError> {
    if db::delete_kit_item(conn, clinic_id, procedure_id, item_id)? == 0 {
        return Err(CoreError::not_found("KitItem", format!("{procedure_id}/{item_id}")));
    }
    Ok(())
}

/// Bill of materials consumed when `procedure_id` is performed.
pub fn items_for(
    conn: &Connection,
    clinic_id: &Uuid,
    procedure_id: &Uuid,
) -> Result<Vec<KitComponent>, CoreError> {
    Ok(db::list_kit_components(conn, clinic_id, procedure_id)?)
}
