use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{fmt_datetime, parse_datetime, parse_decimal, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::StockMovementReason;
use crate::models::*;

pub fn insert_inventory_item(conn: &Connection, item: &InventoryItem) -> Result<(), DatabaseError> {
    let on_hand = milli_or_violation("on_hand", item.on_hand)?;
    let min_quantity = milli_or_violation("min_quantity", item.min_quantity)?;
    conn.execute(
        "INSERT INTO inventory_items (id, clinic_id, name, on_hand_milli, min_quantity_milli, unit_cost)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            item.id.to_string(),
            item.clinic_id.to_string(),
            item.name,
            on_hand,
            min_quantity,
            item.unit_cost.to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_inventory_item(
    conn: &Connection,
    clinic_id: &Uuid,
    id: &Uuid,
) -> Result<Option<InventoryItem>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, clinic_id, name, on_hand_milli, min_quantity_milli, unit_cost
         FROM inventory_items WHERE clinic_id = ?1 AND id = ?2",
    )?;
    let result = stmt.query_row(params![clinic_id.to_string(), id.to_string()], read_row);

    match result {
        Ok(row) => Ok(Some(item_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Items at or below their minimum threshold, by name.
pub fn list_low_stock_items(
    conn: &Connection,
    clinic_id: &Uuid,
) -> Result<Vec<InventoryItem>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, clinic_id, name, on_hand_milli, min_quantity_milli, unit_cost
         FROM inventory_items WHERE clinic_id = ?1 AND on_hand_milli <= min_quantity_milli
         ORDER BY name",
    )?;
    let rows = stmt
        .query_map(params![clinic_id.to_string()], read_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(item_from_row).collect()
}

/// Conditional decrement executed entirely inside SQLite.
///
/// Returns the remaining on-hand thousandths, or `None` when the item is
/// missing or holds less than `milli`. Nothing is written in that case.
pub fn try_decrement_stock(
    conn: &Connection,
    clinic_id: &Uuid,
    id: &Uuid,
    milli: i64,
) -> Result<Option<i64>, DatabaseError> {
    let result = conn.query_row(
        "UPDATE inventory_items SET on_hand_milli = on_hand_milli - ?1
         WHERE clinic_id = ?2 AND id = ?3 AND on_hand_milli >= ?1
         RETURNING on_hand_milli",
        params![milli, clinic_id.to_string(), id.to_string()],
        |row| row.get::<_, i64>(0),
    );

    match result {
        Ok(remaining) => Ok(Some(remaining)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Returns the new on-hand thousandths, or `None` when the item is missing.
pub fn increment_stock(
    conn: &Connection,
    clinic_id: &Uuid,
    id: &Uuid,
    milli: i64,
) -> Result<Option<i64>, DatabaseError> {
    let result = conn.query_row(
        "UPDATE inventory_items SET on_hand_milli = on_hand_milli + ?1
         WHERE clinic_id = ?2 AND id = ?3
         RETURNING on_hand_milli",
        params![milli, clinic_id.to_string(), id.to_string()],
        |row| row.get::<_, i64>(0),
    );

    match result {
        Ok(on_hand) => Ok(Some(on_hand)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn insert_stock_movement(
    conn: &Connection,
    clinic_id: &Uuid,
    movement: &StockMovement,
) -> Result<(), DatabaseError> {
    let delta = quantity_to_milli(movement.delta).ok_or_else(|| {
        DatabaseError::ConstraintViolation(format!("unrepresentable delta {}", movement.delta))
    })?;
    conn.execute(
        "INSERT INTO stock_movements (clinic_id, inventory_item_id, delta_milli, reason, appointment_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            clinic_id.to_string(),
            movement.inventory_item_id.to_string(),
            delta,
            movement.reason.as_str(),
            movement.appointment_id.map(|id| id.to_string()),
            fmt_datetime(&movement.created_at),
        ],
    )?;
    Ok(())
}

pub fn list_stock_movements(
    conn: &Connection,
    clinic_id: &Uuid,
    item_id: &Uuid,
) -> Result<Vec<StockMovement>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT inventory_item_id, delta_milli, reason, appointment_id, created_at
         FROM stock_movements WHERE clinic_id = ?1 AND inventory_item_id = ?2 ORDER BY id",
    )?;
    let rows = stmt
        .query_map(params![clinic_id.to_string(), item_id.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(item_id, delta, reason, appointment_id, created_at)| {
            Ok(StockMovement {
                inventory_item_id: parse_uuid("stock_movements.inventory_item_id", &item_id)?,
                delta: quantity_from_milli(delta),
                reason: StockMovementReason::from_str(&reason)?,
                appointment_id: appointment_id
                    .map(|id| parse_uuid("stock_movements.appointment_id", &id))
                    .transpose()?,
                created_at: parse_datetime("stock_movements.created_at", &created_at)?,
            })
        })
        .collect()
}

fn milli_or_violation(field: &str, value: rust_decimal::Decimal) -> Result<i64, DatabaseError> {
    quantity_to_milli(value).ok_or_else(|| {
        DatabaseError::ConstraintViolation(format!("{field} {value} exceeds stored precision"))
    })
}

// Internal row type for InventoryItem mapping
struct ItemRow {
    id: String,
    clinic_id: String,
    name: String,
    on_hand_milli: i64,
    min_quantity_milli: i64,
    unit_cost: String,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ItemRow> {
    Ok(ItemRow {
        id: row.get(0)?,
        clinic_id: row.get(1)?,
        name: row.get(2)?,
        on_hand_milli: row.get(3)?,
        min_quantity_milli: row.get(4)?,
        unit_cost: row.get(5)?,
    })
}

fn item_from_row(row: ItemRow) -> Result<InventoryItem, DatabaseError> {
    Ok(InventoryItem {
        id: parse_uuid("inventory_items.id", &row.id)?,
        clinic_id: parse_uuid("inventory_items.clinic_id", &row.clinic_id)?,
        name: row.name,
        on_hand: quantity_from_milli(row.on_hand_milli),
        min_quantity: quantity_from_milli(row.min_quantity_milli),
        unit_cost: parse_decimal("inventory_items.unit_cost", &row.unit_cost)?,
    })
}
