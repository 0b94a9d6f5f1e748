use rusqlite::{params, Connection};
use uuid::Uuid;

use super::parse_uuid;
use crate::db::DatabaseError;
use crate::models::*;

/// Insert or replace the quantity of one component of a procedure's kit.
pub fn upsert_kit_item(
    conn: &Connection,
    clinic_id: &Uuid,
    procedure_id: &Uuid,
    inventory_item_id: &Uuid,
    quantity_milli: i64,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO kit_items (clinic_id, procedure_id, inventory_item_id, quantity_milli)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(procedure_id, inventory_item_id) DO UPDATE SET quantity_milli = excluded.quantity_milli",
        params![
            clinic_id.to_string(),
            procedure_id.to_string(),
            inventory_item_id.to_string(),
            quantity_milli,
        ],
    )?;
    Ok(())
}

pub fn delete_kit_item(
    conn: &Connection,
    clinic_id: &Uuid,
    procedure_id: &Uuid,
    inventory_item_id: &Uuid,
) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM kit_items WHERE clinic_id = ?1 AND procedure_id = ?2 AND inventory_item_id = ?3",
        params![
            clinic_id.to_string(),
            procedure_id.to_string(),
            inventory_item_id.to_string(),
        ],
    )?;
    Ok(deleted)
}

/// Bill of materials for a procedure, ordered by item name.
pub fn list_kit_components(
    conn: &Connection,
    clinic_id: &Uuid,
    procedure_id: &Uuid,
) -> Result<Vec<KitComponent>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT k.procedure_id, k.inventory_item_id, i.name, k.quantity_milli
         FROM kit_items k
         JOIN inventory_items i ON i.id = k.inventory_item_id
         WHERE k.clinic_id = ?1 AND k.procedure_id = ?2
         ORDER BY i.name",
    )?;
    let rows = stmt
        .query_map(params![clinic_id.to_string(), procedure_id.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(procedure_id, item_id, item_name, quantity)| {
            Ok(KitComponent {
                procedure_id: parse_uuid("kit_items.procedure_id", &procedure_id)?,
                inventory_item_id: parse_uuid("kit_items.inventory_item_id", &item_id)?,
                item_name,
                quantity_required: quantity_from_milli(quantity),
            })
        })
        .collect()
}
