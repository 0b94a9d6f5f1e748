use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::StockMovementReason;

/// Quantities are persisted as integer thousandths of a unit.
pub const QUANTITY_SCALE: u32 = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub name: String,
    pub on_hand: Decimal,
    pub min_quantity: Decimal,
    pub unit_cost: Decimal,
}

impl InventoryItem {
    pub fn is_low_stock(&self) -> bool {
        self.on_hand <= self.min_quantity
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInventoryItem {
    pub name: String,
    pub on_hand: Decimal,
    pub min_quantity: Decimal,
    pub unit_cost: Decimal,
}

/// One line of a procedure's bill of materials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KitComponent {
    pub procedure_id: Uuid,
    pub inventory_item_id: Uuid,
    pub item_name: String,
    pub quantity_required: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMovement {
    pub inventory_item_id: Uuid,
    pub delta: Decimal,
    pub reason: StockMovementReason,
    pub appointment_id: Option<Uuid>,
    pub created_at: NaiveDateTime,
}

/// Convert a quantity to stored thousandths. `None` when it carries more
/// precision than the store keeps or does not fit.
pub fn quantity_to_milli(quantity: Decimal) -> Option<i64> {
    let normalized = quantity.normalize();
    if normalized.scale() > QUANTITY_SCALE {
        return None;
    }
    let scaled = normalized.checked_mul(Decimal::from(1000))?;
    i64::try_from(scaled.trunc()).ok()
}

pub fn quantity_from_milli(milli: i64) -> Decimal {
    Decimal::new(milli, QUANTITY_SCALE).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn fractional_quantities_convert_exactly() {
        assert_eq!(quantity_to_milli(dec!(0.5)), Some(500));
        assert_eq!(quantity_to_milli(dec!(2)), Some(2000));
        assert_eq!(quantity_to_milli(dec!(1.250)), Some(1250));
        assert_eq!(quantity_from_milli(1250), dec!(1.25));
    }

    #[test]
    fn excess_precision_is_rejected() {
        assert_eq!(quantity_to_milli(dec!(0.0005)), None);
    }

    #[test]
    fn low_stock_at_threshold() {
        let item = InventoryItem {
            id: Uuid::new_v4(),
            clinic_id: Uuid::new_v4(),
            name: "Gloves".into(),
            on_hand: dec!(5),
            min_quantity: dec!(5),
            unit_cost: dec!(0.10),
        };
        assert!(item.is_low_stock());
    }
}
