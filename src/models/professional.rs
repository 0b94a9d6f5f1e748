use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Directory entry for a professional. `commission_rate` is a percentage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Professional {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub name: String,
    pub commission_rate: Decimal,
    pub active: bool,
}
