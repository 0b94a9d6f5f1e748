use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Procedure {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub name: String,
    pub duration_minutes: i64,
    pub price: Decimal,
}

impl Procedure {
    pub fn duration(&self) -> Duration {
        Duration::minutes(self.duration_minutes)
    }
}
