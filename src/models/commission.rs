use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{CommissionKind, CommissionStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionEntry {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub professional_id: Uuid,
    pub appointment_id: Uuid,
    pub kind: CommissionKind,
    pub amount: Decimal,
    pub status: CommissionStatus,
    pub note: Option<String>,
    pub created_at: NaiveDateTime,
    pub paid_at: Option<NaiveDateTime>,
}

/// Aggregate over one professional's entries whose source appointment
/// starts within `[period_start, period_end]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionSummary {
    pub professional_id: Uuid,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub total_generated: Decimal,
    pub total_paid: Decimal,
    pub total_pending: Decimal,
    pub count: usize,
    pub rate: Decimal,
}
