//! Core error taxonomy.
//!
//! Every core operation returns `CoreError`. Variants are semantic and scoped
//! to the single requested operation; none of them is fatal to the process.

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::AppointmentStatus;

/// Why a booking or reschedule was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConflictReason {
    /// Overlaps another active appointment of the same professional.
    Overlap { appointment_id: Uuid },
    /// Falls inside an availability exception.
    Blocked { exception_id: Uuid },
    /// Not covered by the professional's weekly hours.
    OutsideWorkingHours,
}

impl std::fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictReason::Overlap { appointment_id } => {
                write!(f, "overlaps appointment {appointment_id}")
            }
            ConflictReason::Blocked { exception_id } => {
                write!(f, "blocked by availability exception {exception_id}")
            }
            ConflictReason::OutsideWorkingHours => write!(f, "outside working hours"),
        }
    }
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Booking conflict: {0}")]
    Conflict(ConflictReason),

    #[error("Transition not allowed: {from} -> {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Appointment in status {status} cannot be rescheduled")]
    NotReschedulable { status: AppointmentStatus },

    #[error("Insufficient stock for {item_name}: required {required}, on hand {on_hand}")]
    InsufficientStock {
        item_id: Uuid,
        item_name: String,
        required: Decimal,
        on_hand: Decimal,
    },

    #[error("{entity_type} not found: {id}")]
    NotFound { entity_type: &'static str, id: String },

    #[error("Storage busy, operation timed out")]
    Busy,

    #[error("Database error: {0}")]
    Database(DatabaseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub fn not_found(entity_type: &'static str, id: impl ToString) -> Self {
        CoreError::NotFound {
            entity_type,
            id: id.to_string(),
        }
    }
}

impl From<DatabaseError> for CoreError {
    fn from(err: DatabaseError) -> Self {
        if err.is_busy() {
            return CoreError::Busy;
        }
        CoreError::Database(err)
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        DatabaseError::from(err).into()
    }
}
