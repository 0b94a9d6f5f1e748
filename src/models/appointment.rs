use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::AppointmentStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub patient_id: Uuid,
    pub professional_id: Uuid,
    pub procedure_id: Uuid,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    pub room: Option<String>,
    pub notes: Option<String>,
    pub status: AppointmentStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Booking request. `end_at` is derived from the procedure duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    pub patient_id: Uuid,
    pub professional_id: Uuid,
    pub procedure_id: Uuid,
    pub start_at: NaiveDateTime,
    pub room: Option<String>,
    pub notes: Option<String>,
}

/// One row of the appointment status history.
/// `from_status` is `None` for the booking itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub appointment_id: Uuid,
    pub from_status: Option<AppointmentStatus>,
    pub to_status: AppointmentStatus,
    pub start_at: NaiveDateTime,
    pub reason: Option<String>,
    pub changed_at: NaiveDateTime,
}
