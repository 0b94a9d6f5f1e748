use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One open window of the weekly working-hours template.
///
/// A `close_time` of 00:00 closes at the end of the day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkingWindow {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub professional_id: Uuid,
    pub weekday: Weekday,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
}

/// Offset of a window's opening from the start of its day.
pub fn open_offset(open: NaiveTime) -> Duration {
    open - NaiveTime::MIN
}

/// Offset of a window's close from the start of its day; 00:00 is the next midnight.
pub fn close_offset(close: NaiveTime) -> Duration {
    if close == NaiveTime::MIN {
        Duration::days(1)
    } else {
        close - NaiveTime::MIN
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityException {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub professional_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_full_day: bool,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub reason: Option<String>,
    pub created_at: NaiveDateTime,
}

impl AvailabilityException {
    pub fn covers_date(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    /// Expired once the whole range lies before `today`.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.end_date < today
    }
}

/// Input for a new availability exception.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewException {
    pub professional_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_full_day: bool,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub reason: Option<String>,
}
