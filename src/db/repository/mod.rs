//! Repository layer: entity-scoped database operations.
//!
//! Functions take a `&Connection` so callers can run them inside their own
//! transaction (`Transaction` derefs to `Connection`). Every query is scoped
//! by `clinic_id`.

mod appointment;
mod availability;
mod commission;
mod inventory;
mod kit;
mod procedure;
mod professional;

use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::DatabaseError;

pub use appointment::*;
pub use availability::*;
pub use commission::*;
pub use inventory::*;
pub use kit::*;
pub use procedure::*;
pub use professional::*;

pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";

pub fn fmt_datetime(value: &NaiveDateTime) -> String {
    value.format(DATETIME_FORMAT).to_string()
}

pub fn fmt_date(value: &NaiveDate) -> String {
    value.format(DATE_FORMAT).to_string()
}

pub fn fmt_time(value: &NaiveTime) -> String {
    value.format(TIME_FORMAT).to_string()
}

fn invalid(field: &str, value: &str) -> DatabaseError {
    DatabaseError::InvalidValue {
        field: field.into(),
        value: value.into(),
    }
}

pub(crate) fn parse_uuid(field: &str, value: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(value).map_err(|_| invalid(field, value))
}

pub(crate) fn parse_datetime(field: &str, value: &str) -> Result<NaiveDateTime, DatabaseError> {
    NaiveDateTime::parse_from_str(value, DATETIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .map_err(|_| invalid(field, value))
}

pub(crate) fn parse_date(field: &str, value: &str) -> Result<NaiveDate, DatabaseError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| invalid(field, value))
}

pub(crate) fn parse_time(field: &str, value: &str) -> Result<NaiveTime, DatabaseError> {
    NaiveTime::parse_from_str(value, TIME_FORMAT).map_err(|_| invalid(field, value))
}

pub(crate) fn parse_decimal(field: &str, value: &str) -> Result<Decimal, DatabaseError> {
    Decimal::from_str(value).map_err(|_| invalid(field, value))
}

pub(crate) fn weekday_to_index(weekday: Weekday) -> i64 {
    i64::from(weekday.num_days_from_monday())
}

pub(crate) fn weekday_from_index(index: i64) -> Result<Weekday, DatabaseError> {
    match index {
        0 => Ok(Weekday::Mon),
        1 => Ok(Weekday::Tue),
        2 => Ok(Weekday::Wed),
        3 => Ok(Weekday::Thu),
        4 => Ok(Weekday::Fri),
        5 => Ok(Weekday::Sat),
        6 => Ok(Weekday::Sun),
        other => Err(invalid("weekday", &other.to_string())),
    }
}
