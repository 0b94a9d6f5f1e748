//! API endpoint handlers.
//!
//! Each module corresponds to one core component. Handlers parse the
//! request, run the `CoreState` operation on the blocking pool and map
//! the result to JSON.

pub mod appointments;
pub mod availability;
pub mod commissions;
pub mod directory;
pub mod health;
pub mod inventory;
