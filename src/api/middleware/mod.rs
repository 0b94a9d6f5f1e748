//! API middleware stack.
//!
//! Execution order (outermost → innermost):
//! 1. Audit logger: sees every request, including rejected ones
//! 2. Clinic resolver: parses `X-Clinic-Id` into `ClinicContext`

pub mod audit;
pub mod clinic;
