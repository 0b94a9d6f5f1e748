//! HTTP facade over `CoreState`.
//!
//! Routes are nested under `/api/` and scoped to the clinic named in the
//! `X-Clinic-Id` header. Core errors map to structured JSON responses.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_api_server, ApiServer};
pub use types::ApiContext;
