//! Shared types for the HTTP facade.

use std::sync::Arc;

use uuid::Uuid;

use crate::api::error::ApiError;
use crate::core_state::CoreState;
use crate::error::CoreError;

/// Shared context for all API routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }

    /// Run a core operation on the blocking pool. Storage calls may wait on
    /// the SQLite lock for up to the configured busy timeout.
    pub async fn run<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&CoreState) -> Result<T, CoreError> + Send + 'static,
        T: Send + 'static,
    {
        let core = self.core.clone();
        tokio::task::spawn_blocking(move || f(&core))
            .await
            .map_err(|e| ApiError::Internal(format!("worker task failed: {e}")))?
            .map_err(ApiError::from)
    }
}

/// Tenant of the current request, injected by the clinic middleware.
#[derive(Debug, Clone, Copy)]
pub struct ClinicContext {
    pub clinic_id: Uuid,
}
