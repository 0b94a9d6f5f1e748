//! Per-professional write serialization.
//!
//! Booking and rescheduling hold the professional's lock for the whole
//! check-then-write, so two receptionists racing for the same slot are
//! ordered in process before either touches storage. The immediate
//! transaction underneath covers writers in other processes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use uuid::Uuid;

use crate::error::CoreError;

type Key = (Uuid, Uuid);

#[derive(Default)]
pub struct ProfessionalLocks {
    slots: Mutex<HashMap<Key, Arc<Mutex<()>>>>,
}

impl ProfessionalLocks {
    pub fn new() -> Self {
        Self::default()
    }

    // Poisoning is ignored: the guarded data is `()` or a map of fresh mutexes.
    fn slot(&self, clinic_id: &Uuid, professional_id: &Uuid) -> Arc<Mutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .entry((*clinic_id, *professional_id))
            .or_default()
            .clone()
    }

    /// Run `f` while holding the lock of one professional.
    pub fn with_lock<T>(
        &self,
        clinic_id: &Uuid,
        professional_id: &Uuid,
        f: impl FnOnce() -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        let slot = self.slot(clinic_id, professional_id);
        let _held = slot.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }

    /// Number of professionals that have been locked at least once.
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
