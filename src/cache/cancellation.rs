//! Cooperative cancellation registry.
//!
//! A plain shared flag store: the orchestrator consults it voluntarily at
//! phase boundaries, and image sub-jobs consult it before writing results.
//! Nothing here interrupts work already in flight.
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use uuid::Uuid;

#[derive(Debug, Default)]
pub struct CancellationRegistry {
    flags: RwLock<HashMap<Uuid, bool>>,
}

impl CancellationRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a request id known to the registry with the flag unset.
    pub fn register(&self, request_id: Uuid) {
        self.flags
            .write()
            .expect("cancellation lock poisoned")
            .insert(request_id, false);
    }

    #[must_use]
    pub fn is_cancelled(&self, request_id: Uuid) -> bool {
        self.flags
            .read()
            .expect("cancellation lock poisoned")
            .get(&request_id)
            .copied()
            .unwrap_or(false)
    }

    /// Set the cancelled flag. Returns whether the id was known; cancelling
    /// an unknown id has no effect.
    pub fn cancel(&self, request_id: Uuid) -> bool {
        let mut flags = self.flags.write().expect("cancellation lock poisoned");
        match flags.get_mut(&request_id) {
            Some(flag) => {
                *flag = true;
                true
            }
            None => false,
        }
    }

    /// Forget a request id. Safe to call repeatedly.
    pub fn cleanup(&self, request_id: Uuid) {
        self.flags
            .write()
            .expect("cancellation lock poisoned")
            .remove(&request_id);
    }

    /// Token for one request, handed through the pipeline phases.
    #[must_use]
    pub fn token(self: &Arc<Self>, request_id: Uuid) -> CancellationToken {
        CancellationToken {
            registry: Arc::clone(self),
            request_id,
        }
    }
}

/// Cancellation check for a single request, passed through every phase call
/// so the check sites are explicit and testable.
#[derive(Clone)]
pub struct CancellationToken {
    registry: Arc<CancellationRegistry>,
    request_id: Uuid,
}

impl CancellationToken {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.registry.is_cancelled(self.request_id)
    }

    #[must_use]
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_flips_flag_for_known_id() {
        let registry = CancellationRegistry::new();
        let id = Uuid::new_v4();

        registry.register(id);
        assert!(!registry.is_cancelled(id));

        assert!(registry.cancel(id));
        assert!(registry.is_cancelled(id));
    }

    #[test]
    fn cancel_unknown_id_is_rejected() {
        let registry = CancellationRegistry::new();
        assert!(!registry.cancel(Uuid::new_v4()));
    }

    #[test]
    fn cleanup_forgets_the_flag() {
        let registry = CancellationRegistry::new();
        let id = Uuid::new_v4();

        registry.register(id);
        registry.cancel(id);
        registry.cleanup(id);

        assert!(!registry.is_cancelled(id));
        // Cleanup twice is fine.
        registry.cleanup(id);
    }

    #[test]
    fn token_reflects_registry_state() {
        let registry = Arc::new(CancellationRegistry::new());
        let id = Uuid::new_v4();
        registry.register(id);

        let token = registry.token(id);
        assert!(!token.is_cancelled());

        registry.cancel(id);
        assert!(token.is_cancelled());
    }
}
