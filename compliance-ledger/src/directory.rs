//! Fleet directory collaborator
//!
//! The ledger never owns vessel/voyage reference data; it consumes an
//! external directory as an existence oracle. The trait seam keeps the
//! transport out of the core: the gateway supplies an HTTP-backed
//! client, tests supply [`StaticFleetDirectory`].

use crate::{types::VoyageId, Result};
use parking_lot::RwLock;
use std::collections::HashSet;

/// Identifier/existence lookups against the fleet reference service
#[allow(async_fn_in_trait)]
pub trait FleetDirectory: Send + Sync + 'static {
    /// Whether the voyage is known to the fleet service
    async fn voyage_exists(&self, voyage_id: VoyageId) -> Result<bool>;
}

/// In-memory directory for tests and demos
#[derive(Debug, Default)]
pub struct StaticFleetDirectory {
    voyages: RwLock<HashSet<VoyageId>>,
}

impl StaticFleetDirectory {
    /// Empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a known voyage
    pub fn register_voyage(&self, voyage_id: VoyageId) {
        self.voyages.write().insert(voyage_id);
    }
}

impl FleetDirectory for StaticFleetDirectory {
    async fn voyage_exists(&self, voyage_id: VoyageId) -> Result<bool> {
        Ok(self.voyages.read().contains(&voyage_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_static_directory_lookup() {
        let directory = StaticFleetDirectory::new();
        let voyage = VoyageId::new(Uuid::new_v4());

        assert!(!directory.voyage_exists(voyage).await.unwrap());

        directory.register_voyage(voyage);
        assert!(directory.voyage_exists(voyage).await.unwrap());
    }
}
