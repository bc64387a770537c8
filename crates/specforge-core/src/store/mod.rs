//! Entity storage behind two repository traits.
//!
//! Backends only persist; every invariant except the two uniqueness checks
//! (one discovery per project, one PRD per feature) lives in the controllers.

mod memory;
mod redb_store;

pub use self::memory::MemoryStore;
pub use self::redb_store::RedbStore;

use crate::config::{StoreBackend, StoreConfig};
use crate::discovery::{Discovery, DiscoveryEditHistory, DiscoveryFeature, DiscoveryUser};
use crate::error::Result;
use crate::prd::Prd;
use std::path::Path;
use std::sync::Arc;

pub trait DiscoveryRepository: Send + Sync {
    fn get_discovery(&self, id: &str) -> Result<Option<Discovery>>;

    fn discovery_for_project(&self, project_id: &str) -> Result<Option<Discovery>>;

    /// Insert a new discovery. Fails with `DiscoveryExists` when the project
    /// already has one.
    fn create_discovery(&self, discovery: &Discovery) -> Result<()>;

    /// Overwrite an existing discovery. Fails with `DiscoveryNotFound`.
    fn update_discovery(&self, discovery: &Discovery) -> Result<()>;

    /// Remove a discovery with its users, features and history.
    fn delete_discovery(&self, id: &str) -> Result<()>;

    fn add_user(&self, user: &DiscoveryUser) -> Result<()>;

    /// Users in insertion order.
    fn list_users(&self, discovery_id: &str) -> Result<Vec<DiscoveryUser>>;

    fn add_feature(&self, feature: &DiscoveryFeature) -> Result<()>;

    /// Features in insertion order.
    fn list_features(&self, discovery_id: &str) -> Result<Vec<DiscoveryFeature>>;

    fn append_history(&self, entry: &DiscoveryEditHistory) -> Result<()>;

    /// History oldest first.
    fn list_history(&self, discovery_id: &str) -> Result<Vec<DiscoveryEditHistory>>;
}

pub trait PrdRepository: Send + Sync {
    fn get_prd(&self, id: &str) -> Result<Option<Prd>>;

    fn prd_for_feature(&self, feature_id: &str) -> Result<Option<Prd>>;

    /// Insert a new PRD. Fails with `PrdExists` when the feature already has one.
    fn create_prd(&self, prd: &Prd) -> Result<()>;

    /// Overwrite an existing PRD. Fails with `PrdNotFound`.
    fn update_prd(&self, prd: &Prd) -> Result<()>;

    /// Project PRDs ordered by version, priority, creation.
    fn list_prds(&self, project_id: &str) -> Result<Vec<Prd>>;
}

/// Both repositories; what the controllers hold.
pub trait Store: DiscoveryRepository + PrdRepository {}

impl<T: DiscoveryRepository + PrdRepository> Store for T {}

/// Open the backend named by `config`.
pub fn open(root: &Path, config: &StoreConfig) -> Result<Arc<dyn Store>> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreBackend::Redb => {
            let path = config.resolved_path(root);
            if let Some(parent) = path.parent() {
                crate::io::ensure_dir(parent)?;
            }
            tracing::debug!(path = %path.display(), "opening redb store");
            Ok(Arc::new(RedbStore::open(&path)?))
        }
    }
}

// ---------------------------------------------------------------------------
// Shared backend tests
// ---------------------------------------------------------------------------
