use std::path::Path;
use std::sync::Arc;

use specforge_core::config::Config;
use specforge_core::controller::{DiscoveryController, PrdController, PrdPolicy};
use specforge_core::generation::Generator;
use specforge_core::orchestration::Controllers;
use specforge_core::store::{self, Store};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub discovery: Arc<DiscoveryController>,
    pub prds: Arc<PrdController>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, generator: Arc<dyn Generator>, config: Config) -> Self {
        let policy = PrdPolicy::from_config(&config.generation);
        let Controllers { discovery, prds } = Controllers::new(store, generator, policy);
        Self {
            discovery,
            prds,
            config: Arc::new(config),
        }
    }

    /// Open the configured store under `root` and wire the controllers.
    pub fn open(
        root: &Path,
        config: Config,
        generator: Arc<dyn Generator>,
    ) -> specforge_core::Result<Self> {
        let store = store::open(root, &config.store)?;
        Ok(Self::new(store, generator, config))
    }
}
