use anyhow::Context;
use specforge_core::config::{Config, StoreBackend};
use specforge_server::{generator, AppState};
use std::path::Path;

use super::GenerationArgs;

pub fn run(
    root: &Path,
    port: Option<u16>,
    memory: bool,
    gen: &GenerationArgs,
) -> anyhow::Result<()> {
    // serving an uninitialized root is allowed; defaults apply
    let mut config = Config::load_or_default(root).context("failed to load config")?;
    gen.apply(&mut config.generation);
    if memory {
        config.store.backend = StoreBackend::Memory;
    }
    for w in config.validate() {
        tracing::warn!(level = ?w.level, "{}", w.message);
    }

    let port = port.unwrap_or(config.server.port);
    let generator = generator::from_key(gen.api_key.clone(), &config.generation);
    let state = AppState::open(root, config, generator).context("failed to open store")?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(specforge_server::serve(state, port))
}
