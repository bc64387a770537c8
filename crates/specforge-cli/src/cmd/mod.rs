pub mod config;
pub mod discovery;
pub mod init;
pub mod prd;
pub mod serve;

use anyhow::Context;
use clap::Args;
use specforge_core::config::{Config, GenerationConfig};
use specforge_core::controller::PrdPolicy;
use specforge_core::orchestration::Controllers;
use specforge_core::store;
use specforge_server::generator;
use std::path::Path;

/// Generation settings taken from the environment. The key is never
/// written to config.yaml.
#[derive(Args, Clone, Default)]
pub struct GenerationArgs {
    /// Claude API key
    #[arg(long, global = true, env = "CLAUDE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Override generation.model
    #[arg(long, global = true, env = "CLAUDE_MODEL")]
    pub model: Option<String>,

    /// Override generation.max_tokens
    #[arg(long, global = true, env = "CLAUDE_MAX_TOKENS")]
    pub max_tokens: Option<u32>,
}

impl GenerationArgs {
    pub fn apply(&self, config: &mut GenerationConfig) {
        if let Some(model) = self.model.as_ref().filter(|m| !m.trim().is_empty()) {
            config.model = model.clone();
        }
        if let Some(max_tokens) = self.max_tokens {
            config.max_tokens = max_tokens;
        }
    }
}

/// Config from `root` with environment overrides applied.
pub fn load_config(root: &Path, gen: &GenerationArgs) -> anyhow::Result<Config> {
    let mut config = Config::load(root).context("failed to load config")?;
    gen.apply(&mut config.generation);
    Ok(config)
}

/// Both controllers over the project's configured store.
pub fn open(root: &Path, gen: &GenerationArgs) -> anyhow::Result<Controllers> {
    let config = load_config(root, gen)?;
    let store = store::open(root, &config.store).context("failed to open store")?;
    let generator = generator::from_key(gen.api_key.clone(), &config.generation);
    Ok(Controllers::new(
        store,
        generator,
        PrdPolicy::from_config(&config.generation),
    ))
}
