use crate::output::{print_fields, print_json};
use clap::Subcommand;
use specforge_core::config::WarnLevel;
use std::path::Path;

use super::{load_config, GenerationArgs};

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show the effective configuration (environment overrides applied)
    Show,

    /// Validate the config for common mistakes
    Validate,
}

pub fn run(
    root: &Path,
    subcmd: ConfigSubcommand,
    gen: &GenerationArgs,
    json: bool,
) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => show(root, gen, json),
        ConfigSubcommand::Validate => validate(root, gen, json),
    }
}

fn show(root: &Path, gen: &GenerationArgs, json: bool) -> anyhow::Result<()> {
    let config = load_config(root, gen)?;
    let api_key = if gen.api_key.as_deref().is_some_and(|k| !k.trim().is_empty()) {
        "set"
    } else {
        "not set"
    };

    if json {
        let mut value = serde_json::to_value(&config)?;
        value["generation"]["api_key"] = serde_json::json!(api_key);
        return print_json(&value);
    }

    print_fields(&[
        ("project", config.project.name.clone()),
        ("port", config.server.port.to_string()),
        ("cors origins", config.server.cors_origins.join(", ")),
        ("model", config.generation.model.clone()),
        ("max tokens", config.generation.max_tokens.to_string()),
        ("timeout", format!("{}s", config.generation.timeout_secs)),
        ("max attempts", config.generation.max_attempts.to_string()),
        ("api url", config.generation.api_url.clone()),
        ("api key", api_key.to_string()),
        ("store", format!("{:?}", config.store.backend).to_lowercase()),
        ("store path", config.store.resolved_path(root).display().to_string()),
    ]);
    Ok(())
}

fn validate(root: &Path, gen: &GenerationArgs, json: bool) -> anyhow::Result<()> {
    let config = load_config(root, gen)?;
    let warnings = config.validate();

    if json {
        let value = serde_json::json!({
            "warnings": warnings,
        });
        print_json(&value)?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }

    Ok(())
}
