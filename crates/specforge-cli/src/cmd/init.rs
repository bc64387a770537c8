use anyhow::Context;
use specforge_core::{config::Config, io, paths};
use std::path::Path;

pub fn run(root: &Path, name: Option<&str>) -> anyhow::Result<()> {
    let project_name = name
        .map(str::to_string)
        .or_else(|| {
            root.file_name()
                .map(|n| n.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "project".to_string());

    println!("Initializing specforge in: {}", root.display());

    let dir = paths::specforge_dir(root);
    io::ensure_dir(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let config_path = paths::config_path(root);
    if !config_path.exists() {
        let cfg = Config::new(&project_name);
        cfg.save(root).context("failed to write config.yaml")?;
        println!("  created: {}", paths::CONFIG_FILE);
    } else {
        println!("  exists:  {}", paths::CONFIG_FILE);
    }

    io::ensure_gitignore_entry(root, paths::STORE_FILE).context("failed to update .gitignore")?;

    println!("\nNext: specforge discovery show <project>");
    Ok(())
}
