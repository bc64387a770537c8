use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const SPECFORGE_DIR: &str = ".specforge";
pub const CONFIG_FILE: &str = ".specforge/config.yaml";
pub const STORE_FILE: &str = ".specforge/specforge.redb";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn specforge_dir(root: &Path) -> PathBuf {
    root.join(SPECFORGE_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn store_path(root: &Path) -> PathBuf {
    root.join(STORE_FILE)
}
