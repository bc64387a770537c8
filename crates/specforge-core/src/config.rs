use crate::error::{ForgeError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// `"*"` allows any origin.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            cors_origins: default_cors_origins(),
        }
    }
}

// ---------------------------------------------------------------------------
// GenerationConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    3
}

fn default_api_url() -> String {
    "https://api.anthropic.com/v1/messages".to_string()
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            api_url: default_api_url(),
        }
    }
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// StoreConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Redb,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Relative paths resolve against the project root.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(paths::STORE_FILE)
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_store_path(),
        }
    }
}

impl StoreConfig {
    pub fn resolved_path(&self, root: &Path) -> PathBuf {
        if self.path.is_absolute() {
            self.path.clone()
        } else {
            root.join(&self.path)
        }
    }
}

// ---------------------------------------------------------------------------
// ProjectConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProjectConfig {
    #[serde(default)]
    pub name: String,
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self::new("")
    }
}

impl Config {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            version: default_version(),
            project: ProjectConfig {
                name: project_name.into(),
            },
            server: ServerConfig::default(),
            generation: GenerationConfig::default(),
            store: StoreConfig::default(),
        }
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(ForgeError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// Like [`Config::load`], but an uninitialized root yields defaults.
    pub fn load_or_default(root: &Path) -> Result<Self> {
        match Self::load(root) {
            Err(ForgeError::NotInitialized) => Ok(Self::default()),
            other => other,
        }
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.generation.max_attempts == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "generation.max_attempts is 0: no PRD could ever be generated"
                    .to_string(),
            });
        }

        if self.generation.timeout_secs == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "generation.timeout_secs is 0: every attempt will time out"
                    .to_string(),
            });
        }

        if self.generation.model.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "generation.model is empty".to_string(),
            });
        }

        if self.server.cors_origins.is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "server.cors_origins is empty: browsers on other origins are rejected"
                    .to_string(),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::new("corner-shop");
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.project.name, "corner-shop");
        assert_eq!(parsed.version, 1);
        assert_eq!(parsed.server.port, 8080);
        assert_eq!(parsed.generation.max_attempts, 3);
        assert_eq!(parsed.store.backend, StoreBackend::Redb);
    }

    #[test]
    fn sparse_yaml_fills_defaults() {
        let cfg: Config = serde_yaml::from_str("generation:\n  max_tokens: 1024\n").unwrap();
        assert_eq!(cfg.generation.max_tokens, 1024);
        assert_eq!(cfg.generation.model, "claude-sonnet-4-20250514");
        assert_eq!(cfg.generation.timeout(), Duration::from_secs(60));
        assert_eq!(cfg.server.cors_origins, vec!["*".to_string()]);
    }

    #[test]
    fn memory_backend_parses() {
        let cfg: Config = serde_yaml::from_str("store:\n  backend: memory\n").unwrap();
        assert_eq!(cfg.store.backend, StoreBackend::Memory);
    }

    #[test]
    fn load_requires_init() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Config::load(dir.path()),
            Err(ForgeError::NotInitialized)
        ));
        let cfg = Config::load_or_default(dir.path()).unwrap();
        assert_eq!(cfg.server.port, 8080);
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let mut cfg = Config::new("bakery");
        cfg.server.port = 9090;
        cfg.save(dir.path()).unwrap();
        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded.project.name, "bakery");
        assert_eq!(loaded.server.port, 9090);
    }

    #[test]
    fn store_path_resolves_against_root() {
        let cfg = StoreConfig::default();
        assert_eq!(
            cfg.resolved_path(Path::new("/srv/app")),
            PathBuf::from("/srv/app/.specforge/specforge.redb")
        );
    }

    #[test]
    fn validate_default_config_no_warnings() {
        assert!(Config::new("x").validate().is_empty());
    }

    #[test]
    fn validate_zero_attempts_is_error() {
        let mut cfg = Config::new("x");
        cfg.generation.max_attempts = 0;
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].level, WarnLevel::Error);
    }

    #[test]
    fn validate_collects_warnings() {
        let mut cfg = Config::new("x");
        cfg.generation.timeout_secs = 0;
        cfg.generation.model = " ".to_string();
        cfg.server.cors_origins.clear();
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 3);
        assert!(warnings.iter().all(|w| w.level == WarnLevel::Warning));
    }
}
