//! Engine configuration at `<home>/.mirrorboard/config.yaml`.
//!
//! Every field has a default, so a partial or missing file is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::board::root_at;
use crate::error::{io_err, BoardError};
use crate::identity::DEFAULT_DECORATION;
use crate::types::ChildLayout;

pub const CONFIG_FILE: &str = "config.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Period of the timer trigger.
    pub tick_interval_ms: u64,
    /// Upper bound on a single remote fetch.
    pub fetch_timeout_ms: u64,
    pub child_layout: ChildLayout,
    /// Marker prefixed to the label of parents whose fetch failed.
    pub decoration: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 2_000,
            fetch_timeout_ms: 10_000,
            child_layout: ChildLayout::default(),
            decoration: DEFAULT_DECORATION.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms.max(1))
    }
}

/// `<home>/.mirrorboard/config.yaml`
pub fn config_path_at(home: &Path) -> PathBuf {
    root_at(home).join(CONFIG_FILE)
}

/// Load the configuration, falling back to defaults when the file is absent.
pub fn load_at(home: &Path) -> Result<EngineConfig, BoardError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Ok(EngineConfig::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    if contents.trim().is_empty() {
        return Ok(EngineConfig::default());
    }
    serde_yaml::from_str(&contents).map_err(|e| BoardError::Parse { path, source: e })
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<EngineConfig, BoardError> {
    load_at(&crate::board::home()?)
}

/// Write `config` to `<home>/.mirrorboard/config.yaml`, creating the directory.
pub fn save_at(home: &Path, config: &EngineConfig) -> Result<PathBuf, BoardError> {
    let path = config_path_at(home);
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    }
    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&path, yaml).map_err(|e| io_err(&path, e))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_config_uses_defaults() {
        let home = TempDir::new().expect("tempdir");
        let config = load_at(home.path()).expect("load");
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.tick_interval(), Duration::from_secs(2));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let home = TempDir::new().expect("tempdir");
        let path = config_path_at(home.path());
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(&path, "fetch_timeout_ms: 250\nchild_layout:\n  height: 30\n").expect("write");

        let config = load_at(home.path()).expect("load");
        assert_eq!(config.fetch_timeout(), Duration::from_millis(250));
        assert_eq!(config.tick_interval_ms, 2_000);
        assert_eq!(config.child_layout.height, 30.0);
        assert_eq!(config.child_layout.width, 300.0);
    }

    #[test]
    fn malformed_config_reports_path() {
        let home = TempDir::new().expect("tempdir");
        let path = config_path_at(home.path());
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(&path, "tick_interval_ms: [not, a, number]\n").expect("write");

        let err = load_at(home.path()).unwrap_err();
        assert!(matches!(err, BoardError::Parse { .. }));
        assert!(err.to_string().contains("config.yaml"));
    }

    #[test]
    fn saved_config_loads_back() {
        let home = TempDir::new().expect("tempdir");
        let config = EngineConfig {
            tick_interval_ms: 500,
            decoration: "!!".into(),
            ..EngineConfig::default()
        };
        let path = save_at(home.path(), &config).expect("save");
        assert!(path.ends_with(".mirrorboard/config.yaml"));
        assert_eq!(load_at(home.path()).expect("load"), config);
    }
}
