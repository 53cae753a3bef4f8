//! CLI configuration, persisted as JSON.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Defaults applied when the matching flag is not given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub skip_large_metadata: bool,
    #[serde(default)]
    pub mmap: bool,
    /// Top-level layers hidden by `layers` when no `--ignore` is given.
    #[serde(default)]
    pub ignore_layers: Vec<String>,
}

impl AppConfig {
    /// Platform config directory: `~/.config/gguf-inspect/`
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gguf-inspect")
    }

    fn config_file() -> PathBuf {
        Self::config_dir().join("config.json")
    }

    /// Load from disk, or return defaults if the file doesn't exist.
    pub fn load_or_default() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_file())
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&data).with_context(|| format!("invalid config {}", path.display()))
    }

    /// Persist to disk.
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_file())
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    /// Update one field from its string form.
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "skip_large_metadata" => self.skip_large_metadata = value.parse()?,
            "mmap" => self.mmap = value.parse()?,
            "ignore_layers" => {
                self.ignore_layers = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            }
            _ => anyhow::bail!("Unknown config key: {key}"),
        }
        Ok(())
    }
}
