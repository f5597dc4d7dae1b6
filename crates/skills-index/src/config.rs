//! TOML configuration with per-section defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{IndexError, Result};

/// Top-level configuration, loaded from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub index: IndexConfig,
    pub refresh: RefreshConfig,
    pub search: SearchConfig,
    pub usage: UsageConfig,
}

impl AppConfig {
    /// Load configuration from the default path
    /// (~/.config/skills-server/config.toml), falling back to defaults if
    /// the file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|e| IndexError::Parse(format!("Invalid config {}: {}", path.display(), e)))
    }

    /// Write current configuration to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = self.to_toml()?;
        std::fs::write(&path, contents)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| IndexError::Parse(e.to_string()))
    }

    /// Default config file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("skills-server")
            .join("config.toml")
    }
}

/// Where skills live and how each skill directory is laid out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Directory containing one subdirectory per skill.
    pub root: PathBuf,
    /// Metadata descriptor file name.
    pub meta_file: String,
    /// Primary document file name.
    pub primary_file: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("skills"),
            meta_file: "_meta.json".into(),
            primary_file: "SKILL.md".into(),
        }
    }
}

/// How the live index notices changes on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshMode {
    /// Periodic mtime scan.
    Poll,
    /// Filesystem notifications.
    Watch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub mode: RefreshMode,
    /// Seconds between polls.
    pub interval_secs: u64,
}

impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            mode: RefreshMode::Poll,
            interval_secs: 5,
        }
    }
}

/// Search defaults and snippet geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Default result limit for metadata search.
    pub metadata_limit: usize,
    /// Default result limit for content search.
    pub content_limit: usize,
    /// Characters shown from the match onwards.
    pub snippet_length: usize,
    /// Characters shown before the match.
    pub snippet_lead: usize,
    /// Phrase matches ending within this many characters score higher.
    pub intro_window: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            metadata_limit: 5,
            content_limit: 10,
            snippet_length: 150,
            snippet_lead: 50,
            intro_window: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageConfig {
    /// Recent queries kept in memory.
    pub history_capacity: usize,
    /// Recent queries included in stats.
    pub recent_display: usize,
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            history_capacity: 100,
            recent_display: 10,
        }
    }
}
