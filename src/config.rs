//! Configuration management for reelcast
//!
//! Handles config file loading/saving and catalog URL resolution.
//! Config is stored at ~/.config/reelcast/config.toml

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Sample catalog used when nothing else is configured
pub const DEFAULT_CATALOG_URL: &str =
    "https://commondatastorage.googleapis.com/gtv-videos-bucket/CastVideos/f.json";

/// Environment variable overriding the catalog URL
pub const CATALOG_URL_ENV: &str = "REELCAST_CATALOG_URL";

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Catalog document URL
    pub catalog_url: Option<String>,
    /// Default Chromecast device name
    pub default_device: Option<String>,
    /// mpv binary to launch for local playback
    pub player: Option<String>,
    /// catt binary used for Chromecast discovery and control
    pub catt: Option<String>,
    /// Load media paused instead of starting right away
    #[serde(default)]
    pub start_paused: bool,
}

impl Config {
    /// Get config file path (~/.config/reelcast/config.toml)
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("reelcast").join("config.toml"))
    }

    /// Load config from the default location, or return default if not found
    pub fn load() -> Self {
        Self::path()
            .and_then(|p| Self::load_from(&p).ok())
            .unwrap_or_default()
    }

    /// Load config from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        let path = Self::path().ok_or_else(|| anyhow::anyhow!("Could not determine config path"))?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let toml = toml::to_string_pretty(self)?;
        std::fs::write(path, toml)?;
        Ok(())
    }

    /// Get the catalog URL with fallback chain:
    /// 1. Environment variable REELCAST_CATALOG_URL
    /// 2. `catalog_url` from the config file
    /// 3. The bundled sample catalog
    pub fn effective_catalog_url(&self) -> String {
        Self::resolve_catalog_url(std::env::var(CATALOG_URL_ENV).ok(), self.catalog_url.as_deref())
    }

    fn resolve_catalog_url(env: Option<String>, configured: Option<&str>) -> String {
        env.filter(|url| !url.trim().is_empty())
            .or_else(|| configured.map(str::to_string))
            .unwrap_or_else(|| DEFAULT_CATALOG_URL.to_string())
    }

    /// mpv binary, defaulting to `mpv` from PATH
    pub fn player_binary(&self) -> &str {
        self.player
            .as_deref()
            .unwrap_or(crate::stream::player::DEFAULT_MPV_BINARY)
    }

    /// catt binary, defaulting to `catt` from PATH
    pub fn catt_binary(&self) -> &str {
        self.catt
            .as_deref()
            .unwrap_or(crate::stream::cast::DEFAULT_CATT_BINARY)
    }
}
