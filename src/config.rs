//! Runtime configuration loaded from a RON file, with defaults for every
//! field that the file leaves out.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::texture::TextureSlot;

pub const DEFAULT_CONFIG_FILE: &str = "earth.ron";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[source] ron::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub assets: AssetConfig,
    pub debug: DebugConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Initial inner width in physical pixels.
    pub width: u32,
    pub height: u32,
    pub title: String,
    /// Prefer `PresentMode::Fifo` over low-latency modes.
    pub vsync: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            title: "MyEarth".to_string(),
            vsync: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Directory holding `shaders/` and `textures/`.
    pub root: PathBuf,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("assets"),
        }
    }
}

impl AssetConfig {
    pub fn shader_path(&self, file: &str) -> PathBuf {
        self.root.join("shaders").join(file)
    }

    pub fn texture_path(&self, slot: TextureSlot) -> PathBuf {
        self.root.join("textures").join(slot.file_name())
    }

    pub fn skybox_dir(&self) -> PathBuf {
        self.texture_path(TextureSlot::Skybox)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Log filter used when `RUST_LOG` is not set.
    pub log_level: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Parses a config file. Every missing field keeps its default.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        ron::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Like [`Config::load`], but a file that does not exist yields the
    /// defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match Self::load(path) {
            Err(ConfigError::Read { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            other => other,
        }
    }

    pub fn to_ron(&self) -> Result<String, ConfigError> {
        let pretty = ron::ser::PrettyConfig::new().depth_limit(3);
        ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::Serialize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_open_an_800x600_window() {
        let config = Config::default();
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.window.title, "MyEarth");
        assert_eq!(
            config.assets.shader_path("sun_fs.wgsl"),
            PathBuf::from("assets/shaders/sun_fs.wgsl")
        );
        assert_eq!(
            config.assets.texture_path(TextureSlot::Diffuse),
            PathBuf::from("assets/textures/day.jpg")
        );
        assert_eq!(
            config.assets.skybox_dir(),
            PathBuf::from("assets/textures/skybox")
        );
    }

    #[test]
    fn ron_roundtrip() {
        let mut config = Config::default();
        config.window.width = 1024;
        config.assets.root = PathBuf::from("/opt/earth");
        let text = config.to_ron().unwrap();
        assert!(text.contains("width: 1024"));
        let parsed: Config = ron::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("earth.ron");
        fs::write(&path, "(window: (height: 900))").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.window.height, 900);
        assert_eq!(config.window.width, 800);
        assert_eq!(config.debug.log_level, "info");
    }

    #[test]
    fn missing_file_falls_back_only_when_optional() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.ron");
        assert_eq!(Config::load_or_default(&path).unwrap(), Config::default());
        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn invalid_ron_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.ron");
        fs::write(&path, "{{not valid}}").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("broken.ron"));
    }
}
