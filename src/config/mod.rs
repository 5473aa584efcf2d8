//! Pipeline configuration from `sitepipe.toml`.
//!
//! Every field has a convention-driven default; a missing config file is
//! not an error. Unknown keys are warned about rather than rejected.
//!
//! | Section   | Purpose                                        |
//! |-----------|------------------------------------------------|
//! | `[paths]` | Source/output directory names                  |
//! | `[serve]` | Dev server (interface, port, ws_port, open)    |
//! | `[watch]` | Watch-mode toggles (plain html watching)       |
//! | `[image]` | Image re-encoding quality                      |

mod error;

pub use error::ConfigError;

use crate::{cli::Cli, log};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    fs,
    net::{IpAddr, Ipv4Addr},
    path::{Path, PathBuf},
};

/// Root configuration structure representing sitepipe.toml
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Project root directory - parent of the config file (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    /// Source/output directory names
    pub paths: PathsSection,

    /// Development server settings
    pub serve: ServeSection,

    /// Watch-mode settings
    pub watch: WatchSection,

    /// Image re-encoding settings
    pub image: ImageSection,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::new(),
            paths: PathsSection::default(),
            serve: ServeSection::default(),
            watch: WatchSection::default(),
            image: ImageSection::default(),
        }
    }
}

/// `[paths]` - source and output directory names, rooted at the project root.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsSection {
    pub source: PathBuf,
    pub output: PathBuf,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            source: PathBuf::from("src"),
            output: PathBuf::from("build"),
        }
    }
}

/// `[serve]` - development server settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServeSection {
    /// Network interface to bind
    pub interface: IpAddr,
    /// HTTP port (retried upward when in use)
    pub port: u16,
    /// WebSocket port for live reload (retried upward when in use)
    pub ws_port: u16,
    /// Open a local browser once the server is up
    pub open: bool,
}

impl Default for ServeSection {
    fn default() -> Self {
        Self {
            interface: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3000,
            ws_port: 35729,
            open: true,
        }
    }
}

/// `[watch]` - watch-mode toggles.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WatchSection {
    /// Watch plain html sources (off: only templates are watched for markup)
    pub html: bool,
}

impl Default for WatchSection {
    fn default() -> Self {
        Self { html: false }
    }
}

/// `[image]` - image re-encoding settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImageSection {
    /// AVIF encoding quality (0-100)
    pub avif_quality: f32,
    /// JPEG re-encode quality (0-100)
    pub jpeg_quality: u8,
}

impl Default for ImageSection {
    fn default() -> Self {
        Self {
            avif_quality: 70.0,
            jpeg_quality: 80,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from CLI arguments.
    ///
    /// A missing config file yields the defaults with the current directory
    /// as project root.
    pub fn load(cli: &Cli) -> Result<Self> {
        let config_path = &cli.config;

        if !config_path.exists() {
            let mut config = Self::default();
            config.root = std::env::current_dir().context("cannot determine current directory")?;
            return Ok(config);
        }

        let content = fs::read_to_string(config_path)
            .map_err(|e| ConfigError::Io(config_path.clone(), e))?;
        let mut config = Self::parse(&content)?;

        config.root = config_path
            .canonicalize()
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));

        config.validate()?;
        Ok(config)
    }

    /// Parse TOML content, warning on unknown keys.
    fn parse(content: &str) -> Result<Self> {
        let de = toml::Deserializer::new(content);
        let mut unknown: Vec<String> = Vec::new();
        let config: Self = serde_ignored::deserialize(de, |path| unknown.push(path.to_string()))
            .map_err(ConfigError::Toml)?;

        for key in &unknown {
            log!("config"; "unknown key `{}` ignored", key);
        }
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.paths.source == self.paths.output {
            return Err(ConfigError::Validation(
                "paths.source and paths.output must differ".into(),
            )
            .into());
        }
        if !(0.0..=100.0).contains(&self.image.avif_quality) {
            return Err(ConfigError::Validation(format!(
                "image.avif_quality must be within 0-100, got {}",
                self.image.avif_quality
            ))
            .into());
        }
        if !(1..=100).contains(&self.image.jpeg_quality) {
            return Err(ConfigError::Validation(format!(
                "image.jpeg_quality must be within 1-100, got {}",
                self.image.jpeg_quality
            ))
            .into());
        }
        Ok(())
    }

    /// Absolute source root (`<root>/src` by default).
    pub fn source_dir(&self) -> PathBuf {
        self.root.join(&self.paths.source)
    }

    /// Absolute output root (`<root>/build` by default).
    pub fn output_dir(&self) -> PathBuf {
        self.root.join(&self.paths.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.paths.source, PathBuf::from("src"));
        assert_eq!(config.paths.output, PathBuf::from("build"));
        assert_eq!(config.serve.port, 3000);
        assert_eq!(config.serve.ws_port, 35729);
        assert!(!config.watch.html);
    }

    #[test]
    fn test_parse_partial() {
        let config = PipelineConfig::parse("[serve]\nport = 8080\n").unwrap();
        assert_eq!(config.serve.port, 8080);
        // untouched sections keep defaults
        assert_eq!(config.paths.output, PathBuf::from("build"));
    }

    #[test]
    fn test_validate_rejects_same_dirs() {
        let mut config = PipelineConfig::default();
        config.paths.output = config.paths.source.clone();
        assert!(config.validate().is_err());
    }
}
