// ABOUTME: Configuration file loading, validation, and hierarchical merging for termgrid
// ABOUTME: Supports TOML config files with XDG Base Directory specification compliance

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};

use crate::image_protocols::{GridOptions, RenderOverrides, StreamOptions};

const VALID_FORMATS: [&str; 4] = ["auto", "inline", "url", "json"];
const VALID_PROTOCOLS: [&str; 3] = ["kitty", "iterm2", "none"];

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct Config {
    #[serde(default, deserialize_with = "validate_format")]
    pub format: Option<String>,
    #[serde(default)]
    pub cell_aspect: Option<f64>,
    #[serde(default)]
    pub force_protocol: Option<String>,
    #[serde(default)]
    pub include_videos: Option<bool>,
    /// Download limit such as `20MB`
    #[serde(default)]
    pub max_image_size: Option<String>,
    #[serde(default)]
    pub grid: Option<GridSection>,
    #[serde(default)]
    pub stream: Option<StreamSection>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct GridSection {
    #[serde(default)]
    pub cols: Option<u32>,
    #[serde(default)]
    pub thumb_cols: Option<u32>,
    #[serde(default)]
    pub thumb_px: Option<u32>,
    #[serde(default)]
    pub padding_px: Option<u32>,
    #[serde(default)]
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct StreamSection {
    #[serde(default)]
    pub cols: Option<u32>,
    #[serde(default)]
    pub text: Option<bool>,
}

impl Config {
    /// Load configuration from standard XDG-compliant locations
    pub fn load() -> Result<Self> {
        let paths = Self::get_config_paths();
        Self::load_from_paths(&paths.iter().map(|p| p.as_str()).collect::<Vec<_>>())
    }

    /// Load configuration from file paths in order of precedence (highest first).
    ///
    /// Missing files are skipped; a file that exists but fails to parse is an error.
    pub fn load_from_paths(paths: &[&str]) -> Result<Self> {
        let mut config = Config::default();

        for path in paths {
            if !Path::new(path).is_file() {
                continue;
            }
            let file_config = Self::load_from_file(path)?;
            log::debug!("Loaded config from {}", path);
            config = file_config.merge(config);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a single file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Config = toml::from_str(&content).with_context(|| {
            format!(
                "Failed to parse TOML config file: {}",
                path.as_ref().display()
            )
        })?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))?;
        Ok(config)
    }

    /// Get standard config file paths in order of precedence (highest first)
    pub fn get_config_paths() -> Vec<String> {
        let mut paths = Vec::new();

        // 1. Project-specific config (highest precedence)
        if let Ok(current_dir) = std::env::current_dir() {
            paths.push(
                current_dir
                    .join("termgrid.toml")
                    .to_string_lossy()
                    .to_string(),
            );
        }

        // 2. XDG config home
        if let Some(config_home) = std::env::var_os("XDG_CONFIG_HOME") {
            let path = PathBuf::from(config_home)
                .join("termgrid")
                .join("config.toml");
            paths.push(path.to_string_lossy().to_string());
        }

        // 3. User config directory fallback
        if let Some(home_dir) = dirs::home_dir() {
            let path = home_dir
                .join(".config")
                .join("termgrid")
                .join("config.toml");
            paths.push(path.to_string_lossy().to_string());
        }

        paths
    }

    /// Merge this config with another, giving precedence to the other config
    pub fn merge(self, other: Config) -> Config {
        Config {
            format: other.format.or(self.format),
            cell_aspect: other.cell_aspect.or(self.cell_aspect),
            force_protocol: other.force_protocol.or(self.force_protocol),
            include_videos: other.include_videos.or(self.include_videos),
            max_image_size: other.max_image_size.or(self.max_image_size),
            grid: match (self.grid, other.grid) {
                (Some(base), Some(other)) => Some(base.merge(other)),
                (base, other) => other.or(base),
            },
            stream: match (self.stream, other.stream) {
                (Some(base), Some(other)) => Some(base.merge(other)),
                (base, other) => other.or(base),
            },
        }
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        if let Some(aspect) = self.cell_aspect {
            if !aspect.is_finite() || aspect <= 0.0 {
                return Err(anyhow!(
                    "Invalid cell_aspect {}. Must be a positive number",
                    aspect
                ));
            }
        }

        if let Some(ref protocol) = self.force_protocol {
            if !VALID_PROTOCOLS.contains(&protocol.to_lowercase().as_str()) {
                return Err(anyhow!(
                    "Invalid force_protocol '{}'. Must be one of: {}",
                    protocol,
                    VALID_PROTOCOLS.join(", ")
                ));
            }
        }

        Ok(())
    }

    /// Grid options with config values applied over the defaults.
    pub fn grid_options(&self) -> GridOptions {
        let defaults = GridOptions::default();
        let section = self.grid.clone().unwrap_or_default();
        GridOptions {
            grid_cols: section.cols.unwrap_or(defaults.grid_cols),
            thumb_cols: section.thumb_cols.unwrap_or(defaults.thumb_cols),
            thumb_px: section.thumb_px.unwrap_or(defaults.thumb_px),
            padding_px: section.padding_px.unwrap_or(defaults.padding_px),
            page_size: section.page_size.unwrap_or(defaults.page_size),
        }
    }

    /// Render settings chosen in the config file.
    pub fn render_overrides(&self) -> RenderOverrides {
        RenderOverrides {
            protocol: self.force_protocol.clone(),
            cell_aspect: self.cell_aspect,
        }
    }

    pub fn stream_options(&self) -> StreamOptions {
        let defaults = StreamOptions::default();
        let section = self.stream.clone().unwrap_or_default();
        StreamOptions {
            cols: section.cols.unwrap_or(defaults.cols),
            text: section.text.unwrap_or(defaults.text),
        }
    }
}

impl GridSection {
    pub fn merge(self, other: GridSection) -> GridSection {
        GridSection {
            cols: other.cols.or(self.cols),
            thumb_cols: other.thumb_cols.or(self.thumb_cols),
            thumb_px: other.thumb_px.or(self.thumb_px),
            padding_px: other.padding_px.or(self.padding_px),
            page_size: other.page_size.or(self.page_size),
        }
    }
}

impl StreamSection {
    pub fn merge(self, other: StreamSection) -> StreamSection {
        StreamSection {
            cols: other.cols.or(self.cols),
            text: other.text.or(self.text),
        }
    }
}

// Custom deserializer for format validation
fn validate_format<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value: Option<String> = Option::deserialize(deserializer)?;

    match value {
        Some(format) if VALID_FORMATS.contains(&format.as_str()) => Ok(Some(format)),
        Some(format) => Err(D::Error::custom(format!(
            "Invalid format '{}'. Must be one of: {}",
            format,
            VALID_FORMATS.join(", ")
        ))),
        None => Ok(None),
    }
}
