//! Settings for the archive tool: where archives live, where their assets are
//! served from, listing order and the email layout.
//!
//! Settings are layered. Stock defaults sit at the bottom, `config.toml`
//! overrides any subset of keys, and `--root`/`--asset-base-url` (or
//! `MAIL_ARCHIVE_ASSET_BASE_URL`) override both in `main.rs`.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! content_root = "public/archives"  # Root of the YYYY/MM/DD-slug tree
//! asset_base_url = ""                # Remote asset host; empty = keep local paths
//!
//! [listing]
//! order = "newest-first"             # or "oldest-first"
//!
//! [layout]
//! organization = "[Company]"         # Footer sender and copyright holder
//! background = "#f6f9fc"             # Page background around the mail body
//! content_width = 600                # Mail body width in pixels
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse — override just the values you want:
//!
//! ```toml
//! asset_base_url = "https://cdn.example.com"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `config.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArchiveConfig {
    /// Root directory holding `YYYY/MM/DD-slug` archives.
    pub content_root: String,
    /// Base URL of the remote asset host. Empty disables asset rewriting.
    pub asset_base_url: String,
    /// Archive listing settings.
    pub listing: ListingConfig,
    /// Email wrapper layout settings.
    pub layout: LayoutConfig,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            content_root: "public/archives".to_string(),
            asset_base_url: String::new(),
            listing: ListingConfig::default(),
            layout: LayoutConfig::default(),
        }
    }
}

impl ArchiveConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.content_root.trim().is_empty() {
            return Err(ConfigError::Validation(
                "content_root must not be empty".into(),
            ));
        }
        let base = self.asset_base_url.trim();
        if !base.is_empty() && !(base.starts_with("https://") || base.starts_with("http://")) {
            return Err(ConfigError::Validation(format!(
                "asset_base_url must be an http(s) URL, got {base:?}"
            )));
        }
        if !(200..=1200).contains(&self.layout.content_width) {
            return Err(ConfigError::Validation(
                "layout.content_width must be 200-1200".into(),
            ));
        }
        Ok(())
    }

    /// The remote asset base without a trailing slash, or `None` when unset.
    pub fn asset_base_url(&self) -> Option<&str> {
        let base = self.asset_base_url.trim().trim_end_matches('/');
        (!base.is_empty()).then_some(base)
    }
}

/// Order of [`crate::repository::ArchiveRepository::list_archives`].
///
/// Both directions compare keys chronologically (year, month, day) and break
/// same-day ties by slug, so the order is total and reproducible.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ListOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// Archive listing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ListingConfig {
    pub order: ListOrder,
}

/// Email wrapper layout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutConfig {
    /// Sender named in the footer and the copyright line.
    pub organization: String,
    /// Background color around the mail body.
    pub background: String,
    /// Width of the mail body table in pixels.
    pub content_width: u32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            organization: "[Company]".to_string(),
            background: "#f6f9fc".to_string(),
            content_width: 600,
        }
    }
}

// =============================================================================
// Loading
// =============================================================================
//
// Layering is done on raw TOML tables before deserializing, so a file that
// sets only `[layout] organization` keeps the stock background and width.

/// Every default setting as a TOML table: the bottom layer.
fn defaults_table() -> Result<toml::Table, ConfigError> {
    match toml::Value::try_from(ArchiveConfig::default())? {
        toml::Value::Table(table) => Ok(table),
        _ => Err(ConfigError::Validation(
            "default settings did not serialize to a table".into(),
        )),
    }
}

/// Lay `file` over `base` in place. Sections merge key by key; any other
/// value from the file wins outright.
fn overlay(base: &mut toml::Table, file: toml::Table) {
    for (key, value) in file {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(section)), toml::Value::Table(file_section)) => {
                overlay(section, file_section);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// The user's `config.toml` as a table, or `None` when there is no file.
fn read_config_file(config_path: &Path) -> Result<Option<toml::Table>, ConfigError> {
    let content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(toml::from_str(&content)?))
}

/// Deserialize the layered tables into a checked [`ArchiveConfig`].
fn settle(mut base: toml::Table, file: Option<toml::Table>) -> Result<ArchiveConfig, ConfigError> {
    if let Some(file) = file {
        overlay(&mut base, file);
    }
    let config: ArchiveConfig = toml::Value::Table(base).try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load settings for the archive tool.
///
/// A missing file means stock settings. Keys the file leaves out keep their
/// defaults, unknown keys are an error, and the result is validated.
pub fn load_config(config_path: &Path) -> Result<ArchiveConfig, ConfigError> {
    settle(defaults_table()?, read_config_file(config_path)?)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Mail Archive Configuration
# ==========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Precedence: command-line flags > environment > this file > defaults.
# Unknown keys will cause an error.

# Root of the archive tree: <content_root>/YYYY/MM/DD-slug/config.json
content_root = "public/archives"

# Base URL of the remote asset host (object storage, CDN).
# When set, <img src="/mail-assets/NAME"> in rendered previews becomes
#   <asset_base_url>/archives/YYYY/MM/DD-slug/assets/NAME
# Leave empty to keep local paths. Also settable via MAIL_ARCHIVE_ASSET_BASE_URL.
asset_base_url = ""

# ---------------------------------------------------------------------------
# Listing
# ---------------------------------------------------------------------------
[listing]
# "newest-first" or "oldest-first". Same-day archives are ordered by slug.
order = "newest-first"

# ---------------------------------------------------------------------------
# Email layout
# ---------------------------------------------------------------------------
[layout]
# Sender named in the footer and the copyright line.
organization = "[Company]"

# Background color around the mail body.
background = "#f6f9fc"

# Width of the mail body table in pixels (200-1200).
content_width = 600
"##
}
