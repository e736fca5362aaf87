//! Archive keys derived from the `YYYY/MM/DD-slug` directory convention.
//!
//! Every archive is identified by where it lives on disk, never by anything
//! stored inside it:
//!
//! ```text
//! archives/
//! └── 2024/                 # year: four digits
//!     └── 12/               # month: two digits, 01-12
//!         └── 28-launch/    # dayed slug: two-digit day, dash, slug
//!             ├── config.json
//!             ├── mail.md
//!             └── assets/
//! ```
//!
//! Keys arrive from two directions: the repository scan (trusted layout, but
//! possibly stray directories) and lookups such as `show 2024 12 28-launch`
//! (untrusted text). Both go through [`ArchiveKey::new`], so a key can never
//! name a path outside the content root.

use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("year must be four digits, got {0:?}")]
    Year(String),
    #[error("month must be two digits between 01 and 12, got {0:?}")]
    Month(String),
    #[error("archive directory must look like DD-slug, got {0:?}")]
    DayedSlug(String),
    #[error("path is not YYYY/MM/DD-slug: {0}")]
    Layout(PathBuf),
}

/// Composite identifier `(year, month, day+slug)` of one archive.
///
/// Components are kept exactly as spelled on disk so that paths and remote
/// asset URLs built from a key match the directory byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveKey {
    year: String,
    month: String,
    dayed_slug: String,
    #[serde(skip)]
    day: u8,
}

impl ArchiveKey {
    /// Validate and build a key from its three path segments.
    pub fn new(year: &str, month: &str, dayed_slug: &str) -> Result<Self, KeyError> {
        if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
            return Err(KeyError::Year(year.to_string()));
        }
        let month_ok = month.len() == 2
            && month.bytes().all(|b| b.is_ascii_digit())
            && matches!(month.parse::<u8>(), Ok(1..=12));
        if !month_ok {
            return Err(KeyError::Month(month.to_string()));
        }
        let day = parse_dayed_slug(dayed_slug)
            .ok_or_else(|| KeyError::DayedSlug(dayed_slug.to_string()))?;

        Ok(Self {
            year: year.to_string(),
            month: month.to_string(),
            dayed_slug: dayed_slug.to_string(),
            day,
        })
    }

    /// Build a key from a path relative to the content root, e.g. `2024/12/28-launch`.
    pub fn from_relative_path(rel: &Path) -> Result<Self, KeyError> {
        let parts: Vec<&str> = rel
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| KeyError::Layout(rel.to_path_buf()))?;
        match parts.as_slice() {
            [year, month, dayed_slug] => Self::new(year, month, dayed_slug),
            _ => Err(KeyError::Layout(rel.to_path_buf())),
        }
    }

    pub fn year(&self) -> &str {
        &self.year
    }

    pub fn month(&self) -> &str {
        &self.month
    }

    /// The full `DD-slug` directory name.
    pub fn dayed_slug(&self) -> &str {
        &self.dayed_slug
    }

    pub fn day(&self) -> u8 {
        self.day
    }

    /// The slug after the `DD-` prefix.
    pub fn slug(&self) -> &str {
        &self.dayed_slug[3..]
    }

    /// Forward-slash path used for UI identity and remote URLs: `2024/12/28-launch`.
    pub fn relative_path(&self) -> String {
        format!("{}/{}/{}", self.year, self.month, self.dayed_slug)
    }

    /// The archive's directory under `root`.
    pub fn dir_in(&self, root: &Path) -> PathBuf {
        root.join(&self.year).join(&self.month).join(&self.dayed_slug)
    }
}

impl fmt::Display for ArchiveKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.year, self.month, self.dayed_slug)
    }
}

impl Ord for ArchiveKey {
    /// Chronological: year, month, day, then slug as the same-day tie-break.
    fn cmp(&self, other: &Self) -> Ordering {
        self.year
            .cmp(&other.year)
            .then_with(|| self.month.cmp(&other.month))
            .then_with(|| self.day.cmp(&other.day))
            .then_with(|| self.slug().cmp(other.slug()))
    }
}

impl PartialOrd for ArchiveKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Parse `DD-slug`, returning the day.
///
/// The slug must be non-empty and a single safe path segment: no separators,
/// no leading dot, no control characters.
fn parse_dayed_slug(name: &str) -> Option<u8> {
    let (day, slug) = name.split_once('-')?;
    if day.len() != 2 || !day.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let day: u8 = day.parse().ok()?;
    if !(1..=31).contains(&day) {
        return None;
    }
    let slug_ok = !slug.is_empty()
        && !slug.starts_with('.')
        && !slug
            .chars()
            .any(|c| c == '/' || c == '\\' || c.is_control());
    slug_ok.then_some(day)
}
