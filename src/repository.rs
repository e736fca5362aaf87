//! Archive discovery and lookup.
//!
//! The repository is a read-only view over a content root laid out as:
//!
//! ```text
//! archives/                          # Content root
//! ├── 2024/
//! │   ├── 11/
//! │   │   └── 30-broken/             # Invalid config.json: skipped, reported by `scan`
//! │   │       └── config.json
//! │   └── 12/
//! │       ├── 28-draft-email/
//! │       │   ├── config.json        # Metadata (validated)
//! │       │   └── mail.md            # Template (see `template`)
//! │       └── 29-test-email/
//! │           ├── config.json
//! │           ├── mail.html
//! │           └── assets/            # Images, served remotely in production
//! └── 2025/
//!     └── 01/
//!         └── 10-new-year/
//!             └── ...
//! ```
//!
//! ## Consistency
//!
//! Nothing is cached. Every call walks or reads the filesystem again, so
//! results always reflect what is on disk at the time of the call. Archive
//! counts are small and lookups infrequent.
//!
//! ## Failure model
//!
//! - A directory at archive depth whose name is not `YYYY/MM/DD-slug` is not
//!   an archive and is ignored.
//! - An archive directory with a missing, unreadable, malformed or invalid
//!   `config.json` is skipped. [`ArchiveRepository::scan`] reports it with the
//!   reason; [`ArchiveRepository::list_archives`] leaves it out.
//! - [`ArchiveRepository::get_archive`] collapses every failure into `None`.
//!
//! Metadata files are loaded in parallel; results are independent per archive.

use crate::config::ListOrder;
use crate::key::ArchiveKey;
use crate::metadata::{ArchiveMetadata, MetadataSchema, ValidationError};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Metadata file name inside every archive directory.
pub const METADATA_FILE: &str = "config.json";

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("content root not found: {0}")]
    MissingRoot(PathBuf),
}

/// One archive as currently on disk.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Archive {
    pub key: ArchiveKey,
    #[serde(flatten)]
    pub metadata: ArchiveMetadata,
    /// Directory creation time (modification time where unsupported).
    pub created_at: DateTime<Utc>,
    /// Stable identity for UIs: `YYYY/MM/DD-slug`.
    pub path: String,
}

/// Why an archive directory was left out.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    MissingMetadata,
    Unreadable(String),
    MalformedJson(String),
    Invalid(ValidationError),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingMetadata => write!(f, "missing {METADATA_FILE}"),
            Self::Unreadable(e) => write!(f, "unreadable {METADATA_FILE}: {e}"),
            Self::MalformedJson(e) => write!(f, "malformed {METADATA_FILE}: {e}"),
            Self::Invalid(e) => write!(f, "invalid {METADATA_FILE}: {e}"),
        }
    }
}

/// A directory that looked like an archive but could not be loaded.
#[derive(Debug, Clone)]
pub struct SkippedArchive {
    pub key: ArchiveKey,
    pub reason: SkipReason,
}

/// Full result of walking the content root.
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Loaded archives in listing order.
    pub archives: Vec<Archive>,
    /// Skipped archive directories, oldest key first.
    pub skipped: Vec<SkippedArchive>,
}

/// Read-only access to the archives under a content root.
#[derive(Debug, Clone)]
pub struct ArchiveRepository {
    root: PathBuf,
    schema: Arc<MetadataSchema>,
    order: ListOrder,
}

impl ArchiveRepository {
    pub fn new(root: impl Into<PathBuf>, schema: Arc<MetadataSchema>) -> Self {
        Self {
            root: root.into(),
            schema,
            order: ListOrder::default(),
        }
    }

    pub fn with_order(mut self, order: ListOrder) -> Self {
        self.order = order;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All loadable archives, in the configured order. Never fails: a missing
    /// root is an empty listing and bad archives are left out.
    pub fn list_archives(&self) -> Vec<Archive> {
        match self.scan() {
            Ok(report) => report.archives,
            Err(e) => {
                warn!(error = %e, "listing archives");
                Vec::new()
            }
        }
    }

    /// Walk the content root, loading every archive and recording every skip.
    pub fn scan(&self) -> Result<ScanReport, RepositoryError> {
        if !self.root.is_dir() {
            return Err(RepositoryError::MissingRoot(self.root.clone()));
        }

        let keys = self.discover_keys();
        let loaded: Vec<(ArchiveKey, Result<Archive, SkipReason>)> = keys
            .into_par_iter()
            .map(|key| {
                let result = self.load(&key);
                (key, result)
            })
            .collect();

        let mut report = ScanReport::default();
        for (key, result) in loaded {
            match result {
                Ok(archive) => report.archives.push(archive),
                Err(reason) => {
                    warn!(archive = %key, %reason, "skipping archive");
                    report.skipped.push(SkippedArchive { key, reason });
                }
            }
        }

        report.archives.sort_by(|a, b| a.key.cmp(&b.key));
        if self.order == ListOrder::NewestFirst {
            report.archives.reverse();
        }
        report.skipped.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(report)
    }

    /// Look up one archive by its path segments.
    ///
    /// `None` covers every way the lookup can fail: a malformed key, a missing
    /// directory or metadata file, or metadata that does not validate.
    pub fn get_archive(&self, year: &str, month: &str, dayed_slug: &str) -> Option<Archive> {
        match ArchiveKey::new(year, month, dayed_slug) {
            Ok(key) => self.get(&key),
            Err(e) => {
                debug!(error = %e, "archive key rejected");
                None
            }
        }
    }

    /// Look up one archive by key.
    pub fn get(&self, key: &ArchiveKey) -> Option<Archive> {
        match self.load(key) {
            Ok(archive) => Some(archive),
            Err(reason) => {
                debug!(archive = %key, %reason, "archive not found");
                None
            }
        }
    }

    /// Directories exactly three levels down whose path forms a valid key.
    ///
    /// Symlinks are followed, matching the direct reads in [`Self::get`].
    fn discover_keys(&self) -> Vec<ArchiveKey> {
        WalkDir::new(&self.root)
            .min_depth(3)
            .max_depth(3)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !e.file_name().to_string_lossy().starts_with('.'))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "unreadable entry under content root");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_dir())
            .filter_map(|entry| {
                let rel = entry.path().strip_prefix(&self.root).ok()?;
                match ArchiveKey::from_relative_path(rel) {
                    Ok(key) => Some(key),
                    Err(e) => {
                        debug!(path = %rel.display(), error = %e, "not an archive directory");
                        None
                    }
                }
            })
            .collect()
    }

    fn load(&self, key: &ArchiveKey) -> Result<Archive, SkipReason> {
        let dir = key.dir_in(&self.root);
        let content = match fs::read_to_string(dir.join(METADATA_FILE)) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(SkipReason::MissingMetadata);
            }
            Err(e) => return Err(SkipReason::Unreadable(e.to_string())),
        };
        let raw: serde_json::Value = serde_json::from_str(&content)
            .map_err(|e| SkipReason::MalformedJson(e.to_string()))?;
        let metadata = self.schema.validate(&raw).map_err(SkipReason::Invalid)?;

        Ok(Archive {
            path: key.relative_path(),
            key: key.clone(),
            metadata,
            created_at: created_at(&dir),
        })
    }
}

/// Which send status [`filter_archives`] keeps. Status comes from `sentAt` alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Sent,
    Unsent,
}

impl StatusFilter {
    fn matches(self, metadata: &ArchiveMetadata) -> bool {
        match self {
            Self::All => true,
            Self::Sent => metadata.is_sent(),
            Self::Unsent => !metadata.is_sent(),
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "sent" => Ok(Self::Sent),
            "unsent" => Ok(Self::Unsent),
            other => Err(format!(
                "unknown status {other:?} (expected all, sent or unsent)"
            )),
        }
    }
}

/// Archives matching `status` whose subject contains `search`, ignoring case.
///
/// An empty or absent search matches every subject. Order is preserved.
pub fn filter_archives(
    archives: &[Archive],
    status: StatusFilter,
    search: Option<&str>,
) -> Vec<Archive> {
    let needle = search
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);
    archives
        .iter()
        .filter(|a| status.matches(&a.metadata))
        .filter(|a| match &needle {
            Some(needle) => a.metadata.subject.to_lowercase().contains(needle.as_str()),
            None => true,
        })
        .cloned()
        .collect()
}

fn created_at(dir: &Path) -> DateTime<Utc> {
    fs::metadata(dir)
        .and_then(|m| m.created().or_else(|_| m.modified()))
        .map(DateTime::<Utc>::from)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{RecipientGroup, SEGMENT_ID};
    use crate::test_helpers::*;
    use tempfile::TempDir;

    fn repo(root: &Path) -> ArchiveRepository {
        ArchiveRepository::new(root, Arc::new(MetadataSchema::new()))
    }

    #[test]
    fn list_finds_fixture_archives_newest_first() {
        let tmp = setup_fixtures();
        let archives = repo(tmp.path()).list_archives();

        assert_eq!(
            archive_paths(&archives),
            vec![
                "2025/01/10-new-year",
                "2025/01/10-announcement",
                "2024/12/29-test-email",
                "2024/12/28-draft-email",
                "2024/10/01-data-only",
            ]
        );

        let draft = find_archive(&archives, "2024/12/28-draft-email");
        assert!(!draft.metadata.is_sent());
        assert_eq!(draft.key.day(), 28);
    }

    #[test]
    fn oldest_first_is_exact_reverse() {
        let tmp = setup_fixtures();
        let newest = repo(tmp.path()).list_archives();
        let mut oldest = repo(tmp.path())
            .with_order(ListOrder::OldestFirst)
            .list_archives();
        oldest.reverse();
        assert_eq!(archive_paths(&newest), archive_paths(&oldest));
    }

    #[test]
    fn invalid_and_missing_metadata_excluded_from_list() {
        let tmp = setup_fixtures();
        let paths = archive_paths(&repo(tmp.path()).list_archives());
        assert!(!paths.contains(&"2024/11/30-broken".to_string()));
        assert!(!paths.contains(&"2024/11/15-no-config".to_string()));
    }

    #[test]
    fn scan_reports_skipped_with_reasons() {
        let tmp = setup_fixtures();
        let report = repo(tmp.path()).scan().unwrap();

        let skipped: Vec<String> = report.skipped.iter().map(|s| s.key.relative_path()).collect();
        assert_eq!(skipped, vec!["2024/11/15-no-config", "2024/11/30-broken"]);

        assert_eq!(report.skipped[0].reason, SkipReason::MissingMetadata);
        match &report.skipped[1].reason {
            SkipReason::Invalid(e) => assert!(e.mentions(SEGMENT_ID)),
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn malformed_json_is_skipped_not_fatal() {
        let tmp = TempDir::new().unwrap();
        write_metadata(tmp.path(), "2024/05/01-ok", &unsent_metadata("Fine"));
        write_metadata(tmp.path(), "2024/05/02-bad", "{ not json");

        let report = repo(tmp.path()).scan().unwrap();
        assert_eq!(archive_paths(&report.archives), vec!["2024/05/01-ok"]);
        assert!(matches!(report.skipped[0].reason, SkipReason::MalformedJson(_)));
    }

    #[test]
    fn non_archive_directories_ignored() {
        let tmp = TempDir::new().unwrap();
        write_metadata(tmp.path(), "2024/05/01-ok", &unsent_metadata("Fine"));
        write_metadata(tmp.path(), "2024/05/notes", &unsent_metadata("Not dated"));
        write_metadata(tmp.path(), "drafts/05/01-wip", &unsent_metadata("Wrong year"));
        write_metadata(tmp.path(), "2024/5/01-short", &unsent_metadata("Short month"));
        write_metadata(tmp.path(), "2024/05/.01-hidden", &unsent_metadata("Hidden"));
        fs::write(tmp.path().join("2024/05/02-file"), "not a directory").unwrap();

        let report = repo(tmp.path()).scan().unwrap();
        assert_eq!(archive_paths(&report.archives), vec!["2024/05/01-ok"]);
        assert!(report.skipped.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_archive_is_listed_and_found() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("root");
        write_metadata(tmp.path(), "elsewhere/01-linked", &unsent_metadata("Linked"));
        fs::create_dir_all(root.join("2024/05")).unwrap();
        std::os::unix::fs::symlink(
            tmp.path().join("elsewhere/01-linked"),
            root.join("2024/05/01-linked"),
        )
        .unwrap();

        let repo = repo(&root);
        assert_eq!(archive_paths(&repo.list_archives()), vec!["2024/05/01-linked"]);
        assert!(repo.get_archive("2024", "05", "01-linked").is_some());
    }

    #[test]
    fn same_day_archives_ordered_by_slug() {
        let tmp = TempDir::new().unwrap();
        write_metadata(tmp.path(), "2024/05/01-beta", &unsent_metadata("B"));
        write_metadata(tmp.path(), "2024/05/01-alpha", &unsent_metadata("A"));
        write_metadata(tmp.path(), "2024/05/09-later", &unsent_metadata("L"));

        let newest = repo(tmp.path()).list_archives();
        assert_eq!(
            archive_paths(&newest),
            vec!["2024/05/09-later", "2024/05/01-beta", "2024/05/01-alpha"]
        );
    }

    #[test]
    fn missing_root_lists_nothing() {
        let tmp = TempDir::new().unwrap();
        let repo = repo(&tmp.path().join("nope"));
        assert!(repo.list_archives().is_empty());
        assert!(matches!(repo.scan(), Err(RepositoryError::MissingRoot(_))));
    }

    #[test]
    fn empty_root_lists_nothing() {
        let tmp = TempDir::new().unwrap();
        assert!(repo(tmp.path()).list_archives().is_empty());
    }

    // =========================================================================
    // get_archive
    // =========================================================================

    #[test]
    fn get_archive_loads_metadata() {
        let tmp = setup_fixtures();
        let archive = repo(tmp.path())
            .get_archive("2024", "12", "29-test-email")
            .unwrap();

        assert_eq!(archive.path, "2024/12/29-test-email");
        assert_eq!(archive.metadata.subject, "Test email");
        assert_eq!(
            archive.metadata.recipient,
            RecipientGroup::Audience("aud_12345678".into())
        );
        assert!(archive.metadata.is_sent());
        assert!(archive.created_at > DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn get_archive_unsent_draft() {
        let tmp = setup_fixtures();
        let archive = repo(tmp.path())
            .get_archive("2024", "12", "28-draft-email")
            .unwrap();
        assert!(!archive.metadata.is_sent());
    }

    #[test]
    fn get_archive_missing_is_none() {
        let tmp = setup_fixtures();
        let repo = repo(tmp.path());
        assert!(repo.get_archive("2030", "01", "01-future").is_none());
        assert!(repo.get_archive("2024", "11", "15-no-config").is_none());
    }

    #[test]
    fn get_archive_invalid_metadata_is_none() {
        let tmp = setup_fixtures();
        assert!(
            repo(tmp.path())
                .get_archive("2024", "11", "30-broken")
                .is_none()
        );
    }

    #[test]
    fn get_archive_rejects_traversal() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("root");
        fs::create_dir_all(&root).unwrap();
        write_metadata(tmp.path(), "2024/05/01-outside", &unsent_metadata("Outside"));

        let repo = repo(&root);
        assert!(repo.get_archive("..", "2024", "05").is_none());
        assert!(repo.get_archive("2024", "05", "01-../../x").is_none());
    }

    #[test]
    fn reads_are_not_cached() {
        let tmp = TempDir::new().unwrap();
        write_metadata(tmp.path(), "2024/05/01-live", &unsent_metadata("Before"));
        let repo = repo(tmp.path());
        assert_eq!(
            repo.get_archive("2024", "05", "01-live").unwrap().metadata.subject,
            "Before"
        );

        write_metadata(tmp.path(), "2024/05/01-live", &sent_metadata("After", "2024-05-01T08:00:00Z"));
        let archive = repo.get_archive("2024", "05", "01-live").unwrap();
        assert_eq!(archive.metadata.subject, "After");
        assert!(archive.metadata.is_sent());
        assert_eq!(repo.list_archives().len(), 1);
    }

    #[test]
    fn archive_serializes_flat() {
        let tmp = TempDir::new().unwrap();
        write_metadata(tmp.path(), "2024/05/01-live", &unsent_metadata("Hello"));
        let archive = repo(tmp.path()).get_archive("2024", "05", "01-live").unwrap();

        let value = serde_json::to_value(&archive).unwrap();
        assert_eq!(value["subject"], "Hello");
        assert_eq!(value["sentAt"], serde_json::Value::Null);
        assert_eq!(value["path"], "2024/05/01-live");
        assert_eq!(value["key"]["dayedSlug"], "01-live");
        assert!(value["createdAt"].is_string());
    }

    // =========================================================================
    // filter_archives
    // =========================================================================

    #[test]
    fn filter_by_status_follows_sent_at() {
        let tmp = setup_fixtures();
        let archives = repo(tmp.path()).list_archives();

        let sent = filter_archives(&archives, StatusFilter::Sent, None);
        assert_eq!(
            archive_paths(&sent),
            vec![
                "2025/01/10-new-year",
                "2024/12/29-test-email",
                "2024/10/01-data-only",
            ]
        );
        assert!(sent.iter().all(|a| a.metadata.sent_at.is_some()));

        let unsent = filter_archives(&archives, StatusFilter::Unsent, None);
        assert_eq!(
            archive_paths(&unsent),
            vec!["2025/01/10-announcement", "2024/12/28-draft-email"]
        );

        assert_eq!(filter_archives(&archives, StatusFilter::All, None).len(), archives.len());
    }

    #[test]
    fn filter_by_subject_is_case_insensitive() {
        let tmp = setup_fixtures();
        let archives = repo(tmp.path()).list_archives();

        let hits = filter_archives(&archives, StatusFilter::All, Some("TEST EMAIL"));
        assert_eq!(archive_paths(&hits), vec!["2024/12/29-test-email"]);

        let hits = filter_archives(&archives, StatusFilter::Unsent, Some("update"));
        assert_eq!(archive_paths(&hits), vec!["2024/12/28-draft-email"]);

        assert!(filter_archives(&archives, StatusFilter::Sent, Some("update")).is_empty());
    }

    #[test]
    fn empty_search_matches_everything() {
        let tmp = setup_fixtures();
        let archives = repo(tmp.path()).list_archives();
        assert_eq!(
            archive_paths(&filter_archives(&archives, StatusFilter::All, Some(""))),
            archive_paths(&archives)
        );
    }

    #[test]
    fn status_filter_parses() {
        assert_eq!("all".parse::<StatusFilter>(), Ok(StatusFilter::All));
        assert_eq!("Sent".parse::<StatusFilter>(), Ok(StatusFilter::Sent));
        assert_eq!("unsent".parse::<StatusFilter>(), Ok(StatusFilter::Unsent));
        assert!("pending".parse::<StatusFilter>().is_err());
    }
}
