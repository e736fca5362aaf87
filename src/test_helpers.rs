//! Shared test utilities for the mail-archive test suite.
//!
//! Provides fixture setup, small writers for ad-hoc archive trees, and lookup
//! helpers over repository results.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_fixtures();
//! let archives = repository.list_archives();
//! let archive = find_archive(&archives, "2024/12/29-test-email");
//!
//! let tmp = TempDir::new().unwrap();
//! write_metadata(tmp.path(), "2024/05/01-hello", &unsent_metadata("Hello"));
//! write_template(tmp.path(), "2024/05/01-hello", "mail.md", "# Hello");
//! ```

use std::fs;
use std::path::Path;
use tempfile::TempDir;

use crate::repository::{Archive, METADATA_FILE};

// =========================================================================
// Fixture setup
// =========================================================================

/// Segment id used by generated metadata.
pub const TEST_SEGMENT_ID: &str = "6f1c2a9e-3b4d-4c8a-9e2f-1a2b3c4d5e6f";

/// Copy `fixtures/archives/` to a temp directory and return it.
///
/// Tests get an isolated copy they can mutate without affecting other tests
/// or the source fixtures.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/archives");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

// =========================================================================
// Archive writers
// =========================================================================

/// Write `config.json` for the archive at `rel` (e.g. `2024/05/01-hello`),
/// creating directories as needed.
pub fn write_metadata(root: &Path, rel: &str, json: &str) {
    let dir = root.join(rel);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(METADATA_FILE), json).unwrap();
}

/// Write a template file into the archive at `rel`.
pub fn write_template(root: &Path, rel: &str, filename: &str, content: &str) {
    let dir = root.join(rel);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(filename), content).unwrap();
}

/// Valid metadata for a campaign that has not gone out.
pub fn unsent_metadata(subject: &str) -> String {
    serde_json::json!({
        "subject": subject,
        "segmentId": TEST_SEGMENT_ID,
        "sentAt": null,
    })
    .to_string()
}

/// Valid metadata for a campaign sent at `sent_at`.
pub fn sent_metadata(subject: &str, sent_at: &str) -> String {
    serde_json::json!({
        "subject": subject,
        "segmentId": TEST_SEGMENT_ID,
        "sentAt": sent_at,
    })
    .to_string()
}

// =========================================================================
// Lookups
// =========================================================================

/// Find an archive by relative path. Panics if not found.
pub fn find_archive<'a>(archives: &'a [Archive], path: &str) -> &'a Archive {
    archives.iter().find(|a| a.path == path).unwrap_or_else(|| {
        let paths = archive_paths(archives);
        panic!("archive '{path}' not found. Available: {paths:?}")
    })
}

/// All archive paths in listing order.
pub fn archive_paths(archives: &[Archive]) -> Vec<String> {
    archives.iter().map(|a| a.path.clone()).collect()
}
