//! CLI output formatting.
//!
//! # Information-First Display
//!
//! Output is **information-centric, not file-centric**. The primary display
//! for every archive is its positional index and subject. The archive path,
//! send status and recipient follow as indented context lines, so a listing
//! reads as a campaign inventory while still pointing at the directory on
//! disk.
//!
//! # Output Format
//!
//! ## List
//!
//! ```text
//! Archives (2)
//! 001 Happy new year from the team
//!     Path: 2025/01/10-new-year
//!     Status: sent 2025-01-10 09:00 UTC
//!     Recipient: segment 0b7e5a43-9c1d-4f2e-8a6b-3d5c7e9f1a2b
//!     Created: 2025-01-09 17:12 UTC
//! 002 Scheduled maintenance
//!     Path: 2025/01/10-announcement
//!     Status: unsent
//!     Recipient: audience aud_ops2025
//!     Created: 2025-01-09 17:12 UTC
//! ```
//!
//! ## Check
//!
//! ```text
//! Archives
//! 001 Happy new year from the team
//!     Path: 2025/01/10-new-year
//!
//! Skipped
//!     2024/11/30-broken: invalid config.json
//!         segmentId: invalid segment id "not-a-uuid" (...)
//!
//! Checked public/archives: 1 archive loaded, 1 skipped
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::metadata::{ArchiveMetadata, RecipientGroup, SendStatus};
use crate::repository::{Archive, ScanReport, SkipReason};
use chrono::{DateTime, Utc};
use std::path::Path;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Listing position, 1-based, padded so subjects line up: `007`.
fn format_index(pos: usize) -> String {
    format!("{pos:03}")
}

/// Leading space for a context line `depth` levels under its archive.
fn indent(depth: usize) -> String {
    " ".repeat(depth * 4)
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}

/// `unsent`, `sent <date>` when the timestamp parses, else `sent <raw>`.
fn status_line(metadata: &ArchiveMetadata) -> String {
    match metadata.status() {
        SendStatus::Unsent => "unsent".to_string(),
        SendStatus::Sent { at } => match metadata.sent_at_parsed() {
            Some(parsed) => format!("sent {}", format_timestamp(parsed.with_timezone(&Utc))),
            None => format!("sent {at}"),
        },
    }
}

fn recipient_line(metadata: &ArchiveMetadata) -> String {
    let kind = match metadata.recipient {
        RecipientGroup::Segment(_) => "segment",
        RecipientGroup::Audience(_) => "audience",
    };
    format!("{kind} {}", metadata.recipient.id())
}

/// Subject header: positional index + subject.
///
/// ```text
/// 001 Happy new year from the team
/// ```
fn archive_header(index: usize, archive: &Archive) -> String {
    format!(
        "{} {}",
        format_index(index),
        truncate(&archive.metadata.subject, 72)
    )
}

// ============================================================================
// List
// ============================================================================

/// Format the archive listing, one entity block per archive.
pub fn format_list_output(archives: &[Archive]) -> Vec<String> {
    if archives.is_empty() {
        return vec!["No archives found".to_string()];
    }

    let mut lines = vec![format!("Archives ({})", archives.len())];
    let ctx = indent(1);
    for (i, archive) in archives.iter().enumerate() {
        lines.push(archive_header(i + 1, archive));
        lines.push(format!("{ctx}Path: {}", archive.path));
        lines.push(format!("{ctx}Status: {}", status_line(&archive.metadata)));
        lines.push(format!("{ctx}Recipient: {}", recipient_line(&archive.metadata)));
        lines.push(format!("{ctx}Created: {}", format_timestamp(archive.created_at)));
    }
    lines
}

pub fn print_list_output(archives: &[Archive]) {
    for line in format_list_output(archives) {
        println!("{}", line);
    }
}

// ============================================================================
// Show
// ============================================================================

/// Format the detail view of a single archive.
pub fn format_archive_detail(archive: &Archive) -> Vec<String> {
    let meta = &archive.metadata;
    let mut lines = vec![
        format!("Subject: {}", meta.subject),
        format!("Path: {}", archive.path),
        format!("Created: {}", format_timestamp(archive.created_at)),
        format!("Status: {}", status_line(meta)),
    ];
    if let SendStatus::Sent { at } = meta.status() {
        lines.push(format!("Sent at: {at}"));
    }
    lines.push(format!("Recipient: {}", recipient_line(meta)));
    lines
}

pub fn print_archive_detail(archive: &Archive) {
    for line in format_archive_detail(archive) {
        println!("{}", line);
    }
}

// ============================================================================
// Check
// ============================================================================

/// Format the check report: loaded archives, then each skip with diagnostics.
pub fn format_check_output(report: &ScanReport, root: &Path) -> Vec<String> {
    let mut lines = vec!["Archives".to_string()];
    for (i, archive) in report.archives.iter().enumerate() {
        lines.push(archive_header(i + 1, archive));
        lines.push(format!("{}Path: {}", indent(1), archive.path));
    }

    if !report.skipped.is_empty() {
        lines.push(String::new());
        lines.push("Skipped".to_string());
        for skipped in &report.skipped {
            match &skipped.reason {
                SkipReason::Invalid(e) => {
                    lines.push(format!("{}{}: invalid config.json", indent(1), skipped.key));
                    for issue in &e.issues {
                        lines.push(format!("{}{}", indent(2), issue));
                    }
                }
                reason => lines.push(format!("{}{}: {}", indent(1), skipped.key, reason)),
            }
        }
    }

    lines.push(String::new());
    lines.push(format!(
        "Checked {}: {} loaded, {} skipped",
        root.display(),
        plural(report.archives.len(), "archive"),
        report.skipped.len()
    ));
    lines
}

pub fn print_check_output(report: &ScanReport, root: &Path) {
    for line in format_check_output(report, root) {
        println!("{}", line);
    }
}

fn plural(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("{n} {noun}")
    } else {
        format!("{n} {noun}s")
    }
}
