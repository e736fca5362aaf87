//! Archive metadata: the `config.json` schema and its validator.
//!
//! Each archive directory carries a small JSON file describing the campaign:
//!
//! ```json
//! {
//!   "subject": "December launch",
//!   "segmentId": "78261eea-8f8b-4381-83c6-79fa7120f1cf",
//!   "sentAt": "2024-12-28T09:00:00+09:00"
//! }
//! ```
//!
//! ## Fields
//!
//! - **subject**: required, non-empty string.
//! - **segmentId**: optional, a hyphenated UUID v4. The preferred recipient form.
//! - **audienceId**: optional, `aud_` followed by ASCII letters/digits. Legacy form,
//!   still accepted so older archives keep loading.
//! - **sentAt**: required key, either `null` (not sent yet) or a timestamp string.
//!
//! At least one recipient identifier must be present. When neither is, the
//! diagnostic is attributed to `segmentId` so authors are pointed at the
//! modern form. When both are present the segment wins.
//!
//! ## Untyped until validated
//!
//! Metadata is read as a [`serde_json::Value`] and only becomes an
//! [`ArchiveMetadata`] by passing [`MetadataSchema::validate`]. Unknown keys are
//! ignored. Every problem is collected, so a broken file reports all of its
//! issues at once instead of one per edit.
//!
//! `sentAt` is only checked to be a string here. Whether it parses as a date
//! is a display concern; see [`ArchiveMetadata::sent_at_parsed`].

use chrono::{DateTime, FixedOffset};
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;
use uuid::{Uuid, Variant};

pub const SUBJECT: &str = "subject";
pub const SEGMENT_ID: &str = "segmentId";
pub const AUDIENCE_ID: &str = "audienceId";
pub const SENT_AT: &str = "sentAt";

/// One field-attributed validation problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    /// JSON key the issue belongs to; empty for the document itself.
    pub field: String,
    pub message: String,
}

impl FieldIssue {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}

/// Metadata failed validation. Never empty.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub issues: Vec<FieldIssue>,
}

impl ValidationError {
    /// Whether any issue is attributed to `field`.
    pub fn mentions(&self, field: &str) -> bool {
        self.issues.iter().any(|i| i.field == field)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self.issues.iter().map(ToString::to_string).collect();
        write!(f, "{}", joined.join("; "))
    }
}

/// The provider-side recipient group a campaign targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientGroup {
    /// Modern segment identifier.
    Segment(Uuid),
    /// Legacy `aud_...` audience identifier.
    Audience(String),
}

impl RecipientGroup {
    /// The identifier as the provider expects it.
    pub fn id(&self) -> String {
        match self {
            Self::Segment(uuid) => uuid.hyphenated().to_string(),
            Self::Audience(id) => id.clone(),
        }
    }

    /// The `config.json` key this identifier is stored under.
    pub fn field(&self) -> &'static str {
        match self {
            Self::Segment(_) => SEGMENT_ID,
            Self::Audience(_) => AUDIENCE_ID,
        }
    }
}

/// Whether a campaign has gone out. Derived from `sentAt` alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus<'a> {
    Unsent,
    Sent { at: &'a str },
}

impl SendStatus<'_> {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unsent => "unsent",
            Self::Sent { .. } => "sent",
        }
    }
}

/// Validated metadata for one archive.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(into = "MetadataRecord")]
pub struct ArchiveMetadata {
    pub subject: String,
    pub recipient: RecipientGroup,
    pub sent_at: Option<String>,
}

impl ArchiveMetadata {
    pub fn status(&self) -> SendStatus<'_> {
        match &self.sent_at {
            Some(at) => SendStatus::Sent { at: at.as_str() },
            None => SendStatus::Unsent,
        }
    }

    pub fn is_sent(&self) -> bool {
        self.sent_at.is_some()
    }

    /// `sentAt` as a timestamp, if it is set and parses as RFC 3339.
    pub fn sent_at_parsed(&self) -> Option<DateTime<FixedOffset>> {
        self.sent_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
    }
}

/// Wire shape of normalized metadata: the canonical recipient key only.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MetadataRecord {
    subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    segment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    audience_id: Option<String>,
    sent_at: Option<String>,
}

impl From<ArchiveMetadata> for MetadataRecord {
    fn from(meta: ArchiveMetadata) -> Self {
        let (segment_id, audience_id) = match &meta.recipient {
            RecipientGroup::Segment(_) => (Some(meta.recipient.id()), None),
            RecipientGroup::Audience(id) => (None, Some(id.clone())),
        };
        Self {
            subject: meta.subject,
            segment_id,
            audience_id,
            sent_at: meta.sent_at,
        }
    }
}

/// The one definition of valid archive metadata.
///
/// Stateless once built; construct it at startup and share it by reference.
#[derive(Debug, Clone)]
pub struct MetadataSchema {
    audience_pattern: Regex,
}

impl Default for MetadataSchema {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataSchema {
    pub fn new() -> Self {
        Self {
            audience_pattern: Regex::new(r"^aud_[A-Za-z0-9]+$")
                .expect("audience id pattern is a valid regex"),
        }
    }

    /// Validate untrusted JSON into [`ArchiveMetadata`].
    pub fn validate(&self, raw: &Value) -> Result<ArchiveMetadata, ValidationError> {
        let Some(obj) = raw.as_object() else {
            return Err(ValidationError {
                issues: vec![FieldIssue::new("", "expected a JSON object")],
            });
        };

        let mut issues = Vec::new();

        let subject = check_subject(obj, &mut issues);
        let segment = self.check_segment(obj, &mut issues);
        let audience = self.check_audience(obj, &mut issues);
        let sent_at = check_sent_at(obj, &mut issues);

        if !obj.contains_key(SEGMENT_ID) && !obj.contains_key(AUDIENCE_ID) {
            issues.push(FieldIssue::new(
                SEGMENT_ID,
                "segmentId or audienceId is required",
            ));
        }

        let recipient = segment
            .map(RecipientGroup::Segment)
            .or(audience.map(RecipientGroup::Audience));

        match (subject, recipient, sent_at) {
            (Some(subject), Some(recipient), Some(sent_at)) if issues.is_empty() => {
                Ok(ArchiveMetadata {
                    subject,
                    recipient,
                    sent_at,
                })
            }
            _ => Err(ValidationError { issues }),
        }
    }

    fn check_segment(&self, obj: &Map<String, Value>, issues: &mut Vec<FieldIssue>) -> Option<Uuid> {
        let value = obj.get(SEGMENT_ID)?;
        let Some(s) = value.as_str() else {
            issues.push(FieldIssue::new(SEGMENT_ID, "expected a string"));
            return None;
        };
        match parse_segment_id(s) {
            Some(uuid) => Some(uuid),
            None => {
                issues.push(FieldIssue::new(
                    SEGMENT_ID,
                    format!(
                        "invalid segment id {s:?} (expected a UUID v4 like 78261eea-8f8b-4381-83c6-79fa7120f1cf)"
                    ),
                ));
                None
            }
        }
    }

    fn check_audience(&self, obj: &Map<String, Value>, issues: &mut Vec<FieldIssue>) -> Option<String> {
        let value = obj.get(AUDIENCE_ID)?;
        let Some(s) = value.as_str() else {
            issues.push(FieldIssue::new(AUDIENCE_ID, "expected a string"));
            return None;
        };
        if self.audience_pattern.is_match(s) {
            Some(s.to_string())
        } else {
            issues.push(FieldIssue::new(
                AUDIENCE_ID,
                format!("invalid audience id {s:?} (expected something like aud_12345678)"),
            ));
            None
        }
    }
}

fn check_subject(obj: &Map<String, Value>, issues: &mut Vec<FieldIssue>) -> Option<String> {
    match obj.get(SUBJECT) {
        None => issues.push(FieldIssue::new(SUBJECT, "is required")),
        Some(Value::String(s)) if s.is_empty() => {
            issues.push(FieldIssue::new(SUBJECT, "must not be empty"))
        }
        Some(Value::String(s)) => return Some(s.clone()),
        Some(_) => issues.push(FieldIssue::new(SUBJECT, "expected a string")),
    }
    None
}

/// `Some(None)` is a valid `null`; the outer `None` means invalid.
fn check_sent_at(obj: &Map<String, Value>, issues: &mut Vec<FieldIssue>) -> Option<Option<String>> {
    match obj.get(SENT_AT) {
        None => issues.push(FieldIssue::new(
            SENT_AT,
            "is required (use null for unsent campaigns)",
        )),
        Some(Value::Null) => return Some(None),
        Some(Value::String(s)) => return Some(Some(s.clone())),
        Some(_) => issues.push(FieldIssue::new(SENT_AT, "expected a string or null")),
    }
    None
}

/// Accept only the canonical hyphenated form of a version-4, RFC 4122 variant UUID.
fn parse_segment_id(s: &str) -> Option<Uuid> {
    if s.len() != 36 {
        return None;
    }
    let uuid = Uuid::try_parse(s).ok()?;
    let canonical = uuid.hyphenated().to_string();
    let v4 = uuid.get_version_num() == 4 && uuid.get_variant() == Variant::RFC4122;
    (canonical.eq_ignore_ascii_case(s) && v4).then_some(uuid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SEGMENT: &str = "78261eea-8f8b-4381-83c6-79fa7120f1cf";

    fn schema() -> MetadataSchema {
        MetadataSchema::new()
    }

    #[test]
    fn valid_segment_record() {
        let meta = schema()
            .validate(&json!({
                "subject": "Launch",
                "segmentId": SEGMENT,
                "sentAt": null
            }))
            .unwrap();
        assert_eq!(meta.subject, "Launch");
        assert_eq!(meta.recipient.id(), SEGMENT);
        assert_eq!(meta.recipient.field(), SEGMENT_ID);
        assert_eq!(meta.sent_at, None);
    }

    #[test]
    fn valid_legacy_audience_record() {
        let meta = schema()
            .validate(&json!({
                "subject": "Old news",
                "audienceId": "aud_12345678",
                "sentAt": "2024-12-29T10:00:00Z"
            }))
            .unwrap();
        assert_eq!(meta.recipient, RecipientGroup::Audience("aud_12345678".into()));
        assert_eq!(meta.sent_at.as_deref(), Some("2024-12-29T10:00:00Z"));
    }

    #[test]
    fn segment_is_canonical_when_both_present() {
        let meta = schema()
            .validate(&json!({
                "subject": "Both",
                "segmentId": SEGMENT,
                "audienceId": "aud_abc",
                "sentAt": null
            }))
            .unwrap();
        assert!(matches!(meta.recipient, RecipientGroup::Segment(_)));
    }

    #[test]
    fn missing_both_identifiers_is_attributed_to_segment_id() {
        let err = schema()
            .validate(&json!({ "subject": "No audience", "sentAt": null }))
            .unwrap_err();
        assert_eq!(err.issues.len(), 1);
        assert!(err.mentions(SEGMENT_ID));
        assert!(!err.mentions(AUDIENCE_ID));
    }

    #[test]
    fn missing_identifiers_fails_for_any_other_shape() {
        let inputs = [
            json!({ "subject": "a", "sentAt": null }),
            json!({ "subject": "a", "sentAt": "2024-01-01T00:00:00Z" }),
            json!({ "subject": "a", "sentAt": null, "other": 1 }),
            json!({ "subject": "", "sentAt": 5 }),
        ];
        for raw in inputs {
            let err = schema().validate(&raw).unwrap_err();
            assert!(err.mentions(SEGMENT_ID), "{raw} should report {SEGMENT_ID}");
        }
    }

    #[test]
    fn empty_subject_rejected() {
        let err = schema()
            .validate(&json!({ "subject": "", "segmentId": SEGMENT, "sentAt": null }))
            .unwrap_err();
        assert!(err.mentions(SUBJECT));
    }

    #[test]
    fn missing_and_non_string_subject_rejected() {
        let err = schema()
            .validate(&json!({ "segmentId": SEGMENT, "sentAt": null }))
            .unwrap_err();
        assert!(err.mentions(SUBJECT));

        let err = schema()
            .validate(&json!({ "subject": 42, "segmentId": SEGMENT, "sentAt": null }))
            .unwrap_err();
        assert!(err.mentions(SUBJECT));
    }

    #[test]
    fn malformed_segment_id_rejected() {
        for bad in [
            "not-a-uuid",
            "78261eea8f8b438183c679fa7120f1cf",
            "{78261eea-8f8b-4381-83c6-79fa7120f1cf}",
            // version 1
            "78261eea-8f8b-1381-83c6-79fa7120f1cf",
            // NCS variant
            "78261eea-8f8b-4381-03c6-79fa7120f1cf",
            // Microsoft variant
            "78261eea-8f8b-4381-c3c6-79fa7120f1cf",
        ] {
            let err = schema()
                .validate(&json!({ "subject": "s", "segmentId": bad, "sentAt": null }))
                .unwrap_err();
            assert!(err.mentions(SEGMENT_ID), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn uppercase_segment_id_accepted() {
        let upper = SEGMENT.to_uppercase();
        let meta = schema()
            .validate(&json!({ "subject": "s", "segmentId": upper, "sentAt": null }))
            .unwrap();
        assert_eq!(meta.recipient.id(), SEGMENT);
    }

    #[test]
    fn malformed_audience_id_rejected_even_with_valid_segment() {
        let err = schema()
            .validate(&json!({
                "subject": "s",
                "segmentId": SEGMENT,
                "audienceId": "audience-1",
                "sentAt": null
            }))
            .unwrap_err();
        assert!(err.mentions(AUDIENCE_ID));
        assert!(!err.mentions(SEGMENT_ID));
    }

    #[test]
    fn audience_pattern_is_anchored() {
        for bad in ["aud_", "xaud_123", "aud_12-34", "aud_123\n", "AUD_123"] {
            assert!(
                schema()
                    .validate(&json!({ "subject": "s", "audienceId": bad, "sentAt": null }))
                    .is_err(),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn sent_at_must_be_string_or_null() {
        let err = schema()
            .validate(&json!({ "subject": "s", "segmentId": SEGMENT, "sentAt": true }))
            .unwrap_err();
        assert!(err.mentions(SENT_AT));

        let err = schema()
            .validate(&json!({ "subject": "s", "segmentId": SEGMENT }))
            .unwrap_err();
        assert!(err.mentions(SENT_AT));
    }

    #[test]
    fn sent_at_format_is_not_enforced() {
        let meta = schema()
            .validate(&json!({ "subject": "s", "segmentId": SEGMENT, "sentAt": "last tuesday" }))
            .unwrap();
        assert!(meta.is_sent());
        assert!(meta.sent_at_parsed().is_none());
    }

    #[test]
    fn non_object_input_rejected() {
        for raw in [json!(null), json!([]), json!("subject"), json!(3)] {
            let err = schema().validate(&raw).unwrap_err();
            assert_eq!(err.issues.len(), 1);
        }
    }

    #[test]
    fn all_issues_collected() {
        let err = schema()
            .validate(&json!({ "subject": "", "audienceId": "bad", "sentAt": 1 }))
            .unwrap_err();
        assert!(err.mentions(SUBJECT));
        assert!(err.mentions(AUDIENCE_ID));
        assert!(err.mentions(SENT_AT));
        let text = err.to_string();
        assert!(text.contains("subject: must not be empty"));
    }

    // =========================================================================
    // Send status
    // =========================================================================

    #[test]
    fn status_is_a_function_of_sent_at() {
        let mut meta = schema()
            .validate(&json!({ "subject": "s", "segmentId": SEGMENT, "sentAt": null }))
            .unwrap();
        assert_eq!(meta.status(), SendStatus::Unsent);
        assert_eq!(meta.status().label(), "unsent");

        meta.sent_at = Some("2024-12-28T09:00:00+09:00".into());
        assert_eq!(
            meta.status(),
            SendStatus::Sent {
                at: "2024-12-28T09:00:00+09:00"
            }
        );
        assert_eq!(meta.status().label(), "sent");
        assert!(meta.sent_at_parsed().is_some());

        // Even an empty string counts as sent.
        meta.sent_at = Some(String::new());
        assert!(meta.is_sent());
    }

    #[test]
    fn serializes_canonical_fields_only() {
        let meta = schema()
            .validate(&json!({
                "subject": "Both",
                "segmentId": SEGMENT,
                "audienceId": "aud_abc",
                "sentAt": null,
                "draft": true
            }))
            .unwrap();
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(
            value,
            json!({ "subject": "Both", "segmentId": SEGMENT, "sentAt": null })
        );
    }
}
