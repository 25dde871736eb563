//! Post metadata models and the raw-record normalizer.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ModelError, ModelResult};
use crate::utils::{format_upload_date, normalize_caption};

/// Username used when the record carries none.
pub const UNKNOWN_USERNAME: &str = "unknown";
/// Display name used when the record carries none.
pub const UNKNOWN_DISPLAY_NAME: &str = "Unknown User";
/// Post id used when the record carries none.
pub const UNKNOWN_POST_ID: &str = "unknown";

/// Avatar fields in priority order. The last one is a profile page rather
/// than an image, which the avatar fetcher resolves through a CDN.
const AVATAR_FIELDS: &[&str] = &["uploader_avatar", "channel_avatar", "avatar", "uploader_url"];

/// Normalized metadata for one post.
///
/// Built once per run from the metadata tool's JSON record and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PostMetadata {
    /// Handle without the leading `@`
    pub username: String,
    pub display_name: String,
    /// URL-stripped, trimmed, length-bounded caption
    pub caption: String,
    /// Direct image URL or profile page URL (may be empty)
    pub avatar_url: String,
    pub likes: u64,
    pub retweets: u64,
    pub comments: u64,
    pub views: u64,
    /// Post date formatted as `Mon DD, YYYY`
    pub timestamp: String,
    pub post_url: String,
    pub post_id: String,
}

impl PostMetadata {
    /// Normalize a raw metadata record.
    ///
    /// Only a record that is not a JSON object is rejected. Missing or
    /// malformed optional fields fall back to their defaults.
    pub fn normalize(raw: &Value, post_url: &str) -> ModelResult<Self> {
        let record = raw
            .as_object()
            .ok_or_else(|| ModelError::invalid_record("top-level record is not a JSON object"))?;

        let avatar_url = AVATAR_FIELDS
            .iter()
            .find_map(|key| string_field(record, key))
            .unwrap_or_default();

        Ok(Self {
            username: string_field(record, "uploader_id")
                .map(|u| u.trim_start_matches('@').to_string())
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| UNKNOWN_USERNAME.to_string()),
            display_name: string_field(record, "uploader")
                .unwrap_or_else(|| UNKNOWN_DISPLAY_NAME.to_string()),
            caption: normalize_caption(
                record
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default(),
            ),
            avatar_url,
            likes: count_field(record, "like_count"),
            retweets: count_field(record, "repost_count"),
            comments: count_field(record, "comment_count"),
            views: count_field(record, "view_count"),
            timestamp: format_upload_date(
                record
                    .get("upload_date")
                    .and_then(Value::as_str)
                    .unwrap_or_default(),
            ),
            post_url: post_url.to_string(),
            post_id: string_field(record, "id").unwrap_or_else(|| UNKNOWN_POST_ID.to_string()),
        })
    }

    /// Parse and normalize the metadata tool's stdout.
    pub fn from_json_str(json: &str, post_url: &str) -> ModelResult<Self> {
        let raw: Value = serde_json::from_str(json)?;
        Self::normalize(&raw, post_url)
    }

    /// Username with the platform `@` prefix.
    pub fn handle(&self) -> String {
        format!("@{}", self.username)
    }

    /// Post id restricted to characters safe in file names.
    pub fn file_safe_id(&self) -> String {
        sanitize_file_part(&self.post_id)
    }

    /// Deterministic artifact file name for this post.
    pub fn artifact_file_name(&self) -> String {
        format!("reel_{}.mp4", self.file_safe_id())
    }
}

/// Non-empty trimmed string field. Numeric ids are stringified.
fn string_field(record: &Map<String, Value>, key: &str) -> Option<String> {
    match record.get(key)? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Non-negative count. Null, absent, negative or non-numeric values are 0.
fn count_field(record: &Map<String, Value>, key: &str) -> u64 {
    match record.get(key) {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f > 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Keep file names to a safe character set.
fn sanitize_file_part(part: &str) -> String {
    let cleaned: String = part
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        UNKNOWN_POST_ID.to_string()
    } else {
        cleaned
    }
}
