use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Maximum post length accepted by clients and the server
pub const MAX_POST_LENGTH: usize = 280;

/// Maximum number of images attached to a single post
pub const MAX_POST_IMAGES: usize = 4;

/// Parse a timestamp in any of the forms the backend has been seen to emit.
///
/// Accepts RFC 3339 (`2024-05-01T12:00:00Z`, with or without offset) and
/// SQLite-style naive timestamps (`2024-05-01 12:00:00.123`), the latter read as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }

    Err(format!("unrecognized timestamp: {raw}"))
}

// Timestamps always leave as RFC 3339 strings; on the way in, strings in any
// supported layout or epoch milliseconds are normalized to `DateTime<Utc>`.
mod datetime_format {
    use chrono::{DateTime, TimeZone, Utc};
    use serde::{self, de, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTimestamp {
        Text(String),
        Millis(i64),
    }

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&date.to_rfc3339())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match RawTimestamp::deserialize(deserializer)? {
            RawTimestamp::Text(s) => super::parse_timestamp(&s).map_err(de::Error::custom),
            RawTimestamp::Millis(ms) => Utc
                .timestamp_millis_opt(ms)
                .single()
                .ok_or_else(|| de::Error::custom(format!("timestamp out of range: {ms}"))),
        }
    }
}

/// Author reference embedded by value in posts and comments
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserRef {
    pub id: i64,
    pub username: String,
}

/// Public profile returned by `GET /api/users/:id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    /// Ids of users following this user
    #[serde(default)]
    pub followers: Vec<i64>,
    /// Ids of users this user follows
    #[serde(default)]
    pub following: Vec<i64>,
}

impl UserProfile {
    pub fn as_ref(&self) -> UserRef {
        UserRef {
            id: self.id,
            username: self.username.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i64,
    pub content: String,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
    pub user: UserRef,
    #[serde(default)]
    pub likes: i64,
    #[serde(default)]
    pub liked_by: Vec<i64>,
    /// Image URLs in display order
    #[serde(default)]
    pub images: Vec<String>,
    /// Top-level comments in chronological order, each carrying its replies
    #[serde(default)]
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,
    pub content: String,
    pub user: UserRef,
    pub post_id: i64,
    /// Parent comment for replies (None for top-level comments)
    #[serde(default)]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub likes: i64,
    #[serde(default)]
    pub liked_by: Vec<i64>,
    #[serde(default)]
    pub replies: Vec<Comment>,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Convenience constructor used by tests and fixtures across the workspace
pub fn timestamp_from_secs(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
}

// Request/Response types for API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: UserRef,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    pub post_id: i64,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateCommentRequest {
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub details: Option<String>,
}
