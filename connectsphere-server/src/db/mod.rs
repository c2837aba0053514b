pub mod connection;
pub mod repositories;
pub mod schema;

pub use connection::{Database, DbConnection, DbPool};

use chrono::{SecondsFormat, Utc};

/// Current time in the fixed-width RFC 3339 layout stored in every `*_at` column
///
/// Fixed millisecond precision keeps lexical order equal to time order.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
