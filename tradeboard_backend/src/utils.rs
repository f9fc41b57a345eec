//! Shared helpers and constants.

use chrono::Utc;
use uuid::Uuid;

pub const APP_NAME: &str = "tradeboard_backend";

/// Current time as epoch milliseconds, the unit every table stores for
/// created_at/updated_at/deleted_at.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Row id for callers that do not supply their own.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}
