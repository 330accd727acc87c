//! Timestamp utilities

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current Unix time in whole seconds
pub fn unix_timestamp() -> u64 {
    Utc::now().timestamp().max(0) as u64
}
