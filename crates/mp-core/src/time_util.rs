//! Wall-clock timestamp formatting.
//!
//! The pipeline only needs two renderings of "now": an ISO-8601 watermark for
//! the `updatedAfter` filter, and the Unix `date` style used in simulated
//! quotes. Both are UTC.

use chrono::{DateTime, Utc};

/// Format used for `since` watermarks (`2022-07-01T00:00:00+00:00`).
pub const WATERMARK_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";

/// Unix `date` format (`Mon Jan  2 15:04:05 UTC 2006`).
pub const UNIX_DATE_FORMAT: &str = "%a %b %e %H:%M:%S UTC %Y";

/// Current time as an ISO-8601 watermark.
#[inline]
pub fn now_watermark() -> String {
    watermark(Utc::now())
}

/// Render `t` as an ISO-8601 watermark.
pub fn watermark(t: DateTime<Utc>) -> String {
    t.format(WATERMARK_FORMAT).to_string()
}

/// Current time in Unix `date` format.
#[inline]
pub fn now_unix_date() -> String {
    Utc::now().format(UNIX_DATE_FORMAT).to_string()
}
