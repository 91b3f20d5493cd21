//! Resolves the configured canonical timezone to a UTC offset.

use time::{OffsetDateTime, UtcOffset};
use time_tz::{Offset, TimeZone};

/// Get the current UTC offset for a canonical timezone name such as
/// "Europe/Madrid". Returns `None` for unknown names.
pub fn local_offset(canonical_timezone: &str) -> Option<UtcOffset> {
    time_tz::timezones::get_by_name(canonical_timezone)
        .map(|tz| tz.get_offset_utc(&OffsetDateTime::now_utc()).to_utc())
}

/// As [local_offset], but falls back to UTC with a logged warning so that a
/// misconfigured timezone degrades timestamps instead of failing requests.
pub fn local_offset_or_utc(canonical_timezone: &str) -> UtcOffset {
    match local_offset(canonical_timezone) {
        Some(offset) => offset,
        None => {
            tracing::warn!("unknown timezone {canonical_timezone:?}, falling back to UTC");
            UtcOffset::UTC
        }
    }
}
