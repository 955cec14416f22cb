//! Wall-clock timestamps for reports and summaries

use time::OffsetDateTime;

/// Current UTC time as `YYYY-MM-DD HH:MM:SS UTC`
pub fn now_utc_display() -> String {
    format_utc(OffsetDateTime::now_utc())
}

/// Format a timestamp as `YYYY-MM-DD HH:MM:SS UTC`
pub fn format_utc(at: OffsetDateTime) -> String {
    let at = at.to_offset(time::UtcOffset::UTC);
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02} UTC",
        at.year(),
        at.month() as u8,
        at.day(),
        at.hour(),
        at.minute(),
        at.second()
    )
}
