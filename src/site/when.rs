//! Schedule date and time handling.
//!
//! The site prints schedule cells as local wall-clock text, e.g. `"Oct 29, 2025 7:00 PM"` or a
//! bare `"Oct 29, 2025"`. Parsing is best-effort: a date+time pair is interpreted in the
//! configured schedule timezone and normalized to RFC 3339 UTC; a bare date becomes midnight
//! UTC. Cells without a recognizable date yield nothing.

use std::sync::LazyLock;

use regex::Regex;
use time::{
    Date, PrimitiveDateTime, Time, UtcOffset, format_description::well_known::Rfc3339, macros::format_description,
};

/// Timestamp format for everything the crawler persists.
pub const TIMESTAMP_FORMAT: Rfc3339 = Rfc3339;

static DATE_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z]{3}\s+\d{1,2},\s+\d{4})\s+(\d{1,2}):(\d{2})\s*(AM|PM)?").unwrap());
static DATE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([A-Za-z]{3}\s+\d{1,2},\s+\d{4})").unwrap());

/// Map a North-American timezone abbreviation to its fixed UTC offset.
///
/// Abbreviations outside this table (and `None`) fall back to UTC; the site's schedule pages
/// print wall-clock times for the league's home zone, and the operator supplies which one.
pub fn offset_for_abbreviation(abbreviation: Option<&str>) -> UtcOffset {
    let hours = match abbreviation {
        Some("EST") => -5,
        Some("EDT") => -4,
        Some("CST") => -6,
        Some("CDT") => -5,
        Some("MST") => -7,
        Some("MDT") => -6,
        Some("PST") => -8,
        Some("PDT") => -7,
        _ => 0,
    };

    UtcOffset::from_hms(hours, 0, 0).unwrap_or(UtcOffset::UTC)
}

fn parse_site_date(text: &str) -> Option<Date> {
    const FORMAT: &[time::format_description::FormatItem<'static>] =
        format_description!("[month repr:short] [day padding:none], [year]");

    Date::parse(text, &FORMAT).ok()
}

/// Find a date+time pair in a schedule cell and normalize it to RFC 3339 UTC.
///
/// The hour is 12-hour when an AM/PM marker is present, 24-hour otherwise. Returns `None` when
/// the cell has no date+time pair or the components do not form a valid timestamp.
pub fn find_schedule_timestamp(cell_text: &str, offset: UtcOffset) -> Option<String> {
    let captures = DATE_TIME_RE.captures(cell_text)?;

    let date = parse_site_date(&captures[1])?;
    let mut hour: u8 = captures[2].parse().ok()?;
    let minute: u8 = captures[3].parse().ok()?;

    match captures.get(4).map(|m| m.as_str()) {
        Some("PM") if hour != 12 => hour += 12,
        Some("AM") if hour == 12 => hour = 0,
        _ => {}
    }

    let time = Time::from_hms(hour, minute, 0).ok()?;
    let utc = PrimitiveDateTime::new(date, time)
        .assume_offset(offset)
        .to_offset(UtcOffset::UTC);

    utc.format(&TIMESTAMP_FORMAT).ok()
}

/// Find a bare date in a cell and render it as midnight UTC, RFC 3339.
pub fn find_schedule_date(cell_text: &str) -> Option<String> {
    let captures = DATE_RE.captures(cell_text)?;
    let date = parse_site_date(&captures[1])?;

    PrimitiveDateTime::new(date, Time::MIDNIGHT)
        .assume_utc()
        .format(&TIMESTAMP_FORMAT)
        .ok()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn pm_times_convert_through_the_configured_zone() {
        let offset = offset_for_abbreviation(Some("EST"));

        assert_eq!(
            find_schedule_timestamp("Oct 29, 2025 7:00 PM", offset).unwrap(),
            "2025-10-30T00:00:00Z"
        );
    }

    #[test]
    fn noon_and_midnight_edge_cases() {
        let utc = offset_for_abbreviation(None);

        assert_eq!(
            find_schedule_timestamp("Jan 5, 2025 12:00 PM", utc).unwrap(),
            "2025-01-05T12:00:00Z"
        );
        assert_eq!(
            find_schedule_timestamp("Jan 5, 2025 12:30 AM", utc).unwrap(),
            "2025-01-05T00:30:00Z"
        );
    }

    #[test]
    fn twenty_four_hour_times_pass_through() {
        let utc = offset_for_abbreviation(None);

        assert_eq!(
            find_schedule_timestamp("Mar 16, 2022 19:45", utc).unwrap(),
            "2022-03-16T19:45:00Z"
        );
    }

    #[test]
    fn bare_dates_become_midnight_utc() {
        assert_eq!(find_schedule_date("Mar 16, 2022").unwrap(), "2022-03-16T00:00:00Z");
        assert_eq!(
            find_schedule_date("padding Mar 16, 2022 · Oval").unwrap(),
            "2022-03-16T00:00:00Z"
        );
    }

    #[test]
    fn unparseable_cells_yield_nothing() {
        let utc = offset_for_abbreviation(None);

        assert_eq!(find_schedule_timestamp("practice session", utc), None);
        assert_eq!(find_schedule_date("Race 3"), None);
        // A matching shape with an impossible date is rejected, not guessed at.
        assert_eq!(find_schedule_date("Foo 99, 2022"), None);
    }

    #[test]
    fn unknown_abbreviations_assume_utc() {
        assert_eq!(offset_for_abbreviation(Some("CET")), UtcOffset::UTC);
        assert_eq!(offset_for_abbreviation(None), UtcOffset::UTC);
        assert_eq!(offset_for_abbreviation(Some("PDT")), UtcOffset::from_hms(-7, 0, 0).unwrap());
    }
}
