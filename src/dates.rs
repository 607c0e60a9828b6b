use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Utc, Weekday};

const EASTERN_STANDARD_OFFSET_HOURS: i64 = -5;
const EASTERN_DAYLIGHT_OFFSET_HOURS: i64 = -4;

/// Parses the timestamp layouts seen in comment exports: RFC 3339 with `Z`
/// or a full offset, Postgres-style `2025-03-04 01:02:03+00`, and naive
/// values which are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let mut normalized = trimmed.replacen(' ', "T", 1);
    if normalized.ends_with('Z') {
        normalized.truncate(normalized.len() - 1);
        normalized.push_str("+00:00");
    }
    if let Some(short_offset) = short_offset_suffix(&normalized) {
        normalized.push_str(short_offset);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&normalized, fmt) {
            return Some(naive.and_utc());
        }
    }
    parse_day(trimmed).and_then(|d| d.and_hms_opt(12, 0, 0)).map(|n| n.and_utc())
}

// "+00" / "-05" need ":00" appended before RFC 3339 parsing accepts them.
fn short_offset_suffix(value: &str) -> Option<&'static str> {
    let bytes = value.as_bytes();
    if bytes.len() < 3 || !value.contains('T') {
        return None;
    }
    let sign = bytes[bytes.len() - 3];
    let tail_digits = bytes[bytes.len() - 2..].iter().all(u8::is_ascii_digit);
    if (sign == b'+' || sign == b'-') && tail_digits {
        Some(":00")
    } else {
        None
    }
}

pub fn parse_day(raw: &str) -> Option<NaiveDate> {
    let head = raw.trim().get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// Local calendar date in US Eastern time, the league's posting timezone.
pub fn eastern_date(ts: DateTime<Utc>) -> NaiveDate {
    let offset = if in_eastern_daylight_time(ts) {
        EASTERN_DAYLIGHT_OFFSET_HOURS
    } else {
        EASTERN_STANDARD_OFFSET_HOURS
    };
    (ts + Duration::hours(offset)).date_naive()
}

// Daylight time runs from 02:00 EST on the second Sunday of March (07:00 UTC)
// to 02:00 EDT on the first Sunday of November (06:00 UTC).
fn in_eastern_daylight_time(ts: DateTime<Utc>) -> bool {
    let year = ts.year();
    let Some(start_day) = NaiveDate::from_weekday_of_month_opt(year, 3, Weekday::Sun, 2) else {
        return false;
    };
    let Some(end_day) = NaiveDate::from_weekday_of_month_opt(year, 11, Weekday::Sun, 1) else {
        return false;
    };
    let (Some(start), Some(end)) = (start_day.and_hms_opt(7, 0, 0), end_day.and_hms_opt(6, 0, 0))
    else {
        return false;
    };
    let naive = ts.naive_utc();
    naive >= start && naive < end
}

pub fn days_between(later: NaiveDate, earlier: NaiveDate) -> i64 {
    (later - earlier).num_days()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postgres_short_offset_parses() {
        let ts = parse_timestamp("2025-03-04 01:30:00+00").expect("valid");
        assert_eq!(ts.to_rfc3339(), "2025-03-04T01:30:00+00:00");
    }

    #[test]
    fn late_night_utc_maps_to_previous_eastern_day() {
        let winter = parse_timestamp("2025-01-15T03:00:00Z").expect("valid");
        assert_eq!(eastern_date(winter), NaiveDate::from_ymd_opt(2025, 1, 14).unwrap());
        let summer = parse_timestamp("2025-07-15T03:30:00Z").expect("valid");
        assert_eq!(eastern_date(summer), NaiveDate::from_ymd_opt(2025, 7, 14).unwrap());
        let summer_evening = parse_timestamp("2025-07-15T04:30:00Z").expect("valid");
        assert_eq!(
            eastern_date(summer_evening),
            NaiveDate::from_ymd_opt(2025, 7, 15).unwrap()
        );
    }

    #[test]
    fn garbage_is_none() {
        assert!(parse_timestamp("not a date").is_none());
        assert!(parse_timestamp("").is_none());
    }
}
