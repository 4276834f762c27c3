// Utility helpers for parsing and formatting.
//
// Cell-level cleanup of the export lives here so the normalizer can work
// with typed values.
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use num_format::{Locale, ToFormattedString};

const DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];

/// Trim an optional cell, keeping absence as absence.
pub fn trim_opt(s: Option<&str>) -> Option<String> {
    s.map(|v| v.trim().to_string())
}

/// Parse an open-date cell. Date-only values land at midnight.
///
/// Returns `None` for missing, blank, or unrecognized values.
pub fn parse_datetime_safe(s: Option<&str>) -> Option<NaiveDateTime> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| parse_date_safe(Some(s)).map(|d| d.and_time(NaiveTime::MIN)))
}

pub fn parse_date_safe(s: Option<&str>) -> Option<NaiveDate> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Convert a spreadsheet serial date (days since 1899-12-30, fractional part
/// is the time of day) to a timestamp.
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_time(NaiveTime::MIN);
    let seconds = (serial * 86_400.0).round() as i64;
    epoch.checked_add_signed(Duration::try_seconds(seconds)?)
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    // Counts in console messages (e.g., `1,234 casos`).
    n.to_formatted_string(&Locale::en)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd_hms(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn parses_iso_and_day_first_dates() {
        assert_eq!(
            parse_datetime_safe(Some("2025-08-19 14:05:00")),
            Some(ymd_hms(2025, 8, 19, 14, 5, 0))
        );
        assert_eq!(
            parse_datetime_safe(Some(" 2025-08-19T07:30:15 ")),
            Some(ymd_hms(2025, 8, 19, 7, 30, 15))
        );
        assert_eq!(
            parse_datetime_safe(Some("19/08/2025 09:10")),
            Some(ymd_hms(2025, 8, 19, 9, 10, 0))
        );
        assert_eq!(
            parse_datetime_safe(Some("2025-08-19")),
            Some(ymd_hms(2025, 8, 19, 0, 0, 0))
        );
        assert_eq!(
            parse_datetime_safe(Some("19/08/2025")),
            Some(ymd_hms(2025, 8, 19, 0, 0, 0))
        );
    }

    #[test]
    fn rejects_blank_and_garbage_dates() {
        assert_eq!(parse_datetime_safe(None), None);
        assert_eq!(parse_datetime_safe(Some("   ")), None);
        assert_eq!(parse_datetime_safe(Some("ayer")), None);
        assert_eq!(parse_datetime_safe(Some("2025-13-40")), None);
    }

    #[test]
    fn converts_spreadsheet_serials() {
        // 45888 is 2025-08-19; .5 is noon.
        assert_eq!(excel_serial_to_datetime(45888.5), Some(ymd_hms(2025, 8, 19, 12, 0, 0)));
        assert_eq!(excel_serial_to_datetime(-1.0), None);
        assert_eq!(excel_serial_to_datetime(f64::NAN), None);
    }

    #[test]
    fn trim_keeps_absence() {
        assert_eq!(trim_opt(None), None);
        assert_eq!(trim_opt(Some("  MIMG01 ")), Some("MIMG01".to_string()));
        assert_eq!(trim_opt(Some("   ")), Some(String::new()));
    }

    #[test]
    fn formats_counts_with_separators() {
        assert_eq!(format_int(1234567usize), "1,234,567");
    }
}
