use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Display format used for appointment times throughout the pipeline.
pub const DISPLAY_FORMAT: &str = "%m/%d/%Y %I:%M %p";

/// Literal shown when an appointment has no usable start time.
pub const UNKNOWN_TIME: &str = "Unknown Time";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%y %I:%M %p",
    "%m/%d/%y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y"];

/// Parse a timestamp cell leniently. Anything unrecognised is `None`, never an error.
pub fn parse(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// `MM/DD/YYYY hh:MM AM/PM`, or [`UNKNOWN_TIME`] when absent.
pub fn display(value: Option<NaiveDateTime>) -> String {
    match value {
        Some(dt) => dt.format(DISPLAY_FORMAT).to_string(),
        None => UNKNOWN_TIME.to_string(),
    }
}

/// Serde adapter: deserialize an optional cell into `Option<NaiveDateTime>`,
/// coercing unparseable text to `None`.
pub fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = serde::Deserialize::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn parses_iso_and_us_shapes() {
        let expected = at(2031, 3, 4, 14, 30);
        assert_eq!(parse("2031-03-04 14:30:00"), Some(expected));
        assert_eq!(parse("2031-03-04T14:30"), Some(expected));
        assert_eq!(parse("03/04/2031 2:30 PM"), Some(expected));
        assert_eq!(parse("3/4/2031 14:30"), Some(expected));
        assert_eq!(parse(" 03/04/2031 02:30:00 PM "), Some(expected));
    }

    #[test]
    fn bare_dates_are_midnight() {
        assert_eq!(parse("2031-03-04"), Some(at(2031, 3, 4, 0, 0)));
        assert_eq!(parse("03/04/2031"), Some(at(2031, 3, 4, 0, 0)));
    }

    #[test]
    fn garbage_is_absent() {
        assert_eq!(parse(""), None);
        assert_eq!(parse("TBD"), None);
        assert_eq!(parse("13/45/2031 99:99"), None);
    }

    #[test]
    fn display_formats_twelve_hour_clock() {
        assert_eq!(display(Some(at(2031, 3, 4, 9, 5))), "03/04/2031 09:05 AM");
        assert_eq!(display(Some(at(2031, 12, 31, 23, 0))), "12/31/2031 11:00 PM");
        assert_eq!(display(None), "Unknown Time");
    }
}
