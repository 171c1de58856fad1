use once_cell::sync::Lazy;
use regex::Regex;
use time::format_description::well_known::Rfc3339;
use time::format_description::{self, FormatItem};
use time::macros::format_description as fd;
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

pub const SECONDS_PER_DAY: f64 = 86_400.0;

static CALENDAR_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<year>[+-]?\d{1,6})(?:-(?P<month>\d{1,2})(?:-(?P<day>\d{1,2}))?)?$")
        .expect("valid calendar date pattern")
});

static LOCAL_DATETIME: Lazy<Vec<Vec<FormatItem<'static>>>> = Lazy::new(|| {
    [
        "[year]-[month]-[day]T[hour]:[minute]:[second]",
        "[year]-[month]-[day]T[hour]:[minute]",
        "[year]-[month]-[day] [hour]:[minute]:[second]",
    ]
    .into_iter()
    .map(|pattern| format_description::parse(pattern).expect("valid datetime format description"))
    .collect()
});

/// Parses the date forms timeline records use: `YYYY`, `YYYY-MM`,
/// `YYYY-MM-DD`, zone-less `YYYY-MM-DDTHH:MM[:SS]` and RFC 3339.
/// Everything without an explicit offset is taken as UTC.
pub fn parse_instant(input: &str) -> Option<OffsetDateTime> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(caps) = CALENDAR_DATE.captures(trimmed) {
        let year: i32 = caps.name("year")?.as_str().parse().ok()?;
        let month: u8 = match caps.name("month") {
            Some(m) => m.as_str().parse().ok()?,
            None => 1,
        };
        let day: u8 = match caps.name("day") {
            Some(d) => d.as_str().parse().ok()?,
            None => 1,
        };
        let month = Month::try_from(month).ok()?;
        let date = Date::from_calendar_date(year, month, day).ok()?;
        return Some(date.with_time(Time::MIDNIGHT).assume_utc());
    }
    if let Ok(parsed) = OffsetDateTime::parse(trimmed, &Rfc3339) {
        return Some(parsed.to_offset(UtcOffset::UTC));
    }
    LOCAL_DATETIME
        .iter()
        .find_map(|format| PrimitiveDateTime::parse(trimmed, format.as_slice()).ok())
        .map(PrimitiveDateTime::assume_utc)
}

/// `2020-03-01`, with the sign kept for years before the common era.
pub fn format_day(at: OffsetDateTime) -> String {
    at.date()
        .format(fd!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| at.unix_timestamp().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn parses_partial_calendar_dates() {
        assert_eq!(parse_instant("1905"), Some(datetime!(1905-01-01 0:00 UTC)));
        assert_eq!(parse_instant("1905-06"), Some(datetime!(1905-06-01 0:00 UTC)));
        assert_eq!(parse_instant(" 1905-06-30 "), Some(datetime!(1905-06-30 0:00 UTC)));
    }

    #[test]
    fn parses_years_before_common_era() {
        let parsed = parse_instant("-0300").expect("negative year");
        assert_eq!(parsed.year(), -300);
        assert_eq!(parsed.month(), Month::January);
    }

    #[test]
    fn normalizes_offsets_to_utc() {
        let parsed = parse_instant("2020-01-01T02:00:00+02:00").expect("rfc3339");
        assert_eq!(parsed, datetime!(2020-01-01 0:00 UTC));
        assert_eq!(
            parse_instant("2020-01-01T08:30"),
            Some(datetime!(2020-01-01 8:30 UTC))
        );
    }

    #[test]
    fn rejects_garbage_and_impossible_dates() {
        assert_eq!(parse_instant(""), None);
        assert_eq!(parse_instant("yesterday"), None);
        assert_eq!(parse_instant("2020-13-01"), None);
        assert_eq!(parse_instant("2021-02-30"), None);
    }

    #[test]
    fn formats_day_precision() {
        assert_eq!(format_day(datetime!(2020-03-01 13:45 UTC)), "2020-03-01");
    }
}
