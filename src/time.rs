//! Date/time semantics shared by the KV1 and KV6 pipelines.
//!
//! KV6 wire timestamps carry an explicit time zone designator (TZD). KV1
//! datetimes may omit it, in which case the value is wall-clock time in the
//! Europe/Amsterdam zone. The zone object is acquired once (see [`AMSTERDAM`])
//! and passed explicitly; nothing in here touches process-wide locale state.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use std::fmt;

pub use chrono_tz::Europe::Amsterdam as AMSTERDAM;

fn digit(b: u8) -> Option<u32> {
    if b.is_ascii_digit() {
        Some((b - b'0') as u32)
    } else {
        None
    }
}

fn two_digits(src: &[u8]) -> Option<u32> {
    Some(digit(src[0])? * 10 + digit(src[1])?)
}

/// A calendar date as it appears on the wire: no calendar validation beyond
/// month 1..=12 and day 1..=31.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Date {
    pub year: i16,
    pub month: u8,
    pub day: u8,
}

impl Date {
    /// Parses an ISO 8601 date as allowed in KV6 messages. Expanded year
    /// representations (`+YYYYY-MM-DD`) and negative years are accepted.
    pub fn parse(src: &str) -> Option<Date> {
        let mut src = src.as_bytes();

        let mut sign: i32 = 1;
        let mut extended = false;
        match src.first()? {
            b'+' => {
                extended = true;
                src = &src[1..];
            }
            b'-' => {
                sign = -1;
                src = &src[1..];
            }
            _ => {}
        }

        let mut year: i32 = 0;
        let mut y_chars = 0;
        while let Some(&b) = src.first() {
            match digit(b) {
                Some(d) => {
                    year = year.checked_mul(10)?.checked_add(d as i32)?;
                    src = &src[1..];
                    y_chars += 1;
                }
                None => break,
            }
        }
        if y_chars < 4 || (y_chars > 4 && !extended) {
            return None;
        }
        if src.first() != Some(&b'-') {
            return None;
        }
        src = &src[1..];

        if src.len() != 5 || src[2] != b'-' {
            return None;
        }
        let month = two_digits(&src[0..2])?;
        let day = two_digits(&src[3..5])?;
        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return None;
        }

        Some(Date {
            year: i16::try_from(sign * year).ok()?,
            month: month as u8,
            day: day as u8,
        })
    }

    /// Parses the strict `YYYY-MM-DD` format used by KV1 date fields.
    pub fn parse_yyyymmdd(src: &str) -> Option<Date> {
        let b = src.as_bytes();
        if b.len() != 10 || b[4] != b'-' || b[7] != b'-' {
            return None;
        }
        let year = digit(b[0])? * 1000 + digit(b[1])? * 100 + digit(b[2])? * 10 + digit(b[3])?;
        let month = two_digits(&b[5..7])?;
        let day = two_digits(&b[8..10])?;
        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return None;
        }
        Some(Date {
            year: year as i16,
            month: month as u8,
            day: day as u8,
        })
    }

    /// Days since the Unix epoch, for the `date32` output column.
    ///
    /// Returns `None` for dates that do not exist on the proleptic Gregorian
    /// calendar (the wire format admits e.g. February 31st).
    pub fn to_unix_days(self) -> Option<i32> {
        let date = NaiveDate::from_ymd_opt(self.year as i32, self.month as u32, self.day as u32)?;
        Some((date - NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()).num_days() as i32)
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

/// A time of day within a single calendar day (hour 0..=23), as used in KV6
/// timestamps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Time {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl Time {
    pub fn parse(src: &str) -> Option<Time> {
        let (hour, minute, second) = parse_clock(src)?;
        if hour > 23 {
            return None;
        }
        Some(Time {
            hour: hour as u8,
            minute: minute as u8,
            second: second as u8,
        })
    }

    pub fn seconds_since_midnight(self) -> u32 {
        self.hour as u32 * 3600 + self.minute as u32 * 60 + self.second as u32
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}

fn parse_clock(src: &str) -> Option<(u32, u32, u32)> {
    let b = src.as_bytes();
    if b.len() != 8 || b[2] != b':' || b[5] != b':' {
        return None;
    }
    let hour = two_digits(&b[0..2])?;
    let minute = two_digits(&b[3..5])?;
    let second = two_digits(&b[6..8])?;
    if minute > 59 || second > 59 {
        return None;
    }
    Some((hour, minute, second))
}

/// A KV1 `HH:MM:SS` value. The standard explicitly allows hours 24..=32: the
/// period 24:00-32:00 denotes 00:00-08:00 on the following day, for service
/// days that run past midnight.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceTime {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl ServiceTime {
    pub fn parse(src: &str) -> Option<ServiceTime> {
        let (hour, minute, second) = parse_clock(src)?;
        if hour > 32 {
            return None;
        }
        Some(ServiceTime {
            hour: hour as u8,
            minute: minute as u8,
            second: second as u8,
        })
    }

    pub fn seconds_since_midnight(self) -> u32 {
        self.hour as u32 * 3600 + self.minute as u32 * 60 + self.second as u32
    }
}

impl fmt::Display for ServiceTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}

/// An ISO 8601 time zone designator: `Z` or `±HH:MM`, stored as an offset in
/// minutes from UTC.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Tzd {
    pub minutes: i16,
}

impl Tzd {
    pub fn parse(src: &str) -> Option<Tzd> {
        if src == "Z" {
            return Some(Tzd { minutes: 0 });
        }
        let b = src.as_bytes();
        if b.len() != 6 || b[3] != b':' {
            return None;
        }
        let sign: i16 = match b[0] {
            b'+' => 1,
            b'-' => -1,
            _ => return None,
        };
        let hours = two_digits(&b[1..3])?;
        let minutes = two_digits(&b[4..6])?;
        if hours > 23 || minutes > 59 {
            return None;
        }
        Some(Tzd {
            minutes: sign * (hours * 60 + minutes) as i16,
        })
    }
}

impl fmt::Display for Tzd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.minutes == 0 {
            return write!(f, "Z");
        }
        let sign = if self.minutes < 0 { '-' } else { '+' };
        let abs = self.minutes.unsigned_abs();
        write!(f, "{}{:02}:{:02}", sign, abs / 60, abs % 60)
    }
}

/// A full KV6 timestamp: date, time of day and mandatory zone designator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Timestamp {
    pub date: Date,
    pub time: Time,
    pub off: Tzd,
}

impl Timestamp {
    pub fn parse(src: &str) -> Option<Timestamp> {
        let t = src.find('T')?;
        let (date, rest) = src.split_at(t);
        let rest = &rest[1..];
        if rest.len() < 9 {
            return None;
        }
        let (time, tzd) = rest.split_at(8);
        Some(Timestamp {
            date: Date::parse(date)?,
            time: Time::parse(time)?,
            off: Tzd::parse(tzd)?,
        })
    }

    /// Seconds since the Unix epoch. `None` for calendar-invalid dates.
    pub fn to_unix_seconds(self) -> Option<i64> {
        let date =
            NaiveDate::from_ymd_opt(self.date.year as i32, self.date.month as u32, self.date.day as u32)?;
        let midnight = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?);
        let at = midnight + Duration::seconds(self.time.seconds_since_midnight() as i64)
            - Duration::minutes(self.off.minutes as i64);
        Some(at.timestamp())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}T{}{}", self.date, self.time, self.off)
    }
}

/// Parses a KV1 `YYYY[-]MM[-]DDThh:mm:ss[TZD]` value (the date/time separator
/// may also be a space).
///
/// With a TZD the value is an absolute instant. Without one it is wall-clock
/// time in `tz`: the zone-resolved local start of that day plus the clock
/// duration. Times inside a DST spring-forward gap thereby land on the
/// instant the wall clock would have reached.
pub fn parse_datetime(src: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let b = src.as_bytes();
    if b.len() < 17 || b.len() > 23 {
        return None;
    }

    let year = digit(b[0])? * 1000 + digit(b[1])? * 100 + digit(b[2])? * 10 + digit(b[3])?;
    let month_off = if b[4] == b'-' { 5 } else { 4 };
    let month = two_digits(&b[month_off..month_off + 2])?;
    let day_off = if b[month_off + 2] == b'-' {
        month_off + 3
    } else {
        month_off + 2
    };
    let day = two_digits(&b[day_off..day_off + 2])?;

    let time_off = day_off + 2;
    if b[time_off] != b'T' && b[time_off] != b' ' {
        return None;
    }
    if time_off + 9 > b.len() {
        return None;
    }
    let clock = std::str::from_utf8(&b[time_off + 1..time_off + 9]).ok()?;
    let (hour, minute, second) = parse_clock(clock)?;
    let clock_secs = (hour * 3600 + minute * 60 + second) as i64;

    let date = NaiveDate::from_ymd_opt(year as i32, month, day)?;
    let tzd = &src[time_off + 9..];

    let start_of_day = if tzd.is_empty() {
        tz.from_local_datetime(&date.and_hms_opt(0, 0, 0)?)
            .earliest()?
            .with_timezone(&Utc)
    } else {
        Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?)
    };
    let offset_minutes = if tzd.is_empty() {
        0
    } else {
        Tzd::parse(tzd)?.minutes as i64
    };

    Some(start_of_day + Duration::seconds(clock_secs) - Duration::minutes(offset_minutes))
}

/// Local-calendar view of an instant in a zone: ISO day of week, days since
/// epoch of the local date, and seconds since local midnight. Feeds the
/// augmented output columns.
pub struct LocalCalendar {
    pub iso_day_of_week: i64,
    pub unix_days: i32,
    pub seconds_since_midnight: i32,
}

/// `None` when the instant is outside chrono's representable range.
pub fn local_calendar(unix_seconds: i64, tz: Tz) -> Option<LocalCalendar> {
    let local = tz.from_utc_datetime(&DateTime::from_timestamp(unix_seconds, 0)?.naive_utc());
    let date = local.date_naive();
    Some(LocalCalendar {
        iso_day_of_week: date.weekday().number_from_monday() as i64,
        unix_days: (date - NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()).num_days() as i32,
        seconds_since_midnight: local.time().num_seconds_from_midnight() as i32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_parse() {
        assert_eq!(
            Date::parse("2024-03-31"),
            Some(Date { year: 2024, month: 3, day: 31 })
        );
        assert_eq!(
            Date::parse("-0044-03-15"),
            Some(Date { year: -44, month: 3, day: 15 })
        );
        assert_eq!(
            Date::parse("+12024-01-01"),
            Some(Date { year: 12024, month: 1, day: 1 })
        );
        assert_eq!(Date::parse("2024-13-01"), None);
        assert_eq!(Date::parse("2024-00-10"), None);
        assert_eq!(Date::parse("2024-1-1"), None);
        assert_eq!(Date::parse("20240101"), None);
    }

    #[test]
    fn yyyymmdd_is_strict() {
        assert_eq!(
            Date::parse_yyyymmdd("2024-12-08"),
            Some(Date { year: 2024, month: 12, day: 8 })
        );
        assert_eq!(Date::parse_yyyymmdd("+2024-12-08"), None);
        assert_eq!(Date::parse_yyyymmdd("2024/12/08"), None);
        assert_eq!(Date::parse_yyyymmdd("2024-12-32"), None);
    }

    #[test]
    fn unix_days() {
        assert_eq!(Date { year: 1970, month: 1, day: 1 }.to_unix_days(), Some(0));
        assert_eq!(Date { year: 2024, month: 1, day: 1 }.to_unix_days(), Some(19723));
        // On the wire but not on the calendar.
        assert_eq!(Date { year: 2024, month: 2, day: 31 }.to_unix_days(), None);
    }

    #[test]
    fn service_time_allows_next_day_hours() {
        assert_eq!(
            ServiceTime::parse("29:00:00"),
            Some(ServiceTime { hour: 29, minute: 0, second: 0 })
        );
        assert_eq!(ServiceTime::parse("33:00:00"), None);
        assert_eq!(ServiceTime::parse("12:60:00"), None);
        assert_eq!(Time::parse("29:00:00"), None);
    }

    #[test]
    fn tzd_parse() {
        assert_eq!(Tzd::parse("Z"), Some(Tzd { minutes: 0 }));
        assert_eq!(Tzd::parse("+01:00"), Some(Tzd { minutes: 60 }));
        assert_eq!(Tzd::parse("-05:30"), Some(Tzd { minutes: -330 }));
        assert_eq!(Tzd::parse(""), None);
        assert_eq!(Tzd::parse("+25:00"), None);
    }

    #[test]
    fn timestamp_unix_seconds() {
        let ts = Timestamp::parse("2024-01-01T12:00:00+01:00").unwrap();
        assert_eq!(ts.to_unix_seconds(), Some(1704106800));
        let ts = Timestamp::parse("2024-01-01T11:00:00Z").unwrap();
        assert_eq!(ts.to_unix_seconds(), Some(1704106800));
    }

    #[test]
    fn timestamp_roundtrip() {
        for src in [
            "2024-01-01T12:00:00Z",
            "2024-06-15T23:59:59+02:00",
            "1999-12-31T00:00:00-05:30",
        ] {
            let ts = Timestamp::parse(src).unwrap();
            assert_eq!(Timestamp::parse(&ts.to_string()), Some(ts));
            assert_eq!(ts.to_string(), src);
        }
    }

    #[test]
    fn datetime_with_designator() {
        let at = parse_datetime("2024-01-01T12:00:00+01:00", AMSTERDAM).unwrap();
        assert_eq!(at.timestamp(), 1704106800);
        let at = parse_datetime("2024-01-01 11:00:00Z", AMSTERDAM).unwrap();
        assert_eq!(at.timestamp(), 1704106800);
        // Compact date form.
        let at = parse_datetime("20240101T11:00:00Z", AMSTERDAM).unwrap();
        assert_eq!(at.timestamp(), 1704106800);
    }

    #[test]
    fn datetime_zone_fallback_applies_dst() {
        // 2024-03-31 is the spring-forward day in Amsterdam; local midnight is
        // 23:00Z the previous day, and 02:30 on the wall clock lands at 01:30Z.
        let at = parse_datetime("2024-03-31T02:30:00", AMSTERDAM).unwrap();
        assert_eq!(at.timestamp(), 1711848600);
        // Winter time: plain CET, one hour behind.
        let at = parse_datetime("2024-01-01T12:00:00", AMSTERDAM).unwrap();
        assert_eq!(at.timestamp(), 1704106800);
    }

    #[test]
    fn datetime_rejects_garbage() {
        assert_eq!(parse_datetime("2024-03-31", AMSTERDAM), None);
        assert_eq!(parse_datetime("2024-03-31X02:30:00", AMSTERDAM), None);
        assert_eq!(parse_datetime("2024-03-31T02:30:00+0100", AMSTERDAM), None);
        assert_eq!(parse_datetime("2024-02-30T02:30:00", AMSTERDAM), None);
    }

    #[test]
    fn local_calendar_amsterdam() {
        // 2024-07-01T10:30:00Z is 12:30 CEST on a Monday.
        let cal = local_calendar(1719829800, AMSTERDAM).unwrap();
        assert_eq!(cal.iso_day_of_week, 1);
        assert_eq!(cal.seconds_since_midnight, 12 * 3600 + 30 * 60);
        assert_eq!(
            cal.unix_days,
            Date { year: 2024, month: 7, day: 1 }.to_unix_days().unwrap()
        );
    }
}
