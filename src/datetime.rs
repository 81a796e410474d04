//! Calendar value with precision tracking
//!
//! A `DateTime` records which of its fields were actually present in the
//! source (the precision bitmask) and which dialect produced it (the format
//! hint), so re-serialisation can reproduce the original surface. Instant
//! conversions go through `chrono`; the runtime value itself stays a plain
//! struct.

use std::rc::Rc;

use chrono::{Datelike, Local, Offset, Timelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Precision flags: which fields the value was populated with.
pub mod precision {
    pub const DATE: u8 = 0x01;
    pub const TIME: u8 = 0x02;
    pub const SECONDS: u8 = 0x04;
    pub const MILLIS: u8 = 0x08;
    pub const TIMEZONE: u8 = 0x10;
}

/// The parser dialect a value originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DateTimeFormat {
    Iso8601,
    IsoDate,
    IsoTime,
    Ics,
    Rfc2822,
    Human,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateTime {
    pub year: i32,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub millisecond: u16,
    /// UTC offset in minutes, -720 to +840.
    pub tz_offset_minutes: i16,
    pub is_utc: bool,
    pub precision: u8,
    pub format_hint: DateTimeFormat,
}

impl Default for DateTime {
    fn default() -> Self {
        DateTime {
            year: 1970,
            month: 1,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0,
            millisecond: 0,
            tz_offset_minutes: 0,
            is_utc: false,
            precision: 0,
            format_hint: DateTimeFormat::Iso8601,
        }
    }
}

static RFC2822_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:[A-Za-z]{3},\s*)?(\d{1,2})\s+([A-Za-z]{3})\s+(\d{4})\s+(\d{2}):(\d{2})(?::(\d{2}))?\s*([+-]\d{4}|UT|GMT|[A-Z]{3})?$",
    )
    .expect("rfc2822 pattern")
});

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

const DAY_NAMES: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

fn days_in_month(year: i32, month: u8) -> u8 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if (year % 4 == 0 && year % 100 != 0) || year % 400 == 0 {
                29
            } else {
                28
            }
        }
        _ => 0,
    }
}

impl DateTime {
    /// Current local time, full precision.
    pub fn now() -> DateTime {
        let now = Local::now();
        let offset_minutes = (now.offset().fix().local_minus_utc() / 60) as i16;
        DateTime {
            year: now.year(),
            month: now.month() as u8,
            day: now.day() as u8,
            hour: now.hour() as u8,
            minute: now.minute() as u8,
            second: now.second() as u8,
            millisecond: (now.timestamp_subsec_millis() % 1000) as u16,
            tz_offset_minutes: offset_minutes,
            is_utc: offset_minutes == 0,
            precision: precision::DATE
                | precision::TIME
                | precision::SECONDS
                | precision::MILLIS
                | precision::TIMEZONE,
            format_hint: DateTimeFormat::Iso8601,
        }
    }

    /// UTC value for a unix timestamp (seconds).
    pub fn from_unix(timestamp: i64) -> Option<DateTime> {
        let utc = chrono::DateTime::<Utc>::from_timestamp(timestamp, 0)?;
        Some(DateTime {
            year: utc.year(),
            month: utc.month() as u8,
            day: utc.day() as u8,
            hour: utc.hour() as u8,
            minute: utc.minute() as u8,
            second: utc.second() as u8,
            millisecond: 0,
            tz_offset_minutes: 0,
            is_utc: true,
            precision: precision::DATE
                | precision::TIME
                | precision::SECONDS
                | precision::TIMEZONE,
            format_hint: DateTimeFormat::Iso8601,
        })
    }

    /// Unix timestamp of the UTC instant. Values without a timezone are
    /// treated as UTC.
    pub fn to_unix(&self) -> i64 {
        let date = chrono::NaiveDate::from_ymd_opt(self.year, self.month as u32, self.day as u32)
            .unwrap_or_else(|| chrono::NaiveDate::from_ymd_opt(1970, 1, 1).unwrap());
        let time = date
            .and_hms_opt(self.hour as u32, self.minute as u32, self.second as u32)
            .unwrap_or_else(|| date.and_hms_opt(0, 0, 0).unwrap());
        let as_utc = time.and_utc().timestamp();
        if self.precision & precision::TIMEZONE != 0 && !self.is_utc {
            as_utc - self.tz_offset_minutes as i64 * 60
        } else {
            as_utc
        }
    }

    pub fn is_valid(&self) -> bool {
        (1..=9999).contains(&self.year)
            && (1..=12).contains(&self.month)
            && self.day >= 1
            && self.day <= days_in_month(self.year, self.month)
            && self.hour <= 23
            && self.minute <= 59
            && self.second <= 59
            && self.millisecond <= 999
            && (-720..=840).contains(&self.tz_offset_minutes)
    }

    /// Compare by UTC instant; millisecond is the tiebreak.
    pub fn compare(&self, other: &DateTime) -> std::cmp::Ordering {
        self.to_unix()
            .cmp(&other.to_unix())
            .then(self.millisecond.cmp(&other.millisecond))
    }

    /// Instant arithmetic: the result is rebuilt from the unix timestamp
    /// and therefore lands in UTC.
    pub fn add_seconds(&self, seconds: i64) -> Option<DateTime> {
        let mut out = DateTime::from_unix(self.to_unix() + seconds)?;
        out.millisecond = self.millisecond;
        out.precision = self.precision | precision::TIMEZONE;
        out.format_hint = self.format_hint;
        Some(out)
    }

    pub fn to_utc(&self) -> DateTime {
        if self.is_utc || self.precision & precision::TIMEZONE == 0 {
            let mut out = self.clone();
            out.is_utc = true;
            out.tz_offset_minutes = 0;
            return out;
        }
        let mut out = DateTime::from_unix(self.to_unix()).unwrap_or_else(|| self.clone());
        out.millisecond = self.millisecond;
        out.precision = self.precision;
        out.format_hint = self.format_hint;
        out
    }

    pub fn to_local(&self) -> DateTime {
        let offset_minutes = (Local::now().offset().fix().local_minus_utc() / 60) as i64;
        let shifted = self.to_unix() + offset_minutes * 60;
        let mut out = DateTime::from_unix(shifted).unwrap_or_else(|| self.clone());
        out.tz_offset_minutes = offset_minutes as i16;
        out.is_utc = offset_minutes == 0;
        out.millisecond = self.millisecond;
        out.precision = self.precision | precision::TIMEZONE;
        out.format_hint = self.format_hint;
        out
    }

    /// Parse ISO-8601: date, time, or combined, with optional fractional
    /// seconds and `Z`/`±HH:MM` offsets.
    pub fn parse_iso8601(text: &str) -> Option<DateTime> {
        let text = text.trim();
        let mut dt = DateTime::default();

        let (date_part, time_part) = match text.split_once(['T', ' ']) {
            Some((d, t)) => (Some(d), Some(t)),
            None => {
                if text.contains('-') && !text.starts_with('-') {
                    (Some(text), None)
                } else if text.contains(':') {
                    (None, Some(text))
                } else {
                    return None;
                }
            }
        };

        if let Some(date) = date_part {
            let mut it = date.splitn(3, '-');
            dt.year = it.next()?.parse().ok()?;
            dt.month = it.next()?.parse().ok()?;
            dt.day = it.next()?.parse().ok()?;
            dt.precision |= precision::DATE;
        }

        if let Some(mut time) = time_part {
            // split off the zone designator first
            if let Some(stripped) = time.strip_suffix('Z') {
                dt.is_utc = true;
                dt.tz_offset_minutes = 0;
                dt.precision |= precision::TIMEZONE;
                time = stripped;
            } else if let Some(pos) = time.rfind(['+', '-']) {
                if pos >= 5 {
                    let zone = &time[pos..];
                    dt.tz_offset_minutes = parse_zone_offset(zone)?;
                    dt.precision |= precision::TIMEZONE;
                    time = &time[..pos];
                }
            }
            let (hms, millis) = match time.split_once('.') {
                Some((hms, frac)) => {
                    let digits: String = frac.chars().take(3).collect();
                    let mut value: u16 = digits.parse().ok()?;
                    for _ in digits.len()..3 {
                        value *= 10;
                    }
                    (hms, Some(value))
                }
                None => (time, None),
            };
            let mut it = hms.splitn(3, ':');
            dt.hour = it.next()?.parse().ok()?;
            dt.minute = it.next()?.parse().ok()?;
            dt.precision |= precision::TIME;
            if let Some(sec) = it.next() {
                dt.second = sec.parse().ok()?;
                dt.precision |= precision::SECONDS;
            }
            if let Some(ms) = millis {
                dt.millisecond = ms;
                dt.precision |= precision::MILLIS;
            }
        }

        dt.format_hint = match (date_part.is_some(), time_part.is_some()) {
            (true, true) => DateTimeFormat::Iso8601,
            (true, false) => DateTimeFormat::IsoDate,
            (false, true) => DateTimeFormat::IsoTime,
            (false, false) => return None,
        };

        if dt.is_valid() {
            Some(dt)
        } else {
            None
        }
    }

    /// Parse the compact ICS form: `YYYYMMDD` or `YYYYMMDDTHHMMSS[Z]`.
    pub fn parse_ics(text: &str) -> Option<DateTime> {
        let text = text.trim();
        let bytes = text.as_bytes();
        if bytes.len() < 8 || !bytes[..8].iter().all(u8::is_ascii_digit) {
            return None;
        }
        let mut dt = DateTime {
            year: text[0..4].parse().ok()?,
            month: text[4..6].parse().ok()?,
            day: text[6..8].parse().ok()?,
            precision: precision::DATE,
            format_hint: DateTimeFormat::Ics,
            ..DateTime::default()
        };
        if bytes.len() > 8 {
            if bytes[8] != b'T' || bytes.len() < 15 {
                return None;
            }
            dt.hour = text[9..11].parse().ok()?;
            dt.minute = text[11..13].parse().ok()?;
            dt.second = text[13..15].parse().ok()?;
            dt.precision |= precision::TIME | precision::SECONDS;
            if bytes.len() == 16 && bytes[15] == b'Z' {
                dt.is_utc = true;
                dt.precision |= precision::TIMEZONE;
            } else if bytes.len() != 15 {
                return None;
            }
        }
        if dt.is_valid() {
            Some(dt)
        } else {
            None
        }
    }

    /// Parse RFC-2822 dates as found in mail headers.
    pub fn parse_rfc2822(text: &str) -> Option<DateTime> {
        let caps = RFC2822_RE.captures(text.trim())?;
        let month = MONTH_NAMES
            .iter()
            .position(|m| m.eq_ignore_ascii_case(&caps[2]))? as u8
            + 1;
        let mut dt = DateTime {
            day: caps[1].parse().ok()?,
            month,
            year: caps[3].parse().ok()?,
            hour: caps[4].parse().ok()?,
            minute: caps[5].parse().ok()?,
            precision: precision::DATE | precision::TIME,
            format_hint: DateTimeFormat::Rfc2822,
            ..DateTime::default()
        };
        if let Some(sec) = caps.get(6) {
            dt.second = sec.as_str().parse().ok()?;
            dt.precision |= precision::SECONDS;
        }
        if let Some(zone) = caps.get(7) {
            dt.tz_offset_minutes = parse_rfc_zone(zone.as_str())?;
            dt.is_utc = dt.tz_offset_minutes == 0;
            dt.precision |= precision::TIMEZONE;
        }
        if dt.is_valid() {
            Some(dt)
        } else {
            None
        }
    }

    pub fn format_iso8601(&self) -> String {
        let mut out = String::new();
        if self.precision & precision::DATE != 0 {
            out.push_str(&format!(
                "{:04}-{:02}-{:02}",
                self.year, self.month, self.day
            ));
        }
        if self.precision & precision::TIME != 0 {
            if !out.is_empty() {
                out.push('T');
            }
            out.push_str(&format!("{:02}:{:02}", self.hour, self.minute));
            if self.precision & precision::SECONDS != 0 {
                out.push_str(&format!(":{:02}", self.second));
            }
            if self.precision & precision::MILLIS != 0 {
                out.push_str(&format!(".{:03}", self.millisecond));
            }
            if self.precision & precision::TIMEZONE != 0 {
                if self.is_utc {
                    out.push('Z');
                } else {
                    let sign = if self.tz_offset_minutes < 0 { '-' } else { '+' };
                    let abs = self.tz_offset_minutes.unsigned_abs();
                    out.push_str(&format!("{}{:02}:{:02}", sign, abs / 60, abs % 60));
                }
            }
        }
        out
    }

    pub fn format_ics(&self) -> String {
        let mut out = format!("{:04}{:02}{:02}", self.year, self.month, self.day);
        if self.precision & precision::TIME != 0 {
            out.push_str(&format!(
                "T{:02}{:02}{:02}",
                self.hour, self.minute, self.second
            ));
            if self.is_utc {
                out.push('Z');
            }
        }
        out
    }

    pub fn format_rfc2822(&self) -> String {
        let weekday = chrono::NaiveDate::from_ymd_opt(self.year, self.month as u32, self.day as u32)
            .map(|d| DAY_NAMES[d.weekday().num_days_from_monday() as usize])
            .unwrap_or("Mon");
        let sign = if self.tz_offset_minutes < 0 { '-' } else { '+' };
        let abs = self.tz_offset_minutes.unsigned_abs();
        format!(
            "{}, {:02} {} {:04} {:02}:{:02}:{:02} {}{:02}{:02}",
            weekday,
            self.day,
            MONTH_NAMES[(self.month - 1) as usize],
            self.year,
            self.hour,
            self.minute,
            self.second,
            sign,
            abs / 60,
            abs % 60
        )
    }

    pub fn format_human(&self) -> String {
        if self.precision & precision::TIME == 0 {
            return format!("{:04}-{:02}-{:02}", self.year, self.month, self.day);
        }
        let (hour12, meridiem) = match self.hour {
            0 => (12, "AM"),
            1..=11 => (self.hour, "AM"),
            12 => (12, "PM"),
            h => (h - 12, "PM"),
        };
        format!(
            "{:04}-{:02}-{:02} {}:{:02} {}",
            self.year, self.month, self.day, hour12, self.minute, meridiem
        )
    }

    /// Render using the recorded format hint, reproducing the source
    /// dialect.
    pub fn format_hinted(&self) -> String {
        match self.format_hint {
            DateTimeFormat::Iso8601 | DateTimeFormat::IsoDate | DateTimeFormat::IsoTime => {
                self.format_iso8601()
            }
            DateTimeFormat::Ics => self.format_ics(),
            DateTimeFormat::Rfc2822 => self.format_rfc2822(),
            DateTimeFormat::Human => self.format_human(),
        }
    }
}

/// `±HH:MM` or `±HHMM` to minutes.
fn parse_zone_offset(zone: &str) -> Option<i16> {
    let (sign, rest) = match zone.as_bytes().first()? {
        b'+' => (1i16, &zone[1..]),
        b'-' => (-1i16, &zone[1..]),
        _ => return None,
    };
    let (h, m) = match rest.split_once(':') {
        Some((h, m)) => (h.parse::<i16>().ok()?, m.parse::<i16>().ok()?),
        None if rest.len() == 4 => (rest[..2].parse().ok()?, rest[2..].parse().ok()?),
        None if rest.len() == 2 => (rest.parse().ok()?, 0),
        _ => return None,
    };
    Some(sign * (h * 60 + m))
}

fn parse_rfc_zone(zone: &str) -> Option<i16> {
    match zone {
        "UT" | "GMT" | "UTC" => Some(0),
        "EST" => Some(-5 * 60),
        "EDT" => Some(-4 * 60),
        "CST" => Some(-6 * 60),
        "CDT" => Some(-5 * 60),
        "MST" => Some(-7 * 60),
        "MDT" => Some(-6 * 60),
        "PST" => Some(-8 * 60),
        "PDT" => Some(-7 * 60),
        _ => parse_zone_offset(zone),
    }
}

/// Convenience for parser modules storing datetimes as items.
pub fn shared(dt: DateTime) -> Rc<DateTime> {
    Rc::new(dt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso8601_full_roundtrip() {
        let dt = DateTime::parse_iso8601("2024-01-15T10:30:00Z").unwrap();
        assert_eq!(dt.year, 2024);
        assert_eq!(dt.hour, 10);
        assert!(dt.is_utc);
        assert_eq!(dt.format_iso8601(), "2024-01-15T10:30:00Z");
    }

    #[test]
    fn iso8601_date_only_keeps_hint() {
        let dt = DateTime::parse_iso8601("2024-01-15").unwrap();
        assert_eq!(dt.format_hint, DateTimeFormat::IsoDate);
        assert_eq!(dt.precision, precision::DATE);
        assert_eq!(dt.format_hinted(), "2024-01-15");
    }

    #[test]
    fn iso8601_negative_offset() {
        let dt = DateTime::parse_iso8601("2024-06-01T08:00:00-05:30").unwrap();
        assert_eq!(dt.tz_offset_minutes, -330);
        assert_eq!(dt.format_iso8601(), "2024-06-01T08:00:00-05:30");
    }

    #[test]
    fn iso8601_millis() {
        let dt = DateTime::parse_iso8601("2024-01-15T10:30:00.250Z").unwrap();
        assert_eq!(dt.millisecond, 250);
        assert_eq!(dt.format_iso8601(), "2024-01-15T10:30:00.250Z");
    }

    #[test]
    fn ics_roundtrip() {
        let dt = DateTime::parse_ics("20240115T103000Z").unwrap();
        assert_eq!(dt.format_hint, DateTimeFormat::Ics);
        assert!(dt.is_utc);
        assert_eq!(dt.format_ics(), "20240115T103000Z");

        let date = DateTime::parse_ics("20240115").unwrap();
        assert_eq!(date.precision, precision::DATE);
        assert_eq!(date.format_ics(), "20240115");
    }

    #[test]
    fn rfc2822_parse() {
        let dt = DateTime::parse_rfc2822("Mon, 15 Jan 2024 10:30:00 +0000").unwrap();
        assert_eq!(dt.year, 2024);
        assert_eq!(dt.month, 1);
        assert_eq!(dt.tz_offset_minutes, 0);
        assert_eq!(dt.format_rfc2822(), "Mon, 15 Jan 2024 10:30:00 +0000");
    }

    #[test]
    fn unix_roundtrip_preserves_instant() {
        let dt = DateTime::parse_iso8601("2024-01-15T10:30:00Z").unwrap();
        let unix = dt.to_unix();
        let back = DateTime::from_unix(unix).unwrap();
        assert_eq!(back.to_unix(), unix);
        assert_eq!(back.hour, 10);
    }

    #[test]
    fn offset_shifts_instant() {
        let utc = DateTime::parse_iso8601("2024-01-15T10:00:00Z").unwrap();
        let plus_two = DateTime::parse_iso8601("2024-01-15T12:00:00+02:00").unwrap();
        assert_eq!(utc.to_unix(), plus_two.to_unix());
        assert_eq!(utc.compare(&plus_two), std::cmp::Ordering::Equal);
    }

    #[test]
    fn no_timezone_treated_as_utc() {
        let bare = DateTime::parse_iso8601("2024-01-15T10:00:00").unwrap();
        let utc = DateTime::parse_iso8601("2024-01-15T10:00:00Z").unwrap();
        assert_eq!(bare.compare(&utc), std::cmp::Ordering::Equal);
    }

    #[test]
    fn add_seconds_lands_in_utc() {
        let dt = DateTime::parse_iso8601("2024-01-15T23:59:30+01:00").unwrap();
        let bumped = dt.add_seconds(45).unwrap();
        assert!(bumped.is_utc);
        assert_eq!(bumped.to_unix(), dt.to_unix() + 45);
    }

    #[test]
    fn validity_is_leap_aware() {
        let mut dt = DateTime::parse_iso8601("2024-02-29").unwrap();
        assert!(dt.is_valid());
        dt.year = 2023;
        assert!(!dt.is_valid());
    }

    #[test]
    fn human_format() {
        let dt = DateTime::parse_iso8601("2024-01-15T14:05:00").unwrap();
        assert_eq!(dt.format_human(), "2024-01-15 2:05 PM");
    }
}
