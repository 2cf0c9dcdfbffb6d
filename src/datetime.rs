//! DOS date-time values as stored in ZIP headers.
//!
//! The packed form is `(year-1980)<<25 | month<<21 | day<<16 | hour<<11 |
//! minute<<5 | second/2`, so only years 1980 through 2107 are representable
//! and seconds have a resolution of two.

use crate::error::{Result, ZipError};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Earliest year a DOS date-time can hold
pub const MIN_YEAR: u16 = 1980;

/// Latest year a DOS date-time can hold
pub const MAX_YEAR: u16 = 2107;

/// Timestamp of an archive entry, without time zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateTime {
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
}

impl Default for DateTime {
    /// 1980-01-01 00:00:00
    fn default() -> Self {
        DateTime {
            year: MIN_YEAR,
            month: 1,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0,
        }
    }
}

impl DateTime {
    /// Build a timestamp, rejecting anything a DOS date-time cannot hold
    pub fn from_date_and_time(
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
    ) -> Result<Self> {
        let valid = (MIN_YEAR..=MAX_YEAR).contains(&year)
            && (1..=12).contains(&month)
            && day >= 1
            && day <= days_in_month(year, month)
            && hour < 24
            && minute < 60
            && second < 60;
        if !valid {
            return Err(ZipError::DateTimeOutOfRange(format!(
                "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                year, month, day, hour, minute, second
            )));
        }
        Ok(DateTime {
            year,
            month,
            day,
            hour,
            minute,
            second,
        })
    }

    /// Current UTC time, clamped into the representable range
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self::from_unix_seconds(secs)
    }

    pub(crate) fn from_unix_seconds(secs: u64) -> Self {
        let days = (secs / 86_400) as i64;
        let time_of_day = secs % 86_400;
        let (year, month, day) = civil_from_days(days);

        if year < MIN_YEAR as i64 {
            return DateTime::default();
        }
        if year > MAX_YEAR as i64 {
            return DateTime {
                year: MAX_YEAR,
                month: 12,
                day: 31,
                hour: 23,
                minute: 59,
                second: 58,
            };
        }
        DateTime {
            year: year as u16,
            month,
            day,
            hour: (time_of_day / 3600) as u8,
            minute: ((time_of_day % 3600) / 60) as u8,
            second: (time_of_day % 60) as u8,
        }
    }

    /// Decode a packed DOS date-time
    pub fn from_dos(value: u32) -> Result<Self> {
        let year = ((value >> 25) & 0x7f) as u16 + MIN_YEAR;
        let month = ((value >> 21) & 0x0f) as u8;
        let day = ((value >> 16) & 0x1f) as u8;
        let hour = ((value >> 11) & 0x1f) as u8;
        let minute = ((value >> 5) & 0x3f) as u8;
        let second = ((value & 0x1f) * 2) as u8;
        Self::from_date_and_time(year, month, day, hour, minute, second)
    }

    /// Pack into the DOS representation; odd seconds round down
    pub fn to_dos(&self) -> u32 {
        ((self.year - MIN_YEAR) as u32) << 25
            | (self.month as u32) << 21
            | (self.day as u32) << 16
            | (self.hour as u32) << 11
            | (self.minute as u32) << 5
            | (self.second as u32) / 2
    }

    pub fn year(&self) -> u16 {
        self.year
    }

    pub fn month(&self) -> u8 {
        self.month
    }

    pub fn day(&self) -> u8 {
        self.day
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    pub fn second(&self) -> u8 {
        self.second
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

fn is_leap_year(year: u16) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: u16, month: u8) -> u8 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

/// Days since 1970-01-01 to (year, month, day) in the proleptic Gregorian calendar
fn civil_from_days(days: i64) -> (i64, u8, u8) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u8;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u8;
    let year = yoe + era * 400 + if month <= 2 { 1 } else { 0 };
    (year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn packs_fields_at_documented_offsets() {
        let dt = DateTime::from_date_and_time(2024, 2, 29, 13, 45, 31).unwrap();
        let expected = (44u32 << 25) | (2 << 21) | (29 << 16) | (13 << 11) | (45 << 5) | 15;
        assert_eq!(dt.to_dos(), expected);

        let back = DateTime::from_dos(expected).unwrap();
        assert_eq!(back.year(), 2024);
        assert_eq!(back.day(), 29);
        assert_eq!(back.second(), 30);
    }

    #[test]
    fn year_range_is_enforced() {
        assert!(DateTime::from_date_and_time(1980, 1, 1, 0, 0, 0).is_ok());
        assert!(DateTime::from_date_and_time(2107, 12, 31, 23, 59, 58).is_ok());

        let err = DateTime::from_date_and_time(1979, 12, 31, 23, 59, 59).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);
        assert!(DateTime::from_date_and_time(2108, 1, 1, 0, 0, 0).is_err());
    }

    #[test]
    fn rejects_impossible_calendar_days() {
        assert!(DateTime::from_date_and_time(2023, 2, 29, 0, 0, 0).is_err());
        assert!(DateTime::from_date_and_time(2000, 2, 29, 0, 0, 0).is_ok());
        assert!(DateTime::from_date_and_time(2100, 2, 29, 0, 0, 0).is_err());
        assert!(DateTime::from_date_and_time(2020, 4, 31, 0, 0, 0).is_err());
    }

    #[test]
    fn zero_dos_value_is_invalid() {
        // month and day fields of zero
        assert!(DateTime::from_dos(0).is_err());
    }

    #[test]
    fn unix_seconds_convert_to_utc_calendar() {
        // 2009-02-13 23:31:30 UTC
        let dt = DateTime::from_unix_seconds(1_234_567_890);
        assert_eq!(dt.to_string(), "2009-02-13 23:31:30");

        assert_eq!(DateTime::from_unix_seconds(0), DateTime::default());
    }
}
