//! A wall-clock timestamp type matching the `YYYY-MM-DD HH:MM:SS` format
//! used throughout the application database, plus calendar arithmetic
//! helpers for stepping dates by whole months and years.

use std::{fmt::Display, ops::Add, ops::Sub, str::FromStr};

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use time::{
    Date, Duration, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset,
    format_description::BorrowedFormatItem, macros::format_description, util::days_in_year_month,
};

use crate::Error;

/// Date time format for persisted timestamps, e.g. "2024-06-01 14:30:00".
const DATE_TIME_FORMAT: &[BorrowedFormatItem] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// The format produced by HTML `datetime-local` inputs, e.g. "2024-06-01T14:30".
const DATE_TIME_LOCAL_FORMAT: &[BorrowedFormatItem] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]");

/// As [DATE_TIME_LOCAL_FORMAT] but with seconds.
const DATE_TIME_LOCAL_SECONDS_FORMAT: &[BorrowedFormatItem] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");

/// Date-only format, e.g. "2024-06-01".
const DATE_FORMAT: &[BorrowedFormatItem] = format_description!("[year]-[month]-[day]");

/// A second-precision wall-clock timestamp without a timezone offset.
///
/// The application stores all timestamps in the server's configured local
/// timezone, formatted as `YYYY-MM-DD HH:MM:SS` so that they sort lexically
/// in SQLite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timestamp(PrimitiveDateTime);

impl Timestamp {
    /// Create a timestamp from a calendar date and a time of day.
    pub fn new(date: Date, time: Time) -> Self {
        Self(PrimitiveDateTime::new(date, time))
    }

    /// The current wall-clock time in the timezone given by `offset`.
    pub fn now(offset: UtcOffset) -> Self {
        let now = OffsetDateTime::now_utc().to_offset(offset);

        Self(PrimitiveDateTime::new(now.date(), now.time()))
    }

    /// The calendar date part of the timestamp.
    pub fn date(&self) -> Date {
        self.0.date()
    }

    /// The time-of-day part of the timestamp.
    pub fn time(&self) -> Time {
        self.0.time()
    }

    /// Parse a timestamp from the formats accepted by the API: the database
    /// format `YYYY-MM-DD HH:MM:SS`, the HTML `datetime-local` formats
    /// `YYYY-MM-DDTHH:MM[:SS]`, or a plain date (interpreted as midnight).
    ///
    /// # Errors
    /// Returns [Error::InvalidInput] if `text` matches none of the formats.
    pub fn parse(text: &str) -> Result<Self, Error> {
        if let Ok(date_time) = PrimitiveDateTime::parse(text, DATE_TIME_FORMAT) {
            return Ok(Self(date_time));
        }

        if let Ok(date_time) = PrimitiveDateTime::parse(text, DATE_TIME_LOCAL_SECONDS_FORMAT) {
            return Ok(Self(date_time));
        }

        if let Ok(date_time) = PrimitiveDateTime::parse(text, DATE_TIME_LOCAL_FORMAT) {
            return Ok(Self(date_time));
        }

        if let Ok(date) = Date::parse(text, DATE_FORMAT) {
            return Ok(Self(PrimitiveDateTime::new(date, Time::MIDNIGHT)));
        }

        Err(Error::InvalidInput(format!(
            "\"{text}\" is not a valid date-time"
        )))
    }

    /// Format the date part only, e.g. "2024-06-01".
    pub fn format_date(&self) -> String {
        self.0
            .date()
            .format(DATE_FORMAT)
            .expect("formatting a valid date cannot fail")
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Use format instead of to_string to guarantee two-digit fields at
        // midnight, which the database format requires.
        let text = self
            .0
            .format(DATE_TIME_FORMAT)
            .map_err(|_| std::fmt::Error)?;

        write!(f, "{text}")
    }
}

impl FromStr for Timestamp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Timestamp::parse(s)
    }
}

impl TryFrom<String> for Timestamp {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Timestamp::parse(&value)
    }
}

impl From<Timestamp> for String {
    fn from(value: Timestamp) -> Self {
        value.to_string()
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl Sub for Timestamp {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Self::Output {
        self.0 - rhs.0
    }
}

impl ToSql for Timestamp {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for Timestamp {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;

        Timestamp::parse(text).map_err(|error| FromSqlError::Other(Box::new(error)))
    }
}

/// Step `date` forward by `months` calendar months, clamping the day to the
/// last valid day of the target month (e.g. Jan 31 + 1 month = Feb 28).
pub fn add_months(date: Date, months: i32) -> Date {
    let zero_based = date.year() * 12 + (date.month() as i32 - 1) + months;
    let year = zero_based.div_euclid(12);
    let month = Month::try_from((zero_based.rem_euclid(12) + 1) as u8)
        .expect("month index is always in 1..=12");
    let day = date.day().min(days_in_year_month(year, month));

    Date::from_calendar_date(year, month, day).expect("clamped day is always valid")
}

/// Step `date` forward by `years` calendar years, clamping Feb 29 to Feb 28
/// on non-leap years.
pub fn add_years(date: Date, years: i32) -> Date {
    let year = date.year() + years;
    let day = date.day().min(days_in_year_month(year, date.month()));

    Date::from_calendar_date(year, date.month(), day).expect("clamped day is always valid")
}


#[cfg(test)]
mod calendar_tests {
    use time::macros::date;

    use super::{add_months, add_years};

    #[test]
    fn add_month_keeps_day() {
        assert_eq!(add_months(date!(2024 - 01 - 15), 1), date!(2024 - 02 - 15));
    }

    #[test]
    fn add_month_clamps_to_end_of_february() {
        assert_eq!(add_months(date!(2023 - 01 - 31), 1), date!(2023 - 02 - 28));
    }

    #[test]
    fn add_month_clamps_to_leap_day() {
        assert_eq!(add_months(date!(2024 - 01 - 31), 1), date!(2024 - 02 - 29));
    }

    #[test]
    fn add_month_rolls_over_year() {
        assert_eq!(add_months(date!(2024 - 12 - 31), 1), date!(2025 - 01 - 31));
    }

    #[test]
    fn add_year_keeps_day() {
        assert_eq!(add_years(date!(2024 - 06 - 01), 1), date!(2025 - 06 - 01));
    }

    #[test]
    fn add_year_clamps_leap_day() {
        assert_eq!(add_years(date!(2024 - 02 - 29), 1), date!(2025 - 02 - 28));
    }
}
