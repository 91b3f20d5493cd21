//! Occurrence date computation for recurring rules.
//!
//! Occurrences are computed from the rule's start timestamp rather than by
//! stepping the previous occurrence, so that a monthly rule anchored on
//! the 31st comes back to the 31st after passing through a short month
//! instead of drifting to the 28th forever.

use serde::Deserialize;
use time::Duration;

use crate::{
    Timestamp,
    recurring::core::Frequency,
    timestamp::{add_months, add_years},
};

/// How far into the future the engine should materialize occurrences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum Horizon {
    /// Up to and including the current day.
    #[default]
    #[serde(rename = "today")]
    Today,
    /// Up to seven days from now.
    #[serde(rename = "nextWeek", alias = "next_week")]
    NextWeek,
    /// Up to the same day next month (clamped to the month's length).
    #[serde(rename = "nextMonth", alias = "next_month")]
    NextMonth,
}

impl Horizon {
    /// The timestamp up to which occurrences should be generated, treating
    /// `now` as the current time.
    pub fn target(&self, now: Timestamp) -> Timestamp {
        match self {
            Horizon::Today => now,
            Horizon::NextWeek => now + Duration::days(7),
            Horizon::NextMonth => Timestamp::new(add_months(now.date(), 1), now.time()),
        }
    }
}

/// The `index`-th occurrence of a rule starting at `start` (index zero is
/// the start itself).
///
/// Monthly and yearly occurrences clamp the day-of-month to the last valid
/// day of the target month; daily and weekly occurrences step in fixed
/// day increments, carrying the start's time of day throughout.
pub fn occurrence_at(start: Timestamp, frequency: Frequency, index: i32) -> Timestamp {
    match frequency {
        Frequency::Daily => start + Duration::days(index as i64),
        Frequency::Weekly => start + Duration::days(7 * index as i64),
        Frequency::Monthly => Timestamp::new(add_months(start.date(), index), start.time()),
        Frequency::Yearly => Timestamp::new(add_years(start.date(), index), start.time()),
    }
}
