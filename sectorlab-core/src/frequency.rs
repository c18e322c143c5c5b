//! Trading frequency and strategy leg enumerations.
//!
//! Frequencies drive both calendar resampling (period labels) and
//! annualization (periods per year). Leg modes are parsed once from their
//! configuration codes and expand to the concrete legs a run produces.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Rebalancing cadence for signals and positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Frequency {
    Daily,
    Weekly,
    BiWeekly,
    Monthly,
}

impl Frequency {
    /// Number of trading periods in a year at this frequency.
    pub fn periods_per_year(self) -> u32 {
        match self {
            Self::Daily => 252,
            Self::Weekly => 52,
            Self::BiWeekly => 26,
            Self::Monthly => 12,
        }
    }

    /// Short configuration code: `D`, `W`, `2W`, `M`.
    pub fn code(self) -> &'static str {
        match self {
            Self::Daily => "D",
            Self::Weekly => "W",
            Self::BiWeekly => "2W",
            Self::Monthly => "M",
        }
    }

    /// Label of the period containing `date`.
    ///
    /// Labels are period ends: the date itself (daily), the Sunday closing the
    /// week (weekly), the month end (monthly). Bi-weekly bins are two weeks
    /// wide and anchored on `anchor`, the Sunday closing the first week of the
    /// panel being resampled.
    pub fn period_label(self, date: NaiveDate, anchor: NaiveDate) -> NaiveDate {
        match self {
            Self::Daily => date,
            Self::Weekly => week_ending(date),
            Self::BiWeekly => {
                let weeks = (week_ending(date) - anchor).num_days() / 7;
                anchor + Duration::days(14 * ((weeks + 1) / 2))
            }
            Self::Monthly => month_end(date),
        }
    }

    /// The label following `label`, used to emit empty bins between gaps.
    pub fn next_label(self, label: NaiveDate) -> NaiveDate {
        match self {
            Self::Daily => label + Duration::days(1),
            Self::Weekly => label + Duration::days(7),
            Self::BiWeekly => label + Duration::days(14),
            Self::Monthly => month_end(label + Duration::days(1)),
        }
    }
}

impl FromStr for Frequency {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "D" | "DAILY" => Ok(Self::Daily),
            "W" | "WEEKLY" => Ok(Self::Weekly),
            "2W" | "BIWEEKLY" => Ok(Self::BiWeekly),
            "M" | "MONTHLY" => Ok(Self::Monthly),
            _ => Err(ConfigError::InvalidFrequency(s.to_string())),
        }
    }
}

impl TryFrom<String> for Frequency {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Frequency> for String {
    fn from(value: Frequency) -> Self {
        value.code().to_string()
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// The Sunday on or after `date`.
pub(crate) fn week_ending(date: NaiveDate) -> NaiveDate {
    let days_to_sunday = 6 - date.weekday().num_days_from_monday();
    date + Duration::days(i64::from(days_to_sunday))
}

/// Last calendar day of the month containing `date`.
pub(crate) fn month_end(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first| first.pred_opt())
        .unwrap_or(date)
}

// ─── Legs ───────────────────────────────────────────────────────────

/// One side of a strategy's book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Leg {
    Long,
    Short,
    Combined,
}

impl Leg {
    /// Display label used in result keys.
    pub fn label(self) -> &'static str {
        match self {
            Self::Long => "Long",
            Self::Short => "Short",
            Self::Combined => "Combined",
        }
    }
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which legs a strategy run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LegMode {
    Long,
    Short,
    LongShort,
    All,
}

impl LegMode {
    /// The legs this mode expands to, in output order.
    pub fn legs(self) -> &'static [Leg] {
        match self {
            Self::Long => &[Leg::Long],
            Self::Short => &[Leg::Short],
            Self::LongShort => &[Leg::Combined],
            Self::All => &[Leg::Long, Leg::Short, Leg::Combined],
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::Long => "L",
            Self::Short => "S",
            Self::LongShort => "LS",
            Self::All => "ALL",
        }
    }
}

impl FromStr for LegMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "L" => Ok(Self::Long),
            "S" => Ok(Self::Short),
            "LS" => Ok(Self::LongShort),
            "ALL" => Ok(Self::All),
            _ => Err(ConfigError::InvalidLegs(s.to_string())),
        }
    }
}

impl TryFrom<String> for LegMode {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LegMode> for String {
    fn from(value: LegMode) -> Self {
        value.code().to_string()
    }
}

impl fmt::Display for LegMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
