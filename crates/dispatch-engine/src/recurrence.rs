//! Recurrence -- next occurrence dates for recurring job templates.
//!
//! A template walks forward one step at a time from its last materialized
//! occurrence. Month steps clamp to the last day of a shorter month
//! (Jan 31 + 1 month = Feb 28/29), so chained monthly occurrences that start
//! late in a month settle on the clamped day.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, Months, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{DispatchError, Result};

/// Upper bound on dates produced by [`occurrences`].
pub const MAX_PREVIEW: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Frequency {
    Daily,
    Weekly,
    BiWeekly,
    Monthly,
    BiMonthly,
    Quarterly,
    Annually,
}

/// How far one step of a [`Frequency`] moves the calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Days(u64),
    Months(u32),
}

impl Frequency {
    pub const ALL: [Frequency; 7] = [
        Frequency::Daily,
        Frequency::Weekly,
        Frequency::BiWeekly,
        Frequency::Monthly,
        Frequency::BiMonthly,
        Frequency::Quarterly,
        Frequency::Annually,
    ];

    pub fn step(self) -> Step {
        match self {
            Frequency::Daily => Step::Days(1),
            Frequency::Weekly => Step::Days(7),
            Frequency::BiWeekly => Step::Days(14),
            Frequency::Monthly => Step::Months(1),
            Frequency::BiMonthly => Step::Months(2),
            Frequency::Quarterly => Step::Months(3),
            Frequency::Annually => Step::Months(12),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::BiWeekly => "bi-weekly",
            Frequency::Monthly => "monthly",
            Frequency::BiMonthly => "bi-monthly",
            Frequency::Quarterly => "quarterly",
            Frequency::Annually => "annually",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = DispatchError;

    /// Case-insensitive; `biweekly`, `bimonthly` and `yearly` are accepted as aliases.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "bi-weekly" | "biweekly" => Ok(Frequency::BiWeekly),
            "monthly" => Ok(Frequency::Monthly),
            "bi-monthly" | "bimonthly" => Ok(Frequency::BiMonthly),
            "quarterly" => Ok(Frequency::Quarterly),
            "annually" | "yearly" => Ok(Frequency::Annually),
            _ => Err(DispatchError::InvalidFrequency(s.to_string())),
        }
    }
}

/// Convert a 0=Sunday..6=Saturday index into a [`Weekday`].
pub fn weekday_from_index(index: u8) -> Result<Weekday> {
    match index {
        0 => Ok(Weekday::Sun),
        1 => Ok(Weekday::Mon),
        2 => Ok(Weekday::Tue),
        3 => Ok(Weekday::Wed),
        4 => Ok(Weekday::Thu),
        5 => Ok(Weekday::Fri),
        6 => Ok(Weekday::Sat),
        _ => Err(DispatchError::InvalidWeekday(format!(
            "day index {} (expected 0=Sunday..6=Saturday)",
            index
        ))),
    }
}

/// Compute the occurrence that follows `last`.
///
/// Adds one frequency step, then, if `day_of_week` is set, moves forward
/// (never backward) to the first date on or after the stepped date falling
/// on that weekday. The result is always strictly after `last`.
///
/// # Errors
/// Returns `DispatchError::InvalidDate` if the result would fall outside the
/// representable calendar.
pub fn next_occurrence(
    last: NaiveDate,
    frequency: Frequency,
    day_of_week: Option<Weekday>,
) -> Result<NaiveDate> {
    let stepped = match frequency.step() {
        Step::Days(n) => last.checked_add_days(Days::new(n)),
        Step::Months(n) => last.checked_add_months(Months::new(n)),
    }
    .ok_or_else(|| out_of_range(last))?;

    let Some(target) = day_of_week else {
        return Ok(stepped);
    };

    let current = stepped.weekday().num_days_from_sunday();
    let advance = (target.num_days_from_sunday() + 7 - current) % 7;
    stepped
        .checked_add_days(Days::new(advance as u64))
        .ok_or_else(|| out_of_range(last))
}

fn out_of_range(last: NaiveDate) -> DispatchError {
    DispatchError::InvalidDate(format!("next occurrence after {} is out of range", last))
}

fn default_active() -> bool {
    true
}

/// A recurring job definition as stored by the CRUD layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurringTemplate {
    pub id: String,
    pub frequency: Frequency,
    /// 0=Sunday..6=Saturday.
    #[serde(default)]
    pub day_of_week: Option<u8>,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl RecurringTemplate {
    pub fn weekday(&self) -> Result<Option<Weekday>> {
        self.day_of_week.map(weekday_from_index).transpose()
    }

    /// Next occurrence after `last`, or after `start_date` when nothing has
    /// been generated yet. Ignores `end_date` and `is_active`.
    pub fn next_after(&self, last: Option<NaiveDate>) -> Result<NaiveDate> {
        next_occurrence(
            last.unwrap_or(self.start_date),
            self.frequency,
            self.weekday()?,
        )
    }

    /// RFC 5545 `RRULE` value for calendar export.
    ///
    /// `None` when the template has no exact RRULE equivalent: a pinned
    /// weekday on anything but a weekly cadence starting on that weekday, or
    /// a month-based cadence starting after the 28th (clamping drifts).
    pub fn rrule(&self) -> Option<String> {
        let weekday = self.weekday().ok()?;
        let (freq, interval) = match self.frequency {
            Frequency::Daily => ("DAILY", 1),
            Frequency::Weekly => ("WEEKLY", 1),
            Frequency::BiWeekly => ("WEEKLY", 2),
            Frequency::Monthly => ("MONTHLY", 1),
            Frequency::BiMonthly => ("MONTHLY", 2),
            Frequency::Quarterly => ("MONTHLY", 3),
            Frequency::Annually => ("YEARLY", 1),
        };

        if matches!(self.frequency.step(), Step::Months(_)) && self.start_date.day() > 28 {
            return None;
        }

        let mut rule = format!("FREQ={};INTERVAL={}", freq, interval);
        if let Some(day) = weekday {
            if freq != "WEEKLY" || self.start_date.weekday() != day {
                return None;
            }
            rule.push_str(&format!(";BYDAY={}", byday(day)));
        }
        if let Some(end) = self.end_date {
            rule.push_str(&format!(";UNTIL={}", end.format("%Y%m%d")));
        }
        Some(rule)
    }
}

fn byday(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

/// Preview the next `limit` occurrences strictly after `after`, stopping at
/// the template's `end_date`. Capped at [`MAX_PREVIEW`] dates.
pub fn occurrences(
    template: &RecurringTemplate,
    after: NaiveDate,
    limit: usize,
) -> Result<Vec<NaiveDate>> {
    let weekday = template.weekday()?;
    let mut dates = Vec::new();
    let mut cursor = after;

    while dates.len() < limit.min(MAX_PREVIEW) {
        cursor = next_occurrence(cursor, template.frequency, weekday)?;
        if template.end_date.is_some_and(|end| cursor > end) {
            break;
        }
        dates.push(cursor);
    }

    Ok(dates)
}
