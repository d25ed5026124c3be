//! Work-day and exception resolution.
//!
//! Decides whether a technician is expected to work (and so be tracked) on a
//! date. Company-wide settings are checked first, then the technician's dated
//! leave and overtime exceptions.
//!
//! # Precedence
//! Tracking disabled, then non-work day, then any leave (`sick_day`,
//! `vacation`, `off_day`), then `overtime`, then a normal workday. Among
//! several leave exceptions covering the same date, the first in input order
//! supplies the reason; no priority between leave types is implied.

use std::fmt;

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{DispatchError, Result};

const WEEKDAY_NAMES: [(Weekday, &str); 7] = [
    (Weekday::Mon, "monday"),
    (Weekday::Tue, "tuesday"),
    (Weekday::Wed, "wednesday"),
    (Weekday::Thu, "thursday"),
    (Weekday::Fri, "friday"),
    (Weekday::Sat, "saturday"),
    (Weekday::Sun, "sunday"),
];

/// Parse a weekday name, full or abbreviated, in any case.
pub fn parse_weekday_name(name: &str) -> Result<Weekday> {
    name.trim()
        .parse::<Weekday>()
        .map_err(|_| DispatchError::InvalidWeekday(name.to_string()))
}

/// The set of weekdays a company works. Serialized as lowercase full names.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct WorkDays {
    /// Bit `n` set for `Weekday::num_days_from_monday() == n`.
    mask: u8,
}

impl WorkDays {
    pub fn none() -> Self {
        Self { mask: 0 }
    }

    pub fn weekdays() -> Self {
        Self::from_days([
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
        ])
    }

    pub fn from_days(days: impl IntoIterator<Item = Weekday>) -> Self {
        let mask = days
            .into_iter()
            .fold(0u8, |mask, day| mask | 1 << day.num_days_from_monday());
        Self { mask }
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.mask & (1 << day.num_days_from_monday()) != 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Weekday> + '_ {
        WEEKDAY_NAMES
            .iter()
            .map(|(day, _)| *day)
            .filter(|day| self.contains(*day))
    }
}

impl Default for WorkDays {
    fn default() -> Self {
        Self::weekdays()
    }
}

impl fmt::Debug for WorkDays {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl TryFrom<Vec<String>> for WorkDays {
    type Error = DispatchError;

    fn try_from(names: Vec<String>) -> Result<Self> {
        let days = names
            .iter()
            .map(|n| parse_weekday_name(n))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_days(days))
    }
}

impl From<WorkDays> for Vec<String> {
    fn from(days: WorkDays) -> Self {
        WEEKDAY_NAMES
            .iter()
            .filter(|(day, _)| days.contains(*day))
            .map(|(_, name)| name.to_string())
            .collect()
    }
}

/// `"HH:MM"` on the wire; reading also accepts anything the interval
/// normalizer understands exactly (`"8:00 AM"`).
mod clock {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    use crate::interval::{parse_time_of_day, Parsed};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match parse_time_of_day(&raw) {
            Parsed::Exact { value } => NaiveTime::from_hms_opt(value / 60, value % 60, 0)
                .ok_or_else(|| de::Error::custom(format!("invalid time of day: {}", raw))),
            Parsed::Fallback { .. } => Err(de::Error::custom(format!(
                "invalid time of day: {}",
                raw
            ))),
        }
    }
}

/// Company-wide scheduling configuration. One record per company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchedulingSettings {
    pub auto_tracking_enabled: bool,
    #[serde(with = "clock")]
    pub business_hours_start: NaiveTime,
    #[serde(with = "clock")]
    pub business_hours_end: NaiveTime,
    pub work_days: WorkDays,
    /// How long location samples are kept.
    pub retention_days: u32,
    /// IANA timezone the company's wall clock runs in. UTC when absent.
    pub timezone: Option<String>,
}

impl Default for SchedulingSettings {
    fn default() -> Self {
        Self {
            auto_tracking_enabled: true,
            business_hours_start: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
            business_hours_end: NaiveTime::from_hms_opt(17, 0, 0).unwrap_or(NaiveTime::MIN),
            work_days: WorkDays::weekdays(),
            retention_days: 30,
            timezone: None,
        }
    }
}

impl SchedulingSettings {
    pub fn tz(&self) -> Result<Tz> {
        match self.timezone.as_deref() {
            None | Some("") => Ok(Tz::UTC),
            Some(name) => name
                .parse()
                .map_err(|_| DispatchError::InvalidTimezone(name.to_string())),
        }
    }

    /// Business hours as `(start, end)` minutes after midnight, end exclusive.
    pub fn business_minutes(&self) -> (u32, u32) {
        let minutes = |t: NaiveTime| t.hour() * 60 + t.minute();
        (
            minutes(self.business_hours_start),
            minutes(self.business_hours_end),
        )
    }

    /// Whether `minute` of the day is inside business hours. Hours whose end
    /// is before their start wrap past midnight.
    pub fn in_business_hours(&self, minute: u32) -> bool {
        let (start, end) = self.business_minutes();
        if start <= end {
            minute >= start && minute < end
        } else {
            minute >= start || minute < end
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionKind {
    SickDay,
    Vacation,
    OffDay,
    Overtime,
}

impl ExceptionKind {
    pub fn is_leave(self) -> bool {
        !matches!(self, ExceptionKind::Overtime)
    }
}

/// A dated override of a technician's schedule. The range is inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleException {
    #[serde(default)]
    pub technician_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: ExceptionKind,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub description: Option<String>,
}

impl ScheduleException {
    /// An exception whose end precedes its start covers nothing.
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingReason {
    AutoTrackingDisabled,
    NotWorkDay,
    SickDay,
    Vacation,
    OffDay,
    Overtime,
    NormalWorkday,
    OutsideBusinessHours,
}

impl From<ExceptionKind> for TrackingReason {
    fn from(kind: ExceptionKind) -> Self {
        match kind {
            ExceptionKind::SickDay => TrackingReason::SickDay,
            ExceptionKind::Vacation => TrackingReason::Vacation,
            ExceptionKind::OffDay => TrackingReason::OffDay,
            ExceptionKind::Overtime => TrackingReason::Overtime,
        }
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingDecision {
    pub should_track: bool,
    pub reason: TrackingReason,
    #[serde(default, skip_serializing_if = "is_false")]
    pub overtime: bool,
}

impl TrackingDecision {
    fn off(reason: TrackingReason) -> Self {
        Self {
            should_track: false,
            reason,
            overtime: false,
        }
    }
}

/// Decide whether a technician is expected to work on `date`.
pub fn resolve_tracking(
    settings: &SchedulingSettings,
    exceptions: &[ScheduleException],
    date: NaiveDate,
) -> TrackingDecision {
    if !settings.auto_tracking_enabled {
        return TrackingDecision::off(TrackingReason::AutoTrackingDisabled);
    }

    if !settings.work_days.contains(date.weekday()) {
        return TrackingDecision::off(TrackingReason::NotWorkDay);
    }

    let mut overtime = false;
    for exception in exceptions.iter().filter(|e| e.covers(date)) {
        if exception.kind.is_leave() {
            return TrackingDecision::off(exception.kind.into());
        }
        overtime = true;
    }

    if overtime {
        TrackingDecision {
            should_track: true,
            reason: TrackingReason::Overtime,
            overtime: true,
        }
    } else {
        TrackingDecision {
            should_track: true,
            reason: TrackingReason::NormalWorkday,
            overtime: false,
        }
    }
}

/// Decide whether a technician should be tracked at an instant.
///
/// The instant is read on the company's wall clock. On a normal workday,
/// instants outside business hours are not tracked; overtime days are
/// tracked around the clock.
///
/// # Errors
/// Returns `DispatchError::InvalidTimezone` if the settings name an unknown timezone.
pub fn resolve_tracking_at(
    settings: &SchedulingSettings,
    exceptions: &[ScheduleException],
    instant: DateTime<Utc>,
) -> Result<TrackingDecision> {
    let local = instant.with_timezone(&settings.tz()?);
    let decision = resolve_tracking(settings, exceptions, local.date_naive());

    if decision.should_track
        && !decision.overtime
        && !settings.in_business_hours(local.hour() * 60 + local.minute())
    {
        return Ok(TrackingDecision::off(TrackingReason::OutsideBusinessHours));
    }
    Ok(decision)
}

/// One day of a [`tracking_calendar`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayDecision {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub decision: TrackingDecision,
}

/// Resolve every date in `[from, to]`. Empty when `from > to`.
pub fn tracking_calendar(
    settings: &SchedulingSettings,
    exceptions: &[ScheduleException],
    from: NaiveDate,
    to: NaiveDate,
) -> Vec<DayDecision> {
    from.iter_days()
        .take_while(|date| *date <= to)
        .map(|date| DayDecision {
            date,
            decision: resolve_tracking(settings, exceptions, date),
        })
        .collect()
}

/// Oldest sample timestamp that must still be retained at `now`.
///
/// A retention period reaching past the start of the calendar keeps everything.
pub fn retention_cutoff(settings: &SchedulingSettings, now: DateTime<Utc>) -> DateTime<Utc> {
    now.checked_sub_days(Days::new(settings.retention_days as u64))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
