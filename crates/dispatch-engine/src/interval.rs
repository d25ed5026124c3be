//! Interval normalization -- free-form time and duration text into canonical minutes.
//!
//! Job records are typed by hand upstream, so every parse here is tolerant:
//! malformed input falls back to a documented default and the fallback is
//! reported through [`Parsed`] rather than as an error. Callers that need
//! strict validation inspect [`Parsed::is_fallback`] themselves.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DispatchError, Result};

/// Padding added after a job before the next booking may start.
pub const DEFAULT_BUFFER_MINUTES: u32 = 15;
/// Duration used when a record carries no usable duration at all.
pub const DEFAULT_DURATION_MINUTES: u32 = 60;
/// Normalized durations never go below this.
pub const MIN_DURATION_MINUTES: u32 = 5;
/// Longest duration accepted from free text: one week. Anything longer is
/// treated as unrecognized.
pub const MAX_DURATION_MINUTES: u32 = 7 * 24 * 60;
pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Bare numbers up to this value are read as hours ("2" means two hours).
const HOURS_THRESHOLD: f64 = 10.0;

/// Why a tolerant parse fell back to its default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// The input was missing or blank.
    Empty,
    /// The input was present but matched no known pattern.
    Unrecognized,
}

/// Result of a tolerant parse: either the input was understood, or a default
/// was substituted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Parsed<T> {
    Exact { value: T },
    Fallback { value: T, reason: FallbackReason },
}

impl<T: Copy> Parsed<T> {
    pub fn value(&self) -> T {
        match self {
            Parsed::Exact { value } | Parsed::Fallback { value, .. } => *value,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Parsed::Fallback { .. })
    }
}

/// A duration as it appears on a job record: a JSON number or free text such
/// as `"2 hours"`, `"90 min"` or `"1:30"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DurationInput {
    Number(f64),
    Text(String),
}

impl From<u32> for DurationInput {
    fn from(minutes: u32) -> Self {
        DurationInput::Number(minutes as f64)
    }
}

impl From<&str> for DurationInput {
    fn from(text: &str) -> Self {
        DurationInput::Text(text.to_string())
    }
}

impl From<String> for DurationInput {
    fn from(text: String) -> Self {
        DurationInput::Text(text)
    }
}

/// A booked block of time on a single calendar date.
///
/// `end_minute_of_day` includes the buffer and may run past 1440 for jobs
/// that cross midnight; see [`ScheduledInterval::ensure_same_day`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledInterval {
    pub date: NaiveDate,
    pub start_minute_of_day: u32,
    pub duration_minutes: u32,
    pub buffer_minutes: u32,
}

impl ScheduledInterval {
    /// Creates an interval with the default 15-minute buffer.
    pub fn new(date: NaiveDate, start_minute_of_day: u32, duration_minutes: u32) -> Self {
        Self {
            date,
            start_minute_of_day,
            duration_minutes,
            buffer_minutes: DEFAULT_BUFFER_MINUTES,
        }
    }

    pub fn with_buffer(mut self, buffer_minutes: u32) -> Self {
        self.buffer_minutes = buffer_minutes;
        self
    }

    /// Exclusive end, buffer included.
    pub fn end_minute_of_day(&self) -> u32 {
        self.start_minute_of_day
            .saturating_add(self.duration_minutes)
            .saturating_add(self.buffer_minutes)
    }

    /// Half-open overlap test on the padded intervals. Intervals on different
    /// dates never overlap, and touching intervals (`a.end == b.start`) do not.
    pub fn overlaps(&self, other: &ScheduledInterval) -> bool {
        self.date == other.date
            && self.start_minute_of_day < other.end_minute_of_day()
            && self.end_minute_of_day() > other.start_minute_of_day
    }

    /// Minutes shared by the two padded intervals, 0 when they do not overlap.
    pub fn overlap_minutes(&self, other: &ScheduledInterval) -> u32 {
        if !self.overlaps(other) {
            return 0;
        }
        let start = self.start_minute_of_day.max(other.start_minute_of_day);
        let end = self.end_minute_of_day().min(other.end_minute_of_day());
        end - start
    }

    pub fn spans_midnight(&self) -> bool {
        self.end_minute_of_day() > MINUTES_PER_DAY
    }

    /// Strict check for callers that refuse bookings running past midnight.
    pub fn ensure_same_day(&self) -> Result<()> {
        if self.spans_midnight() {
            return Err(DispatchError::Overnight {
                date: self.date.to_string(),
                end_minute: self.end_minute_of_day(),
            });
        }
        Ok(())
    }

    pub fn start_naive(&self) -> NaiveDateTime {
        self.date.and_time(NaiveTime::MIN) + Duration::minutes(self.start_minute_of_day as i64)
    }

    /// Anchor the wall-clock interval in a company timezone and return UTC
    /// instants `(start, end)`, end including the buffer.
    ///
    /// A start inside a DST gap is shifted forward by one hour.
    pub fn to_utc(&self, tz: Tz) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let naive = self.start_naive();
        let local = tz
            .from_local_datetime(&naive)
            .earliest()
            .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
            .ok_or_else(|| DispatchError::InvalidDate(format!("{} in {}", naive, tz.name())))?;
        let start = local.with_timezone(&Utc);
        let padded = self.duration_minutes as i64 + self.buffer_minutes as i64;
        Ok((start, start + Duration::minutes(padded)))
    }
}

/// A normalized interval together with how each field was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Normalized {
    pub interval: ScheduledInterval,
    pub time: Parsed<u32>,
    pub duration: Parsed<u32>,
}

impl Normalized {
    pub fn is_fallback(&self) -> bool {
        self.time.is_fallback() || self.duration.is_fallback()
    }
}

/// Normalize a job's date, time and duration with the default duration and buffer.
pub fn normalize(date: NaiveDate, time: &str, duration: Option<&DurationInput>) -> Normalized {
    normalize_with(
        date,
        time,
        duration,
        DEFAULT_DURATION_MINUTES,
        DEFAULT_BUFFER_MINUTES,
    )
}

/// Normalize with an explicit fallback duration (used when the record has no
/// usable duration) and buffer.
pub fn normalize_with(
    date: NaiveDate,
    time: &str,
    duration: Option<&DurationInput>,
    default_duration: u32,
    buffer_minutes: u32,
) -> Normalized {
    let time = parse_time_of_day(time);
    let duration = parse_duration_or(duration, default_duration);
    Normalized {
        interval: ScheduledInterval {
            date,
            start_minute_of_day: time.value(),
            duration_minutes: duration.value(),
            buffer_minutes,
        },
        time,
        duration,
    }
}

/// Parse a calendar date: `YYYY-MM-DD`, or any ISO-8601 date-time whose first
/// ten characters are one.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let prefix = trimmed.get(..10)?;
    if trimmed.len() > 10 && !trimmed[10..].starts_with(['T', 't', ' ']) {
        return None;
    }
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

/// Parse a time of day into minutes after midnight.
///
/// Tries a 12-hour clock with meridiem (`9:00 AM`, `9am`, `12:30 p.m.`), then
/// 24-hour and date-time forms (`14:30`, `9`, `1430`,
/// `2024-06-10T14:30:00`). Anything else falls back to midnight.
pub fn parse_time_of_day(raw: &str) -> Parsed<u32> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Parsed::Fallback {
            value: 0,
            reason: FallbackReason::Empty,
        };
    }

    if let Some(value) = parse_meridiem(trimmed).or_else(|| parse_generic_time(trimmed)) {
        return Parsed::Exact { value };
    }

    debug!(input = trimmed, "unrecognized time of day, using midnight");
    Parsed::Fallback {
        value: 0,
        reason: FallbackReason::Unrecognized,
    }
}

/// Parse a duration into minutes, defaulting to one hour.
pub fn parse_duration(input: &DurationInput) -> Parsed<u32> {
    parse_duration_or(Some(input), DEFAULT_DURATION_MINUTES)
}

/// Parse a duration into minutes, substituting `default_minutes` when the
/// input is missing, blank or unrecognizable.
///
/// Rules, in order: a plain number up to 10 is hours, above 10 is minutes;
/// `H:MM` is hours and minutes; text with `hour`/`hr`/`min` units is summed
/// per unit; otherwise the first number in the text is minutes. The result is
/// never below [`MIN_DURATION_MINUTES`]; anything above
/// [`MAX_DURATION_MINUTES`] falls back as unrecognized.
pub fn parse_duration_or(input: Option<&DurationInput>, default_minutes: u32) -> Parsed<u32> {
    let fallback = |reason| Parsed::Fallback {
        value: default_minutes.max(MIN_DURATION_MINUTES),
        reason,
    };

    let minutes = match input {
        None => return fallback(FallbackReason::Empty),
        Some(DurationInput::Number(n)) => minutes_from_number(*n),
        Some(DurationInput::Text(text)) => {
            let text = text.trim().to_ascii_lowercase();
            if text.is_empty() {
                return fallback(FallbackReason::Empty);
            }
            match text.parse::<f64>() {
                Ok(n) => minutes_from_number(n),
                Err(_) => parse_clock_duration(&text)
                    .or_else(|| parse_unit_duration(&text))
                    .or_else(|| first_number(&text)),
            }
        }
    };

    match minutes.and_then(clamp_minutes) {
        Some(value) => Parsed::Exact { value },
        None => {
            debug!(input = ?input, default_minutes, "unrecognized duration, using default");
            fallback(FallbackReason::Unrecognized)
        }
    }
}

fn minutes_from_number(n: f64) -> Option<f64> {
    if !n.is_finite() || n < 0.0 {
        return None;
    }
    Some(if n <= HOURS_THRESHOLD { n * 60.0 } else { n })
}

fn clamp_minutes(minutes: f64) -> Option<u32> {
    let minutes = minutes.round();
    if minutes > MAX_DURATION_MINUTES as f64 {
        return None;
    }
    Some((minutes as u32).max(MIN_DURATION_MINUTES))
}

/// `"9:00 AM"` → 540. Hours must be 1..=12.
fn parse_meridiem(s: &str) -> Option<u32> {
    let lower: String = s
        .to_ascii_lowercase()
        .chars()
        .filter(|c| *c != '.')
        .collect();
    let (clock, pm) = if let Some(clock) = lower.strip_suffix("pm") {
        (clock, true)
    } else if let Some(clock) = lower.strip_suffix("am") {
        (clock, false)
    } else {
        return None;
    };

    let (hour, minute) = split_clock(clock.trim())?;
    if !(1..=12).contains(&hour) {
        return None;
    }
    let hour = hour % 12 + if pm { 12 } else { 0 };
    Some(hour * 60 + minute)
}

fn parse_generic_time(s: &str) -> Option<u32> {
    if let Some((hour, minute)) = split_clock(s) {
        if hour < 24 {
            return Some(hour * 60 + minute);
        }
    }

    if s.len() == 4 {
        if let Ok(t) = NaiveTime::parse_from_str(s, "%H%M") {
            return Some(t.hour() * 60 + t.minute());
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        // Keep the wall-clock time as written; the offset belongs to the writer.
        let local = dt.naive_local();
        return Some(local.hour() * 60 + local.minute());
    }

    const DATE_TIME_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];
    DATE_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|dt| dt.hour() * 60 + dt.minute())
}

/// `"H"`, `"H:MM"` or `"H:MM:SS"` → (hour, minute). Seconds are validated and dropped.
fn split_clock(s: &str) -> Option<(u32, u32)> {
    let mut parts = s.split(':');
    let hour = parts.next()?.trim().parse::<u32>().ok()?;
    let minute = match parts.next() {
        Some(m) => m.trim().parse::<u32>().ok()?,
        None => 0,
    };
    if let Some(seconds) = parts.next() {
        if seconds.trim().parse::<u32>().ok()? > 59 {
            return None;
        }
    }
    if parts.next().is_some() || minute > 59 {
        return None;
    }
    Some((hour, minute))
}

/// `"1:30"` → 90.
fn parse_clock_duration(s: &str) -> Option<f64> {
    let (hours, minutes) = s.split_once(':')?;
    let hours = hours.trim().parse::<u32>().ok()?;
    let minutes = minutes.trim().parse::<u32>().ok()?;
    if minutes >= 60 {
        return None;
    }
    Some(hours.checked_mul(60)?.checked_add(minutes)? as f64)
}

enum Token<'a> {
    Number(f64),
    Word(&'a str),
}

fn tokenize(s: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut chars = s.char_indices().peekable();
    while let Some(&(start, c)) = chars.peek() {
        let numeric = c.is_ascii_digit() || c == '.';
        if !numeric && !c.is_alphabetic() {
            chars.next();
            continue;
        }
        let mut end = start;
        while let Some(&(i, c)) = chars.peek() {
            let same_class = if numeric {
                c.is_ascii_digit() || c == '.'
            } else {
                c.is_alphabetic()
            };
            if !same_class {
                break;
            }
            end = i + c.len_utf8();
            chars.next();
        }
        let text = &s[start..end];
        if numeric {
            if let Ok(n) = text.parse::<f64>() {
                tokens.push(Token::Number(n));
            }
        } else {
            tokens.push(Token::Word(text));
        }
    }
    tokens
}

/// `"2 hours"`, `"1 hr 30 mins"`, `"45min"` → minutes. `None` when no number
/// is followed by a recognized unit.
fn parse_unit_duration(s: &str) -> Option<f64> {
    let mut total = 0.0;
    let mut matched = false;
    let mut pending = None;

    for token in tokenize(s) {
        match token {
            Token::Number(n) => pending = Some(n),
            Token::Word(word) => {
                let Some(n) = pending.take() else { continue };
                if matches!(word, "h" | "hr" | "hrs" | "hour" | "hours") {
                    total += n * 60.0;
                    matched = true;
                } else if matches!(word, "m" | "min" | "mins" | "minute" | "minutes") {
                    total += n;
                    matched = true;
                }
            }
        }
    }

    matched.then_some(total)
}

fn first_number(s: &str) -> Option<f64> {
    tokenize(s).into_iter().find_map(|t| match t {
        Token::Number(n) => Some(n),
        Token::Word(_) => None,
    })
}
