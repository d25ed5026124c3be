//! Compute open booking slots for a technician's day.
//!
//! Sorts the day's padded intervals, merges overlapping busy periods, then
//! returns the gaps between merged periods within business hours. Slots are
//! expressed in minutes after midnight on the company's wall clock.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::exceptions::SchedulingSettings;
use crate::interval::ScheduledInterval;

/// A free stretch of a technician's day, `[start, end)` in minutes of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenSlot {
    pub start_minute_of_day: u32,
    pub end_minute_of_day: u32,
    pub duration_minutes: u32,
}

impl OpenSlot {
    fn new(start: u32, end: u32) -> Self {
        Self {
            start_minute_of_day: start,
            end_minute_of_day: end,
            duration_minutes: end - start,
        }
    }
}

/// Merge overlapping or adjacent busy periods on `date`, clipped to the window.
///
/// Returns a sorted, non-overlapping list of (start, end) minute pairs.
fn merge_busy_periods(
    intervals: &[ScheduledInterval],
    date: NaiveDate,
    window_start: u32,
    window_end: u32,
) -> Vec<(u32, u32)> {
    let mut busy: Vec<(u32, u32)> = intervals
        .iter()
        .filter(|i| i.date == date)
        .filter(|i| i.start_minute_of_day < window_end && i.end_minute_of_day() > window_start)
        .map(|i| {
            (
                i.start_minute_of_day.max(window_start),
                i.end_minute_of_day().min(window_end),
            )
        })
        .collect();

    busy.sort_unstable();

    let mut merged: Vec<(u32, u32)> = Vec::new();
    for (start, end) in busy {
        if let Some(last) = merged.last_mut() {
            if start <= last.1 {
                last.1 = last.1.max(end);
                continue;
            }
        }
        merged.push((start, end));
    }

    merged
}

/// Find the open slots on `date` within business hours, given the
/// technician's booked intervals (buffers included).
///
/// Business hours that wrap past midnight yield no slots.
pub fn open_slots(
    settings: &SchedulingSettings,
    date: NaiveDate,
    intervals: &[ScheduledInterval],
) -> Vec<OpenSlot> {
    let (window_start, window_end) = settings.business_minutes();
    if window_start >= window_end {
        return Vec::new();
    }

    let mut slots = Vec::new();
    let mut cursor = window_start;

    for (busy_start, busy_end) in merge_busy_periods(intervals, date, window_start, window_end) {
        if cursor < busy_start {
            slots.push(OpenSlot::new(cursor, busy_start));
        }
        cursor = cursor.max(busy_end);
    }

    if cursor < window_end {
        slots.push(OpenSlot::new(cursor, window_end));
    }

    slots
}

/// The first open slot of at least `min_minutes`.
pub fn first_open_slot(
    settings: &SchedulingSettings,
    date: NaiveDate,
    intervals: &[ScheduledInterval],
    min_minutes: u32,
) -> Option<OpenSlot> {
    open_slots(settings, date, intervals)
        .into_iter()
        .find(|slot| slot.duration_minutes >= min_minutes)
}

/// Earliest start minute at which a job of `duration_minutes` plus its buffer
/// fits without conflicting with any booked interval.
pub fn suggest_start(
    settings: &SchedulingSettings,
    date: NaiveDate,
    intervals: &[ScheduledInterval],
    duration_minutes: u32,
    buffer_minutes: u32,
) -> Option<u32> {
    first_open_slot(settings, date, intervals, duration_minutes + buffer_minutes)
        .map(|slot| slot.start_minute_of_day)
}
