//! Detect technician double-bookings.
//!
//! The detector is advisory: it reads a snapshot of the technician's jobs and
//! reports overlaps. It cannot stop two writers that both pass the check from
//! persisting; see [`crate::booking`] for a serialization point.
//!
//! Adjacent padded intervals (one ends exactly when another starts) are NOT conflicts.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::interval::{
    normalize_with, parse_date, DurationInput, ScheduledInterval,
    DEFAULT_BUFFER_MINUTES, DEFAULT_DURATION_MINUTES,
};

/// A job record as stored by the CRUD layer. Only the fields the detector
/// reads are modelled; all are optional because stored records are not
/// validated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExistingJob {
    pub id: String,
    pub assigned_to: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub duration: Option<DurationInput>,
    pub status: Option<String>,
    pub service_type: Option<String>,
    pub customer_name: Option<String>,
}

impl ExistingJob {
    /// Cancelled jobs stay on record but no longer hold the slot.
    pub fn is_cancelled(&self) -> bool {
        self.status
            .as_deref()
            .map(|s| {
                let s = s.trim();
                s.eq_ignore_ascii_case("cancelled") || s.eq_ignore_ascii_case("canceled")
            })
            .unwrap_or(false)
    }

    /// Normalize this job, using `default_duration` when it has no usable duration.
    /// `None` when the job has no parseable date.
    pub fn interval(&self, default_duration: u32, buffer_minutes: u32) -> Option<ScheduledInterval> {
        let date = parse_date(self.date.as_deref()?)?;
        let normalized = normalize_with(
            date,
            self.time.as_deref().unwrap_or_default(),
            self.duration.as_ref(),
            default_duration,
            buffer_minutes,
        );
        Some(normalized.interval)
    }
}

/// A candidate booking submitted by the job-creation or job-editing flow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BookingRequest {
    pub technician_id: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub duration: Option<DurationInput>,
    /// Padding after each job; 15 minutes when absent.
    pub buffer_minutes: Option<u32>,
    /// The job being edited, which must not conflict with itself.
    pub exclude_job_id: Option<String>,
}

impl BookingRequest {
    pub fn buffer(&self) -> u32 {
        self.buffer_minutes.unwrap_or(DEFAULT_BUFFER_MINUTES)
    }

    /// The candidate's normalized interval, or `None` when it has no parseable date.
    pub fn interval(&self) -> Option<ScheduledInterval> {
        let date = parse_date(self.date.as_deref()?)?;
        let normalized = normalize_with(
            date,
            self.time.as_deref().unwrap_or_default(),
            self.duration.as_ref(),
            DEFAULT_DURATION_MINUTES,
            self.buffer(),
        );
        Some(normalized.interval)
    }
}

/// One existing job that collides with the candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictingJob {
    pub job_id: String,
    pub date: Option<String>,
    pub time: Option<String>,
    pub service_type: Option<String>,
    pub customer_name: Option<String>,
    pub overlap_minutes: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictReport {
    pub has_conflict: bool,
    pub conflicts: Vec<ConflictingJob>,
}

impl ConflictReport {
    fn from_conflicts(conflicts: Vec<ConflictingJob>) -> Self {
        Self {
            has_conflict: !conflicts.is_empty(),
            conflicts,
        }
    }
}

/// Check a candidate booking against the technician's existing jobs.
///
/// `existing` is expected to be pre-filtered to the technician and date, but
/// records for another technician or date are skipped anyway, as are
/// cancelled jobs, jobs with no technician or date, and the excluded job.
///
/// A request with no technician or no parseable date reports no conflict.
pub fn check_availability(request: &BookingRequest, existing: &[ExistingJob]) -> ConflictReport {
    let Some(technician) = request.technician_id.as_deref().filter(|t| !t.is_empty()) else {
        debug!("booking request has no technician, skipping conflict check");
        return ConflictReport::default();
    };
    let Some(candidate) = request.interval() else {
        debug!(date = ?request.date, "booking request has no usable date, skipping conflict check");
        return ConflictReport::default();
    };
    let candidate_duration = candidate.duration_minutes;

    let conflicts = existing
        .iter()
        .filter(|job| request.exclude_job_id.as_deref() != Some(job.id.as_str()))
        .filter(|job| !job.is_cancelled())
        .filter(|job| job.assigned_to.as_deref() == Some(technician))
        .filter_map(|job| {
            let Some(interval) = job.interval(candidate_duration, request.buffer()) else {
                debug!(job_id = %job.id, "existing job has no usable date, skipping");
                return None;
            };
            let overlap_minutes = candidate.overlap_minutes(&interval);
            (overlap_minutes > 0).then(|| ConflictingJob {
                job_id: job.id.clone(),
                date: job.date.clone(),
                time: job.time.clone(),
                service_type: job.service_type.clone(),
                customer_name: job.customer_name.clone(),
                overlap_minutes,
            })
        })
        .collect();

    ConflictReport::from_conflicts(conflicts)
}

/// Two persisted jobs for the same technician whose padded intervals overlap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoubleBooking {
    pub technician_id: String,
    pub job_a: String,
    pub job_b: String,
    pub overlap_minutes: u32,
}

/// Find all pairwise overlaps among already-persisted jobs, grouped by
/// technician and date.
///
/// This is the after-the-fact audit for races the advisory detector cannot
/// prevent. Jobs missing a technician or date, and cancelled jobs, are ignored.
/// Jobs with no duration use one hour.
pub fn find_double_bookings(jobs: &[ExistingJob], buffer_minutes: u32) -> Vec<DoubleBooking> {
    let mut by_slot: BTreeMap<(&str, NaiveDate), Vec<(&ExistingJob, ScheduledInterval)>> =
        BTreeMap::new();

    for job in jobs.iter().filter(|j| !j.is_cancelled()) {
        let Some(technician) = job.assigned_to.as_deref().filter(|t| !t.is_empty()) else {
            continue;
        };
        let Some(interval) = job.interval(DEFAULT_DURATION_MINUTES, buffer_minutes) else {
            continue;
        };
        by_slot
            .entry((technician, interval.date))
            .or_default()
            .push((job, interval));
    }

    let mut found = Vec::new();
    for ((technician, _), day) in &by_slot {
        for (i, (job_a, a)) in day.iter().enumerate() {
            for (job_b, b) in &day[i + 1..] {
                let overlap_minutes = a.overlap_minutes(b);
                if overlap_minutes > 0 {
                    found.push(DoubleBooking {
                        technician_id: technician.to_string(),
                        job_a: job_a.id.clone(),
                        job_b: job_b.id.clone(),
                        overlap_minutes,
                    });
                }
            }
        }
    }
    found
}
