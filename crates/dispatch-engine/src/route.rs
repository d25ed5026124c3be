//! Route statistics from technician location samples.
//!
//! Samples arrive from the field-side tracker in ascending timestamp order.
//! Everything here is a fold over that sequence; degenerate windows produce
//! zero-valued statistics rather than errors.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Mean Earth radius used for great-circle distances.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// One positional fix reported by a technician's device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSample {
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    /// Speed as reported by the device, in the device's unit.
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub is_job_site: bool,
    #[serde(default)]
    pub job_id: Option<String>,
}

impl LocationSample {
    fn has_valid_position(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    fn site_job_id(&self) -> Option<&str> {
        if !self.is_job_site {
            return None;
        }
        self.job_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Aggregates for one technician over a window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStatistics {
    pub total_points: usize,
    /// Rounded to 2 decimal places.
    pub total_distance_km: f64,
    pub total_time_minutes: i64,
    /// Mean of the samples' reported speeds, rounded to 2 decimal places.
    pub average_speed: f64,
    pub job_sites_visited: usize,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

/// Great-circle distance between two points, in meters.
pub fn haversine_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_METERS * c
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Valid samples in ascending timestamp order. Equal timestamps keep input order.
fn ordered(samples: &[LocationSample]) -> Vec<&LocationSample> {
    let mut valid: Vec<&LocationSample> = samples
        .iter()
        .filter(|s| {
            let ok = s.has_valid_position();
            if !ok {
                warn!(
                    timestamp = %s.timestamp,
                    latitude = s.latitude,
                    longitude = s.longitude,
                    "discarding location sample with invalid coordinates"
                );
            }
            ok
        })
        .collect();
    valid.sort_by_key(|s| s.timestamp);
    valid
}

/// Compute route statistics over a window of samples.
///
/// With fewer than two usable samples only `total_points` and the start/end
/// times are filled in.
pub fn route_statistics(samples: &[LocationSample]) -> RouteStatistics {
    let points = ordered(samples);

    let (first, last) = match (points.first(), points.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return RouteStatistics::default(),
    };

    if points.len() < 2 {
        return RouteStatistics {
            total_points: points.len(),
            start_time: Some(first.timestamp),
            end_time: Some(last.timestamp),
            ..RouteStatistics::default()
        };
    }

    let meters: f64 = points
        .windows(2)
        .map(|pair| {
            haversine_meters(
                pair[0].latitude,
                pair[0].longitude,
                pair[1].latitude,
                pair[1].longitude,
            )
        })
        .sum();

    let speeds: Vec<f64> = points
        .iter()
        .filter_map(|s| s.speed)
        .filter(|v| v.is_finite())
        .collect();
    let average_speed = if speeds.is_empty() {
        0.0
    } else {
        speeds.iter().sum::<f64>() / speeds.len() as f64
    };

    let job_sites: BTreeSet<&str> = points.iter().filter_map(|s| s.site_job_id()).collect();

    RouteStatistics {
        total_points: points.len(),
        total_distance_km: round2(meters / 1000.0),
        total_time_minutes: (last.timestamp - first.timestamp).num_minutes(),
        average_speed: round2(average_speed),
        job_sites_visited: job_sites.len(),
        start_time: Some(first.timestamp),
        end_time: Some(last.timestamp),
    }
}

/// The samples whose timestamp lies in `[start, end]`, in input order.
pub fn samples_in_window(
    samples: &[LocationSample],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<LocationSample> {
    samples
        .iter()
        .filter(|s| s.timestamp >= start && s.timestamp <= end)
        .cloned()
        .collect()
}

/// [`route_statistics`] over the samples whose timestamp lies in `[start, end]`.
pub fn route_statistics_in_window(
    samples: &[LocationSample],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> RouteStatistics {
    route_statistics(&samples_in_window(samples, start, end))
}

/// A continuous stay at one job site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteVisit {
    pub job_id: String,
    pub arrived_at: DateTime<Utc>,
    pub departed_at: DateTime<Utc>,
    pub dwell_minutes: i64,
    pub samples: usize,
}

/// Collapse consecutive job-site samples with the same `job_id` into visits.
///
/// A sample off site, or at a different job, ends the current visit; returning
/// to the same job later starts a new one.
pub fn job_site_visits(samples: &[LocationSample]) -> Vec<SiteVisit> {
    let mut visits: Vec<SiteVisit> = Vec::new();
    let mut open = false;

    for sample in ordered(samples) {
        let Some(job_id) = sample.site_job_id() else {
            open = false;
            continue;
        };

        if let Some(current) = visits.last_mut().filter(|v| open && v.job_id == job_id) {
            current.departed_at = sample.timestamp;
            current.dwell_minutes = (current.departed_at - current.arrived_at).num_minutes();
            current.samples += 1;
            continue;
        }

        visits.push(SiteVisit {
            job_id: job_id.to_string(),
            arrived_at: sample.timestamp,
            departed_at: sample.timestamp,
            dwell_minutes: 0,
            samples: 1,
        });
        open = true;
    }

    visits
}
