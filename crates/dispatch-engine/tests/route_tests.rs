//! Tests for route statistics and job-site visits.

use chrono::{DateTime, TimeZone, Utc};
use dispatch_engine::route::{
    haversine_meters, job_site_visits, route_statistics_in_window, samples_in_window, SiteVisit,
};
use dispatch_engine::{route_statistics, LocationSample, RouteStatistics};

// ── Helpers ─────────────────────────────────────────────────────────────────

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 10, hour, minute, 0).unwrap()
}

fn sample(ts: DateTime<Utc>, lat: f64, lon: f64) -> LocationSample {
    LocationSample {
        timestamp: ts,
        latitude: lat,
        longitude: lon,
        speed: None,
        is_job_site: false,
        job_id: None,
    }
}

fn site(ts: DateTime<Utc>, lat: f64, lon: f64, job: &str) -> LocationSample {
    LocationSample {
        is_job_site: true,
        job_id: Some(job.to_string()),
        ..sample(ts, lat, lon)
    }
}

// ── Distance ────────────────────────────────────────────────────────────────

#[test]
fn hundredth_of_a_degree_latitude_is_about_1_11_km() {
    let samples = vec![sample(at(8, 0), 40.0, -75.0), sample(at(8, 10), 40.01, -75.0)];
    let stats = route_statistics(&samples);
    assert_eq!(stats.total_distance_km, 1.11);
}

#[test]
fn haversine_one_degree_on_equator() {
    let meters = haversine_meters(0.0, 0.0, 0.0, 1.0);
    assert!((meters - 111_194.93).abs() < 1.0, "got {}", meters);
    assert_eq!(haversine_meters(51.5, -0.12, 51.5, -0.12), 0.0);
}

#[test]
fn distance_accumulates_over_consecutive_pairs() {
    // Out and back: two legs of ~1.11 km each.
    let samples = vec![
        sample(at(8, 0), 40.0, -75.0),
        sample(at(8, 10), 40.01, -75.0),
        sample(at(8, 20), 40.0, -75.0),
    ];
    assert_eq!(route_statistics(&samples).total_distance_km, 2.22);
}

// ── Aggregates ──────────────────────────────────────────────────────────────

#[test]
fn full_day_statistics() {
    let mut moving = sample(at(8, 0), 40.0, -75.0);
    moving.speed = Some(10.0);
    let mut stopped = site(at(9, 0), 40.01, -75.0, "job-1");
    stopped.speed = Some(20.0);

    let samples = vec![
        moving,
        stopped,
        site(at(9, 15), 40.01, -75.0, "job-1"),
        site(at(9, 30), 40.02, -75.0, "job-2"),
        LocationSample {
            is_job_site: false,
            job_id: Some("job-3".to_string()),
            ..sample(at(9, 30), 40.02, -75.0)
        },
    ];

    let stats = route_statistics(&samples);

    assert_eq!(stats.total_points, 5);
    assert_eq!(stats.total_time_minutes, 90);
    assert_eq!(stats.average_speed, 15.0);
    assert_eq!(stats.job_sites_visited, 2);
    assert_eq!(stats.start_time, Some(at(8, 0)));
    assert_eq!(stats.end_time, Some(at(9, 30)));
    assert_eq!(stats.total_distance_km, 2.22);
}

#[test]
fn average_speed_ignores_samples_without_speed() {
    let mut a = sample(at(8, 0), 40.0, -75.0);
    a.speed = Some(12.346);
    let b = sample(at(8, 5), 40.0, -75.0);
    let stats = route_statistics(&[a, b]);
    assert_eq!(stats.average_speed, 12.35);
}

#[test]
fn unsorted_input_is_ordered_by_timestamp() {
    let samples = vec![
        sample(at(9, 0), 40.01, -75.0),
        sample(at(8, 0), 40.0, -75.0),
    ];
    let stats = route_statistics(&samples);
    assert_eq!(stats.start_time, Some(at(8, 0)));
    assert_eq!(stats.total_time_minutes, 60);
}

#[test]
fn invalid_coordinates_are_skipped() {
    let samples = vec![
        sample(at(8, 0), 40.0, -75.0),
        sample(at(8, 5), 123.0, -75.0),
        sample(at(8, 10), 40.01, f64::NAN),
        sample(at(8, 20), 40.01, -75.0),
    ];
    let stats = route_statistics(&samples);
    assert_eq!(stats.total_points, 2);
    assert_eq!(stats.total_distance_km, 1.11);
}

// ── Degenerate windows ──────────────────────────────────────────────────────

#[test]
fn empty_window_is_all_zero() {
    assert_eq!(route_statistics(&[]), RouteStatistics::default());
}

#[test]
fn single_sample_has_no_movement() {
    let stats = route_statistics(&[site(at(8, 0), 40.0, -75.0, "job-1")]);
    assert_eq!(stats.total_points, 1);
    assert_eq!(stats.total_distance_km, 0.0);
    assert_eq!(stats.total_time_minutes, 0);
    assert_eq!(stats.average_speed, 0.0);
    assert_eq!(stats.job_sites_visited, 0);
    assert_eq!(stats.start_time, stats.end_time);
}

#[test]
fn window_filter_is_inclusive() {
    let samples = vec![
        sample(at(7, 0), 39.0, -75.0),
        sample(at(8, 0), 40.0, -75.0),
        sample(at(9, 0), 40.01, -75.0),
        sample(at(10, 0), 41.0, -75.0),
    ];
    let stats = route_statistics_in_window(&samples, at(8, 0), at(9, 0));
    assert_eq!(stats.total_points, 2);
    assert_eq!(stats.total_distance_km, 1.11);
    assert_eq!(stats.total_time_minutes, 60);
}

#[test]
fn unbounded_window_keeps_every_sample() {
    let samples = vec![
        sample(at(9, 0), 40.01, -75.0),
        sample(at(8, 0), 40.0, -75.0),
    ];
    let window = samples_in_window(&samples, DateTime::<Utc>::MIN_UTC, DateTime::<Utc>::MAX_UTC);
    assert_eq!(window, samples);

    let stats =
        route_statistics_in_window(&samples, DateTime::<Utc>::MIN_UTC, DateTime::<Utc>::MAX_UTC);
    assert_eq!(stats, route_statistics(&samples));
    assert!(samples_in_window(&samples, at(10, 0), at(11, 0)).is_empty());
}

#[test]
fn statistics_serialize_for_reporting_view() {
    let samples = vec![sample(at(8, 0), 40.0, -75.0), sample(at(8, 10), 40.01, -75.0)];
    let json = serde_json::to_value(route_statistics(&samples)).unwrap();
    assert_eq!(json["totalPoints"], 2);
    assert_eq!(json["totalDistanceKm"], 1.11);
    assert_eq!(json["totalTimeMinutes"], 10);
    assert_eq!(json["jobSitesVisited"], 0);
    assert_eq!(json["startTime"], "2024-06-10T08:00:00Z");
}

#[test]
fn samples_parse_from_tracker_json() {
    let raw = r#"[
        {"timestamp": "2024-06-10T08:00:00Z", "latitude": 40.0, "longitude": -75.0, "speed": 8.5},
        {"timestamp": "2024-06-10T08:10:00Z", "latitude": 40.01, "longitude": -75.0, "isJobSite": true, "jobId": "job-1"}
    ]"#;
    let samples: Vec<LocationSample> = serde_json::from_str(raw).unwrap();
    assert_eq!(samples[0].speed, Some(8.5));
    assert!(!samples[0].is_job_site);
    assert_eq!(route_statistics(&samples).job_sites_visited, 1);
}

// ── Visits ──────────────────────────────────────────────────────────────────

#[test]
fn consecutive_site_samples_collapse_into_visits() {
    let samples = vec![
        site(at(9, 0), 40.01, -75.0, "job-1"),
        site(at(9, 40), 40.01, -75.0, "job-1"),
        sample(at(10, 0), 40.015, -75.0),
        site(at(10, 30), 40.02, -75.0, "job-2"),
        site(at(11, 30), 40.01, -75.0, "job-1"),
    ];

    let visits = job_site_visits(&samples);

    assert_eq!(
        visits,
        vec![
            SiteVisit {
                job_id: "job-1".to_string(),
                arrived_at: at(9, 0),
                departed_at: at(9, 40),
                dwell_minutes: 40,
                samples: 2,
            },
            SiteVisit {
                job_id: "job-2".to_string(),
                arrived_at: at(10, 30),
                departed_at: at(10, 30),
                dwell_minutes: 0,
                samples: 1,
            },
            SiteVisit {
                job_id: "job-1".to_string(),
                arrived_at: at(11, 30),
                departed_at: at(11, 30),
                dwell_minutes: 0,
                samples: 1,
            },
        ]
    );
}

#[test]
fn no_site_samples_no_visits() {
    let samples = vec![sample(at(8, 0), 40.0, -75.0), sample(at(8, 10), 40.01, -75.0)];
    assert!(job_site_visits(&samples).is_empty());
}
