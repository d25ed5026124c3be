//! Property-based tests for the conflict detector.

use dispatch_engine::{check_availability, BookingRequest, DurationInput, ExistingJob};
use proptest::prelude::*;

fn clock(minute: u32) -> String {
    format!("{:02}:{:02}", minute / 60, minute % 60)
}

fn job(id: &str, start: u32, duration: u32) -> ExistingJob {
    ExistingJob {
        id: id.to_string(),
        assigned_to: Some("tech".to_string()),
        date: Some("2024-06-10".to_string()),
        time: Some(clock(start)),
        duration: Some(DurationInput::from(duration)),
        ..ExistingJob::default()
    }
}

fn candidate(start: u32, duration: u32, buffer: u32) -> BookingRequest {
    BookingRequest {
        technician_id: Some("tech".to_string()),
        date: Some("2024-06-10".to_string()),
        time: Some(clock(start)),
        duration: Some(DurationInput::from(duration)),
        buffer_minutes: Some(buffer),
        exclude_job_id: None,
    }
}

// Durations above 10 so bare numbers are read as minutes.
fn arb_slot() -> impl Strategy<Value = (u32, u32)> {
    (0u32..1200, 11u32..=240)
}

proptest! {
    #[test]
    fn overlap_is_symmetric((a_start, a_dur) in arb_slot(), (b_start, b_dur) in arb_slot(), buffer in 0u32..=30) {
        let a_vs_b = check_availability(&candidate(b_start, b_dur, buffer), &[job("a", a_start, a_dur)]);
        let b_vs_a = check_availability(&candidate(a_start, a_dur, buffer), &[job("b", b_start, b_dur)]);
        prop_assert_eq!(a_vs_b.has_conflict, b_vs_a.has_conflict);
        if a_vs_b.has_conflict {
            prop_assert_eq!(a_vs_b.conflicts[0].overlap_minutes, b_vs_a.conflicts[0].overlap_minutes);
        }
    }

    #[test]
    fn excluded_job_is_never_listed((start, dur) in arb_slot(), others in proptest::collection::vec(arb_slot(), 0..6)) {
        let mut existing = vec![job("self", start, dur)];
        existing.extend(others.iter().enumerate().map(|(i, (s, d))| job(&format!("other-{}", i), *s, *d)));

        let mut edit = candidate(start, dur, 15);
        edit.exclude_job_id = Some("self".to_string());

        let report = check_availability(&edit, &existing);
        prop_assert!(report.conflicts.iter().all(|c| c.job_id != "self"));
        prop_assert_eq!(report.has_conflict, !report.conflicts.is_empty());
    }
}
