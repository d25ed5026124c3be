//! Tests for work-day and leave/overtime exception resolution.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use dispatch_engine::exceptions::{
    resolve_tracking_at, retention_cutoff, tracking_calendar, ExceptionKind, TrackingReason,
    WorkDays,
};
use dispatch_engine::{
    resolve_tracking, DispatchError, ScheduleException, SchedulingSettings, TrackingDecision,
};

// ── Helpers ─────────────────────────────────────────────────────────────────

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn exception(kind: ExceptionKind, start: NaiveDate, end: NaiveDate) -> ScheduleException {
    ScheduleException {
        technician_id: Some("tech-1".to_string()),
        kind,
        start_date: start,
        end_date: end,
        description: None,
    }
}

fn off(reason: TrackingReason) -> TrackingDecision {
    TrackingDecision {
        should_track: false,
        reason,
        overtime: false,
    }
}

// 2024-06-07 Fri, 2024-06-08 Sat, 2024-06-09 Sun, 2024-06-10 Mon.
fn monday() -> NaiveDate {
    date(2024, 6, 10)
}

// ── Company-wide rules ──────────────────────────────────────────────────────

#[test]
fn saturday_is_not_a_work_day() {
    let settings = SchedulingSettings::default();
    let decision = resolve_tracking(&settings, &[], date(2024, 6, 8));
    assert_eq!(decision, off(TrackingReason::NotWorkDay));
}

#[test]
fn plain_weekday_is_a_normal_workday() {
    let settings = SchedulingSettings::default();
    let decision = resolve_tracking(&settings, &[], monday());
    assert!(decision.should_track);
    assert_eq!(decision.reason, TrackingReason::NormalWorkday);
    assert!(!decision.overtime);
}

#[test]
fn disabled_tracking_wins_over_everything() {
    let settings = SchedulingSettings {
        auto_tracking_enabled: false,
        ..SchedulingSettings::default()
    };
    let overtime = [exception(ExceptionKind::Overtime, monday(), monday())];
    assert_eq!(
        resolve_tracking(&settings, &overtime, monday()),
        off(TrackingReason::AutoTrackingDisabled)
    );
}

#[test]
fn custom_work_days() {
    let settings = SchedulingSettings {
        work_days: WorkDays::from_days([Weekday::Sat, Weekday::Sun]),
        ..SchedulingSettings::default()
    };
    assert!(resolve_tracking(&settings, &[], date(2024, 6, 8)).should_track);
    assert_eq!(
        resolve_tracking(&settings, &[], monday()),
        off(TrackingReason::NotWorkDay)
    );
}

// ── Exceptions ──────────────────────────────────────────────────────────────

#[test]
fn leave_types_report_their_own_reason() {
    let settings = SchedulingSettings::default();
    for (kind, reason) in [
        (ExceptionKind::SickDay, TrackingReason::SickDay),
        (ExceptionKind::Vacation, TrackingReason::Vacation),
        (ExceptionKind::OffDay, TrackingReason::OffDay),
    ] {
        let exceptions = [exception(kind, monday(), monday())];
        assert_eq!(resolve_tracking(&settings, &exceptions, monday()), off(reason));
    }
}

#[test]
fn overtime_marks_day_as_overtime() {
    let settings = SchedulingSettings::default();
    let exceptions = [exception(ExceptionKind::Overtime, monday(), monday())];
    assert_eq!(
        resolve_tracking(&settings, &exceptions, monday()),
        TrackingDecision {
            should_track: true,
            reason: TrackingReason::Overtime,
            overtime: true,
        }
    );
}

#[test]
fn leave_beats_overtime_in_either_order() {
    let settings = SchedulingSettings::default();
    let off_day = exception(ExceptionKind::OffDay, monday(), monday());
    let overtime = exception(ExceptionKind::Overtime, monday(), monday());

    let leave_first = [off_day.clone(), overtime.clone()];
    let overtime_first = [overtime, off_day];

    assert_eq!(
        resolve_tracking(&settings, &leave_first, monday()),
        off(TrackingReason::OffDay)
    );
    assert_eq!(
        resolve_tracking(&settings, &overtime_first, monday()),
        off(TrackingReason::OffDay)
    );
}

#[test]
fn first_leave_in_input_order_supplies_the_reason() {
    let settings = SchedulingSettings::default();
    let exceptions = [
        exception(ExceptionKind::SickDay, monday(), monday()),
        exception(ExceptionKind::Vacation, date(2024, 6, 3), date(2024, 6, 14)),
    ];
    assert_eq!(
        resolve_tracking(&settings, &exceptions, monday()),
        off(TrackingReason::SickDay)
    );
}

#[test]
fn overtime_does_not_open_a_non_work_day() {
    let settings = SchedulingSettings::default();
    let saturday = date(2024, 6, 8);
    let exceptions = [exception(ExceptionKind::Overtime, saturday, saturday)];
    assert_eq!(
        resolve_tracking(&settings, &exceptions, saturday),
        off(TrackingReason::NotWorkDay)
    );
}

#[test]
fn ranges_are_inclusive_and_inverted_ranges_cover_nothing() {
    let settings = SchedulingSettings::default();
    let vacation = [exception(ExceptionKind::Vacation, date(2024, 6, 3), monday())];
    assert_eq!(
        resolve_tracking(&settings, &vacation, monday()),
        off(TrackingReason::Vacation)
    );
    assert!(resolve_tracking(&settings, &vacation, date(2024, 6, 11)).should_track);

    let inverted = [exception(ExceptionKind::Vacation, date(2024, 6, 14), date(2024, 6, 3))];
    assert!(resolve_tracking(&settings, &inverted, monday()).should_track);
}

// ── Wire format ─────────────────────────────────────────────────────────────

#[test]
fn settings_parse_from_admin_json() {
    let raw = r#"{
        "autoTrackingEnabled": true,
        "businessHoursStart": "07:30",
        "businessHoursEnd": "5:00 PM",
        "workDays": ["Monday", "tue", "WEDNESDAY"],
        "retentionDays": 14,
        "timezone": "America/Chicago"
    }"#;
    let settings: SchedulingSettings = serde_json::from_str(raw).unwrap();

    assert_eq!(settings.business_hours_start, NaiveTime::from_hms_opt(7, 30, 0).unwrap());
    assert_eq!(settings.business_minutes(), (450, 1020));
    assert!(settings.work_days.contains(Weekday::Tue));
    assert!(!settings.work_days.contains(Weekday::Thu));
    assert_eq!(settings.retention_days, 14);
    assert!(settings.tz().is_ok());

    let back = serde_json::to_value(&settings).unwrap();
    assert_eq!(back["businessHoursEnd"], "17:00");
    assert_eq!(
        back["workDays"],
        serde_json::json!(["monday", "tuesday", "wednesday"])
    );
}

#[test]
fn missing_settings_fields_use_defaults() {
    let settings: SchedulingSettings = serde_json::from_str("{}").unwrap();
    assert_eq!(settings, SchedulingSettings::default());
    assert_eq!(settings.business_minutes(), (480, 1020));
    assert_eq!(settings.work_days, WorkDays::weekdays());
}

#[test]
fn bad_settings_values_are_rejected() {
    assert!(serde_json::from_str::<SchedulingSettings>(r#"{"workDays": ["Funday"]}"#).is_err());
    assert!(
        serde_json::from_str::<SchedulingSettings>(r#"{"businessHoursStart": "noonish"}"#)
            .is_err()
    );
}

#[test]
fn exception_parses_with_type_field() {
    let raw = r#"{"type": "sick_day", "startDate": "2024-06-10", "endDate": "2024-06-12", "description": "flu"}"#;
    let parsed: ScheduleException = serde_json::from_str(raw).unwrap();
    assert_eq!(parsed.kind, ExceptionKind::SickDay);
    assert!(parsed.covers(date(2024, 6, 12)));
    assert!(!parsed.covers(date(2024, 6, 13)));
}

#[test]
fn decision_json_omits_overtime_unless_set() {
    let normal = resolve_tracking(&SchedulingSettings::default(), &[], monday());
    assert_eq!(
        serde_json::to_value(normal).unwrap(),
        serde_json::json!({"shouldTrack": true, "reason": "normal_workday"})
    );

    let exceptions = [exception(ExceptionKind::Overtime, monday(), monday())];
    let overtime = resolve_tracking(&SchedulingSettings::default(), &exceptions, monday());
    assert_eq!(
        serde_json::to_value(overtime).unwrap(),
        serde_json::json!({"shouldTrack": true, "reason": "overtime", "overtime": true})
    );
}

// ── Instants, calendars, retention ──────────────────────────────────────────

fn pacific() -> SchedulingSettings {
    SchedulingSettings {
        timezone: Some("America/Los_Angeles".to_string()),
        ..SchedulingSettings::default()
    }
}

#[test]
fn instant_is_read_on_company_clock() {
    let settings = pacific();
    // Monday 03:00 UTC is Sunday 20:00 in Los Angeles.
    let sunday_evening = Utc.with_ymd_and_hms(2024, 6, 10, 3, 0, 0).unwrap();
    assert_eq!(
        resolve_tracking_at(&settings, &[], sunday_evening).unwrap(),
        off(TrackingReason::NotWorkDay)
    );

    // Monday 16:00 UTC is 09:00 PDT.
    let monday_morning = Utc.with_ymd_and_hms(2024, 6, 10, 16, 0, 0).unwrap();
    assert_eq!(
        resolve_tracking_at(&settings, &[], monday_morning).unwrap().reason,
        TrackingReason::NormalWorkday
    );
}

#[test]
fn outside_business_hours_is_not_tracked_unless_overtime() {
    let settings = pacific();
    // Tuesday 02:00 UTC is Monday 19:00 PDT.
    let monday_evening = Utc.with_ymd_and_hms(2024, 6, 11, 2, 0, 0).unwrap();
    assert_eq!(
        resolve_tracking_at(&settings, &[], monday_evening).unwrap(),
        off(TrackingReason::OutsideBusinessHours)
    );

    let exceptions = [exception(ExceptionKind::Overtime, monday(), monday())];
    let decision = resolve_tracking_at(&settings, &exceptions, monday_evening).unwrap();
    assert!(decision.should_track);
    assert!(decision.overtime);
}

#[test]
fn unknown_timezone_is_an_error() {
    let settings = SchedulingSettings {
        timezone: Some("Mars/Olympus_Mons".to_string()),
        ..SchedulingSettings::default()
    };
    let now = Utc.with_ymd_and_hms(2024, 6, 10, 16, 0, 0).unwrap();
    assert!(matches!(
        resolve_tracking_at(&settings, &[], now),
        Err(DispatchError::InvalidTimezone(_))
    ));
}

#[test]
fn calendar_covers_each_day_in_range() {
    let settings = SchedulingSettings::default();
    let exceptions = [exception(ExceptionKind::Vacation, monday(), monday())];
    let days = tracking_calendar(&settings, &exceptions, date(2024, 6, 7), monday());

    let summary: Vec<(NaiveDate, bool, TrackingReason)> = days
        .iter()
        .map(|d| (d.date, d.decision.should_track, d.decision.reason))
        .collect();
    assert_eq!(
        summary,
        vec![
            (date(2024, 6, 7), true, TrackingReason::NormalWorkday),
            (date(2024, 6, 8), false, TrackingReason::NotWorkDay),
            (date(2024, 6, 9), false, TrackingReason::NotWorkDay),
            (monday(), false, TrackingReason::Vacation),
        ]
    );

    assert!(tracking_calendar(&settings, &[], monday(), date(2024, 6, 7)).is_empty());
}

#[test]
fn retention_cutoff_counts_back_retention_days() {
    let settings = SchedulingSettings::default();
    let now = Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap();
    assert_eq!(retention_cutoff(&settings, now), now - Duration::days(30));
}

#[test]
fn retention_cutoff_saturates_at_calendar_start() {
    let settings = SchedulingSettings {
        retention_days: u32::MAX,
        ..SchedulingSettings::default()
    };
    let now = Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap();
    assert_eq!(retention_cutoff(&settings, now), DateTime::<Utc>::MIN_UTC);
}
