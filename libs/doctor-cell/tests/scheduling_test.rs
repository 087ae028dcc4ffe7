// libs/doctor-cell/tests/scheduling_test.rs

use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveTime, Weekday};

use doctor_cell::models::{
    CreateDoctorRequest, CreateLeaveRequest, DoctorError, GenerateScheduleRequest, WeeklyPatternRequest,
    REST_DAY_LEAVE_REASON,
};
use doctor_cell::{DoctorCellState, DoctorProfile};
use shared_config::AppConfig;
use shared_utils::clock::FixedClock;
use shared_utils::test_utils::{TestConfig, TestUser};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn state_with(config: AppConfig, today: NaiveDate) -> DoctorCellState {
    DoctorCellState::in_memory(Arc::new(config), Arc::new(FixedClock::on(today)))
}

fn state_on(today: NaiveDate) -> DoctorCellState {
    state_with(TestConfig::default().to_app_config(), today)
}

async fn register(state: &DoctorCellState, user: &TestUser) -> DoctorProfile {
    state
        .doctors
        .create_doctor(
            &user.to_principal(),
            CreateDoctorRequest {
                specialization: "Cardiology".to_string(),
                specialization_description: None,
                degree: Some("MBBS".to_string()),
                license_number: format!("LIC-{}", user.id),
                years_of_experience: Some(5),
                consultation_fee_cents: Some(50_00),
                profile_description: None,
                max_patients_per_day: None,
            },
        )
        .await
        .unwrap()
}

fn range(start: NaiveDate, end: NaiveDate) -> GenerateScheduleRequest {
    GenerateScheduleRequest {
        start_date: Some(start),
        end_date: Some(end),
    }
}

#[tokio::test]
async fn full_week_skips_the_rest_day() {
    let state = state_on(date(2025, 6, 1));
    let profile = register(&state, &TestUser::doctor("doc@example.com")).await;

    let entries = state
        .scheduler
        .generate(&profile.doctor, range(date(2025, 6, 2), date(2025, 6, 8)))
        .await
        .unwrap();

    assert_eq!(entries.len(), 6);
    let dates: Vec<NaiveDate> = entries.iter().filter_map(|e| e.date).collect();
    assert_eq!(dates, (2..=7).map(|d| date(2025, 6, d)).collect::<Vec<_>>());
    assert!(entries.iter().all(|e| e.start_time == time(10, 0) && e.end_time == time(18, 0) && e.is_active));
    assert_eq!(entries.iter().map(|e| e.day_of_week).collect::<Vec<_>>(), vec![0, 1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn regenerating_updates_rows_instead_of_duplicating() {
    let state = state_on(date(2025, 6, 1));
    let profile = register(&state, &TestUser::doctor("doc@example.com")).await;
    let doctor = &profile.doctor;

    let first = state
        .scheduler
        .generate(doctor, range(date(2025, 6, 2), date(2025, 6, 8)))
        .await
        .unwrap();
    let second = state
        .scheduler
        .generate(doctor, range(date(2025, 6, 4), date(2025, 6, 11)))
        .await
        .unwrap();

    // Overlapping dates keep their ids.
    let first_wednesday = first.iter().find(|e| e.date == Some(date(2025, 6, 4))).unwrap();
    let second_wednesday = second.iter().find(|e| e.date == Some(date(2025, 6, 4))).unwrap();
    assert_eq!(first_wednesday.id, second_wednesday.id);

    let stored = state
        .availability
        .list_schedule(doctor.id, date(2025, 6, 1), date(2025, 6, 30))
        .await
        .unwrap();
    // Mon 2 .. Sat 7, then Mon 9 .. Wed 11.
    assert_eq!(stored.len(), 9);
}

#[tokio::test]
async fn missing_bounds_default_to_today_and_week_end() {
    // Wednesday
    let state = state_on(date(2025, 6, 4));
    let profile = register(&state, &TestUser::doctor("doc@example.com")).await;

    let entries = state
        .scheduler
        .generate(&profile.doctor, GenerateScheduleRequest::default())
        .await
        .unwrap();

    let dates: Vec<NaiveDate> = entries.iter().filter_map(|e| e.date).collect();
    assert_eq!(dates, vec![date(2025, 6, 4), date(2025, 6, 5), date(2025, 6, 6), date(2025, 6, 7)]);
}

#[tokio::test]
async fn rejects_inverted_and_oversized_ranges() {
    let state = state_on(date(2025, 6, 1));
    let profile = register(&state, &TestUser::doctor("doc@example.com")).await;

    let inverted = state
        .scheduler
        .generate(&profile.doctor, range(date(2025, 6, 8), date(2025, 6, 2)))
        .await;
    assert_matches!(inverted, Err(DoctorError::Validation { field: "end_date", .. }));

    let oversized = state
        .scheduler
        .generate(&profile.doctor, range(date(2025, 6, 2), date(2026, 6, 2)))
        .await;
    assert_matches!(oversized, Err(DoctorError::Validation { field: "end_date", .. }));
}

#[tokio::test]
async fn inactive_doctor_cannot_generate() {
    let state = state_on(date(2025, 6, 1));
    let user = TestUser::doctor("doc@example.com");
    let profile = register(&state, &user).await;
    let doctor = state.doctors.deactivate(&user.to_principal(), profile.doctor.id).await.unwrap();

    let result = state
        .scheduler
        .generate(&doctor, range(date(2025, 6, 2), date(2025, 6, 8)))
        .await;
    assert_matches!(result, Err(DoctorError::Inactive(id)) if id == doctor.id);
}

#[tokio::test]
async fn auto_leave_records_one_leave_per_rest_date() {
    let mut config = TestConfig::default().to_app_config();
    config.scheduling.rest_days = vec![Weekday::Sat, Weekday::Sun];
    config.scheduling.auto_leave_on_rest_days = true;
    let state = state_with(config, date(2025, 6, 1));
    let profile = register(&state, &TestUser::doctor("doc@example.com")).await;
    let doctor = &profile.doctor;

    for _ in 0..2 {
        let entries = state
            .scheduler
            .generate(doctor, range(date(2025, 6, 2), date(2025, 6, 8)))
            .await
            .unwrap();
        assert_eq!(entries.len(), 5);
    }

    let leaves = state.availability.list_leaves(doctor.id).await.unwrap();
    assert_eq!(leaves.iter().map(|l| l.date).collect::<Vec<_>>(), vec![date(2025, 6, 7), date(2025, 6, 8)]);
    assert!(leaves.iter().all(|l| l.reason.as_deref() == Some(REST_DAY_LEAVE_REASON)));
}

#[tokio::test]
async fn auto_leave_keeps_an_existing_leave() {
    let mut config = TestConfig::default().to_app_config();
    config.scheduling.auto_leave_on_rest_days = true;
    let state = state_with(config, date(2025, 6, 1));
    let profile = register(&state, &TestUser::doctor("doc@example.com")).await;
    let doctor = &profile.doctor;

    state
        .availability
        .create_leave(
            doctor,
            CreateLeaveRequest {
                date: date(2025, 6, 8),
                reason: Some("Conference".to_string()),
            },
        )
        .await
        .unwrap();

    state
        .scheduler
        .generate(doctor, range(date(2025, 6, 2), date(2025, 6, 8)))
        .await
        .unwrap();

    let leaves = state.availability.list_leaves(doctor.id).await.unwrap();
    assert_eq!(leaves.len(), 1);
    assert_eq!(leaves[0].reason.as_deref(), Some("Conference"));
}

#[tokio::test]
async fn recurring_pattern_shapes_generated_rows() {
    let state = state_on(date(2025, 6, 1));
    let profile = register(&state, &TestUser::doctor("doc@example.com")).await;
    let doctor = &profile.doctor;

    // Tuesdays 08:00-12:00, Wednesdays off.
    state
        .availability
        .set_weekly_pattern(
            doctor,
            WeeklyPatternRequest {
                day_of_week: 1,
                start_time: time(8, 0),
                end_time: time(12, 0),
                is_active: true,
            },
        )
        .await
        .unwrap();
    state
        .availability
        .set_weekly_pattern(
            doctor,
            WeeklyPatternRequest {
                day_of_week: 2,
                start_time: time(10, 0),
                end_time: time(18, 0),
                is_active: false,
            },
        )
        .await
        .unwrap();

    let entries = state
        .scheduler
        .generate(doctor, range(date(2025, 6, 2), date(2025, 6, 8)))
        .await
        .unwrap();

    assert_eq!(entries.len(), 5);
    assert!(entries.iter().all(|e| e.date != Some(date(2025, 6, 4))));
    let tuesday = entries.iter().find(|e| e.date == Some(date(2025, 6, 3))).unwrap();
    assert_eq!((tuesday.start_time, tuesday.end_time), (time(8, 0), time(12, 0)));
}
