// libs/appointment-cell/tests/handlers_test.rs

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::NaiveDate;
use serde_json::{json, Value};
use tower::ServiceExt;

use appointment_cell::{appointment_routes, AppointmentCellState};
use doctor_cell::{doctor_routes, DoctorCellState};
use shared_utils::clock::{Clock, FixedClock};
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

fn app(config: &TestConfig) -> Router {
    let clock: Arc<dyn Clock> = Arc::new(FixedClock::on(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()));
    let doctors = DoctorCellState::in_memory(config.to_arc(), clock.clone());
    let appointments = AppointmentCellState::in_memory(config.to_arc(), doctors.availability.clone(), clock);

    Router::new()
        .nest("/doctors", doctor_routes(doctors))
        .nest("/appointments", appointment_routes(appointments))
}

async fn call(app: &Router, method: Method, uri: &str, bearer: Option<String>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(bearer) = bearer {
        builder = builder.header("Authorization", bearer);
    }
    let request = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

/// Registers a doctor and generates 2025-06-02..=2025-06-08; returns the doctor id.
async fn scheduled_doctor(app: &Router, config: &TestConfig, doctor: &TestUser, max_per_day: u32) -> String {
    let bearer = JwtTestUtils::bearer(doctor, config);
    let (status, profile) = call(
        app,
        Method::POST,
        "/doctors/profile",
        Some(bearer.clone()),
        Some(json!({
            "specialization": "Cardiology",
            "license_number": format!("LIC-{}", doctor.id),
            "max_patients_per_day": max_per_day
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = call(
        app,
        Method::POST,
        "/doctors/schedule/generate",
        Some(bearer),
        Some(json!({ "start_date": "2025-06-02", "end_date": "2025-06-08" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    profile["id"].as_str().unwrap().to_string()
}

fn booking(doctor_id: &str, date: &str, start: &str, end: &str) -> Value {
    json!({ "doctor_id": doctor_id, "date": date, "start_time": start, "end_time": end })
}

#[tokio::test]
async fn booking_requires_a_token() {
    let config = TestConfig::default();
    let (status, body) = call(
        &app(&config),
        Method::POST,
        "/appointments",
        None,
        Some(booking("00000000-0000-0000-0000-000000000000", "2025-06-02", "10:00:00", "10:30:00")),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn patient_books_and_overlap_is_refused_with_reason() {
    let config = TestConfig::default();
    let app = app(&config);
    let doctor = TestUser::doctor("doc@example.com");
    let doctor_id = scheduled_doctor(&app, &config, &doctor, 10).await;

    let first = TestUser::patient("first@example.com");
    let (status, appointment) = call(
        &app,
        Method::POST,
        "/appointments",
        Some(JwtTestUtils::bearer(&first, &config)),
        Some(booking(&doctor_id, "2025-06-02", "10:00:00", "10:30:00")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(appointment["status"], "confirmed");
    assert_eq!(appointment["patient_id"], first.id.to_string());

    let second = TestUser::patient("second@example.com");
    let (status, body) = call(
        &app,
        Method::POST,
        "/appointments",
        Some(JwtTestUtils::bearer(&second, &config)),
        Some(booking(&doctor_id, "2025-06-02", "10:15:00", "10:45:00")),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "SLOT_TAKEN");

    let (status, day) = call(
        &app,
        Method::GET,
        &format!("/appointments/doctors/{}?date=2025-06-02", doctor_id),
        Some(JwtTestUtils::bearer(&doctor, &config)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(day["total"], 1);
}

#[tokio::test]
async fn validation_failures_name_the_field() {
    let config = TestConfig::default();
    let app = app(&config);
    let doctor_id = scheduled_doctor(&app, &config, &TestUser::doctor("doc@example.com"), 10).await;
    let bearer = JwtTestUtils::bearer(&TestUser::patient("pat@example.com"), &config);

    let (status, body) = call(
        &app,
        Method::POST,
        "/appointments",
        Some(bearer.clone()),
        Some(booking(&doctor_id, "2025-05-30", "10:00:00", "10:30:00")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "date");

    let (status, body) = call(
        &app,
        Method::POST,
        "/appointments",
        Some(bearer.clone()),
        Some(booking(&doctor_id, "2025-06-02", "11:00:00", "10:30:00")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "end_time");

    let (status, body) = call(
        &app,
        Method::POST,
        "/appointments",
        Some(bearer),
        Some(booking(&doctor_id, "2025-06-02", "08:00:00", "08:30:00")),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "OUTSIDE_WORKING_HOURS");
}

#[tokio::test]
async fn leave_day_booking_reports_doctor_on_leave() {
    let config = TestConfig::default();
    let app = app(&config);
    let doctor = TestUser::doctor("doc@example.com");
    let doctor_id = scheduled_doctor(&app, &config, &doctor, 10).await;

    let (status, _) = call(
        &app,
        Method::POST,
        "/doctors/leaves",
        Some(JwtTestUtils::bearer(&doctor, &config)),
        Some(json!({ "date": "2025-06-04", "reason": "Conference" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = call(
        &app,
        Method::POST,
        "/appointments",
        Some(JwtTestUtils::bearer(&TestUser::patient("pat@example.com"), &config)),
        Some(booking(&doctor_id, "2025-06-04", "10:00:00", "10:30:00")),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "DOCTOR_ON_LEAVE");
}

#[tokio::test]
async fn patient_cancels_and_lists_own_appointments() {
    let config = TestConfig::default();
    let app = app(&config);
    let doctor = TestUser::doctor("doc@example.com");
    let doctor_id = scheduled_doctor(&app, &config, &doctor, 1).await;
    let patient = TestUser::patient("pat@example.com");
    let bearer = JwtTestUtils::bearer(&patient, &config);

    let (_, appointment) = call(
        &app,
        Method::POST,
        "/appointments",
        Some(bearer.clone()),
        Some(booking(&doctor_id, "2025-06-03", "12:00:00", "12:30:00")),
    )
    .await;
    let appointment_id = appointment["id"].as_str().unwrap().to_string();

    let (status, body) = call(
        &app,
        Method::POST,
        "/appointments",
        Some(bearer.clone()),
        Some(booking(&doctor_id, "2025-06-03", "15:00:00", "15:30:00")),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "DAILY_CAP_EXCEEDED");

    let (status, mine) = call(&app, Method::GET, "/appointments/mine", Some(bearer.clone()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine["total"], 1);

    let (status, cancelled) = call(
        &app,
        Method::PATCH,
        &format!("/appointments/{}/status", appointment_id),
        Some(bearer.clone()),
        Some(json!({ "status": "cancelled" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");

    let (status, body) = call(
        &app,
        Method::PATCH,
        &format!("/appointments/{}/status", appointment_id),
        Some(JwtTestUtils::bearer(&doctor, &config)),
        Some(json!({ "status": "completed" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_TRANSITION");

    // The cap counts confirmed appointments only.
    let (status, _) = call(
        &app,
        Method::POST,
        "/appointments",
        Some(bearer),
        Some(booking(&doctor_id, "2025-06-03", "15:00:00", "15:30:00")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn strangers_cannot_read_an_appointment() {
    let config = TestConfig::default();
    let app = app(&config);
    let doctor_id = scheduled_doctor(&app, &config, &TestUser::doctor("doc@example.com"), 10).await;

    let (_, appointment) = call(
        &app,
        Method::POST,
        "/appointments",
        Some(JwtTestUtils::bearer(&TestUser::patient("owner@example.com"), &config)),
        Some(booking(&doctor_id, "2025-06-05", "10:00:00", "10:30:00")),
    )
    .await;

    let (status, body) = call(
        &app,
        Method::GET,
        &format!("/appointments/{}", appointment["id"].as_str().unwrap()),
        Some(JwtTestUtils::bearer(&TestUser::patient("stranger@example.com"), &config)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");
}
