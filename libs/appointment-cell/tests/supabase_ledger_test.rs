// libs/appointment-cell/tests/supabase_ledger_test.rs

use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveTime, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::models::{Appointment, AppointmentStatus};
use appointment_cell::store::{BookingLedger, SupabaseBookingLedger};
use shared_database::DbError;
use shared_utils::test_utils::TestConfig;

fn ledger_for(server: &MockServer) -> SupabaseBookingLedger {
    SupabaseBookingLedger::new(&TestConfig::with_supabase_url(server.uri()).to_app_config())
}

fn appointment() -> Appointment {
    let now = Utc::now();
    Appointment {
        id: Uuid::new_v4(),
        doctor_id: Uuid::new_v4(),
        patient_id: Uuid::new_v4(),
        date: NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
        start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
        status: AppointmentStatus::Confirmed,
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
async fn insert_echoes_the_stored_row() {
    let server = MockServer::start().await;
    let row = appointment();

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(header("Prefer", "return=representation"))
        .and(body_partial_json(json!({ "status": "confirmed", "start_time": "10:00:00" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([row])))
        .expect(1)
        .mount(&server)
        .await;

    let stored = ledger_for(&server).insert(row.clone()).await.unwrap();
    assert_eq!(stored, row);
}

#[tokio::test]
async fn duplicate_confirmed_start_is_a_unique_violation() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint \"appointments_confirmed_start_key\""
        })))
        .mount(&server)
        .await;

    let result = ledger_for(&server).insert(appointment()).await;
    assert_matches!(result, Err(DbError::UniqueViolation(_)));
}

#[tokio::test]
async fn day_listing_filters_by_doctor_and_date() {
    let server = MockServer::start().await;
    let row = appointment();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("doctor_id", format!("eq.{}", row.doctor_id)))
        .and(query_param("date", "eq.2025-06-02"))
        .and(query_param("order", "start_time.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .expect(1)
        .mount(&server)
        .await;

    let rows = ledger_for(&server)
        .list_for_doctor_on(row.doctor_id, row.date)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, row.id);
}

#[tokio::test]
async fn status_update_patches_only_a_confirmed_row() {
    let server = MockServer::start().await;
    let mut row = appointment();
    row.status = AppointmentStatus::Cancelled;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", row.id)))
        .and(query_param("status", "eq.confirmed"))
        .and(header("Prefer", "return=representation"))
        .and(body_partial_json(json!({ "status": "cancelled" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .expect(1)
        .mount(&server)
        .await;

    let updated = ledger_for(&server)
        .update_status(row.id, AppointmentStatus::Cancelled, Utc::now())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.status, AppointmentStatus::Cancelled);
}

#[tokio::test]
async fn status_update_on_a_closed_row_matches_nothing() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", id)))
        .and(query_param("status", "eq.confirmed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let updated = ledger_for(&server)
        .update_status(id, AppointmentStatus::Completed, Utc::now())
        .await
        .unwrap();
    assert_eq!(updated, None);
}

#[tokio::test]
async fn missing_row_reads_as_none_and_outage_as_unavailable() {
    let server = MockServer::start().await;
    let missing = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", missing)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("patient_id", format!("eq.{}", missing)))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let ledger = ledger_for(&server);
    assert_eq!(ledger.get(missing).await.unwrap(), None);
    assert_matches!(ledger.list_for_patient(missing).await, Err(DbError::Unavailable(_)));
}
