use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::*;
use shared_database::{DatabaseError, SupabaseClient};
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

fn appointment(doctor_id: Uuid) -> Appointment {
    let start = Utc.with_ymd_and_hms(2030, 1, 7, 9, 0, 0).unwrap();
    Appointment {
        id: Uuid::new_v4(),
        patient_id: Uuid::new_v4(),
        doctor_id,
        start_at: start,
        end_at: start + Duration::minutes(30),
        status: AppointmentStatus::Scheduled,
        appointment_type: AppointmentType::InPerson,
        meeting_link: None,
        reason: None,
        notes: None,
        cancellation_reason: None,
        cancelled_at: None,
        cancelled_by: None,
        completed_at: None,
        reminder_sent_at: None,
        created_by: None,
        updated_by: None,
        created_at: start - Duration::days(1),
        updated_at: start - Duration::days(1),
    }
}

fn store_for(server: &MockServer) -> SupabaseAppointmentStore {
    let config = TestConfig::with_supabase_url(&server.uri()).to_app_config();
    SupabaseAppointmentStore::new(Arc::new(SupabaseClient::new(&config)))
}

#[tokio::test]
async fn insert_returns_stored_representation() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let row = appointment(doctor_id);

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(header("Prefer", "return=representation"))
        .and(body_partial_json(json!({ "doctor_id": doctor_id, "status": "scheduled" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([row])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let stored = store_for(&mock_server).insert(&row).await.unwrap();
    assert_eq!(stored, row);
}

#[tokio::test]
async fn duplicate_slot_surfaces_as_unique_violation() {
    let mock_server = MockServer::start().await;
    let row = appointment(Uuid::new_v4());

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(MockSupabaseResponses::error_response(
            "duplicate key value violates unique constraint",
            "23505",
        )))
        .mount(&mock_server)
        .await;

    let result = store_for(&mock_server).insert(&row).await;
    assert_matches!(result, Err(DatabaseError::UniqueViolation(_)));

    let mapped: AppointmentError = result.unwrap_err().into();
    assert_matches!(mapped, AppointmentError::Conflict(_));
}

#[tokio::test]
async fn overlap_query_filters_scheduled_rows_of_the_doctor() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let exclude = Uuid::new_v4();
    let row = appointment(doctor_id);

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .and(query_param("status", "eq.scheduled"))
        .and(query_param("start_at", "lt.2030-01-07T09:45:00Z"))
        .and(query_param("end_at", "gt.2030-01-07T09:15:00Z"))
        .and(query_param("id", format!("neq.{}", exclude)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let start = Utc.with_ymd_and_hms(2030, 1, 7, 9, 15, 0).unwrap();
    let found = store_for(&mock_server)
        .find_overlapping(doctor_id, start, start + Duration::minutes(30), Some(exclude))
        .await
        .unwrap();

    assert_eq!(found.len(), 1);
}

#[tokio::test]
async fn overlap_query_keeps_sub_second_bounds() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let mut existing = appointment(doctor_id);
    existing.start_at = Utc.with_ymd_and_hms(2030, 1, 7, 10, 30, 0).unwrap() + Duration::milliseconds(200);
    existing.end_at = existing.start_at + Duration::minutes(30);

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .and(query_param("start_at", "lt.2030-01-07T10:30:00.500Z"))
        .and(query_param("end_at", "gt.2030-01-07T10:00:00.500Z"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([existing])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let start = Utc.with_ymd_and_hms(2030, 1, 7, 10, 0, 0).unwrap() + Duration::milliseconds(500);
    let found = store_for(&mock_server)
        .find_overlapping(doctor_id, start, start + Duration::minutes(30), None)
        .await
        .unwrap();

    assert_eq!(found.len(), 1);
}

#[tokio::test]
async fn reminder_window_query_requires_unsent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "eq.scheduled"))
        .and(query_param("reminder_sent_at", "is.null"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let from = Utc.with_ymd_and_hms(2030, 1, 7, 8, 0, 0).unwrap();
    let found = store_for(&mock_server)
        .find_by_window(AppointmentStatus::Scheduled, from..from + Duration::hours(1), true)
        .await
        .unwrap();

    assert!(found.is_empty());
}

#[tokio::test]
async fn daily_count_reads_content_range() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    Mock::given(method("HEAD"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .and(query_param("status", "in.(scheduled,completed)"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-range", "0-0/3"))
        .mount(&mock_server)
        .await;

    let count = store_for(&mock_server)
        .count_by_doctor_and_day(doctor_id, NaiveDate::from_ymd_opt(2030, 1, 7).unwrap())
        .await
        .unwrap();

    assert_eq!(count, 3);
}

#[tokio::test]
async fn mark_reminder_sent_is_conditional() {
    let mock_server = MockServer::start().await;
    let row = appointment(Uuid::new_v4());
    let mut stamped = row.clone();
    stamped.reminder_sent_at = Some(Utc::now());

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", row.id)))
        .and(query_param("reminder_sent_at", "is.null"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([stamped])))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let store = store_for(&mock_server);
    assert!(store.mark_reminder_sent(row.id, Utc::now()).await.unwrap());
    assert!(!store.mark_reminder_sent(row.id, Utc::now()).await.unwrap());
}

#[tokio::test]
async fn update_of_non_scheduled_row_returns_none() {
    let mock_server = MockServer::start().await;
    let id = Uuid::new_v4();

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", id)))
        .and(query_param("status", "eq.scheduled"))
        .and(body_partial_json(json!({ "status": "cancelled" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let mut changes = AppointmentChanges::new(None, Utc::now());
    changes.status = Some(AppointmentStatus::Cancelled);

    let updated = store_for(&mock_server).update_by_id(id, &changes).await.unwrap();
    assert!(updated.is_none());
}

#[tokio::test]
async fn server_errors_are_reported() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock_server)
        .await;

    let result = store_for(&mock_server).find_by_id(Uuid::new_v4()).await;
    assert_matches!(result, Err(DatabaseError::Api { status: 500, .. }));
}
