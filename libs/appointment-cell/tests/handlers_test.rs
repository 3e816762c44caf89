use std::sync::Arc;

use assert_matches::assert_matches;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use axum_extra::TypedHeader;
use chrono::{Duration, Utc};
use headers::{authorization::Bearer, Authorization};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::handlers::{
    cancel_appointment, create_appointment, get_all, get_appointment, get_by_date, get_pending,
    get_upcoming, update_appointment,
};
use appointment_cell::models::{
    CreateAppointmentRequest, DateQuery, PageQuery, UpdateAppointmentRequest,
};
use cache_cell::AppState;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig, TestUser};

fn auth_header() -> TypedHeader<Authorization<Bearer>> {
    TypedHeader(Authorization::bearer("test-token").unwrap())
}

fn test_state(mock_server: &MockServer) -> Arc<AppState> {
    let config = TestConfig::with_base_url(&mock_server.uri());
    AppState::for_tests(config.to_app_config())
}

fn user_extension(test_user: &TestUser) -> Extension<User> {
    Extension(test_user.to_user())
}

async fn mock_doctor_exists(mock_server: &MockServer, doctor_id: &Uuid) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": doctor_id.to_string() }
        ])))
        .mount(mock_server)
        .await;
}

async fn mock_no_overlap(mock_server: &MockServer, doctor_id: &Uuid) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn booking_a_free_slot_succeeds() {
    let mock_server = MockServer::start().await;
    let state = test_state(&mock_server);
    let patient = TestUser::patient("patient@example.com");
    let doctor_id = Uuid::new_v4();

    let start = Utc::now() + Duration::hours(96);
    let end = start + Duration::minutes(30);

    mock_doctor_exists(&mock_server, &doctor_id).await;
    mock_no_overlap(&mock_server, &doctor_id).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::appointment_row(
                7,
                &patient.id,
                &doctor_id.to_string(),
                &start.to_rfc3339(),
                &end.to_rfc3339(),
                "pending",
            )
        ])))
        .mount(&mock_server)
        .await;

    let result = create_appointment(
        State(state),
        user_extension(&patient),
        auth_header(),
        Json(CreateAppointmentRequest {
            doctor_id,
            start_time: start,
            telephonic: false,
        }),
    )
    .await;

    let (status, body) = result.unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body.0["success"], true);
    assert_eq!(body.0["appointment"]["id"], 7);
    assert_eq!(body.0["appointment"]["status"], "pending");

    let booked_start: chrono::DateTime<Utc> =
        serde_json::from_value(body.0["appointment"]["start_time"].clone()).unwrap();
    let booked_end: chrono::DateTime<Utc> =
        serde_json::from_value(body.0["appointment"]["end_time"].clone()).unwrap();
    assert_eq!(booked_end, booked_start + Duration::minutes(30));
}

#[tokio::test]
async fn doctors_cannot_book_appointments() {
    let mock_server = MockServer::start().await;
    let state = test_state(&mock_server);
    let doctor = TestUser::doctor("doctor@example.com");

    let result = create_appointment(
        State(state),
        user_extension(&doctor),
        auth_header(),
        Json(CreateAppointmentRequest {
            doctor_id: Uuid::new_v4(),
            start_time: Utc::now() + Duration::hours(96),
            telephonic: false,
        }),
    )
    .await;

    assert_matches!(result, Err(AppError::Forbidden(_)));
}

#[tokio::test]
async fn booking_in_the_past_is_rejected() {
    let mock_server = MockServer::start().await;
    let state = test_state(&mock_server);
    let patient = TestUser::patient("patient@example.com");
    let doctor_id = Uuid::new_v4();

    mock_doctor_exists(&mock_server, &doctor_id).await;

    let result = create_appointment(
        State(state),
        user_extension(&patient),
        auth_header(),
        Json(CreateAppointmentRequest {
            doctor_id,
            start_time: Utc::now() - Duration::hours(1),
            telephonic: false,
        }),
    )
    .await;

    assert_matches!(result, Err(AppError::BadRequest(_)));
}

#[tokio::test]
async fn unknown_doctor_wins_over_past_date() {
    let mock_server = MockServer::start().await;
    let state = test_state(&mock_server);
    let patient = TestUser::patient("patient@example.com");

    // Doctor existence is validated first, so a request that is wrong on
    // both counts still reports the missing doctor.
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let result = create_appointment(
        State(state),
        user_extension(&patient),
        auth_header(),
        Json(CreateAppointmentRequest {
            doctor_id: Uuid::new_v4(),
            start_time: Utc::now() - Duration::hours(1),
            telephonic: false,
        }),
    )
    .await;

    assert_matches!(result, Err(AppError::NotFound(_)));
}

#[tokio::test]
async fn booking_an_unknown_doctor_is_not_found() {
    let mock_server = MockServer::start().await;
    let state = test_state(&mock_server);
    let patient = TestUser::patient("patient@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let result = create_appointment(
        State(state),
        user_extension(&patient),
        auth_header(),
        Json(CreateAppointmentRequest {
            doctor_id: Uuid::new_v4(),
            start_time: Utc::now() + Duration::hours(96),
            telephonic: false,
        }),
    )
    .await;

    assert_matches!(result, Err(AppError::NotFound(_)));
}

#[tokio::test]
async fn booking_an_occupied_slot_conflicts() {
    let mock_server = MockServer::start().await;
    let state = test_state(&mock_server);
    let patient = TestUser::patient("patient@example.com");
    let doctor_id = Uuid::new_v4();

    mock_doctor_exists(&mock_server, &doctor_id).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 3 }
        ])))
        .mount(&mock_server)
        .await;

    let result = create_appointment(
        State(state),
        user_extension(&patient),
        auth_header(),
        Json(CreateAppointmentRequest {
            doctor_id,
            start_time: Utc::now() + Duration::hours(96),
            telephonic: false,
        }),
    )
    .await;

    assert_matches!(result, Err(AppError::Conflict(_)));
}

#[tokio::test]
async fn storage_constraint_violation_surfaces_as_conflict() {
    let mock_server = MockServer::start().await;
    let state = test_state(&mock_server);
    let patient = TestUser::patient("patient@example.com");
    let doctor_id = Uuid::new_v4();

    mock_doctor_exists(&mock_server, &doctor_id).await;
    mock_no_overlap(&mock_server, &doctor_id).await;
    // A racing insert won; PostgREST reports the exclusion constraint as 409.
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23P01",
            "message": "conflicting key value violates exclusion constraint"
        })))
        .mount(&mock_server)
        .await;

    let result = create_appointment(
        State(state),
        user_extension(&patient),
        auth_header(),
        Json(CreateAppointmentRequest {
            doctor_id,
            start_time: Utc::now() + Duration::hours(96),
            telephonic: false,
        }),
    )
    .await;

    assert_matches!(result, Err(AppError::Conflict(_)));
}

#[tokio::test]
async fn rescheduling_own_pending_appointment_succeeds() {
    let mock_server = MockServer::start().await;
    let state = test_state(&mock_server);
    let patient = TestUser::patient("patient@example.com");
    let doctor_id = Uuid::new_v4();

    let old_start = Utc::now() + Duration::hours(100);
    let new_start = Utc::now() + Duration::hours(120);

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", "eq.7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row(
                7,
                &patient.id,
                &doctor_id.to_string(),
                &old_start.to_rfc3339(),
                &(old_start + Duration::minutes(30)).to_rfc3339(),
                "pending",
            )
        ])))
        .mount(&mock_server)
        .await;
    mock_no_overlap(&mock_server, &doctor_id).await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row(
                7,
                &patient.id,
                &doctor_id.to_string(),
                &new_start.to_rfc3339(),
                &(new_start + Duration::minutes(30)).to_rfc3339(),
                "pending",
            )
        ])))
        .mount(&mock_server)
        .await;

    let result = update_appointment(
        State(state),
        user_extension(&patient),
        auth_header(),
        Path(7),
        Json(UpdateAppointmentRequest {
            start_time: Some(new_start),
            telephonic: None,
        }),
    )
    .await;

    let body = result.unwrap().0;
    assert_eq!(body["success"], true);
    let rescheduled: chrono::DateTime<Utc> =
        serde_json::from_value(body["appointment"]["start_time"].clone()).unwrap();
    assert_eq!(rescheduled, new_start);
}

#[tokio::test]
async fn modifying_someone_elses_appointment_is_forbidden() {
    let mock_server = MockServer::start().await;
    let state = test_state(&mock_server);
    let patient = TestUser::patient("patient@example.com");
    let other_patient = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", "eq.7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row(
                7,
                &other_patient.to_string(),
                &Uuid::new_v4().to_string(),
                &(Utc::now() + Duration::hours(100)).to_rfc3339(),
                &(Utc::now() + Duration::hours(100) + Duration::minutes(30)).to_rfc3339(),
                "pending",
            )
        ])))
        .mount(&mock_server)
        .await;

    let result = cancel_appointment(
        State(state),
        user_extension(&patient),
        auth_header(),
        Path(7),
    )
    .await;

    assert_matches!(result, Err(AppError::Forbidden(_)));
}

#[tokio::test]
async fn cancelling_inside_the_notice_window_is_rejected() {
    let mock_server = MockServer::start().await;
    let state = test_state(&mock_server);
    let patient = TestUser::patient("patient@example.com");

    // Starts in 71 hours, one short of the required notice.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", "eq.7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row(
                7,
                &patient.id,
                &Uuid::new_v4().to_string(),
                &(Utc::now() + Duration::hours(71)).to_rfc3339(),
                &(Utc::now() + Duration::hours(71) + Duration::minutes(30)).to_rfc3339(),
                "pending",
            )
        ])))
        .mount(&mock_server)
        .await;

    let result = cancel_appointment(
        State(state),
        user_extension(&patient),
        auth_header(),
        Path(7),
    )
    .await;

    assert_matches!(result, Err(AppError::BadRequest(_)));
}

#[tokio::test]
async fn cancelling_twice_is_rejected() {
    let mock_server = MockServer::start().await;
    let state = test_state(&mock_server);
    let patient = TestUser::patient("patient@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", "eq.7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row(
                7,
                &patient.id,
                &Uuid::new_v4().to_string(),
                &(Utc::now() + Duration::hours(100)).to_rfc3339(),
                &(Utc::now() + Duration::hours(100) + Duration::minutes(30)).to_rfc3339(),
                "cancelled",
            )
        ])))
        .mount(&mock_server)
        .await;

    let result = cancel_appointment(
        State(state),
        user_extension(&patient),
        auth_header(),
        Path(7),
    )
    .await;

    assert_matches!(result, Err(AppError::BadRequest(_)));
}

#[tokio::test]
async fn cancelling_own_pending_appointment_succeeds() {
    let mock_server = MockServer::start().await;
    let state = test_state(&mock_server);
    let patient = TestUser::patient("patient@example.com");
    let doctor_id = Uuid::new_v4();
    let start = Utc::now() + Duration::hours(100);

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", "eq.7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row(
                7,
                &patient.id,
                &doctor_id.to_string(),
                &start.to_rfc3339(),
                &(start + Duration::minutes(30)).to_rfc3339(),
                "pending",
            )
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row(
                7,
                &patient.id,
                &doctor_id.to_string(),
                &start.to_rfc3339(),
                &(start + Duration::minutes(30)).to_rfc3339(),
                "cancelled",
            )
        ])))
        .mount(&mock_server)
        .await;

    let result = cancel_appointment(
        State(state),
        user_extension(&patient),
        auth_header(),
        Path(7),
    )
    .await;

    let body = result.unwrap().0;
    assert_eq!(body["message"], "Appointment cancelled");
}

#[tokio::test]
async fn pending_listing_is_paginated_with_exact_totals() {
    let mock_server = MockServer::start().await;
    let state = test_state(&mock_server);
    let patient = TestUser::patient("patient@example.com");
    let doctor_id = Uuid::new_v4();
    let start = Utc::now() + Duration::hours(100);

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "eq.pending"))
        .and(query_param("limit", "10"))
        .and(query_param("offset", "0"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Range", "0-1/25")
                .set_body_json(json!([
                    MockSupabaseResponses::appointment_row(
                        1,
                        &patient.id,
                        &doctor_id.to_string(),
                        &start.to_rfc3339(),
                        &(start + Duration::minutes(30)).to_rfc3339(),
                        "pending",
                    ),
                    MockSupabaseResponses::appointment_row(
                        2,
                        &patient.id,
                        &doctor_id.to_string(),
                        &(start + Duration::hours(1)).to_rfc3339(),
                        &(start + Duration::hours(1) + Duration::minutes(30)).to_rfc3339(),
                        "pending",
                    ),
                ])),
        )
        .mount(&mock_server)
        .await;

    let result = get_pending(
        State(state),
        user_extension(&patient),
        auth_header(),
        Query(PageQuery { page: None, limit: None }),
    )
    .await;

    let body = result.unwrap().0;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert_eq!(body["meta"]["total"], 25);
    assert_eq!(body["meta"]["page"], 1);
    assert_eq!(body["meta"]["limit"], 10);
    assert_eq!(body["meta"]["total_pages"], 3);
}

#[tokio::test]
async fn upcoming_listing_is_scoped_to_the_caller() {
    let mock_server = MockServer::start().await;
    let state = test_state(&mock_server);
    let doctor = TestUser::doctor("doctor@example.com");
    let start = Utc::now() + Duration::hours(24);

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("doctor_id", format!("eq.{}", doctor.id)))
        .and(query_param("status", "neq.cancelled"))
        .and(query_param("limit", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row(
                1,
                &Uuid::new_v4().to_string(),
                &doctor.id,
                &start.to_rfc3339(),
                &(start + Duration::minutes(30)).to_rfc3339(),
                "pending",
            )
        ])))
        .mount(&mock_server)
        .await;

    let result = get_upcoming(State(state), user_extension(&doctor), auth_header()).await;

    let body = result.unwrap().0;
    assert_eq!(body["appointments"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn full_history_listing_requires_a_doctor() {
    let mock_server = MockServer::start().await;
    let state = test_state(&mock_server);
    let patient = TestUser::patient("patient@example.com");

    let result = get_all(
        State(state),
        user_extension(&patient),
        auth_header(),
        Query(PageQuery { page: None, limit: None }),
    )
    .await;

    assert_matches!(result, Err(AppError::Forbidden(_)));
}

#[tokio::test]
async fn by_date_listing_requires_a_doctor() {
    let mock_server = MockServer::start().await;
    let state = test_state(&mock_server);
    let patient = TestUser::patient("patient@example.com");

    let result = get_by_date(
        State(state),
        user_extension(&patient),
        auth_header(),
        Query(DateQuery { date: "2026-03-10".to_string() }),
    )
    .await;

    assert_matches!(result, Err(AppError::Forbidden(_)));
}

#[tokio::test]
async fn detail_is_hidden_from_unrelated_users() {
    let mock_server = MockServer::start().await;
    let state = test_state(&mock_server);
    let bystander = TestUser::patient("other@example.com");
    let start = Utc::now() + Duration::hours(24);

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", "eq.7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row(
                7,
                &Uuid::new_v4().to_string(),
                &Uuid::new_v4().to_string(),
                &start.to_rfc3339(),
                &(start + Duration::minutes(30)).to_rfc3339(),
                "pending",
            )
        ])))
        .mount(&mock_server)
        .await;

    let result = get_appointment(
        State(state),
        user_extension(&bystander),
        auth_header(),
        Path(7),
    )
    .await;

    assert_matches!(result, Err(AppError::Forbidden(_)));
}

#[tokio::test]
async fn missing_appointment_detail_is_not_found() {
    let mock_server = MockServer::start().await;
    let state = test_state(&mock_server);
    let patient = TestUser::patient("patient@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let result = get_appointment(
        State(state),
        user_extension(&patient),
        auth_header(),
        Path(999),
    )
    .await;

    assert_matches!(result, Err(AppError::NotFound(_)));
}
