// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use axum_extra::TypedHeader;
use chrono::NaiveDate;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};

use cache_cell::invalidation::CacheInvalidator;
use cache_cell::store::{DETAIL_TTL_SECS, LISTING_TTL_SECS};
use cache_cell::{keys, AppState};
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{CreateAppointmentRequest, DateQuery, PageQuery, UpdateAppointmentRequest};
use crate::services::booking::BookingService;
use crate::services::query::{PartyScope, QueryService};

fn booking(state: &Arc<AppState>) -> BookingService {
    BookingService::new(
        Arc::clone(&state.supabase),
        CacheInvalidator::new(state.cache.clone()),
    )
}

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let appointment = booking(&state).create(&user, request, auth.token()).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "appointment": appointment })),
    ))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(appointment_id): Path<i64>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = booking(&state)
        .update(&user, appointment_id, request, auth.token())
        .await?;

    Ok(Json(json!({ "success": true, "appointment": appointment })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(appointment_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    booking(&state)
        .cancel(&user, appointment_id, auth.token())
        .await?;

    Ok(Json(json!({ "message": "Appointment cancelled" })))
}

#[axum::debug_handler]
pub async fn get_upcoming(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let scope = PartyScope::from_user(&user)?;

    // Keyed on the canonical Uuid rendering so the invalidation pass, which
    // renders ids from parsed Uuids, hits the same key.
    let principal = scope.user_id().to_string();

    let cache_key = keys::scoped_key(&principal, "GET", "/appointments/upcoming", None);
    if let Some(cached) = state.cache.get_json(&cache_key).await {
        return Ok(Json(cached));
    }

    let appointments = QueryService::new(Arc::clone(&state.supabase))
        .upcoming(scope, auth.token())
        .await?;

    let payload = json!({ "appointments": appointments });
    state
        .cache
        .put_json(&cache_key, &payload, LISTING_TTL_SECS)
        .await;

    Ok(Json(payload))
}

#[axum::debug_handler]
pub async fn get_recent(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let scope = PartyScope::from_user(&user)?;

    let principal = scope.user_id().to_string();

    let cache_key = keys::scoped_key(&principal, "GET", "/appointments/recent", None);
    if let Some(cached) = state.cache.get_json(&cache_key).await {
        return Ok(Json(cached));
    }

    let appointments = QueryService::new(Arc::clone(&state.supabase))
        .recent_attended(scope, auth.token())
        .await?;

    let payload = json!({ "appointments": appointments });
    state
        .cache
        .put_json(&cache_key, &payload, LISTING_TTL_SECS)
        .await;

    Ok(Json(payload))
}

#[axum::debug_handler]
pub async fn get_pending(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Value>, AppError> {
    let scope = PartyScope::from_user(&user)?;
    let (page, limit) = query.normalize();

    let canonical = keys::canonical_query(&[
        ("limit", limit.to_string()),
        ("page", page.to_string()),
    ]);
    let principal = scope.user_id().to_string();
    let cache_key = keys::scoped_key(&principal, "GET", "/appointments/pending", Some(&canonical));
    if let Some(cached) = state.cache.get_json(&cache_key).await {
        return Ok(Json(cached));
    }

    let result = QueryService::new(Arc::clone(&state.supabase))
        .pending(scope, page, limit, auth.token())
        .await?;

    let payload = json!(result);
    state
        .cache
        .put_json(&cache_key, &payload, LISTING_TTL_SECS)
        .await;

    Ok(Json(payload))
}

#[axum::debug_handler]
pub async fn get_attended(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Value>, AppError> {
    let scope = PartyScope::from_user(&user)?;
    let (page, limit) = query.normalize();

    let canonical = keys::canonical_query(&[
        ("limit", limit.to_string()),
        ("page", page.to_string()),
    ]);
    let principal = scope.user_id().to_string();
    let cache_key = keys::scoped_key(&principal, "GET", "/appointments/attended", Some(&canonical));
    if let Some(cached) = state.cache.get_json(&cache_key).await {
        return Ok(Json(cached));
    }

    let result = QueryService::new(Arc::clone(&state.supabase))
        .attended(scope, page, limit, auth.token())
        .await?;

    let payload = json!(result);
    state
        .cache
        .put_json(&cache_key, &payload, LISTING_TTL_SECS)
        .await;

    Ok(Json(payload))
}

/// Full history for the authenticated doctor, any status.
#[axum::debug_handler]
pub async fn get_all(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Value>, AppError> {
    if !user.is_doctor() {
        return Err(AppError::Forbidden(
            "Only doctors can list all appointments".to_string(),
        ));
    }
    let doctor_id = user.uuid()?;
    let (page, limit) = query.normalize();

    let canonical = keys::canonical_query(&[
        ("limit", limit.to_string()),
        ("page", page.to_string()),
    ]);
    let cache_key = keys::scoped_key(&doctor_id.to_string(), "GET", "/appointments/all", Some(&canonical));
    if let Some(cached) = state.cache.get_json(&cache_key).await {
        return Ok(Json(cached));
    }

    let result = QueryService::new(Arc::clone(&state.supabase))
        .all_for_doctor(doctor_id, page, limit, auth.token())
        .await?;

    let payload = json!(result);
    state
        .cache
        .put_json(&cache_key, &payload, LISTING_TTL_SECS)
        .await;

    Ok(Json(payload))
}

/// Day sheet for the authenticated doctor.
#[axum::debug_handler]
pub async fn get_by_date(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<DateQuery>,
) -> Result<Json<Value>, AppError> {
    if !user.is_doctor() {
        return Err(AppError::Forbidden(
            "Only doctors can list appointments by date".to_string(),
        ));
    }
    let doctor_id = user.uuid()?;
    let date = parse_date(&query.date)?;

    let cache_key = keys::by_date_key(&doctor_id.to_string(), date);
    if let Some(cached) = state.cache.get_json(&cache_key).await {
        return Ok(Json(cached));
    }

    let appointments = QueryService::new(Arc::clone(&state.supabase))
        .by_date(doctor_id, date, auth.token())
        .await?;

    let payload = json!({ "date": query.date, "appointments": appointments });
    state
        .cache
        .put_json(&cache_key, &payload, LISTING_TTL_SECS)
        .await;

    Ok(Json(payload))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(appointment_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let principal = user.uuid()?;

    let cache_key = keys::appointment_detail_key(&principal.to_string(), appointment_id);
    if let Some(cached) = state.cache.get_json(&cache_key).await {
        return Ok(Json(cached));
    }

    let appointment = QueryService::new(Arc::clone(&state.supabase))
        .detail(&user, appointment_id, auth.token())
        .await?;

    // Only a successful lookup is cached; errors always re-check.
    let payload = json!({ "appointment": appointment });
    state
        .cache
        .put_json(&cache_key, &payload, DETAIL_TTL_SECS)
        .await;

    Ok(Json(payload))
}

fn parse_date(raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest(format!("Invalid date '{}', expected YYYY-MM-DD", raw)))
}
