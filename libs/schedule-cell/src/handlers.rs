// libs/schedule-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::NaiveDate;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use cache_cell::store::{AVAILABILITY_TTL_SECS, LISTING_TTL_SECS};
use cache_cell::{keys, AppState};
use shared_models::error::AppError;

use crate::models::{AvailabilityQuery, DoctorsQuery};
use crate::services::resolver::AvailabilityResolver;
use crate::services::slots::SlotGenerator;

#[axum::debug_handler]
pub async fn list_doctors(
    State(state): State<Arc<AppState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<DoctorsQuery>,
) -> Result<Json<Value>, AppError> {
    let resolver = AvailabilityResolver::new(Arc::clone(&state.supabase));
    let doctors = resolver
        .list_doctors(query.specialty.as_deref(), auth.token())
        .await?;

    Ok(Json(json!({ "doctors": doctors })))
}

/// Slot list for one doctor/date. Not identity-scoped, so the cache entry is
/// shared by every caller and kept short-lived.
#[axum::debug_handler]
pub async fn get_availability(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let date = parse_date(&query.date)?;

    let cache_key = keys::availability_key(&doctor_id.to_string(), date);
    if let Some(cached) = state.cache.get_json(&cache_key).await {
        return Ok(Json(cached));
    }

    let generator = SlotGenerator::new(Arc::clone(&state.supabase));
    let day_slots = generator.generate(doctor_id, date, auth.token()).await?;

    let payload = json!(day_slots);
    state
        .cache
        .put_json(&cache_key, &payload, AVAILABILITY_TTL_SECS)
        .await;

    Ok(Json(payload))
}

#[axum::debug_handler]
pub async fn get_attendance_days(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let cache_key = keys::shared_key(
        "GET",
        &format!("/doctors/{}/attendance-days", doctor_id),
        None,
    );
    if let Some(cached) = state.cache.get_json(&cache_key).await {
        return Ok(Json(cached));
    }

    let resolver = AvailabilityResolver::new(Arc::clone(&state.supabase));
    let days = resolver.attendance_days(doctor_id, auth.token()).await?;

    let payload = json!({ "doctor_id": doctor_id, "days": days });
    state
        .cache
        .put_json(&cache_key, &payload, LISTING_TTL_SECS)
        .await;

    Ok(Json(payload))
}

fn parse_date(raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest(format!("Invalid date '{}', expected YYYY-MM-DD", raw)))
}
