use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use cache_cell::invalidation::{CacheInvalidator, InvalidationEvent};
use shared_database::{DbError, SupabaseClient};
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    appointment_end, meets_notice_window, Appointment, AppointmentStatus,
    CreateAppointmentRequest, UpdateAppointmentRequest,
};
use crate::services::fetch_appointment;

const CONFLICT_MESSAGE: &str = "The selected time slot is no longer available";

/// Write path for appointments. Validation runs in-process first, but the
/// authoritative double-booking guard is the storage exclusion constraint on
/// `(doctor_id, tstzrange(start_time, end_time))` for non-cancelled rows;
/// a 409 from the insert is surfaced the same way as the in-process check.
pub struct BookingService {
    supabase: Arc<SupabaseClient>,
    invalidator: CacheInvalidator,
}

impl BookingService {
    pub fn new(supabase: Arc<SupabaseClient>, invalidator: CacheInvalidator) -> Self {
        Self { supabase, invalidator }
    }

    pub async fn create(
        &self,
        user: &User,
        request: CreateAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppError> {
        if !user.is_patient() {
            return Err(AppError::Forbidden(
                "Only patients can book appointments".to_string(),
            ));
        }
        let patient_id = user.uuid()?;
        let now = Utc::now();

        self.ensure_doctor_exists(request.doctor_id, auth_token).await?;

        if request.start_time <= now {
            return Err(AppError::BadRequest(
                "Appointment date must be in the future".to_string(),
            ));
        }

        let end_time = appointment_end(request.start_time);
        self.ensure_slot_free(request.doctor_id, request.start_time, end_time, None, auth_token)
            .await?;

        let body = json!({
            "patient_id": patient_id,
            "doctor_id": request.doctor_id,
            "start_time": request.start_time.to_rfc3339(),
            "end_time": end_time.to_rfc3339(),
            "telephonic": request.telephonic,
            "status": AppointmentStatus::Pending,
        });

        let appointment = self.insert(body, auth_token).await?;

        info!(
            "Appointment {} booked for patient {} with doctor {}",
            appointment.id, patient_id, request.doctor_id
        );

        self.invalidator
            .invalidate(&InvalidationEvent::created(
                appointment.id,
                patient_id,
                request.doctor_id,
                appointment.start_time.date_naive(),
            ))
            .await;

        Ok(appointment)
    }

    pub async fn update(
        &self,
        user: &User,
        appointment_id: i64,
        request: UpdateAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppError> {
        let existing = fetch_appointment(&self.supabase, appointment_id, auth_token).await?;
        let now = Utc::now();

        self.check_editable(user, &existing, now)?;

        let mut patch = json!({ "updated_at": now.to_rfc3339() });

        if let Some(start_time) = request.start_time {
            if start_time <= now {
                return Err(AppError::BadRequest(
                    "Appointment date must be in the future".to_string(),
                ));
            }

            let end_time = appointment_end(start_time);
            self.ensure_slot_free(
                existing.doctor_id,
                start_time,
                end_time,
                Some(appointment_id),
                auth_token,
            )
            .await?;

            patch["start_time"] = json!(start_time.to_rfc3339());
            patch["end_time"] = json!(end_time.to_rfc3339());
        }

        if let Some(telephonic) = request.telephonic {
            patch["telephonic"] = json!(telephonic);
        }

        let updated = self.patch(appointment_id, patch, auth_token).await?;

        info!("Appointment {} rescheduled", appointment_id);

        self.invalidator
            .invalidate(&InvalidationEvent::updated(
                appointment_id,
                existing.patient_id,
                existing.doctor_id,
                existing.start_time.date_naive(),
                updated.start_time.date_naive(),
            ))
            .await;

        Ok(updated)
    }

    pub async fn cancel(
        &self,
        user: &User,
        appointment_id: i64,
        auth_token: &str,
    ) -> Result<Appointment, AppError> {
        let existing = fetch_appointment(&self.supabase, appointment_id, auth_token).await?;
        let now = Utc::now();

        self.check_editable(user, &existing, now)?;

        let patch = json!({
            "status": AppointmentStatus::Cancelled,
            "updated_at": now.to_rfc3339(),
        });

        let cancelled = self.patch(appointment_id, patch, auth_token).await?;

        info!("Appointment {} cancelled", appointment_id);

        self.invalidator
            .invalidate(&InvalidationEvent::cancelled(
                appointment_id,
                existing.patient_id,
                existing.doctor_id,
                existing.start_time.date_naive(),
            ))
            .await;

        Ok(cancelled)
    }

    /// Patients may only touch their own pending appointments, and only with
    /// at least 72 hours of notice before the start time.
    fn check_editable(
        &self,
        user: &User,
        appointment: &Appointment,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let requester = user.uuid()?;
        if appointment.patient_id != requester {
            return Err(AppError::Forbidden(
                "You can only modify your own appointments".to_string(),
            ));
        }

        if appointment.status != AppointmentStatus::Pending {
            return Err(AppError::BadRequest(
                "Only pending appointments can be modified".to_string(),
            ));
        }

        if !meets_notice_window(appointment.start_time, now) {
            return Err(AppError::BadRequest(
                "Appointments can only be modified at least 72 hours in advance".to_string(),
            ));
        }

        Ok(())
    }

    async fn ensure_doctor_exists(&self, doctor_id: Uuid, auth_token: &str) -> Result<(), AppError> {
        let path = format!("/rest/v1/doctors?id=eq.{}&select=id", doctor_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        if rows.is_empty() {
            return Err(AppError::NotFound("Doctor not found".to_string()));
        }

        Ok(())
    }

    /// In-process overlap check against non-cancelled appointments. Two
    /// half-open intervals `[a, b)` and `[c, d)` overlap iff a < d && c < b,
    /// which PostgREST expresses as `start_time=lt.{end}&end_time=gt.{start}`.
    async fn ensure_slot_free(
        &self,
        doctor_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        exclude_id: Option<i64>,
        auth_token: &str,
    ) -> Result<(), AppError> {
        let mut path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&status=neq.cancelled&start_time=lt.{}&end_time=gt.{}&select=id",
            doctor_id,
            urlencoding::encode(&end_time.to_rfc3339()),
            urlencoding::encode(&start_time.to_rfc3339()),
        );
        if let Some(id) = exclude_id {
            path.push_str(&format!("&id=neq.{}", id));
        }

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        if !rows.is_empty() {
            return Err(AppError::Conflict(CONFLICT_MESSAGE.to_string()));
        }

        Ok(())
    }

    async fn insert(&self, body: Value, auth_token: &str) -> Result<Appointment, AppError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Result<Vec<Appointment>, DbError> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(auth_token),
                Some(body),
                Some(headers),
            )
            .await;

        match result {
            Ok(rows) => rows.into_iter().next().ok_or_else(|| {
                AppError::Database("Insert returned no representation".to_string())
            }),
            // The exclusion constraint caught a race the overlap check missed.
            Err(DbError::Conflict(_)) => Err(AppError::Conflict(CONFLICT_MESSAGE.to_string())),
            Err(other) => Err(other.into()),
        }
    }

    async fn patch(
        &self,
        appointment_id: i64,
        body: Value,
        auth_token: &str,
    ) -> Result<Appointment, AppError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Result<Vec<Appointment>, DbError> = self
            .supabase
            .request_with_headers(Method::PATCH, &path, Some(auth_token), Some(body), Some(headers))
            .await;

        match result {
            Ok(rows) => rows
                .into_iter()
                .next()
                .ok_or_else(|| AppError::NotFound("Appointment not found".to_string())),
            Err(DbError::Conflict(_)) => Err(AppError::Conflict(CONFLICT_MESSAGE.to_string())),
            Err(other) => Err(other.into()),
        }
    }
}
