use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use reqwest::Method;
use uuid::Uuid;

use shared_database::SupabaseClient;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    Appointment, PageMeta, Paginated, RECENT_ATTENDED_LIMIT, UPCOMING_LIMIT,
};
use crate::services::fetch_appointment;

/// Which side of the appointment the caller is on. Listings are always
/// filtered to the caller's own rows; role decides the filter column.
#[derive(Debug, Clone, Copy)]
pub enum PartyScope {
    Patient(Uuid),
    Doctor(Uuid),
}

impl PartyScope {
    pub fn from_user(user: &User) -> Result<Self, AppError> {
        let id = user.uuid()?;
        if user.is_doctor() {
            Ok(PartyScope::Doctor(id))
        } else if user.is_patient() {
            Ok(PartyScope::Patient(id))
        } else {
            Err(AppError::Forbidden(
                "Only patients and doctors can list appointments".to_string(),
            ))
        }
    }

    pub fn filter(&self) -> String {
        match self {
            PartyScope::Patient(id) => format!("patient_id=eq.{}", id),
            PartyScope::Doctor(id) => format!("doctor_id=eq.{}", id),
        }
    }

    pub fn user_id(&self) -> Uuid {
        match self {
            PartyScope::Patient(id) | PartyScope::Doctor(id) => *id,
        }
    }
}

/// Read path for appointments. Every query goes straight to storage; the
/// handlers layer response caching on top.
pub struct QueryService {
    supabase: Arc<SupabaseClient>,
}

impl QueryService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// The next few non-cancelled appointments, soonest first.
    pub async fn upcoming(
        &self,
        scope: PartyScope,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppError> {
        let now = urlencoding::encode(&Utc::now().to_rfc3339()).into_owned();
        let path = format!(
            "/rest/v1/appointments?{}&status=neq.cancelled&start_time=gte.{}&order=start_time.asc&limit={}",
            scope.filter(),
            now,
            UPCOMING_LIMIT,
        );

        Ok(self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?)
    }

    /// The most recently attended appointments, newest first.
    pub async fn recent_attended(
        &self,
        scope: PartyScope,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppError> {
        let path = format!(
            "/rest/v1/appointments?{}&status=eq.attended&order=start_time.desc&limit={}",
            scope.filter(),
            RECENT_ATTENDED_LIMIT,
        );

        Ok(self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?)
    }

    /// Pending appointments, soonest first, paginated with an exact total.
    pub async fn pending(
        &self,
        scope: PartyScope,
        page: i64,
        limit: i64,
        auth_token: &str,
    ) -> Result<Paginated<Appointment>, AppError> {
        self.paginated(scope, Some("eq.pending"), "start_time.asc", page, limit, auth_token)
            .await
    }

    /// Attended appointments, most recent first, paginated with an exact total.
    pub async fn attended(
        &self,
        scope: PartyScope,
        page: i64,
        limit: i64,
        auth_token: &str,
    ) -> Result<Paginated<Appointment>, AppError> {
        self.paginated(scope, Some("eq.attended"), "start_time.desc", page, limit, auth_token)
            .await
    }

    /// A doctor's full appointment history, any status, most recent first.
    pub async fn all_for_doctor(
        &self,
        doctor_id: Uuid,
        page: i64,
        limit: i64,
        auth_token: &str,
    ) -> Result<Paginated<Appointment>, AppError> {
        self.paginated(
            PartyScope::Doctor(doctor_id),
            None,
            "start_time.desc",
            page,
            limit,
            auth_token,
        )
        .await
    }

    async fn paginated(
        &self,
        scope: PartyScope,
        status_filter: Option<&str>,
        order: &str,
        page: i64,
        limit: i64,
        auth_token: &str,
    ) -> Result<Paginated<Appointment>, AppError> {
        let offset = (page - 1) * limit;
        let mut path = format!("/rest/v1/appointments?{}", scope.filter());
        if let Some(status) = status_filter {
            path.push_str(&format!("&status={}", status));
        }
        path.push_str(&format!(
            "&order={}&limit={}&offset={}",
            order, limit, offset
        ));

        let (data, total): (Vec<Appointment>, i64) = self
            .supabase
            .request_with_count(Method::GET, &path, Some(auth_token))
            .await?;

        Ok(Paginated {
            data,
            meta: PageMeta::new(total, page, limit),
        })
    }

    /// A doctor's full day sheet, any status, chronological.
    pub async fn by_date(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppError> {
        let day_start = date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc();
        let day_end = day_start + Duration::days(1);

        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&start_time=gte.{}&start_time=lt.{}&order=start_time.asc",
            doctor_id,
            urlencoding::encode(&day_start.to_rfc3339()),
            urlencoding::encode(&day_end.to_rfc3339()),
        );

        Ok(self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?)
    }

    /// Single appointment, visible only to its patient or doctor. Existence
    /// is checked before ownership so an unrelated caller still learns
    /// nothing beyond a 403.
    pub async fn detail(
        &self,
        user: &User,
        appointment_id: i64,
        auth_token: &str,
    ) -> Result<Appointment, AppError> {
        let appointment = fetch_appointment(&self.supabase, appointment_id, auth_token).await?;

        let requester = user.uuid()?;
        if !appointment.is_party(requester) {
            return Err(AppError::Forbidden(
                "You do not have access to this appointment".to_string(),
            ));
        }

        Ok(appointment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: &str) -> User {
        User {
            id: "33333333-3333-3333-3333-333333333333".to_string(),
            email: None,
            role: Some(role.to_string()),
            created_at: None,
        }
    }

    #[test]
    fn scope_follows_role() {
        let scope = PartyScope::from_user(&user("doctor")).unwrap();
        assert!(scope.filter().starts_with("doctor_id=eq."));

        let scope = PartyScope::from_user(&user("patient")).unwrap();
        assert!(scope.filter().starts_with("patient_id=eq."));
    }

    #[test]
    fn unknown_role_is_forbidden() {
        let result = PartyScope::from_user(&user("admin"));
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }
}
