// libs/appointment-cell/src/models.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Every appointment occupies a fixed 30-minute interval.
pub const APPOINTMENT_MINUTES: i64 = 30;

/// Minimum lead time for modifying or cancelling a pending appointment.
pub const EDIT_NOTICE_HOURS: i64 = 72;

pub const UPCOMING_LIMIT: i64 = 3;
pub const RECENT_ATTENDED_LIMIT: i64 = 4;

pub const DEFAULT_PAGE_LIMIT: i64 = 10;
pub const MAX_PAGE_LIMIT: i64 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: i64,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub start_time: DateTime<Utc>,
    /// Always `start_time + 30min`.
    pub end_time: DateTime<Utc>,
    pub telephonic: bool,
    pub status: AppointmentStatus,
    /// Clinical detail written by the encounter workflow once attended.
    pub diagnosis: Option<String>,
    pub prescription: Option<String>,
    pub referral: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Whether the given principal is a party to this appointment.
    pub fn is_party(&self, user_id: Uuid) -> bool {
        self.patient_id == user_id || self.doctor_id == user_id
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Attended,
    Cancelled,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Attended => write!(f, "attended"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// `start + 30min`; the only way an end time is ever derived.
pub fn appointment_end(start: DateTime<Utc>) -> DateTime<Utc> {
    start + Duration::minutes(APPOINTMENT_MINUTES)
}

/// The 72-hour rule: modifications require the current start to be at least
/// 72 hours away.
pub fn meets_notice_window(start: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    start - now >= Duration::hours(EDIT_NOTICE_HOURS)
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub doctor_id: Uuid,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub telephonic: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub start_time: Option<DateTime<Utc>>,
    pub telephonic: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageQuery {
    /// Page defaults to 1 (floor 1), limit to 10 clamped into [1, 100].
    pub fn normalize(&self) -> (i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self
            .limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT);
        (page, limit)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageMeta {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

impl PageMeta {
    pub fn new(total: i64, page: i64, limit: i64) -> Self {
        let total_pages = if total == 0 { 0 } else { (total + limit - 1) / limit };
        Self { total, page, limit, total_pages }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    /// YYYY-MM-DD; parsed by hand so a malformed date is a clean 400.
    pub date: String,
}
