// libs/schedule-cell/src/models.rs
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bookable slots are a fixed 30 minutes wide.
pub const SLOT_MINUTES: i64 = 30;

/// A recurring weekly availability window for a doctor. Rows are owned by
/// doctor-profile management; this engine only reads them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleBlock {
    pub id: i64,
    pub doctor_id: Uuid,
    /// 0 = Sunday .. 6 = Saturday.
    pub day_of_week: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// A date-specific override to the weekly schedule: either a full-day closure
/// or a sub-range that replaces the recurring blocks for that date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleException {
    pub id: i64,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub all_day: bool,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeInterval {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeInterval {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }
}

/// The resolved availability of one doctor on one calendar date.
#[derive(Debug, Clone, Serialize)]
pub struct DayAvailability {
    pub attends: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub intervals: Vec<TimeInterval>,
}

impl DayAvailability {
    pub fn closed(reason: impl Into<String>) -> Self {
        Self {
            attends: false,
            reason: Some(reason.into()),
            intervals: Vec::new(),
        }
    }
}

/// A transient 30-minute candidate booking window; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Slot {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub available: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DaySlots {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub attends: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub slots: Vec<Slot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub full_name: String,
    pub specialty: String,
}

/// An already-booked interval, the only appointment detail slot generation
/// needs.
#[derive(Debug, Clone, Deserialize)]
pub struct BookedInterval {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

// Query parameter structs

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    /// YYYY-MM-DD; parsed by hand so a malformed date is a clean 400.
    pub date: String,
}

#[derive(Debug, Deserialize)]
pub struct DoctorsQuery {
    pub specialty: Option<String>,
}
