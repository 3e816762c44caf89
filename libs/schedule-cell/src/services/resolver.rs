// libs/schedule-cell/src/services/resolver.rs
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_database::SupabaseClient;
use shared_models::error::AppError;

use crate::models::{DayAvailability, Doctor, ScheduleBlock, ScheduleException, TimeInterval};

pub const NO_ATTENDANCE_REASON: &str = "doctor does not attend this day";

const DAY_NAMES: [&str; 7] = [
    "Sunday", "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday",
];

/// Resolves the time intervals a doctor is nominally available on a date from
/// recurring weekly blocks adjusted by one-off exceptions.
pub struct AvailabilityResolver {
    supabase: Arc<SupabaseClient>,
}

impl AvailabilityResolver {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn ensure_doctor_exists(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<(), AppError> {
        let path = format!("/rest/v1/doctors?id=eq.{}&select=id", doctor_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        if result.is_empty() {
            return Err(AppError::NotFound("Doctor not found".to_string()));
        }

        Ok(())
    }

    pub async fn list_doctors(
        &self,
        specialty: Option<&str>,
        auth_token: &str,
    ) -> Result<Vec<Doctor>, AppError> {
        let mut path =
            "/rest/v1/doctors?select=id,full_name,specialty&order=full_name.asc".to_string();
        if let Some(specialty) = specialty {
            path.push_str(&format!(
                "&specialty=ilike.*{}*",
                urlencoding::encode(specialty)
            ));
        }

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        let doctors = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Doctor>, _>>()
            .map_err(|e| AppError::Database(format!("Failed to parse doctors: {}", e)))?;

        Ok(doctors)
    }

    /// Ordered, disjoint intervals the doctor is nominally available on
    /// `date`: weekly blocks for that weekday, replaced entirely by an
    /// exception when one exists for the exact date.
    pub async fn resolve(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<DayAvailability, AppError> {
        debug!("Resolving availability for doctor {} on {}", doctor_id, date);

        self.ensure_doctor_exists(doctor_id, auth_token).await?;

        let day_of_week = date.weekday().num_days_from_sunday() as i32;
        let blocks = self.blocks_for_day(doctor_id, day_of_week, auth_token).await?;
        let exception = self.exception_for_date(doctor_id, date, auth_token).await?;

        let intervals = match exception {
            Some(exception) if exception.all_day => {
                debug!("Doctor {} has a full-day exception on {}", doctor_id, date);
                let reason = exception
                    .reason
                    .unwrap_or_else(|| "doctor is not available on this date".to_string());
                return Ok(DayAvailability::closed(reason));
            }
            Some(exception) => match (exception.start_time, exception.end_time) {
                // A sub-range override replaces the baseline for that date.
                (Some(start), Some(end)) if start < end => vec![TimeInterval::new(start, end)],
                _ => Vec::new(),
            },
            None => blocks
                .iter()
                .map(|b| TimeInterval::new(b.start_time, b.end_time))
                .collect(),
        };

        let intervals = merge_intervals(intervals);
        if intervals.is_empty() {
            return Ok(DayAvailability::closed(NO_ATTENDANCE_REASON));
        }

        Ok(DayAvailability {
            attends: true,
            reason: None,
            intervals,
        })
    }

    /// Weekday names (Monday first) with at least one recurring block.
    pub async fn attendance_days(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<String>, AppError> {
        self.ensure_doctor_exists(doctor_id, auth_token).await?;

        let path = format!(
            "/rest/v1/schedule_blocks?doctor_id=eq.{}&select=day_of_week",
            doctor_id
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        let mut days: Vec<i32> = result
            .iter()
            .filter_map(|row| row["day_of_week"].as_i64())
            .map(|d| d as i32)
            .filter(|d| (0..7).contains(d))
            .collect();
        days.sort_by_key(|d| (d + 6) % 7); // Monday first
        days.dedup();

        Ok(days
            .into_iter()
            .map(|d| DAY_NAMES[d as usize].to_string())
            .collect())
    }

    async fn blocks_for_day(
        &self,
        doctor_id: Uuid,
        day_of_week: i32,
        auth_token: &str,
    ) -> Result<Vec<ScheduleBlock>, AppError> {
        let path = format!(
            "/rest/v1/schedule_blocks?doctor_id=eq.{}&day_of_week=eq.{}&order=start_time.asc",
            doctor_id, day_of_week
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<ScheduleBlock>, _>>()
            .map_err(|e| AppError::Database(format!("Failed to parse schedule blocks: {}", e)))
    }

    async fn exception_for_date(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Option<ScheduleException>, AppError> {
        let path = format!(
            "/rest/v1/schedule_exceptions?doctor_id=eq.{}&date=eq.{}",
            doctor_id, date
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        match result.into_iter().next() {
            Some(row) => {
                let exception = serde_json::from_value(row).map_err(|e| {
                    AppError::Database(format!("Failed to parse schedule exception: {}", e))
                })?;
                Ok(Some(exception))
            }
            None => Ok(None),
        }
    }
}

/// Sort intervals by start and merge overlapping or adjacent ones; the result
/// is disjoint and ordered. Degenerate intervals (start >= end) are dropped.
pub fn merge_intervals(mut intervals: Vec<TimeInterval>) -> Vec<TimeInterval> {
    intervals.retain(|iv| iv.start < iv.end);
    intervals.sort_by_key(|iv| iv.start);

    let mut merged: Vec<TimeInterval> = Vec::with_capacity(intervals.len());
    for interval in intervals {
        match merged.last_mut() {
            Some(last) if interval.start <= last.end => {
                if interval.end > last.end {
                    last.end = interval.end;
                }
            }
            _ => merged.push(interval),
        }
    }
    merged
}
