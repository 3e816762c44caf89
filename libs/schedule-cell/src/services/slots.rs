// libs/schedule-cell/src/services/slots.rs
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_database::SupabaseClient;
use shared_models::error::AppError;

use crate::models::{BookedInterval, DaySlots, Slot, TimeInterval, SLOT_MINUTES};
use crate::services::resolver::AvailabilityResolver;

/// Emits fixed-width bookable slots by subtracting booked appointments from
/// the resolver's intervals.
pub struct SlotGenerator {
    supabase: Arc<SupabaseClient>,
    resolver: AvailabilityResolver,
}

impl SlotGenerator {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        let resolver = AvailabilityResolver::new(Arc::clone(&supabase));
        Self { supabase, resolver }
    }

    pub fn resolver(&self) -> &AvailabilityResolver {
        &self.resolver
    }

    pub async fn generate(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<DaySlots, AppError> {
        debug!("Generating slots for doctor {} on {}", doctor_id, date);

        let availability = self.resolver.resolve(doctor_id, date, auth_token).await?;
        if !availability.attends {
            return Ok(DaySlots {
                doctor_id,
                date,
                attends: false,
                reason: availability.reason,
                slots: Vec::new(),
            });
        }

        let booked = self.booked_intervals(doctor_id, date, auth_token).await?;
        let now = Utc::now();

        let mut slots = Vec::new();
        for interval in &availability.intervals {
            slots.extend(walk_interval(date, interval, &booked, now));
        }

        debug!("Generated {} slots ({} bookable)", slots.len(),
               slots.iter().filter(|s| s.available).count());

        Ok(DaySlots {
            doctor_id,
            date,
            attends: true,
            reason: None,
            slots,
        })
    }

    /// Non-cancelled appointments whose start falls on `date`.
    async fn booked_intervals(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<BookedInterval>, AppError> {
        let day_start = date.and_hms_opt(0, 0, 0).unwrap().and_utc();
        let day_end = day_start + Duration::days(1);

        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&status=neq.cancelled&start_time=gte.{}&start_time=lt.{}&select=start_time,end_time&order=start_time.asc",
            doctor_id,
            urlencoding::encode(&day_start.to_rfc3339()),
            urlencoding::encode(&day_end.to_rfc3339()),
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<BookedInterval>, _>>()
            .map_err(|e| AppError::Database(format!("Failed to parse appointments: {}", e)))
    }
}

/// Walk one resolved interval in 30-minute steps. A partial trailing step is
/// dropped. A slot is unavailable when it intersects a booked interval on
/// `[start, end)` or when its start has already elapsed.
pub fn walk_interval(
    date: NaiveDate,
    interval: &TimeInterval,
    booked: &[BookedInterval],
    now: DateTime<Utc>,
) -> Vec<Slot> {
    let step = Duration::minutes(SLOT_MINUTES);
    let interval_start = date.and_time(interval.start).and_utc();
    let interval_end = date.and_time(interval.end).and_utc();

    let mut slots = Vec::new();
    let mut cursor = interval_start;

    while cursor + step <= interval_end {
        let slot_end = cursor + step;

        let intersects_booking = booked
            .iter()
            .any(|apt| cursor < apt.end_time && slot_end > apt.start_time);
        let elapsed = cursor < now;

        slots.push(Slot {
            start_time: cursor,
            end_time: slot_end,
            available: !intersects_booking && !elapsed,
        });

        cursor = slot_end;
    }

    slots
}
