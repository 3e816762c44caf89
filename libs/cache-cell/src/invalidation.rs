use chrono::{NaiveDate, Utc};
use futures::future::join_all;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::keys;
use crate::store::CacheStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Created,
    Updated,
    Cancelled,
    /// Written by the external clinical-encounter workflow; same contract.
    Attended,
}

/// A mutation that may have stale listings cached somewhere.
#[derive(Debug, Clone)]
pub struct InvalidationEvent {
    pub kind: EventKind,
    pub appointment_id: i64,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    /// Set on reschedules that move the appointment to a different day.
    pub new_date: Option<NaiveDate>,
}

impl InvalidationEvent {
    pub fn created(appointment_id: i64, patient_id: Uuid, doctor_id: Uuid, date: NaiveDate) -> Self {
        Self { kind: EventKind::Created, appointment_id, patient_id, doctor_id, date, new_date: None }
    }

    pub fn updated(
        appointment_id: i64,
        patient_id: Uuid,
        doctor_id: Uuid,
        old_date: NaiveDate,
        new_date: NaiveDate,
    ) -> Self {
        let moved = (new_date != old_date).then_some(new_date);
        Self { kind: EventKind::Updated, appointment_id, patient_id, doctor_id, date: old_date, new_date: moved }
    }

    pub fn cancelled(appointment_id: i64, patient_id: Uuid, doctor_id: Uuid, date: NaiveDate) -> Self {
        Self { kind: EventKind::Cancelled, appointment_id, patient_id, doctor_id, date, new_date: None }
    }

    pub fn attended(appointment_id: i64, patient_id: Uuid, doctor_id: Uuid, date: NaiveDate) -> Self {
        Self { kind: EventKind::Attended, appointment_id, patient_id, doctor_id, date, new_date: None }
    }

    /// The calendar dates whose availability changed.
    pub fn affected_dates(&self) -> Vec<NaiveDate> {
        match self.new_date {
            Some(new_date) => vec![self.date, new_date],
            None => vec![self.date],
        }
    }
}

/// Best-effort invalidation over an enumerated key space. Deletions run
/// concurrently; a failed deletion is logged and swallowed, bounded in impact
/// by the entry's TTL.
#[derive(Clone)]
pub struct CacheInvalidator {
    store: CacheStore,
}

impl CacheInvalidator {
    pub fn new(store: CacheStore) -> Self {
        Self { store }
    }

    pub async fn invalidate(&self, event: &InvalidationEvent) {
        if !self.store.is_enabled() {
            return;
        }

        let keys = Self::keys_for(event, Utc::now().date_naive());
        debug!(
            "Invalidating {} cache keys for appointment {} ({:?})",
            keys.len(),
            event.appointment_id,
            event.kind
        );

        let deletions = keys.iter().map(|key| {
            let store = self.store.clone();
            async move {
                if let Err(e) = store.delete(key).await {
                    warn!("Cache invalidation failed for {}: {}", key, e);
                }
            }
        });

        join_all(deletions).await;
    }

    /// Enumerate every key the mutation may have left stale. Pure so the key
    /// space is testable without Redis.
    pub fn keys_for(event: &InvalidationEvent, today: NaiveDate) -> Vec<String> {
        let patient = event.patient_id.to_string();
        let doctor = event.doctor_id.to_string();
        let mut keys = Vec::new();

        // Patient listings.
        keys.push(keys::scoped_key(&patient, "GET", "/appointments/upcoming", None));
        keys.push(keys::scoped_key(&patient, "GET", "/appointments/recent", None));
        for query in keys::listing_queries() {
            keys.push(keys::scoped_key(&patient, "GET", "/appointments/pending", Some(&query)));
            keys.push(keys::scoped_key(&patient, "GET", "/appointments/attended", Some(&query)));
        }

        // Doctor listings.
        keys.push(keys::scoped_key(&doctor, "GET", "/appointments/upcoming", None));
        for query in keys::listing_queries() {
            keys.push(keys::scoped_key(&doctor, "GET", "/appointments/pending", Some(&query)));
            keys.push(keys::scoped_key(&doctor, "GET", "/appointments/attended", Some(&query)));
            keys.push(keys::scoped_key(&doctor, "GET", "/appointments/all", Some(&query)));
        }
        for date in keys::date_window(today) {
            keys.push(keys::by_date_key(&doctor, date));
        }

        // Detail views for both parties.
        keys.push(keys::appointment_detail_key(&patient, event.appointment_id));
        keys.push(keys::appointment_detail_key(&doctor, event.appointment_id));

        // Availability for the affected date(s), including by-date listings
        // for dates a reschedule moved the appointment across.
        for date in event.affected_dates() {
            keys.push(keys::availability_key(&doctor, date));
            keys.push(keys::by_date_key(&doctor, date));
        }

        keys
    }
}
