//! Cache key scheme.
//!
//! Identity-scoped entries (listings, detail views) are keyed by the
//! requesting principal plus method, path and canonicalized query. Entries
//! that are not identity-scoped (availability, attendance days) drop the
//! principal segment so every caller shares them.

use chrono::{Duration, NaiveDate};

/// Bounded key space the invalidation pass enumerates. Combinations outside
/// these bounds (page > 10, other limits, dates beyond the window) are only
/// reclaimed by TTL expiry.
pub const LISTING_PAGES: i64 = 10;
pub const LISTING_LIMITS: [i64; 4] = [10, 20, 50, 100];
pub const DATE_WINDOW_DAYS_BACK: i64 = 30;
pub const DATE_WINDOW_DAYS_FORWARD: i64 = 90;

pub fn scoped_key(user_id: &str, method: &str, path: &str, query: Option<&str>) -> String {
    match query {
        Some(q) if !q.is_empty() => format!("cache:{}:{}:{}?{}", user_id, method, path, q),
        _ => format!("cache:{}:{}:{}", user_id, method, path),
    }
}

pub fn shared_key(method: &str, path: &str, query: Option<&str>) -> String {
    match query {
        Some(q) if !q.is_empty() => format!("cache:{}:{}?{}", method, path, q),
        _ => format!("cache:{}:{}", method, path),
    }
}

/// Sort `key=value` pairs so semantically equal queries map to one entry.
pub fn canonical_query(pairs: &[(&str, String)]) -> String {
    let mut parts: Vec<String> = pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();
    parts.sort();
    parts.join("&")
}

/// Every page/limit query string a paginated listing may have been cached
/// under, in both parameter orders.
pub fn listing_queries() -> Vec<String> {
    let mut queries = Vec::with_capacity(LISTING_PAGES as usize * LISTING_LIMITS.len() * 2);
    for page in 1..=LISTING_PAGES {
        for limit in LISTING_LIMITS {
            queries.push(format!("page={}&limit={}", page, limit));
            queries.push(format!("limit={}&page={}", limit, page));
        }
    }
    queries
}

/// Dates whose by-date listings are proactively invalidated: a bounded window
/// around today.
pub fn date_window(today: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::with_capacity((DATE_WINDOW_DAYS_BACK + DATE_WINDOW_DAYS_FORWARD + 1) as usize);
    let mut day = today - Duration::days(DATE_WINDOW_DAYS_BACK);
    let last = today + Duration::days(DATE_WINDOW_DAYS_FORWARD);
    while day <= last {
        dates.push(day);
        day += Duration::days(1);
    }
    dates
}

pub fn availability_key(doctor_id: &str, date: NaiveDate) -> String {
    shared_key(
        "GET",
        &format!("/doctors/{}/availability", doctor_id),
        Some(&format!("date={}", date)),
    )
}

pub fn appointment_detail_key(user_id: &str, appointment_id: i64) -> String {
    scoped_key(user_id, "GET", &format!("/appointments/{}", appointment_id), None)
}

pub fn by_date_key(doctor_id: &str, date: NaiveDate) -> String {
    scoped_key(
        doctor_id,
        "GET",
        "/appointments/by-date",
        Some(&format!("date={}", date)),
    )
}
