pub mod booking;
pub mod query;

use reqwest::Method;
use serde_json::Value;

use shared_database::SupabaseClient;
use shared_models::error::AppError;

use crate::models::Appointment;

/// Single-row appointment lookup shared by the booking and query paths.
pub(crate) async fn fetch_appointment(
    supabase: &SupabaseClient,
    appointment_id: i64,
    auth_token: &str,
) -> Result<Appointment, AppError> {
    let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
    let result: Vec<Value> = supabase
        .request(Method::GET, &path, Some(auth_token), None)
        .await?;

    let row = result
        .into_iter()
        .next()
        .ok_or_else(|| AppError::NotFound("Appointment not found".to_string()))?;

    serde_json::from_value(row)
        .map_err(|e| AppError::Database(format!("Failed to parse appointment: {}", e)))
}
