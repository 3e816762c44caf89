use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

/// Authenticated principal attached to every request by the auth middleware.
/// The engine trusts `role` for gating and uses `id` as the ownership key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_doctor(&self) -> bool {
        self.role.as_deref() == Some("doctor")
    }

    pub fn is_patient(&self) -> bool {
        self.role.as_deref() == Some("patient")
    }

    /// Parse the principal id into the Uuid used by person records. Cache
    /// keys are built from the parsed Uuid's rendering, never the raw token
    /// string, so a token with uppercase hex still maps to the same keys.
    pub fn uuid(&self) -> Result<Uuid, crate::error::AppError> {
        Uuid::parse_str(&self.id)
            .map_err(|_| crate::error::AppError::Auth("Invalid principal id".to_string()))
    }
}
