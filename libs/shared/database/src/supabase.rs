use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;
use shared_models::error::AppError;

/// Storage-layer failures, kept distinct so callers can tell a constraint
/// violation apart from a transport problem. PostgREST reports exclusion and
/// unique constraint violations as HTTP 409.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("constraint violation: {0}")]
    Conflict(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("api error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<DbError> for AppError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Conflict(msg) => AppError::Conflict(msg),
            DbError::NotFound(msg) => AppError::NotFound(msg),
            DbError::Auth(msg) => AppError::Auth(msg),
            other => AppError::Database(other.to_string()),
        }
    }
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.clone(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Ok(key) = HeaderValue::from_str(&self.anon_key) {
            headers.insert("apikey", key);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            if let Ok(bearer) = HeaderValue::from_str(&format!("Bearer {}", token)) {
                headers.insert(AUTHORIZATION, bearer);
            }
        }

        headers
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
    ) -> Result<T, DbError>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(method, path, auth_token, body, None)
            .await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T, DbError>
    where
        T: DeserializeOwned,
    {
        let response = self
            .send(method, path, auth_token, body, extra_headers)
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::status_error(status.as_u16(), body));
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// Same as `request_with_headers` but asks PostgREST for an exact row
    /// count and returns it alongside the page of rows (`Content-Range`).
    pub async fn request_with_count<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
    ) -> Result<(T, i64), DbError>
    where
        T: DeserializeOwned,
    {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("count=exact"));

        let response = self.send(method, path, auth_token, None, Some(headers)).await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::status_error(status.as_u16(), body));
        }

        let total = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total)
            .unwrap_or(0);

        let text = response.text().await?;
        let data = serde_json::from_str::<T>(&text)?;
        Ok((data, total))
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<reqwest::Response, DbError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making request to {}", url);

        let mut headers = self.get_headers(auth_token);
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url).headers(headers);
        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        Ok(req.send().await?)
    }

    fn status_error(status: u16, body: String) -> DbError {
        error!("API error ({}): {}", status, body);
        match status {
            401 | 403 => DbError::Auth(body),
            404 => DbError::NotFound(body),
            409 => DbError::Conflict(body),
            _ => DbError::Status { status, body },
        }
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

/// `Content-Range: 0-9/57` -> 57. PostgREST uses `*/0` for an empty set.
fn parse_content_range_total(value: &str) -> Option<i64> {
    value.rsplit('/').next()?.parse::<i64>().ok()
}
