use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;

/// PostgreSQL SQLSTATE for unique/exclusion constraint violations.
const UNIQUE_VIOLATION: &str = "23505";
const EXCLUSION_VIOLATION: &str = "23P01";

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid response: {0}")]
    Decode(String),

    #[error("Invalid client configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for DatabaseError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            DatabaseError::Decode(err.to_string())
        } else {
            DatabaseError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for DatabaseError {
    fn from(err: serde_json::Error) -> Self {
        DatabaseError::Decode(err.to_string())
    }
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
    service_key: Option<String>,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
            service_key: config.supabase_service_role_key.clone(),
        }
    }

    fn get_headers(&self) -> Result<HeaderMap, DatabaseError> {
        let mut headers = HeaderMap::new();

        let api_key = HeaderValue::from_str(&self.anon_key)
            .map_err(|e| DatabaseError::Config(format!("invalid anon key: {}", e)))?;
        headers.insert("apikey", api_key);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        // Background jobs and directory lookups run without an end-user token,
        // so requests carry the service credentials when they are configured.
        let token = self.service_key.as_deref().unwrap_or(&self.anon_key);
        if !token.is_empty() {
            let bearer = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| DatabaseError::Config(format!("invalid bearer token: {}", e)))?;
            headers.insert(AUTHORIZATION, bearer);
        }

        Ok(headers)
    }

    pub async fn request<T>(&self, method: Method, path: &str, body: Option<Value>) -> Result<T, DatabaseError>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(method, path, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T, DatabaseError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers()?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url).headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);
            return Err(classify_error(status, error_text));
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// GET a PostgREST collection.
    pub async fn select<T>(&self, path: &str) -> Result<Vec<T>, DatabaseError>
    where
        T: DeserializeOwned,
    {
        let rows: Vec<Value> = self.request(Method::GET, path, None).await?;
        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(DatabaseError::from))
            .collect()
    }

    /// POST a row and return the stored representation.
    pub async fn insert<T>(&self, table: &str, body: Value) -> Result<T, DatabaseError>
    where
        T: DeserializeOwned,
    {
        let path = format!("/rest/v1/{}", table);
        let mut rows: Vec<T> = self
            .request_with_headers(Method::POST, &path, Some(body), Some(representation_headers()))
            .await?;

        if rows.is_empty() {
            return Err(DatabaseError::Decode(format!("insert into {} returned no rows", table)));
        }
        Ok(rows.swap_remove(0))
    }

    /// PATCH rows matching `path` and return the updated representations.
    pub async fn update<T>(&self, path: &str, body: Value) -> Result<Vec<T>, DatabaseError>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(Method::PATCH, path, Some(body), Some(representation_headers()))
            .await
    }

    /// Exact row count for a filtered collection, read from `Content-Range`.
    pub async fn count(&self, path: &str) -> Result<u64, DatabaseError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Counting rows at {}", url);

        let mut headers = self.get_headers()?;
        headers.insert("Prefer", HeaderValue::from_static("count=exact"));
        headers.insert("Range", HeaderValue::from_static("0-0"));

        let response = self.client.request(Method::HEAD, &url).headers(headers).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("API error ({}): {}", status, error_text);
            return Err(classify_error(status, error_text));
        }

        response
            .headers()
            .get("content-range")
            .and_then(|value| value.to_str().ok())
            .and_then(parse_content_range_total)
            .ok_or_else(|| DatabaseError::Decode("missing Content-Range total".to_string()))
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

fn representation_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static("return=representation"));
    headers
}

fn classify_error(status: StatusCode, error_text: String) -> DatabaseError {
    let pg_code = serde_json::from_str::<Value>(&error_text)
        .ok()
        .and_then(|body| body.get("code").and_then(Value::as_str).map(str::to_string));

    if matches!(pg_code.as_deref(), Some(UNIQUE_VIOLATION) | Some(EXCLUSION_VIOLATION)) {
        return DatabaseError::UniqueViolation(error_text);
    }

    match status.as_u16() {
        401 | 403 => DatabaseError::Auth(error_text),
        404 => DatabaseError::NotFound(error_text),
        409 => DatabaseError::UniqueViolation(error_text),
        code => DatabaseError::Api { status: code, message: error_text },
    }
}

/// Parses the total out of `0-0/17` or `*/17`.
fn parse_content_range_total(raw: &str) -> Option<u64> {
    raw.rsplit('/').next()?.trim().parse().ok()
}
