//! PostgREST client for the hosted job table.
//!
//! Production-grade client with:
//! - Service credential sent as `apikey` and bearer token
//! - HTTP client tuning (pooling, timeouts)
//! - Retried reads, single-shot writes
//! - Compare-and-set via filtered `PATCH` with `return=representation`
//! - Observability (tracing spans, metrics)

use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use tracing::{debug, info_span, Instrument};

use clipq_models::{Job, JobId, JobPatch, JobStatus};

use crate::error::{StoreError, StoreResult};
use crate::metrics::record_request;
use crate::retry::{with_retry, RetryConfig};
use crate::store::JobStore;

// =============================================================================
// Configuration
// =============================================================================

/// Job store client configuration.
#[derive(Clone)]
pub struct StoreConfig {
    /// Project endpoint, e.g. `https://xyz.supabase.co` (no trailing slash)
    pub base_url: String,
    /// Service credential
    pub service_key: String,
    /// Job table name
    pub table: String,
    /// Request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Retry configuration for reads
    pub retry: RetryConfig,
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("base_url", &self.base_url)
            .field("service_key", &mask_secret(&self.service_key))
            .field("table", &self.table)
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

impl StoreConfig {
    /// Build a config with default timeouts and retry policy.
    pub fn new(base_url: impl Into<String>, service_key: impl Into<String>) -> StoreResult<Self> {
        let base_url = normalize_base_url(&base_url.into())?;
        let service_key = service_key.into();
        if service_key.is_empty() {
            return Err(StoreError::config("service credential cannot be empty"));
        }

        Ok(Self {
            base_url,
            service_key,
            table: "jobs".to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            retry: RetryConfig::default(),
        })
    }

    /// Create config from environment variables.
    pub fn from_env() -> StoreResult<Self> {
        let base_url = std::env::var("SUPABASE_URL")
            .map_err(|_| StoreError::config("SUPABASE_URL must be set"))?;
        let service_key = std::env::var("SUPABASE_SERVICE_ROLE_KEY")
            .map_err(|_| StoreError::config("SUPABASE_SERVICE_ROLE_KEY must be set"))?;

        let connect_timeout_secs: u64 = std::env::var("STORE_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        let mut config = Self::new(base_url, service_key)?;
        config.table = std::env::var("JOBS_TABLE")
            .ok()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "jobs".to_string());
        config.connect_timeout = Duration::from_secs(connect_timeout_secs);
        config.retry = RetryConfig::from_env();
        Ok(config)
    }
}

fn normalize_base_url(raw: &str) -> StoreResult<String> {
    if raw.trim().is_empty() {
        return Err(StoreError::config("store URL cannot be empty"));
    }
    let parsed = url::Url::parse(raw.trim())
        .map_err(|e| StoreError::config(format!("invalid store URL '{}': {}", raw, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(StoreError::config(format!(
            "store URL must be http(s), got '{}'",
            parsed.scheme()
        )));
    }
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

/// Replace all but the last `keep` characters with `*`.
///
/// Returns `MISSING` for an empty secret.
pub fn mask_secret(secret: &str) -> String {
    mask_secret_keep(secret, 4)
}

fn mask_secret_keep(secret: &str, keep: usize) -> String {
    if secret.is_empty() {
        return "MISSING".to_string();
    }
    let chars: Vec<char> = secret.chars().collect();
    let visible = keep.min(chars.len());
    let hidden = chars.len() - visible;
    let mut masked = "*".repeat(hidden);
    masked.extend(&chars[hidden..]);
    masked
}

// =============================================================================
// Client
// =============================================================================

/// Job table client over the PostgREST API.
#[derive(Clone)]
pub struct RestJobStore {
    http: Client,
    config: StoreConfig,
    table_url: String,
}

impl RestJobStore {
    /// Create a new client.
    pub fn new(config: StoreConfig) -> StoreResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(4)
            .user_agent(concat!("clipq-store/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(StoreError::Network)?;

        let table_url = format!("{}/rest/v1/{}", config.base_url, config.table);

        Ok(Self {
            http,
            config,
            table_url,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> StoreResult<Self> {
        Self::new(StoreConfig::from_env()?)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn request(&self, method: Method) -> RequestBuilder {
        self.http
            .request(method, &self.table_url)
            .header("apikey", &self.config.service_key)
            .bearer_auth(&self.config.service_key)
            .header("Accept", "application/json")
    }

    /// `GET` rows matching `query`.
    async fn select(&self, operation: &str, query: &[(&str, String)]) -> StoreResult<Vec<Job>> {
        with_retry(&self.config.retry, operation, || {
            self.execute_request(operation, async move {
                let response = self.request(Method::GET).query(query).send().await?;
                let status = response.status();

                match status {
                    StatusCode::OK => {
                        let body = response.text().await?;
                        serde_json::from_str::<Vec<Job>>(&body).map_err(|e| {
                            StoreError::InvalidResponse(format!(
                                "failed to decode job rows: {} (body prefix: {})",
                                e,
                                body.chars().take(200).collect::<String>()
                            ))
                        })
                    }
                    _ => Err(Self::handle_error_response(status, response).await),
                }
            })
        })
        .await
    }

    /// `PATCH` rows matching `filters`; returns the rows the server changed.
    async fn patch(
        &self,
        operation: &str,
        filters: &[(&str, String)],
        patch: &JobPatch,
    ) -> StoreResult<Vec<serde_json::Value>> {
        let body = patch.to_row(Utc::now());

        self.execute_request(operation, async {
            let response = self
                .request(Method::PATCH)
                .query(filters)
                .header("Prefer", "return=representation")
                .json(&body)
                .send()
                .await?;
            let status = response.status();

            match status {
                StatusCode::OK => {
                    let rows: Vec<serde_json::Value> = response.json().await?;
                    Ok(rows)
                }
                // A proxy that strips the representation still reports success.
                StatusCode::NO_CONTENT => Err(StoreError::InvalidResponse(
                    "update returned no representation; cannot tell whether a row matched"
                        .to_string(),
                )),
                _ => Err(Self::handle_error_response(status, response).await),
            }
        })
        .await
    }

    /// Execute a request with tracing and metrics.
    async fn execute_request<T, F>(&self, operation: &str, fut: F) -> StoreResult<T>
    where
        F: std::future::Future<Output = StoreResult<T>>,
    {
        let span = info_span!("store_request", operation = %operation, table = %self.config.table);

        let start = Instant::now();
        let result = fut.instrument(span).await;
        let latency_ms = start.elapsed().as_millis() as f64;

        let status = match &result {
            Ok(_) => 200,
            Err(e) => e.http_status().unwrap_or(0),
        };
        record_request(operation, status, latency_ms);

        result
    }

    async fn handle_error_response(status: StatusCode, response: reqwest::Response) -> StoreError {
        let retry_after_ms = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(|secs| secs * 1000);
        let body = response.text().await.unwrap_or_default();

        match (status, retry_after_ms) {
            (StatusCode::TOO_MANY_REQUESTS, Some(ms)) => StoreError::RateLimited(ms),
            _ => StoreError::from_http_status(status.as_u16(), body),
        }
    }
}

#[async_trait]
impl JobStore for RestJobStore {
    async fn claim_oldest_ready(&self) -> StoreResult<Option<Job>> {
        let query = [
            ("select", "*".to_string()),
            ("status", format!("eq.{}", JobStatus::Ready)),
            ("order", "created_at.asc".to_string()),
            ("limit", "1".to_string()),
        ];

        let mut rows = self.select("claim_oldest_ready", &query).await?;
        Ok(if rows.is_empty() { None } else { Some(rows.swap_remove(0)) })
    }

    async fn update(&self, id: &JobId, patch: &JobPatch) -> StoreResult<()> {
        let filters = [("id", format!("eq.{}", id))];
        let rows = self.patch("update", &filters, patch).await?;

        if rows.is_empty() {
            return Err(StoreError::NotFound(format!("{}/{}", self.config.table, id)));
        }
        Ok(())
    }

    async fn update_if_status(
        &self,
        id: &JobId,
        expected: JobStatus,
        patch: &JobPatch,
    ) -> StoreResult<bool> {
        let filters = [
            ("id", format!("eq.{}", id)),
            ("status", format!("eq.{}", expected)),
        ];
        let rows = self.patch("update_if_status", &filters, patch).await?;

        if rows.is_empty() {
            debug!(job_id = %id, expected = %expected, "Status guard did not hold");
        }
        Ok(!rows.is_empty())
    }

    async fn list_stale(
        &self,
        status: JobStatus,
        updated_before: DateTime<Utc>,
        limit: usize,
    ) -> StoreResult<Vec<Job>> {
        let query = [
            ("select", "*".to_string()),
            ("status", format!("eq.{}", status)),
            ("updated_at", format!("lt.{}", updated_before.to_rfc3339())),
            ("order", "updated_at.asc".to_string()),
            ("limit", limit.to_string()),
        ];

        self.select("list_stale", &query).await
    }
}

// =============================================================================
// Tests
// =============================================================================
