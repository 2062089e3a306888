//! Analytics API client
//!
//! One call = one `(period, source)` pair scoped to the program's
//! organisation unit group. The endpoint answers `{}` when it has no data
//! for the selection; that is a normal outcome, distinct from a failure.

use crate::error::{EtlError, EtlResult};
use crate::models::{HeaderColumn, HeaderSchema, OrgScope, Period, RawBatch, Source};
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use serde::Deserialize;
use serde_json::Value;
use std::num::NonZeroU32;
use std::time::Duration;

const USER_AGENT: &str = concat!("echo-etl/", env!("CARGO_PKG_VERSION"));
const ANALYTICS_ENDPOINT: &str = "analytics";

/// Result of a call that reached the endpoint and parsed
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// Payload with headers and (possibly zero) rows
    Data(RawBatch),
    /// The canonical "no data" response
    Empty,
}

/// Performs one logical fetch
///
/// `Err(EtlError::TransientFetch)` is the failure case; callers decide
/// whether it aborts anything (the retriever treats it as `Empty`).
#[async_trait]
pub trait MetricFetcher: Send + Sync {
    async fn fetch(
        &self,
        period: &Period,
        source: &Source,
        scope: &OrgScope,
    ) -> EtlResult<FetchOutcome>;
}

/// Connection settings for the analytics API
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// e.g. `https://dhis2.example.org/api/29`
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub timeout: Duration,
    pub requests_per_second: NonZeroU32,
}

/// Analytics payload as sent by the server
#[derive(Debug, Deserialize)]
struct AnalyticsPayload {
    #[serde(default)]
    headers: Vec<HeaderColumn>,
    #[serde(default)]
    rows: Vec<Vec<Value>>,
}

/// HTTP client for the analytics API and its metadata endpoints
pub struct AnalyticsClient {
    http_client: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    /// Shared by every call made through this client, across workers
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl AnalyticsClient {
    pub fn new(settings: &ClientSettings) -> EtlResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| EtlError::Bootstrap(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            username: settings.username.clone(),
            password: settings.password.clone(),
            rate_limiter: RateLimiter::direct(Quota::per_second(settings.requests_per_second)),
        })
    }

    /// GET `<base_url>/<endpoint>` and return the body of a 2xx response
    ///
    /// Errors are returned as a reason string; callers wrap them in the
    /// variant that fits their failure policy.
    pub(crate) async fn get_body(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<String, String> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/{}", self.base_url, endpoint);
        tracing::debug!(url = %url, ?query, "GET");

        let response = self
            .http_client
            .get(&url)
            .basic_auth(&self.username, Some(&self.password))
            .query(query)
            .send()
            .await
            .map_err(|e| format!("network error: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("HTTP {}: {}", status.as_u16(), truncate(&body, 200)));
        }

        response
            .text()
            .await
            .map_err(|e| format!("body read error: {}", e))
    }
}

#[async_trait]
impl MetricFetcher for AnalyticsClient {
    async fn fetch(
        &self,
        period: &Period,
        source: &Source,
        scope: &OrgScope,
    ) -> EtlResult<FetchOutcome> {
        let query = analytics_query(period, source, scope);
        let failure = |reason: String| EtlError::TransientFetch {
            source_id: source.id.clone(),
            period: period.to_string(),
            reason,
        };

        let body = self.get_body(ANALYTICS_ENDPOINT, &query).await.map_err(failure)?;

        match parse_analytics_payload(&body).map_err(failure)? {
            None => Ok(FetchOutcome::Empty),
            Some((schema, rows)) => Ok(FetchOutcome::Data(RawBatch {
                source: source.clone(),
                period: period.clone(),
                schema,
                rows,
            })),
        }
    }
}

/// Dimension selectors for one call
///
/// Data-element sources also request the `co` dimension so the response
/// carries the disaggregation column.
pub fn analytics_query(period: &Period, source: &Source, scope: &OrgScope) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("dimension", format!("pe:{}", period)),
        ("dimension", format!("dx:{}", source.dx_selector())),
    ];
    if source.kind.has_disaggregation() {
        query.push(("dimension", "co".to_string()));
    }
    query.push(("dimension", format!("ou:{}", scope.ou_selector())));
    query
}

/// `Ok(None)` for the empty object, `Ok(Some(..))` for a payload, `Err` for
/// anything that is not a JSON object of the expected shape
fn parse_analytics_payload(body: &str) -> Result<Option<(HeaderSchema, Vec<Vec<String>>)>, String> {
    let value: Value = serde_json::from_str(body.trim())
        .map_err(|e| format!("malformed JSON: {}", e))?;

    match &value {
        Value::Object(map) if map.is_empty() => return Ok(None),
        Value::Object(_) => {}
        other => return Err(format!("expected JSON object, got {}", type_name(other))),
    }

    let payload: AnalyticsPayload =
        serde_json::from_value(value).map_err(|e| format!("unexpected payload shape: {}", e))?;

    let rows = payload
        .rows
        .into_iter()
        .map(|row| row.into_iter().map(cell_to_string).collect())
        .collect();

    Ok(Some((HeaderSchema::new(payload.headers), rows)))
}

fn cell_to_string(cell: Value) -> String {
    match cell {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
