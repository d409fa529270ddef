//! # SkySpark Client
//!
//! Drives one Axon request end to end: compose URL, send, classify, and on a
//! stale token refresh once and resend, then parse. Higher-level helpers
//! build the common `readAll` / `hisRead` queries on top of it.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Method;
use serde_json::json;
use tokio::time::sleep;
use url::Url;

use super::auth::Credential;
use super::classify::classify;
use super::error::{AxonError, Result};
use super::parse::{AxonResult, ResultFormat, ResultKind, ResultParser};
use super::query::{compose_url, point_ref, project_root, AxonQuery, HisRange, TagFilter};
use super::table::{MetadataTable, TimeSeriesTable};
use super::RawResponse;
use crate::configs::config_sys::SysConfig;
use crate::loggers::loggerlocal::LoggerLocal;
use crate::retrieve::ky_http::ApiClient;

/// Delay between a token refresh and the resend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    None,
    /// `step * attempt`
    Linear(Duration),
    /// `base * 2^(attempt - 1)`, capped at `max`
    Exponential { base: Duration, max: Duration },
}

/// Bounds the sends of one request.
///
/// A request re-authenticates at most once, so it never sends more than
/// twice; `max_attempts = 1` disables the re-authentication entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::None,
        }
    }
}

impl RetryPolicy {
    /// Wait before attempt `attempt + 1`, `None` for no wait.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        match self.backoff {
            Backoff::None => None,
            Backoff::Linear(step) => Some(step.saturating_mul(attempt)),
            Backoff::Exponential { base, max } => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                Some(base.saturating_mul(factor).min(max))
            }
        }
    }
}

pub struct SkysparkClient {
    api: ApiClient,
    parser: ResultParser,
    policy: RetryPolicy,
    logger: Arc<LoggerLocal>,
}

impl SkysparkClient {
    /// Creates a client for the project API at `host` (e.g. `http://host/api/demo/`).
    ///
    /// A host path without a trailing `/` gets one.
    pub fn new(host: Url, logger: Arc<LoggerLocal>) -> Self {
        Self {
            api: ApiClient::new(project_root(&host), 0),
            parser: ResultParser::default(),
            policy: RetryPolicy::default(),
            logger,
        }
    }

    pub fn from_config(config: &SysConfig, logger: Arc<LoggerLocal>) -> Self {
        Self::new(config.host_address.clone(), logger)
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_parser(mut self, parser: ResultParser) -> Self {
        self.parser = parser;
        self
    }

    /// Installs the transport-level retry middleware for connection failures.
    pub fn with_transient_retries(mut self, retries: u32) -> Self {
        self.api = ApiClient::new(self.api.base_url().clone(), retries);
        self
    }

    pub fn host(&self) -> &Url {
        self.api.base_url()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Sends `query` and returns the parsed result.
    ///
    /// At most one re-authentication happens per call, triggered by a 403 or
    /// by a 200 whose JSON body cannot be decoded.
    pub async fn request(
        &self,
        credential: &mut Credential,
        query: &AxonQuery,
        format: ResultFormat,
        kind: ResultKind,
    ) -> Result<AxonResult> {
        let url = compose_url(self.api.base_url(), query)?;
        let mut reauth_available = true;
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.logger
                .debug(
                    "Sending Axon request",
                    Some(json!({ "query": query.as_str(), "attempt": attempt, "accept": format.mime() })),
                )
                .await;

            let may_reauth = reauth_available && attempt < self.policy.max_attempts;
            match self.attempt(credential, url.clone(), format, kind, may_reauth).await {
                Ok(result) => return Ok(result),
                Err(AxonError::AuthExpired) if attempt < self.policy.max_attempts => {
                    reauth_available = false;
                    self.logger
                        .warn(
                            &format!(
                                "Authorization expired, token refreshed (Attempt {}/{})",
                                attempt, self.policy.max_attempts
                            ),
                            Some(json!({ "query": query.as_str(), "refreshes": credential.refresh_count() })),
                        )
                        .await;
                    if let Some(wait) = self.policy.delay(attempt) {
                        sleep(wait).await;
                    }
                }
                Err(err) => {
                    let err = match err {
                        AxonError::AuthExpired => AxonError::UnknownHttp { status: 403 },
                        other => other,
                    };
                    self.logger
                        .error(
                            &format!("Axon request failed: {}", err),
                            Some(json!({ "query": query.as_str(), "attempt": attempt, "kind": err.label() })),
                        )
                        .await;
                    return Err(err);
                }
            }
        }
    }

    async fn attempt(
        &self,
        credential: &mut Credential,
        url: Url,
        format: ResultFormat,
        kind: ResultKind,
        reauth_available: bool,
    ) -> Result<AxonResult> {
        let response = self.send(credential, url, format).await?;
        classify(&response, credential, reauth_available).await?;

        if format == ResultFormat::Json {
            let grid = match ResultParser::decode_json(&response.body) {
                Ok(grid) => grid,
                Err(err) if reauth_available => {
                    self.logger
                        .warn("Undecodable JSON on 200, re-authenticating", Some(json!({ "reason": err.to_string() })))
                        .await;
                    credential.refresh().await?;
                    return Err(AxonError::AuthExpired);
                }
                Err(err) => return Err(err),
            };
            return self.parser.parse_grid(&grid, kind);
        }
        self.parser.parse(&response, format, kind)
    }

    async fn send(&self, credential: &Credential, url: Url, format: ResultFormat) -> Result<RawResponse> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&credential.authorization_header())
            .map_err(|e| AxonError::Authentication(format!("token is not a valid header value: {}", e)))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static(format.mime()));

        Ok(self.api.request(Method::GET, url, Some(headers)).await?)
    }

    /// JSON request read as `kind`.
    pub async fn query_data(
        &self,
        credential: &mut Credential,
        query: &AxonQuery,
        kind: ResultKind,
    ) -> Result<AxonResult> {
        self.request(credential, query, ResultFormat::Json, kind).await
    }

    /// Point records matching a `readAll(...)` query.
    pub async fn read_all(&self, credential: &mut Credential, query: &AxonQuery) -> Result<MetadataTable> {
        self.query_data(credential, query, ResultKind::Metadata)
            .await?
            .into_metadata()
    }

    /// History of a `...hisRead(...)` query.
    pub async fn his_read(&self, credential: &mut Credential, query: &AxonQuery) -> Result<TimeSeriesTable> {
        self.query_data(credential, query, ResultKind::TimeSeries)
            .await?
            .into_time_series()
    }

    /// Runs a free-form query; `.hisRead` selects time-series parsing, anything else metadata.
    pub async fn query(&self, credential: &mut Credential, query: &str) -> Result<AxonResult> {
        let query = AxonQuery::new(query)?;
        let kind = if query.is_his_read() {
            ResultKind::TimeSeries
        } else {
            ResultKind::Metadata
        };
        self.query_data(credential, &query, kind).await
    }

    /// Meters matching `filter`.
    pub async fn get_metadata(&self, credential: &mut Credential, filter: &TagFilter) -> Result<MetadataTable> {
        let query = AxonQuery::read_all(filter)?;
        self.read_all(credential, &query).await
    }

    /// Full history (from 2010-01-01 to `until`) of every equipment in `meta`.
    pub async fn get_ts_from_meta(
        &self,
        credential: &mut Credential,
        meta: &MetadataTable,
        until: NaiveDate,
    ) -> Result<TimeSeriesTable> {
        self.read_each_equip(credential, meta, &HisRange::full_history(until)).await
    }

    /// Current value of every equipment in `meta`.
    pub async fn query_now(&self, credential: &mut Credential, meta: &MetadataTable) -> Result<TimeSeriesTable> {
        self.read_each_equip(credential, meta, &HisRange::Now).await
    }

    async fn read_each_equip(
        &self,
        credential: &mut Credential,
        meta: &MetadataTable,
        range: &HisRange,
    ) -> Result<TimeSeriesTable> {
        let mut combined = TimeSeriesTable::default();
        for id in meta.ids() {
            let query = AxonQuery::read_all_expr(&format!("equipRef==@{}", point_ref(&id)))?.his_read(range);
            let series = self.his_read(credential, &query).await?;
            combined.append(series);
        }
        self.logger
            .info(
                &format!("Read {} rows for {} equipment", combined.len(), meta.len()),
                Some(json!({ "range": range.to_string(), "columns": combined.columns() })),
            )
            .await;
        Ok(combined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay(1), None);
    }

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff: Backoff::Linear(Duration::from_millis(100)),
        };
        assert_eq!(policy.delay(1), Some(Duration::from_millis(100)));
        assert_eq!(policy.delay(2), Some(Duration::from_millis(200)));
    }

    #[test]
    fn test_exponential_backoff_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 5,
            backoff: Backoff::Exponential {
                base: Duration::from_millis(100),
                max: Duration::from_millis(300),
            },
        };
        assert_eq!(policy.delay(1), Some(Duration::from_millis(100)));
        assert_eq!(policy.delay(2), Some(Duration::from_millis(200)));
        assert_eq!(policy.delay(3), Some(Duration::from_millis(300)));
        assert_eq!(policy.delay(10), Some(Duration::from_millis(300)));
    }

    #[test]
    fn test_client_keeps_host() {
        let host = Url::parse("http://skyspark.example.org/api/demo/").unwrap();
        let client = SkysparkClient::new(host.clone(), Arc::new(LoggerLocal::silent("test")));
        assert_eq!(client.host(), &host);
        assert_eq!(client.policy(), &RetryPolicy::default());

        let bare = Url::parse("http://skyspark.example.org/api/demo").unwrap();
        let client = SkysparkClient::new(bare, Arc::new(LoggerLocal::silent("test")));
        assert_eq!(client.host(), &host);
    }
}
