//! Quota-aware access to the third-party performance API.
//!
//! Calls go through [`RateLimitedClient`], which caps in-flight requests, spaces successive
//! requests, applies the per-call timeout and retries transient failures with exponential
//! backoff. Quota exhaustion is never retried.

mod checker;
mod lighthouse;
mod pagespeed;

pub use checker::{PerformanceChecker, PERFORMANCE_CHECKER};
pub use lighthouse::{dry_run_result, findings_from_result, FailedAudit, PerformanceResult};
pub use pagespeed::PageSpeedApi;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::config::PerformanceConfig;

use super::domain::ContentUnit;

/// Transport-level contract for the performance API.
#[async_trait]
pub trait PerformanceApi: Send + Sync {
    async fn run(&self, url: &str) -> Result<PerformanceResult, PerformanceError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PerformanceError {
    #[error("performance API quota exceeded")]
    QuotaExceeded,
    #[error("performance API call timed out")]
    Timeout,
    #[error("performance API error: {message}")]
    UpstreamError { message: String, transient: bool },
}

impl PerformanceError {
    pub fn is_retryable(&self) -> bool {
        match self {
            PerformanceError::QuotaExceeded => false,
            PerformanceError::Timeout => true,
            PerformanceError::UpstreamError { transient, .. } => *transient,
        }
    }
}

/// Attempts include the first call. Delay doubles after every failed attempt.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

/// Limits applied around every API call.
#[derive(Debug, Clone)]
pub struct ClientLimits {
    pub max_in_flight: usize,
    pub min_spacing: Duration,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl From<&PerformanceConfig> for ClientLimits {
    fn from(config: &PerformanceConfig) -> Self {
        Self {
            max_in_flight: config.max_in_flight,
            min_spacing: config.min_spacing,
            request_timeout: config.request_timeout,
            retry: RetryPolicy {
                max_attempts: config.max_attempts,
                ..RetryPolicy::default()
            },
        }
    }
}

impl Default for ClientLimits {
    fn default() -> Self {
        Self::from(&PerformanceConfig::default())
    }
}

/// Synthetic transport used in dry-run mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunApi;

#[async_trait]
impl PerformanceApi for DryRunApi {
    async fn run(&self, _url: &str) -> Result<PerformanceResult, PerformanceError> {
        Ok(dry_run_result())
    }
}

pub struct RateLimitedClient {
    api: Arc<dyn PerformanceApi>,
    in_flight: Semaphore,
    spacing: Option<DefaultDirectRateLimiter>,
    limits: ClientLimits,
}

impl RateLimitedClient {
    pub fn new(api: Arc<dyn PerformanceApi>, limits: ClientLimits) -> Self {
        let spacing = Quota::with_period(limits.min_spacing).map(RateLimiter::direct);
        Self {
            api,
            in_flight: Semaphore::new(limits.max_in_flight.max(1)),
            spacing,
            limits,
        }
    }

    /// Client that never leaves the process; results are deterministic.
    pub fn dry_run() -> Self {
        let limits = ClientLimits {
            min_spacing: Duration::ZERO,
            ..ClientLimits::default()
        };
        Self::new(Arc::new(DryRunApi), limits)
    }

    /// Build the client described by configuration; `None` when performance checks are off.
    pub fn from_config(config: &PerformanceConfig) -> Result<Option<Self>, PerformanceError> {
        if !config.is_active() {
            return Ok(None);
        }
        if config.dry_run {
            return Ok(Some(Self::dry_run()));
        }
        let api = PageSpeedApi::new(config.api_key.clone(), config.request_timeout)?;
        Ok(Some(Self::new(Arc::new(api), ClientLimits::from(config))))
    }

    pub async fn fetch(&self, unit: &ContentUnit) -> Result<PerformanceResult, PerformanceError> {
        let Some(url) = unit.url.as_deref() else {
            return Err(PerformanceError::UpstreamError {
                message: format!("unit {} has no URL", unit.id),
                transient: false,
            });
        };

        let mut attempt = 1;
        loop {
            match self.call_once(url).await {
                Ok(result) => return Ok(result),
                Err(err) if err.is_retryable() && attempt < self.limits.retry.max_attempts => {
                    let delay = self.limits.retry.delay_for(attempt);
                    warn!(%url, attempt, ?delay, error = %err, "retrying performance API call");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn call_once(&self, url: &str) -> Result<PerformanceResult, PerformanceError> {
        let _permit = self
            .in_flight
            .acquire()
            .await
            .map_err(|_| PerformanceError::UpstreamError {
                message: "client shut down".to_string(),
                transient: false,
            })?;

        if let Some(spacing) = &self.spacing {
            spacing.until_ready().await;
        }

        debug!(%url, "calling performance API");
        match tokio::time::timeout(self.limits.request_timeout, self.api.run(url)).await {
            Ok(result) => result,
            Err(_) => Err(PerformanceError::Timeout),
        }
    }
}
