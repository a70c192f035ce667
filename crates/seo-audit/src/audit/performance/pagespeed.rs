use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use super::lighthouse::PageSpeedResponse;
use super::{PerformanceApi, PerformanceError, PerformanceResult};

const PAGESPEED_ENDPOINT: &str = "https://www.googleapis.com/pagespeedonline/v5/runPagespeed";
const STRATEGY: &str = "mobile";
const CATEGORIES: [&str; 4] = ["performance", "accessibility", "best-practices", "seo"];

/// PageSpeed Insights v5 transport.
pub struct PageSpeedApi {
    http: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
}

impl PageSpeedApi {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self, PerformanceError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| PerformanceError::UpstreamError {
                message: err.to_string(),
                transient: false,
            })?;
        Ok(Self {
            http,
            api_key,
            endpoint: PAGESPEED_ENDPOINT.to_string(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn query(&self, url: &str) -> Vec<(&'static str, String)> {
        let mut query = vec![("url", url.to_string()), ("strategy", STRATEGY.to_string())];
        query.extend(CATEGORIES.iter().map(|category| ("category", category.to_string())));
        if let Some(key) = self.api_key.as_deref() {
            query.push(("key", key.to_string()));
        }
        query
    }
}

fn classify_status(status: StatusCode, body: String) -> PerformanceError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return PerformanceError::QuotaExceeded;
    }
    PerformanceError::UpstreamError {
        message: format!("HTTP {}: {body}", status.as_u16()),
        transient: status.is_server_error(),
    }
}

fn classify_transport(err: reqwest::Error) -> PerformanceError {
    if err.is_timeout() {
        return PerformanceError::Timeout;
    }
    PerformanceError::UpstreamError {
        transient: err.is_connect(),
        message: err.to_string(),
    }
}

#[async_trait]
impl PerformanceApi for PageSpeedApi {
    async fn run(&self, url: &str) -> Result<PerformanceResult, PerformanceError> {
        tracing::debug!(%url, endpoint = %self.endpoint, "requesting PageSpeed report");

        let response = self
            .http
            .get(&self.endpoint)
            .query(&self.query(url))
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let body: PageSpeedResponse =
            response
                .json()
                .await
                .map_err(|err| PerformanceError::UpstreamError {
                    message: format!("malformed PageSpeed response: {err}"),
                    transient: false,
                })?;
        Ok(body.lighthouse_result.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_and_server_errors_are_classified() {
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, String::new()),
            PerformanceError::QuotaExceeded
        );
        assert!(classify_status(StatusCode::BAD_GATEWAY, String::new()).is_retryable());
        assert!(!classify_status(StatusCode::BAD_REQUEST, "bad url".into()).is_retryable());
    }

    #[test]
    fn query_lists_every_category_and_optional_key() {
        let api = PageSpeedApi::new(Some("secret".to_string()), Duration::from_secs(1))
            .expect("client builds");
        let query = api.query("https://example.com/");
        let categories: Vec<&str> = query
            .iter()
            .filter(|(name, _)| *name == "category")
            .map(|(_, value)| value.as_str())
            .collect();

        assert_eq!(categories, CATEGORIES.to_vec());
        assert!(query.contains(&("strategy", "mobile".to_string())));
        assert!(query.contains(&("key", "secret".to_string())));

        let anonymous = PageSpeedApi::new(None, Duration::from_secs(1)).expect("client builds");
        assert!(!anonymous
            .query("https://example.com/")
            .iter()
            .any(|(name, _)| *name == "key"));
    }
}
