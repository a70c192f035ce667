use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::audit::domain::{ContentUnit, Finding, Severity};
use crate::audit::registry::{Checker, CheckerError, CheckerRole};

use super::{findings_from_result, RateLimitedClient};

pub const PERFORMANCE_CHECKER: &str = "performance";

/// Checker backed by the rate-limited performance API.
pub struct PerformanceChecker {
    client: Arc<RateLimitedClient>,
}

impl PerformanceChecker {
    pub fn new(client: Arc<RateLimitedClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Checker for PerformanceChecker {
    fn name(&self) -> &str {
        PERFORMANCE_CHECKER
    }

    fn role(&self) -> CheckerRole {
        CheckerRole::Performance
    }

    async fn evaluate(&self, unit: &ContentUnit) -> Result<Vec<Finding>, CheckerError> {
        if unit.url.is_none() {
            return Ok(Vec::new());
        }

        match self.client.fetch(unit).await {
            Ok(result) => Ok(findings_from_result(&unit.id, PERFORMANCE_CHECKER, &result)),
            Err(err) => {
                warn!(unit = %unit.id, error = %err, "performance data unavailable");
                Ok(vec![Finding::new(
                    &unit.id,
                    PERFORMANCE_CHECKER,
                    "performance_unavailable",
                    Severity::Low,
                    format!("Performance data could not be collected: {err}"),
                )
                .for_developer()])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::domain::{ContentUnitId, UnitType};
    use crate::audit::performance::{
        ClientLimits, PerformanceApi, PerformanceError, PerformanceResult, RetryPolicy,
    };
    use std::collections::BTreeMap;
    use std::time::Duration;

    struct QuotaApi;

    #[async_trait]
    impl PerformanceApi for QuotaApi {
        async fn run(&self, _url: &str) -> Result<PerformanceResult, PerformanceError> {
            Err(PerformanceError::QuotaExceeded)
        }
    }

    fn unit(url: Option<&str>) -> ContentUnit {
        ContentUnit {
            id: ContentUnitId("landing".to_string()),
            unit_type: UnitType::new("landing_page"),
            url: url.map(str::to_string),
            fields: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn degrades_to_low_finding_when_quota_is_exhausted() {
        let limits = ClientLimits {
            max_in_flight: 1,
            min_spacing: Duration::ZERO,
            request_timeout: Duration::from_secs(1),
            retry: RetryPolicy::default(),
        };
        let checker =
            PerformanceChecker::new(Arc::new(RateLimitedClient::new(Arc::new(QuotaApi), limits)));

        let findings = checker
            .evaluate(&unit(Some("https://example.com/")))
            .await
            .expect("degraded, not failed");

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].category, "performance_unavailable");
        assert_eq!(findings[0].severity, Severity::Low);
        assert!(findings[0].requires_developer);
    }

    #[tokio::test]
    async fn units_without_url_produce_nothing() {
        let checker = PerformanceChecker::new(Arc::new(RateLimitedClient::dry_run()));
        let findings = checker.evaluate(&unit(None)).await.expect("no call made");
        assert!(findings.is_empty());
    }

    #[tokio::test]
    async fn dry_run_findings_are_attributed_to_unit() {
        let checker = PerformanceChecker::new(Arc::new(RateLimitedClient::dry_run()));
        let findings = checker
            .evaluate(&unit(Some("https://example.com/landing/")))
            .await
            .expect("dry run succeeds");

        assert_eq!(findings.len(), 5);
        assert!(findings
            .iter()
            .all(|f| f.content_unit_id.0 == "landing" && f.checker_name == PERFORMANCE_CHECKER));
    }
}
