use super::common::*;
use crate::audit::checkers::{standard_registry, MetaDescriptionChecker, TitleChecker};
use crate::audit::domain::{ContentUnit, FindingKey, Severity, UnitType};
use crate::audit::pipeline::{CheckerPipeline, PerformanceCache, PipelineOptions, UnitFindings};
use crate::audit::registry::CheckerRegistry;
use std::collections::BTreeSet;
use std::sync::Arc;

fn options(per_type_performance: bool, include_developer_findings: bool) -> PipelineOptions {
    PipelineOptions {
        workers: 3,
        per_type_performance,
        include_developer_findings,
    }
}

fn mixed_site() -> Vec<ContentUnit> {
    vec![
        healthy_page("news-1", "blog_page"),
        healthy_page("news-2", "blog_page"),
        healthy_page("open-day", "event_page"),
        healthy_page("news-3", "blog_page"),
        healthy_page("tasting", "event_page"),
    ]
}

fn performance_pipeline(api: Arc<CountingApi>, options: PipelineOptions) -> CheckerPipeline {
    let registry = standard_registry(
        [UnitType::new("blog_page"), UnitType::new("event_page")],
        Some(counting_client(api)),
    );
    CheckerPipeline::new(Arc::new(registry), options)
}

fn performance_findings(unit: &UnitFindings) -> usize {
    unit.findings
        .iter()
        .filter(|finding| finding.checker_name == "performance")
        .count()
}

#[tokio::test]
async fn per_type_mode_calls_api_once_per_type() {
    let api = Arc::new(CountingApi::default());
    let pipeline = performance_pipeline(api.clone(), options(true, true));

    let results = pipeline.run(mixed_site()).await;

    assert_eq!(api.calls(), 2);
    assert_eq!(results.len(), 5);
    for unit in &results {
        assert_eq!(performance_findings(unit), 5, "unit {}", unit.unit_id);
        assert!(unit
            .findings
            .iter()
            .all(|finding| finding.content_unit_id == unit.unit_id));
    }
}

#[tokio::test]
async fn per_type_mode_skips_representatives_without_url() {
    let api = Arc::new(CountingApi::default());
    let pipeline = performance_pipeline(api.clone(), options(true, true));
    let mut draft = healthy_page("news-draft", "blog_page");
    draft.url = None;
    let site = vec![
        draft,
        healthy_page("news-1", "blog_page"),
        healthy_page("news-2", "blog_page"),
    ];

    let results = pipeline.run(site).await;

    assert_eq!(api.calls(), 1);
    assert!(results.iter().all(|unit| performance_findings(unit) == 5));
}

#[tokio::test]
async fn per_unit_mode_calls_api_for_every_unit() {
    let api = Arc::new(CountingApi::default());
    let pipeline = performance_pipeline(api.clone(), options(false, true));

    let results = pipeline.run(mixed_site()).await;

    assert_eq!(api.calls(), 5);
    assert!(results.iter().all(|unit| performance_findings(unit) == 5));
}

#[tokio::test]
async fn failing_and_panicking_checkers_become_findings() {
    let mut registry = CheckerRegistry::new();
    let page_type = UnitType::new("standard_page");
    registry
        .register(page_type.clone(), Arc::new(TitleChecker))
        .register(page_type.clone(), Arc::new(FailingChecker))
        .register(page_type.clone(), Arc::new(PanickingChecker))
        .register(page_type, Arc::new(MetaDescriptionChecker));
    let pipeline = CheckerPipeline::new(Arc::new(registry), options(false, true));

    let result = pipeline
        .evaluate_unit(&bare_page("about", "standard_page"), &PerformanceCache::default())
        .await;

    assert_eq!(
        categories(&result.findings),
        vec![
            "title_missing",
            "checker_error",
            "checker_error",
            "meta_description_missing"
        ]
    );
    assert_eq!(result.findings[1].severity, Severity::High);
    assert_eq!(
        result.findings[1].message,
        "Checker 'schema' failed: checker could not read field 'schema_markup'"
    );
    assert_eq!(result.findings[2].checker_name, "links");
    assert_eq!(
        result.findings[2].message,
        "Checker 'links' failed: link graph exploded"
    );
}

#[tokio::test]
async fn excluding_developer_fixes_skips_performance_but_keeps_checker_errors() {
    let api = Arc::new(CountingApi::default());
    let mut registry = standard_registry(
        [UnitType::new("blog_page")],
        Some(counting_client(api.clone())),
    );
    registry.register(UnitType::new("blog_page"), Arc::new(FailingChecker));
    let pipeline = CheckerPipeline::new(Arc::new(registry), options(true, false));

    let results = pipeline.run(vec![bare_page("news-1", "blog_page")]).await;

    assert_eq!(api.calls(), 0);
    assert_eq!(
        categories(&results[0].findings),
        vec!["title_missing", "meta_description_missing", "checker_error"]
    );
}

#[tokio::test]
async fn unknown_unit_types_produce_no_findings() {
    let pipeline = CheckerPipeline::new(content_registry(&["blog_page"]), options(false, true));
    let result = pipeline
        .evaluate_unit(&bare_page("footer", "snippet"), &PerformanceCache::default())
        .await;
    assert!(result.findings.is_empty());
}

#[tokio::test]
async fn identical_content_yields_identical_findings() {
    let pipeline = CheckerPipeline::new(
        content_registry(&["home_page", "standard_page"]),
        options(false, true),
    );
    let keys = |results: Vec<UnitFindings>| -> BTreeSet<FindingKey> {
        results
            .into_iter()
            .flat_map(|unit| unit.findings)
            .map(|finding| finding.key())
            .collect()
    };

    let first = keys(pipeline.run(bakery_site()).await);
    let second = keys(pipeline.run(bakery_site()).await);

    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
}
