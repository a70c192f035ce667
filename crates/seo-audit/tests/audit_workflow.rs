//! Integration specifications for the audit run workflow.
//!
//! Scenarios drive the public orchestrator facade over an in-memory content tree: synchronous
//! runs, scheduled requests, performance propagation across unit types, resolution of
//! placeholder metadata and CSV export of the stored findings.

mod common {
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use seo_audit::audit::{
        AccessorError, AuditOrchestrator, CheckerPipeline, ContentAccessor, ContentUnit,
        ContentUnitId, FieldValue, InMemoryAuditRuns, InMemoryRequestQueue, InMemoryScopeLock,
        PipelineOptions, RateLimitedClient, Scope, ScopeLock, UnitType,
    };

    pub(super) const TITLE: &str = "Seasonal baking classes for families and beginners";
    pub(super) const DESCRIPTION: &str = "Join a hands-on class in our open kitchen and learn \
         to shape loaves, fold croissant dough and bake bread you can take home the same day.";

    pub(super) fn unit(id: &str, unit_type: &str, fields: &[(&str, FieldValue)]) -> ContentUnit {
        ContentUnit {
            id: ContentUnitId(id.to_string()),
            unit_type: UnitType::new(unit_type),
            url: Some(format!("https://bakery.example/{id}/")),
            fields: fields
                .iter()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    pub(super) fn text(value: &str) -> FieldValue {
        FieldValue::Text(value.to_string())
    }

    pub(super) fn healthy(id: &str, unit_type: &str) -> ContentUnit {
        unit(
            id,
            unit_type,
            &[("title", text(TITLE)), ("search_description", text(DESCRIPTION))],
        )
    }

    /// Content store whose pages can be edited between runs.
    #[derive(Default)]
    pub(super) struct EditableContent {
        units: Mutex<Vec<ContentUnit>>,
    }

    impl EditableContent {
        pub(super) fn new(units: Vec<ContentUnit>) -> Self {
            Self {
                units: Mutex::new(units),
            }
        }

        pub(super) fn replace(&self, unit: ContentUnit) {
            let mut units = self.units.lock().expect("content mutex");
            match units.iter_mut().find(|existing| existing.id == unit.id) {
                Some(existing) => *existing = unit,
                None => units.push(unit),
            }
        }
    }

    #[async_trait]
    impl ContentAccessor for EditableContent {
        async fn list_units(&self, scope: &Scope) -> Result<Vec<ContentUnit>, AccessorError> {
            let units = self
                .units
                .lock()
                .map_err(|_| AccessorError::Unreachable("content mutex".to_string()))?;
            Ok(units
                .iter()
                .filter(|unit| scope.contains(&unit.id))
                .cloned()
                .collect())
        }

        async fn get_unit(
            &self,
            id: &ContentUnitId,
        ) -> Result<Option<ContentUnit>, AccessorError> {
            let units = self
                .units
                .lock()
                .map_err(|_| AccessorError::Unreachable("content mutex".to_string()))?;
            Ok(units.iter().find(|unit| &unit.id == id).cloned())
        }
    }

    pub(super) type Orchestrator =
        AuditOrchestrator<EditableContent, InMemoryAuditRuns, InMemoryRequestQueue>;

    pub(super) fn orchestrator(
        content: Arc<EditableContent>,
        unit_types: &[&str],
        performance: Option<Arc<RateLimitedClient>>,
        options: PipelineOptions,
    ) -> Orchestrator {
        let registry = seo_audit::audit::standard_registry(
            unit_types.iter().map(|name| UnitType::new(*name)),
            performance,
        );
        let lock: Arc<dyn ScopeLock> = Arc::new(InMemoryScopeLock::new());
        AuditOrchestrator::new(
            content,
            Arc::new(InMemoryAuditRuns::new()),
            Arc::new(InMemoryRequestQueue::new()),
            lock,
            Arc::new(CheckerPipeline::new(Arc::new(registry), options)),
        )
    }
}

use std::collections::BTreeMap;
use std::sync::Arc;

use common::*;
use seo_audit::audit::export::write_findings;
use seo_audit::audit::{
    ContentUnit, ContentUnitId, FieldValue, PipelineOptions, RateLimitedClient, RequestStatus,
    RunStatus, Scope, Severity,
};
use seo_audit::placeholder::{MissingFieldPolicy, PlaceholderResolver};

#[tokio::test]
async fn dry_run_performance_findings_are_shared_across_a_type() {
    let content = Arc::new(EditableContent::new(vec![
        healthy("classes", "event_page"),
        healthy("open-day", "event_page"),
        healthy("news", "blog_page"),
    ]));
    let orchestrator = orchestrator(
        content,
        &["event_page", "blog_page"],
        Some(Arc::new(RateLimitedClient::dry_run())),
        PipelineOptions {
            workers: 2,
            per_type_performance: true,
            include_developer_findings: true,
        },
    );

    let run = orchestrator.start_run(Scope::All).await.expect("run executes");

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.findings.len(), 15);
    assert!(run.findings.iter().all(|finding| finding.requires_developer));
    let open_day: Vec<&str> = run
        .findings
        .iter()
        .filter(|finding| finding.content_unit_id.0 == "open-day")
        .map(|finding| finding.category.as_str())
        .collect();
    assert_eq!(
        open_day,
        vec![
            "pagespeed_performance_score_low",
            "pagespeed_accessibility_score_low",
            "pagespeed_best_practices_score_critical",
            "pagespeed_audit_unused_css_rules",
            "pagespeed_audit_uses_text_compression",
        ]
    );
    // 26 points of penalty on every unit
    assert_eq!(run.score, 74);
    assert_eq!(run.summary().high, 3);
}

#[tokio::test]
async fn excluding_developer_fixes_scores_content_only() {
    let content = Arc::new(EditableContent::new(vec![healthy("news", "blog_page")]));
    let orchestrator = orchestrator(
        content,
        &["blog_page"],
        Some(Arc::new(RateLimitedClient::dry_run())),
        PipelineOptions {
            include_developer_findings: false,
            ..PipelineOptions::default()
        },
    );

    let run = orchestrator.start_run(Scope::All).await.expect("run executes");
    assert!(run.findings.is_empty());
    assert_eq!(run.score, 100);
}

#[tokio::test]
async fn resolving_placeholders_clears_unprocessed_findings() {
    let template_title = "{title} | {site_name}";
    let draft = unit(
        "sourdough",
        "blog_page",
        &[
            ("title", text("Sourdough loaves baked daily in our wood oven")),
            ("seo_title", text(template_title)),
            ("search_description", text(DESCRIPTION)),
        ],
    );
    let content = Arc::new(EditableContent::new(vec![draft.clone()]));
    let orchestrator = orchestrator(
        content.clone(),
        &["blog_page"],
        None,
        PipelineOptions::default(),
    );

    let before = orchestrator.start_run(Scope::All).await.expect("run executes");
    let unprocessed = before
        .findings
        .iter()
        .find(|finding| finding.category == "placeholder_unprocessed")
        .expect("placeholder finding");
    assert_eq!(unprocessed.severity, Severity::High);
    assert!(unprocessed.message.contains("seo_title: {site_name}"));

    let resolver =
        PlaceholderResolver::new(MissingFieldPolicy::Empty).with_global("site_name", "Bakery");
    let resolved_title = resolver
        .resolve_unit(template_title, &draft)
        .expect("template is valid");
    assert_eq!(
        resolved_title,
        "Sourdough loaves baked daily in our wood oven | Bakery"
    );

    let mut fields: BTreeMap<String, FieldValue> = draft.fields.clone();
    fields.insert("seo_title".to_string(), text(&resolved_title));
    content.replace(ContentUnit { fields, ..draft });

    let after = orchestrator.start_run(Scope::All).await.expect("run executes");
    assert!(after.findings.is_empty(), "{:?}", after.findings);
    assert_eq!(after.score, 100);
}

#[tokio::test]
async fn scheduled_requests_run_through_the_queue() {
    let content = Arc::new(EditableContent::new(vec![
        healthy("classes", "event_page"),
        unit("contact", "standard_page", &[]),
    ]));
    let orchestrator = orchestrator(
        content,
        &["event_page", "standard_page"],
        None,
        PipelineOptions::default(),
    );

    let all = orchestrator.enqueue(Scope::All).expect("enqueue");
    let again = orchestrator.enqueue(Scope::All).expect("enqueue");
    assert!(again.coalesced);
    let contact = orchestrator
        .enqueue(Scope::units([ContentUnitId("contact".to_string())]))
        .expect("enqueue");

    let outcomes = orchestrator.drain_scheduled().await.expect("drain");
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes
        .iter()
        .all(|outcome| outcome.request.status == RequestStatus::Done));

    let stored = orchestrator.request(&all.request.id).expect("known request");
    let run_id = stored.run_id.expect("run attached");
    let run = orchestrator.run(&run_id).expect("stored run");
    assert_eq!(run.units_audited.len(), 2);
    assert_eq!(run.request_id, Some(all.request.id));

    let contact_run = orchestrator
        .request(&contact.request.id)
        .expect("known request")
        .run_id
        .expect("run attached");
    assert_eq!(orchestrator.run(&contact_run).expect("stored").score, 86);
}

#[tokio::test]
async fn findings_export_as_csv() {
    let content = Arc::new(EditableContent::new(vec![unit(
        "contact",
        "standard_page",
        &[],
    )]));
    let orchestrator = orchestrator(
        content,
        &["standard_page"],
        None,
        PipelineOptions::default(),
    );
    let run = orchestrator.start_run(Scope::All).await.expect("run executes");

    let mut buffer = Vec::new();
    write_findings(&run, &mut buffer).expect("export succeeds");
    let csv = String::from_utf8(buffer).expect("utf-8");
    let lines: Vec<&str> = csv.lines().collect();

    assert_eq!(lines.len(), 3);
    assert!(lines[1].contains(",contact,title,title_missing,high,false,"));
    assert!(lines[2]
        .contains(",contact,meta_description,meta_description_missing,medium,false,"));
}
