use crate::infra::{
    build_services, load_content, parse_pair, parse_scope, read_json, scope_from_ids, write_json,
};
use clap::Args;
use seo_audit::audit::export::export_to_path;
use seo_audit::audit::report::subject_for;
use seo_audit::audit::{
    compare, AuditRun, ComparisonPolicy, ComparisonReport, FieldValue, Finding, ReportError,
    Scope,
};
use seo_audit::config::AppConfig;
use seo_audit::error::AppError;
use seo_audit::placeholder::{MissingFieldPolicy, PlaceholderResolver};
use seo_audit::telemetry;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub(crate) struct AuditArgs {
    /// JSON content export (array of units)
    #[arg(long)]
    pub(crate) content: PathBuf,
    /// Restrict the audit to these unit ids (repeatable). Audits every unit when omitted.
    #[arg(long)]
    pub(crate) unit_id: Vec<String>,
    /// Write the run's findings to a CSV file
    #[arg(long)]
    pub(crate) export_csv: Option<PathBuf>,
    /// Save the full run as JSON for later comparison
    #[arg(long)]
    pub(crate) save_run: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct ScheduledArgs {
    /// JSON content export (array of units)
    #[arg(long)]
    pub(crate) content: PathBuf,
    /// Scope to queue: `all` or comma separated unit ids (repeatable, defaults to `all`)
    #[arg(long, value_parser = parse_scope)]
    pub(crate) scope: Vec<Scope>,
}

#[derive(Args, Debug)]
pub(crate) struct CompareArgs {
    /// Run saved with `audit --save-run` used as the baseline
    pub(crate) baseline: PathBuf,
    /// Run saved with `audit --save-run` compared against the baseline
    pub(crate) current: PathBuf,
    /// Accept failed runs and their partial findings
    #[arg(long)]
    pub(crate) allow_failed: bool,
    /// Number of new issues listed
    #[arg(long, default_value_t = 20)]
    pub(crate) top: usize,
}

#[derive(Args, Debug)]
pub(crate) struct ResolveArgs {
    /// Template such as `{title[:60]} | {site_name}`
    pub(crate) template: String,
    /// Field value as NAME=VALUE (repeatable)
    #[arg(long, value_parser = parse_pair)]
    pub(crate) field: Vec<(String, String)>,
    /// Site-wide value as NAME=VALUE (repeatable); fields take precedence
    #[arg(long, value_parser = parse_pair)]
    pub(crate) global: Vec<(String, String)>,
    /// Fallback for missing fields: `empty` or `literal` (defaults to configuration)
    #[arg(long)]
    pub(crate) missing: Option<MissingFieldPolicy>,
}

pub(crate) async fn run_audit(args: AuditArgs) -> Result<(), AppError> {
    let AuditArgs {
        content,
        unit_id,
        export_csv,
        save_run,
    } = args;

    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    let services = build_services(&config, load_content(&content)?)?;

    let run = services
        .orchestrator
        .start_run(scope_from_ids(&unit_id))
        .await?;
    for line in run_lines(&run) {
        println!("{line}");
    }

    if let Some(path) = export_csv {
        export_to_path(&run, &path)?;
        println!("Findings exported to {}", path.display());
    }
    if let Some(path) = save_run {
        write_json(&path, &run)?;
        println!("Run saved to {}", path.display());
    }
    Ok(())
}

pub(crate) async fn run_scheduled(args: ScheduledArgs) -> Result<(), AppError> {
    let ScheduledArgs { content, scope } = args;
    let scopes = if scope.is_empty() {
        vec![Scope::All]
    } else {
        scope
    };

    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    let services = build_services(&config, load_content(&content)?)?;

    for scope in scopes {
        let enqueued = services.orchestrator.enqueue(scope)?;
        let note = if enqueued.coalesced {
            " (coalesced)"
        } else {
            ""
        };
        println!(
            "Queued {} for {}{note}",
            enqueued.request.id,
            enqueued.request.scope.label()
        );
    }

    let outcomes = services.orchestrator.drain_scheduled().await?;
    println!("\nProcessed {} scheduled request(s)", outcomes.len());
    for outcome in outcomes {
        println!(
            "Request {} -> {}",
            outcome.request.id,
            outcome.request.status.label()
        );
        if let Some(run) = outcome.run {
            for line in run_lines(&run) {
                println!("  {line}");
            }
        }
    }
    Ok(())
}

pub(crate) fn run_compare(args: CompareArgs) -> Result<(), AppError> {
    let baseline: AuditRun = read_json(&args.baseline)?;
    let current: AuditRun = read_json(&args.current)?;
    let policy = ComparisonPolicy {
        allow_failed: args.allow_failed,
    };

    let report = compare(&baseline, &current, &policy).map_err(ReportError::from)?;
    for line in comparison_lines(&report, args.top) {
        println!("{line}");
    }
    Ok(())
}

pub(crate) fn run_resolve(args: ResolveArgs) -> Result<(), AppError> {
    let policy = match args.missing {
        Some(policy) => policy,
        None => AppConfig::load()?.placeholders.missing_policy,
    };
    let resolver = args
        .global
        .into_iter()
        .fold(PlaceholderResolver::new(policy), |resolver, (name, value)| {
            resolver.with_global(name, value)
        });
    let fields: BTreeMap<String, FieldValue> = args
        .field
        .into_iter()
        .map(|(name, value)| (name, FieldValue::Text(value)))
        .collect();

    println!("{}", resolver.resolve(&args.template, &fields)?);
    Ok(())
}

fn finding_line(finding: &Finding) -> String {
    let developer = if finding.requires_developer {
        " [developer]"
    } else {
        ""
    };
    format!(
        "- {} {} on {}: {}{developer}",
        finding.severity.label(),
        finding.category,
        finding.content_unit_id,
        finding.message
    )
}

pub(crate) fn run_lines(run: &AuditRun) -> Vec<String> {
    let summary = run.summary();
    let mut lines = vec![
        format!(
            "Audit {} ({}) -> {}",
            run.id,
            run.scope.label(),
            run.status.label()
        ),
        format!(
            "Score {} across {} unit(s) | {} high, {} medium, {} low",
            run.score,
            run.units_audited.len(),
            summary.high,
            summary.medium,
            summary.low
        ),
    ];
    if let Some(reason) = &run.failure_reason {
        lines.push(format!("Failure: {reason}"));
    }
    lines.extend(run.findings.iter().map(finding_line));
    lines
}

pub(crate) fn comparison_lines(report: &ComparisonReport, top: usize) -> Vec<String> {
    let mut lines = vec![
        subject_for(report.score_delta),
        format!(
            "{} ({}) -> {} ({})",
            report.baseline_run_id,
            report.baseline_score,
            report.current_run_id,
            report.current_score
        ),
        format!(
            "{} new issue(s), {} on new units | {} fixed",
            report.new_issues.len(),
            report.new_unit_issue_count,
            report.fixed_issues.len()
        ),
    ];
    let shown = report.top_issues(top);
    if !shown.is_empty() {
        lines.push("Top new issues:".to_string());
        lines.extend(shown.iter().map(finding_line));
    }
    if !report.fixed_issues.is_empty() {
        lines.push("Fixed:".to_string());
        lines.extend(report.fixed_issues.iter().map(finding_line));
    }
    lines
}
