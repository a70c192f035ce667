use crate::cli::ServeArgs;
use crate::infra::{build_services, load_content, AppState, ServiceOrchestrator, ServiceReporting};
use crate::routes::with_service_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use seo_audit::config::AppConfig;
use seo_audit::error::AppError;
use seo_audit::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let units = match args.content.take() {
        Some(path) => load_content(&path)?,
        None => Vec::new(),
    };
    let services = build_services(&config, units)?;

    if config.audit.scheduler_interval_secs > 0 {
        let period = Duration::from_secs(config.audit.scheduler_interval_secs);
        tokio::spawn(run_scheduler(
            services.orchestrator.clone(),
            services.reporting.clone(),
            period,
        ));
    }

    let app = with_service_routes(services.orchestrator)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "seo audit service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Drain the request queue on every tick and offer each completed run to reporting.
async fn run_scheduler(
    orchestrator: Arc<ServiceOrchestrator>,
    reporting: Arc<ServiceReporting>,
    period: Duration,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    info!(period_secs = period.as_secs(), "audit scheduler started");

    loop {
        ticker.tick().await;
        process_tick(&orchestrator, &reporting).await;
    }
}

/// Number of scheduled requests processed.
pub(crate) async fn process_tick(
    orchestrator: &ServiceOrchestrator,
    reporting: &ServiceReporting,
) -> usize {
    let outcomes = match orchestrator.drain_scheduled().await {
        Ok(outcomes) => outcomes,
        Err(err) => {
            warn!(error = %err, "scheduled audit drain failed");
            return 0;
        }
    };

    for run in outcomes.iter().filter_map(|outcome| outcome.run.as_ref()) {
        if let Err(err) = reporting.process(run) {
            warn!(run = %run.id, error = %err, "seo report skipped");
        }
    }
    outcomes.len()
}
