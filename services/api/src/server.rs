use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryCycleRepository, InMemoryReviewNotifier};
use crate::routes::with_cycle_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use talent_review::config::AppConfig;
use talent_review::error::AppError;
use talent_review::telemetry;
use talent_review::workflows::evaluation360::EvaluationCycleService;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry, config.environment)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let service = Arc::new(
        EvaluationCycleService::new(
            Arc::new(InMemoryCycleRepository::default()),
            Arc::new(InMemoryReviewNotifier::default()),
            config.evaluation.consensus_policy(),
        )
        .with_default_scale(config.evaluation.rating_scale),
    );

    let app = with_cycle_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        divergence_threshold = config.evaluation.divergence_threshold,
        "talent review service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
