use crate::cli::ServeArgs;
use crate::infra::{AppState, DemoProcessor, InMemoryEnrollmentStore};
use crate::routes::with_enrollment_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use enrollflow::config::AppConfig;
use enrollflow::enrollment::{EnrollmentService, TokenIssuer};
use enrollflow::error::AppError;
use enrollflow::telemetry;
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

    let store = Arc::new(InMemoryEnrollmentStore::seeded());
    let tokens = TokenIssuer::from_config(&config.enrollment);
    // No processor binding is wired up yet; the payment phase answers 503
    // until one is injected here.
    let processor: Option<Arc<DemoProcessor>> = None;
    if processor.is_none() {
        warn!("no payment processor configured; finalPayment submissions will be refused");
    }
    let service = Arc::new(EnrollmentService::new(
        store,
        processor,
        tokens,
        config.payments.clone(),
    ));

    let app = with_enrollment_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "enrollment workflow service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
