use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryMatterRepository, InMemorySourceStore};
use crate::offline::load_store;
use crate::routes::{with_compilation_routes, IntakeState};
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use filing_binder::config::AppConfig;
use filing_binder::error::AppError;
use filing_binder::telemetry;
use filing_binder::workflows::compilation::{CompilationService, EvaluationConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

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
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let settings = &config.compilation;
    let store = load_store(settings.catalog_dir.as_deref())?;
    let intake = IntakeState {
        matters: Arc::new(InMemoryMatterRepository::default()),
        sources: Arc::new(InMemorySourceStore::default()),
    };

    let mut service = CompilationService::new(
        Arc::clone(&intake.matters),
        Arc::new(store),
        EvaluationConfig::from_settings(settings),
    );
    if settings.binder_enabled {
        service = attach_binder(service, &intake, settings.binder_timeout);
    }
    info!(binder = service.binder_enabled(), "compilation service configured");

    let app = with_compilation_routes(Arc::new(service), intake)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "filing binder service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(feature = "pdf-binder")]
fn attach_binder<S>(
    service: CompilationService<InMemoryMatterRepository, S>,
    intake: &IntakeState,
    timeout: std::time::Duration,
) -> CompilationService<InMemoryMatterRepository, S>
where
    S: filing_binder::workflows::compilation::RuleCatalogStore + 'static,
{
    use filing_binder::workflows::compilation::{BinderCapability, PdfBinderAssembler};

    service.with_binder(BinderCapability::new(
        Arc::new(PdfBinderAssembler),
        intake.sources.clone(),
        timeout,
    ))
}

#[cfg(not(feature = "pdf-binder"))]
fn attach_binder<S>(
    service: CompilationService<InMemoryMatterRepository, S>,
    _intake: &IntakeState,
    _timeout: std::time::Duration,
) -> CompilationService<InMemoryMatterRepository, S>
where
    S: filing_binder::workflows::compilation::RuleCatalogStore + 'static,
{
    tracing::warn!("COMPILER_BINDER_ENABLED is set but this build lacks the pdf-binder feature");
    service
}
