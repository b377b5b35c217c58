//! API server entry point.

use std::sync::Arc;

use api::config::Config;
use messages::Naming;
use metrics_exporter_prometheus::PrometheusHandle;
use orchestrator::{InMemorySagaStore, PostgresSagaStore, SagaStore};
use tokio::signal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

async fn serve<S: SagaStore + 'static>(
    saga_store: Arc<S>,
    naming: Naming,
    config: &Config,
    metrics_handle: PrometheusHandle,
) {
    let (state, _bus) = api::create_state_with_store(saga_store, naming).await;
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}

#[tokio::main]
async fn main() {
    // 1. Load configuration
    let config = Config::from_env();

    // 2. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(?config, "loaded configuration");

    // 3. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    let naming = Naming::new(config.project_id.clone());
    if let Some(host) = &config.pubsub_emulator_host {
        tracing::info!(%host, "bus emulator configured");
    }

    // 4. Pick the saga store and run
    match config.database_url.clone() {
        Some(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(5)
                .connect(&url)
                .await
                .expect("failed to connect to database");
            let store = PostgresSagaStore::new(pool);
            store.run_migrations().await.expect("migrations failed");
            tracing::info!("saga store: PostgreSQL");
            serve(Arc::new(store), naming, &config, metrics_handle).await;
        }
        None => {
            tracing::warn!("no DATABASE_URL configured; saga store running in memory");
            serve(
                Arc::new(InMemorySagaStore::new()),
                naming,
                &config,
                metrics_handle,
            )
            .await;
        }
    }
}
