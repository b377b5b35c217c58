//! HTTP surface and process wiring for the vehicle-purchase saga.
//!
//! Exposes the orchestrator's purchase endpoints plus the participant
//! boundary routes, with structured logging (tracing) and Prometheus
//! metrics. The default wiring runs every participant in one process on
//! the in-memory bus; the saga store can be in-memory or PostgreSQL.

pub mod config;
pub mod error;
pub mod local;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, patch, post};
use axum::Router;
use bus::{InMemoryBus, MessageBus};
use credit::{CreditHandler, InMemoryCreditStore};
use messages::Naming;
use metrics_exporter_prometheus::PrometheusHandle;
use orchestrator::{Orchestrator, OutboxPublisher, SagaStore};
use payment::{InMemoryPaymentStore, PaymentHandler};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use vehicle::{InMemoryVehicleStore, VehicleHandler};

use local::{LocalCustomerGateway, LocalVehicleGateway};
use routes::purchase::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: SagaStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route("/purchase", post(routes::purchase::start::<S>))
        .route(
            "/purchase/{transaction_id}/cancel",
            post(routes::purchase::cancel::<S>),
        )
        .route(
            "/saga-states/{transaction_id}",
            get(routes::purchase::saga_state::<S>),
        )
        .route("/customers/{id}", get(routes::customers::get::<S>))
        .route("/vehicles/{id}", get(routes::vehicles::get::<S>))
        .route(
            "/vehicles/{id}/mark_as_sold",
            patch(routes::vehicles::mark_as_sold::<S>),
        )
        .route("/payment-codes/{code}", get(routes::payments::get_code::<S>))
        .route(
            "/payments/{transaction_id}",
            get(routes::payments::get_payment::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wires every component onto one in-memory bus: participants with their
/// stores and listeners, the orchestrator over the given saga store, the
/// outbox publisher, and the payment-code sweeper.
///
/// Startup wiring; failures here mean the process cannot run at all.
pub async fn create_state_with_store<S: SagaStore + 'static>(
    saga_store: Arc<S>,
    naming: Naming,
) -> (Arc<AppState<S>>, InMemoryBus) {
    let bus = InMemoryBus::new();
    let shared_bus: Arc<dyn MessageBus> = Arc::new(bus.clone());

    credit::listener::ensure_wiring(&bus, &naming)
        .await
        .expect("credit bus wiring failed");
    vehicle::listener::ensure_wiring(&bus, &naming)
        .await
        .expect("vehicle bus wiring failed");
    payment::listener::ensure_wiring(&bus, &naming)
        .await
        .expect("payment bus wiring failed");
    orchestrator::listener::ensure_wiring(&bus, &naming)
        .await
        .expect("orchestrator bus wiring failed");

    let credit_store = InMemoryCreditStore::new();
    let credit_handler = Arc::new(CreditHandler::new(
        credit_store.clone(),
        shared_bus.clone(),
        naming.clone(),
    ));
    credit::listener::start(credit_handler, shared_bus.clone(), &naming)
        .await
        .expect("credit listener failed to start");

    let vehicle_store = InMemoryVehicleStore::new();
    let vehicle_handler = Arc::new(VehicleHandler::new(
        vehicle_store.clone(),
        shared_bus.clone(),
        naming.clone(),
    ));
    vehicle::listener::start(vehicle_handler, shared_bus.clone(), &naming)
        .await
        .expect("vehicle listener failed to start");

    let payment_store = InMemoryPaymentStore::new();
    let payment_handler = Arc::new(PaymentHandler::new(
        payment_store.clone(),
        shared_bus.clone(),
        naming.clone(),
    ));
    payment::listener::start(payment_handler, shared_bus.clone(), &naming)
        .await
        .expect("payment listener failed to start");
    payment::sweeper::start(
        Arc::new(payment_store.clone()),
        payment::sweeper::DEFAULT_SWEEP_INTERVAL,
    );

    let orchestrator = Arc::new(Orchestrator::new(
        saga_store.clone(),
        Arc::new(LocalCustomerGateway::new(credit_store.clone())),
        Arc::new(LocalVehicleGateway::new(vehicle_store.clone())),
    ));
    orchestrator::listener::start(orchestrator.clone(), shared_bus.clone(), &naming)
        .await
        .expect("orchestrator listener failed to start");

    OutboxPublisher::new(saga_store.clone(), shared_bus, naming)
        .start(Duration::from_millis(25));

    let state = Arc::new(AppState {
        orchestrator,
        saga_store,
        credit_store,
        vehicle_store,
        payment_store,
    });
    (state, bus)
}
