//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{CustomerId, Money, VehicleId};
use credit::{CreditAccount, CreditStore};
use messages::Naming;
use metrics_exporter_prometheus::PrometheusHandle;
use orchestrator::InMemorySagaStore;
use tower::ServiceExt;
use vehicle::{Vehicle, VehicleStore};

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

async fn setup() -> (
    axum::Router,
    Arc<api::routes::purchase::AppState<InMemorySagaStore>>,
) {
    let saga_store = Arc::new(InMemorySagaStore::new());
    let (state, _bus) =
        api::create_state_with_store(saga_store, Naming::new("api-test")).await;
    let app = api::create_app(state.clone(), get_metrics_handle());
    (app, state)
}

async fn seed_customer(
    state: &api::routes::purchase::AppState<InMemorySagaStore>,
    balance_cents: i64,
) -> CustomerId {
    let customer_id = CustomerId::new();
    state
        .credit_store
        .insert(CreditAccount::new(
            customer_id,
            Money::from_cents(balance_cents),
            Money::zero(),
        ))
        .await
        .unwrap();
    customer_id
}

async fn seed_vehicle(
    state: &api::routes::purchase::AppState<InMemorySagaStore>,
    price_cents: i64,
) -> VehicleId {
    let vehicle_id = VehicleId::new();
    state
        .vehicle_store
        .insert(Vehicle::new(
            vehicle_id,
            "Onix 1.0",
            "ABC-1234",
            Money::from_cents(price_cents),
        ))
        .await
        .unwrap();
    vehicle_id
}

async fn get_json(app: &axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

async fn post_json(
    app: &axum::Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Polls the saga-state endpoint until the status matches.
async fn wait_for_status(app: &axum::Router, transaction_id: &str, status: &str) -> serde_json::Value {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let (code, json) = get_json(app, &format!("/saga-states/{transaction_id}")).await;
        assert_eq!(code, StatusCode::OK);
        if json["status"] == status {
            return json;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {status}; last: {json}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn health_check_reports_healthy() {
    let (app, _) = setup().await;
    let (status, json) = get_json(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "orchestrator");
}

#[tokio::test]
async fn purchase_runs_to_completion() {
    let (app, state) = setup().await;
    let customer_id = seed_customer(&state, 6_000_000).await;
    let vehicle_id = seed_vehicle(&state, 4_500_000).await;

    let (status, json) = post_json(
        &app,
        "/purchase",
        serde_json::json!({
            "customer_id": customer_id.to_string(),
            "vehicle_id": vehicle_id.to_string(),
            "payment_type": "cash",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["saga_status"], "IN_PROGRESS");
    assert_eq!(json["vehicle_price"], 4_500_000);
    assert_eq!(json["payment_type"], "cash");
    let transaction_id = json["transaction_id"].as_str().unwrap().to_string();

    let done = wait_for_status(&app, &transaction_id, "COMPLETED").await;
    assert_eq!(done["current_step"], "SAGA_COMPLETE");

    // Boundary lookups reflect the outcome.
    let (status, customer) = get_json(&app, &format!("/customers/{customer_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(customer["account_balance"], 1_500_000);

    let (status, vehicle) = get_json(&app, &format!("/vehicles/{vehicle_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(vehicle["is_sold"], true);
    assert_eq!(vehicle["is_reserved"], false);

    let (status, payment) = get_json(&app, &format!("/payments/{transaction_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payment["status"], "completed");

    let code = payment["payment_code"].as_str().unwrap();
    let (status, code_json) = get_json(&app, &format!("/payment-codes/{code}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(code_json["status"], "used");
}

#[tokio::test]
async fn insufficient_funds_is_a_bad_request() {
    let (app, state) = setup().await;
    let customer_id = seed_customer(&state, 100).await;
    let vehicle_id = seed_vehicle(&state, 4_500_000).await;

    let (status, json) = post_json(
        &app,
        "/purchase",
        serde_json::json!({
            "customer_id": customer_id.to_string(),
            "vehicle_id": vehicle_id.to_string(),
            "payment_type": "cash",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("Insufficient funds"));
}

#[tokio::test]
async fn unknown_references_are_not_found() {
    let (app, state) = setup().await;
    let customer_id = seed_customer(&state, 6_000_000).await;

    let (status, _) = post_json(
        &app,
        "/purchase",
        serde_json::json!({
            "customer_id": customer_id.to_string(),
            "vehicle_id": VehicleId::new().to_string(),
            "payment_type": "cash",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get_json(&app, &format!("/saga-states/{}", uuid::Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get_json(&app, &format!("/customers/{}", CustomerId::new())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_purchase_requests_are_rejected() {
    let (app, state) = setup().await;
    let customer_id = seed_customer(&state, 6_000_000).await;
    let vehicle_id = seed_vehicle(&state, 4_500_000).await;

    // Unsupported payment type.
    let (status, json) = post_json(
        &app,
        "/purchase",
        serde_json::json!({
            "customer_id": customer_id.to_string(),
            "vehicle_id": vehicle_id.to_string(),
            "payment_type": "barter",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("payment type"));

    // Not a UUID.
    let (status, _) = post_json(
        &app,
        "/purchase",
        serde_json::json!({
            "customer_id": "not-a-uuid",
            "vehicle_id": vehicle_id.to_string(),
            "payment_type": "cash",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cancel_of_unknown_transaction_is_not_found() {
    let (app, _) = setup().await;
    let (status, _) = post_json(
        &app,
        &format!("/purchase/{}/cancel", uuid::Uuid::new_v4()),
        serde_json::json!({ "reason": "nothing there" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cancel_of_completed_purchase_is_rejected() {
    let (app, state) = setup().await;
    let customer_id = seed_customer(&state, 6_000_000).await;
    let vehicle_id = seed_vehicle(&state, 4_500_000).await;

    let (_, json) = post_json(
        &app,
        "/purchase",
        serde_json::json!({
            "customer_id": customer_id.to_string(),
            "vehicle_id": vehicle_id.to_string(),
            "payment_type": "cash",
        }),
    )
    .await;
    let transaction_id = json["transaction_id"].as_str().unwrap().to_string();
    wait_for_status(&app, &transaction_id, "COMPLETED").await;

    let (status, json) = post_json(
        &app,
        &format!("/purchase/{transaction_id}/cancel"),
        serde_json::json!({ "reason": "too late" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Transaction already completed");

    let (_, saga) = get_json(&app, &format!("/saga-states/{transaction_id}")).await;
    assert_eq!(saga["status"], "CANCELLATION_FAILED");
}

#[tokio::test]
async fn mark_as_sold_boundary_works() {
    let (app, state) = setup().await;
    let vehicle_id = seed_vehicle(&state, 4_500_000).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri(format!("/vehicles/{vehicle_id}/mark_as_sold"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["is_sold"], true);
    assert_eq!(json["is_reserved"], false);
}

#[tokio::test]
async fn metrics_endpoint_renders() {
    let (app, _) = setup().await;
    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
