//! HTTP Surface Tests
//!
//! Drives the axum router in-process:
//! - Staging returns a token, bad JSON is a 400
//! - Stream requests without a valid token are a 403 with a text reason
//! - Count and window streams push fresh results on every insert

use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use tower::ServiceExt;

use pagestream::client::{event_data_stream, ClientResult};
use pagestream::http_server::{HttpServer, ServerConfig};
use pagestream::records::{MemoryOrderStore, NewOrder, OrderStatus};
use pagestream::sync::WindowResult;

// =============================================================================
// Helper Functions
// =============================================================================

fn server() -> HttpServer {
    HttpServer::with_config(ServerConfig {
        seed_count: 0,
        insert_interval_secs: 0,
        sweep_interval_secs: 0,
        ..Default::default()
    })
}

fn order(status: OrderStatus) -> NewOrder {
    NewOrder {
        order_date: "2025-06-01".to_string(),
        customer: "Ava Jones".to_string(),
        delivery_address: "City 3, Street 3".to_string(),
        status,
        amount: 42.5,
    }
}

fn insert_many(store: &MemoryOrderStore, status: OrderStatus, n: usize) {
    store.insert_all((0..n).map(|_| order(status)).collect()).unwrap();
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn stage(app: &Router, body: &str) -> String {
    let response = app
        .clone()
        .oneshot(
            Request::post("/orders/sse")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_text(response).await
}

async fn open(app: &Router, uri: &str, token: Option<&str>) -> axum::response::Response {
    let mut request = Request::get(uri);
    if let Some(token) = token {
        request = request.header("X-Request-Id", token);
    }
    app.clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

fn events(response: axum::response::Response) -> BoxStream<'static, ClientResult<String>> {
    event_data_stream(Box::pin(response.into_body().into_data_stream())).boxed()
}

async fn next_event(events: &mut BoxStream<'static, ClientResult<String>>) -> String {
    tokio::time::timeout(Duration::from_secs(2), events.next())
        .await
        .expect("timed out waiting for event")
        .expect("stream ended")
        .expect("body error")
}

// =============================================================================
// Staging
// =============================================================================

#[tokio::test]
async fn test_stage_returns_token() {
    let app = server().router();
    let token = stage(&app, r#"{"status":"PAID"}"#).await;
    assert!(!token.is_empty());
    assert_ne!(token, stage(&app, r#"{"status":"PAID"}"#).await);
}

#[tokio::test]
async fn test_stage_invalid_json_is_bad_request() {
    let app = server().router();
    let response = app
        .oneshot(Request::post("/orders/sse").body(Body::from("{not json")).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stage_ignores_unknown_fields() {
    let app = server().router();
    let token = stage(&app, r#"{"status":"NEW","sortBy":"amount"}"#).await;
    assert!(!token.is_empty());
}

// =============================================================================
// Session Rejection
// =============================================================================

#[tokio::test]
async fn test_missing_header_is_forbidden() {
    let app = server().router();
    let response = open(&app, "/orders/sse/count", None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_text(response).await, "Missing X-Request-Id");
}

#[tokio::test]
async fn test_unknown_token_is_forbidden() {
    let app = server().router();
    let response = open(&app, "/orders/sse?position=0&size=10", Some("nope")).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_text(response).await, "Expired or unknown request id");
}

// =============================================================================
// Streams
// =============================================================================

#[tokio::test]
async fn test_count_stream_tracks_inserts() {
    let server = server();
    let store = server.store().clone();
    let app = server.router();

    insert_many(&store, OrderStatus::Paid, 7);
    insert_many(&store, OrderStatus::Cancelled, 3);
    let token = stage(&app, r#"{"status":"PAID"}"#).await;

    let response = open(&app, "/orders/sse/count", Some(&token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let mut events = events(response);
    assert_eq!(next_event(&mut events).await, "7");

    store.insert(order(OrderStatus::Paid)).unwrap();
    assert_eq!(next_event(&mut events).await, "8");
}

#[tokio::test]
async fn test_window_stream_at_end_of_set() {
    let server = server();
    let store = server.store().clone();
    let app = server.router();

    insert_many(&store, OrderStatus::New, 35);
    let token = stage(&app, "{}").await;

    let response = open(&app, "/orders/sse?position=30&size=10", Some(&token)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let mut events = events(response);
    let window: WindowResult = serde_json::from_str(&next_event(&mut events).await).unwrap();
    assert_eq!(window.keys().collect::<Vec<_>>(), vec![30, 31, 32, 33, 34]);
    assert_eq!(window.get(30).unwrap().id, 31);

    // The window grows into the new row
    store.insert(order(OrderStatus::New)).unwrap();
    let window: WindowResult = serde_json::from_str(&next_event(&mut events).await).unwrap();
    assert_eq!(window.len(), 6);
}

#[tokio::test]
async fn test_window_defaults_and_empty_result() {
    let server = server();
    let app = server.router();
    let token = stage(&app, r#"{"customer":"Nobody"}"#).await;

    let response = open(&app, "/orders/sse?position=abc", Some(&token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let mut events = events(response);
    assert_eq!(next_event(&mut events).await, "{}");
}

#[tokio::test]
async fn test_count_and_window_share_one_token() {
    let server = server();
    let store = server.store().clone();
    let app = server.router();
    insert_many(&store, OrderStatus::Shipped, 12);
    let token = stage(&app, r#"{"status":"SHIPPED"}"#).await;

    let mut count = events(open(&app, "/orders/sse/count", Some(&token)).await);
    let mut window = events(open(&app, "/orders/sse?position=10&size=30", Some(&token)).await);

    let total: u64 = next_event(&mut count).await.parse().unwrap();
    let page: WindowResult = serde_json::from_str(&next_event(&mut window).await).unwrap();
    assert_eq!(total, 12);
    assert!(page.keys().all(|k| k < total));
    assert_eq!(page.len(), 2);
}

#[tokio::test]
async fn test_disconnect_closes_session() {
    let server = server();
    let metrics = server.metrics().clone();
    let app = server.router();
    let token = stage(&app, "{}").await;

    let mut count = events(open(&app, "/orders/sse/count", Some(&token)).await);
    assert_eq!(next_event(&mut count).await, "0");
    assert_eq!(metrics.active_sessions(), 1);

    drop(count);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(metrics.active_sessions(), 0);
    assert_eq!(metrics.snapshot().sessions_closed, 1);
}

// =============================================================================
// Health and Metrics
// =============================================================================

#[tokio::test]
async fn test_health() {
    let app = server().router();
    let response = open(&app, "/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_metrics_reflect_activity() {
    let app = server().router();
    stage(&app, "{}").await;
    open(&app, "/orders/sse/count", Some("nope")).await;

    let response = open(&app, "/observability/metrics", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["filters_staged"], 1);
    assert_eq!(json["sessions_rejected"], 1);
}
