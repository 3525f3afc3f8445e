//! Router-level scenarios for the HTTP surface.

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use tokio::sync::mpsc;
use tower::util::ServiceExt;

use pinto_relay::model::client::Client;
use pinto_relay::model::message::SignalMessage;
use pinto_relay::relay::{self, RelayHandle};
use pinto_relay::server::{self, ServerConfig};

fn test_config(key: &str) -> ServerConfig {
    ServerConfig {
        port: 0,
        key: key.to_string(),
    }
}

fn test_app(key: &str) -> (Router, RelayHandle) {
    let relay = relay::start();
    let app = server::router(&test_config(key), relay.clone());
    (app, relay)
}

async fn get(app: Router, path: &str) -> (StatusCode, Vec<u8>, Option<String>) {
    let response = app
        .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let location = response
        .headers()
        .get(header::LOCATION)
        .map(|v| v.to_str().unwrap().to_string());
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec(), location)
}

#[tokio::test]
async fn root_redirects_to_default_key() {
    let (app, _relay) = test_app("pinto");
    let (status, _, location) = get(app, "/").await;

    assert_eq!(status, StatusCode::MOVED_PERMANENTLY);
    assert_eq!(location.as_deref(), Some("./pinto"));
}

#[tokio::test]
async fn root_redirects_to_configured_key() {
    let (app, _relay) = test_app("demo");
    let (status, _, location) = get(app, "/").await;

    assert_eq!(status, StatusCode::MOVED_PERMANENTLY);
    assert_eq!(location.as_deref(), Some("./demo"));
}

#[tokio::test]
async fn id_endpoint_returns_short_decimal_string() {
    let (app, _relay) = test_app("pinto");

    for _ in 0..50 {
        let (status, body, _) = get(app.clone(), "/pinto/id").await;
        assert_eq!(status, StatusCode::OK);

        let id: String = serde_json::from_slice(&body).expect("a JSON string");
        assert!((1..=2).contains(&id.len()), "unexpected id {:?}", id);
        let value: u8 = id.parse().expect("a decimal integer");
        assert!(value <= 99);
        assert_eq!(id, value.to_string(), "padded id {:?}", id);
    }
}

#[tokio::test]
async fn peers_is_zero_on_empty_registry() {
    let (app, _relay) = test_app("pinto");
    let (status, body, _) = get(app, "/pinto/peers").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"0");
}

#[tokio::test]
async fn peers_counts_connects_and_disconnects() {
    let (app, relay) = test_app("pinto");

    // Keep the receiving halves alive so the transports stay open.
    let (tx1, _rx1) = mpsc::unbounded_channel::<SignalMessage>();
    let (tx2, _rx2) = mpsc::unbounded_channel::<SignalMessage>();
    let first = Client::new("1", "t1", tx1);
    let second = Client::new("2", "t2", tx2);
    let first_id = first.id;

    relay.connect(first);
    let (_, body, _) = get(app.clone(), "/pinto/peers").await;
    assert_eq!(body, b"1");

    relay.connect(second);
    let (_, body, _) = get(app.clone(), "/pinto/peers").await;
    assert_eq!(body, b"2");

    relay.disconnect(first_id);
    let (_, body, _) = get(app, "/pinto/peers").await;
    assert_eq!(body, b"1");
}

#[tokio::test]
async fn endpoints_live_under_the_configured_key() {
    let (app, _relay) = test_app("demo");

    let (status, _, _) = get(app.clone(), "/demo/peers").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = get(app, "/pinto/peers").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
