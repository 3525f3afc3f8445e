//! HTTP surface and WebSocket ingress for the signaling relay.
//!
//! The handlers here are glue: they read relay state or hand sockets off
//! to per-connection tasks, and everything stateful goes through the
//! relay's channel.

use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{header, HeaderName, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::env;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::model::client::Client;
use crate::model::message::SignalMessage;
use crate::relay::{self, RelayHandle};
use crate::util;

/// Environment-driven settings, read once at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub key: String,
}

impl ServerConfig {
    /// `PORT` (default 9000) and `KEY` (default `pinto`). An unparsable
    /// port falls back to the default rather than aborting startup.
    pub fn from_env() -> ServerConfig {
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(9000);
        let key = env::var("KEY").unwrap_or_else(|_| "pinto".to_string());
        ServerConfig { port, key }
    }
}

#[derive(Clone)]
pub struct AppState {
    relay: RelayHandle,
    key: String,
}

#[derive(Debug, Deserialize)]
struct SocketParams {
    id: Option<String>,
    token: Option<String>,
}

#[tokio::main]
pub async fn main() -> Result<()> {
    util::init_log();

    let config = ServerConfig::from_env();
    let relay = relay::start();
    let app = router(&config, relay);

    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("binding the signaling port {}", config.port))?;

    let host = util::select_host_address();
    info!(
        "Started signaling relay on port: {} --- http://{}:{}/{}",
        config.port, host, config.port, config.key
    );

    axum::serve(listener, app)
        .await
        .context("serving the signaling endpoints")?;

    Ok(())
}

/// Build the router: welcome redirect, id generation, peer count, and the
/// WebSocket mount, all under the configured key segment.
pub fn router(config: &ServerConfig, relay: RelayHandle) -> Router {
    let state = AppState {
        relay,
        key: config.key.clone(),
    };

    // Browsers talk to the relay from arbitrary origins.
    let cors = tower_http::cors::CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::ORIGIN,
            HeaderName::from_static("x-requested-with"),
            header::CONTENT_TYPE,
            header::ACCEPT,
        ]);

    Router::new()
        .route("/", get(welcome_redirect))
        .route(&format!("/{}/id", config.key), get(new_client_id))
        .route(&format!("/{}/peers", config.key), get(connected_peers))
        .route(&format!("/{}/peerjs", config.key), get(peer_socket))
        .layer(cors)
        .with_state(state)
}

async fn welcome_redirect(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::MOVED_PERMANENTLY,
        [(header::LOCATION, format!("./{}", state.key))],
    )
}

async fn new_client_id() -> Json<String> {
    let id = util::generate_client_id();
    info!("Last generated id: {}", id);
    Json(id)
}

/// Always a JSON integer, zero included.
async fn connected_peers(State(state): State<AppState>) -> Json<usize> {
    Json(state.relay.peer_count().await)
}

async fn peer_socket(
    ws: WebSocketUpgrade,
    Query(params): Query<SocketParams>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| drive_socket(socket, params, state.relay))
}

/// Own one WebSocket connection for its lifetime: announce it to the
/// relay, pump inbound frames into the relay, and drain the relay's
/// outbound queue into the socket from a writer task.
async fn drive_socket(socket: WebSocket, params: SocketParams, relay: RelayHandle) {
    let (id, token) = match (params.id, params.token) {
        (Some(id), Some(token)) => (id, token),
        _ => {
            refuse(socket, "No id, or token").await;
            return;
        }
    };

    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<SignalMessage>();

    let client = Client::new(id, token, tx);
    let client_id = client.id;
    relay.connect(client);

    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let Ok(text) = serde_json::to_string(&message) else {
                continue;
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(Ok(frame)) = stream.next().await {
        match frame {
            Message::Text(text) => match serde_json::from_str::<SignalMessage>(&text) {
                Ok(message) => relay.message(client_id, message),
                Err(e) => warn!("Client({}) sent malformed frame: {}", *client_id, e),
            },
            Message::Close(_) => break,
            Message::Binary(_) | Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    relay.disconnect(client_id);
    // The registry entry drops on disconnect, closing the outbound queue;
    // the writer exits once it has drained.
    let _ = writer.await;
}

async fn refuse(mut socket: WebSocket, msg: &str) {
    let refusal = SignalMessage::error(msg);
    if let Ok(text) = serde_json::to_string(&refusal) {
        let _ = socket.send(Message::Text(text)).await;
    }
    let _ = socket.close().await;
}
