//! Signaling probe client.
//!
//! Connects to a running relay the same way a browser client would: fetch
//! a short id over HTTP, open the WebSocket with a random session token,
//! heartbeat, and log every relayed message. Given a target peer id it
//! sends an OFFER carrying a timestamped text payload; the receiving probe
//! answers so one-way signaling latency shows up in the logs. Payloads
//! travel opaquely through the relay, exactly as SDP blobs would.

use std::env;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{info, warn};

use crate::model::message::{Envelope, SignalMessage};
use crate::model::payload::Payload;
use crate::util;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

pub fn main(args: &[String]) -> Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(run(args))
}

async fn run(args: &[String]) -> Result<()> {
    util::init_log();

    let base = args
        .first()
        .cloned()
        .unwrap_or_else(|| "http://127.0.0.1:9000".to_string());
    let target = args.get(1).cloned();
    let key = env::var("KEY").unwrap_or_else(|_| "pinto".to_string());

    // Same id the browser clients use: ask the relay for one.
    let id: String = reqwest::get(format!("{}/{}/id", base, key))
        .await
        .context("requesting a client id")?
        .json()
        .await
        .context("decoding the client id")?;
    let token = format!("{:08x}", rand::thread_rng().gen::<u32>());
    info!("Assigned id {} (token {})", id, token);

    let ws_base = base.replacen("http", "ws", 1);
    let url = format!("{}/{}/peerjs?id={}&token={}", ws_base, key, id, token);
    let (ws_stream, _) = connect_async(url)
        .await
        .context("connecting to the signaling relay")?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    info!("Connected to signaling relay at {}", ws_base);

    if let Some(target) = &target {
        let offer = SignalMessage::Offer(
            Envelope::to(target.clone()).with_payload(Payload::new("ping").to_value()?),
        );
        ws_sender
            .send(WsMessage::Text(serde_json::to_string(&offer)?))
            .await?;
        info!("Sent offer to {}", target);
    }

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);

    loop {
        tokio::select! {
            message = ws_receiver.next() => {
                let Some(message) = message else {
                    info!("Relay closed the connection");
                    return Ok(());
                };
                let message = message.context("reading from the relay")?;
                let Ok(text) = message.to_text() else { continue };
                if text.is_empty() {
                    continue;
                }
                match serde_json::from_str::<SignalMessage>(text) {
                    Ok(message) => {
                        if let Some(reply) = handle_message(message)? {
                            ws_sender
                                .send(WsMessage::Text(serde_json::to_string(&reply)?))
                                .await?;
                        }
                    }
                    Err(e) => warn!("Failed to parse signaling message: {}", e),
                }
            },
            _ = heartbeat.tick() => {
                ws_sender
                    .send(WsMessage::Text(serde_json::to_string(&SignalMessage::Heartbeat)?))
                    .await?;
            }
        }
    }
}

fn handle_message(message: SignalMessage) -> Result<Option<SignalMessage>> {
    match message {
        SignalMessage::Open => {
            info!("Relay acknowledged the connection");
            Ok(None)
        }
        SignalMessage::Offer(env) => {
            log_payload("offer", &env);
            // Answer whoever offered, the way a negotiating browser would.
            let Some(src) = env.src else { return Ok(None) };
            let reply =
                SignalMessage::Answer(Envelope::to(src).with_payload(Payload::new("pong").to_value()?));
            Ok(Some(reply))
        }
        SignalMessage::Answer(env) => {
            log_payload("answer", &env);
            Ok(None)
        }
        SignalMessage::Candidate(env) => {
            info!("Received candidate from {:?}", env.src);
            Ok(None)
        }
        SignalMessage::Leave(env) => {
            info!("Peer {:?} left", env.src);
            Ok(None)
        }
        SignalMessage::Expire(env) => {
            warn!("Destination {:?} is gone", env.src);
            Ok(None)
        }
        SignalMessage::IdTaken { payload } => {
            bail!("relay rejected the connection: {}", payload.msg);
        }
        SignalMessage::Error { payload } => {
            bail!("relay reported an error: {}", payload.msg);
        }
        SignalMessage::Heartbeat => Ok(None),
    }
}

fn log_payload(kind: &str, env: &Envelope) {
    let latency = env
        .payload
        .clone()
        .and_then(Payload::from_value)
        .map(|p| p.latency());
    match latency {
        Some(latency) => info!(
            "Received {} from {:?}, signaling latency {}",
            kind, env.src, latency
        ),
        None => info!("Received {} from {:?}", kind, env.src),
    }
}
