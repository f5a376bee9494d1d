//! Headless peer client
//!
//! Connects to a hub, joins a room, and negotiates with everyone in it.
//! Usage: `roomcast-peer [ws://host:port/ws] [room-code]`. With no room code
//! a fresh one is generated and printed for sharing.

use anyhow::{Context, Result};
use roomcast::config::Config;
use roomcast::media::{FixedMediaProvider, MediaProvider};
use roomcast::room_code;
use roomcast::session::{RtcLinkFactory, SessionManager, SignalingChannel};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_level))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let url = args
        .next()
        .unwrap_or_else(|| format!("ws://127.0.0.1:{}/ws", config.port));
    let room = match args.next() {
        Some(arg) => room_code::from_fragment(&arg)
            .with_context(|| format!("invalid room code: {arg}"))?,
        None => {
            let code = room_code::generate();
            tracing::info!(room = %code, "Generated room code");
            code
        }
    };

    let media = FixedMediaProvider::audio_video()
        .acquire()
        .await
        .context("acquiring local media")?;

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let channel = SignalingChannel::connect(&url, events_tx.clone())
        .await
        .with_context(|| format!("connecting to {url}"))?;

    let factory = Arc::new(RtcLinkFactory {
        stun_servers: config.ice.stun_servers.clone(),
    });
    let manager = SessionManager::new(
        room.clone(),
        channel.sender(),
        events_tx,
        factory,
        Arc::new(media),
        &config.session,
    );

    tracing::info!(url = %url, room = %room, "Peer running, ctrl-c to quit");
    tokio::select! {
        _ = manager.run(events_rx) => {
            tracing::warn!("Engine stopped");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
        }
    }

    Ok(())
}
