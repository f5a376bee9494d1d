//! Roomcast signaling hub server

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::{Html, IntoResponse, Json},
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use roomcast::config::Config;
use roomcast::handlers;
use roomcast::protocol::ClientMessage;
use roomcast::state::{AppState, Outbound};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_level))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let sweep_interval = config.room.sweep_interval_ms;
    let state = Arc::new(AppState::new(config.clone()));

    let sweep_state = state.clone();
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(tokio::time::Duration::from_millis(sweep_interval));
        loop {
            interval.tick().await;
            handlers::sweep_rooms(sweep_state.clone()).await;
        }
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .with_state(state.clone());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(addr = %addr, error = %err, "Failed to bind");
            std::process::exit(1);
        }
    };

    tracing::info!("Roomcast signaling hub started");
    tracing::info!("Address: {}", addr);
    tracing::info!("WebSocket: ws://{}/ws", addr);

    if let Err(err) = axum::serve(listener, app).await {
        tracing::error!(error = %err, "Server exited");
    }
}

async fn index_handler() -> Html<&'static str> {
    Html("<h1>Roomcast Signaling Hub</h1><p>WebSocket endpoint: /ws</p>")
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "server": "roomcast",
        "connections": state.peers.len(),
        "rooms": state.store.room_count(),
    }))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();

    let member_id = handlers::handle_connection(state.clone(), tx.clone()).await;

    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let message = match frame {
                Outbound::Control(msg) => match serde_json::to_string(&msg) {
                    Ok(json) => Message::Text(json),
                    Err(_) => continue,
                },
                Outbound::Chunk(bytes) => Message::Binary(bytes),
            };
            if ws_sender.send(message).await.is_err() {
                break;
            }
        }
    });

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if let Ok(msg) = serde_json::from_str::<ClientMessage>(&text) {
                    handle_client_message(&state, &member_id, &tx, msg).await;
                }
            }
            Ok(Message::Binary(chunk)) => {
                handlers::handle_stream_chunk(state.clone(), &member_id, chunk).await;
            }
            Ok(Message::Close(_)) => break,
            Err(_) => break,
            _ => {}
        }
    }

    handlers::handle_disconnect(state, &member_id).await;
    send_task.abort();
}

async fn handle_client_message(
    state: &Arc<AppState>,
    member_id: &str,
    sender: &mpsc::UnboundedSender<Outbound>,
    msg: ClientMessage,
) {
    match msg {
        ClientMessage::Heartbeat => {
            handlers::handle_heartbeat(sender);
        }
        ClientMessage::Join { room_id } => {
            handlers::handle_join(state.clone(), member_id, &room_id).await;
        }
        ClientMessage::Leave { room_id } => {
            handlers::handle_leave(state.clone(), member_id, &room_id).await;
        }
        ClientMessage::Offer { target, sdp } => {
            handlers::handle_offer(state.clone(), member_id, &target, &sdp).await;
        }
        ClientMessage::Answer { target, sdp } => {
            handlers::handle_answer(state.clone(), member_id, &target, &sdp).await;
        }
        ClientMessage::IceCandidate { target, candidate } => {
            handlers::handle_ice_candidate(state.clone(), member_id, &target, &candidate).await;
        }
        ClientMessage::StartStream { room_id } => {
            handlers::handle_start_stream(state.clone(), member_id, &room_id).await;
        }
        ClientMessage::EndStream { room_id } => {
            handlers::handle_end_stream(state.clone(), member_id, &room_id).await;
        }
        ClientMessage::Chat { room_id, text } => {
            handlers::handle_chat(state.clone(), member_id, &room_id, &text).await;
        }
    }
}
