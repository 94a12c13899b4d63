pub mod hub;
pub mod protocol;
pub mod snapshot;

pub use hub::PushHub;
pub use protocol::{ClientFrame, Snapshot, ServerFrame};

use crate::errors::Result;
use crate::monitoring::{HealthCheck, Metrics};
use crate::utils::Validator;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[derive(Clone)]
struct WsState {
    hub: Arc<PushHub>,
}

#[derive(Clone)]
struct HttpState {
    health: Arc<HealthCheck>,
    metrics: Arc<Metrics>,
}

/// Binds the WebSocket upgrade route on `addr` (the `WS_PORT` listener).
pub async fn serve_ws(addr: std::net::SocketAddr, hub: Arc<PushHub>) -> Result<()> {
    let app = Router::new()
        .route("/ws", get(ws_handler))
        .with_state(WsState { hub })
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| crate::errors::BotError::internal(format!("failed to bind ws listener on {addr}: {e}")))?;
    info!(%addr, "push hub websocket listener started");
    axum::serve(listener, app)
        .await
        .map_err(|e| crate::errors::BotError::internal(format!("ws server error: {e}")))
}

/// Binds the ambient `/healthz` and `/metrics` HTTP routes on `addr` (the
/// `PORT` listener).
pub async fn serve_http(addr: std::net::SocketAddr, health: Arc<HealthCheck>, metrics: Arc<Metrics>) -> Result<()> {
    let app = Router::new()
        .route("/healthz", get(healthz_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(HttpState { health, metrics })
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| crate::errors::BotError::internal(format!("failed to bind http listener on {addr}: {e}")))?;
    info!(%addr, "health/metrics listener started");
    axum::serve(listener, app)
        .await
        .map_err(|e| crate::errors::BotError::internal(format!("http server error: {e}")))
}

async fn healthz_handler(State(state): State<HttpState>) -> impl IntoResponse {
    let health = state.health.check().await;
    let status = match health.status {
        crate::monitoring::HealthStatus::Healthy => StatusCode::OK,
        crate::monitoring::HealthStatus::Degraded => StatusCode::OK,
        crate::monitoring::HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, axum::Json(health))
}

async fn metrics_handler(State(state): State<HttpState>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            warn!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, String::new())
        }
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<WsState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.hub))
}

async fn handle_socket(socket: WebSocket, hub: Arc<PushHub>) {
    let (mut sender, mut receiver) = socket.split();
    let (id, mut outbound_rx, subscribed) = hub.register().await;

    match hub.users_list().await {
        Ok(users) => send_frame(&mut sender, &ServerFrame::UsersList { users }).await,
        Err(e) => {
            warn!(error = %e, "failed to build initial users list");
            send_frame(&mut sender, &ServerFrame::Error { message: format!("failed to load users list: {e}") }).await;
        }
    }

    loop {
        tokio::select! {
            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(frame) => send_frame(&mut sender, &frame).await,
                    None => break,
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_client_message(&hub, &subscribed, &text).await;
                        send_frame(&mut sender, &reply).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    hub.unregister(id).await;
}

async fn send_frame(sender: &mut (impl futures::Sink<Message> + Unpin), frame: &ServerFrame) {
    if let Ok(text) = serde_json::to_string(frame) {
        // A send failing because the peer is gone is silently dropped; the
        // read side's Close/None arm is what tears the connection down.
        let _ = sender.send(Message::Text(text)).await;
    }
}

async fn handle_client_message(hub: &PushHub, subscribed: &Arc<RwLock<HashSet<String>>>, text: &str) -> ServerFrame {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(_) => return ServerFrame::Error { message: "Invalid message format".to_string() },
    };

    match serde_json::from_value::<ClientFrame>(value) {
        Ok(ClientFrame::SubscribeWallet { wallet_address }) => {
            if let Err(e) = Validator::validate_wallet_address(&wallet_address) {
                return ServerFrame::Error { message: format!("{e}") };
            }
            subscribed.write().await.insert(wallet_address.clone());
            match hub.snapshot_for(&wallet_address).await {
                Ok(snap) => {
                    hub.broadcast_to_all(ServerFrame::UsersUpdate { snapshot: snap }).await;
                    ServerFrame::SubscribeAck { wallet_address, success: true }
                }
                Err(e) => {
                    warn!(wallet = %wallet_address, error = %e, "snapshot assembly failed on subscribe");
                    ServerFrame::Error { message: format!("snapshot assembly failed for {wallet_address}: {e}") }
                }
            }
        }
        Ok(ClientFrame::UnsubscribeWallet { wallet_address }) => {
            subscribed.write().await.remove(&wallet_address);
            ServerFrame::UnsubscribeAck { wallet_address, success: true }
        }
        Err(_) => ServerFrame::Error { message: "unknown message kind".to_string() },
    }
}
