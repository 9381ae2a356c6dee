//! Connection handlers for the huddle gateway.
//!
//! This module handles the connection lifecycle and event processing:
//! each WebSocket becomes one connection task that feeds inbound events to
//! the router and writes the router's fan-out to its own socket.

use crate::config::Config;
use crate::metrics::{self, ConnectionMetricsGuard};
use anyhow::Result;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use huddle_core::{ConnectionId, EventRouter, UserLookup};
use huddle_protocol::{codec, ClientEvent, ServerEvent};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Shared gateway state.
pub struct AppState {
    /// The presence event router.
    pub router: EventRouter,
    /// Optional identity collaborator for registration hardening.
    pub lookup: Option<Arc<dyn UserLookup>>,
    /// Gateway configuration.
    pub config: Config,
}

impl AppState {
    /// Create new app state with the reference (trusting) register path.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self::with_lookup(config, None)
    }

    /// Create new app state with a user lookup wired in.
    #[must_use]
    pub fn with_lookup(config: Config, lookup: Option<Arc<dyn UserLookup>>) -> Self {
        Self {
            router: EventRouter::new(),
            lookup,
            config,
        }
    }
}

/// Run the HTTP/WebSocket gateway.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    let state = Arc::new(AppState::new(config.clone()));

    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    // Build router
    let app = Router::new()
        .route(&config.transport.websocket_path, get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state);

    // Bind and serve
    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr).await?;

    info!("huddle gateway listening on {}", addr);
    info!(
        "WebSocket endpoint: ws://{}{}",
        addr, config.transport.websocket_path
    );

    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "connections": state.router.connection_count(),
    }))
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    if state.router.connection_count() >= state.config.limits.max_connections {
        warn!("Rejecting connection: at capacity");
        metrics::record_error("capacity");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    ws.on_upgrade(move |socket| handle_websocket(socket, state))
        .into_response()
}

/// Handle a WebSocket connection.
async fn handle_websocket(socket: WebSocket, state: Arc<AppState>) {
    // Record connection metrics
    let _metrics_guard = ConnectionMetricsGuard::new();

    let connection_id = ConnectionId::generate();

    // Split the WebSocket
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before announcing the connection, so this client receives
    // the roster broadcast its own connect triggers.
    let mut events = state.router.subscribe();
    state.router.connect(&connection_id);

    // Event processing loop
    loop {
        tokio::select! {
            biased;

            // Fan-out from the router
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if forward_event(&mut sender, &event).await.is_err() {
                            // This socket is gone; everyone else's fan-out
                            // is unaffected.
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // Roster is latest-wins; resuming at the newest
                        // broadcast is safe.
                        warn!(connection = %connection_id, skipped, "Fan-out receiver lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            // Receive from WebSocket
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_text(&text, &connection_id, &state).await;
                    }
                    Some(Ok(Message::Binary(_))) => {
                        warn!(connection = %connection_id, "Ignoring binary frame");
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        // Ignore pongs
                    }
                    Some(Ok(Message::Close(_))) => {
                        debug!(connection = %connection_id, "Received close frame");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(connection = %connection_id, error = %e, "WebSocket error");
                        metrics::record_error("websocket");
                        break;
                    }
                    None => {
                        debug!(connection = %connection_id, "WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    // Disconnect is idempotent; running it on every exit path keeps the
    // registry's exists-iff-open invariant.
    state.router.disconnect(&connection_id);
}

/// Handle an inbound text frame.
async fn handle_text(text: &str, connection_id: &ConnectionId, state: &Arc<AppState>) {
    if text.len() > state.config.limits.max_event_size {
        warn!(connection = %connection_id, size = text.len(), "Dropping oversized event");
        metrics::record_error("oversized");
        return;
    }

    let event = match codec::decode(text) {
        Ok(event) => event,
        Err(e) => {
            // Dropped for this connection only; no broadcast is triggered.
            warn!(connection = %connection_id, error = %e, "Dropping malformed event");
            metrics::record_error("malformed");
            return;
        }
    };

    metrics::record_event(event.name(), "inbound");

    match event {
        ClientEvent::Register { user_id, email } => {
            if state.config.auth.verify_registrations
                && !verify_registration(state, &user_id, &email).await
            {
                warn!(connection = %connection_id, user = %user_id, "Rejecting unverified registration");
                metrics::record_error("unverified");
                return;
            }
            state.router.register(connection_id, &user_id, &email);
        }
        ClientEvent::Message(payload) => {
            state.router.message(connection_id, payload);
        }
        ClientEvent::MessageLiked { message_id } => {
            state.router.message_liked(message_id);
        }
    }
}

/// Check a registration against the identity collaborator.
///
/// Verification with no lookup wired in fails closed.
async fn verify_registration(state: &Arc<AppState>, user_id: &str, email: &str) -> bool {
    match &state.lookup {
        Some(lookup) => lookup
            .lookup(user_id)
            .await
            .is_some_and(|record| record.email == email),
        None => false,
    }
}

/// Send a fanned-out event to this connection's socket.
async fn forward_event(
    sender: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    event: &ServerEvent,
) -> Result<()> {
    if let ServerEvent::ConnectedUsers(entries) = event {
        metrics::set_roster_users(entries.len());
    }

    let text = codec::encode(event)?;
    metrics::record_event(event.name(), "outbound");
    sender.send(Message::Text(text)).await?;
    Ok(())
}
