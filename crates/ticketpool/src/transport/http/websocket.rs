//! WebSocket push channel.
//!
//! Every connected client receives every notification as a JSON text frame:
//!
//! ```json
//! { "topic": "logs", "payload": "2024-01-01 12:00:00 - System stopped." }
//! { "topic": "ticketAvailability", "payload": "{\"totalTickets\":100,\"availableTickets\":42}" }
//! ```
//!
//! Clients do not send anything meaningful; inbound frames are only read to
//! notice a close.

use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::notify::Notification;
use crate::service::SimulationService;

pub async fn websocket(
    ws: WebSocketUpgrade,
    State(service): State<Arc<SimulationService>>,
) -> Response {
    // Subscribe before the upgrade completes so nothing published in between
    // is missed.
    let rx = service.subscribe();
    ws.on_upgrade(move |socket| forward(socket, rx))
}

async fn forward(socket: WebSocket, mut rx: broadcast::Receiver<Notification>) {
    debug!("WebSocket client connected");
    let (mut sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        loop {
            let notification = match rx.recv().await {
                Ok(n) => n,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "WebSocket client lagging, dropped notifications");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            let frame = match serde_json::to_string(&notification) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(error = %e, "Failed to serialize notification");
                    continue;
                }
            };
            if sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
    debug!("WebSocket client disconnected");
}
