//! WebSocket bridge between the notification bus and the display process.
//!
//! Every outbound notification is forwarded to each connected socket as a
//! JSON `{notification, payload}` text frame. Inbound frames of the same
//! shape are decoded and handed to the dispatcher.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use kiosk_remote_core::{InboundMessage, Notification};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::server::AppState;

pub async fn socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| bridge(socket, state))
}

async fn bridge(socket: WebSocket, state: AppState) {
    let connection = Uuid::new_v4();
    info!(%connection, "Display socket connected");

    let (mut sender, mut receiver) = socket.split();
    let mut outbound = state.dispatcher.bus().subscribe();

    let mut send_task = tokio::spawn(async move {
        while let Some(notification) = outbound.recv().await {
            let frame = match serde_json::to_string(&notification) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("Could not encode {}: {}", notification.notification, e);
                    continue;
                }
            };
            if sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    let dispatcher = state.dispatcher.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            let text = match message {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };
            let notification = match serde_json::from_str::<Notification>(text.as_str()) {
                Ok(notification) => notification,
                Err(e) => {
                    warn!(%connection, "Malformed socket frame: {}", e);
                    continue;
                }
            };
            debug!(%connection, notification = %notification.notification, "Inbound notification");
            match InboundMessage::decode(notification) {
                // These may wait for a CURRENT_STATUS arriving on this socket.
                message @ (InboundMessage::RemoteAction(_) | InboundMessage::NewConfig(_)) => {
                    let dispatcher = dispatcher.clone();
                    tokio::spawn(async move { dispatcher.handle_inbound(message).await });
                }
                message => dispatcher.handle_inbound(message).await,
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
    info!(%connection, "Display socket disconnected");
}
