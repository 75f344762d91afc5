//! Notification bus between the control surface and the display process.
//!
//! Outbound notifications are broadcast so that every connected display
//! socket (and any in-process observer) sees them. Inbound messages are
//! decoded into [`InboundMessage`] before they reach the dispatcher.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;

use crate::capability::Registration;
use crate::dispatcher::RemoteRequest;
use crate::snapshot::DisplaySnapshot;

/// Notification names exchanged with the display process.
pub mod names {
    pub const SHOW: &str = "SHOW";
    pub const HIDE: &str = "HIDE";
    pub const TOGGLE: &str = "TOGGLE";
    pub const BRIGHTNESS: &str = "BRIGHTNESS";
    pub const SHOW_ALERT: &str = "SHOW_ALERT";
    pub const HIDE_ALERT: &str = "HIDE_ALERT";
    pub const NOTIFICATION: &str = "NOTIFICATION";
    pub const REFRESH: &str = "REFRESH";
    pub const RESTART: &str = "RESTART";
    pub const USER_PRESENCE: &str = "USER_PRESENCE";
    pub const UPDATE: &str = "UPDATE";
    pub const DEFAULT_SETTINGS: &str = "DEFAULT_SETTINGS";
    pub const IP_ADDRESSES: &str = "IP_ADDRESSES";
    pub const REMOTE_ACTION_RESULT: &str = "REMOTE_ACTION_RESULT";
    pub const REMOTE_CLIENT_CONNECTED: &str = "REMOTE_CLIENT_CONNECTED";
    pub const REMOTE_NOTIFICATION_ECHO_IN: &str = "REMOTE_NOTIFICATION_ECHO_IN";
    pub const REMOTE_NOTIFICATION_ECHO_OUT: &str = "REMOTE_NOTIFICATION_ECHO_OUT";

    pub const CURRENT_STATUS: &str = "CURRENT_STATUS";
    pub const REQUEST_DEFAULT_SETTINGS: &str = "REQUEST_DEFAULT_SETTINGS";
    pub const REMOTE_ACTION: &str = "REMOTE_ACTION";
    pub const NEW_CONFIG: &str = "NEW_CONFIG";
    pub const REGISTER_API: &str = "REGISTER_API";
}

/// A single message on the bus, in either direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub notification: String,
    #[serde(default)]
    pub payload: Value,
}

impl Notification {
    pub fn new(notification: impl Into<String>, payload: Value) -> Self {
        Self {
            notification: notification.into(),
            payload,
        }
    }

    pub fn bare(notification: impl Into<String>) -> Self {
        Self::new(notification, Value::Null)
    }
}

/// Inbound messages the dispatcher reacts to.
#[derive(Debug, Clone)]
pub enum InboundMessage {
    CurrentStatus(DisplaySnapshot),
    RequestDefaultSettings,
    RemoteAction(RemoteRequest),
    NewConfig(Value),
    UserPresence(Value),
    RegisterApi(Registration),
    RemoteClientConnected,
    EchoIn(Value),
    Unknown(Notification),
}

impl InboundMessage {
    /// Decodes a raw notification. Payloads that do not match the expected
    /// shape are kept as [`InboundMessage::Unknown`].
    pub fn decode(notification: Notification) -> Self {
        let payload = notification.payload.clone();
        let decoded = match notification.notification.as_str() {
            names::CURRENT_STATUS => serde_json::from_value(payload)
                .ok()
                .map(InboundMessage::CurrentStatus),
            names::REQUEST_DEFAULT_SETTINGS => Some(InboundMessage::RequestDefaultSettings),
            names::REMOTE_ACTION => RemoteRequest::from_value(payload)
                .ok()
                .map(|req| InboundMessage::RemoteAction(req.on_socket())),
            names::NEW_CONFIG => Some(InboundMessage::NewConfig(payload)),
            names::USER_PRESENCE => Some(InboundMessage::UserPresence(payload)),
            names::REGISTER_API => serde_json::from_value(payload)
                .ok()
                .map(InboundMessage::RegisterApi),
            names::REMOTE_CLIENT_CONNECTED => Some(InboundMessage::RemoteClientConnected),
            names::REMOTE_NOTIFICATION_ECHO_IN => Some(InboundMessage::EchoIn(payload)),
            _ => None,
        };
        decoded.unwrap_or_else(|| {
            debug!(notification = %notification.notification, "Undecodable inbound notification");
            InboundMessage::Unknown(notification)
        })
    }
}

/// Broadcast channel carrying outbound notifications to the display process.
#[derive(Clone)]
pub struct NotificationBus {
    sender: broadcast::Sender<Notification>,
}

impl NotificationBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> NotificationReceiver {
        NotificationReceiver::new(self.sender.subscribe())
    }

    /// Emits a notification. Having no subscriber is not an error: the
    /// display process may simply not be connected yet.
    pub fn emit(&self, notification: Notification) {
        debug!(notification = %notification.notification, "Emitting notification");
        let _ = self.sender.send(notification);
    }

    pub fn send(&self, name: &str, payload: Value) {
        self.emit(Notification::new(name, payload));
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new(256)
    }
}

pub struct NotificationReceiver {
    receiver: broadcast::Receiver<Notification>,
}

impl NotificationReceiver {
    fn new(receiver: broadcast::Receiver<Notification>) -> Self {
        Self { receiver }
    }

    /// Receives the next notification. Lagged messages are skipped; `None`
    /// means the bus is gone.
    pub async fn recv(&mut self) -> Option<Notification> {
        loop {
            match self.receiver.recv().await {
                Ok(notification) => return Some(notification),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Notification receiver lagged, skipped {} messages", n);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Returns an already queued notification without waiting.
    pub fn try_recv(&mut self) -> Option<Notification> {
        loop {
            match self.receiver.try_recv() {
                Ok(notification) => return Some(notification),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    /// Drains every queued notification.
    pub fn drain(&mut self) -> Vec<Notification> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}
