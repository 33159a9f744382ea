//! Notification-delivery adapter implementing [`NotificationDispatcher`].
//!
//! `ws` delivery fans out over a registry of open `axum` WebSocket
//! connections keyed by `token_id`, populated by the `/ws` handler as
//! clients connect and subscribe. `gcm`/`apn` delivery POSTs to the
//! respective push gateway's HTTP API; both are best-effort, matching the
//! port's documented semantics — delivery failures are logged, not retried.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::Message;
use dashmap::DashMap;
use reqwest::Client;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{instrument, warn};

use crate::error::{InfraError, Result};
use crate::ports::NotificationDispatcher;
use crate::types::enums::Transport;
use crate::types::messages::NotificationMessage;

/// Outbound half of one connected WebSocket client's send channel.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// Tracks live WebSocket connections by `token_id` so notifications can be
/// routed to them without the Notifier knowing anything about `axum`.
#[derive(Debug, Clone, Default)]
pub struct WsRegistry {
    connections: Arc<DashMap<String, WsSender>>,
}

impl WsRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly connected client, replacing any prior connection
    /// under the same `token_id`.
    pub fn register(&self, token_id: String, sender: WsSender) {
        self.connections.insert(token_id, sender);
    }

    /// Remove a client's connection, e.g. on socket close.
    pub fn unregister(&self, token_id: &str) {
        self.connections.remove(token_id);
    }

    /// Send a raw message directly to one connection, bypassing the
    /// Notifier/dispatcher path. Used by the `/ws` handler itself to reply
    /// to JSON-RPC requests (`subscribe`, `list_subscriptions`, ...).
    ///
    /// # Errors
    /// Returns an error if `token_id` has no live connection or its send
    /// channel is closed.
    pub fn send(&self, token_id: &str, message: Message) -> Result<(), InfraError> {
        self.connections
            .get(token_id)
            .ok_or(InfraError::NotFound)?
            .send(message)
            .map_err(|_| InfraError::NotFound)
    }

    /// Number of currently registered connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether the registry currently has no connections.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

/// HTTP push gateway endpoints for GCM/APN delivery.
#[derive(Debug, Clone)]
pub struct PushEndpoints {
    /// GCM/FCM send endpoint.
    pub gcm_url: Option<String>,
    /// GCM/FCM server key, sent as `Authorization: key=<...>`.
    pub gcm_key: Option<String>,
    /// APNs send endpoint (HTTP/2 gateway base URL).
    pub apn_url: Option<String>,
}

/// Routes a rendered notification to the right transport: an open
/// WebSocket connection, or an HTTP push gateway.
#[derive(Debug, Clone)]
pub struct CompositeDispatcher {
    ws: WsRegistry,
    client: Client,
    push: PushEndpoints,
}

impl CompositeDispatcher {
    /// Create a new dispatcher sharing `ws` with the WebSocket handler and
    /// posting push notifications to `push`'s configured endpoints.
    #[must_use]
    pub fn new(ws: WsRegistry, client: Client, push: PushEndpoints) -> Self {
        Self { ws, client, push }
    }

    async fn dispatch_ws(&self, token_id: &str, message: &NotificationMessage) -> Result<()> {
        let Some(sender) = self.ws.connections.get(token_id) else {
            return Ok(());
        };
        let payload = serde_json::to_string(message).map_err(InfraError::Serialization)?;
        sender
            .send(Message::Text(payload))
            .map_err(|_| InfraError::NotFound)?;
        Ok(())
    }

    async fn dispatch_gcm(&self, token_id: &str, message: &NotificationMessage) -> Result<()> {
        let (Some(url), Some(key)) = (&self.push.gcm_url, &self.push.gcm_key) else {
            return Ok(());
        };
        self.client
            .post(url)
            .header("Authorization", format!("key={key}"))
            .json(&json!({ "to": token_id, "data": message }))
            .send()
            .await
            .map_err(|e| InfraError::Transport(Box::new(e)))?
            .error_for_status()
            .map_err(|e| InfraError::Transport(Box::new(e)))?;
        Ok(())
    }

    async fn dispatch_apn(&self, token_id: &str, message: &NotificationMessage) -> Result<()> {
        let Some(base) = &self.push.apn_url else { return Ok(()) };
        let url = format!("{base}/3/device/{token_id}");
        self.client
            .post(&url)
            .json(&json!({ "aps": { "content-available": 1 }, "payload": message }))
            .send()
            .await
            .map_err(|e| InfraError::Transport(Box::new(e)))?
            .error_for_status()
            .map_err(|e| InfraError::Transport(Box::new(e)))?;
        Ok(())
    }
}

#[async_trait]
impl NotificationDispatcher for CompositeDispatcher {
    #[instrument(skip(self, message))]
    async fn dispatch(
        &self,
        transport: Transport,
        token_id: &str,
        message: &NotificationMessage,
    ) -> Result<()> {
        let result = match transport {
            Transport::Ws => self.dispatch_ws(token_id, message).await,
            Transport::Gcm => self.dispatch_gcm(token_id, message).await,
            Transport::Apn => self.dispatch_apn(token_id, message).await,
        };
        if let Err(ref err) = result {
            warn!(transport = transport.name(), %token_id, %err, "notification delivery failed");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_tracks_connections() {
        let registry = WsRegistry::new();
        assert!(registry.is_empty());
        let (tx, _rx) = mpsc::unbounded_channel();
        registry.register("token-a".into(), tx);
        assert_eq!(registry.len(), 1);
        registry.unregister("token-a");
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn dispatch_ws_sends_to_registered_connection() {
        let registry = WsRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register("token-a".into(), tx);

        let dispatcher = CompositeDispatcher::new(
            registry,
            Client::new(),
            PushEndpoints { gcm_url: None, gcm_key: None, apn_url: None },
        );

        let message = NotificationMessage::Payment(crate::types::messages::PaymentMessage {
            tx_hash: crate::types::primitives::TxHash::new([1u8; 32]),
            from_address: crate::types::primitives::EthAddress::ZERO,
            to_address: None,
            value: crate::types::primitives::WeiAmount::ZERO,
            status: crate::types::enums::TransactionStatus::New,
            network_id: 1,
        });

        dispatcher.dispatch(Transport::Ws, "token-a", &message).await.unwrap();
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn dispatch_ws_to_unknown_token_is_a_noop() {
        let dispatcher = CompositeDispatcher::new(
            WsRegistry::new(),
            Client::new(),
            PushEndpoints { gcm_url: None, gcm_key: None, apn_url: None },
        );
        let message = NotificationMessage::Payment(crate::types::messages::PaymentMessage {
            tx_hash: crate::types::primitives::TxHash::new([1u8; 32]),
            from_address: crate::types::primitives::EthAddress::ZERO,
            to_address: None,
            value: crate::types::primitives::WeiAmount::ZERO,
            status: crate::types::enums::TransactionStatus::New,
            network_id: 1,
        });
        assert!(dispatcher.dispatch(Transport::Ws, "nobody", &message).await.is_ok());
    }

    #[tokio::test]
    async fn dispatch_push_without_configured_endpoint_is_a_noop() {
        let dispatcher = CompositeDispatcher::new(
            WsRegistry::new(),
            Client::new(),
            PushEndpoints { gcm_url: None, gcm_key: None, apn_url: None },
        );
        let message = NotificationMessage::Payment(crate::types::messages::PaymentMessage {
            tx_hash: crate::types::primitives::TxHash::new([1u8; 32]),
            from_address: crate::types::primitives::EthAddress::ZERO,
            to_address: None,
            value: crate::types::primitives::WeiAmount::ZERO,
            status: crate::types::enums::TransactionStatus::New,
            network_id: 1,
        });
        assert!(dispatcher.dispatch(Transport::Gcm, "token-a", &message).await.is_ok());
        assert!(dispatcher.dispatch(Transport::Apn, "token-a", &message).await.is_ok());
    }
}
