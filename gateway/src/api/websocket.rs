//! `GET /ws` — the WebSocket transport for live subscriptions.
//!
//! Each connection gets a randomly generated `token_id` used both as its
//! [`crate::store::WsRegistry`] key and as the `token_id` column on its
//! [`Subscription`] rows, so the Notifier's dispatcher can route a rendered
//! message back to this exact socket without knowing anything about `axum`.
//! Clients speak a tiny JSON-RPC-shaped protocol: `subscribe(addresses...)`,
//! `unsubscribe(addresses...)`, `list_subscriptions()`.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::api::AppState;
use crate::ports::SubscriptionStore;
use crate::types::entities::Subscription;
use crate::types::enums::Transport;
use crate::types::primitives::EthAddress;

/// One incoming JSON-RPC-shaped request over the socket.
#[derive(Debug, Deserialize)]
struct RpcRequest {
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Vec<String>,
}

/// One outgoing response, mirroring the request's `id`.
#[derive(Debug, Serialize)]
struct RpcResponse {
    id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl RpcResponse {
    const fn ok(id: Option<Value>, result: Value) -> Self {
        Self { id, result: Some(result), error: None }
    }

    fn err(id: Option<Value>, message: impl Into<String>) -> Self {
        Self { id, result: None, error: Some(message.into()) }
    }
}

/// `GET /ws` handler: upgrades the connection and hands it to
/// [`handle_socket`].
pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

#[instrument(skip(socket, state))]
async fn handle_socket(socket: WebSocket, state: AppState) {
    let token_id = Uuid::new_v4().to_string();
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    state.ws.register(token_id.clone(), tx);
    debug!(%token_id, "websocket connected");

    let forward = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = stream.next().await {
        let Message::Text(text) = message else { continue };
        let response = match serde_json::from_str::<RpcRequest>(&text) {
            Ok(request) => handle_request(&state, &token_id, request).await,
            Err(err) => RpcResponse::err(None, format!("malformed request: {err}")),
        };
        if let Ok(payload) = serde_json::to_string(&response) {
            if state.ws.send(&token_id, Message::Text(payload)).is_err() {
                break;
            }
        }
    }

    state.ws.unregister(&token_id);
    forward.abort();
    debug!(%token_id, "websocket disconnected");
}

async fn handle_request(state: &AppState, token_id: &str, request: RpcRequest) -> RpcResponse {
    let RpcRequest { id, method, params } = request;
    match method.as_str() {
        "subscribe" => subscribe(state, token_id, &params, id).await,
        "unsubscribe" => unsubscribe(state, token_id, &params, id).await,
        "list_subscriptions" => list_subscriptions(state, token_id, id).await,
        other => RpcResponse::err(id, format!("unknown method: {other}")),
    }
}

async fn subscribe(
    state: &AppState,
    token_id: &str,
    addresses: &[String],
    id: Option<Value>,
) -> RpcResponse {
    for raw in addresses {
        let address = match EthAddress::from_hex(raw) {
            Ok(address) => address,
            Err(err) => return RpcResponse::err(id, format!("invalid address {raw}: {err}")),
        };
        let subscription = Subscription {
            id: Uuid::new_v4(),
            token_id: token_id.to_string(),
            eth_address: address,
            service: Transport::Ws,
            created_at: Utc::now(),
        };
        if let Err(err) = SubscriptionStore::upsert(&state.store, &subscription).await {
            warn!(%token_id, %address, %err, "failed to persist subscription");
            return RpcResponse::err(id, "internal error persisting subscription");
        }
    }
    RpcResponse::ok(id, Value::Bool(true))
}

async fn unsubscribe(
    state: &AppState,
    token_id: &str,
    addresses: &[String],
    id: Option<Value>,
) -> RpcResponse {
    for raw in addresses {
        let address = match EthAddress::from_hex(raw) {
            Ok(address) => address,
            Err(err) => return RpcResponse::err(id, format!("invalid address {raw}: {err}")),
        };
        if let Err(err) = SubscriptionStore::delete(&state.store, token_id, &address, Transport::Ws).await
        {
            warn!(%token_id, %address, %err, "failed to remove subscription");
            return RpcResponse::err(id, "internal error removing subscription");
        }
    }
    RpcResponse::ok(id, Value::Bool(true))
}

async fn list_subscriptions(state: &AppState, token_id: &str, id: Option<Value>) -> RpcResponse {
    let addresses = match state.store.list_subscribed_addresses(token_id).await {
        Ok(addresses) => addresses,
        Err(err) => {
            warn!(%token_id, %err, "failed to list subscriptions");
            return RpcResponse::err(id, "internal error listing subscriptions");
        }
    };
    let rendered: Vec<String> = addresses.iter().map(EthAddress::to_hex).collect();
    RpcResponse::ok(id, Value::from(rendered))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_response_ok_serializes_without_error_field() {
        let resp = RpcResponse::ok(Some(Value::from(1)), Value::Bool(true));
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json.get("error").is_none());
        assert_eq!(json["result"], Value::Bool(true));
    }

    #[test]
    fn rpc_response_err_serializes_without_result_field() {
        let resp = RpcResponse::err(None, "boom");
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json.get("result").is_none());
        assert_eq!(json["error"], "boom");
    }

    #[test]
    fn rpc_request_parses_subscribe_with_params() {
        let raw = r#"{"id":1,"method":"subscribe","params":["0x1111111111111111111111111111111111111111"]}"#;
        let req: RpcRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(req.method, "subscribe");
        assert_eq!(req.params.len(), 1);
    }
}
