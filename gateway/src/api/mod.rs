//! HTTP/WebSocket surface over the gateway core.
//!
//! Wires concrete adapters (Postgres, the in-process cache, the alloy-backed
//! chain client, the composite push/`ws` dispatcher) into the generic
//! [`crate::intake::Intake`], [`crate::queue::QueueProcessor`], and
//! [`crate::notifier::Notifier`] types, and exposes them behind an `axum`
//! [`Router`].

pub mod dto;
pub mod handlers;
pub mod websocket;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use chain_client::StandardEvmProvider;
use tower_http::trace::TraceLayer;

use crate::notifier::Notifier;
use crate::queue::{QueueProcessor, QueueProcessorHandle};
use crate::store::{CompositeDispatcher, MemoryCache, PostgresStore, WsRegistry};

/// Concrete store adapter in use.
pub type GatewayStore = PostgresStore;
/// Concrete cache adapter in use.
pub type GatewayCache = MemoryCache;
/// Concrete chain adapter in use.
pub type GatewayChain = StandardEvmProvider;
/// Concrete dispatcher adapter in use.
pub type GatewayDispatcher = CompositeDispatcher;
/// Concrete notifier instantiation in use.
pub type GatewayNotifier =
    Notifier<GatewayStore, GatewayDispatcher, QueueProcessorHandle<GatewayStore, GatewayCache, GatewayChain>>;
/// Concrete queue processor instantiation in use.
pub type GatewayQueue = QueueProcessor<GatewayStore, GatewayCache, GatewayChain>;
/// Concrete intake instantiation in use.
pub type GatewayIntake = crate::intake::Intake<GatewayStore, GatewayCache, GatewayChain>;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Skeleton construction and signed-submission.
    pub intake: Arc<GatewayIntake>,
    /// Per-sender queue, used to kick a pass after a submission the caller
    /// cares about immediately (none currently do — retained for parity
    /// with the Notifier's trigger path).
    pub queue: Arc<GatewayQueue>,
    /// Durable store, queried directly by read endpoints.
    pub store: GatewayStore,
    /// Chain client, queried directly by `/balance` and `/tx/{hash}`.
    pub chain: Arc<GatewayChain>,
    /// Live WebSocket connections, for `subscribe`/`unsubscribe` bookkeeping
    /// and for the dispatcher to route `ws` notifications.
    pub ws: WsRegistry,
    /// Numeric chain id, echoed into a handful of responses.
    pub network_id: u64,
}

/// Build the full router: every endpoint in the external-interfaces
/// surface, plus a request-tracing layer matching the teacher's
/// observability conventions.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/tx/skel", post(handlers::build_skeleton))
        .route("/tx", post(handlers::submit_transaction))
        .route("/tx/:hash", get(handlers::get_transaction))
        .route("/balance/:address", get(handlers::get_balance))
        .route("/tokens/:address", get(handlers::list_token_balances))
        .route("/token", post(handlers::register_token))
        .route("/token/:contract", delete(handlers::deregister_token))
        .route("/apn/register", post(handlers::register_apn))
        .route("/gcm/register", post(handlers::register_gcm))
        .route("/ws", get(websocket::upgrade))
        .route("/healthz", get(handlers::healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
