//! Wallet Gateway
//!
//! A server-side gateway between mobile wallet clients and an Ethereum
//! network. Clients submit signed transactions and subscribe to address
//! activity; the gateway persists transactions, enforces per-sender
//! ordering, relays them to the network, tracks confirmation, detects
//! ERC20 token movements, and pushes notifications back to interested
//! clients.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           GATEWAY CORE                           │
//! │                                                                   │
//! │   Intake ──▶ State Store ──▶ Queue Processor ──▶ Chain Client    │
//! │                   ▲                  │                           │
//! │                   │                  ▼                           │
//! │           Block Monitor ◀────── Chain Client                    │
//! │                   │                                               │
//! │                   ▼                                               │
//! │               Notifier ──▶ ws / apn / gcm                         │
//! │                                                                   │
//! │   Housekeeper triggers Queue Processor + refreshes the            │
//! │   gas-price floor.                                                │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`types`] - Domain types (enums, primitives, entities, events, messages)
//! - [`error`] - Layered `DomainError`/`InfraError`/`AppError`/`ApiError` hierarchy
//! - [`config`] - Layered configuration loading and validation
//! - [`envelope`] - Unsigned/signed transaction envelope encoding and signature recovery
//! - [`ports`] - Trait contracts for storage, cache, chain, and dispatch adapters
//! - [`store`] - Postgres/in-memory adapters implementing the ports
//! - [`intake`] - Skeleton construction and signed-transaction admission
//! - [`queue`] - The per-sender Queue Processor
//! - [`indexer`] - The Block Monitor, its checkpoint, and reorg handling
//! - [`notifier`] - Notification rendering and fan-out
//! - [`housekeeper`] - Periodic sanity sweep and gas-price refresh
//! - [`api`] - HTTP/WebSocket surface over the above

#![doc(html_root_url = "https://docs.rs/wallet-gateway")]

pub mod api;
pub mod config;
pub mod envelope;
pub mod error;
pub mod housekeeper;
pub mod indexer;
pub mod intake;
pub mod notifier;
pub mod ports;
pub mod queue;
pub mod store;
pub mod types;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the library version string.
#[must_use]
pub const fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
        assert!(version().starts_with('0'));
    }
}
