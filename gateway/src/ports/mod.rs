//! Port definitions for dependency injection and testability.
//!
//! Ports are trait definitions that describe what the domain layer needs.
//! Following hexagonal architecture, adapters (in the infrastructure layer)
//! implement these traits to provide concrete functionality.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Domain Layer                            │
//! │                                                                 │
//! │  Uses ports (traits) to define what it needs                   │
//! │                                                                 │
//! │  ┌──────────────────┐  ┌────────────────┐  ┌────────────────┐ │
//! │  │ TransactionStore  │  │ TokenTransfer  │  │ ChainStateStore│ │
//! │  └─────────┬─────────┘  │     Store      │  └───────┬────────┘ │
//! │            │            └───────┬────────┘          │          │
//! └────────────┼────────────────────┼───────────────────┼──────────┘
//!              │                    │                   │
//!              ▼                    ▼                   ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Infrastructure Layer                        │
//! │                                                                 │
//! │  Provides adapters (implementations) for ports                 │
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐         │
//! │  │ PostgresStore│  │ PostgresStore│  │ PostgresStore│         │
//! │  └──────────────┘  └──────────────┘  └──────────────┘         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Port Categories
//!
//! | Category | Ports | Purpose |
//! |----------|-------|---------|
//! | Storage | [`TransactionStore`], [`TokenTransferStore`], [`TokenBalanceStore`], [`SubscriptionStore`], [`ChainStateStore`] | Data persistence |
//! | Caching | [`Cache`] | Queue coordination, nonce hints, gas-price floor |
//!
//! # Usage
//!
//! ```ignore
//! use gateway::ports::TransactionStore;
//!
//! // Application code depends on traits, not implementations
//! async fn process_sender<S: TransactionStore>(
//!     store: &S,
//!     address: &EthAddress,
//! ) -> Result<()> {
//!     let pending = store.list_pending_by_sender(address).await?;
//!     // ...
//!     Ok(())
//! }
//!
//! // In production, use real implementations
//! let store = PostgresTransactionStore::new(pool);
//!
//! // In tests, use mocks
//! let store = MockTransactionStore::new();
//! ```

mod cache;
mod gas_oracle;
mod notifier;
mod store;

// Re-export all port traits
pub use cache::Cache;
pub use gas_oracle::{GasOracle, GasPriceReading};
pub use notifier::NotificationDispatcher;
pub use store::{
    ChainStateStore, SubscriptionStore, TokenBalanceStore, TokenTransferStore, TransactionStore,
};

// Re-export test utilities for tests and downstream crates using test-utils feature
#[cfg(any(test, feature = "test-utils"))]
pub use cache::mocks::MockGatewayCache;
#[cfg(any(test, feature = "test-utils"))]
pub use gas_oracle::mocks::FixedGasOracle;
#[cfg(any(test, feature = "test-utils"))]
pub use notifier::mocks::RecordingDispatcher;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_ports_are_send_sync() {
        // Compile-time check that all port traits require Send + Sync
        fn assert_send_sync<T: Send + Sync>() {}

        fn check_transaction_store<T: TransactionStore>() {
            assert_send_sync::<T>();
        }
        fn check_token_transfer_store<T: TokenTransferStore>() {
            assert_send_sync::<T>();
        }
        fn check_token_balance_store<T: TokenBalanceStore>() {
            assert_send_sync::<T>();
        }
        fn check_subscription_store<T: SubscriptionStore>() {
            assert_send_sync::<T>();
        }
        fn check_chain_state_store<T: ChainStateStore>() {
            assert_send_sync::<T>();
        }
        fn check_cache<T: Cache>() {
            assert_send_sync::<T>();
        }
    }
}
