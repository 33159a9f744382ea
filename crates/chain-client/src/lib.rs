//! Chain abstraction layer over an Ethereum JSON-RPC node.
//!
//! This crate provides a unified interface for interacting with an Ethereum
//! node, abstracting away the raw JSON-RPC surface behind a small, testable
//! port.
//!
//! # Overview
//!
//! The core of this crate is the [`ChainProvider`] trait: balance/nonce
//! queries, sending raw transactions, waiting for receipts, fetching blocks
//! and logs, and an ERC20 `balanceOf` helper. [`NonceManager`] layers
//! thread-safe local nonce tracking on top of any `ChainProvider`.
//!
//! # Quick Start
//!
//! ```ignore
//! use chain_client::{ChainProvider, TransactionRequest};
//! use alloy::primitives::{Address, U256};
//!
//! async fn check_balance<P: ChainProvider>(provider: &P, address: Address) {
//!     let balance = provider.get_balance(address).await.unwrap();
//!     println!("Balance: {} wei", balance);
//! }
//! ```
//!
//! # Modules
//!
//! - [`traits`] - The [`ChainProvider`] and [`NonceManager`] ports
//! - [`types`] - Transaction requests, receipts, blocks, and log filters
//! - [`nonce`] - Thread-safe nonce management via [`LocalNonceManager`]
//! - [`standard`] - [`standard::StandardEvmProvider`], an alloy-backed implementation
//! - [`mock`] - [`mock::MockProvider`], an in-memory implementation for tests
//! - [`error`] - Error types with detailed context
//!
//! # Architecture
//!
//! This crate follows the ports-and-adapters (hexagonal) architecture:
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │              Your Application                    │
//! └─────────────────────────────────────────────────┘
//!                        │
//!                        │ uses
//!                        ▼
//! ┌─────────────────────────────────────────────────┐
//! │           ChainProvider trait (Port)            │
//! │  - get_balance()                                │
//! │  - send_raw_transaction()                       │
//! │  - wait_for_receipt()                           │
//! │  - get_logs() / get_block_by_number()           │
//! └─────────────────────────────────────────────────┘
//!                        │
//!                        ▼
//! ┌─────────────────────────────────────────────────┐
//! │        StandardEvmProvider (Adapter)            │
//! │        uses: alloy                              │
//! └─────────────────────────────────────────────────┘
//! ```

#![doc(html_root_url = "https://docs.rs/chain-client")]

// ═══════════════════════════════════════════════════════════════════════════════
// MODULES
// ═══════════════════════════════════════════════════════════════════════════════

pub mod error;
pub mod mock;
pub mod nonce;
pub mod standard;
pub mod traits;
pub mod types;

// ═══════════════════════════════════════════════════════════════════════════════
// RE-EXPORTS
// ═══════════════════════════════════════════════════════════════════════════════

// Primary types - what most users need
pub use error::{ProviderError, Result};
pub use nonce::LocalNonceManager;
pub use standard::StandardEvmProvider;
pub use traits::{ChainProvider, NonceManager};
pub use types::{Block, LogFilter, TransactionInfo, TransactionReceipt, TransactionRequest};

// ═══════════════════════════════════════════════════════════════════════════════
// PRELUDE
// ═══════════════════════════════════════════════════════════════════════════════

/// Convenience re-exports for common use.
///
/// # Usage
///
/// ```ignore
/// use chain_client::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{ProviderError, Result};
    pub use crate::nonce::LocalNonceManager;
    pub use crate::traits::{ChainProvider, NonceManager};
    pub use crate::types::{
        Block, LogFilter, TransactionInfo, TransactionReceipt, TransactionRequest,
    };
}

// ═══════════════════════════════════════════════════════════════════════════════
// CRATE INFO
// ═══════════════════════════════════════════════════════════════════════════════

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the crate version string.
#[must_use]
pub const fn version() -> &'static str {
    VERSION
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!version().is_empty());
        assert!(version().starts_with("0."));
    }

    #[test]
    fn exports_are_available() {
        let _: fn() -> TransactionRequest = TransactionRequest::new;
        let _: fn(u64, u64) -> LogFilter = LogFilter::new;
        let _err: ProviderError = ProviderError::unsupported("test");
    }

    #[test]
    fn prelude_works() {
        use crate::prelude::*;

        let request = TransactionRequest::new();
        assert!(request.to.is_none());

        let filter = LogFilter::new(0, 100);
        assert_eq!(filter.from_block, Some(0));
    }
}
