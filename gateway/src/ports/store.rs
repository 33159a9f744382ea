//! Storage port traits for data persistence.
//!
//! These traits define the contract for persisting and retrieving domain
//! entities. Infrastructure adapters implement these traits using concrete
//! storage backends (Postgres in production).

use alloy::primitives::B256;
use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::types::entities::{Subscription, TokenBalance, TokenTransfer, Transaction};
use crate::types::enums::{Transport, TransactionStatus};
use crate::types::primitives::{BlockNumber, EthAddress, TxHash};

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSACTION STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// Port for transaction persistence.
///
/// Owns the invariant that for a given `(from_address, nonce)` at most one
/// row with status ≠ `error` exists, and enforces the transition table when
/// updating status — callers pass the desired next status; the
/// implementation rejects forbidden transitions rather than trusting the
/// caller to have checked.
///
/// # Implementation Notes
///
/// Implementations should:
/// - Index on `(from_address, nonce)` and on `hash`
/// - Index on `to_address` (Notifier/Queue Processor fan-out lookups)
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Insert a new transaction row.
    ///
    /// # Errors
    ///
    /// Returns an error if a non-error row already exists at
    /// `(from_address, nonce)`, or the database operation fails.
    async fn insert(&self, tx: &Transaction) -> Result<()>;

    /// Find the non-error row at `(from_address, nonce)`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    async fn find_by_sender_nonce(
        &self,
        from_address: &EthAddress,
        nonce: u64,
    ) -> Result<Option<Transaction>>;

    /// Find a transaction by its canonical hash.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    async fn find_by_hash(&self, hash: &TxHash) -> Result<Option<Transaction>>;

    /// Find a transaction by surrogate id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Transaction>>;

    /// Transition a row's status, enforcing the transition table.
    ///
    /// `blocknumber` is set when transitioning into `confirmed`.
    ///
    /// # Errors
    ///
    /// Returns an error if the row doesn't exist, the transition is
    /// forbidden, or the database operation fails.
    async fn update_status(
        &self,
        id: Uuid,
        next: TransactionStatus,
        blocknumber: Option<BlockNumber>,
    ) -> Result<()>;

    /// All `new`/`queued` rows for a sender that carry a signature, ordered
    /// by nonce ascending. Feeds the Queue Processor's pass algorithm.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    async fn list_pending_by_sender(&self, from_address: &EthAddress) -> Result<Vec<Transaction>>;

    /// All `unconfirmed` rows for a sender, used to compute `pending_cost`
    /// and `next_nonce`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    async fn list_unconfirmed_by_sender(
        &self,
        from_address: &EthAddress,
    ) -> Result<Vec<Transaction>>;

    /// Inbound transactions targeting `to_address` that are still
    /// `new`/`queued`/`unconfirmed`, or `confirmed` above `since_block`.
    /// Feeds the `pending_received` feasibility check.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    async fn list_inbound_pending(
        &self,
        to_address: &EthAddress,
        since_block: BlockNumber,
    ) -> Result<Vec<Transaction>>;

    /// Senders with at least one transaction older than `max_age_secs`
    /// still in `unconfirmed`/`queued`/`new`. Feeds the Housekeeper's
    /// sanity sweep.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    async fn list_stale_senders(&self, max_age_secs: i64) -> Result<Vec<EthAddress>>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// TOKEN TRANSFER STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// Port for token-transfer persistence.
///
/// Uniqueness is `(transaction_id, transaction_log_index)`.
#[async_trait]
pub trait TokenTransferStore: Send + Sync {
    /// Upsert a token transfer row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn upsert(&self, transfer: &TokenTransfer) -> Result<()>;

    /// List token transfers touching `address` (as sender or recipient)
    /// against `contract_address`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    async fn list_by_address(
        &self,
        address: &EthAddress,
        contract_address: &EthAddress,
    ) -> Result<Vec<TokenTransfer>>;

    /// List every token transfer owned by a transaction row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    async fn list_by_transaction(&self, transaction_id: Uuid) -> Result<Vec<TokenTransfer>>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// TOKEN BALANCE STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// Port for cached token-balance persistence.
///
/// `(eth_address, contract_address) -> balance`, authoritative as of
/// `last_block`.
#[async_trait]
pub trait TokenBalanceStore: Send + Sync {
    /// Get the cached balance for `(eth_address, contract_address)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    async fn get(
        &self,
        eth_address: &EthAddress,
        contract_address: &EthAddress,
    ) -> Result<Option<TokenBalance>>;

    /// Upsert a balance.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn upsert(&self, balance: &TokenBalance) -> Result<()>;

    /// List every `(address, contract)` pair the store has an interest in
    /// tracking for `address` — i.e. every contract a balance row already
    /// exists for. Used to decide which balances to recompute after a
    /// Transfer log.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    async fn list_contracts_for_address(&self, address: &EthAddress) -> Result<Vec<EthAddress>>;

    /// Drop a user's interest in a contract's balance, e.g. on
    /// `DELETE /token/{contract}`. Idempotent if no row exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn delete(&self, eth_address: &EthAddress, contract_address: &EthAddress) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// SUBSCRIPTION STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// Port for notification-subscription persistence.
///
/// Uniqueness is `(token_id, eth_address, service)`.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Upsert a subscription.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn upsert(&self, subscription: &Subscription) -> Result<()>;

    /// List active subscriptions for an address.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    async fn list_for_address(&self, address: &EthAddress) -> Result<Vec<Subscription>>;

    /// List the addresses a given `token_id` (e.g. one `/ws` connection) is
    /// subscribed to. Feeds the `list_subscriptions()` WebSocket method.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    async fn list_subscribed_addresses(&self, token_id: &str) -> Result<Vec<EthAddress>>;

    /// Remove a subscription.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn delete(&self, token_id: &str, address: &EthAddress, service: Transport)
    -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// CHAIN STATE STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// Port for Block Monitor progress and reorg detection.
///
/// # Reorg Handling
///
/// The monitor stores block hashes to detect reorgs:
/// 1. When processing a block, check if its hash matches the previously
///    stored hash for that height.
/// 2. If mismatch, walk back to find the fork point (bounded by a maximum
///    trailing depth).
/// 3. Roll back state to the fork point.
/// 4. Reprocess from the fork point.
///
/// # Implementation Notes
///
/// Implementations should:
/// - Keep a sliding window of recent block hashes (e.g., 256 blocks)
/// - Use transactions for reorg rollback operations
#[async_trait]
pub trait ChainStateStore: Send + Sync {
    /// Get the last fully-processed block number.
    ///
    /// Returns `BlockNumber(0)` if no blocks have been processed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    async fn get_last_block(&self) -> Result<BlockNumber>;

    /// Set the last fully-processed block, atomically, after all of that
    /// block's side effects have been committed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn set_last_block(&self, block: BlockNumber, hash: B256) -> Result<()>;

    /// Record a block hash for later reorg detection.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn insert_block_hash(
        &self,
        block: BlockNumber,
        hash: B256,
        parent: B256,
        timestamp: u64,
    ) -> Result<()>;

    /// Get the stored hash for a block, if still within the retention
    /// window.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    async fn get_block_hash(&self, block: BlockNumber) -> Result<Option<B256>>;

    /// Roll back all state recorded for blocks after `fork_point`.
    ///
    /// # Safety
    ///
    /// Destructive. Callers must have already established `fork_point` is
    /// the correct common ancestor.
    ///
    /// # Errors
    ///
    /// Returns an error if the rollback fails.
    async fn execute_reorg_rollback(&self, fork_point: BlockNumber) -> Result<()>;

    /// Prune stored block hashes beyond the retention window.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn prune_old_blocks(&self, keep_blocks: u64) -> Result<u64>;
}
