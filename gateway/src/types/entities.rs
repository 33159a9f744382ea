//! Domain entities for database persistence.
//!
//! These structs represent the application's core domain objects that are
//! persisted to the State Store. They differ from wire messages in that
//! they represent current state rather than a transient request/response.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{TokenTransferStatus, Transport, TransactionStatus};
use super::primitives::{BlockNumber, EthAddress, TxHash, WeiAmount};

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSACTION
// ═══════════════════════════════════════════════════════════════════════════════

/// A transaction tracked by the gateway, from skeleton through confirmation.
///
/// For a given `(from_address, nonce)` at most one row with status ≠
/// [`TransactionStatus::Error`] exists. `Confirmed` implies `blocknumber` is
/// set; `Unconfirmed` implies a signature is present and `sendRaw` has been
/// accepted by a node at least once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Surrogate key.
    pub id: Uuid,
    /// Canonical transaction hash. `None` while only a skeleton exists.
    pub hash: Option<TxHash>,
    /// Sender address.
    pub from_address: EthAddress,
    /// Recipient address. `None` for contract creation.
    pub to_address: Option<EthAddress>,
    /// Sender-scoped sequence number.
    pub nonce: u64,
    /// Value transferred, in wei.
    pub value: WeiAmount,
    /// Gas limit.
    pub gas: u64,
    /// Gas price, in wei.
    pub gas_price: WeiAmount,
    /// Transaction calldata.
    pub data: Vec<u8>,
    /// Signature recovery id, `None` until signed.
    pub sig_v: Option<u64>,
    /// Signature r component, `None` until signed.
    pub sig_r: Option<[u8; 32]>,
    /// Signature s component, `None` until signed.
    pub sig_s: Option<[u8; 32]>,
    /// Lifecycle status.
    pub status: TransactionStatus,
    /// Block the transaction was confirmed in, if any.
    pub blocknumber: Option<BlockNumber>,
    /// Authenticated client identity that submitted this row, if known.
    ///
    /// May differ from `from_address` — a wallet backend can submit on
    /// behalf of several addresses under one registered client.
    pub sender_token_id: Option<String>,
    /// Row creation time.
    pub created: DateTime<Utc>,
    /// Last update time.
    pub updated: DateTime<Utc>,
}

impl Transaction {
    /// Whether this row carries a signature.
    #[must_use]
    pub const fn is_signed(&self) -> bool {
        self.sig_v.is_some() && self.sig_r.is_some() && self.sig_s.is_some()
    }

    /// Whether this row is still eligible for a queue processor pass.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.status.is_pending()
    }

    /// Total wei cost of this transaction (`value + gas * gas_price`).
    #[must_use]
    pub fn cost(&self) -> WeiAmount {
        let gas_cost = self.gas_price.as_u256() * alloy::primitives::U256::from(self.gas);
        self.value.saturating_add(&WeiAmount::new(gas_cost))
    }

    /// Whether this is a contract-creation transaction (no recipient).
    #[must_use]
    pub const fn is_contract_creation(&self) -> bool {
        self.to_address.is_none()
    }

    /// Attempt to move this row to `next`, honoring the closed transition
    /// table. Returns `Err(())` (and leaves `status` untouched) on a
    /// forbidden transition.
    ///
    /// # Errors
    /// Returns `Err(())` if the transition is not permitted.
    pub fn transition_to(&mut self, next: TransactionStatus) -> Result<(), ()> {
        if self.status.can_transition_to(next) {
            self.status = next;
            Ok(())
        } else {
            Err(())
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TOKEN TRANSFER
// ═══════════════════════════════════════════════════════════════════════════════

/// An ERC20-style token transfer observed inside a transaction's receipt.
///
/// Unique per `(transaction_id, transaction_log_index)`. Status mirrors the
/// owning transaction but may independently become
/// [`TokenTransferStatus::Error`] if the expected Transfer event turns out
/// to be absent from the receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTransfer {
    /// Surrogate key.
    pub id: Uuid,
    /// Owning transaction row.
    pub transaction_id: Uuid,
    /// Index of the originating log within the transaction's receipt.
    pub transaction_log_index: u32,
    /// ERC20 contract address.
    pub contract_address: EthAddress,
    /// Sender per the Transfer event.
    pub from_address: EthAddress,
    /// Recipient per the Transfer event.
    pub to_address: EthAddress,
    /// Transferred amount, in the token's smallest unit.
    pub value: WeiAmount,
    /// Status, generally mirroring the owning transaction.
    pub status: TokenTransferStatus,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TOKEN BALANCE
// ═══════════════════════════════════════════════════════════════════════════════

/// Cached token balance for an address against a single ERC20 contract.
///
/// Authoritative as of `last_block`; refreshed lazily whenever a transfer
/// touching `(eth_address, contract_address)` is observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBalance {
    /// Holder address.
    pub eth_address: EthAddress,
    /// ERC20 contract address.
    pub contract_address: EthAddress,
    /// Balance as of the last block this pair was refreshed.
    pub balance: WeiAmount,
    /// Block the balance was computed at.
    pub last_block: BlockNumber,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// SUBSCRIPTION
// ═══════════════════════════════════════════════════════════════════════════════

/// A client's registration to receive notifications for an address over a
/// transport. Unique per `(token_id, eth_address, service)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Surrogate key.
    pub id: Uuid,
    /// Authenticated client identity (WebSocket connection token, device
    /// push token, etc).
    pub token_id: String,
    /// Address of interest.
    pub eth_address: EthAddress,
    /// Delivery transport.
    pub service: Transport,
    /// When the subscription was created.
    pub created_at: DateTime<Utc>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// LAST BLOCK
// ═══════════════════════════════════════════════════════════════════════════════

/// Single-row marker naming the greatest block whose logs and receipts have
/// been fully ingested by the Block Monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastBlock {
    /// Highest fully-processed block number.
    pub blocknumber: BlockNumber,
    /// Hash of that block, used to detect a reorg on the next tick.
    pub block_hash: Option<[u8; 32]>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn sample_address(last_byte: u8) -> EthAddress {
        let mut bytes = [0u8; 20];
        bytes[19] = last_byte;
        EthAddress::new(bytes)
    }

    fn sample_tx(status: TransactionStatus) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            hash: None,
            from_address: sample_address(1),
            to_address: Some(sample_address(2)),
            nonce: 0,
            value: WeiAmount::from(1_000_u64),
            gas: 21_000,
            gas_price: WeiAmount::from(20_000_000_000_u64),
            data: Vec::new(),
            sig_v: None,
            sig_r: None,
            sig_s: None,
            status,
            blocknumber: None,
            sender_token_id: None,
            created: Utc::now(),
            updated: Utc::now(),
        }
    }

    mod transaction_tests {
        use super::*;

        #[test]
        fn cost_is_value_plus_gas_times_gas_price() {
            let tx = sample_tx(TransactionStatus::New);
            let expected = WeiAmount::from(1_000_u64 + 21_000 * 20_000_000_000_u64);
            assert_eq!(tx.cost(), expected);
        }

        #[test]
        fn unsigned_is_not_signed() {
            let tx = sample_tx(TransactionStatus::New);
            assert!(!tx.is_signed());
        }

        #[test]
        fn signed_when_all_components_present() {
            let mut tx = sample_tx(TransactionStatus::New);
            tx.sig_v = Some(27);
            tx.sig_r = Some([1u8; 32]);
            tx.sig_s = Some([2u8; 32]);
            assert!(tx.is_signed());
        }

        #[test]
        fn transition_follows_table() {
            let mut tx = sample_tx(TransactionStatus::New);
            assert!(tx.transition_to(TransactionStatus::Unconfirmed).is_ok());
            assert_eq!(tx.status, TransactionStatus::Unconfirmed);
        }

        #[test]
        fn transition_out_of_confirmed_is_rejected() {
            let mut tx = sample_tx(TransactionStatus::Confirmed);
            assert!(tx.transition_to(TransactionStatus::Error).is_err());
            assert_eq!(tx.status, TransactionStatus::Confirmed);
        }

        #[test]
        fn contract_creation_has_no_recipient() {
            let mut tx = sample_tx(TransactionStatus::New);
            tx.to_address = None;
            assert!(tx.is_contract_creation());
        }
    }
}
