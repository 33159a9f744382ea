//! Common types for chain client operations.
//!
//! This module defines chain-agnostic data structures for interacting with an
//! Ethereum JSON-RPC node:
//!
//! - [`TransactionRequest`] - Request to send a transaction
//! - [`TransactionReceipt`] - Receipt of a confirmed transaction
//! - [`TransactionInfo`] - A transaction as returned by `eth_getTransactionByHash`
//! - [`Block`] - A block as returned by `eth_getBlockByNumber`
//! - [`LogFilter`] - Filter for querying logs

use alloy::primitives::{Address, Bytes, TxHash, B256, U256};
use alloy::rpc::types::Log;
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSACTION TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// A request to send a transaction.
///
/// This is a chain-agnostic transaction request that can be used across different
/// provider implementations. The provider will fill in any missing fields
/// (gas price, gas limit, etc.) based on chain conditions.
///
/// # Example
///
/// ```
/// use chain_client::TransactionRequest;
/// use alloy::primitives::{Bytes, U256};
///
/// let request = TransactionRequest::new()
///     .to("0x1234567890123456789012345678901234567890".parse().unwrap())
///     .value(U256::from(1_000_000_000_000_000_000u64)) // 1 ETH
///     .data(Bytes::from(vec![0xab, 0xcd]));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionRequest {
    /// Sender address (filled by signer if not set).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,

    /// Recipient address. `None` for contract creation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,

    /// Value to transfer in wei.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,

    /// Transaction data (calldata for contract calls).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Bytes>,

    /// Gas limit for the transaction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<u64>,

    /// Gas price in wei (for legacy transactions).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<u128>,

    /// Max fee per gas (for EIP-1559 transactions).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<u128>,

    /// Max priority fee per gas (for EIP-1559 transactions).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<u128>,

    /// Nonce (filled by provider if not set).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,

    /// Chain ID (filled by provider if not set).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
}

impl TransactionRequest {
    /// Create a new empty transaction request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sender address.
    #[must_use]
    pub const fn from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }

    /// Set the recipient address.
    #[must_use]
    pub const fn to(mut self, to: Address) -> Self {
        self.to = Some(to);
        self
    }

    /// Set the value to transfer.
    #[must_use]
    pub const fn value(mut self, value: U256) -> Self {
        self.value = Some(value);
        self
    }

    /// Set the transaction data.
    #[must_use]
    pub fn data(mut self, data: Bytes) -> Self {
        self.data = Some(data);
        self
    }

    /// Set the recipient address (alias for `to`).
    #[must_use]
    pub const fn with_to(self, to: Address) -> Self {
        self.to(to)
    }

    /// Set the transaction data (alias for `data`).
    #[must_use]
    pub fn with_data(self, data: Bytes) -> Self {
        self.data(data)
    }

    /// Set the gas limit.
    #[must_use]
    pub const fn gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }

    /// Set the gas price (legacy transactions).
    #[must_use]
    pub const fn gas_price(mut self, gas_price: u128) -> Self {
        self.gas_price = Some(gas_price);
        self
    }

    /// Set the nonce.
    #[must_use]
    pub const fn nonce(mut self, nonce: u64) -> Self {
        self.nonce = Some(nonce);
        self
    }

    /// Set the chain ID.
    #[must_use]
    pub const fn chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    /// Check if this is a contract creation transaction.
    #[must_use]
    pub const fn is_contract_creation(&self) -> bool {
        self.to.is_none()
    }
}

/// Receipt of a confirmed transaction.
///
/// This is a simplified receipt focused on the most common use cases.
/// For full receipt details, use the underlying alloy types.
#[derive(Debug, Clone)]
pub struct TransactionReceipt {
    /// Transaction hash.
    pub tx_hash: TxHash,

    /// Block hash the transaction was included in.
    pub block_hash: B256,

    /// Block number the transaction was included in.
    pub block_number: u64,

    /// Index of the transaction in the block.
    pub tx_index: u64,

    /// Address of the sender.
    pub from: Address,

    /// Address of the receiver (None for contract creation).
    pub to: Option<Address>,

    /// Contract address created (if contract creation transaction).
    pub contract_address: Option<Address>,

    /// Gas used by this transaction.
    pub gas_used: u64,

    /// Whether the transaction succeeded.
    pub success: bool,

    /// Logs emitted by this transaction.
    pub logs: Vec<Log>,
}

impl TransactionReceipt {
    /// Check if the transaction succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.success
    }

    /// Check if this transaction created a contract.
    #[must_use]
    pub const fn is_contract_creation(&self) -> bool {
        self.contract_address.is_some()
    }
}

/// A transaction as returned by `eth_getTransactionByHash`.
///
/// Distinct from [`TransactionRequest`]: this describes a transaction that
/// already exists on chain (or in the mempool), including its current
/// inclusion status.
#[derive(Debug, Clone)]
pub struct TransactionInfo {
    /// Transaction hash.
    pub tx_hash: TxHash,

    /// Sender address.
    pub from: Address,

    /// Recipient address (`None` for contract creation).
    pub to: Option<Address>,

    /// Value transferred in wei.
    pub value: U256,

    /// Transaction calldata.
    pub data: Bytes,

    /// Nonce of the sending account at the time of this transaction.
    pub nonce: u64,

    /// Gas limit.
    pub gas_limit: u64,

    /// Gas price in wei (legacy transactions).
    pub gas_price: Option<u128>,

    /// Block hash, if the transaction has been mined.
    pub block_hash: Option<B256>,

    /// Block number, if the transaction has been mined.
    pub block_number: Option<u64>,

    /// Index within the block, if mined.
    pub tx_index: Option<u64>,
}

impl TransactionInfo {
    /// Whether this transaction has been included in a block yet.
    #[must_use]
    pub const fn is_mined(&self) -> bool {
        self.block_number.is_some()
    }

    /// Whether this transaction is still sitting in the mempool.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        !self.is_mined()
    }
}

/// A block as returned by `eth_getBlockByNumber`.
///
/// Carries only the fields the gateway's block monitor needs: enough to
/// detect reorgs (hash/parent hash) and to bound log queries (number,
/// timestamp).
#[derive(Debug, Clone)]
pub struct Block {
    /// Block hash.
    pub hash: B256,

    /// Parent block hash.
    pub parent_hash: B256,

    /// Block number (height).
    pub number: u64,

    /// Unix timestamp the block was produced.
    pub timestamp: u64,

    /// Transaction hashes included in this block.
    pub transactions: Vec<TxHash>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOG FILTER TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// Filter parameters for querying logs via `eth_getLogs`.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    /// Starting block (inclusive).
    pub from_block: Option<u64>,

    /// Ending block (inclusive).
    pub to_block: Option<u64>,

    /// Contract addresses to filter.
    /// When empty, logs from all addresses are returned.
    pub addresses: Vec<Address>,

    /// Topics to filter.
    /// Each element is either a single topic or `None` for wildcard.
    pub topics: Vec<Option<B256>>,
}

impl LogFilter {
    /// Create a new filter for a block range.
    #[must_use]
    pub const fn new(from_block: u64, to_block: u64) -> Self {
        Self {
            from_block: Some(from_block),
            to_block: Some(to_block),
            addresses: Vec::new(),
            topics: Vec::new(),
        }
    }

    /// Set a single address filter.
    #[must_use]
    pub fn with_address(mut self, address: Address) -> Self {
        self.addresses = vec![address];
        self
    }

    /// Set multiple address filters.
    #[must_use]
    pub fn with_addresses(mut self, addresses: Vec<Address>) -> Self {
        self.addresses = addresses;
        self
    }

    /// Add a topic filter at a specific position.
    ///
    /// Position 0 is the event signature, positions 1-3 are indexed parameters.
    #[must_use]
    pub fn with_topic(mut self, position: usize, topic: B256) -> Self {
        while self.topics.len() <= position {
            self.topics.push(None);
        }
        self.topics[position] = Some(topic);
        self
    }

    /// Set the event signature (topic 0).
    #[must_use]
    pub fn with_event_signature(self, signature: B256) -> Self {
        self.with_topic(0, signature)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_request_builder() {
        let to_addr: Address = "0x1234567890123456789012345678901234567890"
            .parse()
            .unwrap();

        let request = TransactionRequest::new()
            .to(to_addr)
            .value(U256::from(1000))
            .gas_limit(21000);

        assert_eq!(request.to, Some(to_addr));
        assert_eq!(request.value, Some(U256::from(1000)));
        assert_eq!(request.gas_limit, Some(21000));
        assert!(!request.is_contract_creation());
    }

    #[test]
    fn transaction_request_contract_creation() {
        let request = TransactionRequest::new().data(Bytes::from(vec![0x60, 0x80, 0x60, 0x40]));

        assert!(request.is_contract_creation());
    }

    #[test]
    fn log_filter_builder() {
        let addr: Address = "0x1234567890123456789012345678901234567890"
            .parse()
            .unwrap();
        let topic = B256::repeat_byte(0xab);

        let filter = LogFilter::new(100, 200)
            .with_address(addr)
            .with_event_signature(topic);

        assert_eq!(filter.from_block, Some(100));
        assert_eq!(filter.to_block, Some(200));
        assert_eq!(filter.addresses.len(), 1);
        assert_eq!(filter.topics.len(), 1);
        assert_eq!(filter.topics[0], Some(topic));
    }

    #[test]
    fn transaction_info_mined_vs_pending() {
        let pending = TransactionInfo {
            tx_hash: TxHash::ZERO,
            from: Address::ZERO,
            to: None,
            value: U256::ZERO,
            data: Bytes::new(),
            nonce: 0,
            gas_limit: 21000,
            gas_price: None,
            block_hash: None,
            block_number: None,
            tx_index: None,
        };
        assert!(pending.is_pending());
        assert!(!pending.is_mined());

        let mined = TransactionInfo {
            block_hash: Some(B256::repeat_byte(1)),
            block_number: Some(42),
            tx_index: Some(0),
            ..pending
        };
        assert!(mined.is_mined());
        assert!(!mined.is_pending());
    }
}
