//! On-chain log events decoded by the Block Monitor.
//!
//! The monitor filters `eth_getLogs` to the ERC20 `Transfer` topic plus the
//! wrapped-ether contract's `Deposit`/`Withdrawal` topics. Each matching log
//! is decoded into one of these structs before being folded into a token
//! transfer row (and, for Deposit/Withdrawal, an additional synthetic
//! Payment notification reflecting the underlying ether balance change).

use alloy::primitives::{Address, B256, U256};
use alloy::sol_types::SolEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{InfraError, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// LOG METADATA
// ═══════════════════════════════════════════════════════════════════════════════

/// Where a decoded log was found on chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMetadata {
    /// Block number containing the log.
    pub block_number: u64,
    /// Hash of the block containing the log.
    pub block_hash: B256,
    /// Hash of the transaction that emitted the log.
    pub tx_hash: B256,
    /// Index of the log within the transaction's receipt.
    pub log_index: u64,
    /// Timestamp the containing block was produced.
    pub timestamp: DateTime<Utc>,
    /// Address of the contract that emitted the log.
    pub contract: Address,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TOKEN EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Standard ERC20 `Transfer(address indexed from, address indexed to, uint256 value)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferLog {
    /// Log location.
    pub meta: LogMetadata,
    /// Sender (zero address for mints).
    pub from: Address,
    /// Recipient.
    pub to: Address,
    /// Transferred amount, in the token's smallest unit.
    pub value: U256,
}

/// Wrapped-ether `Deposit(address indexed dst, uint256 wad)` — ether wrapped
/// into the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositLog {
    /// Log location.
    pub meta: LogMetadata,
    /// Address that deposited ether.
    pub dst: Address,
    /// Amount wrapped, in wei.
    pub wad: U256,
}

/// Wrapped-ether `Withdrawal(address indexed src, uint256 wad)` — the token
/// unwrapped back into ether.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalLog {
    /// Log location.
    pub meta: LogMetadata,
    /// Address that withdrew ether.
    pub src: Address,
    /// Amount unwrapped, in wei.
    pub wad: U256,
}

/// Union of the log shapes the Block Monitor understands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum TokenLog {
    /// ERC20 transfer.
    Transfer(TransferLog),
    /// Wrapped-ether deposit.
    Deposit(DepositLog),
    /// Wrapped-ether withdrawal.
    Withdrawal(WithdrawalLog),
}

impl TokenLog {
    /// Log location, regardless of variant.
    #[must_use]
    pub const fn metadata(&self) -> &LogMetadata {
        match self {
            Self::Transfer(e) => &e.meta,
            Self::Deposit(e) => &e.meta,
            Self::Withdrawal(e) => &e.meta,
        }
    }

    /// Whether this log additionally implies an ether balance change that
    /// should be rendered as a Payment notification alongside the
    /// TokenPayment notification (wrapped-ether Deposit/Withdrawal only).
    #[must_use]
    pub const fn implies_ether_transfer(&self) -> bool {
        matches!(self, Self::Deposit(_) | Self::Withdrawal(_))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT SIGNATURES
// ═══════════════════════════════════════════════════════════════════════════════

alloy::sol! {
    /// ERC20 `Transfer`.
    event Transfer(address indexed from, address indexed to, uint256 value);
    /// Wrapped-ether `Deposit`.
    event Deposit(address indexed dst, uint256 wad);
    /// Wrapped-ether `Withdrawal`.
    event Withdrawal(address indexed src, uint256 wad);
}

/// `keccak256("Transfer(address,address,uint256)")`.
#[must_use]
pub fn transfer_topic() -> B256 {
    Transfer::SIGNATURE_HASH
}

/// `keccak256("Deposit(address,uint256)")`.
#[must_use]
pub fn deposit_topic() -> B256 {
    Deposit::SIGNATURE_HASH
}

/// `keccak256("Withdrawal(address,uint256)")`.
#[must_use]
pub fn withdrawal_topic() -> B256 {
    Withdrawal::SIGNATURE_HASH
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOG DECODING
// ═══════════════════════════════════════════════════════════════════════════════

/// Build [`LogMetadata`] from a raw RPC log, given the block it was found in
/// (the block's own hash/timestamp are used rather than trusting the log's
/// copies, which agree in the non-reorg case and are irrelevant once a reorg
/// has already been detected and rolled back).
fn log_metadata(log: &alloy::rpc::types::Log, block_number: u64, timestamp: DateTime<Utc>) -> Result<LogMetadata> {
    let tx_hash = log
        .transaction_hash
        .ok_or_else(|| InfraError::EventDecoding("log missing transaction_hash".into()))?;
    let log_index = log
        .log_index
        .ok_or_else(|| InfraError::EventDecoding("log missing log_index".into()))?;

    Ok(LogMetadata {
        block_number,
        block_hash: log.block_hash.unwrap_or_default(),
        tx_hash,
        log_index,
        timestamp,
        contract: log.address(),
    })
}

/// Decode a raw log known to match the `Transfer` topic.
///
/// # Errors
/// Returns an error if the log's topics/data don't match the ABI-encoded
/// event shape, or required metadata (tx hash, log index) is absent.
pub fn decode_transfer(
    log: &alloy::rpc::types::Log,
    block_number: u64,
    timestamp: DateTime<Utc>,
) -> Result<TokenLog> {
    let decoded = Transfer::decode_log(&log.inner)
        .map_err(|e| InfraError::EventDecoding(format!("Transfer: {e}")))?
        .data;
    Ok(TokenLog::Transfer(TransferLog {
        meta: log_metadata(log, block_number, timestamp)?,
        from: decoded.from,
        to: decoded.to,
        value: decoded.value,
    }))
}

/// Decode a raw log known to match the `Deposit` topic.
///
/// # Errors
/// Returns an error if the log's topics/data don't match the ABI-encoded
/// event shape, or required metadata (tx hash, log index) is absent.
pub fn decode_deposit(
    log: &alloy::rpc::types::Log,
    block_number: u64,
    timestamp: DateTime<Utc>,
) -> Result<TokenLog> {
    let decoded = Deposit::decode_log(&log.inner)
        .map_err(|e| InfraError::EventDecoding(format!("Deposit: {e}")))?
        .data;
    Ok(TokenLog::Deposit(DepositLog {
        meta: log_metadata(log, block_number, timestamp)?,
        dst: decoded.dst,
        wad: decoded.wad,
    }))
}

/// Decode a raw log known to match the `Withdrawal` topic.
///
/// # Errors
/// Returns an error if the log's topics/data don't match the ABI-encoded
/// event shape, or required metadata (tx hash, log index) is absent.
pub fn decode_withdrawal(
    log: &alloy::rpc::types::Log,
    block_number: u64,
    timestamp: DateTime<Utc>,
) -> Result<TokenLog> {
    let decoded = Withdrawal::decode_log(&log.inner)
        .map_err(|e| InfraError::EventDecoding(format!("Withdrawal: {e}")))?
        .data;
    Ok(TokenLog::Withdrawal(WithdrawalLog {
        meta: log_metadata(log, block_number, timestamp)?,
        src: decoded.src,
        wad: decoded.wad,
    }))
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_meta() -> LogMetadata {
        LogMetadata {
            block_number: 100,
            block_hash: B256::ZERO,
            tx_hash: B256::ZERO,
            log_index: 0,
            timestamp: Utc::now(),
            contract: Address::ZERO,
        }
    }

    #[test]
    fn deposit_implies_ether_transfer() {
        let log = TokenLog::Deposit(DepositLog {
            meta: sample_meta(),
            dst: Address::ZERO,
            wad: U256::from(1),
        });
        assert!(log.implies_ether_transfer());
    }

    #[test]
    fn transfer_does_not_imply_ether_transfer() {
        let log = TokenLog::Transfer(TransferLog {
            meta: sample_meta(),
            from: Address::ZERO,
            to: Address::ZERO,
            value: U256::from(1),
        });
        assert!(!log.implies_ether_transfer());
    }

    #[test]
    fn topics_are_stable() {
        assert_eq!(transfer_topic(), transfer_topic());
        assert_ne!(transfer_topic(), deposit_topic());
    }
}
