//! Wire-format request/response shapes for the client HTTP API.
//!
//! Per the gateway's wire conventions: addresses are `0x`-prefixed
//! lowercase 20-byte hex; integers in responses are `0x`-prefixed hex;
//! integers in requests accept either decimal or hex; signatures are
//! 65-byte `0x`-hex. These DTOs sit between the raw JSON body and the
//! domain types in [`crate::intake`] — parsing wire-format ambiguity
//! (decimal-or-hex, `"max"`) is done here, not in Intake.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::intake::{SkeletonRequest, SubmitRequest, ValueInput};
use crate::types::primitives::{EthAddress, WeiAmount};

/// Parse a request-side integer that may be decimal or `0x`-prefixed hex.
///
/// # Errors
/// Returns a `DomainError::InvalidValue` message (callers should map it to
/// the field-specific `DomainError` variant) if the string is neither.
pub fn parse_flex_u64(s: &str) -> Result<u64, DomainError> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).map_err(|e| DomainError::InvalidValue(e.to_string()))
    } else {
        s.parse::<u64>().map_err(|e| DomainError::InvalidValue(e.to_string()))
    }
}

/// Decode a `0x`-prefixed (or bare) hex string into bytes, accepting an
/// empty string as empty calldata.
///
/// # Errors
/// Returns a `DomainError::InvalidData` if the string is not valid hex.
pub fn parse_hex_data(s: &str) -> Result<Vec<u8>, DomainError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    if s.is_empty() {
        return Ok(Vec::new());
    }
    hex::decode(s).map_err(|e| DomainError::InvalidData(e.to_string()))
}

// ═══════════════════════════════════════════════════════════════════════════════
// POST /tx/skel
// ═══════════════════════════════════════════════════════════════════════════════

/// Body of `POST /tx/skel`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkeletonRequestDto {
    /// Sender address, `0x`-hex.
    pub from: String,
    /// Recipient address, `0x`-hex. Omit for contract creation.
    pub to: Option<String>,
    /// Value in wei: decimal, `0x`-hex, or the literal `"max"`.
    pub value: Option<String>,
    /// Caller-supplied nonce override: decimal or `0x`-hex.
    pub nonce: Option<String>,
    /// Caller-supplied gas limit: decimal or `0x`-hex.
    pub gas: Option<String>,
    /// Caller-supplied gas price: decimal or `0x`-hex.
    pub gas_price: Option<String>,
    /// Calldata, `0x`-hex.
    pub data: Option<String>,
}

impl SkeletonRequestDto {
    /// Parse into the domain [`SkeletonRequest`].
    ///
    /// # Errors
    /// Returns a `DomainError` if any field fails to parse.
    pub fn into_domain(self) -> Result<SkeletonRequest, DomainError> {
        let from = EthAddress::from_hex(&self.from)?;
        let to = self.to.as_deref().map(EthAddress::from_hex).transpose()?;
        let value = self.value.as_deref().map(ValueInput::parse).transpose()?;
        let nonce = self.nonce.as_deref().map(parse_flex_u64).transpose()?;
        let gas = self.gas.as_deref().map(parse_flex_u64).transpose()?;
        let gas_price = self
            .gas_price
            .as_deref()
            .map(WeiAmount::parse)
            .transpose()
            .map_err(|e| DomainError::InvalidGasPrice(e.to_string()))?;
        let data = self.data.as_deref().map(parse_hex_data).transpose()?.unwrap_or_default();

        Ok(SkeletonRequest { from, to, value, nonce, gas, gas_price, data })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// POST /tx
// ═══════════════════════════════════════════════════════════════════════════════

/// Body of `POST /tx`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRequestDto {
    /// `0x`-hex (or raw) encoded envelope, signed or unsigned.
    pub tx: String,
    /// Detached 65-byte signature, required if `tx` is unsigned.
    pub signature: Option<String>,
}

impl SubmitRequestDto {
    /// Parse into the domain [`SubmitRequest`], tagging the row with the
    /// authenticated client identity the upstream auth layer resolved (out
    /// of scope here — threaded through as an opaque string by the caller).
    #[must_use]
    pub fn into_domain(self, sender_token_id: Option<String>) -> SubmitRequest {
        SubmitRequest { tx: self.tx, signature: self.signature, sender_token_id }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// GET /balance/{address}
// ═══════════════════════════════════════════════════════════════════════════════

/// Response to `GET /balance/{address}`.
#[derive(Debug, Clone, Serialize)]
pub struct BalanceResponse {
    /// Chain-reported balance, `0x`-hex wei.
    pub confirmed_balance: WeiAmount,
    /// Confirmed minus this sender's own outstanding outgoing cost, plus
    /// inbound-in-flight, `0x`-hex wei.
    pub unconfirmed_balance: WeiAmount,
}

// ═══════════════════════════════════════════════════════════════════════════════
// GET /tokens/{address}
// ═══════════════════════════════════════════════════════════════════════════════

/// One entry in the `GET /tokens/{address}` listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalanceDto {
    /// ERC20 contract address.
    pub contract_address: EthAddress,
    /// Cached balance, `0x`-hex, authoritative as of `last_block`.
    pub balance: WeiAmount,
    /// Block the balance was last computed at.
    pub last_block: u64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// POST /token, DELETE /token/{contract}
// ═══════════════════════════════════════════════════════════════════════════════

/// Body of `POST /token`.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterTokenDto {
    /// Holder address, `0x`-hex.
    pub address: String,
    /// ERC20 contract address, `0x`-hex.
    pub contract: String,
}

/// Query parameters for `DELETE /token/{contract}`.
#[derive(Debug, Clone, Deserialize)]
pub struct DeregisterTokenQuery {
    /// Holder address, `0x`-hex.
    pub address: String,
}

// ═══════════════════════════════════════════════════════════════════════════════
// PUSH REGISTRATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Body of `POST /apn/register` and `POST /gcm/register`.
#[derive(Debug, Clone, Deserialize)]
pub struct PushRegistrationDto {
    /// Device push token, used as the subscription's `token_id`.
    pub token: String,
    /// Address of interest, `0x`-hex.
    pub address: String,
}

// ═══════════════════════════════════════════════════════════════════════════════
// GET /tx/{hash}
// ═══════════════════════════════════════════════════════════════════════════════

/// Response to `GET /tx/{hash}` — the node's own view of the transaction,
/// per the documented open question that this endpoint never consults the
/// local State Store.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainTransactionDto {
    /// Transaction hash.
    pub hash: String,
    /// Sender address.
    pub from: String,
    /// Recipient address, absent for contract creation.
    pub to: Option<String>,
    /// Value transferred, `0x`-hex wei.
    pub value: String,
    /// Sender-scoped nonce.
    pub nonce: String,
    /// Gas limit, `0x`-hex.
    pub gas: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_flex_u64_accepts_decimal_and_hex() {
        assert_eq!(parse_flex_u64("100").unwrap(), 100);
        assert_eq!(parse_flex_u64("0x64").unwrap(), 100);
        assert_eq!(parse_flex_u64("0X64").unwrap(), 100);
    }

    #[test]
    fn parse_flex_u64_rejects_garbage() {
        assert!(parse_flex_u64("not-a-number").is_err());
    }

    #[test]
    fn parse_hex_data_accepts_empty_and_prefixed() {
        assert_eq!(parse_hex_data("").unwrap(), Vec::<u8>::new());
        assert_eq!(parse_hex_data("0x").unwrap(), Vec::<u8>::new());
        assert_eq!(parse_hex_data("0xdead").unwrap(), vec![0xde, 0xad]);
    }

    #[test]
    fn skeleton_dto_parses_max_value() {
        let dto = SkeletonRequestDto {
            from: "0x1111111111111111111111111111111111111111".into(),
            to: Some("0x2222222222222222222222222222222222222222".into()),
            value: Some("max".into()),
            nonce: None,
            gas: None,
            gas_price: None,
            data: None,
        };
        let domain = dto.into_domain().unwrap();
        assert_eq!(domain.value, Some(ValueInput::Max));
    }

    #[test]
    fn skeleton_dto_rejects_malformed_address() {
        let dto = SkeletonRequestDto {
            from: "not-an-address".into(),
            to: None,
            value: None,
            nonce: None,
            gas: None,
            gas_price: None,
            data: None,
        };
        assert!(dto.into_domain().is_err());
    }
}
