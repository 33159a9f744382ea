//! Intake: the two client-facing operations that turn a wallet's intent into
//! a tracked transaction row — building an unsigned skeleton for the client
//! to sign, and admitting the signed result onto the chain.
//!
//! Both operations are pure validation-then-side-effect pipelines; neither
//! touches the per-sender queue machinery directly. [`Intake::build_skeleton`]
//! never writes anything. [`Intake::submit_signed_transaction`] calls
//! `sendRawTransaction` itself and inserts the resulting row as `unconfirmed`
//! — it is the Queue Processor's job to advance rows Intake could *not*
//! submit directly (because of a sequence gap or the gas-price floor), not
//! rows Intake already placed on the network.

use std::sync::Arc;

use alloy::primitives::{Address, Bytes, U256};
use chain_client::{ChainProvider, TransactionRequest};
use chrono::Utc;
use serde::Serialize;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::envelope::{self, EnvelopeError, SignedEnvelope, TxFields};
use crate::error::{AppError, DomainError, NonceReason, Result, SignatureReason};
use crate::notifier::NotifierPort;
use crate::ports::{Cache, TransactionStore};
use crate::types::entities::Transaction;
use crate::types::enums::TransactionStatus;
use crate::types::primitives::{EthAddress, TxHash, WeiAmount};

// ═══════════════════════════════════════════════════════════════════════════════
// REQUEST / RESPONSE TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// A skeleton request's `value` field: either a concrete amount or the
/// `"max"` sentinel meaning "spend the entire available balance after fees".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueInput {
    /// A specific amount.
    Amount(WeiAmount),
    /// The `"max"` sentinel.
    Max,
}

impl ValueInput {
    /// Parse a wire value: `"max"` (case-insensitive), `0x`-hex, or decimal.
    ///
    /// # Errors
    /// Returns [`DomainError::InvalidValue`] if the string is neither `"max"`
    /// nor a valid amount.
    pub fn parse(s: &str) -> std::result::Result<Self, DomainError> {
        if s.eq_ignore_ascii_case("max") {
            Ok(Self::Max)
        } else {
            WeiAmount::parse(s).map(Self::Amount).map_err(|e| DomainError::InvalidValue(e.to_string()))
        }
    }
}

/// Inputs to [`Intake::build_skeleton`], already validated into domain types
/// by the API layer (wire-format hex/decimal parsing is not Intake's job).
#[derive(Debug, Clone)]
pub struct SkeletonRequest {
    /// Sender.
    pub from: EthAddress,
    /// Recipient. `None` for contract creation.
    pub to: Option<EthAddress>,
    /// Requested value, or `None` to default to zero.
    pub value: Option<ValueInput>,
    /// Caller-supplied nonce override, or `None` to resolve one.
    pub nonce: Option<u64>,
    /// Caller-supplied gas limit, or `None` to default/estimate.
    pub gas: Option<u64>,
    /// Caller-supplied gas price, or `None` to default from the cached floor
    /// or the configured fallback.
    pub gas_price: Option<WeiAmount>,
    /// Calldata.
    pub data: Vec<u8>,
}

/// Response to [`Intake::build_skeleton`].
#[derive(Debug, Clone, Serialize)]
pub struct SkeletonResponse {
    /// `0x`-hex encoding of the unsigned envelope.
    pub tx: String,
}

/// Inputs to [`Intake::submit_signed_transaction`].
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    /// `0x`-hex (or raw) encoded envelope, signed or unsigned.
    pub tx: String,
    /// Detached 65-byte signature, required if `tx` is unsigned.
    pub signature: Option<String>,
    /// Authenticated client identity, stored alongside the row.
    pub sender_token_id: Option<String>,
}

/// Response to [`Intake::submit_signed_transaction`].
#[derive(Debug, Clone, Serialize)]
pub struct SubmitResponse {
    /// Canonical transaction hash.
    pub tx_hash: TxHash,
}

// ═══════════════════════════════════════════════════════════════════════════════
// INTAKE
// ═══════════════════════════════════════════════════════════════════════════════

/// Intrinsic gas for a legacy transaction carrying `data`, per EIP-2028: a
/// 21000 base plus 4 gas per zero byte and 16 gas per non-zero byte.
fn intrinsic_gas(data: &[u8]) -> u64 {
    data.iter().fold(21_000u64, |acc, &b| acc + if b == 0 { 4 } else { 16 })
}

/// Decode and verify a submission's envelope, enforcing the signature rules
/// from the gateway's external interface. Does not touch the chain, cache,
/// or store — the remaining admission steps need those and live on
/// [`Intake`] itself.
fn decode_and_verify(
    tx: &str,
    signature: Option<&str>,
) -> std::result::Result<SignedEnvelope, DomainError> {
    let detached = signature
        .map(|s| {
            let bytes = envelope::decode_hex(s).map_err(|_| DomainError::InvalidSignature {
                reason: SignatureReason::InvalidHexValue,
            })?;
            if bytes.len() != 65 {
                return Err(DomainError::InvalidSignature { reason: SignatureReason::InvalidLength });
            }
            Ok(bytes)
        })
        .transpose()?;

    if let Ok((fields, chain_id)) = TxFields::decode_unsigned(tx) {
        let signature = detached.ok_or(DomainError::MissingSignature)?;
        return SignedEnvelope::attach(fields, chain_id, &signature)
            .map_err(|e| DomainError::InvalidTransaction(e.to_string()));
    }

    let signed = SignedEnvelope::decode(tx).map_err(|e| match e {
        EnvelopeError::InvalidHex(_) => DomainError::InvalidData(e.to_string()),
        other => DomainError::InvalidTransaction(other.to_string()),
    })?;

    if let Some(signature) = detached {
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&signature[0..32]);
        s.copy_from_slice(&signature[32..64]);
        let recid = u64::from(signature[64] & 0x01);
        let v = signed.chain_id * 2 + 35 + recid;
        if r != signed.r || s != signed.s || v != signed.v {
            return Err(DomainError::InvalidSignature { reason: SignatureReason::DoesNotMatch });
        }
    }

    Ok(signed)
}

/// Turns a wallet's intent into a tracked transaction: builds unsigned
/// skeletons for the client to sign, and admits signed results onto the
/// chain.
pub struct Intake<S, Ca, Ch> {
    store: S,
    cache: Arc<Ca>,
    chain: Arc<Ch>,
    notifier: Arc<dyn NotifierPort>,
    chain_id: u64,
    default_gas: u64,
    fallback_gas_price: WeiAmount,
}

impl<S, Ca, Ch> Intake<S, Ca, Ch>
where
    S: TransactionStore + Clone,
    Ca: Cache,
    Ch: ChainProvider,
{
    /// Create a new Intake.
    pub fn new(
        store: S,
        cache: Arc<Ca>,
        chain: Arc<Ch>,
        notifier: Arc<dyn NotifierPort>,
        chain_id: u64,
        default_gas: u64,
        fallback_gas_price: WeiAmount,
    ) -> Self {
        Self { store, cache, chain, notifier, chain_id, default_gas, fallback_gas_price }
    }

    fn gas_price_default(&self) -> WeiAmount {
        self.cache.get_gas_price_floor().map_or(self.fallback_gas_price, |(standard, _)| standard)
    }

    /// Build an unsigned transaction envelope for the client to sign.
    ///
    /// # Errors
    /// Returns [`DomainError::InvalidValue`] if `value = "max"` would be
    /// negative, or [`DomainError::InvalidTransaction`] if `gas` is below the
    /// intrinsic gas the calldata requires.
    #[instrument(skip(self, req), fields(from = %req.from))]
    pub async fn build_skeleton(&self, req: SkeletonRequest) -> Result<SkeletonResponse> {
        let chain_addr: Address = req.from.into();

        let nonce = match req.nonce {
            Some(n) => n,
            None => {
                let chain_nonce = self.chain.get_nonce(chain_addr).await?;
                self.cache.get_nonce_hint(&req.from).map_or(chain_nonce, |h| h.max(chain_nonce))
            }
        };

        let gas_price = req.gas_price.unwrap_or_else(|| self.gas_price_default());

        let gas = match req.gas {
            Some(g) => g,
            None if req.data.is_empty() => self.default_gas,
            None => {
                let mut request = TransactionRequest::new().from(chain_addr);
                if let Some(to) = req.to {
                    request = request.to(to.into());
                }
                request = request.data(Bytes::copy_from_slice(&req.data));
                self.chain.estimate_gas(&request).await?
            }
        };

        let intrinsic = intrinsic_gas(&req.data);
        if gas < intrinsic {
            return Err(DomainError::InvalidTransaction(format!(
                "gas {gas} below intrinsic requirement {intrinsic} for this calldata"
            ))
            .into());
        }

        let value = match req.value {
            Some(ValueInput::Amount(v)) => v,
            Some(ValueInput::Max) => {
                let balance = self.chain.get_balance(chain_addr).await?;
                let fee = WeiAmount::new(gas_price.as_u256() * U256::from(gas));
                WeiAmount::new(balance)
                    .checked_sub(&fee)
                    .ok_or_else(|| DomainError::InvalidValue("balance too low to cover fees".into()))?
            }
            None => WeiAmount::ZERO,
        };

        let fields = TxFields { nonce, gas_price, gas, to: req.to, value, data: req.data };
        let encoded = fields.encode_unsigned(self.chain_id);
        Ok(SkeletonResponse { tx: envelope::encode_hex(&encoded) })
    }

    /// Admit a signed transaction: verify, check feasibility, submit to the
    /// network, and record the row.
    ///
    /// # Errors
    /// Returns a [`DomainError`] (wrapped in [`AppError`]) for every
    /// documented rejection reason: malformed envelope, signature mismatch,
    /// nonce reuse/order, or insufficient funds. Returns an infra error if
    /// the node or store call fails.
    #[instrument(skip(self, req))]
    pub async fn submit_signed_transaction(&self, req: SubmitRequest) -> Result<SubmitResponse> {
        let envelope = decode_and_verify(&req.tx, req.signature.as_deref())?;
        let sender = envelope
            .recover_sender()
            .map_err(|_| DomainError::InvalidSignature { reason: SignatureReason::DoesNotMatch })?;
        let nonce = envelope.fields.nonce;
        let tx_hash = envelope.tx_hash();

        if !self.cache.try_acquire_submission_lock(&sender, nonce) {
            return Err(DomainError::InvalidNonce { reason: NonceReason::AlreadyUsed }.into());
        }

        if self.store.find_by_sender_nonce(&sender, nonce).await?.is_some() {
            return Err(DomainError::InvalidNonce { reason: NonceReason::AlreadyUsed }.into());
        }

        let chain_addr: Address = sender.into();
        let chain_balance = self.chain.get_balance(chain_addr).await?;
        let unconfirmed = self.store.list_unconfirmed_by_sender(&sender).await?;
        let outstanding =
            unconfirmed.iter().fold(WeiAmount::ZERO, |acc, tx| acc.saturating_add(&tx.cost()));
        let available = WeiAmount::new(chain_balance).saturating_sub(&outstanding);

        let cost = envelope
            .fields
            .value
            .saturating_add(&WeiAmount::new(envelope.fields.gas_price.as_u256() * U256::from(envelope.fields.gas)));
        if available < cost {
            return Err(DomainError::InsufficientFunds.into());
        }

        let chain_nonce = self.chain.get_nonce(chain_addr).await?;
        let expected = self.cache.get_nonce_hint(&sender).map_or(chain_nonce, |h| h.max(chain_nonce));
        if nonce < expected {
            return Err(DomainError::InvalidNonce { reason: NonceReason::TooLow }.into());
        }
        if nonce > expected {
            return Err(DomainError::InvalidNonce { reason: NonceReason::TooHigh }.into());
        }

        self.chain.send_raw_transaction(Bytes::from(envelope.encode_signed())).await?;

        self.cache.set_nonce_hint(&sender, nonce + 1);

        let row = Transaction {
            id: Uuid::new_v4(),
            hash: Some(tx_hash),
            from_address: sender,
            to_address: envelope.fields.to,
            nonce,
            value: envelope.fields.value,
            gas: envelope.fields.gas,
            gas_price: envelope.fields.gas_price,
            data: envelope.fields.data.clone(),
            sig_v: Some(envelope.v),
            sig_r: Some(envelope.r),
            sig_s: Some(envelope.s),
            status: TransactionStatus::Unconfirmed,
            blocknumber: None,
            sender_token_id: req.sender_token_id,
            created: Utc::now(),
            updated: Utc::now(),
        };
        self.store.insert(&row).await?;

        let notifier = Arc::clone(&self.notifier);
        let early = row.clone();
        tokio::spawn(async move {
            if let Err(err) = notifier.notify_status_change(TransactionStatus::New, &early).await {
                warn!(tx_id = %early.id, %err, "early notification failed");
            }
        });

        Ok(SubmitResponse { tx_hash })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intrinsic_gas_is_21000_for_empty_calldata() {
        assert_eq!(intrinsic_gas(&[]), 21_000);
    }

    #[test]
    fn intrinsic_gas_charges_more_for_nonzero_bytes() {
        let zero_heavy = intrinsic_gas(&[0u8; 10]);
        let nonzero_heavy = intrinsic_gas(&[1u8; 10]);
        assert_eq!(zero_heavy, 21_000 + 10 * 4);
        assert_eq!(nonzero_heavy, 21_000 + 10 * 16);
        assert!(nonzero_heavy > zero_heavy);
    }

    #[test]
    fn value_input_parses_max_case_insensitively() {
        assert_eq!(ValueInput::parse("max").unwrap(), ValueInput::Max);
        assert_eq!(ValueInput::parse("MAX").unwrap(), ValueInput::Max);
    }

    #[test]
    fn value_input_parses_decimal_and_hex() {
        assert_eq!(ValueInput::parse("100").unwrap(), ValueInput::Amount(WeiAmount::from(100_u64)));
        assert_eq!(ValueInput::parse("0x64").unwrap(), ValueInput::Amount(WeiAmount::from(100_u64)));
    }

    #[test]
    fn value_input_rejects_garbage() {
        assert!(ValueInput::parse("not-a-number").is_err());
    }

    fn sample_fields() -> TxFields {
        TxFields {
            nonce: 4,
            gas_price: WeiAmount::from(20_000_000_000_u64),
            gas: 21_000,
            to: Some(EthAddress::from_slice(&[0x11; 20]).unwrap()),
            value: WeiAmount::from(1_000_u64),
            data: Vec::new(),
        }
    }

    #[test]
    fn unsigned_envelope_without_detached_signature_is_missing_signature() {
        let encoded = sample_fields().encode_unsigned(1);
        let hex = envelope::encode_hex(&encoded);
        let err = decode_and_verify(&hex, None).unwrap_err();
        assert!(matches!(err, DomainError::MissingSignature));
    }

    #[test]
    fn unsigned_envelope_with_wrong_length_signature_is_invalid_length() {
        let encoded = sample_fields().encode_unsigned(1);
        let hex = envelope::encode_hex(&encoded);
        let bad_sig = envelope::encode_hex(&[0u8; 64]);
        let err = decode_and_verify(&hex, Some(&bad_sig)).unwrap_err();
        assert!(matches!(
            err,
            DomainError::InvalidSignature { reason: SignatureReason::InvalidLength }
        ));
    }

    #[test]
    fn unsigned_envelope_with_valid_detached_signature_attaches() {
        let encoded = sample_fields().encode_unsigned(1);
        let hex = envelope::encode_hex(&encoded);
        let sig = envelope::encode_hex(&[7u8; 65]);
        let signed = decode_and_verify(&hex, Some(&sig)).unwrap();
        assert_eq!(signed.fields, sample_fields());
    }

    #[test]
    fn signed_envelope_with_mismatched_detached_signature_is_rejected() {
        let signed = SignedEnvelope::attach(sample_fields(), 1, &[7u8; 65]).unwrap();
        let hex = envelope::encode_hex(&signed.encode_signed());
        let other_sig = envelope::encode_hex(&[9u8; 65]);
        let err = decode_and_verify(&hex, Some(&other_sig)).unwrap_err();
        assert!(matches!(
            err,
            DomainError::InvalidSignature { reason: SignatureReason::DoesNotMatch }
        ));
    }

    #[test]
    fn signed_envelope_with_matching_detached_signature_is_accepted() {
        let signed = SignedEnvelope::attach(sample_fields(), 1, &[7u8; 65]).unwrap();
        let hex = envelope::encode_hex(&signed.encode_signed());
        let same_sig = envelope::encode_hex(&[7u8; 65]);
        let result = decode_and_verify(&hex, Some(&same_sig)).unwrap();
        assert_eq!(result.tx_hash(), signed.tx_hash());
    }

    #[test]
    fn signed_envelope_with_no_detached_signature_is_accepted() {
        let signed = SignedEnvelope::attach(sample_fields(), 1, &[7u8; 65]).unwrap();
        let hex = envelope::encode_hex(&signed.encode_signed());
        let result = decode_and_verify(&hex, None).unwrap();
        assert_eq!(result.tx_hash(), signed.tx_hash());
    }

    // Full admission pipeline (submission lock contention, balance/nonce
    // feasibility, chain submission) is exercised in integration tests
    // against `MockGatewayCache` + a scripted `TransactionStore` fake and
    // `chain_client::mock::MockProvider`, the same pattern used by
    // `queue::tests` and `indexer::block_monitor::tests`.
}
