//! Legacy (EIP-155) transaction envelope: canonical encoding, decoding, and
//! signature recovery.
//!
//! Intake builds an *unsigned* envelope for [`/tx/skel`], the client signs
//! its hash off-device, and [`/tx`] decodes whatever comes back — either a
//! fully signed envelope, or the same unsigned envelope plus a detached
//! 65-byte signature. Both paths funnel through [`SignedEnvelope`] so the
//! Queue Processor always re-encodes the exact bytes it hands to
//! `sendRawTransaction`.
//!
//! The wire shape is the standard EIP-155 legacy transaction list:
//! `[nonce, gasPrice, gasLimit, to, value, data, v, r, s]`, with `to` RLP-
//! encoded as an empty string for contract creation. The *unsigned* form
//! used for signing/skeletons replaces `(v, r, s)` with `(chainId, 0, 0)`;
//! its keccak256 hash is exactly the EIP-155 signing hash.

use alloy::primitives::{Address, Bytes, PrimitiveSignature as Signature, U256, keccak256};
use alloy::rlp::{BufMut, Decodable, Encodable, Header};

use crate::types::primitives::{EthAddress, TxHash, WeiAmount};

// ═══════════════════════════════════════════════════════════════════════════════
// FIELD SET
// ═══════════════════════════════════════════════════════════════════════════════

/// The six fields a skeleton carries, shared by the unsigned and signed
/// wire forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxFields {
    /// Sender-scoped sequence number.
    pub nonce: u64,
    /// Gas price, in wei.
    pub gas_price: WeiAmount,
    /// Gas limit.
    pub gas: u64,
    /// Recipient. `None` for contract creation.
    pub to: Option<EthAddress>,
    /// Value transferred, in wei.
    pub value: WeiAmount,
    /// Calldata.
    pub data: Vec<u8>,
}

/// Error decoding or verifying an envelope.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EnvelopeError {
    /// RLP structure was malformed.
    #[error("malformed envelope: {0}")]
    Malformed(String),
    /// Trailing bytes after a complete RLP list.
    #[error("trailing bytes after envelope")]
    TrailingBytes,
    /// Hex decoding failed.
    #[error("invalid hex: {0}")]
    InvalidHex(String),
    /// Detached signature was not exactly 65 bytes.
    #[error("signature must be exactly 65 bytes, got {0}")]
    WrongSignatureLength(usize),
    /// Signature recovery failed or recovered an address other than the
    /// one claimed.
    #[error("signature does not recover to the claimed sender")]
    RecoveryMismatch,
}

fn to_as_bytes(to: Option<&EthAddress>) -> Vec<u8> {
    to.map(|a| a.as_slice().to_vec()).unwrap_or_default()
}

fn encode_field(out: &mut dyn BufMut, field: &[u8]) {
    // Addresses/empty-to encode as RLP byte strings; reuse Bytes' impl so
    // the empty (contract-creation) case produces the canonical single
    // 0x80 byte rather than a zero-length list.
    Bytes::copy_from_slice(field).encode(out);
}

fn rlp_list(fields: Vec<Vec<u8>>) -> Vec<u8> {
    let payload_length: usize = fields.iter().map(Vec::len).sum();
    let mut out = Vec::with_capacity(payload_length + 9);
    Header { list: true, payload_length }.encode(&mut out);
    for f in fields {
        out.put_slice(&f);
    }
    out
}

fn encoded(value: &impl Encodable) -> Vec<u8> {
    let mut buf = Vec::new();
    value.encode(&mut buf);
    buf
}

impl TxFields {
    /// Encode the EIP-155 unsigned preimage: `[nonce, gasPrice, gasLimit,
    /// to, value, data, chainId, 0, 0]`. Its keccak256 hash is the hash the
    /// client signs.
    #[must_use]
    pub fn encode_unsigned(&self, chain_id: u64) -> Vec<u8> {
        let mut to_buf = Vec::new();
        encode_field(&mut to_buf, &to_as_bytes(self.to.as_ref()));
        let fields = vec![
            encoded(&self.nonce),
            encoded(&self.gas_price.as_u256()),
            encoded(&self.gas),
            to_buf,
            encoded(&self.value.as_u256()),
            encoded(&Bytes::copy_from_slice(&self.data)),
            encoded(&chain_id),
            encoded(&U256::ZERO),
            encoded(&U256::ZERO),
        ];
        rlp_list(fields)
    }

    /// keccak256 of [`Self::encode_unsigned`] — the EIP-155 signing hash.
    #[must_use]
    pub fn signing_hash(&self, chain_id: u64) -> TxHash {
        TxHash::from(keccak256(self.encode_unsigned(chain_id)))
    }

    /// Decode the 9-field unsigned (or signed) list back into fields plus
    /// the trailing three RLP-decoded values, leaving the caller to
    /// interpret them as `(chainId, 0, 0)` or `(v, r, s)`.
    fn decode_list(bytes: &[u8]) -> Result<(Self, U256, U256, U256), EnvelopeError> {
        let mut buf = bytes;
        let header =
            Header::decode(&mut buf).map_err(|e| EnvelopeError::Malformed(e.to_string()))?;
        if !header.list {
            return Err(EnvelopeError::Malformed("expected RLP list".into()));
        }
        if header.payload_length > buf.len() {
            return Err(EnvelopeError::Malformed("truncated list payload".into()));
        }
        let (mut body, rest) = buf.split_at(header.payload_length);
        if !rest.is_empty() {
            return Err(EnvelopeError::TrailingBytes);
        }

        let nonce = u64::decode(&mut body).map_err(|e| EnvelopeError::Malformed(e.to_string()))?;
        let gas_price =
            U256::decode(&mut body).map_err(|e| EnvelopeError::Malformed(e.to_string()))?;
        let gas = u64::decode(&mut body).map_err(|e| EnvelopeError::Malformed(e.to_string()))?;
        let to_bytes =
            Bytes::decode(&mut body).map_err(|e| EnvelopeError::Malformed(e.to_string()))?;
        let value =
            U256::decode(&mut body).map_err(|e| EnvelopeError::Malformed(e.to_string()))?;
        let data = Bytes::decode(&mut body).map_err(|e| EnvelopeError::Malformed(e.to_string()))?;
        let f1 = U256::decode(&mut body).map_err(|e| EnvelopeError::Malformed(e.to_string()))?;
        let f2 = U256::decode(&mut body).map_err(|e| EnvelopeError::Malformed(e.to_string()))?;
        let f3 = U256::decode(&mut body).map_err(|e| EnvelopeError::Malformed(e.to_string()))?;

        if !body.is_empty() {
            return Err(EnvelopeError::Malformed("unexpected trailing list fields".into()));
        }

        let to = if to_bytes.is_empty() {
            None
        } else {
            Some(
                EthAddress::from_slice(&to_bytes)
                    .map_err(|_| EnvelopeError::Malformed("bad `to` address length".into()))?,
            )
        };

        Ok((
            Self {
                nonce,
                gas_price: WeiAmount::new(gas_price),
                gas,
                to,
                value: WeiAmount::new(value),
                data: data.to_vec(),
            },
            f1,
            f2,
            f3,
        ))
    }

    /// Decode a `0x`-hex or raw unsigned envelope, returning the fields and
    /// the `chainId` carried in the trailing slot.
    ///
    /// # Errors
    /// Returns an error if the bytes are not a well-formed unsigned
    /// envelope.
    pub fn decode_unsigned(hex_or_bytes: &str) -> Result<(Self, u64), EnvelopeError> {
        let bytes = decode_hex(hex_or_bytes)?;
        let (fields, chain_id, r, s) = Self::decode_list(&bytes)?;
        if r != U256::ZERO || s != U256::ZERO {
            return Err(EnvelopeError::Malformed(
                "expected unsigned envelope (r = s = 0)".into(),
            ));
        }
        let chain_id: u64 = chain_id
            .try_into()
            .map_err(|_| EnvelopeError::Malformed("chain id out of range".into()))?;
        Ok((fields, chain_id))
    }
}

/// Decode `0x`-prefixed (or bare) hex into bytes.
///
/// # Errors
/// Returns an error if the string is not valid hex.
pub fn decode_hex(s: &str) -> Result<Vec<u8>, EnvelopeError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(s).map_err(|e| EnvelopeError::InvalidHex(e.to_string()))
}

/// Encode bytes as `0x`-prefixed lowercase hex.
#[must_use]
pub fn encode_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

// ═══════════════════════════════════════════════════════════════════════════════
// SIGNED ENVELOPE
// ═══════════════════════════════════════════════════════════════════════════════

/// A fully signed legacy transaction: fields plus an EIP-155 `(v, r, s)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedEnvelope {
    /// Shared fields.
    pub fields: TxFields,
    /// Chain the signature was computed against.
    pub chain_id: u64,
    /// EIP-155 recovery id (`chain_id * 2 + 35 + recid`).
    pub v: u64,
    /// Signature r component.
    pub r: [u8; 32],
    /// Signature s component.
    pub s: [u8; 32],
}

impl SignedEnvelope {
    /// Attach a detached 65-byte signature (`r(32) || s(32) || recid(1)`)
    /// to a set of unsigned fields, computing the EIP-155 `v`.
    ///
    /// # Errors
    /// Returns an error if the signature is not exactly 65 bytes.
    pub fn attach(
        fields: TxFields,
        chain_id: u64,
        signature: &[u8],
    ) -> Result<Self, EnvelopeError> {
        if signature.len() != 65 {
            return Err(EnvelopeError::WrongSignatureLength(signature.len()));
        }
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&signature[0..32]);
        s.copy_from_slice(&signature[32..64]);
        let recid = u64::from(signature[64] & 0x01);
        let v = chain_id * 2 + 35 + recid;
        Ok(Self { fields, chain_id, v, r, s })
    }

    /// Decode a fully signed envelope (`0x`-hex or raw bytes).
    ///
    /// # Errors
    /// Returns an error if the bytes are not a well-formed signed envelope.
    pub fn decode(hex_or_bytes: &str) -> Result<Self, EnvelopeError> {
        let bytes = decode_hex(hex_or_bytes)?;
        let (fields, v, r, s) = TxFields::decode_list(&bytes)?;
        let v: u64 = v.try_into().map_err(|_| EnvelopeError::Malformed("v out of range".into()))?;
        let chain_id = (v.saturating_sub(35)) / 2;
        let mut r_bytes = [0u8; 32];
        let mut s_bytes = [0u8; 32];
        r_bytes.copy_from_slice(&r.to_be_bytes::<32>());
        s_bytes.copy_from_slice(&s.to_be_bytes::<32>());
        Ok(Self { fields, chain_id, v, r: r_bytes, s: s_bytes })
    }

    /// The EIP-155 signing hash this envelope's signature was computed
    /// over.
    #[must_use]
    pub fn signing_hash(&self) -> TxHash {
        self.fields.signing_hash(self.chain_id)
    }

    /// Recover the sender address from the signature and signing hash.
    ///
    /// # Errors
    /// Returns [`EnvelopeError::RecoveryMismatch`] if the signature is
    /// malformed or does not recover to a valid address.
    pub fn recover_sender(&self) -> Result<EthAddress, EnvelopeError> {
        // EIP-155: v = chainId * 2 + 35 + recid, so recid is v's parity.
        let parity = self.v % 2 == 0;
        let r = U256::from_be_bytes(self.r);
        let s = U256::from_be_bytes(self.s);
        let signature = Signature::new(r, s, parity);
        let hash = self.signing_hash();
        let recovered: Address = signature
            .recover_address_from_prehash(&hash.into())
            .map_err(|_| EnvelopeError::RecoveryMismatch)?;
        Ok(EthAddress::from(recovered))
    }

    /// Encode the final `[nonce, gasPrice, gasLimit, to, value, data, v, r,
    /// s]` list — the exact bytes passed to `eth_sendRawTransaction`.
    #[must_use]
    pub fn encode_signed(&self) -> Vec<u8> {
        let mut to_buf = Vec::new();
        encode_field(&mut to_buf, &to_as_bytes(self.fields.to.as_ref()));
        let fields = vec![
            encoded(&self.fields.nonce),
            encoded(&self.fields.gas_price.as_u256()),
            encoded(&self.fields.gas),
            to_buf,
            encoded(&self.fields.value.as_u256()),
            encoded(&Bytes::copy_from_slice(&self.fields.data)),
            encoded(&self.v),
            encoded(&U256::from_be_bytes(self.r)),
            encoded(&U256::from_be_bytes(self.s)),
        ];
        rlp_list(fields)
    }

    /// Canonical transaction hash: keccak256 of [`Self::encode_signed`].
    /// This is the hash reported to clients and stored alongside the row.
    #[must_use]
    pub fn tx_hash(&self) -> TxHash {
        TxHash::from(keccak256(self.encode_signed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_fields() -> TxFields {
        TxFields {
            nonce: 4,
            gas_price: WeiAmount::from(20_000_000_000_u64),
            gas: 21_000,
            to: Some(EthAddress::from_slice(&[0x11; 20]).unwrap()),
            value: WeiAmount::from(1_000_000_000_000_u64),
            data: Vec::new(),
        }
    }

    #[test]
    fn unsigned_roundtrip_preserves_fields() {
        let fields = sample_fields();
        let encoded = fields.encode_unsigned(1);
        let hex = encode_hex(&encoded);
        let (decoded, chain_id) = TxFields::decode_unsigned(&hex).unwrap();
        assert_eq!(decoded, fields);
        assert_eq!(chain_id, 1);
    }

    #[test]
    fn signing_hash_is_deterministic() {
        let fields = sample_fields();
        assert_eq!(fields.signing_hash(1), fields.signing_hash(1));
        assert_ne!(fields.signing_hash(1), fields.signing_hash(2));
    }

    #[test]
    fn contract_creation_encodes_empty_to() {
        let mut fields = sample_fields();
        fields.to = None;
        let encoded = fields.encode_unsigned(1);
        let (decoded, _) = TxFields::decode_unsigned(&encode_hex(&encoded)).unwrap();
        assert_eq!(decoded.to, None);
    }

    #[test]
    fn attach_rejects_wrong_length_signature() {
        let fields = sample_fields();
        let err = SignedEnvelope::attach(fields, 1, &[0u8; 64]);
        assert!(matches!(err, Err(EnvelopeError::WrongSignatureLength(64))));
    }

    #[test]
    fn signed_envelope_hash_changes_with_fields() {
        let fields = sample_fields();
        let sig = [7u8; 65];
        let a = SignedEnvelope::attach(fields.clone(), 1, &sig).unwrap();
        let mut fields2 = fields;
        fields2.nonce += 1;
        let b = SignedEnvelope::attach(fields2, 1, &sig).unwrap();
        assert_ne!(a.tx_hash(), b.tx_hash());
    }
}
