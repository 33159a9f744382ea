//! Notification payloads dispatched by the Notifier.
//!
//! These are the wire shapes pushed to subscribers over `ws`/`gcm`/`apn`,
//! distinct from the [`super::entities`] persisted in the State Store.

use serde::{Deserialize, Serialize};

use super::enums::TransactionStatus;
use super::primitives::{EthAddress, TxHash, WeiAmount};

/// A plain value-transfer notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMessage {
    /// Transaction hash.
    pub tx_hash: TxHash,
    /// Sender.
    pub from_address: EthAddress,
    /// Recipient. Absent for contract creation.
    pub to_address: Option<EthAddress>,
    /// Value transferred, in wei.
    pub value: WeiAmount,
    /// Current status.
    pub status: TransactionStatus,
    /// Chain ID the transaction lives on.
    pub network_id: u64,
}

/// A token-transfer notification; adds the ERC20 contract address to a
/// [`PaymentMessage`]'s shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPaymentMessage {
    /// Transaction hash.
    pub tx_hash: TxHash,
    /// Sender per the Transfer event.
    pub from_address: EthAddress,
    /// Recipient per the Transfer event.
    pub to_address: Option<EthAddress>,
    /// Amount transferred, in the token's smallest unit.
    pub value: WeiAmount,
    /// Current status.
    pub status: TransactionStatus,
    /// Chain ID the transaction lives on.
    pub network_id: u64,
    /// ERC20 contract address.
    pub contract_address: EthAddress,
}

/// Tagged union of everything the Notifier can render and dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "PascalCase")]
pub enum NotificationMessage {
    /// Plain value transfer.
    Payment(PaymentMessage),
    /// ERC20-style transfer.
    TokenPayment(TokenPaymentMessage),
}

impl NotificationMessage {
    /// The transaction hash this notification concerns, regardless of
    /// variant.
    #[must_use]
    pub const fn tx_hash(&self) -> TxHash {
        match self {
            Self::Payment(m) => m.tx_hash,
            Self::TokenPayment(m) => m.tx_hash,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn payment_message_serializes_camel_case() {
        let msg = PaymentMessage {
            tx_hash: TxHash::new([1u8; 32]),
            from_address: EthAddress::ZERO,
            to_address: Some(EthAddress::ZERO),
            value: WeiAmount::from(1_u64),
            status: TransactionStatus::Confirmed,
            network_id: 1,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"fromAddress\""));
        assert!(json.contains("\"networkId\""));
    }

    #[test]
    fn notification_message_tx_hash_accessor() {
        let hash = TxHash::new([9u8; 32]);
        let msg = NotificationMessage::Payment(PaymentMessage {
            tx_hash: hash,
            from_address: EthAddress::ZERO,
            to_address: None,
            value: WeiAmount::ZERO,
            status: TransactionStatus::New,
            network_id: 1,
        });
        assert_eq!(msg.tx_hash(), hash);
    }
}
