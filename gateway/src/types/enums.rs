//! Domain enumerations for the wallet gateway.
//!
//! Each enum provides:
//! - Safe conversion from/to numeric or string values
//! - Database serialization via `sqlx::Type`
//! - JSON serialization via `serde`
//! - Domain-specific helper methods (notably [`TransactionStatus`]'s
//!   transition table)

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSACTION STATUS - closed state machine, §3 and §9 "status as tagged variant"
// ═══════════════════════════════════════════════════════════════════════════════

/// Lifecycle status of a transaction row.
///
/// Transitions are monotone except `Confirmed -> Confirmed` (idempotent).
/// `Confirmed -> anything` is rejected; `Error` is terminal. See
/// [`TransactionStatus::can_transition_to`] for the explicit transition
/// table referenced by the data layer rather than scattering checks through
/// the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[repr(i16)]
#[sqlx(type_name = "smallint")]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Freshly admitted, not yet examined by the queue processor.
    New = 0,
    /// Held back by the queue processor (nonce gap, gas floor, or awaiting funds).
    Queued = 1,
    /// Accepted by a node via `sendRawTransaction` at least once.
    Unconfirmed = 2,
    /// Observed mined in a block; `blocknumber` is set.
    Confirmed = 3,
    /// Terminal failure. Never transitions further.
    Error = 4,
}

impl TransactionStatus {
    /// Human-readable name for display/logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Queued => "queued",
            Self::Unconfirmed => "unconfirmed",
            Self::Confirmed => "confirmed",
            Self::Error => "error",
        }
    }

    /// Whether a row in this status is still live in the per-sender queue
    /// (eligible for a queue processor pass).
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::New | Self::Queued)
    }

    /// Whether the transaction has left the network-facing part of its
    /// lifecycle (either it landed on chain or it never will).
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Error)
    }

    /// Explicit transition table: can a row move from `self` to `next`?
    ///
    /// `Confirmed -> Confirmed` is the one allowed idempotent self-loop;
    /// every other self-loop and every transition out of `Error` or out of
    /// `Confirmed` (other than to itself) is rejected.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        match (self, next) {
            (Self::Confirmed, Self::Confirmed) => true,
            (Self::Confirmed | Self::Error, _) => false,
            (Self::New, Self::Queued | Self::Unconfirmed | Self::Error) => true,
            (Self::Queued, Self::Unconfirmed | Self::Error) => true,
            (Self::Unconfirmed, Self::Confirmed | Self::Error) => true,
            _ => false,
        }
    }
}

/// Error returned when an invalid transaction status value is provided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transaction status value: {0}")]
pub struct InvalidTransactionStatus(pub u8);

impl TryFrom<u8> for TransactionStatus {
    type Error = InvalidTransactionStatus;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::New),
            1 => Ok(Self::Queued),
            2 => Ok(Self::Unconfirmed),
            3 => Ok(Self::Confirmed),
            4 => Ok(Self::Error),
            _ => Err(InvalidTransactionStatus(value)),
        }
    }
}

impl From<TransactionStatus> for u8 {
    #[allow(clippy::cast_sign_loss)]
    fn from(status: TransactionStatus) -> Self {
        status as i16 as Self
    }
}

impl From<TransactionStatus> for i16 {
    fn from(status: TransactionStatus) -> Self {
        status as Self
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSPORT - subscription delivery channel, §3/§4.4/§6
// ═══════════════════════════════════════════════════════════════════════════════

/// Push-notification transport a client is subscribed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[repr(i16)]
#[sqlx(type_name = "smallint")]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Live WebSocket connection.
    Ws = 0,
    /// Google Cloud Messaging (Android).
    Gcm = 1,
    /// Apple Push Notification service (iOS).
    Apn = 2,
}

impl Transport {
    /// Human-readable name matching the wire/config convention (`ws`, `gcm`, `apn`).
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Ws => "ws",
            Self::Gcm => "gcm",
            Self::Apn => "apn",
        }
    }
}

/// Error returned when an invalid transport value is provided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transport value: {0}")]
pub struct InvalidTransport(pub u8);

impl TryFrom<u8> for Transport {
    type Error = InvalidTransport;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Ws),
            1 => Ok(Self::Gcm),
            2 => Ok(Self::Apn),
            _ => Err(InvalidTransport(value)),
        }
    }
}

impl From<Transport> for i16 {
    fn from(transport: Transport) -> Self {
        transport as Self
    }
}

impl std::str::FromStr for Transport {
    type Err = InvalidTransportName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ws" => Ok(Self::Ws),
            "gcm" => Ok(Self::Gcm),
            "apn" => Ok(Self::Apn),
            other => Err(InvalidTransportName(other.to_string())),
        }
    }
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Error returned when an invalid transport name is provided.
#[derive(Debug, Clone, Error)]
#[error("invalid transport name: {0}")]
pub struct InvalidTransportName(pub String);

// ═══════════════════════════════════════════════════════════════════════════════
// TOKEN TRANSFER STATUS - mirrors transaction status but narrower, §3
// ═══════════════════════════════════════════════════════════════════════════════

/// Lifecycle status of a token transfer row.
///
/// Mirrors the owning [`TransactionStatus`] in the common case, but can
/// independently become `Error` when the expected Transfer event is absent
/// from the receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[repr(i16)]
#[sqlx(type_name = "smallint")]
#[serde(rename_all = "lowercase")]
pub enum TokenTransferStatus {
    /// Not yet confirmed; tracks the parent transaction.
    Pending = 0,
    /// Confirmed on chain alongside its parent.
    Confirmed = 1,
    /// Expected event was absent from the receipt.
    Error = 2,
}

impl TokenTransferStatus {
    /// Derive the token-transfer status a newly confirmed parent transaction
    /// implies, given whether the event was actually found in the receipt.
    #[must_use]
    pub const fn from_confirmation(event_present: bool) -> Self {
        if event_present { Self::Confirmed } else { Self::Error }
    }
}

/// Error returned when an invalid token transfer status value is provided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid token transfer status value: {0}")]
pub struct InvalidTokenTransferStatus(pub u8);

impl TryFrom<u8> for TokenTransferStatus {
    type Error = InvalidTokenTransferStatus;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Pending),
            1 => Ok(Self::Confirmed),
            2 => Ok(Self::Error),
            _ => Err(InvalidTokenTransferStatus(value)),
        }
    }
}

impl From<TokenTransferStatus> for i16 {
    fn from(status: TokenTransferStatus) -> Self {
        status as Self
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_transition_table_forbids_leaving_confirmed() {
        assert!(TransactionStatus::Confirmed.can_transition_to(TransactionStatus::Confirmed));
        assert!(!TransactionStatus::Confirmed.can_transition_to(TransactionStatus::Error));
        assert!(!TransactionStatus::Confirmed.can_transition_to(TransactionStatus::Unconfirmed));
    }

    #[test]
    fn status_transition_table_forbids_leaving_error() {
        assert!(!TransactionStatus::Error.can_transition_to(TransactionStatus::New));
        assert!(!TransactionStatus::Error.can_transition_to(TransactionStatus::Error));
    }

    #[test]
    fn status_transition_table_allows_happy_path() {
        assert!(TransactionStatus::New.can_transition_to(TransactionStatus::Queued));
        assert!(TransactionStatus::New.can_transition_to(TransactionStatus::Unconfirmed));
        assert!(TransactionStatus::Queued.can_transition_to(TransactionStatus::Unconfirmed));
        assert!(TransactionStatus::Unconfirmed.can_transition_to(TransactionStatus::Confirmed));
    }

    #[test]
    fn status_transition_table_rejects_skipping_backwards() {
        assert!(!TransactionStatus::Unconfirmed.can_transition_to(TransactionStatus::New));
        assert!(!TransactionStatus::Queued.can_transition_to(TransactionStatus::New));
    }

    #[test]
    fn transport_roundtrips_through_name() {
        for t in [Transport::Ws, Transport::Gcm, Transport::Apn] {
            assert_eq!(t.name().parse::<Transport>().unwrap(), t);
        }
    }

    #[test]
    fn transport_rejects_unknown_name() {
        assert!("carrier-pigeon".parse::<Transport>().is_err());
    }

    #[test]
    fn token_transfer_status_from_confirmation() {
        assert_eq!(
            TokenTransferStatus::from_confirmation(true),
            TokenTransferStatus::Confirmed
        );
        assert_eq!(
            TokenTransferStatus::from_confirmation(false),
            TokenTransferStatus::Error
        );
    }
}
