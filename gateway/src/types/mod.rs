//! Domain types for the wallet transaction gateway.
//!
//! - [`enums`] - Closed enumerations (`TransactionStatus`, `Transport`, `TokenTransferStatus`)
//! - [`primitives`] - Validated newtypes (`EthAddress`, `TxHash`, `WeiAmount`, `BlockNumber`)
//! - [`events`] - On-chain log events decoded by the Block Monitor
//! - [`entities`] - Domain entities for State Store persistence
//! - [`messages`] - Notification payloads dispatched by the Notifier

pub mod entities;
pub mod enums;
pub mod events;
pub mod messages;
pub mod primitives;

// Re-export commonly used types at module level
pub use entities::{LastBlock, Subscription, TokenBalance, TokenTransfer, Transaction};
pub use enums::{TokenTransferStatus, Transport, TransactionStatus};
pub use events::{LogMetadata, TokenLog};
pub use messages::{NotificationMessage, PaymentMessage, TokenPaymentMessage};
pub use primitives::{BlockNumber, EthAddress, InvalidAmount, TxHash, WeiAmount};
