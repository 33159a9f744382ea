//! Block Monitor: polls the chain for new blocks, reconciles pending
//! transactions against chain state, extracts token-transfer events, and
//! advances the durable checkpoint.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          Block Monitor                               │
//! │                                                                      │
//! │  ┌──────────────────┐   ┌──────────────────┐   ┌──────────────────┐ │
//! │  │ CheckpointManager│──▶│  fetch block +   │──▶│  ReorgHandler     │ │
//! │  │ (start/advance)  │   │  filtered logs   │   │  (detect/rollback)│ │
//! │  └──────────────────┘   └──────────────────┘   └──────────────────┘ │
//! │            │                      │                       │         │
//! │            ▼                      ▼                       ▼         │
//! │   ChainStateStore          TransactionStore         TokenTransferStore│
//! │                                                    + TokenBalanceStore│
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`checkpoint`] and [`reorg_handler`] are reusable building blocks;
//! [`block_monitor`] is the component that drives a tick using both plus the
//! domain stores and a [`chain_client::ChainProvider`].

pub mod block_monitor;
pub mod checkpoint;
pub mod reorg_handler;

pub use block_monitor::BlockMonitor;
pub use checkpoint::{CheckpointManager, CheckpointState, RecoveryMode};
pub use reorg_handler::{ReorgCheckResult, ReorgHandler, ReorgStats};
