//! Data persistence layer (adapters for store and cache ports).
//!
//! This module provides concrete implementations of the ports defined in
//! [`crate::ports`]. The durable store uses `PostgreSQL`; the coordination
//! cache is in-process `moka`, suitable for a single-node deployment (a
//! multi-node deployment would swap [`MemoryCache`] for a `redis`-backed
//! adapter implementing the same [`crate::ports::Cache`] trait).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Store Adapters                            │
//! │                                                                 │
//! │   ┌──────────────────────────────────────────────────────────┐  │
//! │   │                  PostgresStore                            │  │
//! │   │  ┌──────────────┐ ┌──────────────┐ ┌──────────────┐      │  │
//! │   │  │ Transactions │ │TokenTransfers│ │ TokenBalances│      │  │
//! │   │  └──────────────┘ └──────────────┘ └──────────────┘      │  │
//! │   │  ┌──────────────┐ ┌──────────────┐                       │  │
//! │   │  │Subscriptions │ │ ChainState   │                       │  │
//! │   │  └──────────────┘ └──────────────┘                       │  │
//! │   └──────────────────────────────────────────────────────────┘  │
//! │                               │                                  │
//! │                               ▼                                  │
//! │   ┌──────────────────────────────────────────────────────────┐  │
//! │   │              SQLx Connection Pool (PostgreSQL)             │  │
//! │   └──────────────────────────────────────────────────────────┘  │
//! │                                                                 │
//! │   ┌──────────────────────────────────────────────────────────┐  │
//! │   │          MemoryCache (moka + dashmap, `Cache` port)        │  │
//! │   └──────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use gateway::store::PostgresStore;
//! use sqlx::postgres::PgPoolOptions;
//!
//! let pool = PgPoolOptions::new()
//!     .max_connections(10)
//!     .connect("postgres://localhost/gateway")
//!     .await?;
//!
//! sqlx::migrate!("./migrations").run(&pool).await?;
//!
//! let store = PostgresStore::new(pool);
//! let tx = store.find_by_hash(&hash).await?;
//! ```
//!
//! # Migrations
//!
//! Migrations are located in `migrations/` and run via `sqlx migrate run`.
//! See individual migration files for schema details.

mod cache;
mod dispatch;
mod gas_oracle;
mod postgres;

pub use cache::MemoryCache;
pub use dispatch::{CompositeDispatcher, PushEndpoints, WsRegistry};
pub use gas_oracle::HttpGasOracle;
pub use postgres::PostgresStore;

// Re-export commonly used types for convenience
pub use sqlx::postgres::PgPool;
