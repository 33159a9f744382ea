//! In-memory cache implementation using moka and dashmap.
//!
//! Backs the [`Cache`] port with TTL'd entries so the Queue Processor's
//! per-sender coordination state never needs an in-process lock — any
//! process in the fleet holding a handle to the same backing store
//! (moka here; a shared `redis` deployment would use the same key shapes)
//! observes the same locks.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         MemoryCache                                  │
//! │                                                                     │
//! │   ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────┐    │
//! │   │  Nonce Hints    │  │ Processing Locks│  │  Rerun Flags    │    │
//! │   │  (moka, 1h)     │  │  (moka, 120s)   │  │  (dashmap)      │    │
//! │   └─────────────────┘  └─────────────────┘  └─────────────────┘    │
//! │                                                                     │
//! │   ┌─────────────────┐  ┌─────────────────┐                         │
//! │   │ Submission Locks│  │ Gas Price Floor │                         │
//! │   │  (moka, 5s)     │  │  (moka, 60s)    │                         │
//! │   └─────────────────┘  └─────────────────┘                         │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # TTL Strategy
//!
//! | Cache | TTL | Rationale |
//! |-------|-----|-----------|
//! | Nonce hints | 1 hour | Survives a worker restart, refreshed every skeleton build |
//! | Processing locks | 120s | Bounds how long a crashed worker can wedge a sender |
//! | Submission locks | 5s | Just long enough to cover the submit round-trip |
//! | Gas price floor | 60s | Matches the Housekeeper's refresh cadence |
//!
//! # Usage
//!
//! ```ignore
//! use gateway::store::MemoryCache;
//! use gateway::ports::Cache;
//!
//! let cache = MemoryCache::new();
//!
//! if cache.try_acquire_processing_lock(&sender) {
//!     // run a pass for `sender`
//!     let rerun = cache.release_processing_lock(&sender);
//! }
//! ```

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashSet;
use moka::sync::Cache as MokaCache;
use tracing::debug;

use crate::ports::Cache;
use crate::types::primitives::{EthAddress, WeiAmount};

// ═══════════════════════════════════════════════════════════════════════════════
// CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Nonce hint cache TTL.
const NONCE_HINT_TTL: Duration = Duration::from_secs(3_600);
/// Nonce hint cache max capacity.
const NONCE_HINT_MAX_CAPACITY: u64 = 100_000;

/// Processing lock TTL — bounds how long a crashed worker can hold a
/// sender's queue hostage.
const PROCESSING_LOCK_TTL: Duration = Duration::from_secs(120);
/// Processing lock max capacity.
const PROCESSING_LOCK_MAX_CAPACITY: u64 = 10_000;

/// Submission lock TTL — only needs to cover the submit round-trip.
const SUBMISSION_LOCK_TTL: Duration = Duration::from_secs(5);
/// Submission lock max capacity.
const SUBMISSION_LOCK_MAX_CAPACITY: u64 = 10_000;

// ═══════════════════════════════════════════════════════════════════════════════
// MEMORY CACHE
// ═══════════════════════════════════════════════════════════════════════════════

/// High-performance in-memory cache using moka and dashmap.
///
/// Implements the [`Cache`] port with production-ready features:
/// - TTL-based expiration on every coordination key
/// - Thread-safe concurrent access
///
/// # Thread Safety
///
/// All operations are thread-safe. The cache can be shared across tasks
/// via `Arc<MemoryCache>`.
#[derive(Debug)]
pub struct MemoryCache {
    /// Highest nonce hint issued per sender.
    nonce_hints: MokaCache<EthAddress, u64>,

    /// Senders with an in-flight queue processing pass.
    processing_locks: MokaCache<EthAddress, ()>,

    /// Senders whose in-flight pass should be immediately followed by
    /// another. Plain set, not moka — must not expire independently of
    /// the processing lock it's paired with.
    rerun_flags: DashSet<EthAddress>,

    /// `(sender, nonce)` pairs mid-submission.
    submission_locks: MokaCache<(EthAddress, u64), ()>,

    /// Cached `(standard, safe_low)` gas price floor, in wei.
    gas_price_standard: AtomicI64,
    gas_price_safe_low: AtomicI64,
    gas_price_set: std::sync::atomic::AtomicBool,

    /// Cache hit/miss counters, exposed for monitoring.
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryCache {
    /// Create a new memory cache with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nonce_hints: MokaCache::builder()
                .max_capacity(NONCE_HINT_MAX_CAPACITY)
                .time_to_live(NONCE_HINT_TTL)
                .build(),

            processing_locks: MokaCache::builder()
                .max_capacity(PROCESSING_LOCK_MAX_CAPACITY)
                .time_to_live(PROCESSING_LOCK_TTL)
                .build(),

            rerun_flags: DashSet::new(),

            submission_locks: MokaCache::builder()
                .max_capacity(SUBMISSION_LOCK_MAX_CAPACITY)
                .time_to_live(SUBMISSION_LOCK_TTL)
                .build(),

            gas_price_standard: AtomicI64::new(-1),
            gas_price_safe_low: AtomicI64::new(-1),
            gas_price_set: std::sync::atomic::AtomicBool::new(false),

            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Create a cache with a custom processing-lock TTL, for tests that
    /// want to observe expiry without waiting two minutes.
    #[must_use]
    pub fn with_processing_lock_ttl(ttl: Duration) -> Self {
        Self {
            processing_locks: MokaCache::builder()
                .max_capacity(PROCESSING_LOCK_MAX_CAPACITY)
                .time_to_live(ttl)
                .build(),
            ..Self::new()
        }
    }

    /// Run pending moka maintenance tasks immediately. Useful for tests.
    pub fn run_pending_tasks(&self) {
        self.nonce_hints.run_pending_tasks();
        self.processing_locks.run_pending_tasks();
        self.submission_locks.run_pending_tasks();
    }

    /// Current hit/miss counters, for monitoring.
    #[must_use]
    pub fn hit_miss(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CACHE TRAIT IMPLEMENTATION
// ═══════════════════════════════════════════════════════════════════════════════

impl Cache for MemoryCache {
    fn get_nonce_hint(&self, address: &EthAddress) -> Option<u64> {
        let result = self.nonce_hints.get(address);
        if result.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    fn set_nonce_hint(&self, address: &EthAddress, nonce: u64) {
        let current = self.nonce_hints.get(address).unwrap_or(0);
        if nonce > current {
            self.nonce_hints.insert(*address, nonce);
            debug!(%address, nonce, "Updated nonce hint");
        }
    }

    fn try_acquire_processing_lock(&self, address: &EthAddress) -> bool {
        if self.processing_locks.get(address).is_some() {
            return false;
        }
        self.processing_locks.insert(*address, ());
        debug!(%address, "Acquired processing lock");
        true
    }

    fn request_rerun(&self, address: &EthAddress) {
        self.rerun_flags.insert(*address);
        debug!(%address, "Requested rerun");
    }

    fn release_processing_lock(&self, address: &EthAddress) -> bool {
        self.processing_locks.invalidate(address);
        let rerun = self.rerun_flags.remove(address).is_some();
        debug!(%address, rerun, "Released processing lock");
        rerun
    }

    fn try_acquire_submission_lock(&self, address: &EthAddress, nonce: u64) -> bool {
        let key = (*address, nonce);
        if self.submission_locks.get(&key).is_some() {
            return false;
        }
        self.submission_locks.insert(key, ());
        true
    }

    fn get_gas_price_floor(&self) -> Option<(WeiAmount, WeiAmount)> {
        if !self.gas_price_set.load(Ordering::Acquire) {
            return None;
        }
        let standard = self.gas_price_standard.load(Ordering::Relaxed);
        let safe_low = self.gas_price_safe_low.load(Ordering::Relaxed);
        // Negative is impossible once `gas_price_set` is true, but guard anyway.
        if standard < 0 || safe_low < 0 {
            return None;
        }
        #[allow(clippy::cast_sign_loss)]
        Some((
            WeiAmount::from(standard as u64),
            WeiAmount::from(safe_low as u64),
        ))
    }

    fn set_gas_price_floor(&self, standard: WeiAmount, safe_low: WeiAmount) {
        let standard_u256 = standard.as_u256();
        let safe_low_u256 = safe_low.as_u256();
        // Gas prices fit comfortably in i64 wei terms for any realistic
        // network; truncation here would only occur for absurd inputs.
        let standard_i64 = i64::try_from(standard_u256.to::<u128>()).unwrap_or(i64::MAX);
        let safe_low_i64 = i64::try_from(safe_low_u256.to::<u128>()).unwrap_or(i64::MAX);
        self.gas_price_standard.store(standard_i64, Ordering::Relaxed);
        self.gas_price_safe_low.store(safe_low_i64, Ordering::Relaxed);
        self.gas_price_set.store(true, Ordering::Release);
        debug!("Refreshed gas price floor");
    }

    fn clear_all(&self) {
        self.nonce_hints.invalidate_all();
        self.processing_locks.invalidate_all();
        self.rerun_flags.clear();
        self.submission_locks.invalidate_all();
        self.gas_price_set.store(false, Ordering::Release);
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        debug!("Cleared all caches");
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
