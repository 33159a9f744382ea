//! Caching port for queue coordination and nonce hints.
//!
//! Backs the per-sender mutual-exclusion scheme the Queue Processor relies
//! on to scale horizontally: workers never hold an in-process lock, they
//! compete for a TTL'd key in a cache shared across the fleet.

use crate::types::primitives::{EthAddress, WeiAmount};

// ═══════════════════════════════════════════════════════════════════════════════
// CACHE
// ═══════════════════════════════════════════════════════════════════════════════

/// Port for the Queue Processor's coordination state and assorted hints.
///
/// # Per-Sender Mutual Exclusion
///
/// Each sender's queue pass is serialized through a `(processing, rerun)`
/// pair held in the cache, not an in-process lock:
///
/// 1. A worker calls [`try_acquire_processing_lock`](Cache::try_acquire_processing_lock)
///    before running a pass for a sender. Only one worker in the fleet
///    succeeds at a time (SETNX semantics, TTL-bounded in case a worker
///    dies mid-pass).
/// 2. If another worker observes the sender needs reprocessing while a
///    pass is in flight, it calls [`request_rerun`](Cache::request_rerun)
///    instead of blocking.
/// 3. At the end of a pass, the owning worker calls
///    [`release_processing_lock`](Cache::release_processing_lock), which
///    atomically clears the lock *and* reads-and-clears the rerun flag in
///    one step. If it reports a rerun was requested, the worker loops and
///    runs another pass immediately rather than releasing and racing a
///    fresh acquire.
///
/// # Implementation Notes
///
/// Implementations should:
/// - Use an atomic set-if-absent with TTL for the processing lock
/// - Use TTL-bounded keys throughout; nothing here is relied on as durable
///   state — the stores are durable, the cache is an optimization plus a
///   coordination primitive
pub trait Cache: Send + Sync {
    /// Get the cached nonce hint for a sender — the nonce one past the
    /// highest one this process has assigned, used to build new skeletons
    /// without racing the chain's own nonce accounting.
    ///
    /// Returns `None` on cache miss.
    fn get_nonce_hint(&self, address: &EthAddress) -> Option<u64>;

    /// Cache a nonce hint, if `nonce` is higher than any previously cached
    /// value for this sender.
    fn set_nonce_hint(&self, address: &EthAddress, nonce: u64);

    /// Attempt to acquire the processing lock for a sender.
    ///
    /// Returns `true` if this call acquired the lock, `false` if another
    /// worker already holds it. The lock expires on its own after a fixed
    /// TTL if never released, so a crashed worker cannot wedge a sender's
    /// queue forever.
    fn try_acquire_processing_lock(&self, address: &EthAddress) -> bool;

    /// Request that the current (or next) processing pass for `address`
    /// be followed by another pass.
    ///
    /// Called by a worker that observes new work for a sender while that
    /// sender's processing lock is already held by someone else.
    fn request_rerun(&self, address: &EthAddress);

    /// Release the processing lock for a sender, atomically reading and
    /// clearing any pending rerun request.
    ///
    /// Returns `true` if a rerun was requested during the pass just
    /// completed — the caller should run another pass immediately instead
    /// of releasing control.
    fn release_processing_lock(&self, address: &EthAddress) -> bool;

    /// Attempt to acquire the short-lived submission lock for a specific
    /// `(sender, nonce)` pair, guarding the narrow window between deciding
    /// to submit a transaction and it being accepted by the node.
    ///
    /// Returns `true` if this call acquired the lock.
    fn try_acquire_submission_lock(&self, address: &EthAddress, nonce: u64) -> bool;

    /// Get the cached gas-price floor, as `(standard, safe_low)` in wei.
    ///
    /// Returns `None` if the Housekeeper hasn't refreshed it yet.
    fn get_gas_price_floor(&self) -> Option<(WeiAmount, WeiAmount)>;

    /// Cache a refreshed gas-price floor.
    fn set_gas_price_floor(&self, standard: WeiAmount, safe_low: WeiAmount);

    /// Clear all cached state.
    ///
    /// Use sparingly — typically only in tests or after a reorg rollback
    /// deep enough to invalidate nonce hints.
    fn clear_all(&self);
}

#[cfg(any(test, feature = "test-utils"))]
#[allow(
    clippy::expect_used, // Test-only code; panicking on lock poison is acceptable
    clippy::significant_drop_tightening
)]
pub mod mocks {
    //! Mock implementations for testing.

    use std::collections::{HashMap, HashSet};
    use std::sync::RwLock;

    use super::{Cache, EthAddress, WeiAmount};

    /// Simple in-memory cache for testing. No TTL expiry — locks are held
    /// until explicitly released, which is sufficient for single-threaded
    /// unit tests exercising the coordination protocol.
    #[derive(Debug, Default)]
    pub struct MockGatewayCache {
        nonce_hints: RwLock<HashMap<EthAddress, u64>>,
        processing_locks: RwLock<HashSet<EthAddress>>,
        rerun_flags: RwLock<HashSet<EthAddress>>,
        submission_locks: RwLock<HashSet<(EthAddress, u64)>>,
        gas_floor: RwLock<Option<(WeiAmount, WeiAmount)>>,
    }

    impl MockGatewayCache {
        /// Create a new mock cache.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl Cache for MockGatewayCache {
        fn get_nonce_hint(&self, address: &EthAddress) -> Option<u64> {
            self.nonce_hints.read().expect("lock poisoned").get(address).copied()
        }

        fn set_nonce_hint(&self, address: &EthAddress, nonce: u64) {
            let mut hints = self.nonce_hints.write().expect("lock poisoned");
            let entry = hints.entry(*address).or_insert(nonce);
            if nonce > *entry {
                *entry = nonce;
            }
        }

        fn try_acquire_processing_lock(&self, address: &EthAddress) -> bool {
            self.processing_locks.write().expect("lock poisoned").insert(*address)
        }

        fn request_rerun(&self, address: &EthAddress) {
            self.rerun_flags.write().expect("lock poisoned").insert(*address);
        }

        fn release_processing_lock(&self, address: &EthAddress) -> bool {
            self.processing_locks.write().expect("lock poisoned").remove(address);
            self.rerun_flags.write().expect("lock poisoned").remove(address)
        }

        fn try_acquire_submission_lock(&self, address: &EthAddress, nonce: u64) -> bool {
            self.submission_locks.write().expect("lock poisoned").insert((*address, nonce))
        }

        fn get_gas_price_floor(&self) -> Option<(WeiAmount, WeiAmount)> {
            *self.gas_floor.read().expect("lock poisoned")
        }

        fn set_gas_price_floor(&self, standard: WeiAmount, safe_low: WeiAmount) {
            *self.gas_floor.write().expect("lock poisoned") = Some((standard, safe_low));
        }

        fn clear_all(&self) {
            self.nonce_hints.write().expect("lock poisoned").clear();
            self.processing_locks.write().expect("lock poisoned").clear();
            self.rerun_flags.write().expect("lock poisoned").clear();
            self.submission_locks.write().expect("lock poisoned").clear();
            *self.gas_floor.write().expect("lock poisoned") = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mocks::MockGatewayCache;
    use super::*;

    fn addr(byte: u8) -> EthAddress {
        EthAddress::from_slice(&[byte; 20]).expect("20 bytes")
    }

    #[test]
    fn nonce_hint_only_increases() {
        let cache = MockGatewayCache::new();
        let a = addr(1);
        cache.set_nonce_hint(&a, 5);
        cache.set_nonce_hint(&a, 3);
        assert_eq!(cache.get_nonce_hint(&a), Some(5));
        cache.set_nonce_hint(&a, 9);
        assert_eq!(cache.get_nonce_hint(&a), Some(9));
    }

    #[test]
    fn processing_lock_is_exclusive() {
        let cache = MockGatewayCache::new();
        let a = addr(2);
        assert!(cache.try_acquire_processing_lock(&a));
        assert!(!cache.try_acquire_processing_lock(&a));
        assert!(!cache.release_processing_lock(&a));
        assert!(cache.try_acquire_processing_lock(&a));
    }

    #[test]
    fn release_reports_pending_rerun() {
        let cache = MockGatewayCache::new();
        let a = addr(3);
        cache.try_acquire_processing_lock(&a);
        cache.request_rerun(&a);
        assert!(cache.release_processing_lock(&a));
        // second release has nothing left to report
        cache.try_acquire_processing_lock(&a);
        assert!(!cache.release_processing_lock(&a));
    }

    #[test]
    fn submission_lock_is_per_nonce() {
        let cache = MockGatewayCache::new();
        let a = addr(4);
        assert!(cache.try_acquire_submission_lock(&a, 1));
        assert!(!cache.try_acquire_submission_lock(&a, 1));
        assert!(cache.try_acquire_submission_lock(&a, 2));
    }

    #[test]
    fn gas_price_floor_roundtrip() {
        let cache = MockGatewayCache::new();
        assert!(cache.get_gas_price_floor().is_none());
        cache.set_gas_price_floor(WeiAmount::from(20_u64), WeiAmount::from(10_u64));
        assert_eq!(
            cache.get_gas_price_floor(),
            Some((WeiAmount::from(20_u64), WeiAmount::from(10_u64)))
        );
    }
}
