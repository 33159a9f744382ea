//! Queue Processor: the per-address serial engine that advances a sender's
//! pending transactions through the state machine, enforcing nonce order
//! and balance feasibility.
//!
//! Invoked from three places: Intake, after admitting a signed transaction;
//! the Block Monitor, after confirming a transaction that may unblock a
//! downstream sender; and the Housekeeper, periodically. Mutual exclusion
//! across the fleet is cache-backed, not an in-process lock — see
//! [`crate::ports::Cache`].

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, Bytes};
use chain_client::ChainProvider;
use tokio::sync::OnceCell;
use tracing::{debug, instrument, warn};

use crate::envelope::{SignedEnvelope, TxFields};
use crate::error::Result;
use crate::notifier::{NotifierPort, QueuePassTrigger};
use crate::ports::{Cache, ChainStateStore, TransactionStore};
use crate::types::entities::Transaction;
use crate::types::enums::TransactionStatus;
use crate::types::primitives::{BlockNumber, EthAddress, TxHash, WeiAmount};

/// How long to wait before retrying a pass that stalled on the gas-price
/// floor, per the spec's fixed 60 s backoff.
const GAS_FLOOR_RETRY: Duration = Duration::from_secs(60);

/// Outcome of one submission attempt, used to decide whether the pass
/// continues to the next candidate or cascades.
enum SubmitOutcome {
    /// Submitted (or reconciled to a later status); safe to advance.
    Advanced,
    /// This and every later candidate in the pass must be errored.
    Failed,
}

/// Per-address serial engine. Generic over the store (held by value, must
/// be cheaply `Clone`), the cache (coordination + gas-price floor), and the
/// chain client.
pub struct QueueProcessor<S, Ca, Ch> {
    store: S,
    cache: Arc<Ca>,
    chain: Arc<Ch>,
    chain_id: u64,
    notifier: OnceCell<Arc<dyn NotifierPort>>,
    self_trigger: OnceCell<Arc<dyn QueuePassTrigger>>,
}

impl<S, Ca, Ch> QueueProcessor<S, Ca, Ch>
where
    S: TransactionStore + ChainStateStore + Clone + Send + Sync + 'static,
    Ca: Cache + Send + Sync + 'static,
    Ch: ChainProvider,
{
    /// Create a new Queue Processor. `set_notifier`/`set_self_trigger` must
    /// be called once the surrounding wiring has constructed the Notifier
    /// and a handle back to this processor, resolving the circular
    /// dependency between the two.
    pub fn new(store: S, cache: Arc<Ca>, chain: Arc<Ch>, chain_id: u64) -> Self {
        Self {
            store,
            cache,
            chain,
            chain_id,
            notifier: OnceCell::new(),
            self_trigger: OnceCell::new(),
        }
    }

    /// Wire in the Notifier. Idempotent after the first call.
    pub fn set_notifier(&self, notifier: Arc<dyn NotifierPort>) {
        let _ = self.notifier.set(notifier);
    }

    /// Wire in a handle that can re-trigger a pass for this processor after
    /// a delay (used for the gas-floor retry). Idempotent after the first
    /// call.
    pub fn set_self_trigger(&self, trigger: Arc<dyn QueuePassTrigger>) {
        let _ = self.self_trigger.set(trigger);
    }

    fn notifier(&self) -> Option<&Arc<dyn NotifierPort>> {
        self.notifier.get()
    }

    /// Run passes for `address` until no rerun is pending, honoring the
    /// cache-backed per-sender mutual-exclusion protocol: if another worker
    /// already holds the processing lock, this call just records a rerun
    /// request and returns.
    #[instrument(skip(self))]
    pub async fn run(&self, address: EthAddress) {
        if !self.cache.try_acquire_processing_lock(&address) {
            self.cache.request_rerun(&address);
            return;
        }

        loop {
            if let Err(err) = self.run_pass(address).await {
                warn!(%address, %err, "queue pass failed");
            }

            if !self.cache.release_processing_lock(&address) {
                return;
            }
            // A rerun was requested while this pass ran; loop without
            // releasing and racing a fresh acquire.
            if !self.cache.try_acquire_processing_lock(&address) {
                return;
            }
        }
    }

    async fn run_pass(&self, address: EthAddress) -> Result<()> {
        let candidates = self.store.list_pending_by_sender(&address).await?;
        if candidates.is_empty() {
            return Ok(());
        }

        let chain_addr: Address = address.into();
        let chain_nonce = self.chain.get_nonce(chain_addr).await?;
        let balance = self.chain.get_balance(chain_addr).await?;

        let unconfirmed = self.store.list_unconfirmed_by_sender(&address).await?;
        let pending_cost = unconfirmed
            .iter()
            .fold(WeiAmount::ZERO, |acc, tx| acc.saturating_add(&tx.cost()));
        let taken_nonces: HashSet<u64> = unconfirmed.iter().map(|tx| tx.nonce).collect();
        let mut next_nonce = unconfirmed
            .iter()
            .map(|tx| tx.nonce)
            .max()
            .map_or(chain_nonce, |n| chain_nonce.max(n + 1));
        let mut working_balance = WeiAmount::new(balance).saturating_sub(&pending_cost);

        let Some((_standard_floor, safe_low_floor)) = self.cache.get_gas_price_floor() else {
            debug!(%address, "no cached gas price floor yet, deferring pass");
            return Ok(());
        };

        let (winners, losers) = Self::resolve_overwrites(candidates, &taken_nonces);
        for loser in losers {
            self.fail(loser, "lost an overwrite resolution").await?;
        }

        let mut cascade_failed = false;

        for candidate in winners {
            if cascade_failed {
                self.fail(candidate, "prior candidate in this pass failed").await?;
                continue;
            }

            if candidate.nonce != next_nonce {
                if candidate.status == TransactionStatus::Queued {
                    cascade_failed = true;
                    self.fail(candidate, "sequence broken ahead of a queued row").await?;
                } else {
                    debug!(%address, nonce = candidate.nonce, next_nonce, "gap in sequence, pausing pass");
                    break;
                }
                continue;
            }

            if candidate.gas_price < safe_low_floor {
                if candidate.status == TransactionStatus::New {
                    self.queue(candidate).await?;
                }
                self.schedule_retry(address);
                break;
            }

            let cost = candidate.cost();
            if working_balance >= cost {
                match self.submit(candidate).await? {
                    SubmitOutcome::Advanced => {
                        working_balance = working_balance.saturating_sub(&cost);
                        next_nonce += 1;
                    }
                    SubmitOutcome::Failed => cascade_failed = true,
                }
                continue;
            }

            let pending_received = self.pending_received(&address).await?;
            if working_balance.saturating_add(&pending_received) < cost {
                cascade_failed = true;
                self.fail(candidate, "insufficient balance, no inbound funding can cover cost")
                    .await?;
            } else {
                if candidate.status == TransactionStatus::New {
                    self.queue(candidate).await?;
                }
                break;
            }
        }

        Ok(())
    }

    /// Group same-nonce candidates (a theoretical race the admission path
    /// is supposed to prevent, handled defensively here) and candidates
    /// whose nonce collides with an already-unconfirmed row. The higher
    /// `gas_price` wins; an unconfirmed/confirmed row always beats an
    /// incoming `new` row. Returns `(winners, losers)`, winners still
    /// ordered by ascending nonce.
    fn resolve_overwrites(
        candidates: Vec<Transaction>,
        taken_nonces: &HashSet<u64>,
    ) -> (Vec<Transaction>, Vec<Transaction>) {
        let mut by_nonce: BTreeMap<u64, Vec<Transaction>> = BTreeMap::new();
        for tx in candidates {
            by_nonce.entry(tx.nonce).or_default().push(tx);
        }

        let mut winners = Vec::new();
        let mut losers = Vec::new();
        for (nonce, mut group) in by_nonce {
            if taken_nonces.contains(&nonce) {
                losers.append(&mut group);
                continue;
            }
            if group.len() > 1 {
                group.sort_by(|a, b| b.gas_price.cmp(&a.gas_price));
                winners.push(group.remove(0));
                losers.extend(group);
            } else {
                winners.extend(group);
            }
        }
        (winners, losers)
    }

    async fn transition(
        &self,
        mut tx: Transaction,
        next: TransactionStatus,
        blocknumber: Option<BlockNumber>,
    ) -> Result<Transaction> {
        let previous = tx.status;
        self.store.update_status(tx.id, next, blocknumber).await?;
        tx.status = next;
        if blocknumber.is_some() {
            tx.blocknumber = blocknumber;
        }
        if let Some(notifier) = self.notifier() {
            if let Err(err) = notifier.notify_status_change(previous, &tx).await {
                warn!(tx_id = %tx.id, %err, "status-change notification failed");
            }
        }
        Ok(tx)
    }

    async fn fail(&self, tx: Transaction, reason: &str) -> Result<()> {
        debug!(tx_id = %tx.id, reason, "cascading to error");
        self.transition(tx, TransactionStatus::Error, None).await?;
        Ok(())
    }

    async fn queue(&self, tx: Transaction) -> Result<()> {
        self.transition(tx, TransactionStatus::Queued, None).await?;
        Ok(())
    }

    fn schedule_retry(&self, address: EthAddress) {
        let Some(trigger) = self.self_trigger.get().cloned() else {
            return;
        };
        tokio::spawn(async move {
            tokio::time::sleep(GAS_FLOOR_RETRY).await;
            trigger.trigger_pass(address);
        });
    }

    fn to_envelope(&self, tx: &Transaction) -> Option<SignedEnvelope> {
        let (v, r, s) = (tx.sig_v?, tx.sig_r?, tx.sig_s?);
        Some(SignedEnvelope {
            fields: TxFields {
                nonce: tx.nonce,
                gas_price: tx.gas_price,
                gas: tx.gas,
                to: tx.to_address,
                value: tx.value,
                data: tx.data.clone(),
            },
            chain_id: self.chain_id,
            v,
            r,
            s,
        })
    }

    async fn submit(&self, tx: Transaction) -> Result<SubmitOutcome> {
        let Some(envelope) = self.to_envelope(&tx) else {
            warn!(tx_id = %tx.id, "pending row missing signature, cascading to error");
            self.fail(tx, "missing signature").await?;
            return Ok(SubmitOutcome::Failed);
        };

        let raw = Bytes::from(envelope.encode_signed());
        match self.chain.send_raw_transaction(raw).await {
            Ok(_hash) => {
                self.transition(tx, TransactionStatus::Unconfirmed, None).await?;
                Ok(SubmitOutcome::Advanced)
            }
            Err(err) if err.is_already_known() || err.is_nonce_error() => {
                self.reconcile(tx, envelope.tx_hash()).await?;
                Ok(SubmitOutcome::Advanced)
            }
            Err(err) => {
                warn!(tx_id = %tx.id, %err, "submission rejected by node");
                self.fail(tx, "chain rejected submission").await?;
                Ok(SubmitOutcome::Failed)
            }
        }
    }

    /// Probe the chain for a hash the node claims to already know about,
    /// reconciling the row to `unconfirmed` or `confirmed` accordingly.
    async fn reconcile(&self, tx: Transaction, tx_hash: TxHash) -> Result<()> {
        let current = self.transition(tx, TransactionStatus::Unconfirmed, None).await?;
        let info = self.chain.get_transaction_by_hash(tx_hash.into()).await?;
        if let Some(block_number) = info.and_then(|i| i.block_number) {
            self.transition(current, TransactionStatus::Confirmed, Some(BlockNumber::new(block_number)))
                .await?;
        }
        Ok(())
    }

    async fn pending_received(&self, address: &EthAddress) -> Result<WeiAmount> {
        let last_block = self.store.get_last_block().await?;
        let inbound = self.store.list_inbound_pending(address, last_block).await?;
        Ok(inbound.iter().fold(WeiAmount::ZERO, |acc, tx| acc.saturating_add(&tx.value)))
    }
}

/// Cheap-clone handle to a [`QueueProcessor`], implementing
/// [`QueuePassTrigger`] so the Notifier (and the processor's own gas-floor
/// retry) can schedule a pass without depending on the processor's full
/// generic signature at the call site.
pub struct QueueProcessorHandle<S, Ca, Ch>(Arc<QueueProcessor<S, Ca, Ch>>);

impl<S, Ca, Ch> Clone for QueueProcessorHandle<S, Ca, Ch> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<S, Ca, Ch> QueueProcessorHandle<S, Ca, Ch>
where
    S: TransactionStore + ChainStateStore + Clone + Send + Sync + 'static,
    Ca: Cache + Send + Sync + 'static,
    Ch: ChainProvider,
{
    /// Wrap a processor behind a cheaply clonable handle.
    #[must_use]
    pub fn new(processor: Arc<QueueProcessor<S, Ca, Ch>>) -> Self {
        Self(processor)
    }

    /// The wrapped processor, for wiring `set_notifier`/`set_self_trigger`.
    #[must_use]
    pub fn processor(&self) -> &Arc<QueueProcessor<S, Ca, Ch>> {
        &self.0
    }
}

impl<S, Ca, Ch> QueuePassTrigger for QueueProcessorHandle<S, Ca, Ch>
where
    S: TransactionStore + ChainStateStore + Clone + Send + Sync + 'static,
    Ca: Cache + Send + Sync + 'static,
    Ch: ChainProvider,
{
    fn trigger_pass(&self, address: EthAddress) {
        let processor = Arc::clone(&self.0);
        tokio::spawn(async move {
            processor.run(address).await;
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::sync::RwLock;

    use alloy::primitives::U256;
    use chrono::Utc;
    use uuid::Uuid;

    use super::{Cache, QueueProcessor};
    use crate::error::Result;
    use crate::ports::{ChainStateStore, MockGatewayCache, TransactionStore};
    use crate::types::entities::Transaction;
    use crate::types::enums::TransactionStatus;
    use crate::types::primitives::{BlockNumber, EthAddress, TxHash, WeiAmount};
    use chain_client::mock::MockProvider;

    /// In-memory double covering just the store calls a queue pass makes.
    /// Transactions are seeded directly rather than through `insert`, since
    /// these tests care about the pass algorithm, not admission.
    #[derive(Clone, Default)]
    struct MockStore {
        inner: std::sync::Arc<RwLock<Inner>>,
    }

    struct Inner {
        transactions: HashMap<Uuid, Transaction>,
        last_block: BlockNumber,
    }

    impl Default for Inner {
        fn default() -> Self {
            Self { transactions: HashMap::new(), last_block: BlockNumber::new(0) }
        }
    }

    impl MockStore {
        fn seed(&self, tx: Transaction) {
            self.inner.write().unwrap().transactions.insert(tx.id, tx);
        }

        fn get(&self, id: Uuid) -> Transaction {
            self.inner.read().unwrap().transactions.get(&id).unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl TransactionStore for MockStore {
        async fn insert(&self, tx: &Transaction) -> Result<()> {
            self.seed(tx.clone());
            Ok(())
        }

        async fn find_by_sender_nonce(
            &self,
            from_address: &EthAddress,
            nonce: u64,
        ) -> Result<Option<Transaction>> {
            Ok(self
                .inner
                .read()
                .unwrap()
                .transactions
                .values()
                .find(|tx| tx.from_address == *from_address && tx.nonce == nonce && tx.status != TransactionStatus::Error)
                .cloned())
        }

        async fn find_by_hash(&self, hash: &TxHash) -> Result<Option<Transaction>> {
            Ok(self.inner.read().unwrap().transactions.values().find(|tx| tx.hash == Some(*hash)).cloned())
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Option<Transaction>> {
            Ok(self.inner.read().unwrap().transactions.get(&id).cloned())
        }

        async fn update_status(
            &self,
            id: Uuid,
            next: TransactionStatus,
            blocknumber: Option<BlockNumber>,
        ) -> Result<()> {
            let mut inner = self.inner.write().unwrap();
            let tx = inner.transactions.get_mut(&id).unwrap();
            tx.status = next;
            if blocknumber.is_some() {
                tx.blocknumber = blocknumber;
            }
            Ok(())
        }

        async fn list_pending_by_sender(&self, from_address: &EthAddress) -> Result<Vec<Transaction>> {
            let mut rows: Vec<Transaction> = self
                .inner
                .read()
                .unwrap()
                .transactions
                .values()
                .filter(|tx| tx.from_address == *from_address && tx.is_pending())
                .cloned()
                .collect();
            rows.sort_by_key(|tx| tx.nonce);
            Ok(rows)
        }

        async fn list_unconfirmed_by_sender(&self, from_address: &EthAddress) -> Result<Vec<Transaction>> {
            Ok(self
                .inner
                .read()
                .unwrap()
                .transactions
                .values()
                .filter(|tx| tx.from_address == *from_address && tx.status == TransactionStatus::Unconfirmed)
                .cloned()
                .collect())
        }

        async fn list_inbound_pending(
            &self,
            to_address: &EthAddress,
            since_block: BlockNumber,
        ) -> Result<Vec<Transaction>> {
            Ok(self
                .inner
                .read()
                .unwrap()
                .transactions
                .values()
                .filter(|tx| {
                    tx.to_address == Some(*to_address)
                        && (tx.status.is_pending()
                            || tx.status == TransactionStatus::Unconfirmed
                            || (tx.status == TransactionStatus::Confirmed
                                && tx.blocknumber.is_some_and(|b| b > since_block)))
                })
                .cloned()
                .collect())
        }

        async fn list_stale_senders(&self, _max_age_secs: i64) -> Result<Vec<EthAddress>> {
            Ok(Vec::new())
        }
    }

    #[async_trait::async_trait]
    impl ChainStateStore for MockStore {
        async fn get_last_block(&self) -> Result<BlockNumber> {
            Ok(self.inner.read().unwrap().last_block)
        }

        async fn set_last_block(&self, block: BlockNumber, _hash: alloy::primitives::B256) -> Result<()> {
            self.inner.write().unwrap().last_block = block;
            Ok(())
        }

        async fn insert_block_hash(
            &self,
            _block: BlockNumber,
            _hash: alloy::primitives::B256,
            _parent: alloy::primitives::B256,
            _timestamp: u64,
        ) -> Result<()> {
            Ok(())
        }

        async fn get_block_hash(&self, _block: BlockNumber) -> Result<Option<alloy::primitives::B256>> {
            Ok(None)
        }

        async fn execute_reorg_rollback(&self, _fork_point: BlockNumber) -> Result<()> {
            Ok(())
        }

        async fn prune_old_blocks(&self, _keep_blocks: u64) -> Result<u64> {
            Ok(0)
        }
    }

    fn addr(byte: u8) -> EthAddress {
        EthAddress::new([byte; 20])
    }

    #[allow(clippy::too_many_arguments)]
    fn make_tx(
        from: EthAddress,
        nonce: u64,
        gas_price: u64,
        value: u64,
        status: TransactionStatus,
        signed: bool,
    ) -> Transaction {
        let now = Utc::now();
        Transaction {
            id: Uuid::new_v4(),
            hash: None,
            from_address: from,
            to_address: Some(addr(0xAA)),
            nonce,
            value: WeiAmount::new(U256::from(value)),
            gas: 21_000,
            gas_price: WeiAmount::new(U256::from(gas_price)),
            data: Vec::new(),
            sig_v: signed.then_some(27),
            sig_r: signed.then_some([1u8; 32]),
            sig_s: signed.then_some([2u8; 32]),
            status,
            blocknumber: None,
            sender_token_id: None,
            created: now,
            updated: now,
        }
    }

    fn processor(
        store: MockStore,
        cache: std::sync::Arc<MockGatewayCache>,
        chain: std::sync::Arc<MockProvider>,
    ) -> QueueProcessor<MockStore, MockGatewayCache, MockProvider> {
        QueueProcessor::new(store, cache, chain, 1)
    }

    fn ready_cache() -> std::sync::Arc<MockGatewayCache> {
        let cache = std::sync::Arc::new(MockGatewayCache::default());
        cache.set_gas_price_floor(WeiAmount::new(U256::from(1u64)), WeiAmount::new(U256::from(1u64)));
        cache
    }

    #[tokio::test]
    async fn pass_submits_candidates_in_nonce_order() {
        let sender = addr(0x01);
        let store = MockStore::default();
        let tx0 = make_tx(sender, 0, 5, 0, TransactionStatus::New, true);
        let tx1 = make_tx(sender, 1, 5, 0, TransactionStatus::New, true);
        let (id0, id1) = (tx0.id, tx1.id);
        store.seed(tx0);
        store.seed(tx1);

        let chain = std::sync::Arc::new(MockProvider::new());
        chain.set_balance(sender.into(), U256::from(1_000_000_000_000u64));
        let proc = processor(store.clone(), ready_cache(), chain);

        proc.run_pass(sender).await.unwrap();

        assert_eq!(store.get(id0).status, TransactionStatus::Unconfirmed);
        assert_eq!(store.get(id1).status, TransactionStatus::Unconfirmed);
    }

    #[tokio::test]
    async fn overwrite_resolution_keeps_the_higher_gas_price() {
        let sender = addr(0x02);
        let store = MockStore::default();
        let low = make_tx(sender, 0, 5, 0, TransactionStatus::New, true);
        let high = make_tx(sender, 0, 50, 0, TransactionStatus::New, true);
        let (low_id, high_id) = (low.id, high.id);
        store.seed(low);
        store.seed(high);

        let chain = std::sync::Arc::new(MockProvider::new());
        chain.set_balance(sender.into(), U256::from(1_000_000_000_000u64));
        let proc = processor(store.clone(), ready_cache(), chain);

        proc.run_pass(sender).await.unwrap();

        assert_eq!(store.get(high_id).status, TransactionStatus::Unconfirmed);
        assert_eq!(store.get(low_id).status, TransactionStatus::Error);
    }

    #[tokio::test]
    async fn pass_defers_when_gas_price_is_below_the_cached_floor() {
        let sender = addr(0x03);
        let store = MockStore::default();
        let tx = make_tx(sender, 0, 1, 0, TransactionStatus::New, true);
        let id = tx.id;
        store.seed(tx);

        let chain = std::sync::Arc::new(MockProvider::new());
        chain.set_balance(sender.into(), U256::from(1_000_000_000_000u64));
        let cache = std::sync::Arc::new(MockGatewayCache::default());
        cache.set_gas_price_floor(WeiAmount::new(U256::from(100u64)), WeiAmount::new(U256::from(100u64)));
        let proc = processor(store.clone(), cache, chain);

        proc.run_pass(sender).await.unwrap();

        assert_eq!(store.get(id).status, TransactionStatus::Queued);
    }

    #[tokio::test]
    async fn missing_signature_fails_and_cascades_to_later_candidates() {
        let sender = addr(0x04);
        let store = MockStore::default();
        let unsigned = make_tx(sender, 0, 5, 0, TransactionStatus::Queued, false);
        let after = make_tx(sender, 1, 5, 0, TransactionStatus::New, true);
        let (unsigned_id, after_id) = (unsigned.id, after.id);
        store.seed(unsigned);
        store.seed(after);

        let chain = std::sync::Arc::new(MockProvider::new());
        chain.set_balance(sender.into(), U256::from(1_000_000_000_000u64));
        let proc = processor(store.clone(), ready_cache(), chain);

        proc.run_pass(sender).await.unwrap();

        assert_eq!(store.get(unsigned_id).status, TransactionStatus::Error);
        assert_eq!(store.get(after_id).status, TransactionStatus::Error);
    }

    #[tokio::test]
    async fn insufficient_balance_fails_without_inbound_funding() {
        let sender = addr(0x05);
        let store = MockStore::default();
        let tx = make_tx(sender, 0, 5, 1_000_000, TransactionStatus::New, true);
        let id = tx.id;
        store.seed(tx);

        let chain = std::sync::Arc::new(MockProvider::new());
        chain.set_balance(sender.into(), U256::ZERO);
        let proc = processor(store.clone(), ready_cache(), chain);

        proc.run_pass(sender).await.unwrap();

        assert_eq!(store.get(id).status, TransactionStatus::Error);
    }

    #[tokio::test]
    async fn insufficient_balance_queues_when_inbound_funding_can_cover_it() {
        let sender = addr(0x06);
        let store = MockStore::default();
        let tx = make_tx(sender, 0, 5, 1_000_000, TransactionStatus::New, true);
        let id = tx.id;
        store.seed(tx);
        // An inbound transfer large enough to cover the shortfall once it
        // lands, still `unconfirmed` so it counts toward `pending_received`.
        let mut inbound = make_tx(addr(0x99), 0, 5, 2_000_000, TransactionStatus::Unconfirmed, true);
        inbound.to_address = Some(sender);
        store.seed(inbound);

        let chain = std::sync::Arc::new(MockProvider::new());
        chain.set_balance(sender.into(), U256::ZERO);
        let proc = processor(store.clone(), ready_cache(), chain);

        proc.run_pass(sender).await.unwrap();

        assert_eq!(store.get(id).status, TransactionStatus::Queued);
    }

    #[test]
    fn resolve_overwrites_lets_an_unconfirmed_nonce_beat_every_new_candidate() {
        let sender = addr(0x07);
        let incoming = make_tx(sender, 3, 5, 0, TransactionStatus::New, true);
        let candidates = vec![incoming.clone()];
        let mut taken = std::collections::HashSet::new();
        taken.insert(3u64);

        let (winners, losers) = QueueProcessor::<MockStore, MockGatewayCache, MockProvider>::resolve_overwrites(
            candidates, &taken,
        );

        assert!(winners.is_empty());
        assert_eq!(losers, vec![incoming]);
    }
}
