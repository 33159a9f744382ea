//! Housekeeper: two independent background tasks that catch what the
//! event-driven paths (Intake, Block Monitor, Notifier) miss.
//!
//! **Sanity sweep** finds senders with a transaction that's been sitting in
//! `new`/`queued`/`unconfirmed` too long, probes the chain for each
//! unconfirmed hash, and nudges the Queue Processor for senders that aren't
//! waiting on inbound funding. **Gas-price refresh** polls the external
//! oracle and republishes the `(standard, safe_low)` floor the Queue
//! Processor reads out of the [`Cache`].
//!
//! Both tasks self-requeue on their own cadence (`tokio::time::sleep` after
//! each run) rather than sharing a ticker, so a slow oracle poll can never
//! delay the sanity sweep or vice versa.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Bytes;
use chain_client::ChainProvider;
use tracing::{instrument, warn};

use crate::envelope::{SignedEnvelope, TxFields};
use crate::error::Result;
use crate::notifier::QueuePassTrigger;
use crate::ports::{Cache, ChainStateStore, GasOracle, TransactionStore};
use crate::types::enums::TransactionStatus;
use crate::types::primitives::{BlockNumber, EthAddress};

/// Summary of one sanity sweep, returned for logging at the call site.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Stale senders examined this sweep.
    pub senders_examined: u64,
    /// Unconfirmed transactions rebroadcast because the node no longer knew
    /// about them.
    pub rebroadcast: u64,
    /// Unconfirmed transactions reconciled to `confirmed`.
    pub reconciled: u64,
    /// Queue Processor passes triggered.
    pub passes_triggered: u64,
}

/// Periodic catch-up work the event-driven paths don't cover.
pub struct Housekeeper<S, Ca, Ch, G> {
    store: S,
    cache: Arc<Ca>,
    chain: Arc<Ch>,
    gas_oracle: Arc<G>,
    queue_trigger: Arc<dyn QueuePassTrigger>,
    chain_id: u64,
    stale_sender_max_age_secs: i64,
}

impl<S, Ca, Ch, G> Housekeeper<S, Ca, Ch, G>
where
    S: TransactionStore + ChainStateStore + Clone + Send + Sync + 'static,
    Ca: Cache + Send + Sync + 'static,
    Ch: ChainProvider,
    G: GasOracle,
{
    /// Create a new Housekeeper.
    pub fn new(
        store: S,
        cache: Arc<Ca>,
        chain: Arc<Ch>,
        gas_oracle: Arc<G>,
        queue_trigger: Arc<dyn QueuePassTrigger>,
        chain_id: u64,
        stale_sender_max_age_secs: i64,
    ) -> Self {
        Self { store, cache, chain, gas_oracle, queue_trigger, chain_id, stale_sender_max_age_secs }
    }

    /// Run the sanity sweep once.
    ///
    /// # Errors
    /// Returns an error if listing stale senders fails. Failures probing or
    /// reconciling an individual sender are logged and skipped rather than
    /// aborting the whole sweep.
    #[instrument(skip(self))]
    pub async fn sanity_sweep(&self) -> Result<SweepStats> {
        let mut stats = SweepStats::default();
        let senders = self.store.list_stale_senders(self.stale_sender_max_age_secs).await?;

        for sender in senders {
            stats.senders_examined += 1;
            if let Err(err) = self.sweep_sender(sender, &mut stats).await {
                warn!(%sender, %err, "sanity sweep failed for sender");
            }
        }

        Ok(stats)
    }

    async fn sweep_sender(&self, sender: EthAddress, stats: &mut SweepStats) -> Result<()> {
        let unconfirmed = self.store.list_unconfirmed_by_sender(&sender).await?;
        for tx in unconfirmed {
            let Some(hash) = tx.hash else { continue };
            let info = self.chain.get_transaction_by_hash(hash.into()).await?;
            match info {
                None => {
                    let Some(envelope) = self.to_envelope(&tx) else {
                        warn!(tx_id = %tx.id, "unconfirmed row missing signature, cannot rebroadcast");
                        continue;
                    };
                    if envelope.tx_hash() != hash {
                        warn!(tx_id = %tx.id, "re-encoded hash no longer matches stored hash, skipping");
                        continue;
                    }
                    let raw = Bytes::from(envelope.encode_signed());
                    match self.chain.send_raw_transaction(raw).await {
                        Ok(_) => stats.rebroadcast += 1,
                        Err(err) => warn!(tx_id = %tx.id, %err, "rebroadcast rejected by node"),
                    }
                }
                Some(info) if info.block_number.is_some() => {
                    #[allow(clippy::unwrap_used)]
                    let block_number = info.block_number.unwrap();
                    self.store
                        .update_status(
                            tx.id,
                            TransactionStatus::Confirmed,
                            Some(BlockNumber::new(block_number)),
                        )
                        .await?;
                    stats.reconciled += 1;
                }
                Some(_) => {
                    // Still pending in the node's mempool; nothing to do.
                }
            }
        }

        let last_block = self.store.get_last_block().await?;
        let inbound = self.store.list_inbound_pending(&sender, last_block).await?;
        if inbound.is_empty() {
            self.queue_trigger.trigger_pass(sender);
            stats.passes_triggered += 1;
        }

        Ok(())
    }

    fn to_envelope(&self, tx: &crate::types::entities::Transaction) -> Option<SignedEnvelope> {
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

    /// Fetch the current reading from the gas-price oracle and republish it
    /// to the [`Cache`].
    ///
    /// # Errors
    /// Returns an error if the oracle call fails.
    #[instrument(skip(self))]
    pub async fn refresh_gas_price(&self) -> Result<()> {
        let reading = self.gas_oracle.fetch().await?;
        self.cache.set_gas_price_floor(reading.average, reading.safe_low);
        Ok(())
    }

    /// Run the sanity sweep on a loop, self-requeuing `interval` after each
    /// run completes (not a fixed-cadence ticker, so a slow sweep pushes the
    /// next one back rather than overlapping it).
    pub async fn run_sanity_sweep_loop(self: Arc<Self>, interval: Duration) {
        loop {
            match self.sanity_sweep().await {
                Ok(stats) => {
                    tracing::debug!(
                        senders = stats.senders_examined,
                        rebroadcast = stats.rebroadcast,
                        reconciled = stats.reconciled,
                        passes = stats.passes_triggered,
                        "sanity sweep complete"
                    );
                }
                Err(err) => warn!(%err, "sanity sweep failed"),
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// Run the gas-price refresh on a loop, self-requeuing `interval` after
    /// each run completes.
    pub async fn run_gas_refresh_loop(self: Arc<Self>, interval: Duration) {
        loop {
            if let Err(err) = self.refresh_gas_price().await {
                warn!(%err, "gas price refresh failed");
            }
            tokio::time::sleep(interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    // Exercised via integration tests against `chain_client::mock::MockProvider`,
    // `MockGatewayCache`, and a scripted `TransactionStore` fake — the
    // rebroadcast/reconcile branching is easiest to assert end-to-end, the
    // same pattern `queue::tests` and `indexer::block_monitor::tests` use.
}
