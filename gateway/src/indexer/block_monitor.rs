//! Block Monitor: the component that drives a tick using [`CheckpointManager`],
//! [`ReorgHandler`], a [`ChainProvider`], and the domain stores.
//!
//! Each call to [`BlockMonitor::tick`] advances `last_block` by at most
//! `max_blocks_per_tick` blocks, fetching each block plus its Transfer /
//! Deposit / Withdrawal logs, reconciling pending transactions, and folding
//! token-transfer events into the State Store. A tick that hits an RPC error
//! partway through aborts without advancing the checkpoint; the next tick
//! retries from the same point, and idempotent upserts make the retry safe.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::B256;
use chain_client::{ChainProvider, LogFilter};
use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn};

use super::checkpoint::CheckpointManager;
use super::reorg_handler::{ReorgCheckResult, ReorgHandler};
use crate::error::{InfraError, Result};
use crate::notifier::NotifierPort;
use crate::types::entities::{TokenBalance, Transaction};
use crate::types::enums::{TokenTransferStatus, TransactionStatus};
use crate::types::events::{
    TokenLog, decode_deposit, decode_transfer, decode_withdrawal, deposit_topic, transfer_topic,
    withdrawal_topic,
};
use crate::types::primitives::{BlockNumber, EthAddress, WeiAmount};
use crate::{
    ports::{ChainStateStore, TokenBalanceStore, TokenTransferStore, TransactionStore},
    types::entities::TokenTransfer,
};

fn block_timestamp(unix_secs: u64) -> DateTime<Utc> {
    DateTime::from_timestamp(unix_secs.try_into().unwrap_or(i64::MAX), 0).unwrap_or_else(Utc::now)
}

/// Summary of a single tick, returned for logging/metrics at the call site.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    /// Blocks fetched and fully committed this tick.
    pub blocks_processed: u64,
    /// Transactions reconciled to `confirmed`.
    pub transactions_confirmed: u64,
    /// Token-transfer rows upserted.
    pub transfers_recorded: u64,
    /// Reorgs detected and rolled back this tick.
    pub reorgs_handled: u64,
}

/// Polls the chain for new blocks and folds their effects into the State Store.
pub struct BlockMonitor<S, Ch> {
    store: S,
    chain: Arc<Ch>,
    checkpoint: CheckpointManager<S>,
    reorg: ReorgHandler<S>,
    notifier: Arc<dyn NotifierPort>,
    confirmations_required: u64,
    max_blocks_per_tick: u64,
    weth_address: Option<EthAddress>,
}

impl<S, Ch> BlockMonitor<S, Ch>
where
    S: TransactionStore + TokenTransferStore + TokenBalanceStore + ChainStateStore + Clone,
    Ch: ChainProvider,
{
    /// Create a new Block Monitor.
    pub fn new(
        store: S,
        chain: Arc<Ch>,
        notifier: Arc<dyn NotifierPort>,
        confirmations_required: u64,
        max_blocks_per_tick: u64,
        weth_address: Option<EthAddress>,
    ) -> Self {
        Self {
            checkpoint: CheckpointManager::new(store.clone()),
            reorg: ReorgHandler::new(store.clone()),
            store,
            chain,
            notifier,
            confirmations_required,
            max_blocks_per_tick,
            weth_address,
        }
    }

    /// Run one tick: fetch and process every block in
    /// `(last_block, target]`, where `target` is bounded both by
    /// `confirmations_required` and `max_blocks_per_tick`.
    ///
    /// Aborts without advancing the checkpoint if any step fails, so the
    /// next tick retries the same range.
    ///
    /// # Errors
    /// Returns an error if any RPC call or store operation fails.
    #[instrument(skip(self))]
    pub async fn tick(&self) -> Result<TickStats> {
        let mut stats = TickStats::default();

        let latest = self.chain.get_block_number().await?;
        let confirmed_tip = latest.saturating_sub(self.confirmations_required.saturating_sub(1));

        let checkpoint = self.checkpoint.load().await?;
        let start = checkpoint.last_block.next().value();
        if start > confirmed_tip {
            debug!(start, confirmed_tip, "nothing new to process");
            return Ok(stats);
        }

        let end = confirmed_tip.min(start + self.max_blocks_per_tick - 1);

        for number in start..=end {
            let block = self
                .chain
                .get_block_by_number(number)
                .await?
                .ok_or(InfraError::NotFound)?;

            if let ReorgCheckResult::ReorgDetected { fork_point, depth } =
                self.reorg.check_for_reorg(BlockNumber::new(number), block.parent_hash).await?
            {
                warn!(number, depth, fork = %fork_point.value(), "reorg detected, rolling back");
                self.reorg.execute_rollback(fork_point).await?;
                self.checkpoint.reset_to(fork_point, B256::ZERO).await?;
                stats.reorgs_handled += 1;
                return Ok(stats);
            }

            let block_stats = self.process_block(number, &block).await?;
            stats.transactions_confirmed += block_stats.transactions_confirmed;
            stats.transfers_recorded += block_stats.transfers_recorded;

            self.reorg
                .record_block(BlockNumber::new(number), block.hash, block.parent_hash, block.timestamp)
                .await?;
            self.checkpoint.update(BlockNumber::new(number), block.hash).await?;
            stats.blocks_processed += 1;
        }

        Ok(stats)
    }

    async fn process_block(
        &self,
        number: u64,
        block: &chain_client::Block,
    ) -> Result<TickStats> {
        let mut stats = TickStats::default();
        let timestamp = block_timestamp(block.timestamp);

        for tx_hash in &block.transactions {
            let hash = crate::types::primitives::TxHash::from(*tx_hash);
            let Some(row) = self.store.find_by_hash(&hash).await? else {
                continue;
            };
            if !matches!(
                row.status,
                TransactionStatus::New | TransactionStatus::Queued | TransactionStatus::Unconfirmed
            ) {
                continue;
            }
            let previous = row.status;
            self.store
                .update_status(row.id, TransactionStatus::Confirmed, Some(BlockNumber::new(number)))
                .await?;
            let mut confirmed = row;
            confirmed.status = TransactionStatus::Confirmed;
            confirmed.blocknumber = Some(BlockNumber::new(number));
            if let Err(err) = self.notifier.notify_status_change(previous, &confirmed).await {
                warn!(tx_id = %confirmed.id, error = %err, "confirmation notification failed");
            }
            stats.transactions_confirmed += 1;
        }

        let logs = self.fetch_token_logs(number).await?;
        for log in logs {
            self.apply_token_log(&log, number, timestamp).await?;
            stats.transfers_recorded += 1;
        }

        Ok(stats)
    }

    async fn fetch_token_logs(&self, number: u64) -> Result<Vec<TokenLog>> {
        let mut decoded = Vec::new();
        for (topic, decode) in [
            (transfer_topic(), decode_transfer as fn(&_, u64, DateTime<Utc>) -> Result<TokenLog>),
            (deposit_topic(), decode_deposit),
            (withdrawal_topic(), decode_withdrawal),
        ] {
            let filter = LogFilter::new(number, number).with_topic(0, topic);
            let raw_logs = self.chain.get_logs(&filter).await?;
            let timestamp = Utc::now();
            for log in &raw_logs {
                match decode(log, number, timestamp) {
                    Ok(token_log) => decoded.push(token_log),
                    Err(err) => warn!(%err, block = number, "skipping undecodable log"),
                }
            }
        }
        Ok(decoded)
    }

    async fn apply_token_log(
        &self,
        log: &TokenLog,
        number: u64,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        let _ = timestamp;
        let meta = log.metadata();
        let tx_hash = crate::types::primitives::TxHash::from(meta.tx_hash);

        let (from, to, value, contract) = match log {
            TokenLog::Transfer(t) => (t.from, t.to, t.value, t.meta.contract),
            TokenLog::Deposit(d) => (d.dst, d.dst, d.wad, d.meta.contract),
            TokenLog::Withdrawal(w) => (w.src, w.src, w.wad, w.meta.contract),
        };

        let parent = match self.store.find_by_hash(&tx_hash).await? {
            Some(row) => row,
            None => self.synthesize_parent(tx_hash, number).await?,
        };

        let from_address = EthAddress::from(from);
        let to_address = EthAddress::from(to);
        let contract_address = EthAddress::from(contract);
        let value = WeiAmount::new(value);

        let transfer = TokenTransfer {
            id: uuid::Uuid::new_v4(),
            transaction_id: parent.id,
            transaction_log_index: u32::try_from(meta.log_index).unwrap_or(u32::MAX),
            contract_address,
            from_address,
            to_address,
            value,
            status: TokenTransferStatus::from_confirmation(true),
        };
        TokenTransferStore::upsert(&self.store, &transfer).await?;

        self.recompute_balance(&from_address, &contract_address, number).await?;
        self.recompute_balance(&to_address, &contract_address, number).await?;

        if let Err(err) = self
            .notifier
            .notify_token_transfer(&transfer, parent.status, tx_hash)
            .await
        {
            warn!(%err, "token transfer notification failed");
        }

        let is_weth = self.weth_address.is_some_and(|w| w == contract_address);
        if log.implies_ether_transfer() && is_weth {
            if let Err(err) = self
                .notifier
                .notify_ether_leg(from_address, value, parent.status, tx_hash)
                .await
            {
                warn!(%err, "ether-leg notification failed");
            }
        }

        Ok(())
    }

    /// Build and insert a placeholder transaction row for a token transfer
    /// whose originating transaction we never saw, so the transfer has
    /// something to hang off of. Pulled straight from the chain rather than
    /// guessed, since we need its real nonce to respect the store's
    /// `(from_address, nonce)` uniqueness invariant.
    async fn synthesize_parent(
        &self,
        tx_hash: crate::types::primitives::TxHash,
        number: u64,
    ) -> Result<Transaction> {
        let info = self
            .chain
            .get_transaction_by_hash(B256::from(tx_hash))
            .await?
            .ok_or(InfraError::NotFound)?;

        let row = Transaction {
            id: uuid::Uuid::new_v4(),
            hash: Some(tx_hash),
            from_address: EthAddress::from(info.from),
            to_address: info.to.map(EthAddress::from),
            nonce: info.nonce,
            value: WeiAmount::new(info.value),
            gas: info.gas_limit,
            gas_price: WeiAmount::from(info.gas_price.unwrap_or_default()),
            data: info.data.to_vec(),
            sig_v: None,
            sig_r: None,
            sig_s: None,
            status: TransactionStatus::Confirmed,
            blocknumber: Some(BlockNumber::new(number)),
            sender_token_id: None,
            created: Utc::now(),
            updated: Utc::now(),
        };
        self.store.insert(&row).await?;
        Ok(row)
    }

    async fn recompute_balance(
        &self,
        address: &EthAddress,
        contract: &EthAddress,
        number: u64,
    ) -> Result<()> {
        if self.store.get(address, contract).await?.is_none() {
            return Ok(());
        }
        let balance = self.chain.get_token_balance((*contract).into(), (*address).into()).await?;
        TokenBalanceStore::upsert(
            &self.store,
            &TokenBalance {
                eth_address: *address,
                contract_address: *contract,
                balance: WeiAmount::new(balance),
                last_block: BlockNumber::new(number),
                updated_at: Utc::now(),
            },
        )
        .await?;
        Ok(())
    }

    /// Run [`Self::tick`] on a loop, sleeping `interval` between ticks
    /// regardless of whether the previous one advanced the checkpoint —
    /// unlike the Housekeeper's loops, a tick that finds nothing new is the
    /// common case, not a failure to back off from.
    pub async fn run_loop(self: Arc<Self>, interval: Duration) {
        loop {
            match self.tick().await {
                Ok(stats) if stats.blocks_processed > 0 => {
                    debug!(
                        blocks = stats.blocks_processed,
                        confirmed = stats.transactions_confirmed,
                        transfers = stats.transfers_recorded,
                        reorgs = stats.reorgs_handled,
                        "block monitor tick complete"
                    );
                }
                Ok(_) => {}
                Err(err) => warn!(%err, "block monitor tick failed"),
            }
            tokio::time::sleep(interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    // Exercised in integration tests against `chain_client::mock::MockProvider`
    // and the Postgres store behind `#[sqlx::test]`; a meaningful unit test
    // here would just be a restatement of `mock::MockProvider`'s own fixture
    // data, so coverage lives there instead.
}
