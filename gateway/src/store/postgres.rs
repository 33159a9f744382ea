//! PostgreSQL implementation of store ports using SQLx.
//!
//! # Type Conversions
//!
//! PostgreSQL uses signed integers (i16, i32, i64) and `NUMERIC` for
//! values our domain represents as unsigned/256-bit. These casts are
//! handled explicitly via `BigDecimal` round-trips for `U256`-backed
//! amounts and direct `as i64` for block numbers and nonces, which won't
//! exceed `i64::MAX` in practice.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless
)]

use alloy::primitives::B256;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use sqlx::{FromRow, postgres::PgPool};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::{AppError, InfraError, Result};
use crate::ports::{
    ChainStateStore, SubscriptionStore, TokenBalanceStore, TokenTransferStore, TransactionStore,
};
use crate::types::entities::{Subscription, TokenBalance, TokenTransfer, Transaction};
use crate::types::enums::{TokenTransferStatus, Transport, TransactionStatus};
use crate::types::primitives::{BlockNumber, EthAddress, TxHash, WeiAmount};

fn decode_error(msg: impl Into<String>) -> AppError {
    InfraError::Database(sqlx::Error::Decode(msg.into().into())).into()
}

fn address_from_bytes(bytes: Vec<u8>, field: &str) -> Result<EthAddress> {
    EthAddress::from_slice(&bytes).map_err(|e| decode_error(format!("{field}: {e}")))
}

fn hash32_from_bytes(bytes: Vec<u8>, field: &str) -> Result<[u8; 32]> {
    bytes
        .try_into()
        .map_err(|_| decode_error(format!("{field}: expected 32 bytes")))
}

fn wei_from_numeric(value: &BigDecimal) -> Result<WeiAmount> {
    // NUMERIC(78,0) columns are always integral; the plain decimal string
    // `WeiAmount::parse` already knows how to read.
    WeiAmount::parse(&value.to_plain_string())
        .map_err(|e| decode_error(format!("wei amount: {e}")))
}

fn numeric_from_wei(amount: WeiAmount) -> BigDecimal {
    // `U256` has no direct `BigDecimal` conversion in scope; its decimal
    // `Display` impl does, and `BigDecimal` parses that losslessly.
    amount
        .as_u256()
        .to_string()
        .parse()
        .expect("U256 decimal string is always valid BigDecimal input")
}

// ═══════════════════════════════════════════════════════════════════════════════
// POSTGRES STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// PostgreSQL-based store implementation.
///
/// Implements all store port traits using SQLx for database access.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run pending migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if migrations fail.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| decode_error(format!("migration error: {e}")))?;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSACTION STORE IMPLEMENTATION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, FromRow)]
struct TransactionRow {
    id: Uuid,
    hash: Option<Vec<u8>>,
    from_address: Vec<u8>,
    to_address: Option<Vec<u8>>,
    nonce: i64,
    value: BigDecimal,
    gas: i64,
    gas_price: BigDecimal,
    data: Vec<u8>,
    sig_v: Option<i64>,
    sig_r: Option<Vec<u8>>,
    sig_s: Option<Vec<u8>>,
    status: i16,
    blocknumber: Option<i64>,
    sender_token_id: Option<String>,
    created: chrono::DateTime<chrono::Utc>,
    updated: chrono::DateTime<chrono::Utc>,
}

impl TransactionRow {
    fn into_transaction(self) -> Result<Transaction> {
        Ok(Transaction {
            id: self.id,
            hash: self
                .hash
                .map(|b| hash32_from_bytes(b, "hash").map(TxHash::new))
                .transpose()?,
            from_address: address_from_bytes(self.from_address, "from_address")?,
            to_address: self
                .to_address
                .map(|b| address_from_bytes(b, "to_address"))
                .transpose()?,
            nonce: self.nonce as u64,
            value: wei_from_numeric(&self.value)?,
            gas: self.gas as u64,
            gas_price: wei_from_numeric(&self.gas_price)?,
            data: self.data,
            sig_v: self.sig_v.map(|v| v as u64),
            sig_r: self.sig_r.map(|b| hash32_from_bytes(b, "sig_r")).transpose()?,
            sig_s: self.sig_s.map(|b| hash32_from_bytes(b, "sig_s")).transpose()?,
            status: TransactionStatus::try_from(self.status as u8)
                .map_err(|e| decode_error(format!("status: {e}")))?,
            blocknumber: self.blocknumber.map(|b| BlockNumber::new(b as u64)),
            sender_token_id: self.sender_token_id,
            created: self.created,
            updated: self.updated,
        })
    }
}

const TRANSACTION_COLUMNS: &str = r"
    id, hash, from_address, to_address, nonce, value, gas, gas_price, data,
    sig_v, sig_r, sig_s, status, blocknumber, sender_token_id, created, updated
";

#[async_trait]
impl TransactionStore for PostgresStore {
    #[instrument(skip(self, tx), fields(from = %tx.from_address, nonce = tx.nonce))]
    async fn insert(&self, tx: &Transaction) -> Result<()> {
        let existing = self.find_by_sender_nonce(&tx.from_address, tx.nonce).await?;
        if existing.is_some() {
            return Err(decode_error("non-error row already exists at (from_address, nonce)"));
        }

        sqlx::query(
            r"
            INSERT INTO transactions (
                id, hash, from_address, to_address, nonce, value, gas, gas_price, data,
                sig_v, sig_r, sig_s, status, blocknumber, sender_token_id, created, updated
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            ",
        )
        .bind(tx.id)
        .bind(tx.hash.map(|h| h.as_bytes().to_vec()))
        .bind(tx.from_address.as_bytes())
        .bind(tx.to_address.as_ref().map(EthAddress::as_bytes))
        .bind(tx.nonce as i64)
        .bind(numeric_from_wei(tx.value))
        .bind(tx.gas as i64)
        .bind(numeric_from_wei(tx.gas_price))
        .bind(&tx.data)
        .bind(tx.sig_v.map(|v| v as i64))
        .bind(tx.sig_r.map(|b| b.to_vec()))
        .bind(tx.sig_s.map(|b| b.to_vec()))
        .bind(i16::from(tx.status))
        .bind(tx.blocknumber.map(|b| b.value() as i64))
        .bind(&tx.sender_token_id)
        .bind(tx.created)
        .bind(tx.updated)
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        debug!("Transaction inserted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_by_sender_nonce(
        &self,
        from_address: &EthAddress,
        nonce: u64,
    ) -> Result<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r"SELECT {TRANSACTION_COLUMNS} FROM transactions
              WHERE from_address = $1 AND nonce = $2 AND status != $3
              LIMIT 1"
        ))
        .bind(from_address.as_bytes())
        .bind(nonce as i64)
        .bind(i16::from(TransactionStatus::Error))
        .fetch_optional(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        row.map(TransactionRow::into_transaction).transpose()
    }

    #[instrument(skip(self))]
    async fn find_by_hash(&self, hash: &TxHash) -> Result<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r"SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE hash = $1"
        ))
        .bind(hash.as_bytes().to_vec())
        .fetch_optional(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        row.map(TransactionRow::into_transaction).transpose()
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r"SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        row.map(TransactionRow::into_transaction).transpose()
    }

    #[instrument(skip(self))]
    async fn update_status(
        &self,
        id: Uuid,
        next: TransactionStatus,
        blocknumber: Option<BlockNumber>,
    ) -> Result<()> {
        let Some(current) = self.find_by_id(id).await? else {
            return Err(decode_error("transaction not found"));
        };

        if !current.status.can_transition_to(next) {
            return Err(decode_error(format!(
                "forbidden transition {} -> {}",
                current.status.name(),
                next.name()
            )));
        }

        sqlx::query(
            r"UPDATE transactions SET status = $2, blocknumber = $3, updated = now() WHERE id = $1",
        )
        .bind(id)
        .bind(i16::from(next))
        .bind(blocknumber.map(|b| b.value() as i64))
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        debug!(id = %id, next = next.name(), "Transaction status updated");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_pending_by_sender(&self, from_address: &EthAddress) -> Result<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            r"SELECT {TRANSACTION_COLUMNS} FROM transactions
              WHERE from_address = $1
                AND status IN ($2, $3)
                AND sig_r IS NOT NULL
              ORDER BY nonce ASC"
        ))
        .bind(from_address.as_bytes())
        .bind(i16::from(TransactionStatus::New))
        .bind(i16::from(TransactionStatus::Queued))
        .fetch_all(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        rows.into_iter().map(TransactionRow::into_transaction).collect()
    }

    #[instrument(skip(self))]
    async fn list_unconfirmed_by_sender(
        &self,
        from_address: &EthAddress,
    ) -> Result<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            r"SELECT {TRANSACTION_COLUMNS} FROM transactions
              WHERE from_address = $1 AND status = $2
              ORDER BY nonce ASC"
        ))
        .bind(from_address.as_bytes())
        .bind(i16::from(TransactionStatus::Unconfirmed))
        .fetch_all(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        rows.into_iter().map(TransactionRow::into_transaction).collect()
    }

    #[instrument(skip(self))]
    async fn list_inbound_pending(
        &self,
        to_address: &EthAddress,
        since_block: BlockNumber,
    ) -> Result<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            r"SELECT {TRANSACTION_COLUMNS} FROM transactions
              WHERE to_address = $1
                AND (
                    status IN ($2, $3, $4)
                    OR (status = $5 AND blocknumber >= $6)
                )
              ORDER BY nonce ASC"
        ))
        .bind(to_address.as_bytes())
        .bind(i16::from(TransactionStatus::New))
        .bind(i16::from(TransactionStatus::Queued))
        .bind(i16::from(TransactionStatus::Unconfirmed))
        .bind(i16::from(TransactionStatus::Confirmed))
        .bind(since_block.value() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        rows.into_iter().map(TransactionRow::into_transaction).collect()
    }

    #[instrument(skip(self))]
    async fn list_stale_senders(&self, max_age_secs: i64) -> Result<Vec<EthAddress>> {
        let rows: Vec<Vec<u8>> = sqlx::query_scalar(
            r"SELECT DISTINCT from_address FROM transactions
              WHERE status IN ($1, $2, $3)
                AND updated < now() - make_interval(secs => $4)",
        )
        .bind(i16::from(TransactionStatus::New))
        .bind(i16::from(TransactionStatus::Queued))
        .bind(i16::from(TransactionStatus::Unconfirmed))
        .bind(max_age_secs as f64)
        .fetch_all(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        rows.into_iter()
            .map(|b| address_from_bytes(b, "from_address"))
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TOKEN TRANSFER STORE IMPLEMENTATION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, FromRow)]
struct TokenTransferRow {
    id: Uuid,
    transaction_id: Uuid,
    transaction_log_index: i32,
    contract_address: Vec<u8>,
    from_address: Vec<u8>,
    to_address: Vec<u8>,
    value: BigDecimal,
    status: i16,
}

impl TokenTransferRow {
    fn into_transfer(self) -> Result<TokenTransfer> {
        Ok(TokenTransfer {
            id: self.id,
            transaction_id: self.transaction_id,
            transaction_log_index: self.transaction_log_index as u32,
            contract_address: address_from_bytes(self.contract_address, "contract_address")?,
            from_address: address_from_bytes(self.from_address, "from_address")?,
            to_address: address_from_bytes(self.to_address, "to_address")?,
            value: wei_from_numeric(&self.value)?,
            status: TokenTransferStatus::try_from(self.status as u8)
                .map_err(|e| decode_error(format!("status: {e}")))?,
        })
    }
}

const TOKEN_TRANSFER_COLUMNS: &str = r"
    id, transaction_id, transaction_log_index, contract_address,
    from_address, to_address, value, status
";

#[async_trait]
impl TokenTransferStore for PostgresStore {
    #[instrument(skip(self, transfer), fields(transaction_id = %transfer.transaction_id))]
    async fn upsert(&self, transfer: &TokenTransfer) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO token_transfers (
                id, transaction_id, transaction_log_index, contract_address,
                from_address, to_address, value, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (transaction_id, transaction_log_index) DO UPDATE SET
                status = EXCLUDED.status,
                value = EXCLUDED.value
            ",
        )
        .bind(transfer.id)
        .bind(transfer.transaction_id)
        .bind(transfer.transaction_log_index as i32)
        .bind(transfer.contract_address.as_bytes())
        .bind(transfer.from_address.as_bytes())
        .bind(transfer.to_address.as_bytes())
        .bind(numeric_from_wei(transfer.value))
        .bind(i16::from(transfer.status))
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        debug!("Token transfer upserted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_by_address(
        &self,
        address: &EthAddress,
        contract_address: &EthAddress,
    ) -> Result<Vec<TokenTransfer>> {
        let rows = sqlx::query_as::<_, TokenTransferRow>(&format!(
            r"SELECT {TOKEN_TRANSFER_COLUMNS} FROM token_transfers
              WHERE contract_address = $1 AND (from_address = $2 OR to_address = $2)"
        ))
        .bind(contract_address.as_bytes())
        .bind(address.as_bytes())
        .fetch_all(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        rows.into_iter().map(TokenTransferRow::into_transfer).collect()
    }

    #[instrument(skip(self))]
    async fn list_by_transaction(&self, transaction_id: Uuid) -> Result<Vec<TokenTransfer>> {
        let rows = sqlx::query_as::<_, TokenTransferRow>(&format!(
            r"SELECT {TOKEN_TRANSFER_COLUMNS} FROM token_transfers
              WHERE transaction_id = $1 ORDER BY transaction_log_index ASC"
        ))
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        rows.into_iter().map(TokenTransferRow::into_transfer).collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TOKEN BALANCE STORE IMPLEMENTATION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, FromRow)]
struct TokenBalanceRow {
    eth_address: Vec<u8>,
    contract_address: Vec<u8>,
    balance: BigDecimal,
    last_block: i64,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl TokenBalanceRow {
    fn into_balance(self) -> Result<TokenBalance> {
        Ok(TokenBalance {
            eth_address: address_from_bytes(self.eth_address, "eth_address")?,
            contract_address: address_from_bytes(self.contract_address, "contract_address")?,
            balance: wei_from_numeric(&self.balance)?,
            last_block: BlockNumber::new(self.last_block as u64),
            updated_at: self.updated_at,
        })
    }
}

#[async_trait]
impl TokenBalanceStore for PostgresStore {
    #[instrument(skip(self))]
    async fn get(
        &self,
        eth_address: &EthAddress,
        contract_address: &EthAddress,
    ) -> Result<Option<TokenBalance>> {
        let row = sqlx::query_as::<_, TokenBalanceRow>(
            r"SELECT eth_address, contract_address, balance, last_block, updated_at
              FROM token_balances WHERE eth_address = $1 AND contract_address = $2",
        )
        .bind(eth_address.as_bytes())
        .bind(contract_address.as_bytes())
        .fetch_optional(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        row.map(TokenBalanceRow::into_balance).transpose()
    }

    #[instrument(skip(self, balance))]
    async fn upsert(&self, balance: &TokenBalance) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO token_balances (eth_address, contract_address, balance, last_block, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (eth_address, contract_address) DO UPDATE SET
                balance = EXCLUDED.balance,
                last_block = EXCLUDED.last_block,
                updated_at = EXCLUDED.updated_at
            ",
        )
        .bind(balance.eth_address.as_bytes())
        .bind(balance.contract_address.as_bytes())
        .bind(numeric_from_wei(balance.balance))
        .bind(balance.last_block.value() as i64)
        .bind(balance.updated_at)
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_contracts_for_address(&self, address: &EthAddress) -> Result<Vec<EthAddress>> {
        let rows: Vec<Vec<u8>> =
            sqlx::query_scalar("SELECT contract_address FROM token_balances WHERE eth_address = $1")
                .bind(address.as_bytes())
                .fetch_all(&self.pool)
                .await
                .map_err(InfraError::Database)?;

        rows.into_iter()
            .map(|b| address_from_bytes(b, "contract_address"))
            .collect()
    }

    #[instrument(skip(self))]
    async fn delete(&self, eth_address: &EthAddress, contract_address: &EthAddress) -> Result<()> {
        sqlx::query("DELETE FROM token_balances WHERE eth_address = $1 AND contract_address = $2")
            .bind(eth_address.as_bytes())
            .bind(contract_address.as_bytes())
            .execute(&self.pool)
            .await
            .map_err(InfraError::Database)?;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SUBSCRIPTION STORE IMPLEMENTATION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, FromRow)]
struct SubscriptionRow {
    id: Uuid,
    token_id: String,
    eth_address: Vec<u8>,
    service: i16,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl SubscriptionRow {
    fn into_subscription(self) -> Result<Subscription> {
        Ok(Subscription {
            id: self.id,
            token_id: self.token_id,
            eth_address: address_from_bytes(self.eth_address, "eth_address")?,
            service: Transport::try_from(self.service as u8)
                .map_err(|e| decode_error(format!("service: {e}")))?,
            created_at: self.created_at,
        })
    }
}

#[async_trait]
impl SubscriptionStore for PostgresStore {
    #[instrument(skip(self, subscription))]
    async fn upsert(&self, subscription: &Subscription) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO subscriptions (id, token_id, eth_address, service, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (token_id, eth_address, service) DO UPDATE SET
                created_at = EXCLUDED.created_at
            ",
        )
        .bind(subscription.id)
        .bind(&subscription.token_id)
        .bind(subscription.eth_address.as_bytes())
        .bind(i16::from(subscription.service))
        .bind(subscription.created_at)
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_for_address(&self, address: &EthAddress) -> Result<Vec<Subscription>> {
        let rows = sqlx::query_as::<_, SubscriptionRow>(
            r"SELECT id, token_id, eth_address, service, created_at
              FROM subscriptions WHERE eth_address = $1",
        )
        .bind(address.as_bytes())
        .fetch_all(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        rows.into_iter().map(SubscriptionRow::into_subscription).collect()
    }

    #[instrument(skip(self))]
    async fn list_subscribed_addresses(&self, token_id: &str) -> Result<Vec<EthAddress>> {
        let rows = sqlx::query_as::<_, SubscriptionRow>(
            r"SELECT id, token_id, eth_address, service, created_at
              FROM subscriptions WHERE token_id = $1",
        )
        .bind(token_id)
        .fetch_all(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        rows.into_iter().map(|row| row.into_subscription().map(|s| s.eth_address)).collect()
    }

    #[instrument(skip(self))]
    async fn delete(
        &self,
        token_id: &str,
        address: &EthAddress,
        service: Transport,
    ) -> Result<()> {
        sqlx::query(
            "DELETE FROM subscriptions WHERE token_id = $1 AND eth_address = $2 AND service = $3",
        )
        .bind(token_id)
        .bind(address.as_bytes())
        .bind(i16::from(service))
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CHAIN STATE STORE IMPLEMENTATION
// ═══════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl ChainStateStore for PostgresStore {
    #[instrument(skip(self))]
    async fn get_last_block(&self) -> Result<BlockNumber> {
        let row: Option<i64> = sqlx::query_scalar(
            "SELECT block_number FROM chain_state ORDER BY block_number DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        Ok(BlockNumber::new(row.unwrap_or(0) as u64))
    }

    #[instrument(skip(self), fields(block = %block.value()))]
    async fn set_last_block(&self, block: BlockNumber, hash: B256) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO chain_state (block_number, block_hash, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (block_number) DO UPDATE SET
                block_hash = EXCLUDED.block_hash,
                updated_at = NOW()
            ",
        )
        .bind(block.value() as i64)
        .bind(hash.as_slice())
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        debug!("Last block set");
        Ok(())
    }

    #[instrument(skip(self), fields(block = %block.value()))]
    async fn insert_block_hash(
        &self,
        block: BlockNumber,
        hash: B256,
        parent: B256,
        timestamp: u64,
    ) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO block_hashes (block_number, block_hash, parent_hash, timestamp)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (block_number) DO UPDATE SET
                block_hash = EXCLUDED.block_hash,
                parent_hash = EXCLUDED.parent_hash,
                timestamp = EXCLUDED.timestamp
            ",
        )
        .bind(block.value() as i64)
        .bind(hash.as_slice())
        .bind(parent.as_slice())
        .bind(timestamp as i64)
        .execute(&self.pool)
        .await
        .map_err(InfraError::Database)?;

        Ok(())
    }

    #[instrument(skip(self), fields(block = %block.value()))]
    async fn get_block_hash(&self, block: BlockNumber) -> Result<Option<B256>> {
        let row: Option<Vec<u8>> =
            sqlx::query_scalar("SELECT block_hash FROM block_hashes WHERE block_number = $1")
                .bind(block.value() as i64)
                .fetch_optional(&self.pool)
                .await
                .map_err(InfraError::Database)?;

        match row {
            Some(bytes) => Ok(Some(B256::from(hash32_from_bytes(bytes, "block_hash")?))),
            None => Ok(None),
        }
    }

    #[instrument(skip(self), fields(fork_point = %fork_point.value()))]
    async fn execute_reorg_rollback(&self, fork_point: BlockNumber) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(InfraError::Database)?;

        sqlx::query("DELETE FROM block_hashes WHERE block_number > $1")
            .bind(fork_point.value() as i64)
            .execute(&mut *tx)
            .await
            .map_err(InfraError::Database)?;

        sqlx::query("DELETE FROM chain_state WHERE block_number > $1")
            .bind(fork_point.value() as i64)
            .execute(&mut *tx)
            .await
            .map_err(InfraError::Database)?;

        // Transactions confirmed above the fork point revert to unconfirmed
        // so the next Block Monitor tick re-observes and re-confirms them.
        sqlx::query(
            "UPDATE transactions SET status = $1, blocknumber = NULL
             WHERE status = $2 AND blocknumber > $3",
        )
        .bind(i16::from(TransactionStatus::Unconfirmed))
        .bind(i16::from(TransactionStatus::Confirmed))
        .bind(fork_point.value() as i64)
        .execute(&mut *tx)
        .await
        .map_err(InfraError::Database)?;

        tx.commit().await.map_err(InfraError::Database)?;

        debug!("Reorg rollback executed");
        Ok(())
    }

    #[instrument(skip(self), fields(keep_blocks = keep_blocks))]
    async fn prune_old_blocks(&self, keep_blocks: u64) -> Result<u64> {
        let max_block: Option<i64> =
            sqlx::query_scalar("SELECT MAX(block_number) FROM block_hashes")
                .fetch_optional(&self.pool)
                .await
                .map_err(InfraError::Database)?;

        let Some(max) = max_block else {
            return Ok(0);
        };

        let cutoff = max - keep_blocks as i64;
        if cutoff <= 0 {
            return Ok(0);
        }

        let result = sqlx::query("DELETE FROM block_hashes WHERE block_number < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(InfraError::Database)?;

        debug!(pruned = result.rows_affected(), "Old blocks pruned");
        Ok(result.rows_affected())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    // Full integration tests require a PostgreSQL database and are
    // located in tests/store_integration.rs.

    #[test]
    fn postgres_store_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PostgresStore>();
    }

    #[test]
    fn wei_numeric_roundtrip() {
        let amount = WeiAmount::from(123_456_789_u64);
        let numeric = numeric_from_wei(amount);
        let back = wei_from_numeric(&numeric).expect("valid");
        assert_eq!(back, amount);
    }

    #[test]
    fn wei_numeric_roundtrip_zero() {
        let amount = WeiAmount::ZERO;
        let numeric = numeric_from_wei(amount);
        let back = wei_from_numeric(&numeric).expect("valid");
        assert_eq!(back, amount);
    }
}
