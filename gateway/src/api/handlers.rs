//! HTTP handlers for the client-facing API.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

use crate::api::AppState;
use crate::api::dto::{
    BalanceResponse, ChainTransactionDto, DeregisterTokenQuery, PushRegistrationDto,
    RegisterTokenDto, SkeletonRequestDto, SubmitRequestDto, TokenBalanceDto,
};
use crate::error::{AppError, ApiError, DomainError};
use crate::intake::{SkeletonResponse, SubmitResponse};
use crate::ports::{ChainStateStore, SubscriptionStore, TokenBalanceStore, TransactionStore};
use crate::types::entities::Subscription;
use crate::types::enums::Transport;
use crate::types::primitives::{EthAddress, TxHash, WeiAmount};

/// `GET /healthz` — liveness probe for orchestration, not part of the
/// client-facing interface.
pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// `POST /tx/skel`.
#[instrument(skip(state, body))]
pub async fn build_skeleton(
    State(state): State<AppState>,
    Json(body): Json<SkeletonRequestDto>,
) -> Result<Json<SkeletonResponse>, ApiError> {
    let req = body.into_domain().map_err(AppError::Domain)?;
    let resp = state.intake.build_skeleton(req).await?;
    Ok(Json(resp))
}

/// `POST /tx`.
#[instrument(skip(state, body))]
pub async fn submit_transaction(
    State(state): State<AppState>,
    Json(body): Json<SubmitRequestDto>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let req = body.into_domain(None);
    let resp = state.intake.submit_signed_transaction(req).await?;
    Ok(Json(resp))
}

/// `GET /tx/{hash}` — the node's own view, not the local State Store's;
/// returns 404 if the node has never seen the hash.
#[instrument(skip(state))]
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> Result<Json<ChainTransactionDto>, ApiError> {
    let hash = TxHash::from_hex(&hash)
        .map_err(|e| ApiError::App(AppError::Domain(DomainError::InvalidTransaction(e.to_string()))))?;

    let info = state
        .chain
        .get_transaction_by_hash(hash.into())
        .await
        .map_err(AppError::from)?
        .ok_or(ApiError::BadRequest("transaction not found".into()))?;

    Ok(Json(ChainTransactionDto {
        hash: hash.to_hex(),
        from: format!("0x{:x}", info.from),
        to: info.to.map(|a| format!("0x{a:x}")),
        value: format!("0x{:x}", info.value),
        nonce: format!("0x{:x}", info.nonce),
        gas: format!("0x{:x}", info.gas_limit),
    }))
}

/// `GET /balance/{address}`.
#[instrument(skip(state))]
pub async fn get_balance(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let address = EthAddress::from_hex(&address).map_err(AppError::from)?;

    let confirmed = state.chain.get_balance(address.into()).await.map_err(AppError::from)?;
    let confirmed_balance = WeiAmount::new(confirmed);

    let unconfirmed_rows = state.store.list_unconfirmed_by_sender(&address).await?;
    let outgoing: WeiAmount = unconfirmed_rows
        .iter()
        .fold(WeiAmount::ZERO, |acc, tx| acc.saturating_add(&tx.cost()));

    let checkpoint = state.store.get_last_block().await?;
    let inbound = state.store.list_inbound_pending(&address, checkpoint).await?;
    let incoming: WeiAmount =
        inbound.iter().fold(WeiAmount::ZERO, |acc, tx| acc.saturating_add(&tx.value));

    let unconfirmed_balance = confirmed_balance.saturating_sub(&outgoing).saturating_add(&incoming);

    Ok(Json(BalanceResponse { confirmed_balance, unconfirmed_balance }))
}

/// `GET /tokens/{address}`.
#[instrument(skip(state))]
pub async fn list_token_balances(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<Vec<TokenBalanceDto>>, ApiError> {
    let address = EthAddress::from_hex(&address).map_err(AppError::from)?;
    let contracts = state.store.list_contracts_for_address(&address).await?;

    let mut out = Vec::with_capacity(contracts.len());
    for contract in contracts {
        if let Some(balance) = state.store.get(&address, &contract).await? {
            out.push(TokenBalanceDto {
                contract_address: balance.contract_address,
                balance: balance.balance,
                last_block: balance.last_block.value(),
            });
        }
    }

    Ok(Json(out))
}

/// `POST /token` — register a holder's interest in an ERC20 contract's
/// balance. The balance itself is populated lazily, the first time a
/// Transfer log touching this pair is observed; until then it reads as
/// zero at `last_block = 0`.
#[instrument(skip(state, body))]
pub async fn register_token(
    State(state): State<AppState>,
    Json(body): Json<RegisterTokenDto>,
) -> Result<StatusCode, ApiError> {
    let address = EthAddress::from_hex(&body.address).map_err(AppError::from)?;
    let contract = EthAddress::from_hex(&body.contract).map_err(AppError::from)?;

    if state.store.get(&address, &contract).await?.is_none() {
        let balance = crate::types::entities::TokenBalance {
            eth_address: address,
            contract_address: contract,
            balance: WeiAmount::new(alloy::primitives::U256::ZERO),
            last_block: crate::types::primitives::BlockNumber::new(0),
            updated_at: Utc::now(),
        };
        TokenBalanceStore::upsert(&state.store, &balance).await?;
    }

    Ok(StatusCode::CREATED)
}

/// `DELETE /token/{contract}?address=...`.
#[instrument(skip(state))]
pub async fn deregister_token(
    State(state): State<AppState>,
    Path(contract): Path<String>,
    Query(query): Query<DeregisterTokenQuery>,
) -> Result<StatusCode, ApiError> {
    let address = EthAddress::from_hex(&query.address).map_err(AppError::from)?;
    let contract = EthAddress::from_hex(&contract).map_err(AppError::from)?;
    TokenBalanceStore::delete(&state.store, &address, &contract).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /apn/register`.
#[instrument(skip(state, body))]
pub async fn register_apn(
    State(state): State<AppState>,
    Json(body): Json<PushRegistrationDto>,
) -> Result<StatusCode, ApiError> {
    register_push(state, body, Transport::Apn).await
}

/// `POST /gcm/register`.
#[instrument(skip(state, body))]
pub async fn register_gcm(
    State(state): State<AppState>,
    Json(body): Json<PushRegistrationDto>,
) -> Result<StatusCode, ApiError> {
    register_push(state, body, Transport::Gcm).await
}

async fn register_push(
    state: AppState,
    body: PushRegistrationDto,
    service: Transport,
) -> Result<StatusCode, ApiError> {
    let address = EthAddress::from_hex(&body.address).map_err(AppError::from)?;
    let subscription = Subscription {
        id: Uuid::new_v4(),
        token_id: body.token,
        eth_address: address,
        service,
        created_at: Utc::now(),
    };
    SubscriptionStore::upsert(&state.store, &subscription).await?;
    Ok(StatusCode::CREATED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_variants_map_to_distinct_registration_endpoints() {
        assert_ne!(Transport::Apn as u8, Transport::Gcm as u8);
    }
}
