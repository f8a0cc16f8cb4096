//! Chain proxy handlers

use axum::{
    extract::{Query, State},
    Json,
};

use crate::auth::{checksum_address, parse_address};
use crate::error::{ApiError, ApiResult};
use crate::eth::format_ether;
use crate::models::{BalanceQuery, BalanceResponse, ChainResponse};
use crate::state::AppState;

/// GET /eth/chain - Chain ID reported by the upstream node
pub async fn get_chain(State(state): State<AppState>) -> ApiResult<Json<ChainResponse>> {
    let chain_id = state.eth.chain_id().await?;

    Ok(Json(ChainResponse {
        chain_id: chain_id.to_string(),
    }))
}

/// GET /eth/balance?address=0x... - Latest balance of an account
pub async fn get_balance(
    State(state): State<AppState>,
    Query(query): Query<BalanceQuery>,
) -> ApiResult<Json<BalanceResponse>> {
    let raw = query
        .address
        .filter(|a| !a.is_empty())
        .ok_or_else(|| ApiError::BadRequest("address query parameter is required".to_string()))?;

    let address = parse_address(&raw).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let wei = state.eth.balance(&address).await?;

    Ok(Json(BalanceResponse {
        address: checksum_address(&address),
        wei: wei.to_string(),
        eth: format_ether(wei),
    }))
}
