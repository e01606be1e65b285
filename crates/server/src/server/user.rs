//! User-scoped gateway handlers.

use axum::extract::{Query, State};
use axum::Json;
use serde_json::{json, Value};
use tracing::error;

use crate::config::parse_duration;
use crate::errors::AppError;
use crate::query;
use crate::types::{Action, Chain, TokenBalance};

use super::{
    AddressActivityRequest, AddressPageRequest, AddressRequest, AppState, InspectRequest,
    PageByDurationRequest,
};

pub async fn get_user_profit(
    State(state): State<AppState>,
    Query(req): Query<PageByDurationRequest>,
) -> Result<Json<Value>, AppError> {
    let chain = Chain::parse(&req.chain)?;
    let duration = parse_duration(&req.duration)?;
    let ranked = query::top_user_profit(&state.store, chain, duration, req.start, req.limit)?;
    Ok(Json(json!({ "top_user_profit": ranked })))
}

pub async fn inspect(
    State(state): State<AppState>,
    Query(req): Query<InspectRequest>,
) -> Result<Json<Value>, AppError> {
    let chain = Chain::parse(&req.chain)?;
    let duration = parse_duration(&req.duration)?;
    let tx_profit = query::user_tx_profit(&state.store, chain, duration, &req.address);
    Ok(Json(json!({ "tx_profit": tx_profit })))
}

pub async fn inspect_activities(
    State(state): State<AppState>,
    Query(req): Query<AddressActivityRequest>,
) -> Result<Json<Value>, AppError> {
    let chain = Chain::parse(&req.chain)?;
    let action = Action::parse(&req.action)?;
    let page = query::user_activities(
        &state.store,
        chain,
        action,
        &req.address,
        req.start,
        req.limit,
    )?;
    Ok(Json(json!({ "activities": page.activities })))
}

/// Read the user's balance snapshot out of the K/V store; a missing or
/// corrupt snapshot degrades to an empty balance list, never an error.
async fn load_balances(state: &AppState, chain: Chain, address: &str) -> Vec<TokenBalance> {
    let key = format!("{}_{}", chain, address.to_lowercase());
    let raw = match state.kv.get(&key).await {
        Ok(raw) => raw,
        Err(e) => {
            error!(error = %e, key, "failed to read user balance snapshot");
            return Vec::new();
        }
    };
    match serde_json::from_str(&raw) {
        Ok(balances) => balances,
        Err(e) => {
            error!(error = %e, key, "failed to decode user balance snapshot");
            Vec::new()
        }
    }
}

pub async fn balances(
    State(state): State<AppState>,
    Query(req): Query<AddressRequest>,
) -> Result<Json<Value>, AppError> {
    let chain = Chain::parse(&req.chain)?;
    let balances = load_balances(&state, chain, &req.address).await;
    let res = query::user_balances(&state.store, chain, &req.address, &balances)?;
    Ok(Json(json!({ "balances": res })))
}

pub async fn portfolio(
    State(state): State<AppState>,
    Query(req): Query<AddressPageRequest>,
) -> Result<Json<Value>, AppError> {
    let chain = Chain::parse(&req.chain)?;
    let balances = load_balances(&state, chain, &req.address).await;
    let page = query::user_portfolio(&state.store, chain, &balances, req.start, req.limit)?;
    Ok(Json(json!({
        "tokens": page.tokens,
        "total": page.total,
    })))
}
