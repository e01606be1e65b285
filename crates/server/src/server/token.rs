//! Token-scoped gateway handlers.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::parse_duration;
use crate::errors::AppError;
use crate::query;
use crate::types::{Action, Chain};

use super::{
    AddressActivityRequest, AddressRequest, AppState, InspectRequest, PageByDurationRequest,
};

pub async fn get_token_profit(
    State(state): State<AppState>,
    Query(req): Query<PageByDurationRequest>,
) -> Result<Json<Value>, AppError> {
    let chain = Chain::parse(&req.chain)?;
    let duration = parse_duration(&req.duration)?;
    let ranked = query::top_token_profit(&state.store, chain, duration, req.start, req.limit)?;
    Ok(Json(json!({ "top_token_profit": ranked })))
}

pub async fn inspect_buy_sell(
    State(state): State<AppState>,
    Query(req): Query<InspectRequest>,
) -> Result<Json<query::BuySellInspect>, AppError> {
    let chain = Chain::parse(&req.chain)?;
    let duration = parse_duration(&req.duration)?;
    Ok(Json(query::token_inspect_buy_sell(
        &state.store,
        chain,
        duration,
        &req.address,
    )?))
}

pub async fn inspect_deposit_withdraw(
    State(state): State<AppState>,
    Query(req): Query<InspectRequest>,
) -> Result<Json<query::DepositWithdrawInspect>, AppError> {
    let chain = Chain::parse(&req.chain)?;
    let duration = parse_duration(&req.duration)?;
    Ok(Json(query::token_inspect_deposit_withdraw(
        &state.store,
        chain,
        duration,
        &req.address,
    )?))
}

pub async fn inspect_activities(
    State(state): State<AppState>,
    Query(req): Query<AddressActivityRequest>,
) -> Result<Json<Value>, AppError> {
    let chain = Chain::parse(&req.chain)?;
    let action = Action::parse(&req.action)?;
    let page = query::token_activities(
        &state.store,
        chain,
        action,
        &req.address,
        req.start,
        req.limit,
    )?;
    Ok(Json(json!({ "activities": page.activities })))
}

#[derive(Debug, Deserialize)]
pub struct ListTokenRequest {
    pub chain: String,
    #[serde(default)]
    pub symbol_search: String,
}

pub async fn list(
    State(state): State<AppState>,
    Query(req): Query<ListTokenRequest>,
) -> Result<Json<Value>, AppError> {
    let chain = Chain::parse(&req.chain)?;
    let tokens = query::list_tokens(&state.store, chain, &req.symbol_search);
    Ok(Json(json!({ "tokens": tokens })))
}

pub async fn trending(State(state): State<AppState>) -> Json<Value> {
    let tokens = query::trending_tokens(&state.store);
    Json(json!({ "trending_tokens": tokens }))
}

pub async fn info(
    State(state): State<AppState>,
    Query(req): Query<AddressRequest>,
) -> Result<Json<Value>, AppError> {
    let chain = Chain::parse(&req.chain)?;
    let info = query::token_info(&state.store, chain, &req.address);
    Ok(Json(json!({ "info": info })))
}

pub async fn price_with_transfer(
    State(state): State<AppState>,
    Query(req): Query<AddressRequest>,
) -> Result<Json<Value>, AppError> {
    let chain = Chain::parse(&req.chain)?;
    let series = query::price_with_transfer(&state.store, chain, &req.address);
    Ok(Json(json!({ "price_with_transfer": series })))
}
