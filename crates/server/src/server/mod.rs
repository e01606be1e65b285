//! Thin HTTP gateway over the query facade.
//!
//! Handlers parse and validate the query string, delegate to `query`, and
//! wrap the result in the response envelope. No aggregation logic lives
//! here.

pub mod token;
pub mod user;

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::kv::KvStore;
use crate::query;
use crate::store::Store;
use crate::types::{Action, Chain};

use crate::config::parse_duration;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub kv: Arc<dyn KvStore>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/token_cex_in", get(get_top_cex_in))
        .route("/v1/token_cex_out", get(get_top_cex_out))
        .route("/v1/activities", get(get_activities))
        .route("/v1/leaderboard", get(get_leaderboard))
        .route("/v1/token/profit", get(token::get_token_profit))
        .route("/v1/token/inspect/buysell", get(token::inspect_buy_sell))
        .route(
            "/v1/token/inspect/depositwithdraw",
            get(token::inspect_deposit_withdraw),
        )
        .route("/v1/token/inspect/activities", get(token::inspect_activities))
        .route("/v1/token/list", get(token::list))
        .route("/v1/token/trending", get(token::trending))
        .route("/v1/token/info", get(token::info))
        .route("/v1/token/price_with_transfer", get(token::price_with_transfer))
        .route("/v1/user/profit", get(user::get_user_profit))
        .route("/v1/user/inspect", get(user::inspect))
        .route("/v1/user/inspect/activities", get(user::inspect_activities))
        .route("/v1/user/balances", get(user::balances))
        .route("/v1/user/portfolio", get(user::portfolio))
        .with_state(state)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::InvalidDuration(_)
            | AppError::UnknownChain(_)
            | AppError::UnknownAction(_)
            | AppError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Corrupt(_)
            | AppError::Sqlx(_)
            | AppError::Redis(_)
            | AppError::Reqwest(_) => StatusCode::BAD_GATEWAY,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

// ---------------------------------------------------------------------------
// Shared request shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct PageByDurationRequest {
    pub duration: String,
    pub start: usize,
    pub limit: usize,
    pub chain: String,
}

#[derive(Debug, Deserialize)]
pub struct ActivityPageRequest {
    pub action: String,
    pub start: usize,
    pub limit: usize,
    pub chain: String,
}

#[derive(Debug, Deserialize)]
pub struct PageRequest {
    pub start: usize,
    pub limit: usize,
    pub chain: String,
}

#[derive(Debug, Deserialize)]
pub struct InspectRequest {
    pub chain: String,
    pub address: String,
    pub duration: String,
}

#[derive(Debug, Deserialize)]
pub struct AddressRequest {
    pub chain: String,
    pub address: String,
}

#[derive(Debug, Deserialize)]
pub struct AddressActivityRequest {
    pub action: String,
    pub chain: String,
    pub address: String,
    pub start: usize,
    pub limit: usize,
}

#[derive(Debug, Deserialize)]
pub struct AddressPageRequest {
    pub chain: String,
    pub address: String,
    pub start: usize,
    pub limit: usize,
}

// ---------------------------------------------------------------------------
// Chain-level handlers
// ---------------------------------------------------------------------------

async fn get_top_cex_in(
    State(state): State<AppState>,
    Query(req): Query<PageByDurationRequest>,
) -> Result<Json<Value>, AppError> {
    let chain = Chain::parse(&req.chain)?;
    let duration = parse_duration(&req.duration)?;
    let page = query::top_cex_in(&state.store, chain, duration, req.start, req.limit)?;
    Ok(Json(json!({
        "top_cex_in": page.entries,
        "total": page.total,
    })))
}

async fn get_top_cex_out(
    State(state): State<AppState>,
    Query(req): Query<PageByDurationRequest>,
) -> Result<Json<Value>, AppError> {
    let chain = Chain::parse(&req.chain)?;
    let duration = parse_duration(&req.duration)?;
    let page = query::top_cex_out(&state.store, chain, duration, req.start, req.limit)?;
    Ok(Json(json!({
        "top_cex_out": page.entries,
        "total": page.total,
    })))
}

async fn get_activities(
    State(state): State<AppState>,
    Query(req): Query<ActivityPageRequest>,
) -> Result<Json<Value>, AppError> {
    let chain = Chain::parse(&req.chain)?;
    let action = Action::parse(&req.action)?;
    let page = query::activities(&state.store, chain, action, req.start, req.limit)?;
    Ok(Json(json!({
        "activities": page.activities,
        "total": page.total,
    })))
}

async fn get_leaderboard(
    State(state): State<AppState>,
    Query(req): Query<PageRequest>,
) -> Result<Json<Value>, AppError> {
    let chain = Chain::parse(&req.chain)?;
    let entries = query::leaderboard(&state.store, chain, req.start, req.limit)?;
    Ok(Json(json!({ "leaderboard": entries })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_map_to_bad_request() {
        for err in [
            AppError::MalformedRequest("start and limit must be positive".into()),
            AppError::UnknownChain("solana".into()),
            AppError::UnknownAction("minting".into()),
            AppError::InvalidDuration(std::time::Duration::from_secs(7)),
        ] {
            assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn upstream_errors_map_to_bad_gateway() {
        let corrupt: AppError = serde_json::from_str::<Vec<u8>>("{oops").unwrap_err().into();
        assert_eq!(corrupt.into_response().status(), StatusCode::BAD_GATEWAY);
    }
}
