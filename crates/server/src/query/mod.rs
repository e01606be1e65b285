//! Stateless query facade over the aggregation engine.
//!
//! Every function validates its inputs, pulls a snapshot out of the store,
//! shapes it (rank, paginate, join with token metadata) and returns plain
//! serialisable values. Nothing here holds engine state.

use std::collections::HashMap;
use std::ops::Range;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use crate::constants::is_quote;
use crate::errors::AppError;
use crate::store::Store;
use crate::types::{Action, BigTx, Chain, CmcTokenInfo, Token, TokenBalance};

/// Cap handed to the engine's big-transaction reads by the gateway.
pub const DEFAULT_ACTIVITY_CAP: usize = 100;

/// Row cap on the token search endpoint.
const LIST_TOKEN_LIMIT: usize = 10;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

/// Reject non-positive pagination parameters.
fn validate_page(start: usize, limit: usize) -> Result<(), AppError> {
    if start < 1 || limit < 1 {
        return Err(AppError::MalformedRequest(
            "start and limit must be positive".to_string(),
        ));
    }
    Ok(())
}

/// 1-based page window clamped to `len`. A page past the end is empty,
/// never an error.
fn page_span(start: usize, limit: usize, len: usize) -> Range<usize> {
    let offset = ((start - 1).saturating_mul(limit)).min(len);
    let end = offset.saturating_add(limit).min(len);
    offset..end
}

// ---------------------------------------------------------------------------
// Ranked token maps
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct TokenEntry {
    pub address: String,
    pub value: f64,
    pub network: String,
    pub symbol: String,
    pub current_price: f64,
    pub image_url: String,
}

#[derive(Debug, Serialize)]
pub struct TokenPage {
    pub entries: Vec<TokenEntry>,
    pub total: usize,
}

/// Rank a value-by-address map descending, paginate, join metadata.
fn rank_tokens(
    data: &HashMap<String, f64>,
    info: &HashMap<String, Token>,
    chain: Chain,
    start: usize,
    limit: usize,
) -> Vec<TokenEntry> {
    let mut ranked: Vec<(&String, &f64)> = data.iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(a.1));

    ranked[page_span(start, limit, ranked.len())]
        .iter()
        .map(|(address, value)| {
            let meta = info.get(*address).cloned().unwrap_or_default();
            TokenEntry {
                address: (*address).clone(),
                value: **value,
                network: chain.to_string(),
                symbol: meta.symbol,
                current_price: meta.usd_price,
                image_url: meta.image_url,
            }
        })
        .collect()
}

/// Top tokens flowing into exchange wallets, by USD value.
pub fn top_cex_in(
    store: &Store,
    chain: Chain,
    duration: Duration,
    start: usize,
    limit: usize,
) -> Result<TokenPage, AppError> {
    validate_page(start, limit)?;
    let window = store.transfer_window(chain, duration)?;
    let info = store.token_info(chain);
    Ok(TokenPage {
        entries: rank_tokens(&window.cex_in_flow_usdt, &info, chain, start, limit),
        total: window.cex_in_flow_usdt.len(),
    })
}

/// Top tokens flowing out of exchange wallets, by USD value.
pub fn top_cex_out(
    store: &Store,
    chain: Chain,
    duration: Duration,
    start: usize,
    limit: usize,
) -> Result<TokenPage, AppError> {
    validate_page(start, limit)?;
    let window = store.transfer_window(chain, duration)?;
    let info = store.token_info(chain);
    Ok(TokenPage {
        entries: rank_tokens(&window.cex_out_flow_usdt, &info, chain, start, limit),
        total: window.cex_out_flow_usdt.len(),
    })
}

// ---------------------------------------------------------------------------
// Profit rankings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct UserEntry {
    pub address: String,
    pub value: f64,
    pub network: String,
}

/// Users ranked by window profit.
pub fn top_user_profit(
    store: &Store,
    chain: Chain,
    duration: Duration,
    start: usize,
    limit: usize,
) -> Result<Vec<UserEntry>, AppError> {
    validate_page(start, limit)?;
    let window = store.trade_window(chain, duration)?;

    let mut ranked: Vec<(&String, &f64)> = window.user_profit.iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(a.1));

    Ok(ranked[page_span(start, limit, ranked.len())]
        .iter()
        .map(|(address, value)| UserEntry {
            address: (*address).clone(),
            value: **value,
            network: chain.to_string(),
        })
        .collect())
}

#[derive(Debug, Serialize)]
pub struct TokenProfitEntry {
    #[serde(flatten)]
    pub token: TokenEntry,
    pub gains: f64,
    /// `in_flow_usdt / in_flow`; a zero denominator is returned as the IEEE
    /// result and callers must tolerate it.
    pub avg_cost: f64,
    pub net_flow: f64,
}

/// Tokens ranked by window profit, annotated with cost basis and net flow.
pub fn top_token_profit(
    store: &Store,
    chain: Chain,
    duration: Duration,
    start: usize,
    limit: usize,
) -> Result<Vec<TokenProfitEntry>, AppError> {
    validate_page(start, limit)?;
    let window = store.trade_window(chain, duration)?;
    let info = store.token_info(chain);

    let ranked = rank_tokens(&window.token_profit, &info, chain, start, limit);
    Ok(ranked
        .into_iter()
        .map(|entry| {
            let in_usdt = window.token_in_flow_usdt.get(&entry.address).copied().unwrap_or(0.0);
            let in_flow = window.token_in_flow.get(&entry.address).copied().unwrap_or(0.0);
            let out_flow = window.token_out_flow.get(&entry.address).copied().unwrap_or(0.0);
            TokenProfitEntry {
                gains: entry.value,
                avg_cost: in_usdt / in_flow,
                net_flow: in_flow - out_flow,
                token: entry,
            }
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Big-transaction feeds
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ActivityEntry {
    #[serde(flatten)]
    pub big_tx: BigTx,
    pub symbol: String,
    pub token_image_url: String,
    pub chain_id: String,
}

#[derive(Debug, Serialize)]
pub struct ActivitiesPage {
    pub activities: Vec<ActivityEntry>,
    pub total: usize,
}

fn join_activities(
    big_tx: Vec<BigTx>,
    info: &HashMap<String, Token>,
    start: usize,
    limit: usize,
) -> ActivitiesPage {
    let total = big_tx.len();
    let activities = big_tx[page_span(start, limit, total)]
        .iter()
        .map(|tx| {
            let meta = info.get(&tx.token_address.to_lowercase()).cloned().unwrap_or_default();
            ActivityEntry {
                big_tx: tx.clone(),
                symbol: meta.symbol,
                token_image_url: meta.image_url,
                chain_id: meta.chain_id,
            }
        })
        .collect();
    ActivitiesPage { activities, total }
}

/// Newest big transactions across the chain, filtered by action.
pub fn activities(
    store: &Store,
    chain: Chain,
    action: Action,
    start: usize,
    limit: usize,
) -> Result<ActivitiesPage, AppError> {
    validate_page(start, limit)?;
    let big_tx = store.last_big_tx(chain, action, DEFAULT_ACTIVITY_CAP);
    Ok(join_activities(big_tx, &store.token_info(chain), start, limit))
}

/// Big transactions touching one token.
pub fn token_activities(
    store: &Store,
    chain: Chain,
    action: Action,
    token_address: &str,
    start: usize,
    limit: usize,
) -> Result<ActivitiesPage, AppError> {
    validate_page(start, limit)?;
    let big_tx = store.last_big_tx_for_token(chain, action, DEFAULT_ACTIVITY_CAP, token_address);
    Ok(join_activities(big_tx, &store.token_info(chain), start, limit))
}

/// Big transactions attributed to one user.
pub fn user_activities(
    store: &Store,
    chain: Chain,
    action: Action,
    user_address: &str,
    start: usize,
    limit: usize,
) -> Result<ActivitiesPage, AppError> {
    validate_page(start, limit)?;
    let big_tx = store.last_big_tx_for_user(chain, action, DEFAULT_ACTIVITY_CAP, user_address);
    Ok(join_activities(big_tx, &store.token_info(chain), start, limit))
}

// ---------------------------------------------------------------------------
// Leaderboard
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct LeaderboardEntry {
    pub user_address: String,
    pub net_profit: f64,
    pub current_largest_position: Token,
    pub most_token_buy: Token,
    pub most_token_sell: Token,
    pub last_trade: DateTime<Utc>,
}

/// Users ranked by 24-hour profit, each annotated from a single pass over
/// their 24-hour trade history.
pub fn leaderboard(
    store: &Store,
    chain: Chain,
    start: usize,
    limit: usize,
) -> Result<Vec<LeaderboardEntry>, AppError> {
    validate_page(start, limit)?;
    let window = store.trade_window(chain, DAY)?;

    let mut ranked: Vec<(String, f64)> = window.user_profit.into_iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    let span = page_span(start, limit, ranked.len());

    let info = store.token_info(chain);
    let from = Utc::now() - TimeDelta::hours(24);

    let mut entries = Vec::with_capacity(span.len());
    for (address, net_profit) in &ranked[span] {
        let trades = store.trade_logs_for_user(chain, from, address);
        let last_trade = trades.last().map(|t| t.block_ts).unwrap_or(from);

        let mut bought: HashMap<String, f64> = HashMap::new();
        let mut sold: HashMap<String, f64> = HashMap::new();
        let mut most_buy: (String, f64) = Default::default();
        let mut most_sell: (String, f64) = Default::default();
        let mut largest_position: (String, f64) = Default::default();

        for trade in &trades {
            let token_in = trade.token_in_address.to_lowercase();
            let token_out = trade.token_out_address.to_lowercase();
            let position_value = trade.current_token_out_usdt_rate * trade.token_out_amount;

            let bought_total = bought.entry(token_out.clone()).or_default();
            *bought_total += position_value;
            if most_buy.1 < *bought_total {
                most_buy = (trade.token_out_address.clone(), *bought_total);
            }

            let sold_total = sold.entry(token_in).or_default();
            *sold_total += trade.current_token_in_usdt_rate * trade.token_in_amount;
            if most_sell.1 < *sold_total {
                most_sell = (trade.token_in_address.clone(), *sold_total);
            }

            // Quote assets are cash legs, not positions.
            if !is_quote(&token_out) && largest_position.1 < position_value {
                largest_position = (trade.token_out_address.clone(), position_value);
            }
        }

        let lookup = |addr: &str| info.get(&addr.to_lowercase()).cloned().unwrap_or_default();
        entries.push(LeaderboardEntry {
            user_address: address.clone(),
            net_profit: *net_profit,
            current_largest_position: lookup(&largest_position.0),
            most_token_buy: lookup(&most_buy.0),
            most_token_sell: lookup(&most_sell.0),
            last_trade,
        });
    }

    Ok(entries)
}

// ---------------------------------------------------------------------------
// Inspect endpoints
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct BuySellInspect {
    pub in_flow_in_token: f64,
    pub in_flow_in_usdt: f64,
    pub out_flow_in_token: f64,
    pub out_flow_in_usdt: f64,
}

/// One token's buy/sell flow inside one window.
pub fn token_inspect_buy_sell(
    store: &Store,
    chain: Chain,
    duration: Duration,
    address: &str,
) -> Result<BuySellInspect, AppError> {
    let window = store.trade_window(chain, duration)?;
    let addr = address.to_lowercase();
    let flow = |map: &HashMap<String, f64>| map.get(&addr).copied().unwrap_or(0.0);
    Ok(BuySellInspect {
        in_flow_in_token: flow(&window.token_in_flow),
        in_flow_in_usdt: flow(&window.token_in_flow_usdt),
        out_flow_in_token: flow(&window.token_out_flow),
        out_flow_in_usdt: flow(&window.token_out_flow_usdt),
    })
}

#[derive(Debug, Serialize)]
pub struct DepositWithdrawInspect {
    pub cex_in_flow: f64,
    pub cex_in_flow_in_usdt: f64,
    pub cex_out_flow: f64,
    pub cex_out_flow_in_usdt: f64,
}

/// One token's exchange deposit/withdraw flow inside one window.
pub fn token_inspect_deposit_withdraw(
    store: &Store,
    chain: Chain,
    duration: Duration,
    address: &str,
) -> Result<DepositWithdrawInspect, AppError> {
    let window = store.transfer_window(chain, duration)?;
    let addr = address.to_lowercase();
    let flow = |map: &HashMap<String, f64>| map.get(&addr).copied().unwrap_or(0.0);
    Ok(DepositWithdrawInspect {
        cex_in_flow: flow(&window.cex_in_flow),
        cex_in_flow_in_usdt: flow(&window.cex_in_flow_usdt),
        cex_out_flow: flow(&window.cex_out_flow),
        cex_out_flow_in_usdt: flow(&window.cex_out_flow_usdt),
    })
}

/// Per-transaction profit summed over a user's trades inside `duration`.
pub fn user_tx_profit(
    store: &Store,
    chain: Chain,
    duration: Duration,
    address: &str,
) -> HashMap<String, f64> {
    let from = Utc::now() - TimeDelta::from_std(duration).unwrap_or(TimeDelta::zero());
    let mut tx_profit: HashMap<String, f64> = HashMap::new();
    for trade in store.trade_logs_for_user(chain, from, address) {
        if trade.current_rate_missing {
            continue;
        }
        *tx_profit.entry(trade.tx_hash).or_default() += trade.profit;
    }
    tx_profit
}

// ---------------------------------------------------------------------------
// Daily transfer series
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct DailyTransferPoint {
    pub date: String,
    pub deposit: f64,
    pub withdraw: f64,
}

/// The merged daily deposit/withdraw series for one token, keyed by date.
pub fn price_with_transfer(
    store: &Store,
    chain: Chain,
    address: &str,
) -> HashMap<String, DailyTransferPoint> {
    let (deposit, withdraw) = store.transfer_series(chain, &address.to_lowercase());
    deposit
        .into_iter()
        .map(|(date, amount)| {
            let point = DailyTransferPoint {
                date: date.clone(),
                deposit: amount,
                withdraw: withdraw.get(&date).copied().unwrap_or(0.0),
            };
            (date, point)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Token directory
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ListTokenEntry {
    pub symbol: String,
    #[serde(rename = "usdPrice")]
    pub usd_price: f64,
    #[serde(rename = "tokenAddress")]
    pub address: String,
    #[serde(rename = "chainId")]
    pub chain_id: String,
    #[serde(rename = "imageUrl")]
    pub image_url: String,
}

/// Search the observed token set by address or symbol substring.
pub fn list_tokens(store: &Store, chain: Chain, symbol_search: &str) -> Vec<ListTokenEntry> {
    let tokens = store.tokens(chain);
    let info = store.token_info(chain);
    let search = symbol_search.to_lowercase();

    let mut res = Vec::new();
    for address in tokens {
        let meta = info.get(&address).cloned().unwrap_or_default();
        let matched = search.is_empty()
            || address.contains(&search)
            || meta.symbol.to_lowercase().contains(&search);
        if matched && res.len() < LIST_TOKEN_LIMIT {
            res.push(ListTokenEntry {
                symbol: meta.symbol,
                usd_price: meta.usd_price,
                address: meta.address,
                chain_id: meta.chain_id,
                image_url: meta.image_url,
            });
        }
    }
    res
}

#[derive(Debug, Serialize)]
pub struct TrendingEntry {
    pub name: String,
    pub symbol: String,
    pub thumb: String,
    pub small: String,
    pub price: f64,
    pub market_cap: String,
    pub total_volume: String,
    pub price_change_percentage_24h: f64,
    pub address: String,
    pub chain_id: String,
}

/// The cached trending list, joined with a Base address where the symbol is
/// known locally.
pub fn trending_tokens(store: &Store) -> Vec<TrendingEntry> {
    let info = store.token_info(Chain::Base);
    let by_symbol: HashMap<&str, &Token> =
        info.values().map(|t| (t.symbol.as_str(), t)).collect();

    store
        .trending()
        .coins
        .iter()
        .map(|coin| {
            let item = &coin.item;
            let (address, chain_id) = match by_symbol.get(item.symbol.as_str()) {
                Some(t) if t.chain_id == Chain::Base.as_str() => {
                    (t.address.clone(), t.chain_id.clone())
                }
                _ => (String::new(), String::new()),
            };
            TrendingEntry {
                name: item.name.clone(),
                symbol: item.symbol.clone(),
                thumb: item.thumb.clone(),
                small: item.small.clone(),
                price: item.data.price,
                market_cap: item.data.market_cap.clone(),
                total_volume: item.data.total_volume.clone(),
                price_change_percentage_24h: item.data.price_change_percentage_24h.eur,
                address,
                chain_id,
            }
        })
        .collect()
}

/// CMC metadata for the token at `address`, resolved through its symbol.
pub fn token_info(store: &Store, chain: Chain, address: &str) -> CmcTokenInfo {
    let info = store.token_info(chain);
    let symbol = info
        .get(&address.to_lowercase())
        .map(|t| t.symbol.as_str())
        .unwrap_or_default();
    store.cmc_info(symbol).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// User balances
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct TokenBalanceEntry {
    pub symbol: String,
    #[serde(rename = "imageUrl")]
    pub image_url: String,
    pub amount: f64,
}

#[derive(Debug, Serialize)]
pub struct UserBalances {
    pub address: String,
    pub total_balance: f64,
    pub profit: f64,
    pub pnl_percent: f64,
    pub token_balances: Vec<TokenBalanceEntry>,
}

/// Join a balance snapshot with metadata; profit comes from the 24h window.
pub fn user_balances(
    store: &Store,
    chain: Chain,
    address: &str,
    balances: &[TokenBalance],
) -> Result<UserBalances, AppError> {
    let window = store.trade_window(chain, DAY)?;
    let profit = window
        .user_profit
        .get(&address.to_lowercase())
        .copied()
        .unwrap_or(0.0);

    let info = store.token_info(chain);
    let mut total_balance = 0.0;
    let token_balances = balances
        .iter()
        .map(|balance| {
            let meta = info.get(&balance.address.to_lowercase()).cloned().unwrap_or_default();
            total_balance += meta.usd_price * balance.amount;
            TokenBalanceEntry {
                symbol: meta.symbol,
                image_url: meta.image_url,
                amount: balance.amount,
            }
        })
        .collect();

    let pnl_percent = if total_balance > 0.0 {
        profit / total_balance * 100.0
    } else {
        0.0
    };

    Ok(UserBalances {
        address: address.to_string(),
        total_balance,
        profit,
        pnl_percent,
        token_balances,
    })
}

#[derive(Debug, Serialize)]
pub struct PortfolioPage {
    pub tokens: Vec<TokenBalanceEntry>,
    pub total: usize,
}

/// Paginate a raw balance snapshot joined with metadata.
pub fn user_portfolio(
    store: &Store,
    chain: Chain,
    balances: &[TokenBalance],
    start: usize,
    limit: usize,
) -> Result<PortfolioPage, AppError> {
    validate_page(start, limit)?;
    let info = store.token_info(chain);
    let tokens = balances[page_span(start, limit, balances.len())]
        .iter()
        .map(|balance| {
            let meta = info.get(&balance.address.to_lowercase()).cloned().unwrap_or_default();
            TokenBalanceEntry {
                symbol: meta.symbol,
                image_url: meta.image_url,
                amount: balance.amount,
            }
        })
        .collect();
    Ok(PortfolioPage {
        tokens,
        total: balances.len(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TradeLog, TransferLog};
    use chrono::TimeDelta;

    const USDC: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";
    const ZED: &str = "0xZedToken00000000000000000000000000000001";
    const HOUR: Duration = Duration::from_secs(3600);

    fn meta(address: &str, symbol: &str, price: f64) -> Token {
        Token {
            address: address.to_string(),
            symbol: symbol.to_string(),
            usd_price: price,
            chain_id: "base".to_string(),
            image_url: format!("https://img.example/{symbol}.png"),
            ..Default::default()
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn trade(
        block: u64,
        sender: &str,
        token_in: &str,
        in_amt: f64,
        token_out: &str,
        out_amt: f64,
        cur_in: f64,
        cur_out: f64,
    ) -> TradeLog {
        TradeLog {
            block_ts: Utc::now(),
            block_number: block,
            tx_hash: format!("0xtx{block}"),
            sender: sender.to_string(),
            token_in_address: token_in.to_string(),
            token_in_amount: in_amt,
            token_in_usdt_rate: cur_in,
            token_out_address: token_out.to_string(),
            token_out_amount: out_amt,
            token_out_usdt_rate: cur_out,
            native_usdt_rate: 3000.0,
            current_token_in_usdt_rate: cur_in,
            current_token_out_usdt_rate: cur_out,
            profit: 0.0,
            current_rate_missing: false,
        }
    }

    fn transfer(block: u64, token: &str, amount: f64, is_cex_in: bool, rate: f64) -> TransferLog {
        TransferLog {
            block_ts: Utc::now(),
            block_number: block,
            tx_hash: format!("0xtr{block}"),
            from_address: "0xFrom".to_string(),
            to_address: "0xTo".to_string(),
            token_address: token.to_string(),
            token_amount: amount,
            is_cex_in,
            current_token_usdt_rate: rate,
            current_rate_missing: false,
        }
    }

    #[test]
    fn page_span_clamps_and_empties_past_the_end() {
        assert_eq!(page_span(1, 10, 3), 0..3);
        assert_eq!(page_span(2, 2, 5), 2..4);
        assert_eq!(page_span(3, 2, 5), 4..5);
        assert_eq!(page_span(4, 10, 3), 3..3);
    }

    #[test]
    fn non_positive_pagination_is_malformed() {
        let store = Store::new();
        assert!(matches!(
            top_cex_in(&store, Chain::Base, HOUR, 0, 10),
            Err(AppError::MalformedRequest(_))
        ));
        assert!(matches!(
            leaderboard(&store, Chain::Base, 1, 0),
            Err(AppError::MalformedRequest(_))
        ));
    }

    #[test]
    fn top_cex_in_ranks_by_usd_and_joins_metadata() {
        let store = Store::new();
        store.set_token_info(&[meta(ZED, "ZED", 40.0), meta(USDC, "USDC", 1.0)]);
        store.add_transfer_logs(
            Chain::Base,
            vec![
                transfer(1, ZED, 10.0, true, 40.0),   // 400 USD in
                transfer(2, USDC, 900.0, true, 1.0),  // 900 USD in
                transfer(3, ZED, 1.0, false, 40.0),   // out flow, ignored here
            ],
        );

        let page = top_cex_in(&store, Chain::Base, HOUR, 1, 10).unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.entries.len(), 2);
        assert_eq!(page.entries[0].address, USDC.to_lowercase());
        assert_eq!(page.entries[0].value, 900.0);
        assert_eq!(page.entries[0].symbol, "USDC");
        assert_eq!(page.entries[1].symbol, "ZED");

        // A page past the end is empty, not an error.
        let empty = top_cex_in(&store, Chain::Base, HOUR, 5, 10).unwrap();
        assert!(empty.entries.is_empty());
        assert_eq!(empty.total, 2);
    }

    #[test]
    fn token_profit_reports_cost_basis_and_net_flow() {
        let store = Store::new();
        store.set_token_info(&[meta(ZED, "ZED", 60.0)]);
        // Buy 10 ZED at 50, ZED now 60: profit 100, in flow 10 / 500 USD.
        store.add_trade_logs(
            Chain::Base,
            vec![{
                let mut t = trade(1, "0xA", USDC, 500.0, ZED, 10.0, 1.0, 60.0);
                t.token_out_usdt_rate = 50.0;
                t.profit = (60.0 - 50.0) * 10.0;
                t
            }],
        );

        let ranked = top_token_profit(&store, Chain::Base, HOUR, 1, 10).unwrap();
        assert_eq!(ranked.len(), 1);
        let entry = &ranked[0];
        assert_eq!(entry.token.address, ZED.to_lowercase());
        assert_eq!(entry.gains, 100.0);
        assert_eq!(entry.avg_cost, 50.0);
        assert_eq!(entry.net_flow, 10.0);
    }

    #[test]
    fn leaderboard_largest_position_ignores_quote_tokens() {
        let store = Store::new();
        store.set_token_info(&[meta(ZED, "ZED", 5.0), meta(USDC, "USDC", 1.0)]);
        store.add_trade_logs(
            Chain::Base,
            vec![
                // Buys 10 USD of the quote token and 5 USD of ZED.
                {
                    let mut t = trade(1, "0xA", ZED, 2.0, USDC, 10.0, 5.0, 1.0);
                    t.profit = 1.0;
                    t
                },
                {
                    let mut t = trade(2, "0xA", USDC, 5.0, ZED, 1.0, 1.0, 5.0);
                    t.profit = 1.0;
                    t
                },
            ],
        );

        let entries = leaderboard(&store, Chain::Base, 1, 10).unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.user_address, "0xa");
        assert_eq!(entry.net_profit, 2.0);
        assert_eq!(
            entry.current_largest_position.address, ZED,
            "quote-token position must not win"
        );
        // Most bought by USD value is the 10 USD USDC leg.
        assert_eq!(entry.most_token_buy.address, USDC);
        assert_eq!(entry.last_trade, {
            let logs = store.trade_logs_for_user(
                Chain::Base,
                Utc::now() - TimeDelta::hours(24),
                "0xA",
            );
            logs.last().unwrap().block_ts
        });
    }

    #[test]
    fn activities_join_and_paginate() {
        let store = Store::new();
        store.set_token_info(&[meta(USDC, "USDC", 1.0)]);
        store.add_trade_logs(
            Chain::Base,
            vec![
                trade(10, "0xA", ZED, 600.0, USDC, 60_000.0, 100.0, 1.0),
                trade(11, "0xB", ZED, 700.0, USDC, 70_000.0, 100.0, 1.0),
            ],
        );

        let page = activities(&store, Chain::Base, Action::All, 1, 1).unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.activities.len(), 1);
        assert_eq!(page.activities[0].big_tx.block_number, 11);
        assert_eq!(page.activities[0].symbol, "USDC");

        let selling = activities(&store, Chain::Base, Action::Selling, 1, 10).unwrap();
        assert_eq!(selling.total, 2);
        let none = activities(&store, Chain::Base, Action::Deposit, 1, 10).unwrap();
        assert_eq!(none.total, 0);
    }

    #[test]
    fn user_tx_profit_sums_per_transaction() {
        let store = Store::new();
        let mut first = trade(1, "0xA", USDC, 10.0, ZED, 1.0, 1.0, 5.0);
        first.tx_hash = "0xsame".to_string();
        first.profit = 3.0;
        let mut second = trade(2, "0xA", USDC, 10.0, ZED, 1.0, 1.0, 5.0);
        second.tx_hash = "0xsame".to_string();
        second.profit = 4.0;
        store.add_trade_logs(Chain::Base, vec![first, second]);

        let profits = user_tx_profit(&store, Chain::Base, HOUR, "0xA");
        assert_eq!(profits.len(), 1);
        assert_eq!(profits["0xsame"], 7.0);
    }

    #[test]
    fn price_with_transfer_merges_series_on_deposit_dates() {
        let store = Store::new();
        store.add_transfer_logs(
            Chain::Base,
            vec![
                transfer(1, ZED, 3.0, true, 10.0),  // deposit series
                transfer(2, ZED, 2.0, false, 10.0), // withdraw series
            ],
        );

        let merged = price_with_transfer(&store, Chain::Base, ZED);
        assert_eq!(merged.len(), 1);
        let point = merged.values().next().unwrap();
        assert_eq!(point.deposit, 3.0);
        assert_eq!(point.withdraw, 2.0);
    }

    #[test]
    fn list_tokens_filters_by_symbol_or_address() {
        let store = Store::new();
        store.set_token_info(&[meta(ZED, "ZED", 5.0), meta(USDC, "USDC", 1.0)]);
        store.add_trade_logs(
            Chain::Base,
            vec![trade(1, "0xA", USDC, 5.0, ZED, 1.0, 1.0, 5.0)],
        );

        let all = list_tokens(&store, Chain::Base, "");
        assert_eq!(all.len(), 2);

        let zed = list_tokens(&store, Chain::Base, "zed");
        assert_eq!(zed.len(), 1);
        assert_eq!(zed[0].symbol, "ZED");

        let none = list_tokens(&store, Chain::Base, "doge");
        assert!(none.is_empty());
    }

    #[test]
    fn trending_attaches_known_base_addresses() {
        use crate::coingecko::{TrendingCoin, TrendingItem, TrendingList};

        let store = Store::new();
        store.set_token_info(&[meta(ZED, "ZED", 5.0)]);
        store.set_trending(TrendingList {
            coins: vec![
                TrendingCoin {
                    item: TrendingItem {
                        name: "Zed".into(),
                        symbol: "ZED".into(),
                        ..Default::default()
                    },
                },
                TrendingCoin {
                    item: TrendingItem {
                        name: "Elsewhere".into(),
                        symbol: "ELSE".into(),
                        ..Default::default()
                    },
                },
            ],
        });

        let trending = trending_tokens(&store);
        assert_eq!(trending.len(), 2);
        assert_eq!(trending[0].address, ZED);
        assert_eq!(trending[0].chain_id, "base");
        assert_eq!(trending[1].address, "");
    }

    #[test]
    fn user_balances_totals_and_pnl() {
        let store = Store::new();
        store.set_token_info(&[meta(ZED, "ZED", 5.0), meta(USDC, "USDC", 1.0)]);
        let mut t = trade(1, "0xA", USDC, 10.0, ZED, 1.0, 1.0, 5.0);
        t.profit = 10.0;
        store.add_trade_logs(Chain::Base, vec![t]);

        let balances = vec![
            TokenBalance {
                address: ZED.to_string(),
                amount: 3.0,
            },
            TokenBalance {
                address: USDC.to_string(),
                amount: 5.0,
            },
        ];
        let res = user_balances(&store, Chain::Base, "0xA", &balances).unwrap();
        assert_eq!(res.total_balance, 20.0);
        assert_eq!(res.profit, 10.0);
        assert_eq!(res.pnl_percent, 50.0);
        assert_eq!(res.token_balances.len(), 2);

        let page = user_portfolio(&store, Chain::Base, &balances, 1, 1).unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.tokens.len(), 1);
        assert_eq!(page.tokens[0].symbol, "ZED");
    }
}
