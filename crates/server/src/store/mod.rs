//! The in-memory aggregation engine.
//!
//! One [`Store`] owns every piece of derived state: the append-only trade
//! and transfer logs per chain, five rolling windows per stream, the
//! big-transaction log, the observed-token set, the per-token daily
//! deposit/withdraw series, the reference-price snapshot, the symbol
//! metadata map and the trending list.
//!
//! A single reader/writer lock guards all of it. Writers (the ingester and
//! the refreshers) take the exclusive lock; query paths take the shared
//! lock and hand back copies, so nothing escapes the critical section by
//! reference. Event logs are never truncated; windows retire entries by
//! advancing their start index, not by touching the log.

mod window;

pub use window::{TradeWindow, TransferWindow, WindowIndex};

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, Datelike, Utc};
use tracing::debug;

use crate::coingecko::TrendingList;
use crate::constants::{is_quote, BIG_VOLUME_USD};
use crate::errors::AppError;
use crate::types::{Action, BigTx, Chain, CmcTokenInfo, CmcTokens, Token, TradeLog, TransferLog};

use window::expired;

/// The five rolling-window durations maintained per stream.
pub const WINDOW_DURATIONS: [Duration; 5] = [
    Duration::from_secs(60 * 60),
    Duration::from_secs(4 * 60 * 60),
    Duration::from_secs(24 * 60 * 60),
    Duration::from_secs(7 * 24 * 60 * 60),
    Duration::from_secs(30 * 24 * 60 * 60),
];

/// Daily-series key in the block timestamp's calendar: `d-m-yyyy`,
/// no zero padding.
fn day_key(ts: DateTime<Utc>) -> String {
    format!("{}-{}-{}", ts.day(), ts.month(), ts.year())
}

/// Everything the engine tracks for one chain.
struct ChainData {
    trade_logs: Vec<TradeLog>,
    transfer_logs: Vec<TransferLog>,
    addr_to_token: HashMap<String, Token>,
    trade_windows: Vec<TradeWindow>,
    transfer_windows: Vec<TransferWindow>,
    tokens: HashSet<String>,
    big_tx: Vec<BigTx>,
    token_deposit: HashMap<String, HashMap<String, f64>>,
    token_withdraw: HashMap<String, HashMap<String, f64>>,
}

impl ChainData {
    fn new() -> Self {
        Self {
            trade_logs: Vec::new(),
            transfer_logs: Vec::new(),
            addr_to_token: HashMap::new(),
            trade_windows: WINDOW_DURATIONS.iter().map(|d| TradeWindow::new(*d)).collect(),
            transfer_windows: WINDOW_DURATIONS
                .iter()
                .map(|d| TransferWindow::new(*d))
                .collect(),
            tokens: HashSet::new(),
            big_tx: Vec::new(),
            token_deposit: HashMap::new(),
            token_withdraw: HashMap::new(),
        }
    }
}

struct StoreInner {
    /// Current USD rate per lower-cased token address, all chains.
    token_usdt_rate: HashMap<String, f64>,
    /// Symbol-keyed market metadata; first writer wins per symbol.
    symbol_to_info: HashMap<String, CmcTokenInfo>,
    trending: TrendingList,
    chains: HashMap<Chain, ChainData>,
}

impl StoreInner {
    fn chain(&self, chain: Chain) -> &ChainData {
        self.chains
            .get(&chain)
            .expect("every chain variant is registered at construction")
    }

    fn chain_mut(&mut self, chain: Chain) -> &mut ChainData {
        self.chains
            .get_mut(&chain)
            .expect("every chain variant is registered at construction")
    }
}

/// The aggregation engine. Cheap to share behind an `Arc`.
pub struct Store {
    inner: RwLock<StoreInner>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        let mut chains = HashMap::new();
        chains.insert(Chain::Base, ChainData::new());
        Self {
            inner: RwLock::new(StoreInner {
                token_usdt_rate: HashMap::new(),
                symbol_to_info: HashMap::new(),
                trending: TrendingList::default(),
                chains,
            }),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, StoreInner> {
        self.inner.read().expect("store lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().expect("store lock poisoned")
    }

    // -----------------------------------------------------------------------
    // Appends
    // -----------------------------------------------------------------------

    /// Append enriched trade logs in order, updating every trade window and
    /// the big-transaction log atomically with respect to readers.
    ///
    /// Records flagged with a missing current rate contribute their token
    /// addresses to the observed set and nothing else.
    pub fn add_trade_logs(&self, chain: Chain, logs: Vec<TradeLog>) {
        let mut inner = self.write();
        let data = inner.chain_mut(chain);

        for log in logs {
            let token_in = log.token_in_address.to_lowercase();
            let token_out = log.token_out_address.to_lowercase();
            let sender = log.sender.to_lowercase();

            data.tokens.insert(token_in.clone());
            data.tokens.insert(token_out.clone());
            if log.current_rate_missing {
                continue;
            }

            let value_in_usdt = log.token_out_amount * log.token_out_usdt_rate;
            if value_in_usdt >= BIG_VOLUME_USD {
                // Swapping into a quote asset means the non-quote side was sold.
                let action = if is_quote(&log.token_out_address) {
                    Action::Selling
                } else {
                    Action::Buying
                };
                data.big_tx.push(BigTx {
                    tx: log.tx_hash.clone(),
                    token_address: log.token_out_address.clone(),
                    block_ts: log.block_ts,
                    block_number: log.block_number,
                    sender: log.sender.clone(),
                    value_in_token: log.token_out_amount,
                    value_in_usdt,
                    price: log.token_out_usdt_rate,
                    action,
                });
            }

            let position = data.trade_logs.len();
            for w in &mut data.trade_windows {
                w.absorb(&log, &sender, &token_in, &token_out, position);
            }
            data.trade_logs.push(log);
        }

        debug!(chain = %chain, total = data.trade_logs.len(), "trade logs appended");
    }

    /// Append enriched transfer logs in order; the transfer analogue of
    /// [`Self::add_trade_logs`], additionally feeding the per-token daily
    /// deposit/withdraw series.
    pub fn add_transfer_logs(&self, chain: Chain, logs: Vec<TransferLog>) {
        let mut inner = self.write();
        let data = inner.chain_mut(chain);

        for log in logs {
            let token = log.token_address.to_lowercase();

            data.tokens.insert(token.clone());
            if log.current_rate_missing {
                continue;
            }

            let value_in_usdt = log.token_amount * log.current_token_usdt_rate;
            if value_in_usdt >= BIG_VOLUME_USD {
                // is_cex_in means funds left the exchange: a withdrawal whose
                // interesting party is the on-chain sender.
                let (action, sender) = if log.is_cex_in {
                    (Action::Withdraw, log.from_address.clone())
                } else {
                    (Action::Deposit, log.to_address.clone())
                };
                data.big_tx.push(BigTx {
                    tx: log.tx_hash.clone(),
                    token_address: log.token_address.clone(),
                    block_ts: log.block_ts,
                    block_number: log.block_number,
                    sender,
                    value_in_token: log.token_amount,
                    value_in_usdt,
                    price: log.current_token_usdt_rate,
                    action,
                });
            }

            let position = data.transfer_logs.len();
            for w in &mut data.transfer_windows {
                w.absorb(&log, &token, position);
            }

            let date = day_key(log.block_ts);
            let series = if log.is_cex_in {
                &mut data.token_deposit
            } else {
                &mut data.token_withdraw
            };
            *series
                .entry(token)
                .or_default()
                .entry(date)
                .or_default() += log.token_amount;

            data.transfer_logs.push(log);
        }

        debug!(chain = %chain, total = data.transfer_logs.len(), "transfer logs appended");
    }

    // -----------------------------------------------------------------------
    // Retirement
    // -----------------------------------------------------------------------

    /// Retire trades that have aged past each window's duration, subtracting
    /// their contributions and advancing the window's start index. O(retired)
    /// per call; the event log itself is untouched.
    pub fn evict_expired_trades(&self, chain: Chain) {
        let now = Utc::now();
        let mut inner = self.write();
        let data = inner.chain_mut(chain);
        let ChainData {
            trade_logs,
            trade_windows,
            ..
        } = data;

        for w in trade_windows.iter_mut() {
            let Some(start) = w.index.start_index else {
                // Window never populated for this duration.
                continue;
            };
            let mut cursor = start;
            while cursor < trade_logs.len()
                && expired(now, trade_logs[cursor].block_ts, w.duration())
            {
                let log = &trade_logs[cursor];
                let sender = log.sender.to_lowercase();
                let token_in = log.token_in_address.to_lowercase();
                let token_out = log.token_out_address.to_lowercase();
                w.release(log, &sender, &token_in, &token_out);
                cursor += 1;
            }
            if cursor > start {
                debug!(
                    chain = %chain,
                    old_index = start,
                    new_index = cursor,
                    log_len = trade_logs.len(),
                    window = ?w.duration(),
                    "retired expired trades"
                );
                w.index.start_index = Some(cursor);
                if let Some(next) = trade_logs.get(cursor) {
                    w.index.start_block = next.block_number;
                    w.index.start_block_ts = Some(next.block_ts);
                }
            }
        }
    }

    /// Transfer analogue of [`Self::evict_expired_trades`].
    pub fn evict_expired_transfers(&self, chain: Chain) {
        let now = Utc::now();
        let mut inner = self.write();
        let data = inner.chain_mut(chain);
        let ChainData {
            transfer_logs,
            transfer_windows,
            ..
        } = data;

        for w in transfer_windows.iter_mut() {
            let Some(start) = w.index.start_index else {
                continue;
            };
            let mut cursor = start;
            while cursor < transfer_logs.len()
                && expired(now, transfer_logs[cursor].block_ts, w.duration())
            {
                let log = &transfer_logs[cursor];
                let token = log.token_address.to_lowercase();
                w.release(log, &token);
                cursor += 1;
            }
            if cursor > start {
                debug!(
                    chain = %chain,
                    old_index = start,
                    new_index = cursor,
                    log_len = transfer_logs.len(),
                    window = ?w.duration(),
                    "retired expired transfers"
                );
                w.index.start_index = Some(cursor);
                if let Some(next) = transfer_logs.get(cursor) {
                    w.index.start_block = next.block_number;
                    w.index.start_block_ts = Some(next.block_ts);
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Window reads
    // -----------------------------------------------------------------------

    /// The trade window matching `duration` exactly, by value.
    pub fn trade_window(&self, chain: Chain, duration: Duration) -> Result<TradeWindow, AppError> {
        self.read()
            .chain(chain)
            .trade_windows
            .iter()
            .find(|w| w.duration() == duration)
            .cloned()
            .ok_or(AppError::InvalidDuration(duration))
    }

    /// The transfer window matching `duration` exactly, by value.
    pub fn transfer_window(
        &self,
        chain: Chain,
        duration: Duration,
    ) -> Result<TransferWindow, AppError> {
        self.read()
            .chain(chain)
            .transfer_windows
            .iter()
            .find(|w| w.duration() == duration)
            .cloned()
            .ok_or(AppError::InvalidDuration(duration))
    }

    pub fn token_in_flow(
        &self,
        chain: Chain,
        duration: Duration,
    ) -> Result<HashMap<String, f64>, AppError> {
        Ok(self.trade_window(chain, duration)?.token_in_flow)
    }

    pub fn token_in_flow_usdt(
        &self,
        chain: Chain,
        duration: Duration,
    ) -> Result<HashMap<String, f64>, AppError> {
        Ok(self.trade_window(chain, duration)?.token_in_flow_usdt)
    }

    pub fn token_out_flow(
        &self,
        chain: Chain,
        duration: Duration,
    ) -> Result<HashMap<String, f64>, AppError> {
        Ok(self.trade_window(chain, duration)?.token_out_flow)
    }

    pub fn token_out_flow_usdt(
        &self,
        chain: Chain,
        duration: Duration,
    ) -> Result<HashMap<String, f64>, AppError> {
        Ok(self.trade_window(chain, duration)?.token_out_flow_usdt)
    }

    // -----------------------------------------------------------------------
    // Log scans (heavy: O(log length))
    // -----------------------------------------------------------------------

    /// Trades at or after `from` whose sender matches `user`
    /// case-insensitively.
    pub fn trade_logs_for_user(
        &self,
        chain: Chain,
        from: DateTime<Utc>,
        user: &str,
    ) -> Vec<TradeLog> {
        self.read()
            .chain(chain)
            .trade_logs
            .iter()
            .filter(|t| t.block_ts >= from && t.sender.eq_ignore_ascii_case(user))
            .cloned()
            .collect()
    }

    /// Trades at or after `from` touching `token` on either side of the swap.
    pub fn trade_logs_for_token(
        &self,
        chain: Chain,
        from: DateTime<Utc>,
        token: &str,
    ) -> Vec<TradeLog> {
        self.read()
            .chain(chain)
            .trade_logs
            .iter()
            .filter(|t| {
                t.block_ts >= from
                    && (t.token_in_address.eq_ignore_ascii_case(token)
                        || t.token_out_address.eq_ignore_ascii_case(token))
            })
            .cloned()
            .collect()
    }

    /// Transfers at or after `from` moving `token`.
    pub fn transfer_logs_for_token(
        &self,
        chain: Chain,
        from: DateTime<Utc>,
        token: &str,
    ) -> Vec<TransferLog> {
        self.read()
            .chain(chain)
            .transfer_logs
            .iter()
            .filter(|t| t.block_ts >= from && t.token_address.eq_ignore_ascii_case(token))
            .cloned()
            .collect()
    }

    // -----------------------------------------------------------------------
    // Big-transaction reads
    // -----------------------------------------------------------------------

    fn collect_big_tx(
        &self,
        chain: Chain,
        action: Action,
        last: usize,
        keep: impl Fn(&BigTx) -> bool,
    ) -> Vec<BigTx> {
        let inner = self.read();
        let mut res: Vec<BigTx> = inner
            .chain(chain)
            .big_tx
            .iter()
            .rev()
            .filter(|t| keep(t) && (action == Action::All || action == t.action))
            .cloned()
            .collect();
        res.sort_by(|a, b| b.block_number.cmp(&a.block_number));
        if last > 0 && res.len() > last {
            res.truncate(last);
        }
        res
    }

    /// Newest-first big transactions filtered by action. `last > 0` caps the
    /// result after sorting; `0` means unbounded.
    pub fn last_big_tx(&self, chain: Chain, action: Action, last: usize) -> Vec<BigTx> {
        self.collect_big_tx(chain, action, last, |_| true)
    }

    pub fn last_big_tx_for_token(
        &self,
        chain: Chain,
        action: Action,
        last: usize,
        token_address: &str,
    ) -> Vec<BigTx> {
        self.collect_big_tx(chain, action, last, |t| {
            t.token_address.eq_ignore_ascii_case(token_address)
        })
    }

    pub fn last_big_tx_for_user(
        &self,
        chain: Chain,
        action: Action,
        last: usize,
        user_address: &str,
    ) -> Vec<BigTx> {
        self.collect_big_tx(chain, action, last, |t| {
            t.sender.eq_ignore_ascii_case(user_address)
        })
    }

    // -----------------------------------------------------------------------
    // Daily series / token set
    // -----------------------------------------------------------------------

    /// The `(deposit, withdraw)` daily series for a lower-cased token
    /// address, keyed `d-m-yyyy`.
    pub fn transfer_series(
        &self,
        chain: Chain,
        token: &str,
    ) -> (HashMap<String, f64>, HashMap<String, f64>) {
        let inner = self.read();
        let data = inner.chain(chain);
        (
            data.token_deposit.get(token).cloned().unwrap_or_default(),
            data.token_withdraw.get(token).cloned().unwrap_or_default(),
        )
    }

    /// Every token address ever observed on the chain, lower-cased.
    pub fn tokens(&self, chain: Chain) -> Vec<String> {
        self.read().chain(chain).tokens.iter().cloned().collect()
    }

    // -----------------------------------------------------------------------
    // Reference prices and metadata
    // -----------------------------------------------------------------------

    /// Replace rates for the given tokens; keys are lower-cased.
    pub fn set_token_rates(&self, rates: &[Token]) {
        let mut inner = self.write();
        for rate in rates {
            inner
                .token_usdt_rate
                .insert(rate.address.to_lowercase(), rate.usd_price);
        }
    }

    /// Snapshot of the current USD rate map.
    pub fn token_rates(&self) -> HashMap<String, f64> {
        self.read().token_usdt_rate.clone()
    }

    /// Record per-address metadata for tokens belonging to a known chain.
    pub fn set_token_info(&self, tokens: &[Token]) {
        let mut inner = self.write();
        for token in tokens {
            if token.chain_id == Chain::Base.as_str() {
                inner
                    .chain_mut(Chain::Base)
                    .addr_to_token
                    .insert(token.address.to_lowercase(), token.clone());
            }
        }
    }

    /// Snapshot of the per-address metadata map.
    pub fn token_info(&self, chain: Chain) -> HashMap<String, Token> {
        self.read().chain(chain).addr_to_token.clone()
    }

    /// Merge symbol metadata. An existing entry for a symbol is never
    /// overwritten: the first snapshot a symbol appeared in stays canonical.
    pub fn set_cmc_tokens(&self, tokens: &CmcTokens) {
        let mut inner = self.write();
        for t in &tokens.tokens {
            inner
                .symbol_to_info
                .entry(t.symbol.clone())
                .or_insert_with(|| t.clone());
        }
    }

    pub fn cmc_info(&self, symbol: &str) -> Option<CmcTokenInfo> {
        self.read().symbol_to_info.get(symbol).cloned()
    }

    /// Replace the trending snapshot wholesale.
    pub fn set_trending(&self, trending: TrendingList) {
        self.write().trending = trending;
    }

    pub fn trending(&self) -> TrendingList {
        self.read().trending.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
