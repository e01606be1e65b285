//! Rolling-window aggregates over the trade and transfer event logs.
//!
//! A window never owns events. It holds per-key running sums plus an index
//! into the chain's append-only log marking the first event still inside
//! the window's duration. Absorbing and releasing an event touch exactly
//! the same map keys with opposite signs, so a retire undoes an add up to
//! float rounding.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::types::{TradeLog, TransferLog};

/// Position metadata shared by trade and transfer windows.
///
/// `start_index` is `None` until the window has absorbed its first event.
/// After a retire pass drains every live event it rests at the log length,
/// a legal past-the-end position: the next append lands at exactly that
/// index, so the window re-covers the log without relinking.
#[derive(Debug, Clone, Default)]
pub struct WindowIndex {
    pub start_index: Option<usize>,
    pub start_block: u64,
    pub start_block_ts: Option<DateTime<Utc>>,
    pub end_block: u64,
    pub end_block_ts: Option<DateTime<Utc>>,
}

impl WindowIndex {
    fn absorb(&mut self, block_number: u64, block_ts: DateTime<Utc>, position: usize) {
        self.end_block = block_number;
        self.end_block_ts = Some(block_ts);
        if self.start_index.is_none() {
            self.start_index = Some(position);
            self.start_block = block_number;
            self.start_block_ts = Some(block_ts);
        }
    }
}

/// Whether an event timestamped `ts` has aged out of a `duration` window.
///
/// Future-dated events never expire.
pub(crate) fn expired(now: DateTime<Utc>, ts: DateTime<Utc>, duration: Duration) -> bool {
    now.signed_duration_since(ts)
        .to_std()
        .map(|age| age > duration)
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Trade window
// ---------------------------------------------------------------------------

/// Rolling aggregates over swaps: profit by user and token, plus token
/// in/out flow in native units and USD. All keys are lower-cased addresses.
#[derive(Debug, Clone)]
pub struct TradeWindow {
    duration: Duration,

    pub user_profit: HashMap<String, f64>,
    pub token_profit: HashMap<String, f64>,

    pub token_in_flow: HashMap<String, f64>,
    pub token_in_flow_usdt: HashMap<String, f64>,

    pub token_out_flow: HashMap<String, f64>,
    pub token_out_flow_usdt: HashMap<String, f64>,

    pub index: WindowIndex,
}

impl TradeWindow {
    pub(crate) fn new(duration: Duration) -> Self {
        Self {
            duration,
            user_profit: HashMap::new(),
            token_profit: HashMap::new(),
            token_in_flow: HashMap::new(),
            token_in_flow_usdt: HashMap::new(),
            token_out_flow: HashMap::new(),
            token_out_flow_usdt: HashMap::new(),
            index: WindowIndex::default(),
        }
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub(crate) fn absorb(
        &mut self,
        log: &TradeLog,
        sender: &str,
        token_in: &str,
        token_out: &str,
        position: usize,
    ) {
        *self.user_profit.entry(sender.to_owned()).or_default() += log.profit;
        *self.token_profit.entry(token_out.to_owned()).or_default() += log.profit;

        *self.token_in_flow_usdt.entry(token_out.to_owned()).or_default() +=
            log.token_out_amount * log.token_out_usdt_rate;
        *self.token_in_flow.entry(token_out.to_owned()).or_default() += log.token_out_amount;

        *self.token_out_flow_usdt.entry(token_in.to_owned()).or_default() +=
            log.token_in_amount * log.token_in_usdt_rate;
        *self.token_out_flow.entry(token_in.to_owned()).or_default() += log.token_in_amount;

        self.index.absorb(log.block_number, log.block_ts, position);
    }

    /// Inverse of [`Self::absorb`]: same keys, opposite sign.
    pub(crate) fn release(&mut self, log: &TradeLog, sender: &str, token_in: &str, token_out: &str) {
        *self.user_profit.entry(sender.to_owned()).or_default() -= log.profit;
        *self.token_profit.entry(token_out.to_owned()).or_default() -= log.profit;

        *self.token_in_flow_usdt.entry(token_out.to_owned()).or_default() -=
            log.token_out_amount * log.token_out_usdt_rate;
        *self.token_in_flow.entry(token_out.to_owned()).or_default() -= log.token_out_amount;

        *self.token_out_flow_usdt.entry(token_in.to_owned()).or_default() -=
            log.token_in_amount * log.token_in_usdt_rate;
        *self.token_out_flow.entry(token_in.to_owned()).or_default() -= log.token_in_amount;
    }
}

// ---------------------------------------------------------------------------
// Transfer window
// ---------------------------------------------------------------------------

/// Rolling aggregates over CEX transfers: flow into and out of exchange
/// wallets per token, in native units and USD.
#[derive(Debug, Clone)]
pub struct TransferWindow {
    duration: Duration,

    pub cex_in_flow: HashMap<String, f64>,
    pub cex_in_flow_usdt: HashMap<String, f64>,

    pub cex_out_flow: HashMap<String, f64>,
    pub cex_out_flow_usdt: HashMap<String, f64>,

    pub index: WindowIndex,
}

impl TransferWindow {
    pub(crate) fn new(duration: Duration) -> Self {
        Self {
            duration,
            cex_in_flow: HashMap::new(),
            cex_in_flow_usdt: HashMap::new(),
            cex_out_flow: HashMap::new(),
            cex_out_flow_usdt: HashMap::new(),
            index: WindowIndex::default(),
        }
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub(crate) fn absorb(&mut self, log: &TransferLog, token: &str, position: usize) {
        let usdt = log.token_amount * log.current_token_usdt_rate;
        if log.is_cex_in {
            *self.cex_in_flow.entry(token.to_owned()).or_default() += log.token_amount;
            *self.cex_in_flow_usdt.entry(token.to_owned()).or_default() += usdt;
        } else {
            *self.cex_out_flow.entry(token.to_owned()).or_default() += log.token_amount;
            *self.cex_out_flow_usdt.entry(token.to_owned()).or_default() += usdt;
        }
        self.index.absorb(log.block_number, log.block_ts, position);
    }

    /// Inverse of [`Self::absorb`]: same keys, opposite sign.
    pub(crate) fn release(&mut self, log: &TransferLog, token: &str) {
        let usdt = log.token_amount * log.current_token_usdt_rate;
        if log.is_cex_in {
            *self.cex_in_flow.entry(token.to_owned()).or_default() -= log.token_amount;
            *self.cex_in_flow_usdt.entry(token.to_owned()).or_default() -= usdt;
        } else {
            *self.cex_out_flow.entry(token.to_owned()).or_default() -= log.token_amount;
            *self.cex_out_flow_usdt.entry(token.to_owned()).or_default() -= usdt;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn trade(block: u64, ts: DateTime<Utc>) -> TradeLog {
        TradeLog {
            block_ts: ts,
            block_number: block,
            tx_hash: format!("0xtx{block}"),
            sender: "0xAbc".to_string(),
            token_in_address: "0xIn".to_string(),
            token_in_amount: 100.0,
            token_in_usdt_rate: 2.0,
            token_out_address: "0xOut".to_string(),
            token_out_amount: 40.0,
            token_out_usdt_rate: 5.0,
            native_usdt_rate: 3000.0,
            current_token_in_usdt_rate: 2.1,
            current_token_out_usdt_rate: 5.5,
            profit: 10.0,
            current_rate_missing: false,
        }
    }

    #[test]
    fn absorb_then_release_restores_sums() {
        let now = Utc::now();
        let mut w = TradeWindow::new(Duration::from_secs(3600));
        let log = trade(7, now);

        w.absorb(&log, "0xabc", "0xin", "0xout", 0);
        assert_eq!(w.user_profit["0xabc"], 10.0);
        assert_eq!(w.token_in_flow["0xout"], 40.0);
        assert_eq!(w.token_in_flow_usdt["0xout"], 200.0);
        assert_eq!(w.token_out_flow["0xin"], 100.0);
        assert_eq!(w.token_out_flow_usdt["0xin"], 200.0);
        assert_eq!(w.index.start_index, Some(0));
        assert_eq!(w.index.end_block, 7);

        w.release(&log, "0xabc", "0xin", "0xout");
        for map in [&w.user_profit, &w.token_profit, &w.token_in_flow, &w.token_out_flow] {
            for value in map.values() {
                assert!(value.abs() < 1e-12);
            }
        }
    }

    #[test]
    fn start_index_links_only_on_first_event() {
        let now = Utc::now();
        let mut w = TradeWindow::new(Duration::from_secs(3600));
        w.absorb(&trade(1, now), "0xabc", "0xin", "0xout", 4);
        w.absorb(&trade(2, now), "0xabc", "0xin", "0xout", 5);
        assert_eq!(w.index.start_index, Some(4));
        assert_eq!(w.index.start_block, 1);
        assert_eq!(w.index.end_block, 2);
    }

    #[test]
    fn expiry_is_chronological_only() {
        let now = Utc::now();
        let hour = Duration::from_secs(3600);
        assert!(expired(now, now - TimeDelta::seconds(3601), hour));
        assert!(!expired(now, now - TimeDelta::seconds(3599), hour));
        // Events stamped in the future are never expired.
        assert!(!expired(now, now + TimeDelta::seconds(120), hour));
    }
}
