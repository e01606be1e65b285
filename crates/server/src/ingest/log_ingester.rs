//! Pulls trade and transfer rows out of the source database and feeds the
//! aggregation engine.
//!
//! Startup runs a bounded backfill per stream: the watermark is advanced to
//! `max_block - max_range_block` when the table is further ahead, then pages
//! of up to [`PAGE_SIZE`] rows are accumulated with `block_number >=
//! watermark`. Because paging is inclusive, rows of the block straddling a
//! page edge are fetched twice; the accumulated tail is trimmed before each
//! page is appended. The steady phase polls with a strict `> watermark`
//! (watermark + 1) and retires expired window entries once per tick.
//!
//! Rows whose current reference rate is unknown are dropped at enrichment
//! and never reach the engine.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::constants::PAGE_SIZE;
use crate::db::{Database, TradeRow, TransferRow, TRADE_TABLE, TRANSFER_TABLE};
use crate::store::Store;
use crate::types::{Chain, TradeLog, TransferLog};

pub struct LogIngester {
    db: Arc<dyn Database>,
    store: Arc<Store>,
    poll: Duration,
    max_range_block: i64,
    last_trade_block: i64,
    last_transfer_block: i64,
}

impl LogIngester {
    pub fn new(
        db: Arc<dyn Database>,
        store: Arc<Store>,
        poll: Duration,
        from_block: i64,
        max_range_block: i64,
    ) -> Self {
        Self {
            db,
            store,
            poll,
            max_range_block,
            last_trade_block: from_block,
            last_transfer_block: from_block,
        }
    }

    /// Backfill both streams, then poll until shutdown.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let started = Instant::now();
        self.backfill_trades().await;
        self.backfill_transfers().await;
        info!(elapsed = ?started.elapsed(), "initial backfill complete");

        let mut ticker = interval(self.poll);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick().await,
                _ = shutdown.cancelled() => {
                    debug!("log ingester shutting down");
                    return;
                }
            }
        }
    }

    async fn tick(&mut self) {
        let started = Instant::now();
        self.poll_new_trades().await;
        self.poll_new_transfers().await;
        self.store.evict_expired_trades(Chain::Base);
        self.store.evict_expired_transfers(Chain::Base);
        debug!(elapsed = ?started.elapsed(), "ingest tick complete");
    }

    // -----------------------------------------------------------------------
    // Initial backfill
    // -----------------------------------------------------------------------

    async fn backfill_trades(&mut self) {
        let max_block = match self.db.max_block_number(TRADE_TABLE).await {
            Ok(block) => block,
            Err(e) => {
                error!(error = %e, "failed to read trade high-water block");
                0
            }
        };
        if max_block - self.max_range_block > self.last_trade_block {
            self.last_trade_block = max_block - self.max_range_block;
        }

        let mut rows: Vec<TradeRow> = Vec::new();
        loop {
            let page = match self.db.trades(self.last_trade_block, PAGE_SIZE).await {
                Ok(page) => page,
                Err(e) => {
                    error!(
                        error = %e,
                        from_block = self.last_trade_block,
                        "trade backfill page failed"
                    );
                    return;
                }
            };
            info!(
                max_block,
                from_block = self.last_trade_block,
                page_len = page.len(),
                "trade backfill page"
            );
            let Some(last_row) = page.last() else { break };
            self.last_trade_block = last_row.block_number;

            // The first block of this page was also the tail of the previous
            // one; drop the duplicates before appending.
            let boundary = page[0].block_number;
            while rows.last().is_some_and(|r| r.block_number == boundary) {
                rows.pop();
            }
            rows.extend(page);

            if self.last_trade_block >= max_block {
                break;
            }
        }

        let logs = self.enrich_trades(rows);
        self.store.add_trade_logs(Chain::Base, logs);
    }

    async fn backfill_transfers(&mut self) {
        let max_block = match self.db.max_block_number(TRANSFER_TABLE).await {
            Ok(block) => block,
            Err(e) => {
                error!(error = %e, "failed to read transfer high-water block");
                0
            }
        };
        if max_block - self.max_range_block > self.last_transfer_block {
            self.last_transfer_block = max_block - self.max_range_block;
        }

        let mut rows: Vec<TransferRow> = Vec::new();
        loop {
            let page = match self.db.transfers(self.last_transfer_block, PAGE_SIZE).await {
                Ok(page) => page,
                Err(e) => {
                    error!(
                        error = %e,
                        from_block = self.last_transfer_block,
                        "transfer backfill page failed"
                    );
                    return;
                }
            };
            info!(
                max_block,
                from_block = self.last_transfer_block,
                page_len = page.len(),
                "transfer backfill page"
            );
            let Some(last_row) = page.last() else { break };
            self.last_transfer_block = last_row.block_number;

            let boundary = page[0].block_number;
            while rows.last().is_some_and(|r| r.block_number == boundary) {
                rows.pop();
            }
            rows.extend(page);

            if self.last_transfer_block >= max_block {
                break;
            }
        }

        let logs = self.enrich_transfers(rows);
        self.store.add_transfer_logs(Chain::Base, logs);
    }

    // -----------------------------------------------------------------------
    // Steady polling
    // -----------------------------------------------------------------------

    async fn poll_new_trades(&mut self) {
        let new_trades = match self.db.trades(self.last_trade_block + 1, PAGE_SIZE).await {
            Ok(rows) => rows,
            Err(e) => {
                error!(error = %e, from_block = self.last_trade_block + 1, "trade poll failed");
                return;
            }
        };
        debug!(
            from_block = self.last_trade_block + 1,
            fetched = new_trades.len(),
            "polled new trades"
        );
        let Some(last_row) = new_trades.last() else {
            return;
        };
        self.last_trade_block = last_row.block_number;

        let logs = self.enrich_trades(new_trades);
        self.store.add_trade_logs(Chain::Base, logs);
    }

    async fn poll_new_transfers(&mut self) {
        let new_transfers = match self
            .db
            .transfers(self.last_transfer_block + 1, PAGE_SIZE)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                error!(
                    error = %e,
                    from_block = self.last_transfer_block + 1,
                    "transfer poll failed"
                );
                return;
            }
        };
        debug!(
            from_block = self.last_transfer_block + 1,
            fetched = new_transfers.len(),
            "polled new transfers"
        );
        let Some(last_row) = new_transfers.last() else {
            return;
        };
        self.last_transfer_block = last_row.block_number;

        let logs = self.enrich_transfers(new_transfers);
        self.store.add_transfer_logs(Chain::Base, logs);
    }

    // -----------------------------------------------------------------------
    // Enrichment
    // -----------------------------------------------------------------------

    /// Attach current rates and profit. Rows with no current rate for either
    /// side are dropped here; a later price refresh does not resurrect them.
    fn enrich_trades(&self, rows: Vec<TradeRow>) -> Vec<TradeLog> {
        let rates = self.store.token_rates();
        let mut logs = Vec::with_capacity(rows.len());
        for row in rows {
            let current_in = rates.get(&row.token_in_address.to_lowercase()).copied();
            let current_out = rates.get(&row.token_out_address.to_lowercase()).copied();
            let (Some(current_in), Some(current_out)) = (current_in, current_out) else {
                continue;
            };

            let mut log = row.into_log();
            let profit_in = (current_in - log.token_in_usdt_rate) * log.token_in_amount;
            let profit_out = (current_out - log.token_out_usdt_rate) * log.token_out_amount;
            log.current_token_in_usdt_rate = current_in;
            log.current_token_out_usdt_rate = current_out;
            log.profit = profit_out - profit_in;
            logs.push(log);
        }
        logs
    }

    fn enrich_transfers(&self, rows: Vec<TransferRow>) -> Vec<TransferLog> {
        let rates = self.store.token_rates();
        let mut logs = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(&current) = rates.get(&row.token_address.to_lowercase()) else {
                continue;
            };
            let mut log = row.into_log();
            log.current_token_usdt_rate = current;
            logs.push(log);
        }
        logs
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration as StdDuration;

    use async_trait::async_trait;
    use chrono::{TimeDelta, Utc};

    use crate::errors::AppError;
    use crate::types::Token;

    const USDC: &str = "0xusdc00000000000000000000000000000000c0de";
    const ZED: &str = "0xzed000000000000000000000000000000000c0de";

    /// Scripted source: hands out trade pages in order, records the
    /// `from_block` of every call.
    struct ScriptedDb {
        max_trade_block: i64,
        max_transfer_block: i64,
        trade_pages: Mutex<VecDeque<Vec<TradeRow>>>,
        trade_calls: Mutex<Vec<i64>>,
        transfer_pages: Mutex<VecDeque<Vec<TransferRow>>>,
    }

    impl ScriptedDb {
        fn trades_only(max_block: i64, pages: Vec<Vec<TradeRow>>) -> Self {
            Self {
                max_trade_block: max_block,
                max_transfer_block: 0,
                trade_pages: Mutex::new(pages.into()),
                trade_calls: Mutex::new(Vec::new()),
                transfer_pages: Mutex::new(VecDeque::new()),
            }
        }
    }

    #[async_trait]
    impl Database for ScriptedDb {
        async fn max_block_number(&self, table: &str) -> Result<i64, AppError> {
            Ok(match table {
                TRADE_TABLE => self.max_trade_block,
                _ => self.max_transfer_block,
            })
        }

        async fn trades(&self, from_block: i64, _limit: i64) -> Result<Vec<TradeRow>, AppError> {
            self.trade_calls.lock().unwrap().push(from_block);
            Ok(self
                .trade_pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_default())
        }

        async fn transfers(
            &self,
            _from_block: i64,
            _limit: i64,
        ) -> Result<Vec<TransferRow>, AppError> {
            Ok(self
                .transfer_pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_default())
        }
    }

    fn trade_row(block: i64) -> TradeRow {
        TradeRow {
            block_timestamp: Utc::now() - TimeDelta::seconds(60),
            block_number: block,
            tx_hash: format!("0x{block}"),
            sender: "0xsender".to_string(),
            token_in_address: USDC.to_string(),
            token_in_amount: 100.0,
            token_in_usdt_rate: 1.0,
            token_out_address: ZED.to_string(),
            token_out_amount: 10.0,
            token_out_usdt_rate: 10.0,
            native_usdt_rate: 3000.0,
        }
    }

    fn store_with_rates() -> Arc<Store> {
        let store = Arc::new(Store::new());
        store.set_token_rates(&[
            Token {
                address: USDC.to_string(),
                usd_price: 1.0,
                ..Default::default()
            },
            Token {
                address: ZED.to_string(),
                usd_price: 12.0,
                ..Default::default()
            },
        ]);
        store
    }

    #[tokio::test]
    async fn backfill_deduplicates_page_boundaries() {
        // A block straddles the page edge: block 11 appears at the tail of
        // page one and the head of page two.
        let pages = vec![
            vec![trade_row(10), trade_row(10), trade_row(11)],
            vec![trade_row(11), trade_row(11), trade_row(12)],
        ];
        let db = Arc::new(ScriptedDb::trades_only(12, pages));
        let store = store_with_rates();
        let mut ingester = LogIngester::new(
            db.clone(),
            store.clone(),
            StdDuration::from_secs(3),
            0,
            1_000_000,
        );

        ingester.backfill_trades().await;

        let from = Utc::now() - TimeDelta::days(1);
        let logs = store.trade_logs_for_user(Chain::Base, from, "0xsender");
        let blocks: Vec<u64> = logs.iter().map(|l| l.block_number).collect();
        assert_eq!(blocks, vec![10, 10, 11, 11, 12]);
        assert_eq!(ingester.last_trade_block, 12);
    }

    #[tokio::test]
    async fn backfill_caps_watermark_to_max_range() {
        let pages = vec![vec![trade_row(9_500), trade_row(10_000)]];
        let db = Arc::new(ScriptedDb::trades_only(10_000, pages));
        let store = store_with_rates();
        let mut ingester =
            LogIngester::new(db.clone(), store, StdDuration::from_secs(3), 0, 1_000);

        ingester.backfill_trades().await;

        // First fetch starts at max_block - max_range_block, not at 0.
        assert_eq!(db.trade_calls.lock().unwrap()[0], 9_000);
    }

    #[tokio::test]
    async fn steady_poll_uses_strict_watermark_and_advances_it() {
        let pages = vec![
            vec![trade_row(12)], // backfill page
            vec![trade_row(13), trade_row(14)], // poll page
        ];
        let db = Arc::new(ScriptedDb::trades_only(12, pages));
        let store = store_with_rates();
        let mut ingester = LogIngester::new(
            db.clone(),
            store.clone(),
            StdDuration::from_secs(3),
            0,
            1_000_000,
        );

        ingester.backfill_trades().await;
        ingester.poll_new_trades().await;
        ingester.poll_new_trades().await; // scripted pages exhausted: no-op

        let calls = db.trade_calls.lock().unwrap().clone();
        assert_eq!(calls, vec![0, 13, 15]);
        assert_eq!(ingester.last_trade_block, 14);
    }

    #[tokio::test]
    async fn enrichment_drops_rows_without_a_current_rate() {
        let store = Arc::new(Store::new());
        store.set_token_rates(&[Token {
            address: USDC.to_string(),
            usd_price: 1.0,
            ..Default::default()
        }]);
        let db = Arc::new(ScriptedDb::trades_only(0, vec![]));
        let ingester = LogIngester::new(db, store, StdDuration::from_secs(3), 0, 0);

        // ZED has no rate in the snapshot.
        let logs = ingester.enrich_trades(vec![trade_row(42)]);
        assert!(logs.is_empty());
    }

    #[tokio::test]
    async fn enrichment_computes_profit_from_rate_moves() {
        let store = store_with_rates();
        let db = Arc::new(ScriptedDb::trades_only(0, vec![]));
        let ingester = LogIngester::new(db, store, StdDuration::from_secs(3), 0, 0);

        let logs = ingester.enrich_trades(vec![trade_row(42)]);
        assert_eq!(logs.len(), 1);
        // (12 - 10) * 10 out-leg minus (1 - 1) * 100 in-leg.
        assert_eq!(logs[0].profit, 20.0);
        assert_eq!(logs[0].current_token_out_usdt_rate, 12.0);
        assert!(!logs[0].current_rate_missing);
    }
}
