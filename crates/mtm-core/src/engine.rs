//! Drives a bar series through the [`BookKeeper`], then reduces the
//! resulting MTM series to the final result.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::aggregator::aggregate;
use crate::bar::{Bar, Signal};
use crate::bookkeeper::BookKeeper;
use crate::config::{PnlCalcConfig, RunMetadata};
use crate::error::Result;
use crate::trade::{InventoryMode, Trade};

/// Parallel-array view of the per-tick MTM series, keyed by timestamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PnlTimeline {
    pub timestamp: Vec<i64>,
    pub mtm_ratio: Vec<f64>,
    pub close_price: Vec<f64>,
    pub buy_signal: Vec<bool>,
    pub sell_signal: Vec<bool>,
    /// Running cumulative sum of `mtm_ratio`.
    pub pnl_ratio: Vec<f64>,
}

/// The full output of one [`EngineDriver::calculate`] run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MtmResult {
    pub pnl: f64,
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,

    pub mkt_start_epoch: i64,
    pub mkt_end_epoch: i64,
    pub run_start_epoch: i64,
    pub run_end_epoch: i64,

    pub params: PnlCalcConfig,
    pub pnl_timeline: PnlTimeline,

    pub long_trades_archive: Vec<Trade>,
    pub short_trades_archive: Vec<Trade>,
    pub long_trades_outstanding: Vec<Trade>,
    pub short_trades_outstanding: Vec<Trade>,

    #[serde(default)]
    pub metadata: RunMetadata,
}

/// Merges a bar series with a strategy configuration into a [`MtmResult`].
pub struct EngineDriver;

impl EngineDriver {
    /// Run the full backtest over `bars` (already time-ordered, one row per
    /// tick, `close`/`buy`/`sell` aligned — merging separate buy/sell frames
    /// is a host-side concern, see `mtm-cli`).
    pub fn calculate(
        symbol: impl Into<String>,
        bars: &[Bar],
        config: PnlCalcConfig,
        inventory_mode: InventoryMode,
        metadata: RunMetadata,
    ) -> Result<MtmResult> {
        let run_start_epoch = Utc::now().timestamp_millis();
        let params = config.clone();
        let mut book_keeper = BookKeeper::new(symbol, config, inventory_mode);

        let mut timeline = PnlTimeline::default();
        let mut previous_close: Option<f64> = None;

        for bar in bars {
            let price_diff = previous_close.map_or(0.0, |prev| bar.close - prev);
            let signal = Signal::resolve(bar.buy, bar.sell);

            book_keeper.tick(bar.ts, bar.close, price_diff, signal)?;

            timeline.timestamp.push(bar.ts.timestamp_millis());
            timeline.close_price.push(bar.close);
            timeline.buy_signal.push(bar.buy);
            timeline.sell_signal.push(bar.sell);

            previous_close = Some(bar.close);
        }

        let (timestamps_ms, mtm_values) = book_keeper.mtm_series();
        timeline.mtm_ratio = mtm_values.to_vec();
        timeline.pnl_ratio = cumulative_sum(mtm_values);

        let aggregates = aggregate(timestamps_ms, mtm_values);

        let mkt_start_epoch = timestamps_ms.first().copied().unwrap_or(0);
        let mkt_end_epoch = timestamps_ms.last().copied().unwrap_or(0);
        let run_end_epoch = Utc::now().timestamp_millis();

        Ok(MtmResult {
            pnl: aggregates.pnl,
            max_drawdown: aggregates.max_drawdown,
            sharpe_ratio: aggregates.sharpe_ratio,
            mkt_start_epoch,
            mkt_end_epoch,
            run_start_epoch,
            run_end_epoch,
            params,
            pnl_timeline: timeline,
            long_trades_archive: book_keeper.archive_long().to_vec(),
            short_trades_archive: book_keeper.archive_short().to_vec(),
            long_trades_outstanding: book_keeper.live_long().to_vec(),
            short_trades_outstanding: book_keeper.live_short().to_vec(),
            metadata,
        })
    }
}

fn cumulative_sum(values: &[f64]) -> Vec<f64> {
    let mut running = 0.0;
    values
        .iter()
        .map(|v| {
            running += v;
            running
        })
        .collect()
}
