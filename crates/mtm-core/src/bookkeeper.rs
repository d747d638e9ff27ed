//! The per-tick state machine: inventory management, ROI/stop-loss closes,
//! signal resolution, and the running MTM series.

use chrono::{DateTime, Utc};

use crate::bar::Signal;
use crate::config::PnlCalcConfig;
use crate::error::Result;
use crate::roi::RoiResolver;
use crate::trade::{sort_for_close, CloseReason, Direction, InventoryMode, Trade};

/// Owns all mutable backtest state for one symbol: live/archived inventory
/// in both directions, plus the running MTM series.
#[derive(Debug, Clone)]
pub struct BookKeeper {
    symbol: String,
    config: PnlCalcConfig,
    inventory_mode: InventoryMode,
    roi: RoiResolver,

    live_long: Vec<Trade>,
    live_short: Vec<Trade>,
    archive_long: Vec<Trade>,
    archive_short: Vec<Trade>,

    timestamps_ms: Vec<i64>,
    mtm_values: Vec<f64>,
}

impl BookKeeper {
    pub fn new(symbol: impl Into<String>, config: PnlCalcConfig, inventory_mode: InventoryMode) -> Self {
        let roi = RoiResolver::new(&config.roi);
        Self {
            symbol: symbol.into(),
            config,
            inventory_mode,
            roi,
            live_long: Vec::new(),
            live_short: Vec::new(),
            archive_long: Vec::new(),
            archive_short: Vec::new(),
            timestamps_ms: Vec::new(),
            mtm_values: Vec::new(),
        }
    }

    pub fn live_long(&self) -> &[Trade] {
        &self.live_long
    }

    pub fn live_short(&self) -> &[Trade] {
        &self.live_short
    }

    pub fn archive_long(&self) -> &[Trade] {
        &self.archive_long
    }

    pub fn archive_short(&self) -> &[Trade] {
        &self.archive_short
    }

    pub fn mtm_series(&self) -> (&[i64], &[f64]) {
        (&self.timestamps_ms, &self.mtm_values)
    }

    /// Run one tick of the five-phase procedure. `price_diff` is
    /// `close[i] - close[i-1]` (zero on the first bar).
    pub fn tick(&mut self, t: DateTime<Utc>, price: f64, price_diff: f64, signal: Signal) -> Result<()> {
        let mtm_t = self.accrue_mtm(t, price_diff);
        let mut fees_t = 0.0;

        self.close_roi(t, price, &mut fees_t);
        self.close_stop_loss(t, price, &mut fees_t);
        self.resolve_signal(t, price, signal, &mut fees_t);

        if self.live_long.is_empty() && self.live_short.is_empty() {
            fees_t += self.config.laid_back_tax;
        }

        self.timestamps_ms.push(t.timestamp_millis());
        self.mtm_values.push(mtm_t - fees_t);
        Ok(())
    }

    /// Phase 1: sum each live trade's incremental MTM delta.
    fn accrue_mtm(&self, t: DateTime<Utc>, price_diff: f64) -> f64 {
        self.live_long
            .iter()
            .chain(self.live_short.iter())
            .filter(|trade| t > trade.entry_datetime)
            .map(|trade| trade.mtm_delta(price_diff))
            .sum()
    }

    /// Phase 2: close any trade whose normalized PnL crosses its active ROI
    /// tiers. Long list first, then short, per the fixed iteration order.
    fn close_roi(&mut self, t: DateTime<Utc>, price: f64, fees_t: &mut f64) {
        let roi = &self.roi;
        Self::close_matching(&mut self.live_long, &mut self.archive_long, price, t, CloseReason::Roi, fees_t, |trade| {
            roi.can_take_profit(trade.entry_datetime, t, trade.pnl_normalized(price, false))
        });
        Self::close_matching(&mut self.live_short, &mut self.archive_short, price, t, CloseReason::Roi, fees_t, |trade| {
            roi.can_take_profit(trade.entry_datetime, t, trade.pnl_normalized(price, false))
        });
    }

    /// Phase 3: close any trade whose normalized PnL breaches the stop-loss
    /// bound.
    fn close_stop_loss(&mut self, t: DateTime<Utc>, price: f64, fees_t: &mut f64) {
        let bound = -self.config.stoploss.abs();
        Self::close_matching(&mut self.live_long, &mut self.archive_long, price, t, CloseReason::StopLoss, fees_t, |trade| {
            trade.pnl_normalized(price, false) < bound
        });
        Self::close_matching(&mut self.live_short, &mut self.archive_short, price, t, CloseReason::StopLoss, fees_t, |trade| {
            trade.pnl_normalized(price, false) < bound
        });
    }

    /// Snapshot the indices to close during a scan, then remove in a second
    /// pass in descending index order, so the removal never invalidates the
    /// indices collected in the first pass.
    fn close_matching(
        live: &mut Vec<Trade>,
        archive: &mut Vec<Trade>,
        price: f64,
        t: DateTime<Utc>,
        reason: CloseReason,
        fees_t: &mut f64,
        mut should_close: impl FnMut(&Trade) -> bool,
    ) {
        let to_close: Vec<usize> = live
            .iter()
            .enumerate()
            .filter(|(_, trade)| should_close(trade))
            .map(|(idx, _)| idx)
            .collect();

        for idx in to_close.into_iter().rev() {
            let mut trade = live.remove(idx);
            trade
                .close_position(price, t, reason)
                .expect("live trade is always open before close_position");
            *fees_t += trade.fee_rate;
            archive.push(trade);
        }
    }

    /// Phase 4: resolve BUY/SELL/HOLD against current inventory.
    fn resolve_signal(&mut self, t: DateTime<Utc>, price: f64, signal: Signal, fees_t: &mut f64) {
        match signal {
            Signal::Buy => self.resolve_buy(t, price, fees_t),
            Signal::Sell => self.resolve_sell(t, price, fees_t),
            Signal::Hold => {}
        }
    }

    fn resolve_buy(&mut self, t: DateTime<Utc>, price: f64, fees_t: &mut f64) {
        if !self.live_short.is_empty() {
            let fee = Self::close_one(&mut self.live_short, &mut self.archive_short, self.inventory_mode, price, t);
            *fees_t += fee;
            return;
        }

        if self.live_long.len() >= self.config.max_position_per_symbol as usize {
            tracing::info!(
                symbol = %self.symbol,
                direction = "long",
                size = self.live_long.len(),
                cap = self.config.max_position_per_symbol,
                "cap reached, dropping buy signal"
            );
            return;
        }

        let trade = Trade::open(
            self.symbol.clone(),
            Direction::Long,
            price,
            t,
            self.config.fixed_stake_unit_amount,
            self.config.fee_rate,
            self.inventory_mode,
        );
        self.live_long.push(trade);
        *fees_t += self.config.fee_rate;
    }

    fn resolve_sell(&mut self, t: DateTime<Utc>, price: f64, fees_t: &mut f64) {
        if !self.live_long.is_empty() {
            let fee = Self::close_one(&mut self.live_long, &mut self.archive_long, self.inventory_mode, price, t);
            *fees_t += fee;
            return;
        }

        if !self.config.enable_short_position {
            tracing::debug!(symbol = %self.symbol, "short position disabled, dropping sell signal");
            return;
        }

        if self.live_short.len() >= self.config.max_position_per_symbol as usize {
            tracing::info!(
                symbol = %self.symbol,
                direction = "short",
                size = self.live_short.len(),
                cap = self.config.max_position_per_symbol,
                "cap reached, dropping sell signal"
            );
            return;
        }

        let trade = Trade::open(
            self.symbol.clone(),
            Direction::Short,
            price,
            t,
            self.config.fixed_stake_unit_amount,
            self.config.fee_rate,
            self.inventory_mode,
        );
        self.live_short.push(trade);
        *fees_t += self.config.fee_rate;
    }

    /// Select and close one trade from `live` per the inventory ordering,
    /// returning the fee incurred.
    fn close_one(
        live: &mut Vec<Trade>,
        archive: &mut Vec<Trade>,
        inventory_mode: InventoryMode,
        price: f64,
        t: DateTime<Utc>,
    ) -> f64 {
        sort_for_close(live, inventory_mode);
        let mut trade = live.remove(0);
        trade
            .close_position(price, t, CloseReason::Signal)
            .expect("live trade is always open before close_position");
        let fee = trade.fee_rate;
        archive.push(trade);
        fee
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn at(i: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::minutes(i)
    }

    fn config(roi: BTreeMap<u64, f64>, stoploss: f64, cap: u32, short: bool, fee: f64, tax: f64) -> PnlCalcConfig {
        PnlCalcConfig {
            roi,
            stoploss,
            fixed_stake_unit_amount: 1.0,
            enable_short_position: short,
            max_position_per_symbol: cap,
            fee_rate: fee,
            laid_back_tax: tax,
        }
    }

    #[test]
    fn buy_opens_a_long() {
        let cfg = config(BTreeMap::from([(0, f64::INFINITY)]), f64::NEG_INFINITY, 1, false, 0.0, 0.0);
        let mut bk = BookKeeper::new("X", cfg, InventoryMode::Fifo);
        bk.tick(at(0), 100.0, 0.0, Signal::Buy).unwrap();
        assert_eq!(bk.live_long().len(), 1);
        assert_eq!(bk.live_short().len(), 0);
    }

    #[test]
    fn sell_after_buy_closes_by_signal() {
        let cfg = config(BTreeMap::from([(0, f64::INFINITY)]), f64::NEG_INFINITY, 1, false, 0.0, 0.0);
        let mut bk = BookKeeper::new("X", cfg, InventoryMode::Fifo);
        bk.tick(at(0), 100.0, 0.0, Signal::Buy).unwrap();
        bk.tick(at(1), 110.0, 10.0, Signal::Sell).unwrap();
        assert_eq!(bk.live_long().len(), 0);
        assert_eq!(bk.archive_long().len(), 1);
        assert_eq!(bk.archive_long()[0].close_reason, Some(CloseReason::Signal));
    }

    #[test]
    fn cap_blocks_additional_opens() {
        let cfg = config(BTreeMap::from([(0, f64::INFINITY)]), f64::NEG_INFINITY, 1, false, 0.0, 0.0);
        let mut bk = BookKeeper::new("X", cfg, InventoryMode::Fifo);
        bk.tick(at(0), 100.0, 0.0, Signal::Buy).unwrap();
        bk.tick(at(1), 101.0, 1.0, Signal::Buy).unwrap();
        assert_eq!(bk.live_long().len(), 1);
    }

    #[test]
    fn short_disabled_drops_sell_with_no_long_to_close() {
        let cfg = config(BTreeMap::from([(0, f64::INFINITY)]), f64::NEG_INFINITY, 1, false, 0.0, 0.0);
        let mut bk = BookKeeper::new("X", cfg, InventoryMode::Fifo);
        bk.tick(at(0), 100.0, 0.0, Signal::Sell).unwrap();
        assert_eq!(bk.live_short().len(), 0);
        assert_eq!(bk.archive_short().len(), 0);
    }

    #[test]
    fn stop_loss_closes_when_breached() {
        let cfg = config(BTreeMap::from([(0, f64::INFINITY)]), -0.02, 1, false, 0.0, 0.0);
        let mut bk = BookKeeper::new("X", cfg, InventoryMode::Fifo);
        bk.tick(at(0), 100.0, 0.0, Signal::Buy).unwrap();
        bk.tick(at(1), 97.0, -3.0, Signal::Hold).unwrap();
        assert_eq!(bk.live_long().len(), 0);
        assert_eq!(bk.archive_long().len(), 1);
        assert_eq!(bk.archive_long()[0].close_reason, Some(CloseReason::StopLoss));
    }

    #[test]
    fn roi_closes_once_profit_clears_tier() {
        let cfg = config(BTreeMap::from([(0, 0.05)]), f64::NEG_INFINITY, 1, false, 0.0, 0.0);
        let mut bk = BookKeeper::new("X", cfg, InventoryMode::Fifo);
        bk.tick(at(0), 100.0, 0.0, Signal::Buy).unwrap();
        bk.tick(at(1), 106.0, 6.0, Signal::Hold).unwrap();
        assert_eq!(bk.archive_long().len(), 1);
        assert_eq!(bk.archive_long()[0].close_reason, Some(CloseReason::Roi));
    }

    #[test]
    fn idle_tax_applies_when_flat() {
        let cfg = config(BTreeMap::from([(0, f64::INFINITY)]), f64::NEG_INFINITY, 1, false, 0.0, 0.1);
        let mut bk = BookKeeper::new("X", cfg, InventoryMode::Fifo);
        bk.tick(at(0), 100.0, 0.0, Signal::Hold).unwrap();
        let (_, mtm) = bk.mtm_series();
        assert!((mtm[0] - (-0.1)).abs() < 1e-12);
    }

    #[test]
    fn mtm_series_length_matches_ticks() {
        let cfg = config(BTreeMap::from([(0, f64::INFINITY)]), f64::NEG_INFINITY, 1, false, 0.0, 0.0);
        let mut bk = BookKeeper::new("X", cfg, InventoryMode::Fifo);
        for i in 0..5 {
            bk.tick(at(i), 100.0 + i as f64, 1.0, Signal::Hold).unwrap();
        }
        let (ts, mtm) = bk.mtm_series();
        assert_eq!(ts.len(), 5);
        assert_eq!(mtm.len(), 5);
    }
}
