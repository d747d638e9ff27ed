//! A single position: entry, optional exit, and its PnL arithmetic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MtmError, Result};

/// Position direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

/// Policy for choosing which open trade to close first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryMode {
    /// First opened, first closed.
    Fifo,
    /// Last opened, first closed.
    Lifo,
    /// The least favorable entry price is closed first.
    WorstPrice,
}

/// Why a trade was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    Signal,
    Roi,
    StopLoss,
}

/// A single long or short position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub symbol: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub entry_datetime: DateTime<Utc>,
    pub unit: f64,
    pub fee_rate: f64,
    pub inventory_mode: InventoryMode,

    pub is_closed: bool,
    pub exit_price: Option<f64>,
    pub exit_datetime: Option<DateTime<Utc>>,
    pub close_reason: Option<CloseReason>,
}

impl Trade {
    /// Open a new, unclosed trade.
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        symbol: impl Into<String>,
        direction: Direction,
        entry_price: f64,
        entry_datetime: DateTime<Utc>,
        unit: f64,
        fee_rate: f64,
        inventory_mode: InventoryMode,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            direction,
            entry_price,
            entry_datetime,
            unit,
            fee_rate,
            inventory_mode,
            is_closed: false,
            exit_price: None,
            exit_datetime: None,
            close_reason: None,
        }
    }

    /// Close the trade at `exit_price`/`exit_datetime` for `reason`.
    ///
    /// Fails with [`MtmError::InvalidTradeState`] if already closed (§7: a
    /// programmer error, not a data-driven condition).
    pub fn close_position(
        &mut self,
        exit_price: f64,
        exit_datetime: DateTime<Utc>,
        reason: CloseReason,
    ) -> Result<()> {
        if self.is_closed {
            return Err(MtmError::InvalidTradeState(format!(
                "trade already closed at {:?}",
                self.exit_datetime
            )));
        }
        self.exit_price = Some(exit_price);
        self.exit_datetime = Some(exit_datetime);
        self.is_closed = true;
        self.close_reason = Some(reason);
        Ok(())
    }

    /// Raw (non-normalized) PnL at `price`. `fee_included` subtracts the
    /// entry fee always, and additionally the exit fee once closed.
    pub fn pnl(&self, price: f64, fee_included: bool) -> f64 {
        let mut pnl = match self.direction {
            Direction::Long => price - self.entry_price,
            Direction::Short => self.entry_price - price,
        };
        if fee_included {
            pnl -= self.fee_rate * self.entry_price;
            if let Some(exit_price) = self.exit_price.filter(|_| self.is_closed) {
                pnl -= self.fee_rate * exit_price;
            }
        }
        pnl
    }

    /// PnL at `price`, normalized by entry price.
    pub fn pnl_normalized(&self, price: f64, fee_included: bool) -> f64 {
        self.pnl(price, fee_included) / self.entry_price
    }

    /// Normalized PnL at the trade's own exit price. Requires the trade be
    /// closed.
    pub fn pnl_normalized_closed(&self, fee_included: bool) -> Result<f64> {
        let exit_price = self.exit_price.ok_or(MtmError::TradeNotClosed)?;
        if !self.is_closed {
            return Err(MtmError::TradeNotClosed);
        }
        Ok(self.pnl_normalized(exit_price, fee_included))
    }

    /// Incremental MTM delta for a price move `price_diff = p(t) - p(t-1)`.
    pub fn mtm_delta(&self, price_diff: f64) -> f64 {
        let signed = match self.direction {
            Direction::Long => price_diff,
            Direction::Short => -price_diff,
        };
        signed / self.entry_price
    }

    /// Sort key for `select_to_close`. Comparing trades of different
    /// directions is a precondition violation of `select_to_close`, not of
    /// this function — callers are expected to only ever compare trades
    /// drawn from the same live list (which is always single-direction).
    fn worst_price_key(&self) -> f64 {
        match self.direction {
            // Descending: highest entry price sorts first.
            Direction::Long => -self.entry_price,
            // Ascending: lowest entry price sorts first.
            Direction::Short => self.entry_price,
        }
    }
}

/// Sort `live` in place so the trade to close first is at index 0, per
/// `inventory_mode`. All trades in `live` must share both `inventory_mode`
/// and `direction` — mixed-direction lists are a precondition violation
/// (§4.3, §9: made an explicit precondition rather than an overloaded
/// comparison operator).
pub fn sort_for_close(live: &mut [Trade], inventory_mode: InventoryMode) {
    match inventory_mode {
        InventoryMode::WorstPrice => {
            live.sort_by(|a, b| a.worst_price_key().partial_cmp(&b.worst_price_key()).unwrap());
        }
        InventoryMode::Fifo => {
            live.sort_by_key(|t| t.entry_datetime);
        }
        InventoryMode::Lifo => {
            live.sort_by_key(|t| std::cmp::Reverse(t.entry_datetime));
        }
    }
}
