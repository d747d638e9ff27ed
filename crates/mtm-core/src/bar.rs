//! Input timestep: a single close price plus optional buy/sell flags.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One discrete timestep of market data for a single symbol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub ts: DateTime<Utc>,
    pub close: f64,
    pub buy: bool,
    pub sell: bool,
}

impl Bar {
    pub fn new(ts: DateTime<Utc>, close: f64, buy: bool, sell: bool) -> Self {
        Self { ts, close, buy, sell }
    }
}

/// The resolved action for a tick, after reconciling `buy`/`sell` flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl Signal {
    /// BUY takes precedence when both flags are set (§4.6).
    pub fn resolve(buy: bool, sell: bool) -> Self {
        if buy {
            Signal::Buy
        } else if sell {
            Signal::Sell
        } else {
            Signal::Hold
        }
    }
}
