//! Deterministic mark-to-market backtesting engine.
//!
//! [`engine::EngineDriver::calculate`] is the entry point: it drives a bar
//! series through a [`bookkeeper::BookKeeper`] and reduces the resulting MTM
//! series via [`aggregator::aggregate`] into an [`engine::MtmResult`].

pub mod aggregator;
pub mod bar;
pub mod bookkeeper;
pub mod config;
pub mod engine;
pub mod error;
pub mod ordered_key_index;
pub mod roi;
pub mod trade;

pub mod prelude {
    pub use crate::aggregator::{aggregate, Aggregates, MIN_NUMERIC_VALUE, PROFIT_SLIPPAGE};
    pub use crate::bar::{Bar, Signal};
    pub use crate::bookkeeper::BookKeeper;
    pub use crate::config::{PnlCalcConfig, RawPnlCalcConfig, RunMetadata};
    pub use crate::engine::{EngineDriver, MtmResult, PnlTimeline};
    pub use crate::error::{MtmError, Result};
    pub use crate::ordered_key_index::{OrderedKeyIndex, SearchResult};
    pub use crate::roi::RoiResolver;
    pub use crate::trade::{sort_for_close, CloseReason, Direction, InventoryMode, Trade};
}
