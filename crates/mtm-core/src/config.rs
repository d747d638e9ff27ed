//! Strategy configuration: a validated in-memory record plus the raw,
//! unvalidated shape a host deserializes from TOML/JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{MtmError, Result};

/// Validated configuration for a single backtest run. Construct via
/// [`TryFrom<RawPnlCalcConfig>`] or [`PnlCalcConfig::get_default`] — there is
/// no public constructor that skips validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PnlCalcConfig {
    pub roi: BTreeMap<u64, f64>,
    pub stoploss: f64,
    pub fixed_stake_unit_amount: f64,
    pub enable_short_position: bool,
    pub max_position_per_symbol: u32,
    pub fee_rate: f64,
    pub laid_back_tax: f64,
}

impl PnlCalcConfig {
    /// The Python original's `get_default()`: ROI never fires, stop-loss
    /// never fires, no idle tax.
    pub fn get_default() -> Self {
        Self {
            roi: BTreeMap::from([(0, f64::INFINITY)]),
            stoploss: f64::NEG_INFINITY,
            fixed_stake_unit_amount: 1.0,
            enable_short_position: false,
            max_position_per_symbol: 1,
            fee_rate: 0.0,
            laid_back_tax: 0.0,
        }
    }
}

/// The unvalidated, wire-format shape of [`PnlCalcConfig`]. Deserialize this
/// from TOML/JSON, then validate via `TryFrom`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPnlCalcConfig {
    pub roi: BTreeMap<u64, f64>,
    pub stoploss: f64,
    pub fixed_stake_unit_amount: f64,
    #[serde(default)]
    pub enable_short_position: bool,
    pub max_position_per_symbol: u32,
    #[serde(default)]
    pub fee_rate: f64,
    #[serde(default)]
    pub laid_back_tax: f64,
}

impl TryFrom<RawPnlCalcConfig> for PnlCalcConfig {
    type Error = MtmError;

    fn try_from(raw: RawPnlCalcConfig) -> Result<Self> {
        if raw.roi.is_empty() {
            return Err(MtmError::ConfigInvalid("roi must not be empty".into()));
        }
        if !raw.roi.contains_key(&0) {
            return Err(MtmError::ConfigInvalid(
                "roi must contain key 0 (instantaneous take-profit)".into(),
            ));
        }
        for (&minutes, &threshold) in &raw.roi {
            // Keys are u64 so nonneg is structural; only values need a check.
            let _ = minutes;
            if threshold < 0.0 {
                return Err(MtmError::ConfigInvalid(format!(
                    "roi threshold at key {minutes} must be nonnegative, got {threshold}"
                )));
            }
        }
        if raw.stoploss >= 0.0 {
            return Err(MtmError::ConfigInvalid(format!(
                "stoploss must be strictly negative, got {}",
                raw.stoploss
            )));
        }
        if raw.fixed_stake_unit_amount <= 0.0 {
            return Err(MtmError::ConfigInvalid(format!(
                "fixed_stake_unit_amount must be strictly positive, got {}",
                raw.fixed_stake_unit_amount
            )));
        }
        if raw.max_position_per_symbol == 0 {
            return Err(MtmError::ConfigInvalid(
                "max_position_per_symbol must be strictly positive".into(),
            ));
        }
        if raw.fee_rate < 0.0 {
            return Err(MtmError::ConfigInvalid(format!(
                "fee_rate must be nonnegative, got {}",
                raw.fee_rate
            )));
        }
        if raw.laid_back_tax < 0.0 {
            return Err(MtmError::ConfigInvalid(format!(
                "laid_back_tax must be nonnegative, got {}",
                raw.laid_back_tax
            )));
        }

        Ok(Self {
            roi: raw.roi,
            stoploss: raw.stoploss,
            fixed_stake_unit_amount: raw.fixed_stake_unit_amount,
            enable_short_position: raw.enable_short_position,
            max_position_per_symbol: raw.max_position_per_symbol,
            fee_rate: raw.fee_rate,
            laid_back_tax: raw.laid_back_tax,
        })
    }
}

/// Optional, host-supplied identity fields that correlate a run with the
/// strategy sweep that produced it. The engine never reads these; they ride
/// along in [`crate::engine::MtmResult`] purely for host bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub strategy_id: Option<String>,
    pub batch_id: Option<String>,
    pub data_key: Option<String>,
    pub strategy_name: Option<String>,
}
