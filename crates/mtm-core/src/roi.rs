//! Tiered take-profit rule: elapsed-time-since-entry to minimum-PnL thresholds.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::ordered_key_index::OrderedKeyIndex;

/// Resolves the take-profit decision from a `minutes -> threshold` mapping.
///
/// Construction converts `minutes` keys to seconds and indexes them so that
/// `active_thresholds` runs in O(log N + K) for K active tiers.
#[derive(Debug, Clone)]
pub struct RoiResolver {
    thresholds_by_second: BTreeMap<i64, f64>,
    index: OrderedKeyIndex,
}

impl RoiResolver {
    /// Build a resolver from a `minutes -> threshold` map. Does not validate
    /// the map (that is `PnlCalcConfig`'s job at construction); callers are
    /// expected to pass an already-validated `roi` table.
    pub fn new(roi_minutes: &BTreeMap<u64, f64>) -> Self {
        let thresholds_by_second: BTreeMap<i64, f64> = roi_minutes
            .iter()
            .map(|(&minutes, &threshold)| (minutes as i64 * 60, threshold))
            .collect();
        let index = OrderedKeyIndex::new(thresholds_by_second.keys().copied().collect());
        Self {
            thresholds_by_second,
            index,
        }
    }

    /// All thresholds whose tier (in seconds) is `<= now - entry_time`
    /// (elapsed time floored to whole seconds).
    pub fn active_thresholds(&self, entry_time: DateTime<Utc>, now: DateTime<Utc>) -> Vec<f64> {
        let elapsed_seconds = now.signed_duration_since(entry_time).num_seconds();
        self.index
            .keys_at_most(elapsed_seconds)
            .iter()
            .map(|second| self.thresholds_by_second[second])
            .collect()
    }

    /// True iff `normalized_pnl` strictly exceeds the binding (largest)
    /// active threshold. With no active thresholds (elapsed time below the
    /// smallest tier — cannot occur once `0` is a configured tier) this is
    /// conservatively `false`.
    pub fn can_take_profit(
        &self,
        entry_time: DateTime<Utc>,
        now: DateTime<Utc>,
        normalized_pnl: f64,
    ) -> bool {
        let active = self.active_thresholds(entry_time, now);
        match active.iter().cloned().fold(None, |acc: Option<f64>, v| {
            Some(acc.map_or(v, |a| a.max(v)))
        }) {
            None => false,
            Some(binding) => normalized_pnl > binding,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn roi_map() -> BTreeMap<u64, f64> {
        BTreeMap::from([(0, 0.5), (5, 0.01)])
    }

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::minutes(minute)
    }

    #[test]
    fn no_tiers_active_before_zero_is_unreachable_but_handled() {
        let resolver = RoiResolver::new(&BTreeMap::new());
        assert!(!resolver.can_take_profit(at(0), at(1), 10.0));
    }

    #[test]
    fn tier_zero_requires_strict_excess() {
        let resolver = RoiResolver::new(&roi_map());
        assert!(!resolver.can_take_profit(at(0), at(0), 0.5));
        assert!(resolver.can_take_profit(at(0), at(0), 0.50001));
    }

    #[test]
    fn later_tier_lowers_the_bar_and_is_binding() {
        let resolver = RoiResolver::new(&roi_map());
        // At elapsed=5min both tiers (0 and 5) are active; binding = max(0.5, 0.01) = 0.5.
        assert!(!resolver.can_take_profit(at(0), at(5), 0.2));
        assert!(resolver.can_take_profit(at(0), at(5), 0.6));
    }

    #[test]
    fn floor_elapsed_seconds() {
        let resolver = RoiResolver::new(&roi_map());
        let entry = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let before_tier = entry + chrono::Duration::seconds(299); // 4m59s, just under tier 5
        assert!(!resolver.can_take_profit(entry, before_tier, 0.02));
        let at_tier = entry + chrono::Duration::seconds(300);
        assert!(resolver.can_take_profit(entry, at_tier, 0.6));
    }
}
