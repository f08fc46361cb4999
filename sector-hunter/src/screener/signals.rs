//! Pluggable row signals and their registry.
//!
//! A signal is a pure predicate over a [`StockTable`] returning one boolean
//! per row. Selected signals combine by strict AND; there is no OR or NOT.
//! Signals whose inputs are missing select nothing.

use serde::Serialize;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::warn;

use crate::data::Column;

use super::table::{Mask, StockTable};

// ============================================================================
// Signal Trait
// ============================================================================

/// A named boolean predicate over a normalized table.
///
/// `evaluate` must return a mask of exactly `table.len()` entries and must
/// not depend on anything but the table and the signal's own constants.
pub trait Signal: Send + Sync {
    /// Stable identifier used for selection (e.g., "vol_ratio")
    fn id(&self) -> &str;

    /// Human-readable label
    fn display_name(&self) -> &str;

    fn evaluate(&self, table: &StockTable) -> Mask;
}

/// `volume_ratio > 1.5`
#[derive(Debug, Clone, Copy, Default)]
pub struct VolumeRatioSignal;

impl VolumeRatioSignal {
    pub const THRESHOLD: f64 = 1.5;
}

impl Signal for VolumeRatioSignal {
    fn id(&self) -> &str {
        "vol_ratio"
    }

    fn display_name(&self) -> &str {
        "量比爆发 (>1.5)"
    }

    fn evaluate(&self, table: &StockTable) -> Mask {
        table.column_mask(Column::VolumeRatio, |v| v > Self::THRESHOLD)
    }
}

/// `sector_pct_chg - change_pct > 3.0`: the stock trails its own sector.
#[derive(Debug, Clone, Copy, Default)]
pub struct SectorDivergenceSignal;

impl SectorDivergenceSignal {
    pub const THRESHOLD: f64 = 3.0;
}

impl Signal for SectorDivergenceSignal {
    fn id(&self) -> &str {
        "sector_divergence"
    }

    fn display_name(&self) -> &str {
        "板块背离 (滞涨)"
    }

    fn evaluate(&self, table: &StockTable) -> Mask {
        match (table.column(Column::SectorPctChg), table.column(Column::ChangePct)) {
            (Some(sector), Some(change)) => sector
                .iter()
                .zip(change)
                .map(|(s, c)| s - c > Self::THRESHOLD)
                .collect(),
            _ => Mask::none(table.len()),
        }
    }
}

/// Market cap at or below the table's own 20th percentile.
///
/// The cut-off is recomputed on every call, so the same stock can qualify
/// in one table and not in another.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmallCapSignal;

impl SmallCapSignal {
    pub const QUANTILE: f64 = 0.2;
}

impl Signal for SmallCapSignal {
    fn id(&self) -> &str {
        "small_cap"
    }

    fn display_name(&self) -> &str {
        "市值下沉 (Bottom 20%)"
    }

    fn evaluate(&self, table: &StockTable) -> Mask {
        let Some(caps) = table.column(Column::MarketCap) else {
            return Mask::none(table.len());
        };
        match quantile(caps, Self::QUANTILE) {
            Some(limit) => caps.iter().map(|&v| v <= limit).collect(),
            None => Mask::none(table.len()),
        }
    }
}

/// Quantile with linear interpolation between closest ranks.
///
/// `None` for an empty slice.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64))
}

// ============================================================================
// Closure Signals
// ============================================================================

type Predicate = dyn Fn(&StockTable) -> Mask + Send + Sync;

/// Signal backed by a closure.
pub struct FnSignal {
    id: String,
    display_name: String,
    predicate: Box<Predicate>,
}

impl FnSignal {
    pub fn new<F>(id: impl Into<String>, display_name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&StockTable) -> Mask + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            predicate: Box::new(predicate),
        }
    }
}

impl Signal for FnSignal {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn evaluate(&self, table: &StockTable) -> Mask {
        (self.predicate)(table)
    }
}

impl std::fmt::Debug for FnSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnSignal")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Listing entry for a registered signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignalDescriptor {
    pub id: String,
    pub display_name: String,
}

/// Registered signals, in registration order.
///
/// Built once at start-up and shared read-only afterwards.
#[derive(Clone, Default)]
pub struct SignalRegistry {
    signals: Vec<Arc<dyn Signal>>,
}

impl SignalRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding `vol_ratio`, `sector_divergence` and `small_cap`.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(VolumeRatioSignal);
        registry.register(SectorDivergenceSignal);
        registry.register(SmallCapSignal);
        registry
    }

    /// Register a signal. A signal with the same id is replaced in place.
    pub fn register(&mut self, signal: impl Signal + 'static) {
        let signal: Arc<dyn Signal> = Arc::new(signal);
        match self.signals.iter().position(|s| s.id() == signal.id()) {
            Some(i) => self.signals[i] = signal,
            None => self.signals.push(signal),
        }
    }

    /// Register a closure as a signal.
    pub fn register_fn<F>(&mut self, id: impl Into<String>, display_name: impl Into<String>, predicate: F)
    where
        F: Fn(&StockTable) -> Mask + Send + Sync + 'static,
    {
        self.register(FnSignal::new(id, display_name, predicate));
    }

    pub fn get(&self, id: &str) -> Option<&dyn Signal> {
        self.signals.iter().find(|s| s.id() == id).map(|s| s.as_ref())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn descriptors(&self) -> Vec<SignalDescriptor> {
        self.signals
            .iter()
            .map(|s| SignalDescriptor {
                id: s.id().to_string(),
                display_name: s.display_name().to_string(),
            })
            .collect()
    }

    /// AND of the selected signals' masks, starting from all-true.
    ///
    /// Unknown ids are skipped. A signal returning a mask of the wrong
    /// length contributes all-false.
    pub fn mask<S: AsRef<str>>(&self, table: &StockTable, selected: &[S]) -> Mask {
        let mut mask = Mask::all(table.len());

        for id in selected {
            let Some(signal) = self.get(id.as_ref()) else {
                continue;
            };

            let signal_mask = signal.evaluate(table);
            if signal_mask.len() != table.len() {
                warn!(
                    signal = signal.id(),
                    expected = table.len(),
                    got = signal_mask.len(),
                    "Signal returned mask of wrong length"
                );
                return Mask::none(table.len());
            }
            mask = mask.and(&signal_mask);
        }

        mask
    }

    /// Rows of `table` passing every selected signal.
    ///
    /// An empty selection returns the table unchanged.
    pub fn evaluate<S: AsRef<str>>(&self, table: &StockTable, selected: &[S]) -> StockTable {
        if selected.is_empty() {
            return table.clone();
        }
        table.filter(&self.mask(table, selected))
    }
}

impl std::fmt::Debug for SignalRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.signals.iter().map(|s| s.id()))
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const EMPTY: &[&str] = &[];

    /// Six rows, caps 1..6: vol_ratio = {0, 2, 4}, small_cap = {0, 1},
    /// sector_divergence = {0, 1, 5}.
    fn table() -> StockTable {
        let mut table = StockTable::new([
            Column::ChangePct,
            Column::MarketCap,
            Column::VolumeRatio,
            Column::SectorPctChg,
        ]);
        let rows = [
            ("000001", 1.0, 2.0, 0.5),
            ("000002", 2.0, 1.0, 1.0),
            ("000003", 3.0, 1.6, 6.0),
            ("000004", 4.0, 1.5, 2.0),
            ("000005", 5.0, 3.0, 4.0),
            ("000006", 6.0, 1.0, 1.5),
        ];
        for (code, cap, vr, change) in rows {
            table.push(
                code,
                code,
                &[
                    (Column::ChangePct, change),
                    (Column::MarketCap, cap),
                    (Column::VolumeRatio, vr),
                    (Column::SectorPctChg, 5.0),
                ],
            );
        }
        table
    }

    #[test_case(&[1.0, 2.0, 3.0, 4.0, 5.0], 0.2, 1.8 ; "five values")]
    #[test_case(&[10.0], 0.2, 10.0 ; "single value")]
    #[test_case(&[4.0, 1.0], 0.5, 2.5 ; "unsorted pair")]
    fn test_quantile_linear(values: &[f64], q: f64, expected: f64) {
        let got = quantile(values, q).unwrap();
        assert!((got - expected).abs() < 1e-9, "got {got}");
    }

    #[test]
    fn test_quantile_empty() {
        assert!(quantile(&[], 0.2).is_none());
    }

    #[test]
    fn test_builtin_masks() {
        let table = table();
        assert_eq!(VolumeRatioSignal.evaluate(&table).indices(), vec![0, 2, 4]);
        assert_eq!(SmallCapSignal.evaluate(&table).indices(), vec![0, 1]);
        // 5.0 - 2.0 is not above 3.0
        assert_eq!(SectorDivergenceSignal.evaluate(&table).indices(), vec![0, 1, 5]);
    }

    #[test]
    fn test_empty_selection_is_identity() {
        let table = table();
        let registry = SignalRegistry::with_builtin();
        assert_eq!(registry.evaluate(&table, EMPTY), table);
    }

    #[test]
    fn test_intersection_is_strict_subset() {
        let table = table();
        let registry = SignalRegistry::with_builtin();

        let both = registry.evaluate(&table, &["vol_ratio", "small_cap"]);
        assert_eq!(both.codes(), &["000001".to_string()]);
        assert!(both.len() < registry.evaluate(&table, &["vol_ratio"]).len());
        assert!(both.len() < registry.evaluate(&table, &["small_cap"]).len());
    }

    #[test]
    fn test_unknown_ids_ignored() {
        let table = table();
        let registry = SignalRegistry::with_builtin();
        let filtered = registry.evaluate(&table, &["no_such_signal", "vol_ratio"]);
        assert_eq!(filtered.len(), 3);
        assert_eq!(registry.evaluate(&table, &["no_such_signal"]), table);
    }

    #[test]
    fn test_absent_columns_fail_closed() {
        let mut table = StockTable::new([Column::ChangePct]);
        table.push("000001", "A", &[(Column::ChangePct, 0.0)]);

        assert_eq!(VolumeRatioSignal.evaluate(&table), Mask::none(1));
        assert_eq!(SectorDivergenceSignal.evaluate(&table), Mask::none(1));
        assert_eq!(SmallCapSignal.evaluate(&table), Mask::none(1));
    }

    #[test]
    fn test_absent_and_zero_columns_distinguishable() {
        let mut zeros = StockTable::new([Column::VolumeRatio]);
        zeros.push("000001", "A", &[(Column::VolumeRatio, 0.0)]);
        let absent = StockTable::new([Column::ChangePct]);

        assert!(zeros.column(Column::VolumeRatio).is_some());
        assert!(absent.column(Column::VolumeRatio).is_none());
        assert_eq!(VolumeRatioSignal.evaluate(&zeros).count(), 0);
    }

    #[test]
    fn test_small_cap_recomputed_per_table() {
        let table = table();
        let before = SmallCapSignal.evaluate(&table);
        assert_eq!(before.indices(), vec![0, 1]);

        // Without the largest cap the cut-off falls from 2.0 to 1.8
        let shrunk = table.select(&[0, 1, 2, 3, 4]);
        let after = SmallCapSignal.evaluate(&shrunk);
        assert_eq!(after.indices(), vec![0]);
    }

    #[test]
    fn test_register_replaces_in_place() {
        let mut registry = SignalRegistry::with_builtin();
        registry.register_fn("vol_ratio", "always", |t: &StockTable| Mask::all(t.len()));

        assert_eq!(registry.len(), 3);
        let descriptors = registry.descriptors();
        assert_eq!(descriptors[0].id, "vol_ratio");
        assert_eq!(descriptors[0].display_name, "always");
        assert_eq!(registry.evaluate(&table(), &["vol_ratio"]).len(), 6);
    }

    #[test]
    fn test_wrong_length_mask_rejects_all() {
        let mut registry = SignalRegistry::new();
        registry.register_fn("broken", "broken", |_: &StockTable| Mask::all(1));
        assert!(registry.evaluate(&table(), &["broken"]).is_empty());
    }
}
