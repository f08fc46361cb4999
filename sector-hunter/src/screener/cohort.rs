//! Fixed-threshold cohort rules.
//!
//! - Leaders: `change_pct >= 9.0`, name without the risk flag, largest
//!   market cap first
//! - Laggards: `0 <= change_pct <= 4.0`, `market_cap < cap_limit`,
//!   `turnover_rate > 3.0`, input order
//! - Amplitude: `amplitude >= 6.0`, `turnover_rate > 10.0`, input order
//!
//! A rule needing a column the table does not carry selects nothing.

use sector_common::config::ScreenerConfig;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::data::Column;

use super::table::{Cohort, Mask, StockTable};

/// Multiplier from 亿 to raw currency units.
pub const YI: f64 = 100_000_000.0;

/// Thresholds for the three cohorts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortRules {
    pub leader_min_change_pct: f64,
    /// Name substring marking special-treatment equities
    pub risk_flag: String,
    pub laggard_max_change_pct: f64,
    pub laggard_min_turnover: f64,
    pub amplitude_min: f64,
    pub amplitude_min_turnover: f64,
}

impl Default for CohortRules {
    fn default() -> Self {
        Self::from(&ScreenerConfig::default())
    }
}

impl From<&ScreenerConfig> for CohortRules {
    fn from(config: &ScreenerConfig) -> Self {
        Self {
            leader_min_change_pct: config.leader_min_change_pct,
            risk_flag: config.risk_flag.clone(),
            laggard_max_change_pct: config.laggard_max_change_pct,
            laggard_min_turnover: config.laggard_min_turnover,
            amplitude_min: config.amplitude_min,
            amplitude_min_turnover: config.amplitude_min_turnover,
        }
    }
}

impl CohortRules {
    /// Leader rows ordered by market cap, descending.
    pub fn leaders<'a>(&self, table: &'a StockTable) -> Cohort<'a> {
        let flag = self.risk_flag.as_str();
        let min = self.leader_min_change_pct;

        let gain = table.column_mask(Column::ChangePct, |v| v >= min);
        let clean: Mask = table
            .names()
            .iter()
            .map(|name| flag.is_empty() || !name.contains(flag))
            .collect();
        let mut indices = gain.and(&clean).indices();

        // Without a cap column there is nothing to rank by; keep input order
        if let Some(caps) = table.column(Column::MarketCap) {
            indices.sort_by(|&a, &b| caps[b].partial_cmp(&caps[a]).unwrap_or(Ordering::Equal));
        }

        Cohort::from_indices(table, indices)
    }

    /// Mask of laggard rows. `cap_limit` is in raw currency units.
    pub fn laggard_mask(&self, table: &StockTable, cap_limit: f64) -> Mask {
        let max = self.laggard_max_change_pct;
        let turnover = self.laggard_min_turnover;

        table
            .column_mask(Column::ChangePct, |v| (0.0..=max).contains(&v))
            .and(&table.column_mask(Column::MarketCap, |v| v < cap_limit))
            .and(&table.column_mask(Column::TurnoverRate, |v| v > turnover))
    }

    /// Laggard rows in input order. `cap_limit` is in raw currency units.
    pub fn laggards<'a>(&self, table: &'a StockTable, cap_limit: f64) -> Cohort<'a> {
        Cohort::from_mask(table, &self.laggard_mask(table, cap_limit))
    }

    /// High-amplitude, high-turnover rows in input order.
    pub fn amplitude<'a>(&self, table: &'a StockTable) -> Cohort<'a> {
        let min = self.amplitude_min;
        let turnover = self.amplitude_min_turnover;

        let mask = table
            .column_mask(Column::Amplitude, |v| v >= min)
            .and(&table.column_mask(Column::TurnoverRate, |v| v > turnover));
        Cohort::from_mask(table, &mask)
    }
}
