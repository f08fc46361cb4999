//! Market-wide most-traded stocks.
//!
//! The hot list ranks the whole snapshot by turnover amount and highlights
//! its two biggest gainers. Their concept boards, intersected with the
//! popular-board ranking, give the boards where money and attention meet.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;

use crate::data::{BoardRef, Column, MarketSnapshot};

use super::fusion::FusedTable;
use super::normalize::normalize_requiring;
use super::table::StockTable;

/// Number of gainers highlighted among the hot stocks.
const HIGHLIGHTED_GAINERS: usize = 2;

/// Top stocks by turnover amount, with the largest gainers among them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HotStocks {
    /// Ordered by amount, descending
    pub stocks: StockTable,
    /// Codes of the biggest gainers in `stocks`, best first
    pub top_gainers: Vec<String>,
    /// Boards of `top_gainers` that are also popular boards
    pub hot_boards: Vec<BoardRef>,
}

impl HotStocks {
    /// Build from the raw snapshot.
    ///
    /// Only the amount has to coerce; a stock with an unpublished market cap
    /// still ranks.
    pub fn from_snapshot(snapshot: &MarketSnapshot, count: usize) -> Self {
        let table = normalize_requiring(&FusedTable::from_snapshot(snapshot), Column::Amount);
        Self::from_table(&table, count)
    }

    /// Build from a normalized table. Empty without an amount column.
    pub fn from_table(table: &StockTable, count: usize) -> Self {
        let Some(amounts) = table.column(Column::Amount) else {
            return Self::default();
        };

        let mut order: Vec<usize> = (0..table.len()).collect();
        order.sort_by(|&a, &b| desc(amounts[a], amounts[b]));
        order.truncate(count);
        let stocks = table.select(&order);

        let top_gainers = match stocks.column(Column::ChangePct) {
            Some(changes) => {
                let mut ranked: Vec<usize> = (0..stocks.len()).collect();
                ranked.sort_by(|&a, &b| desc(changes[a], changes[b]));
                ranked
                    .into_iter()
                    .take(HIGHLIGHTED_GAINERS)
                    .map(|i| stocks.codes()[i].clone())
                    .collect()
            }
            None => Vec::new(),
        };

        Self {
            stocks,
            top_gainers,
            hot_boards: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stocks.is_empty()
    }
}

/// Boards in `gainer_boards` that also appear in `popular`, keeping
/// `gainer_boards` order and dropping repeats. Boards match on code and name.
pub fn popular_overlap(gainer_boards: &[BoardRef], popular: &[BoardRef]) -> Vec<BoardRef> {
    let popular: HashSet<&BoardRef> = popular.iter().collect();
    let mut seen = HashSet::new();

    gainer_boards
        .iter()
        .filter(|board| popular.contains(board) && seen.insert(*board))
        .cloned()
        .collect()
}

fn desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}
