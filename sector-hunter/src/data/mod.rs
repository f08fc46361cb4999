//! Market data module for A-share sector rotation.
//!
//! Provides the data shapes shared by every refresh cycle and the
//! abstraction over upstream sources.
//!
//! # Data Sources
//! - **Eastmoney** (default): concept board ranking, board constituents and
//!   the whole-market spot list from `push2.eastmoney.com`
//!
//! # Shapes
//! - [`SectorRanking`]: top boards by change percentage, descending
//! - [`BoardRef`]: a board a stock belongs to, or one the crowd is trading
//! - [`MarketSnapshot`]: one raw quote per equity code, fetched once per refresh
//! - [`SectorConstituency`]: board name → member codes; a missing board means
//!   its fetch failed, which is not the same as an empty board

mod cache;
mod eastmoney;
mod provider;
mod rate_limiter;

pub use cache::{CacheStats, CachedSource};
pub use eastmoney::EastmoneySource;
pub use provider::{MarketDataSource, ProviderError};
pub use rate_limiter::{shared_limiter, RateLimiter, SharedRateLimiter};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

// ============================================================================
// Columns
// ============================================================================

/// Numeric columns carried from the snapshot into screening tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    /// Latest traded price (最新价)
    LastPrice,
    /// Change percentage versus previous close (涨跌幅)
    ChangePct,
    /// Total market capitalisation in yuan (总市值)
    MarketCap,
    /// Volume ratio (量比)
    VolumeRatio,
    /// Turnover rate in percent (换手率)
    TurnoverRate,
    /// Intraday amplitude in percent (振幅)
    Amplitude,
    /// Turnover amount in yuan (成交额)
    Amount,
    /// Change percentage of the sector the row was fused under
    SectorPctChg,
}

impl Column {
    /// Every column, in canonical order.
    pub const ALL: [Column; 8] = [
        Column::LastPrice,
        Column::ChangePct,
        Column::MarketCap,
        Column::VolumeRatio,
        Column::TurnoverRate,
        Column::Amplitude,
        Column::Amount,
        Column::SectorPctChg,
    ];

    /// Stable snake_case identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LastPrice => "last_price",
            Self::ChangePct => "change_pct",
            Self::MarketCap => "market_cap",
            Self::VolumeRatio => "volume_ratio",
            Self::TurnoverRate => "turnover_rate",
            Self::Amplitude => "amplitude",
            Self::Amount => "amount",
            Self::SectorPctChg => "sector_pct_chg",
        }
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Sector Ranking
// ============================================================================

/// One ranked sector (concept board).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorRank {
    /// Board name (e.g., "人形机器人")
    pub name: String,
    /// Board code (e.g., "BK1184")
    pub code: String,
    /// Aggregate change percentage of the board
    pub change_pct: f64,
}

impl SectorRank {
    pub fn new(name: impl Into<String>, code: impl Into<String>, change_pct: f64) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
            change_pct,
        }
    }
}

/// A concept board by code and name, as listed by a stock's board index
/// or the popular-board ranking.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoardRef {
    pub code: String,
    pub name: String,
}

impl BoardRef {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }
}

/// Sectors ordered by change percentage, descending.
///
/// Construction enforces the order and the `top_n` truncation, so every
/// value of this type satisfies both regardless of what the source returned.
/// Entries without a finite change percentage cannot be ranked and are dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SectorRanking {
    entries: Vec<SectorRank>,
}

impl SectorRanking {
    /// Rank `entries` and keep the first `top_n`.
    pub fn new(entries: Vec<SectorRank>, top_n: usize) -> Self {
        let mut seen = HashSet::new();
        let mut entries: Vec<SectorRank> = entries
            .into_iter()
            .filter(|e| e.change_pct.is_finite())
            .filter(|e| seen.insert(e.name.clone()))
            .collect();

        // Stable: equal gains keep upstream order
        entries.sort_by(|a, b| {
            b.change_pct
                .partial_cmp(&a.change_pct)
                .unwrap_or(Ordering::Equal)
        });
        entries.truncate(top_n);

        Self { entries }
    }

    pub fn entries(&self) -> &[SectorRank] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &SectorRank> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sector names in rank order.
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    /// Look up a sector by name.
    pub fn get(&self, name: &str) -> Option<&SectorRank> {
        self.entries.iter().find(|e| e.name == name)
    }
}

// ============================================================================
// Market Snapshot
// ============================================================================

/// Raw spot quote for one equity.
///
/// Numeric fields keep the upstream cell as-is; upstreams emit placeholders
/// such as `"-"` for suspended stocks, and only the normalizer decides what
/// a cell is worth. A column missing from `values` was not supplied at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotQuote {
    /// Equity code (e.g., "600519")
    pub code: String,
    /// Display name (e.g., "贵州茅台")
    pub name: String,
    /// Raw numeric cells by column
    #[serde(default)]
    pub values: BTreeMap<Column, Value>,
}

impl SpotQuote {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            values: BTreeMap::new(),
        }
    }

    /// Builder-style setter for a raw cell.
    pub fn with(mut self, column: Column, value: impl Into<Value>) -> Self {
        self.values.insert(column, value.into());
        self
    }
}

/// Whole-market spot data keyed by equity code.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketSnapshot {
    quotes: HashMap<String, SpotQuote>,
}

impl MarketSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a quote, replacing any earlier quote for the same code.
    pub fn insert(&mut self, quote: SpotQuote) {
        self.quotes.insert(quote.code.clone(), quote);
    }

    pub fn get(&self, code: &str) -> Option<&SpotQuote> {
        self.quotes.get(code)
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    /// Quotes in code order.
    pub fn sorted_quotes(&self) -> Vec<&SpotQuote> {
        let mut quotes: Vec<&SpotQuote> = self.quotes.values().collect();
        quotes.sort_by(|a, b| a.code.cmp(&b.code));
        quotes
    }
}

impl FromIterator<SpotQuote> for MarketSnapshot {
    fn from_iter<I: IntoIterator<Item = SpotQuote>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for quote in iter {
            snapshot.insert(quote);
        }
        snapshot
    }
}

// ============================================================================
// Sector Constituency
// ============================================================================

/// Member codes of one sector, deduplicated, in upstream order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstituentSet {
    codes: Vec<String>,
}

impl ConstituentSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.codes.iter().any(|c| c == code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.codes.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ConstituentSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut seen = HashSet::new();
        let codes = iter
            .into_iter()
            .map(Into::into)
            .filter(|c: &String| seen.insert(c.clone()))
            .collect();
        Self { codes }
    }
}

/// Sector name → constituent codes for one refresh.
///
/// Only sectors whose retrieval succeeded are present. `get` returning `None`
/// means "unknown, try again"; `Some` of an empty set means the sector really
/// has no members.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectorConstituency {
    sectors: HashMap<String, ConstituentSet>,
}

impl SectorConstituency {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, sector: impl Into<String>, constituents: ConstituentSet) {
        self.sectors.insert(sector.into(), constituents);
    }

    pub fn get(&self, sector: &str) -> Option<&ConstituentSet> {
        self.sectors.get(sector)
    }

    pub fn contains(&self, sector: &str) -> bool {
        self.sectors.contains_key(sector)
    }

    pub fn len(&self) -> usize {
        self.sectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sectors.is_empty()
    }

    pub fn sectors(&self) -> impl Iterator<Item = &str> {
        self.sectors.keys().map(String::as_str)
    }
}

// ============================================================================
// Tests
// ============================================================================
