//! In-memory market data source shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use sector_hunter::data::{
    BoardRef, Column, ConstituentSet, MarketDataSource, MarketSnapshot, ProviderError,
    SectorRank, SpotQuote,
};

/// Configurable mock source with call counters.
#[derive(Default)]
pub struct MockSource {
    pub ranking: Vec<SectorRank>,
    pub snapshot: MarketSnapshot,
    pub members: HashMap<String, Vec<String>>,
    pub failing_sectors: HashSet<String>,
    /// Concept boards keyed by stock code
    pub stock_boards: HashMap<String, Vec<BoardRef>>,
    pub popular_boards: Vec<BoardRef>,
    pub fail_ranking: bool,
    pub fail_snapshot: bool,
    pub fail_popular: bool,
    pub fail_health: bool,
    /// Delay applied to every constituent fetch
    pub latency: Duration,

    pub ranking_calls: AtomicUsize,
    pub snapshot_calls: AtomicUsize,
    pub constituent_calls: AtomicUsize,
    pub completed_constituents: AtomicUsize,
    pub board_calls: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl MockSource {
    pub fn with_sector(mut self, name: &str, change_pct: f64, members: &[&str]) -> Self {
        self.ranking
            .push(SectorRank::new(name, format!("BK{:04}", self.ranking.len()), change_pct));
        self.members
            .insert(name.to_string(), members.iter().map(|m| m.to_string()).collect());
        self
    }

    pub fn with_failing_sector(mut self, name: &str, change_pct: f64) -> Self {
        self.ranking
            .push(SectorRank::new(name, format!("BK{:04}", self.ranking.len()), change_pct));
        self.failing_sectors.insert(name.to_string());
        self
    }

    pub fn with_snapshot(mut self, quotes: Vec<SpotQuote>) -> Self {
        self.snapshot = quotes.into_iter().collect();
        self
    }

    pub fn with_stock_boards(mut self, code: &str, boards: &[(&str, &str)]) -> Self {
        self.stock_boards.insert(
            code.to_string(),
            boards.iter().map(|(c, n)| BoardRef::new(*c, *n)).collect(),
        );
        self
    }

    pub fn with_popular_boards(mut self, boards: &[(&str, &str)]) -> Self {
        self.popular_boards = boards.iter().map(|(c, n)| BoardRef::new(*c, *n)).collect();
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketDataSource for MockSource {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        if self.fail_health {
            return Err(ProviderError::Unavailable("mock maintenance".into()));
        }
        Ok(())
    }

    /// Returns the ranking unsorted and untruncated; ordering is the
    /// pipeline's job.
    async fn fetch_sector_ranking(&self, _top_n: usize) -> Result<Vec<SectorRank>, ProviderError> {
        self.ranking_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_ranking {
            return Err(ProviderError::Network("mock ranking failure".into()));
        }
        Ok(self.ranking.clone())
    }

    async fn fetch_market_snapshot(&self) -> Result<MarketSnapshot, ProviderError> {
        self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_snapshot {
            return Err(ProviderError::Unavailable("mock snapshot failure".into()));
        }
        Ok(self.snapshot.clone())
    }

    async fn fetch_sector_constituents(
        &self,
        sector_name: &str,
    ) -> Result<ConstituentSet, ProviderError> {
        self.constituent_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed_constituents.fetch_add(1, Ordering::SeqCst);

        if self.failing_sectors.contains(sector_name) {
            return Err(ProviderError::Network(format!("mock failure for {}", sector_name)));
        }
        self.members
            .get(sector_name)
            .map(|codes| codes.iter().cloned().collect())
            .ok_or_else(|| ProviderError::DataNotAvailable(sector_name.to_string()))
    }

    async fn fetch_stock_boards(&self, code: &str) -> Result<Vec<BoardRef>, ProviderError> {
        self.board_calls.fetch_add(1, Ordering::SeqCst);
        self.stock_boards
            .get(code)
            .cloned()
            .ok_or_else(|| ProviderError::DataNotAvailable(code.to_string()))
    }

    async fn fetch_popular_boards(&self) -> Result<Vec<BoardRef>, ProviderError> {
        self.board_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_popular {
            return Err(ProviderError::Network("mock popular board failure".into()));
        }
        Ok(self.popular_boards.clone())
    }
}

pub fn quote(code: &str, name: &str, change: f64, cap: f64, turnover: f64, volume_ratio: f64) -> SpotQuote {
    SpotQuote::new(code, name)
        .with(Column::LastPrice, 10.0)
        .with(Column::ChangePct, change)
        .with(Column::MarketCap, cap)
        .with(Column::TurnoverRate, turnover)
        .with(Column::VolumeRatio, volume_ratio)
        .with(Column::Amplitude, 3.0)
        .with(Column::Amount, cap / 100.0)
}

/// Three ranked sectors:
///
/// - 机器人 (+5.0): leader 000001, ST name 000002, laggards 000003/000004,
///   unparseable cap 000005, delisted 000099
/// - 算力 (+3.0): constituent fetch fails
/// - 芯片 (+1.0): no members
///
/// Hot list gainers are 000001 and 000002; of their boards, 人形机器人 and
/// 人工智能 are popular.
pub fn market() -> MockSource {
    MockSource::default()
        .with_failing_sector("算力", 3.0)
        .with_sector("芯片", 1.0, &[])
        .with_sector(
            "机器人",
            5.0,
            &["000001", "000002", "000003", "000004", "000005", "000099"],
        )
        .with_snapshot(vec![
            quote("000001", "龙头股份", 10.0, 5.0e10, 8.0, 3.0),
            quote("000002", "ST星辰", 9.9, 2.0e9, 6.0, 2.5),
            quote("000003", "补涨一号", 1.5, 5.0e9, 4.0, 2.0),
            quote("000004", "补涨二号", 0.5, 8.0e9, 6.0, 0.8),
            SpotQuote::new("000005", "次新科技")
                .with(Column::ChangePct, "-")
                .with(Column::MarketCap, "-")
                .with(Column::Amount, 3.0e9),
            quote("600000", "浦发银行", 0.2, 2.4e11, 0.3, 1.0),
        ])
        .with_stock_boards("000001", &[("BK1184", "人形机器人"), ("BK0800", "人工智能")])
        .with_stock_boards("000002", &[("BK0900", "ST板块"), ("BK1184", "人形机器人")])
        .with_popular_boards(&[("BK0800", "人工智能"), ("BK0500", "半导体"), ("BK1184", "人形机器人")])
}
