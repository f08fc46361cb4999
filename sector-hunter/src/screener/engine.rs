//! Refresh pipeline.
//!
//! ranking → (snapshot ‖ constituents) → fuse → normalize → cohorts/signals,
//! then the hot list and its board overlap from the same snapshot.
//! Upstream failures never escape: a failed ranking or snapshot yields an
//! empty result, a failed sector is listed in `unavailable`, a failed board
//! lookup only empties the overlap.

use chrono::{DateTime, Utc};
use sector_common::config::ScreenerConfig;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::data::{BoardRef, MarketDataSource, MarketSnapshot, SectorRanking};

use super::cohort::{CohortRules, YI};
use super::fusion::fuse;
use super::hot::{popular_overlap, HotStocks};
use super::normalize::normalize;
use super::resolver::{ConstituentResolver, Resolution};
use super::signals::SignalRegistry;
use super::table::{Cohort, StockTable};

// ============================================================================
// Sector Report
// ============================================================================

/// Classification of one sector for one refresh.
///
/// Owns the normalized table; cohorts are index views into it.
#[derive(Debug, Clone)]
pub struct SectorReport {
    pub sector: String,
    /// Sector change percentage from the ranking
    pub change_pct: f64,
    pub table: StockTable,
    leaders: Vec<usize>,
    laggards: Vec<usize>,
    signaled: Vec<usize>,
    amplitude: Vec<usize>,
}

impl SectorReport {
    /// Classify `table`.
    ///
    /// `signaled` is the laggard cohort narrowed by the selected signals,
    /// which are evaluated over the whole sector table.
    pub fn classify<S: AsRef<str>>(
        sector: impl Into<String>,
        change_pct: f64,
        table: StockTable,
        rules: &CohortRules,
        registry: &SignalRegistry,
        selected: &[S],
        cap_limit: f64,
    ) -> Self {
        let (leaders, laggards, signaled, amplitude) = {
            let leaders = rules.leaders(&table);
            let laggards = rules.laggards(&table, cap_limit);
            let signaled = laggards.intersect(&registry.mask(&table, selected));
            let amplitude = rules.amplitude(&table);
            (
                leaders.indices().to_vec(),
                laggards.indices().to_vec(),
                signaled.indices().to_vec(),
                amplitude.indices().to_vec(),
            )
        };

        Self {
            sector: sector.into(),
            change_pct,
            table,
            leaders,
            laggards,
            signaled,
            amplitude,
        }
    }

    pub fn leaders(&self) -> Cohort<'_> {
        Cohort::from_indices(&self.table, self.leaders.clone())
    }

    pub fn laggards(&self) -> Cohort<'_> {
        Cohort::from_indices(&self.table, self.laggards.clone())
    }

    pub fn signaled(&self) -> Cohort<'_> {
        Cohort::from_indices(&self.table, self.signaled.clone())
    }

    pub fn amplitude(&self) -> Cohort<'_> {
        Cohort::from_indices(&self.table, self.amplitude.clone())
    }
}

// ============================================================================
// Pipeline Result
// ============================================================================

/// Everything one refresh produced.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub refresh_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub ranking: SectorRanking,
    /// Sectors with known constituents, in ranking order
    pub sectors: Vec<SectorReport>,
    /// Ranked sectors whose constituents could not be retrieved
    pub unavailable: Vec<String>,
    pub hot: HotStocks,
}

impl PipelineResult {
    fn empty(refresh_id: Uuid, ranking: SectorRanking) -> Self {
        Self {
            refresh_id,
            generated_at: Utc::now(),
            ranking,
            sectors: Vec::new(),
            unavailable: Vec::new(),
            hot: HotStocks::default(),
        }
    }

    pub fn get(&self, sector: &str) -> Option<&SectorReport> {
        self.sectors.iter().find(|r| r.sector == sector)
    }

    /// Reports keyed by sector name.
    pub fn by_sector(&self) -> HashMap<&str, &SectorReport> {
        self.sectors.iter().map(|r| (r.sector.as_str(), r)).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sectors.is_empty()
    }
}

// ============================================================================
// Screener Engine
// ============================================================================

/// Runs refreshes against one data source.
pub struct ScreenerEngine {
    source: Arc<dyn MarketDataSource>,
    resolver: ConstituentResolver,
    registry: Arc<SignalRegistry>,
    rules: CohortRules,
    hot_stock_count: usize,
}

impl ScreenerEngine {
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        registry: Arc<SignalRegistry>,
        config: &ScreenerConfig,
    ) -> Self {
        Self {
            resolver: ConstituentResolver::new(Arc::clone(&source), config.max_concurrency),
            source,
            registry,
            rules: CohortRules::from(config),
            hot_stock_count: config.hot_stock_count,
        }
    }

    pub fn registry(&self) -> &SignalRegistry {
        &self.registry
    }

    pub fn rules(&self) -> &CohortRules {
        &self.rules
    }

    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    /// Run one refresh.
    ///
    /// `cap_limit_yi` is the laggard market-cap ceiling in units of 亿.
    pub async fn run_pipeline<S: AsRef<str>>(
        &self,
        top_n: usize,
        selected: &[S],
        cap_limit_yi: f64,
    ) -> PipelineResult {
        let refresh_id = Uuid::new_v4();
        let span = info_span!("refresh", refresh_id = %refresh_id, top_n);

        self.refresh(refresh_id, top_n, selected, cap_limit_yi)
            .instrument(span)
            .await
    }

    /// Run one refresh unless `cancel` completes first.
    ///
    /// On cancellation in-flight constituent fetches are aborted and `None`
    /// is returned without waiting for them.
    pub async fn run_until<S, F>(
        &self,
        top_n: usize,
        selected: &[S],
        cap_limit_yi: f64,
        cancel: F,
    ) -> Option<PipelineResult>
    where
        S: AsRef<str>,
        F: Future<Output = ()>,
    {
        tokio::select! {
            result = self.run_pipeline(top_n, selected, cap_limit_yi) => Some(result),
            _ = cancel => {
                info!("Refresh superseded");
                None
            }
        }
    }

    async fn refresh<S: AsRef<str>>(
        &self,
        refresh_id: Uuid,
        top_n: usize,
        selected: &[S],
        cap_limit_yi: f64,
    ) -> PipelineResult {
        let started = Instant::now();

        let ranking = match self.source.fetch_sector_ranking(top_n).await {
            Ok(entries) => SectorRanking::new(entries, top_n),
            Err(e) => {
                warn!(error = %e, source = self.source.name(), "Sector ranking unavailable");
                SectorRanking::default()
            }
        };
        if ranking.is_empty() {
            warn!("No ranked sectors, returning empty result");
            return PipelineResult::empty(refresh_id, ranking);
        }

        let names = ranking.names();
        let (snapshot, resolution) = tokio::join!(self.fetch_snapshot(), self.resolver.resolve(&names));
        if snapshot.is_empty() {
            warn!("Market snapshot empty, returning empty result");
            return PipelineResult::empty(refresh_id, ranking);
        }

        let cap_limit = cap_limit_yi * YI;
        let Resolution {
            constituency,
            failed,
        } = resolution;

        let mut sectors = Vec::with_capacity(ranking.len());
        for rank in ranking.iter() {
            let Some(members) = constituency.get(&rank.name) else {
                continue;
            };

            let table = normalize(&fuse(Some(members), &snapshot, rank.change_pct));
            let report = SectorReport::classify(
                rank.name.clone(),
                rank.change_pct,
                table,
                &self.rules,
                &self.registry,
                selected,
                cap_limit,
            );

            debug!(
                sector = %rank.name,
                members = members.len(),
                rows = report.table.len(),
                leaders = report.leaders.len(),
                laggards = report.laggards.len(),
                signaled = report.signaled.len(),
                "Classified sector"
            );
            sectors.push(report);
        }

        let mut hot = HotStocks::from_snapshot(&snapshot, self.hot_stock_count);
        hot.hot_boards = self.hot_boards(&hot.top_gainers).await;

        info!(
            sectors = sectors.len(),
            unavailable = failed.len(),
            snapshot = snapshot.len(),
            hot_boards = hot.hot_boards.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Refresh complete"
        );

        PipelineResult {
            refresh_id,
            generated_at: Utc::now(),
            ranking,
            sectors,
            unavailable: failed,
            hot,
        }
    }

    /// Boards shared by the gainers and the popular-board ranking.
    async fn hot_boards(&self, gainers: &[String]) -> Vec<BoardRef> {
        if gainers.is_empty() {
            return Vec::new();
        }

        let (popular, gainer_boards) =
            tokio::join!(self.source.fetch_popular_boards(), self.gainer_boards(gainers));

        match popular {
            Ok(popular) => popular_overlap(&gainer_boards, &popular),
            Err(e) => {
                warn!(error = %e, source = self.source.name(), "Popular boards unavailable");
                Vec::new()
            }
        }
    }

    /// Boards of every gainer, concatenated in gainer order. Gainers whose
    /// lookup fails contribute nothing.
    async fn gainer_boards(&self, gainers: &[String]) -> Vec<BoardRef> {
        let mut tasks = JoinSet::new();
        for (rank, code) in gainers.iter().enumerate() {
            let source = Arc::clone(&self.source);
            let code = code.clone();
            tasks.spawn(async move {
                let boards = source.fetch_stock_boards(&code).await;
                (rank, code, boards)
            });
        }

        let mut found: Vec<(usize, Vec<BoardRef>)> = Vec::with_capacity(gainers.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((rank, _, Ok(boards))) => found.push((rank, boards)),
                Ok((_, code, Err(e))) => warn!(code = %code, error = %e, "Stock boards unavailable"),
                Err(e) => warn!(error = %e, "Stock board task did not complete"),
            }
        }

        found.sort_by_key(|(rank, _)| *rank);
        found.into_iter().flat_map(|(_, boards)| boards).collect()
    }

    async fn fetch_snapshot(&self) -> MarketSnapshot {
        match self.source.fetch_market_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, source = self.source.name(), "Market snapshot unavailable");
                MarketSnapshot::new()
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
