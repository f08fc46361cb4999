//! TTL cache in front of a market data source.
//!
//! The HTTP surface can be hit far more often than the upstream data moves,
//! so ranking, snapshot and constituent responses are kept for a short time.
//! Board lookups for the hot-stock overlap share the ranking TTL (popular
//! boards) and the constituent TTL (a stock's boards).
//! Only successful responses are stored; a failure is retried on the next
//! call.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

use sector_common::config::SourceConfig;

use super::provider::{MarketDataSource, ProviderError};
use super::{BoardRef, ConstituentSet, MarketSnapshot, SectorRank};

/// Cache entry with TTL
#[derive(Debug, Clone)]
struct CacheEntry<T> {
    data: T,
    expires_at: DateTime<Utc>,
}

impl<T: Clone> CacheEntry<T> {
    fn new(data: T, ttl_secs: i64) -> Self {
        Self {
            data,
            expires_at: Utc::now() + Duration::seconds(ttl_secs),
        }
    }

    fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    fn fresh(&self) -> Option<T> {
        (!self.is_expired()).then(|| self.data.clone())
    }
}

/// A keyed set of entries sharing one TTL. A TTL of zero disables caching.
struct TtlMap<K, V> {
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
    ttl_secs: i64,
}

impl<K: std::hash::Hash + Eq, V: Clone> TtlMap<K, V> {
    fn new(ttl_secs: i64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl_secs,
        }
    }

    fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: std::borrow::Borrow<Q>,
        Q: std::hash::Hash + Eq + ?Sized,
    {
        self.entries.read().ok()?.get(key)?.fresh()
    }

    fn set(&self, key: K, value: V) {
        if self.ttl_secs <= 0 {
            return;
        }
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key, CacheEntry::new(value, self.ttl_secs));
        }
    }

    fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    /// (total, expired)
    fn counts(&self) -> (usize, usize) {
        self.entries
            .read()
            .map(|e| (e.len(), e.values().filter(|v| v.is_expired()).count()))
            .unwrap_or((0, 0))
    }
}

/// Caching decorator for any [`MarketDataSource`].
pub struct CachedSource {
    inner: Arc<dyn MarketDataSource>,
    /// Ranking keyed by requested `top_n`
    ranking: TtlMap<usize, Vec<SectorRank>>,
    /// Single whole-market entry
    snapshot: TtlMap<(), MarketSnapshot>,
    /// Constituents keyed by sector name
    constituents: TtlMap<String, ConstituentSet>,
    /// Boards keyed by stock code
    stock_boards: TtlMap<String, Vec<BoardRef>>,
    popular_boards: TtlMap<(), Vec<BoardRef>>,
}

impl CachedSource {
    /// Wrap `inner` with the default TTLs.
    pub fn new(inner: Arc<dyn MarketDataSource>) -> Self {
        Self::from_config(inner, &SourceConfig::default())
    }

    /// Wrap `inner` using the TTLs from source configuration.
    pub fn from_config(inner: Arc<dyn MarketDataSource>, config: &SourceConfig) -> Self {
        Self::with_ttls(
            inner,
            config.ranking_ttl_secs,
            config.snapshot_ttl_secs,
            config.constituents_ttl_secs,
        )
    }

    /// Wrap `inner` with explicit TTLs in seconds.
    pub fn with_ttls(
        inner: Arc<dyn MarketDataSource>,
        ranking_ttl_secs: i64,
        snapshot_ttl_secs: i64,
        constituents_ttl_secs: i64,
    ) -> Self {
        Self {
            inner,
            ranking: TtlMap::new(ranking_ttl_secs),
            snapshot: TtlMap::new(snapshot_ttl_secs),
            constituents: TtlMap::new(constituents_ttl_secs),
            stock_boards: TtlMap::new(constituents_ttl_secs),
            popular_boards: TtlMap::new(ranking_ttl_secs),
        }
    }

    /// Drop every cached response.
    pub fn invalidate_all(&self) {
        self.ranking.clear();
        self.snapshot.clear();
        self.constituents.clear();
        self.stock_boards.clear();
        self.popular_boards.clear();
        debug!(source = self.inner.name(), "Cache invalidated");
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let (total, expired) = [
            self.ranking.counts(),
            self.snapshot.counts(),
            self.constituents.counts(),
            self.stock_boards.counts(),
            self.popular_boards.counts(),
        ]
        .into_iter()
        .fold((0, 0), |acc, c| (acc.0 + c.0, acc.1 + c.1));

        CacheStats {
            total_entries: total,
            expired_entries: expired,
            active_entries: total - expired,
        }
    }
}

#[async_trait]
impl MarketDataSource for CachedSource {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        self.inner.health_check().await
    }

    async fn fetch_sector_ranking(&self, top_n: usize) -> Result<Vec<SectorRank>, ProviderError> {
        if let Some(hit) = self.ranking.get(&top_n) {
            debug!(top_n, "Ranking cache hit");
            return Ok(hit);
        }

        let ranks = self.inner.fetch_sector_ranking(top_n).await?;
        self.ranking.set(top_n, ranks.clone());
        Ok(ranks)
    }

    async fn fetch_market_snapshot(&self) -> Result<MarketSnapshot, ProviderError> {
        if let Some(hit) = self.snapshot.get(&()) {
            debug!(quotes = hit.len(), "Snapshot cache hit");
            return Ok(hit);
        }

        let snapshot = self.inner.fetch_market_snapshot().await?;
        self.snapshot.set((), snapshot.clone());
        Ok(snapshot)
    }

    async fn fetch_sector_constituents(
        &self,
        sector_name: &str,
    ) -> Result<ConstituentSet, ProviderError> {
        if let Some(hit) = self.constituents.get(sector_name) {
            return Ok(hit);
        }

        let members = self.inner.fetch_sector_constituents(sector_name).await?;
        self.constituents
            .set(sector_name.to_string(), members.clone());
        Ok(members)
    }

    async fn fetch_stock_boards(&self, code: &str) -> Result<Vec<BoardRef>, ProviderError> {
        if let Some(hit) = self.stock_boards.get(code) {
            return Ok(hit);
        }

        let boards = self.inner.fetch_stock_boards(code).await?;
        self.stock_boards.set(code.to_string(), boards.clone());
        Ok(boards)
    }

    async fn fetch_popular_boards(&self) -> Result<Vec<BoardRef>, ProviderError> {
        if let Some(hit) = self.popular_boards.get(&()) {
            return Ok(hit);
        }

        let boards = self.inner.fetch_popular_boards().await?;
        self.popular_boards.set((), boards.clone());
        Ok(boards)
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub total_entries: usize,
    pub expired_entries: usize,
    pub active_entries: usize,
}

// ============================================================================
// Tests
// ============================================================================
