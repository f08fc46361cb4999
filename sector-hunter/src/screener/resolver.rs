//! Concurrent constituent retrieval.
//!
//! One task per sector, at most `max_concurrency` upstream calls in flight.
//! Each task reports its own outcome, so one failing sector never aborts the
//! others; failed sectors are simply missing from the resulting
//! [`SectorConstituency`].

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::data::{ConstituentSet, MarketDataSource, ProviderError, SectorConstituency};

/// Default cap on in-flight constituent requests.
pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// Outcome of one fan-out.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Sectors whose retrieval succeeded
    pub constituency: SectorConstituency,
    /// Sectors whose retrieval failed, in request order
    pub failed: Vec<String>,
}

/// Fetches sector memberships in parallel through a bounded pool.
pub struct ConstituentResolver {
    source: Arc<dyn MarketDataSource>,
    max_concurrency: usize,
}

impl ConstituentResolver {
    pub fn new(source: Arc<dyn MarketDataSource>, max_concurrency: usize) -> Self {
        Self {
            source,
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Resolve every sector. Never fails; see [`Resolution::failed`].
    pub async fn resolve(&self, sectors: &[String]) -> Resolution {
        let mut seen = HashSet::new();
        let mut unique: Vec<&String> = Vec::with_capacity(sectors.len());
        for sector in sectors {
            if seen.insert(sector.as_str()) {
                unique.push(sector);
            }
        }

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks: JoinSet<(String, Result<ConstituentSet, ProviderError>)> = JoinSet::new();

        for sector in &unique {
            let source = Arc::clone(&self.source);
            let semaphore = Arc::clone(&semaphore);
            let sector = (*sector).clone();

            tasks.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => source.fetch_sector_constituents(&sector).await,
                    Err(_) => Err(ProviderError::Internal("worker pool closed".into())),
                };
                (sector, result)
            });
        }

        let mut constituency = SectorConstituency::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((sector, Ok(members))) => {
                    debug!(sector = %sector, members = members.len(), "Resolved constituents");
                    constituency.insert(sector, members);
                }
                Ok((sector, Err(e))) => {
                    warn!(sector = %sector, error = %e, "Constituent fetch failed");
                }
                Err(e) => {
                    warn!(error = %e, "Constituent task did not complete");
                }
            }
        }

        // Panicked tasks lose their name, so derive failures from what is missing
        let failed: Vec<String> = unique
            .into_iter()
            .filter(|s| !constituency.contains(s))
            .cloned()
            .collect();

        Resolution {
            constituency,
            failed,
        }
    }

    /// Like [`resolve`](Self::resolve), but gives up as soon as `cancel`
    /// completes. Pending tasks are aborted and partial results discarded.
    pub async fn resolve_until<F>(&self, sectors: &[String], cancel: F) -> Option<Resolution>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            resolution = self.resolve(sectors) => Some(resolution),
            _ = cancel => {
                info!(sectors = sectors.len(), "Constituent resolution cancelled");
                None
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
