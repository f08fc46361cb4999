//! HTTP routes for the sector hunter.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};
use sector_common::Error;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::data::{MarketDataSource, SectorRank};
use crate::screener::{HotStocks, PipelineResult, SectorReport, SignalDescriptor, StockTable};
use crate::HunterState;

/// Largest `top_n` a caller may request.
pub const MAX_TOP_N: usize = 10;

/// Upper bound on the upstream check behind `/health`.
const HEALTH_CHECK_TIMEOUT_SECS: u64 = 5;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub service: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SignalsResponse {
    pub signals: Vec<SignalDescriptor>,
    pub count: usize,
    /// Signals applied when a request does not choose any
    pub default_signals: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SectorView {
    pub sector: String,
    pub change_pct: f64,
    /// Rows that survived fusion and normalization
    pub members: usize,
    pub leaders: StockTable,
    pub laggards: StockTable,
    pub signaled: StockTable,
    pub amplitude: StockTable,
}

impl From<&SectorReport> for SectorView {
    fn from(report: &SectorReport) -> Self {
        Self {
            sector: report.sector.clone(),
            change_pct: report.change_pct,
            members: report.table.len(),
            leaders: report.leaders().to_table(),
            laggards: report.laggards().to_table(),
            signaled: report.signaled().to_table(),
            amplitude: report.amplitude().to_table(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SectorsResponse {
    pub refresh_id: String,
    pub generated_at: String,
    pub signals: Vec<String>,
    pub cap_limit_yi: f64,
    pub ranking: Vec<SectorRank>,
    pub sectors: Vec<SectorView>,
    pub unavailable: Vec<String>,
    pub hot: HotStocks,
}

impl SectorsResponse {
    fn new(result: &PipelineResult, signals: Vec<String>, cap_limit_yi: f64) -> Self {
        Self {
            refresh_id: result.refresh_id.to_string(),
            generated_at: result.generated_at.to_rfc3339(),
            signals,
            cap_limit_yi,
            ranking: result.ranking.entries().to_vec(),
            sectors: result.sectors.iter().map(SectorView::from).collect(),
            unavailable: result.unavailable.clone(),
            hot: result.hot.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn status_of(e: &Error) -> StatusCode {
    StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn api_error(e: Error) -> ApiError {
    (
        status_of(&e),
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}

// ============================================================================
// Query Types
// ============================================================================

/// Query for `/api/v1/sectors`.
#[derive(Debug, Default, Deserialize)]
pub struct SectorsQuery {
    pub top_n: Option<usize>,
    /// Comma-separated signal ids; empty selects none
    pub signals: Option<String>,
    pub cap_limit_yi: Option<f64>,
    #[serde(default)]
    pub refresh: bool,
}

/// Validated request parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SectorsRequest {
    pub top_n: usize,
    pub signals: Vec<String>,
    pub cap_limit_yi: f64,
    pub refresh: bool,
}

impl SectorsQuery {
    /// Fill defaults from configuration and validate.
    pub fn resolve(self, state: &HunterState) -> sector_common::Result<SectorsRequest> {
        let screener = &state.config.screener;

        let top_n = self.top_n.unwrap_or(screener.top_n);
        if !(1..=MAX_TOP_N).contains(&top_n) {
            return Err(Error::InvalidInput(format!(
                "top_n must be between 1 and {}, got {}",
                MAX_TOP_N, top_n
            )));
        }

        let cap_limit_yi = self.cap_limit_yi.unwrap_or(screener.cap_limit_yi);
        if !cap_limit_yi.is_finite() || cap_limit_yi <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "cap_limit_yi must be a positive number, got {}",
                cap_limit_yi
            )));
        }

        let signals = match self.signals {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            None => screener.default_signals.clone(),
        };

        Ok(SectorsRequest {
            top_n,
            signals,
            cap_limit_yi,
            refresh: self.refresh,
        })
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Health check endpoint. Checks the upstream; 503/502/504 when it fails.
pub async fn health(State(state): State<Arc<HunterState>>) -> (StatusCode, Json<HealthResponse>) {
    let check = tokio::time::timeout(
        Duration::from_secs(HEALTH_CHECK_TIMEOUT_SECS),
        state.cache.health_check(),
    )
    .await;

    let failure = match check {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(Error::from(e)),
        Err(_) => Some(Error::Timeout(HEALTH_CHECK_TIMEOUT_SECS)),
    };

    let (code, status) = match &failure {
        None => (StatusCode::OK, "healthy"),
        Some(e) => {
            warn!(error = %e, "Health check failed");
            (status_of(e), "unhealthy")
        }
    };

    (
        code,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            service: "sector-hunter".to_string(),
            source: state.engine.source_name().to_string(),
            source_error: failure.map(|e| e.to_string()),
        }),
    )
}

/// List registered signals
pub async fn get_signals(State(state): State<Arc<HunterState>>) -> Json<SignalsResponse> {
    let signals = state.engine.registry().descriptors();
    let count = signals.len();

    Json(SignalsResponse {
        signals,
        count,
        default_signals: state.config.screener.default_signals.clone(),
    })
}

/// Run a refresh and return per-sector cohorts
pub async fn get_sectors(
    State(state): State<Arc<HunterState>>,
    Query(query): Query<SectorsQuery>,
) -> Result<Json<SectorsResponse>, ApiError> {
    let request = query.resolve(&state).map_err(api_error)?;

    if request.refresh {
        state.cache.invalidate_all();
    }

    let result = state
        .engine
        .run_pipeline(request.top_n, &request.signals, request.cap_limit_yi)
        .await;

    Ok(Json(SectorsResponse::new(
        &result,
        request.signals,
        request.cap_limit_yi,
    )))
}
