//! Data source abstraction for sector rotation data.
//!
//! Defines the `MarketDataSource` trait every upstream implements. The
//! screening core only ever talks to this trait, so HTTP mechanics, payload
//! unwrapping and retry policy stay inside the adapters.

use async_trait::async_trait;
use std::fmt;

use super::{BoardRef, ConstituentSet, MarketSnapshot, SectorRank};

// ============================================================================
// Provider Error
// ============================================================================

/// Errors raised by market data sources.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Network error (connection failed, timeout)
    Network(String),
    /// Rate limit exceeded
    RateLimited { retry_after_secs: Option<u64> },
    /// Data not available for the requested sector or symbol
    DataNotAvailable(String),
    /// Source is temporarily unavailable
    Unavailable(String),
    /// Response could not be decoded
    Parse(String),
    /// Internal source error
    Internal(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "Network error: {}", msg),
            Self::RateLimited { retry_after_secs } => {
                write!(f, "Rate limited")?;
                if let Some(secs) = retry_after_secs {
                    write!(f, ", retry after {} seconds", secs)?;
                }
                Ok(())
            }
            Self::DataNotAvailable(msg) => write!(f, "Data not available: {}", msg),
            Self::Unavailable(msg) => write!(f, "Source unavailable: {}", msg),
            Self::Parse(msg) => write!(f, "Parse error: {}", msg),
            Self::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

impl ProviderError {
    /// Check if the error is worth retrying on the next refresh.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::RateLimited { .. } | Self::Unavailable(_)
        )
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Parse(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// Upstream trouble as seen by an HTTP caller: transient failures are
/// "unavailable", everything else is a bad upstream answer.
impl From<ProviderError> for sector_common::Error {
    fn from(e: ProviderError) -> Self {
        if e.is_recoverable() {
            Self::Unavailable(e.to_string())
        } else {
            Self::Upstream(e.to_string())
        }
    }
}

// ============================================================================
// Market Data Source Trait
// ============================================================================

/// Trait for upstream market data sources.
///
/// Implementations own their transport, retries and timeouts. Callers in
/// the screening core translate errors into "no data": a failed ranking or
/// snapshot becomes empty, a failed constituent fetch leaves the sector
/// absent.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Source name (e.g., "eastmoney")
    fn name(&self) -> &'static str;

    /// Lightweight availability check.
    async fn health_check(&self) -> Result<(), ProviderError>;

    /// Fetch the sector ranking, best performers first, at most `top_n`.
    async fn fetch_sector_ranking(&self, top_n: usize) -> Result<Vec<SectorRank>, ProviderError>;

    /// Fetch whole-market spot data, one quote per equity code.
    async fn fetch_market_snapshot(&self) -> Result<MarketSnapshot, ProviderError>;

    /// Fetch the member codes of one sector.
    ///
    /// `Ok` with an empty set means the sector has no members; any failure
    /// must be reported as `Err`.
    async fn fetch_sector_constituents(
        &self,
        sector_name: &str,
    ) -> Result<ConstituentSet, ProviderError>;

    /// Fetch the concept boards one stock belongs to.
    ///
    /// Default implementation reports the lookup as unsupported.
    async fn fetch_stock_boards(&self, code: &str) -> Result<Vec<BoardRef>, ProviderError> {
        Err(ProviderError::DataNotAvailable(format!(
            "{} has no board index for {}",
            self.name(),
            code
        )))
    }

    /// Fetch the boards currently most popular with retail traders, hottest
    /// first.
    ///
    /// Default implementation reports the lookup as unsupported.
    async fn fetch_popular_boards(&self) -> Result<Vec<BoardRef>, ProviderError> {
        Err(ProviderError::DataNotAvailable(format!(
            "{} has no popular board ranking",
            self.name()
        )))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_recoverable() {
        assert!(ProviderError::Network("timeout".into()).is_recoverable());
        assert!(ProviderError::RateLimited { retry_after_secs: Some(60) }.is_recoverable());
        assert!(ProviderError::Unavailable("maintenance".into()).is_recoverable());
        assert!(!ProviderError::Parse("bad json".into()).is_recoverable());
        assert!(!ProviderError::DataNotAvailable("no board".into()).is_recoverable());
    }

    #[test]
    fn test_http_error_mapping() {
        let transient: sector_common::Error = ProviderError::RateLimited {
            retry_after_secs: None,
        }
        .into();
        assert_eq!(transient.status_code(), 503);

        let broken: sector_common::Error = ProviderError::Parse("bad json".into()).into();
        assert_eq!(broken.status_code(), 502);
        assert!(broken.to_string().contains("bad json"));
    }

    #[tokio::test]
    async fn test_board_lookups_unsupported_by_default() {
        struct Bare;

        #[async_trait]
        impl MarketDataSource for Bare {
            fn name(&self) -> &'static str {
                "bare"
            }

            async fn health_check(&self) -> Result<(), ProviderError> {
                Ok(())
            }

            async fn fetch_sector_ranking(&self, _: usize) -> Result<Vec<SectorRank>, ProviderError> {
                Ok(Vec::new())
            }

            async fn fetch_market_snapshot(&self) -> Result<MarketSnapshot, ProviderError> {
                Ok(MarketSnapshot::new())
            }

            async fn fetch_sector_constituents(&self, _: &str) -> Result<ConstituentSet, ProviderError> {
                Ok(ConstituentSet::new())
            }
        }

        assert!(matches!(
            Bare.fetch_stock_boards("600000").await,
            Err(ProviderError::DataNotAvailable(_))
        ));
        assert!(Bare.fetch_popular_boards().await.is_err());
    }

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::RateLimited {
            retry_after_secs: Some(30),
        };
        assert!(err.to_string().contains("30 seconds"));

        let err = ProviderError::DataNotAvailable("unknown sector 算力".into());
        assert!(err.to_string().contains("算力"));
    }
}
