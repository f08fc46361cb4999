//! Sector Hunter - A-share sector rotation screener service.

use anyhow::{Context, Result};
use sector_common::config::Config;
use sector_common::logging::init_logging_with_exclusions;
use sector_hunter::HunterService;

#[tokio::main]
async fn main() -> Result<()> {
    let startup_start = std::time::Instant::now();

    let config = Config::load_with_env()?;
    config
        .validate()
        .context("Invalid configuration")?;

    init_logging_with_exclusions(
        &config.observability.log_level,
        &config.observability.log_format,
        &config.observability.excluded_targets,
    );

    tracing::info!("Sector Hunter v{}", env!("CARGO_PKG_VERSION"));

    let service = HunterService::new(config);

    let startup_duration = startup_start.elapsed();
    tracing::info!(
        duration_ms = startup_duration.as_millis() as u64,
        "Service initialized in {:?}",
        startup_duration
    );

    service.start().await
}
