//! Sector screening core.
//!
//! Turns one refresh worth of upstream data into per-sector cohorts:
//!
//! 1. [`ConstituentResolver`] fetches sector memberships concurrently
//! 2. [`fuse`] joins each membership against the market snapshot
//! 3. [`normalize`] coerces raw cells into a [`StockTable`]
//! 4. [`CohortRules`] picks leaders, laggards and high-amplitude names
//! 5. [`SignalRegistry`] narrows laggards by the caller's selected signals
//!
//! [`ScreenerEngine`] drives all of it.

mod cohort;
mod engine;
mod fusion;
mod hot;
mod normalize;
mod resolver;
mod signals;
mod table;

pub use cohort::{CohortRules, YI};
pub use engine::{PipelineResult, ScreenerEngine, SectorReport};
pub use fusion::{fuse, FusedRow, FusedTable};
pub use hot::{popular_overlap, HotStocks};
pub use normalize::{coerce, normalize, normalize_requiring};
pub use resolver::{ConstituentResolver, Resolution, DEFAULT_MAX_CONCURRENCY};
pub use signals::{
    quantile, FnSignal, SectorDivergenceSignal, Signal, SignalDescriptor, SignalRegistry,
    SmallCapSignal, VolumeRatioSignal,
};
pub use table::{Cohort, Mask, StockRow, StockTable};
