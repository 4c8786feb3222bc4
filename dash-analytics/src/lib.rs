/// Dashboard Analytics - Shared Library
///
/// The computational core behind the trading dashboards. Every panel feeds a
/// batch of loosely shaped JSON records through the same pipeline:
/// - Record normalizer: alias-table lookups into canonical records
/// - Risk bucketer: liquidation-distance tiers
/// - Aggregator: per-key rollups, trade flow, net exposure and fill statistics
/// - Ranker: stable Top-N selection
/// - Streak analyzer: win/loss runs over chronological fills
///
/// Fetching and rendering stay with the caller.
pub mod shared;

// Re-export commonly used types for convenience
pub use shared::types::{
    decimal_to_f64, to_decimal, Fill, FillDirection, Liquidation, Position, PositionSide, Side,
    Trade, TraderSummary,
};

pub use shared::config::AnalyticsConfig;
pub use shared::error::NormalizeError;

pub use shared::normalize::{
    normalize, normalize_batch, normalize_position_sides, parse_direction, parse_number,
    parse_side, Normalize,
};

pub use shared::risk::{bucket_positions, RiskBuckets, RiskTier, TierTotals};

pub use shared::aggregation::{
    aggregate, aggregate_by, fill_stats, flow_summary, net_exposure, AggregateBucket,
    AggregateResult, Aggregatable, CoinExposure, ExposureReport, FillStats, FlowSummary, GroupBy,
    UNKNOWN_KEY,
};

pub use shared::ranking::{
    closest_to_liquidation, largest_by_pnl, largest_by_value, largest_losers, top_n, top_traders,
    RankOrder,
};

pub use shared::streak::{
    analyze_streaks, sort_chronologically, StreakAnalyzer, StreakKind, StreakReport,
};
