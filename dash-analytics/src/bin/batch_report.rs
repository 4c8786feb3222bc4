/// Batch Report
///
/// Reads one JSON payload from a file or stdin, runs it through the analytics
/// core and prints the resulting statistics as pretty JSON on stdout.
///
/// Usage: batch-report <positions|fills|trades|liquidations|traders> [PATH]
///
/// Tunables come from the environment (LARGE_TRADE_THRESHOLD, TOP_N,
/// AT_RISK_TIER); diagnostics go to stderr, filtered by RUST_LOG.
use std::{error::Error, fs, io};

use dash_analytics::{
    aggregate, analyze_streaks, bucket_positions, closest_to_liquidation, fill_stats,
    flow_summary, largest_by_value, largest_losers, net_exposure, normalize_batch,
    normalize_position_sides, sort_chronologically, top_n, top_traders, AggregateBucket,
    AggregateResult, AnalyticsConfig, ExposureReport, Fill, FillStats, FlowSummary, GroupBy,
    Liquidation, Position, RankOrder, RiskBuckets, RiskTier, StreakReport, TierTotals, Trade,
    TraderSummary,
};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

const USAGE: &str = "usage: batch-report <positions|fills|trades|liquidations|traders> [PATH]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReportKind {
    Positions,
    Fills,
    Trades,
    Liquidations,
    Traders,
}

impl ReportKind {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "positions" => Some(ReportKind::Positions),
            "fills" => Some(ReportKind::Fills),
            "trades" => Some(ReportKind::Trades),
            "liquidations" => Some(ReportKind::Liquidations),
            "traders" => Some(ReportKind::Traders),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct KeyedBucket<'a> {
    key: &'a str,
    #[serde(flatten)]
    bucket: &'a AggregateBucket,
}

fn keyed_rows(result: &AggregateResult) -> Vec<KeyedBucket<'_>> {
    result
        .sorted_by_value()
        .into_iter()
        .map(|(key, bucket)| KeyedBucket {
            key: key.as_str(),
            bucket,
        })
        .collect()
}

#[derive(Serialize)]
struct TierRow<'a> {
    tier: RiskTier,
    #[serde(flatten)]
    totals: &'a TierTotals,
}

#[derive(Serialize)]
struct RiskSummary<'a> {
    tiers: Vec<TierRow<'a>>,
    unknown: &'a TierTotals,
    at_risk_tier: RiskTier,
    at_risk_count: u64,
    at_risk_pct: f64,
    average_distance_pct: Option<f64>,
}

impl<'a> RiskSummary<'a> {
    fn new(buckets: &'a RiskBuckets, at_risk_tier: RiskTier) -> Self {
        Self {
            tiers: buckets
                .iter()
                .map(|(tier, totals)| TierRow { tier, totals })
                .collect(),
            unknown: &buckets.unknown,
            at_risk_tier,
            at_risk_count: buckets.at_risk_count(at_risk_tier),
            at_risk_pct: buckets.at_risk_pct(at_risk_tier),
            average_distance_pct: buckets.average_distance(),
        }
    }
}

#[derive(Serialize)]
struct PositionsReport<'a> {
    position_count: usize,
    risk: RiskSummary<'a>,
    by_coin: Vec<KeyedBucket<'a>>,
    exposure: ExposureReport,
    closest_to_liquidation: Vec<&'a Position>,
    largest_by_value: Vec<&'a Position>,
    largest_losers: Vec<&'a Position>,
}

#[derive(Serialize)]
struct FillsReport {
    stats: FillStats,
    streaks: StreakReport,
}

#[derive(Serialize)]
struct TradesReport<'a> {
    flow: FlowSummary,
    by_coin: Vec<KeyedBucket<'a>>,
    largest_trades: Vec<&'a Trade>,
}

#[derive(Serialize)]
struct LiquidationsReport<'a> {
    liquidation_count: u64,
    totals: AggregateBucket,
    by_coin: Vec<KeyedBucket<'a>>,
    largest: Vec<&'a Liquidation>,
}

#[derive(Serialize)]
struct TradersReport<'a> {
    trader_count: usize,
    top: Vec<&'a TraderSummary>,
}

fn main() -> Result<(), Box<dyn Error>> {
    init_logging();

    let mut args = std::env::args().skip(1);
    let kind = args
        .next()
        .as_deref()
        .and_then(ReportKind::parse)
        .ok_or(USAGE)?;
    let path = args.next();

    let raw = match path.as_deref() {
        Some(path) => fs::read_to_string(path)?,
        None => io::read_to_string(io::stdin())?,
    };
    let payload: Value = serde_json::from_str(&raw)?;
    let config = AnalyticsConfig::global();

    info!(?kind, source = path.as_deref().unwrap_or("stdin"), "building report");

    let report = match kind {
        ReportKind::Positions => positions_report(&payload, config)?,
        ReportKind::Fills => fills_report(&payload)?,
        ReportKind::Trades => trades_report(&payload, config)?,
        ReportKind::Liquidations => liquidations_report(&payload, config)?,
        ReportKind::Traders => traders_report(&payload, config)?,
    };

    println!("{report}");
    Ok(())
}

fn positions_report(payload: &Value, config: &AnalyticsConfig) -> serde_json::Result<String> {
    let positions = normalize_position_sides(payload);
    let buckets = bucket_positions(&positions);
    let by_coin = aggregate(&positions, GroupBy::Coin);

    info!(positions = positions.len(), "normalized positions");

    serde_json::to_string_pretty(&PositionsReport {
        position_count: positions.len(),
        risk: RiskSummary::new(&buckets, config.at_risk_tier),
        by_coin: keyed_rows(&by_coin),
        exposure: net_exposure(&positions),
        closest_to_liquidation: closest_to_liquidation(&positions, config.top_n),
        largest_by_value: largest_by_value(&positions, config.top_n),
        largest_losers: largest_losers(&positions, config.top_n),
    })
}

fn fills_report(payload: &Value) -> serde_json::Result<String> {
    let mut fills: Vec<Fill> = normalize_batch(payload);
    sort_chronologically(&mut fills);

    info!(fills = fills.len(), "normalized fills");

    serde_json::to_string_pretty(&FillsReport {
        stats: fill_stats(&fills),
        streaks: analyze_streaks(&fills),
    })
}

fn trades_report(payload: &Value, config: &AnalyticsConfig) -> serde_json::Result<String> {
    let trades: Vec<Trade> = normalize_batch(payload);
    let by_coin = aggregate(&trades, GroupBy::Coin);

    info!(trades = trades.len(), "normalized trades");

    serde_json::to_string_pretty(&TradesReport {
        flow: flow_summary(&trades, config.large_trade_threshold_usd),
        by_coin: keyed_rows(&by_coin),
        largest_trades: top_n(&trades, config.top_n, RankOrder::Descending, |t| {
            Some(t.value_usd)
        }),
    })
}

fn liquidations_report(payload: &Value, config: &AnalyticsConfig) -> serde_json::Result<String> {
    let liquidations: Vec<Liquidation> = normalize_batch(payload);
    let by_coin = aggregate(&liquidations, GroupBy::Coin);
    let totals = by_coin.totals();

    info!(liquidations = liquidations.len(), "normalized liquidations");

    serde_json::to_string_pretty(&LiquidationsReport {
        liquidation_count: totals.count,
        totals,
        by_coin: keyed_rows(&by_coin),
        largest: top_n(&liquidations, config.top_n, RankOrder::Descending, |l| {
            Some(l.value)
        }),
    })
}

fn traders_report(payload: &Value, config: &AnalyticsConfig) -> serde_json::Result<String> {
    let traders: Vec<TraderSummary> = normalize_batch(payload);

    serde_json::to_string_pretty(&TradersReport {
        trader_count: traders.len(),
        top: top_traders(&traders, config.top_n),
    })
}

// Initialise an INFO `Subscriber` for `Tracing` logs on stderr, leaving stdout for the report
fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(io::stderr)
        .with_ansi(cfg!(debug_assertions))
        .init()
}
