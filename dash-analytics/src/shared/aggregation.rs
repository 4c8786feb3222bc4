/// Per-key rollups over normalized records
///
/// One generic aggregator serves every dashboard panel: records are grouped by a
/// caller-supplied key and folded into [`AggregateBucket`]s. Totals are exact
/// `Decimal` sums, so results do not depend on input order and batches can be
/// merged in any grouping.
use crate::shared::types::{
    decimal_to_f64, to_decimal, Fill, FillDirection, Liquidation, Position, PositionSide, Side,
    Trade,
};
use fnv::FnvHashMap;
use rust_decimal::Decimal;
use serde::Serialize;
use smol_str::SmolStr;
use std::cmp::Ordering;

/// Key used for records whose grouping key is missing or blank
pub const UNKNOWN_KEY: &str = "UNKNOWN";

/// Which directional counter a record contributes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tally {
    Long,
    Short,
    Buy,
    Sell,
    None,
}

impl Tally {
    pub fn as_str(&self) -> Option<&'static str> {
        match self {
            Tally::Long => Some("Long"),
            Tally::Short => Some("Short"),
            Tally::Buy => Some("Buy"),
            Tally::Sell => Some("Sell"),
            Tally::None => None,
        }
    }
}

impl From<Side> for Tally {
    fn from(side: Side) -> Self {
        match side {
            Side::Buy => Tally::Buy,
            Side::Sell => Tally::Sell,
            Side::Unknown => Tally::None,
        }
    }
}

impl From<PositionSide> for Tally {
    fn from(side: PositionSide) -> Self {
        match side {
            PositionSide::Long => Tally::Long,
            PositionSide::Short => Tally::Short,
        }
    }
}

/// A record that can be folded into an [`AggregateBucket`]
pub trait Aggregatable {
    fn coin(&self) -> &str;

    fn strategy(&self) -> Option<&str> {
        None
    }

    /// USD notional of the record
    fn notional(&self) -> f64;

    fn pnl(&self) -> f64 {
        0.0
    }

    fn size(&self) -> f64;

    fn tally(&self) -> Tally;
}

impl Aggregatable for Position {
    fn coin(&self) -> &str {
        &self.coin
    }

    fn strategy(&self) -> Option<&str> {
        self.strategy.as_deref()
    }

    fn notional(&self) -> f64 {
        self.value
    }

    fn pnl(&self) -> f64 {
        self.pnl
    }

    fn size(&self) -> f64 {
        self.size
    }

    fn tally(&self) -> Tally {
        self.side.into()
    }
}

impl Aggregatable for Fill {
    fn coin(&self) -> &str {
        &self.coin
    }

    fn notional(&self) -> f64 {
        self.volume()
    }

    fn pnl(&self) -> f64 {
        self.closed_pnl
    }

    fn size(&self) -> f64 {
        self.size
    }

    fn tally(&self) -> Tally {
        self.side.into()
    }
}

impl Aggregatable for Trade {
    fn coin(&self) -> &str {
        &self.coin
    }

    fn strategy(&self) -> Option<&str> {
        self.strategy.as_deref()
    }

    fn notional(&self) -> f64 {
        self.value_usd
    }

    fn size(&self) -> f64 {
        self.size
    }

    fn tally(&self) -> Tally {
        self.side.into()
    }
}

impl Aggregatable for Liquidation {
    fn coin(&self) -> &str {
        &self.coin
    }

    fn notional(&self) -> f64 {
        self.value
    }

    fn size(&self) -> f64 {
        self.quantity
    }

    fn tally(&self) -> Tally {
        self.side.into()
    }
}

/// Running totals for one grouping key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregateBucket {
    pub count: u64,
    pub total_value: Decimal,
    pub total_pnl: Decimal,
    pub long_count: u64,
    pub short_count: u64,
    pub long_value: Decimal,
    pub short_value: Decimal,
    pub long_size: Decimal,
    pub short_size: Decimal,
    pub buy_count: u64,
    pub sell_count: u64,
    pub buy_volume: Decimal,
    pub sell_volume: Decimal,
}

impl AggregateBucket {
    /// Fold one record into the bucket
    pub fn add<T: Aggregatable + ?Sized>(&mut self, record: &T) {
        let notional = to_decimal(record.notional());
        let size = to_decimal(record.size());

        self.count += 1;
        self.total_value = self.total_value.saturating_add(notional);
        self.total_pnl = self.total_pnl.saturating_add(to_decimal(record.pnl()));

        match record.tally() {
            Tally::Long => {
                self.long_count += 1;
                self.long_value = self.long_value.saturating_add(notional);
                self.long_size = self.long_size.saturating_add(size);
            }
            Tally::Short => {
                self.short_count += 1;
                self.short_value = self.short_value.saturating_add(notional);
                self.short_size = self.short_size.saturating_add(size);
            }
            Tally::Buy => {
                self.buy_count += 1;
                self.buy_volume = self.buy_volume.saturating_add(notional);
            }
            Tally::Sell => {
                self.sell_count += 1;
                self.sell_volume = self.sell_volume.saturating_add(notional);
            }
            Tally::None => {}
        }
    }

    /// Add another bucket's totals into this one
    pub fn merge(&mut self, other: &AggregateBucket) {
        self.count += other.count;
        self.total_value = self.total_value.saturating_add(other.total_value);
        self.total_pnl = self.total_pnl.saturating_add(other.total_pnl);
        self.long_count += other.long_count;
        self.short_count += other.short_count;
        self.long_value = self.long_value.saturating_add(other.long_value);
        self.short_value = self.short_value.saturating_add(other.short_value);
        self.long_size = self.long_size.saturating_add(other.long_size);
        self.short_size = self.short_size.saturating_add(other.short_size);
        self.buy_count += other.buy_count;
        self.sell_count += other.sell_count;
        self.buy_volume = self.buy_volume.saturating_add(other.buy_volume);
        self.sell_volume = self.sell_volume.saturating_add(other.sell_volume);
    }

    /// Buy plus sell volume
    pub fn total_volume(&self) -> Decimal {
        self.buy_volume.saturating_add(self.sell_volume)
    }

    /// Order-flow imbalance: (buy - sell) / total * 100, 0 when there is no volume
    pub fn imbalance_pct(&self) -> f64 {
        let total = self.total_volume();
        if total.is_zero() {
            return 0.0;
        }
        decimal_to_f64((self.buy_volume - self.sell_volume) / total) * 100.0
    }

    /// Buy volume as a share of total volume, 0 when there is no volume
    pub fn buy_share_pct(&self) -> f64 {
        let total = self.total_volume();
        if total.is_zero() {
            return 0.0;
        }
        decimal_to_f64(self.buy_volume / total) * 100.0
    }

    /// Long value minus short value
    pub fn net_value(&self) -> Decimal {
        self.long_value - self.short_value
    }

    pub fn net_size(&self) -> Decimal {
        self.long_size - self.short_size
    }

    pub fn total_value_f64(&self) -> f64 {
        decimal_to_f64(self.total_value)
    }

    pub fn total_pnl_f64(&self) -> f64 {
        decimal_to_f64(self.total_pnl)
    }
}

/// Buckets keyed by grouping key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AggregateResult {
    buckets: FnvHashMap<SmolStr, AggregateBucket>,
}

impl AggregateResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a record in under `key`; missing or blank keys go to [`UNKNOWN_KEY`]
    pub fn add<T: Aggregatable + ?Sized>(&mut self, key: Option<&str>, record: &T) {
        self.buckets.entry(group_key(key)).or_default().add(record);
    }

    pub fn get(&self, key: &str) -> Option<&AggregateBucket> {
        self.buckets.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SmolStr, &AggregateBucket)> {
        self.buckets.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &SmolStr> {
        self.buckets.keys()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Add another result's buckets into this one
    pub fn merge(&mut self, other: &AggregateResult) {
        for (key, bucket) in &other.buckets {
            self.buckets.entry(key.clone()).or_default().merge(bucket);
        }
    }

    /// One bucket summing every key
    pub fn totals(&self) -> AggregateBucket {
        self.buckets
            .values()
            .fold(AggregateBucket::default(), |mut acc, bucket| {
                acc.merge(bucket);
                acc
            })
    }

    /// Buckets by descending total value; equal values ordered by key
    pub fn sorted_by_value(&self) -> Vec<(&SmolStr, &AggregateBucket)> {
        let mut rows: Vec<_> = self.buckets.iter().collect();
        rows.sort_by(|(key_a, a), (key_b, b)| {
            b.total_value
                .cmp(&a.total_value)
                .then_with(|| key_a.cmp(key_b))
        });
        rows
    }
}

fn group_key(key: Option<&str>) -> SmolStr {
    match key.map(str::trim) {
        Some(key) if !key.is_empty() => SmolStr::new(key),
        _ => SmolStr::new_static(UNKNOWN_KEY),
    }
}

/// Group records by an arbitrary key extractor
pub fn aggregate_by<'a, T, I, F>(records: I, key_fn: F) -> AggregateResult
where
    T: Aggregatable + 'a,
    I: IntoIterator<Item = &'a T>,
    F: Fn(&T) -> Option<&str>,
{
    records
        .into_iter()
        .fold(AggregateResult::new(), |mut result, record| {
            result.add(key_fn(record), record);
            result
        })
}

/// Built-in grouping keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupBy {
    Coin,
    Strategy,
    Side,
}

impl GroupBy {
    pub fn key<'r, T: Aggregatable>(&self, record: &'r T) -> Option<&'r str> {
        match self {
            GroupBy::Coin => Some(record.coin()),
            GroupBy::Strategy => record.strategy(),
            GroupBy::Side => record.tally().as_str(),
        }
    }
}

/// Group records by one of the built-in keys
pub fn aggregate<'a, T, I>(records: I, group_by: GroupBy) -> AggregateResult
where
    T: Aggregatable + 'a,
    I: IntoIterator<Item = &'a T>,
{
    aggregate_by(records, |record| group_by.key(record))
}

/// Whole-batch trade flow
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlowSummary {
    pub total_trades: u64,
    pub total_volume: Decimal,
    pub buy_count: u64,
    pub sell_count: u64,
    pub buy_volume: Decimal,
    pub sell_volume: Decimal,
    pub imbalance_pct: f64,
    pub buy_share_pct: f64,
    pub large_threshold_usd: f64,
    pub large_trade_count: u64,
    pub large_trade_volume: Decimal,
}

/// Summarise buy/sell flow and large prints over a batch of trades
pub fn flow_summary<'a, I>(trades: I, large_threshold_usd: f64) -> FlowSummary
where
    I: IntoIterator<Item = &'a Trade>,
{
    let mut bucket = AggregateBucket::default();
    let mut large_trade_count = 0;
    let mut large_trade_volume = Decimal::ZERO;

    for trade in trades {
        bucket.add(trade);
        if trade.value_usd >= large_threshold_usd {
            large_trade_count += 1;
            large_trade_volume = large_trade_volume.saturating_add(to_decimal(trade.value_usd));
        }
    }

    FlowSummary {
        total_trades: bucket.count,
        total_volume: bucket.total_volume(),
        buy_count: bucket.buy_count,
        sell_count: bucket.sell_count,
        buy_volume: bucket.buy_volume,
        sell_volume: bucket.sell_volume,
        imbalance_pct: bucket.imbalance_pct(),
        buy_share_pct: bucket.buy_share_pct(),
        large_threshold_usd,
        large_trade_count,
        large_trade_volume,
    }
}

/// Netted long/short exposure for one coin
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoinExposure {
    pub coin: SmolStr,
    pub long_count: u64,
    pub short_count: u64,
    pub long_value: Decimal,
    pub short_value: Decimal,
    pub long_size: Decimal,
    pub short_size: Decimal,
    pub net_value: Decimal,
    pub net_size: Decimal,
}

impl CoinExposure {
    pub fn is_net_long(&self) -> bool {
        self.net_value.is_sign_positive() && !self.net_value.is_zero()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExposureReport {
    /// Coins by descending absolute net value
    pub coins: Vec<CoinExposure>,
    pub total_long_value: Decimal,
    pub total_short_value: Decimal,
    pub net_delta: Decimal,
}

/// Net long and short positions per coin
pub fn net_exposure<'a, I>(positions: I) -> ExposureReport
where
    I: IntoIterator<Item = &'a Position>,
{
    let by_coin = aggregate(positions, GroupBy::Coin);
    let totals = by_coin.totals();

    let mut coins: Vec<CoinExposure> = by_coin
        .iter()
        .map(|(coin, bucket)| CoinExposure {
            coin: coin.clone(),
            long_count: bucket.long_count,
            short_count: bucket.short_count,
            long_value: bucket.long_value,
            short_value: bucket.short_value,
            long_size: bucket.long_size,
            short_size: bucket.short_size,
            net_value: bucket.net_value(),
            net_size: bucket.net_size(),
        })
        .collect();

    coins.sort_by(|a, b| {
        b.net_value
            .abs()
            .cmp(&a.net_value.abs())
            .then_with(|| a.coin.cmp(&b.coin))
    });

    ExposureReport {
        coins,
        total_long_value: totals.long_value,
        total_short_value: totals.short_value,
        net_delta: totals.net_value(),
    }
}

/// Fill counts per position effect
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DirectionCounts {
    pub open_long: u64,
    pub open_short: u64,
    pub close_long: u64,
    pub close_short: u64,
    pub unknown: u64,
}

impl DirectionCounts {
    fn add(&mut self, direction: FillDirection) {
        let counter = match direction {
            FillDirection::OpenLong => &mut self.open_long,
            FillDirection::OpenShort => &mut self.open_short,
            FillDirection::CloseLong => &mut self.close_long,
            FillDirection::CloseShort => &mut self.close_short,
            FillDirection::Unknown => &mut self.unknown,
        };
        *counter += 1;
    }
}

/// Trading statistics over a wallet's fill history
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FillStats {
    pub total_fills: u64,
    pub total_volume: Decimal,
    pub realized_pnl: Decimal,
    pub total_fees: Decimal,
    /// Fills with positive realised PnL
    pub winning_trades: u64,
    /// Fills with negative realised PnL
    pub losing_trades: u64,
    /// Winning share of fills with non-zero PnL, 0 when there are none
    pub win_rate_pct: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub buy_count: u64,
    pub sell_count: u64,
    pub buy_volume: Decimal,
    pub sell_volume: Decimal,
    /// Buy fills as a share of buy and sell fills
    pub buy_share_pct: f64,
    pub directions: DirectionCounts,
    pub first_fill_ms: Option<i64>,
    pub last_fill_ms: Option<i64>,
    pub by_coin: AggregateResult,
}

impl FillStats {
    pub fn net_pnl(&self) -> Decimal {
        self.realized_pnl - self.total_fees
    }
}

/// Compute win/loss, volume and fee statistics for a batch of fills
pub fn fill_stats<'a, I>(fills: I) -> FillStats
where
    I: IntoIterator<Item = &'a Fill>,
{
    let mut stats = FillStats::default();
    let mut overall = AggregateBucket::default();

    for fill in fills {
        overall.add(fill);
        stats.by_coin.add(Some(fill.coin.as_str()), fill);
        stats.total_fees = stats.total_fees.saturating_add(to_decimal(fill.fee));
        stats.directions.add(fill.direction);

        match fill.closed_pnl.partial_cmp(&0.0) {
            Some(Ordering::Greater) => {
                stats.winning_trades += 1;
                stats.largest_win = stats.largest_win.max(fill.closed_pnl);
            }
            Some(Ordering::Less) => {
                stats.losing_trades += 1;
                stats.largest_loss = stats.largest_loss.min(fill.closed_pnl);
            }
            _ => {}
        }

        if fill.timestamp_ms > 0 {
            stats.first_fill_ms = Some(
                stats
                    .first_fill_ms
                    .map_or(fill.timestamp_ms, |first| first.min(fill.timestamp_ms)),
            );
            stats.last_fill_ms = Some(
                stats
                    .last_fill_ms
                    .map_or(fill.timestamp_ms, |last| last.max(fill.timestamp_ms)),
            );
        }
    }

    stats.total_fills = overall.count;
    stats.total_volume = overall.total_value;
    stats.realized_pnl = overall.total_pnl;
    stats.buy_count = overall.buy_count;
    stats.sell_count = overall.sell_count;
    stats.buy_volume = overall.buy_volume;
    stats.sell_volume = overall.sell_volume;

    let closed = stats.winning_trades + stats.losing_trades;
    if closed > 0 {
        stats.win_rate_pct = stats.winning_trades as f64 / closed as f64 * 100.0;
    }

    let sided = stats.buy_count + stats.sell_count;
    if sided > 0 {
        stats.buy_share_pct = stats.buy_count as f64 / sided as f64 * 100.0;
    }

    stats
}
