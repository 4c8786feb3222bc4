//! Record normalizer.
//!
//! The data service is inconsistent about key names (`value` / `value_usd` /
//! `notional`), side encodings (`B` / `Buy` / `buy`) and number formats
//! (`1234.5` / `"$1,234.50"`). Each record kind declares an alias table that
//! maps a canonical field to the ordered list of keys it may appear under; the
//! first present, non-null key wins. Lookups are resolved once here so no
//! consumer ever inspects raw JSON again.
//!
//! Normalization never fails a batch: malformed numbers fall back to the field
//! default and non-object entries are skipped.

use crate::shared::error::NormalizeError;
use crate::shared::types::{
    Fill, FillDirection, Liquidation, Position, PositionSide, Side, Trade, TraderSummary,
};
use chrono::{DateTime, NaiveDateTime};
use serde_json::{Map, Value};
use smol_str::SmolStr;
use tracing::{debug, warn};

/// Epoch values below this are taken to be seconds rather than milliseconds
const MILLIS_CUTOFF: f64 = 1e12;

/// Canonical fields that can be looked up through an alias table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Coin,
    Side,
    Size,
    Price,
    EntryPrice,
    MarkOrLiqPrice,
    Value,
    Pnl,
    Fee,
    Leverage,
    Distance,
    Owner,
    Strategy,
    Direction,
    Timestamp,
    WinRate,
    TradeCount,
}

/// Canonical field → accepted keys, in priority order
pub type AliasTable = &'static [(Field, &'static [&'static str])];

pub const POSITION_ALIASES: AliasTable = &[
    (Field::Coin, &["coin", "symbol", "asset"]),
    (Field::Side, &["side", "position_side", "positionSide"]),
    (Field::Size, &["size", "szi", "sz", "quantity"]),
    (Field::EntryPrice, &["entry_price", "entryPx", "entry_px", "entryPrice"]),
    (
        Field::MarkOrLiqPrice,
        &[
            "mark_price",
            "markPx",
            "liq_price",
            "liquidation_price",
            "liquidationPx",
            "liq_px",
        ],
    ),
    (
        Field::Value,
        &[
            "value",
            "value_usd",
            "position_value",
            "positionValue",
            "notional",
            "usd_value",
        ],
    ),
    (Field::Pnl, &["pnl", "unrealized_pnl", "unrealizedPnl", "upnl"]),
    (Field::Leverage, &["leverage", "lev"]),
    (
        Field::Distance,
        &[
            "distance_pct",
            "liquidation_distance_pct",
            "distanceToLiquidationPct",
            "distance_to_liq_pct",
        ],
    ),
    (Field::Owner, &["address", "user", "wallet", "owner"]),
    (Field::Strategy, &["strategy_name", "strategy"]),
];

pub const FILL_ALIASES: AliasTable = &[
    (Field::Coin, &["coin", "symbol", "asset"]),
    (Field::Side, &["side"]),
    (Field::Size, &["sz", "size", "quantity"]),
    (Field::Price, &["px", "price"]),
    (Field::Pnl, &["closedPnl", "closed_pnl", "realized_pnl", "pnl"]),
    (Field::Fee, &["fee", "fees"]),
    (Field::Direction, &["dir", "direction"]),
    (Field::Timestamp, &["time", "timestamp", "timestampMs"]),
];

pub const TRADE_ALIASES: AliasTable = &[
    (Field::Coin, &["coin", "symbol", "asset"]),
    (Field::Side, &["side"]),
    (Field::Size, &["size", "sz", "quantity"]),
    (Field::Price, &["price", "px"]),
    (Field::Value, &["value_usd", "value", "usd_value", "notional"]),
    (Field::Timestamp, &["timestamp", "time", "created_at"]),
    (Field::Strategy, &["strategy_name", "strategy"]),
];

pub const LIQUIDATION_ALIASES: AliasTable = &[
    (Field::Coin, &["symbol", "coin", "asset"]),
    (Field::Side, &["side", "direction"]),
    (Field::Size, &["quantity", "sz", "size"]),
    (Field::Price, &["price", "px"]),
    (Field::Value, &["value", "usd_value", "value_usd"]),
    (Field::Timestamp, &["timestamp", "time"]),
];

pub const TRADER_ALIASES: AliasTable = &[
    (Field::Owner, &["address", "wallet", "user"]),
    (Field::Pnl, &["pnl", "total_pnl", "totalPnl", "allTime"]),
    (Field::WinRate, &["win_rate", "winRate", "win_pct"]),
    (Field::TradeCount, &["trades", "total_trades", "tradeCount"]),
];

/// A record kind that can be built from a raw JSON object
pub trait Normalize: Sized {
    /// Name used in diagnostics
    const KIND: &'static str;
    const ALIASES: AliasTable;
    /// Keys under which an envelope object carries the record list
    const ENVELOPE_KEYS: &'static [&'static str];

    fn from_record(record: &RawRecord<'_>) -> Self;

    /// Records that carry nothing to aggregate and are dropped from batches
    fn is_flat(_record: &RawRecord<'_>) -> bool {
        false
    }
}

/// Borrowed view over one raw JSON object, resolved through an alias table
#[derive(Debug, Clone, Copy)]
pub struct RawRecord<'a> {
    kind: &'static str,
    fields: &'a Map<String, Value>,
    aliases: AliasTable,
}

impl<'a> RawRecord<'a> {
    pub fn new(kind: &'static str, fields: &'a Map<String, Value>, aliases: AliasTable) -> Self {
        Self {
            kind,
            fields,
            aliases,
        }
    }

    /// First present, non-null value among the field's aliases
    pub fn get(&self, field: Field) -> Option<&'a Value> {
        let fields = self.fields;
        self.aliases
            .iter()
            .find(|(canonical, _)| *canonical == field)
            .and_then(|(_, keys)| {
                keys.iter()
                    .filter_map(|key| fields.get(*key))
                    .find(|value| !value.is_null())
            })
    }

    /// Numeric field; `None` when missing or malformed
    pub fn number(&self, field: Field) -> Option<f64> {
        let raw = self.get(field)?;
        match parse_number(raw) {
            Ok(value) => Some(value),
            Err(error) => {
                debug!(kind = self.kind, ?field, %error, "substituting default for malformed number");
                None
            }
        }
    }

    /// Numeric field, 0 when missing or malformed
    pub fn number_or_zero(&self, field: Field) -> f64 {
        self.number(field).unwrap_or(0.0)
    }

    /// String field, trimmed; numbers are not coerced
    pub fn text(&self, field: Field) -> Option<&'a str> {
        self.get(field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Epoch timestamp in milliseconds, 0 when missing or unparseable
    pub fn timestamp_ms(&self, field: Field) -> i64 {
        let Some(raw) = self.get(field) else {
            return 0;
        };

        let parsed = match raw {
            Value::String(text) => parse_numeric_str(text)
                .ok()
                .map(epoch_to_millis)
                .or_else(|| parse_datetime_ms(text)),
            other => parse_number(other).ok().map(epoch_to_millis),
        };

        parsed.unwrap_or_else(|| {
            debug!(kind = self.kind, ?field, %raw, "unparseable timestamp, using 0");
            0
        })
    }

    /// Leverage reported either as a number or as `{"type": "cross", "value": 20}`
    pub fn leverage(&self) -> f64 {
        match self.get(Field::Leverage) {
            Some(Value::Object(inner)) => inner
                .get("value")
                .and_then(|v| parse_number(v).ok())
                .unwrap_or(0.0),
            Some(_) => self.number_or_zero(Field::Leverage),
            None => 0.0,
        }
    }
}

/// Parse a JSON number or a formatted numeric string.
///
/// Strings are first parsed as-is; failing that, every character other than
/// digits, signs and the decimal point is stripped (`$`, `,`, `%`, spaces)
/// and the residual parsed. Non-finite results are rejected.
pub fn parse_number(value: &Value) -> Result<f64, NormalizeError> {
    match value {
        Value::Number(number) => number
            .as_f64()
            .filter(|v| v.is_finite())
            .ok_or_else(|| NormalizeError::malformed(number.to_string())),
        Value::String(text) => parse_numeric_str(text),
        other => Err(NormalizeError::malformed(other.to_string())),
    }
}

pub fn parse_numeric_str(raw: &str) -> Result<f64, NormalizeError> {
    let trimmed = raw.trim();
    if let Ok(value) = trimmed.parse::<f64>() {
        return Some(value)
            .filter(|v| v.is_finite())
            .ok_or_else(|| NormalizeError::malformed(raw));
    }

    let cleaned: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.'))
        .collect();

    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| NormalizeError::malformed(raw))
}

/// Map an aggressor side encoding onto [`Side`]
pub fn parse_side(raw: &str) -> Side {
    match raw.trim().to_ascii_lowercase().as_str() {
        "b" | "buy" | "bid" => Side::Buy,
        "s" | "a" | "sell" | "ask" => Side::Sell,
        _ => Side::Unknown,
    }
}

/// Map a position side encoding onto [`PositionSide`]
pub fn parse_position_side(raw: &str) -> Option<PositionSide> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "long" | "l" | "buy" | "b" => Some(PositionSide::Long),
        "short" | "s" | "sell" | "a" => Some(PositionSide::Short),
        _ => None,
    }
}

/// Map the exchange's fill direction text ("Open Long", "close_short") onto [`FillDirection`]
pub fn parse_direction(raw: &str) -> FillDirection {
    let compact: String = raw
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect();

    match compact.as_str() {
        "openlong" => FillDirection::OpenLong,
        "openshort" => FillDirection::OpenShort,
        "closelong" => FillDirection::CloseLong,
        "closeshort" => FillDirection::CloseShort,
        _ => FillDirection::Unknown,
    }
}

fn epoch_to_millis(epoch: f64) -> i64 {
    if epoch <= 0.0 {
        0
    } else if epoch < MILLIS_CUTOFF {
        (epoch * 1000.0).round() as i64
    } else {
        epoch.round() as i64
    }
}

fn parse_datetime_ms(text: &str) -> Option<i64> {
    let text = text.trim();
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.timestamp_millis())
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
                .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f"))
                .map(|naive| naive.and_utc().timestamp_millis())
                .ok()
        })
}

fn smol(text: Option<&str>) -> SmolStr {
    text.map(SmolStr::new).unwrap_or_default()
}

impl Normalize for Position {
    const KIND: &'static str = "position";
    const ALIASES: AliasTable = POSITION_ALIASES;
    const ENVELOPE_KEYS: &'static [&'static str] =
        &["positions", "assetPositions", "snapshots", "data"];

    fn from_record(record: &RawRecord<'_>) -> Self {
        let signed_size = record.number_or_zero(Field::Size);
        let side = record
            .text(Field::Side)
            .and_then(parse_position_side)
            .unwrap_or(if signed_size < 0.0 {
                PositionSide::Short
            } else {
                PositionSide::Long
            });

        Self {
            coin: smol(record.text(Field::Coin)),
            side,
            size: signed_size.abs(),
            entry_price: record.number_or_zero(Field::EntryPrice),
            mark_or_liq_price: record.number_or_zero(Field::MarkOrLiqPrice),
            value: record.number_or_zero(Field::Value).abs(),
            pnl: record.number_or_zero(Field::Pnl),
            leverage: record.leverage(),
            distance_to_liquidation_pct: record.number(Field::Distance).map(|d| d.max(0.0)),
            owner: record.text(Field::Owner).unwrap_or_default().to_string(),
            strategy: record.text(Field::Strategy).map(SmolStr::new),
        }
    }

    /// A reported size of exactly zero is a closed slot, not a position
    fn is_flat(record: &RawRecord<'_>) -> bool {
        record.number(Field::Size) == Some(0.0)
    }
}

impl Normalize for Fill {
    const KIND: &'static str = "fill";
    const ALIASES: AliasTable = FILL_ALIASES;
    const ENVELOPE_KEYS: &'static [&'static str] = &["fills", "data"];

    fn from_record(record: &RawRecord<'_>) -> Self {
        Self {
            coin: smol(record.text(Field::Coin)),
            side: record.text(Field::Side).map(parse_side).unwrap_or_default(),
            size: record.number_or_zero(Field::Size).abs(),
            price: record.number_or_zero(Field::Price),
            closed_pnl: record.number_or_zero(Field::Pnl),
            fee: record.number_or_zero(Field::Fee),
            direction: record
                .text(Field::Direction)
                .map(parse_direction)
                .unwrap_or_default(),
            timestamp_ms: record.timestamp_ms(Field::Timestamp),
        }
    }
}

impl Normalize for Trade {
    const KIND: &'static str = "trade";
    const ALIASES: AliasTable = TRADE_ALIASES;
    const ENVELOPE_KEYS: &'static [&'static str] = &["trades", "whales", "data"];

    fn from_record(record: &RawRecord<'_>) -> Self {
        let size = record.number_or_zero(Field::Size).abs();
        let price = record.number_or_zero(Field::Price);

        Self {
            coin: smol(record.text(Field::Coin)),
            side: record.text(Field::Side).map(parse_side).unwrap_or_default(),
            size,
            price,
            value_usd: record
                .number(Field::Value)
                .map(f64::abs)
                .unwrap_or(size * price),
            timestamp_ms: record.timestamp_ms(Field::Timestamp),
            strategy: record.text(Field::Strategy).map(SmolStr::new),
        }
    }
}

impl Normalize for Liquidation {
    const KIND: &'static str = "liquidation";
    const ALIASES: AliasTable = LIQUIDATION_ALIASES;
    const ENVELOPE_KEYS: &'static [&'static str] = &["liquidations", "data"];

    fn from_record(record: &RawRecord<'_>) -> Self {
        let quantity = record.number_or_zero(Field::Size).abs();
        let price = record.number_or_zero(Field::Price);

        Self {
            coin: smol(record.text(Field::Coin)),
            side: record
                .text(Field::Side)
                .and_then(parse_position_side)
                .unwrap_or_default(),
            price,
            quantity,
            value: record
                .number(Field::Value)
                .map(f64::abs)
                .unwrap_or(quantity * price),
            timestamp_ms: record.timestamp_ms(Field::Timestamp),
        }
    }
}

impl Normalize for TraderSummary {
    const KIND: &'static str = "trader";
    const ALIASES: AliasTable = TRADER_ALIASES;
    const ENVELOPE_KEYS: &'static [&'static str] = &["leaderboard", "top", "traders", "data"];

    fn from_record(record: &RawRecord<'_>) -> Self {
        Self {
            address: record.text(Field::Owner).unwrap_or_default().to_string(),
            pnl: record.number_or_zero(Field::Pnl),
            // Sources mix fractions (0.62) and percentages (62.0)
            win_rate: record
                .number(Field::WinRate)
                .map(|rate| if rate > 1.0 { rate } else { rate * 100.0 }),
            trade_count: record
                .number(Field::TradeCount)
                .filter(|count| *count >= 0.0)
                .map(|count| count.round() as u64),
        }
    }
}

/// Normalize a single raw record.
///
/// Hyperliquid wraps positions as `{"type": "oneWay", "position": {...}}`; the
/// inner object is used when present.
pub fn normalize<T: Normalize>(raw: &Value) -> Result<T, NormalizeError> {
    raw_record::<T>(raw).map(|record| T::from_record(&record))
}

fn raw_record<T: Normalize>(raw: &Value) -> Result<RawRecord<'_>, NormalizeError> {
    let fields = raw.as_object().ok_or_else(|| NormalizeError::NotAnObject {
        kind: T::KIND,
        found: raw.to_string(),
    })?;

    let fields = match fields.get("position") {
        Some(Value::Object(inner)) => inner,
        _ => fields,
    };

    Ok(RawRecord::new(T::KIND, fields, T::ALIASES))
}

/// Batch entry point: skips non-objects and flat records
fn normalize_entry<T: Normalize>(raw: &Value) -> Option<T> {
    match raw_record::<T>(raw) {
        Ok(record) if T::is_flat(&record) => {
            debug!(kind = T::KIND, "skipping flat record");
            None
        }
        Ok(record) => Some(T::from_record(&record)),
        Err(error) => {
            warn!(kind = T::KIND, %error, "skipping record");
            None
        }
    }
}

/// Normalize every record in a payload.
///
/// Accepts a bare array or an envelope object carrying the list under one of
/// the kind's envelope keys. Entries that are not objects are skipped, as are
/// flat records (positions reported with a size of zero).
pub fn normalize_batch<T: Normalize>(payload: &Value) -> Vec<T> {
    let Some(entries) = record_list(payload, T::ENVELOPE_KEYS) else {
        debug!(kind = T::KIND, "payload carries no record list");
        return Vec::new();
    };

    entries.iter().filter_map(normalize_entry::<T>).collect()
}

/// Normalize a `{"longs": [...], "shorts": [...]}` positions payload.
///
/// The list a record came from decides its side. Payloads without either list
/// fall back to [`normalize_batch`].
pub fn normalize_position_sides(payload: &Value) -> Vec<Position> {
    let longs = payload.get("longs").and_then(Value::as_array);
    let shorts = payload.get("shorts").and_then(Value::as_array);

    if longs.is_none() && shorts.is_none() {
        return normalize_batch(payload);
    }

    sided(longs, PositionSide::Long)
        .chain(sided(shorts, PositionSide::Short))
        .collect()
}

fn sided<'a>(
    entries: Option<&'a Vec<Value>>,
    side: PositionSide,
) -> impl Iterator<Item = Position> + 'a {
    entries
        .into_iter()
        .flatten()
        .filter_map(normalize_entry::<Position>)
        .map(move |position| Position { side, ..position })
}

fn record_list<'a>(payload: &'a Value, keys: &[&str]) -> Option<&'a Vec<Value>> {
    match payload {
        Value::Array(entries) => Some(entries),
        Value::Object(map) => keys
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array)),
        _ => None,
    }
}
