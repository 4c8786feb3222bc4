/// Canonical record types produced by the normalizer
///
/// Every dashboard panel consumes these shapes; the loosely-typed JSON returned
/// by the data service is mapped onto them once in `normalize`.
use chrono::{DateTime, Utc};
use derive_more::Display;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Convert a USD amount into an exact accumulator value.
///
/// Totals are summed as `Decimal` so they do not depend on input order;
/// non-finite or out-of-range input counts as zero.
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or(Decimal::ZERO)
}

/// Convert an accumulated total back to `f64` for display
pub fn decimal_to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Aggressor side of a trade or fill
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash, Default)]
pub enum Side {
    Buy,
    Sell,
    #[default]
    Unknown,
}

impl Side {
    /// Convert to display string
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "Buy",
            Side::Sell => "Sell",
            Side::Unknown => "Unknown",
        }
    }

    /// Check if this is a buy
    pub fn is_buy(&self) -> bool {
        matches!(self, Side::Buy)
    }

    /// Check if this is a sell
    pub fn is_sell(&self) -> bool {
        matches!(self, Side::Sell)
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Direction of an open position
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash, Default, Display)]
pub enum PositionSide {
    #[default]
    #[display("Long")]
    Long,
    #[display("Short")]
    Short,
}

impl PositionSide {
    pub fn is_long(&self) -> bool {
        matches!(self, PositionSide::Long)
    }
}

/// Position effect of a fill as reported by the exchange (`dir` field)
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash, Default, Display)]
pub enum FillDirection {
    #[display("Open Long")]
    OpenLong,
    #[display("Open Short")]
    OpenShort,
    #[display("Close Long")]
    CloseLong,
    #[display("Close Short")]
    CloseShort,
    #[default]
    #[display("Unknown")]
    Unknown,
}

impl FillDirection {
    /// True for fills that reduce an existing position (and so carry realised PnL)
    pub fn is_close(&self) -> bool {
        matches!(self, FillDirection::CloseLong | FillDirection::CloseShort)
    }
}

/// An open perpetual position
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct Position {
    /// Asset symbol (e.g., "BTC", "kPEPE"); empty when the record had none
    pub coin: SmolStr,
    pub side: PositionSide,
    /// Absolute position size in base units
    pub size: f64,
    pub entry_price: f64,
    /// Mark price, or liquidation price when that is all the source reports
    pub mark_or_liq_price: f64,
    /// Notional value in USD, always >= 0
    pub value: f64,
    /// Unrealised PnL in USD (signed)
    pub pnl: f64,
    pub leverage: f64,
    /// Percent move to liquidation; `None` when unknown, 0 = at liquidation
    pub distance_to_liquidation_pct: Option<f64>,
    /// Wallet address of the position holder
    pub owner: String,
    /// Vault strategy that holds the position, if any
    pub strategy: Option<SmolStr>,
}

/// A single user fill
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct Fill {
    pub coin: SmolStr,
    pub side: Side,
    pub size: f64,
    pub price: f64,
    /// Realised PnL attached to the fill (0 for pure opens)
    pub closed_pnl: f64,
    pub fee: f64,
    pub direction: FillDirection,
    pub timestamp_ms: i64,
}

impl Fill {
    /// Notional traded by this fill
    pub fn volume(&self) -> f64 {
        self.size * self.price
    }

    pub fn time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp_ms)
    }
}

/// A public trade print
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct Trade {
    pub coin: SmolStr,
    pub side: Side,
    pub size: f64,
    pub price: f64,
    /// USD notional; `size * price` when the source did not report one
    pub value_usd: f64,
    pub timestamp_ms: i64,
    /// Vault strategy that executed the trade, if any
    pub strategy: Option<SmolStr>,
}

impl Trade {
    pub fn time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp_ms)
    }
}

/// A forced liquidation event
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct Liquidation {
    pub coin: SmolStr,
    /// Side of the position that was liquidated
    pub side: PositionSide,
    pub price: f64,
    pub quantity: f64,
    pub value: f64,
    pub timestamp_ms: i64,
}

/// One row of a trader leaderboard
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct TraderSummary {
    pub address: String,
    pub pnl: f64,
    /// Win rate in percent, when the source reports one
    pub win_rate: Option<f64>,
    pub trade_count: Option<u64>,
}
