//! Liquidation risk tiers.
//!
//! Positions are classified by percent distance to liquidation into five
//! ordered tiers with half-open bounds `[lower, upper)`: a position exactly on a
//! boundary belongs to the safer tier (2.0 is High, not Critical). Positions
//! without a known distance are tallied separately and never enter tier totals
//! or the at-risk share.

use crate::shared::types::{decimal_to_f64, to_decimal, Position};
use derive_more::Display;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Severity tier, ordered from most to least at risk
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize, Display,
)]
pub enum RiskTier {
    #[display("CRITICAL")]
    Critical,
    #[display("HIGH")]
    High,
    #[display("MEDIUM")]
    Medium,
    #[display("MODERATE")]
    Moderate,
    #[display("LOW")]
    Low,
}

impl RiskTier {
    pub const ALL: [RiskTier; 5] = [
        RiskTier::Critical,
        RiskTier::High,
        RiskTier::Medium,
        RiskTier::Moderate,
        RiskTier::Low,
    ];

    /// Exclusive upper bounds, ascending; anything beyond the last is Low
    const UPPER_BOUNDS: [(RiskTier, f64); 4] = [
        (RiskTier::Critical, 2.0),
        (RiskTier::High, 5.0),
        (RiskTier::Medium, 10.0),
        (RiskTier::Moderate, 20.0),
    ];

    /// Tier for a distance-to-liquidation percentage: the first exclusive upper bound it falls under
    pub fn from_distance(distance_pct: f64) -> Self {
        Self::UPPER_BOUNDS
            .iter()
            .find(|(_, upper)| distance_pct < *upper)
            .map(|(tier, _)| *tier)
            .unwrap_or(RiskTier::Low)
    }

    /// Inclusive lower bound of the tier
    pub fn lower_bound(&self) -> f64 {
        match self {
            RiskTier::Critical => 0.0,
            RiskTier::High => 2.0,
            RiskTier::Medium => 5.0,
            RiskTier::Moderate => 10.0,
            RiskTier::Low => 20.0,
        }
    }

    /// Exclusive upper bound of the tier; `None` for Low
    pub fn upper_bound(&self) -> Option<f64> {
        Self::UPPER_BOUNDS
            .iter()
            .find(|(tier, _)| tier == self)
            .map(|(_, upper)| *upper)
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown risk tier: {0}")]
pub struct ParseRiskTierError(String);

impl FromStr for RiskTier {
    type Err = ParseRiskTierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "critical" => Ok(RiskTier::Critical),
            "high" => Ok(RiskTier::High),
            "medium" => Ok(RiskTier::Medium),
            "moderate" => Ok(RiskTier::Moderate),
            "low" => Ok(RiskTier::Low),
            _ => Err(ParseRiskTierError(s.to_string())),
        }
    }
}

/// Position count and summed USD value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TierTotals {
    pub count: u64,
    pub value: Decimal,
}

impl TierTotals {
    fn add(&mut self, value: f64) {
        self.count += 1;
        self.value = self.value.saturating_add(to_decimal(value));
    }

    fn merge(&mut self, other: &TierTotals) {
        self.count += other.count;
        self.value = self.value.saturating_add(other.value);
    }

    pub fn value_f64(&self) -> f64 {
        decimal_to_f64(self.value)
    }
}

/// Per-tier totals for one batch of positions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RiskBuckets {
    tiers: [TierTotals; 5],
    /// Positions whose distance to liquidation is unknown
    pub unknown: TierTotals,
    distance_sum: Decimal,
}

impl RiskBuckets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tally one position
    pub fn add(&mut self, position: &Position) {
        match position.distance_to_liquidation_pct {
            Some(distance) => {
                self.tiers[RiskTier::from_distance(distance).index()].add(position.value);
                self.distance_sum = self.distance_sum.saturating_add(to_decimal(distance));
            }
            None => self.unknown.add(position.value),
        }
    }

    /// Combine with the buckets of another batch
    pub fn merge(&mut self, other: &RiskBuckets) {
        for (mine, theirs) in self.tiers.iter_mut().zip(other.tiers.iter()) {
            mine.merge(theirs);
        }
        self.unknown.merge(&other.unknown);
        self.distance_sum = self.distance_sum.saturating_add(other.distance_sum);
    }

    pub fn tier(&self, tier: RiskTier) -> &TierTotals {
        &self.tiers[tier.index()]
    }

    /// Tiers in severity order with their totals
    pub fn iter(&self) -> impl Iterator<Item = (RiskTier, &TierTotals)> {
        RiskTier::ALL.into_iter().zip(self.tiers.iter())
    }

    /// Number of positions with a known distance
    pub fn known_count(&self) -> u64 {
        self.tiers.iter().map(|t| t.count).sum()
    }

    /// Summed value across all tiers (positions with unknown distance excluded)
    pub fn total_value(&self) -> Decimal {
        self.tiers
            .iter()
            .fold(Decimal::ZERO, |acc, t| acc.saturating_add(t.value))
    }

    /// Positions in `through` or any riskier tier
    pub fn at_risk_count(&self, through: RiskTier) -> u64 {
        self.iter()
            .filter(|(tier, _)| *tier <= through)
            .map(|(_, totals)| totals.count)
            .sum()
    }

    /// At-risk positions as a percentage of positions with a known distance (0 when none known)
    pub fn at_risk_pct(&self, through: RiskTier) -> f64 {
        let known = self.known_count();
        if known == 0 {
            return 0.0;
        }
        self.at_risk_count(through) as f64 / known as f64 * 100.0
    }

    /// Mean distance to liquidation over positions with a known distance
    pub fn average_distance(&self) -> Option<f64> {
        let known = self.known_count();
        if known == 0 {
            return None;
        }
        Some(decimal_to_f64(self.distance_sum / Decimal::from(known)))
    }
}

/// Bucket a batch of positions by liquidation risk
pub fn bucket_positions<'a, I>(positions: I) -> RiskBuckets
where
    I: IntoIterator<Item = &'a Position>,
{
    positions
        .into_iter()
        .fold(RiskBuckets::new(), |mut buckets, position| {
            buckets.add(position);
            buckets
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn position(distance: Option<f64>, value: f64) -> Position {
        Position {
            coin: "BTC".into(),
            value,
            distance_to_liquidation_pct: distance,
            ..Default::default()
        }
    }

    #[test]
    fn test_tier_from_distance() {
        struct TestCase {
            input: f64,
            expected: RiskTier,
        }

        let tests = vec![
            TestCase {
                // TC0: at liquidation
                input: 0.0,
                expected: RiskTier::Critical,
            },
            TestCase {
                // TC1
                input: 1.99,
                expected: RiskTier::Critical,
            },
            TestCase {
                // TC2: boundary goes up a tier
                input: 2.0,
                expected: RiskTier::High,
            },
            TestCase {
                // TC3
                input: 4.999,
                expected: RiskTier::High,
            },
            TestCase {
                // TC4
                input: 5.0,
                expected: RiskTier::Medium,
            },
            TestCase {
                // TC5
                input: 10.0,
                expected: RiskTier::Moderate,
            },
            TestCase {
                // TC6
                input: 19.9,
                expected: RiskTier::Moderate,
            },
            TestCase {
                // TC7
                input: 20.0,
                expected: RiskTier::Low,
            },
            TestCase {
                // TC8
                input: 250.0,
                expected: RiskTier::Low,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(RiskTier::from_distance(test.input), test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_tier_bounds_are_contiguous() {
        for pair in RiskTier::ALL.windows(2) {
            assert_eq!(pair[0].upper_bound(), Some(pair[1].lower_bound()));
        }
        assert_eq!(RiskTier::Low.upper_bound(), None);

        for tier in RiskTier::ALL {
            assert_eq!(RiskTier::from_distance(tier.lower_bound()), tier);
        }
    }

    #[test]
    fn test_tier_parse_and_display() {
        assert_eq!("critical".parse::<RiskTier>(), Ok(RiskTier::Critical));
        assert_eq!(" Moderate ".parse::<RiskTier>(), Ok(RiskTier::Moderate));
        assert!("severe".parse::<RiskTier>().is_err());
        assert_eq!(RiskTier::High.to_string(), "HIGH");
        assert!(RiskTier::Critical < RiskTier::Low);
    }

    #[test]
    fn test_bucket_five_tiers() {
        let positions: Vec<Position> = [1.5, 3.0, 7.0, 15.0, 25.0]
            .into_iter()
            .zip([100.0, 200.0, 300.0, 400.0, 500.0])
            .map(|(distance, value)| position(Some(distance), value))
            .collect();

        let buckets = bucket_positions(&positions);

        assert_eq!(buckets.tier(RiskTier::Critical).value, dec!(100));
        assert_eq!(buckets.tier(RiskTier::High).value, dec!(200));
        assert_eq!(buckets.tier(RiskTier::Medium).value, dec!(300));
        assert_eq!(buckets.tier(RiskTier::Moderate).value, dec!(400));
        assert_eq!(buckets.tier(RiskTier::Low).value, dec!(500));
        assert_eq!(buckets.total_value(), dec!(1500));
        assert_eq!(buckets.known_count(), 5);
        let average = buckets.average_distance().unwrap_or_default();
        assert!((average - 10.3).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_distance_excluded() {
        let positions = vec![
            position(Some(1.0), 1_000.0),
            position(None, 50_000.0),
            position(Some(30.0), 2_000.0),
            position(None, 25.0),
        ];

        let buckets = bucket_positions(&positions);

        assert_eq!(buckets.unknown.count, 2);
        assert_eq!(buckets.unknown.value, dec!(50025));
        assert_eq!(buckets.total_value(), dec!(3000));
        assert_eq!(buckets.known_count(), 2);
        assert_eq!(buckets.at_risk_count(RiskTier::High), 1);
        assert_eq!(buckets.at_risk_pct(RiskTier::High), 50.0);
    }

    #[test]
    fn test_empty_batch() {
        let buckets = bucket_positions(&Vec::<Position>::new());

        assert_eq!(buckets.known_count(), 0);
        assert_eq!(buckets.total_value(), Decimal::ZERO);
        assert_eq!(buckets.at_risk_pct(RiskTier::High), 0.0);
        assert_eq!(buckets.average_distance(), None);
        assert!(buckets.iter().all(|(_, totals)| totals.count == 0));
    }

    #[test]
    fn test_merge_matches_single_pass() {
        let positions = vec![
            position(Some(0.5), 10.0),
            position(Some(4.0), 20.0),
            position(None, 30.0),
            position(Some(12.0), 40.0),
        ];

        let whole = bucket_positions(&positions);
        let mut merged = bucket_positions(&positions[..2]);
        merged.merge(&bucket_positions(&positions[2..]));

        assert_eq!(merged, whole);
    }
}
