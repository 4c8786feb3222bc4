//! Top-N selection over normalized records.

use crate::shared::types::{Position, TraderSummary};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RankOrder {
    Ascending,
    Descending,
}

/// Select the first `n` records by `key_fn` in the given order.
///
/// The sort is stable, so records with equal keys keep their input order.
/// Records whose key is `None` or NaN rank after every keyed record in either
/// direction.
pub fn top_n<'a, T, F>(records: &'a [T], n: usize, order: RankOrder, key_fn: F) -> Vec<&'a T>
where
    F: Fn(&T) -> Option<f64>,
{
    if n == 0 {
        return Vec::new();
    }

    let mut keyed: Vec<(Option<f64>, &T)> = records
        .iter()
        .map(|record| (key_fn(record).filter(|key| !key.is_nan()), record))
        .collect();

    keyed.sort_by(|(a, _), (b, _)| compare_keys(*a, *b, order));

    keyed.into_iter().take(n).map(|(_, record)| record).collect()
}

fn compare_keys(a: Option<f64>, b: Option<f64>, order: RankOrder) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => {
            let ascending = a.total_cmp(&b);
            match order {
                RankOrder::Ascending => ascending,
                RankOrder::Descending => ascending.reverse(),
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Positions nearest liquidation first; unknown distances last
pub fn closest_to_liquidation(positions: &[Position], n: usize) -> Vec<&Position> {
    top_n(positions, n, RankOrder::Ascending, |p| {
        p.distance_to_liquidation_pct
    })
}

pub fn largest_by_value(positions: &[Position], n: usize) -> Vec<&Position> {
    top_n(positions, n, RankOrder::Descending, |p| Some(p.value))
}

/// Most profitable positions first
pub fn largest_by_pnl(positions: &[Position], n: usize) -> Vec<&Position> {
    top_n(positions, n, RankOrder::Descending, |p| Some(p.pnl))
}

/// Deepest unrealised losses first
pub fn largest_losers(positions: &[Position], n: usize) -> Vec<&Position> {
    top_n(positions, n, RankOrder::Ascending, |p| Some(p.pnl))
}

/// Leaderboard rows by descending PnL
pub fn top_traders(traders: &[TraderSummary], n: usize) -> Vec<&TraderSummary> {
    top_n(traders, n, RankOrder::Descending, |t| Some(t.pnl))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indices<T>(records: &[T], ranked: &[&T]) -> Vec<usize> {
        ranked
            .iter()
            .map(|r| {
                records
                    .iter()
                    .position(|candidate| std::ptr::eq(candidate, *r))
                    .expect("ranked record comes from input")
            })
            .collect()
    }

    #[test]
    fn test_top_n() {
        struct TestCase {
            keys: Vec<Option<f64>>,
            n: usize,
            order: RankOrder,
            expected: Vec<usize>,
        }

        let tests = vec![
            TestCase {
                // TC0: ties keep input order
                keys: vec![Some(10.0), Some(30.0), Some(20.0), Some(30.0)],
                n: 3,
                order: RankOrder::Descending,
                expected: vec![1, 3, 2],
            },
            TestCase {
                // TC1: ascending
                keys: vec![Some(10.0), Some(30.0), Some(20.0), Some(30.0)],
                n: 2,
                order: RankOrder::Ascending,
                expected: vec![0, 2],
            },
            TestCase {
                // TC2: n larger than input
                keys: vec![Some(1.0), Some(2.0)],
                n: 10,
                order: RankOrder::Descending,
                expected: vec![1, 0],
            },
            TestCase {
                // TC3: n = 0
                keys: vec![Some(1.0), Some(2.0)],
                n: 0,
                order: RankOrder::Descending,
                expected: vec![],
            },
            TestCase {
                // TC4: missing keys rank last when descending
                keys: vec![None, Some(-5.0), Some(f64::NAN), Some(3.0)],
                n: 4,
                order: RankOrder::Descending,
                expected: vec![3, 1, 0, 2],
            },
            TestCase {
                // TC5: missing keys rank last when ascending
                keys: vec![None, Some(-5.0), Some(f64::NAN), Some(3.0)],
                n: 4,
                order: RankOrder::Ascending,
                expected: vec![1, 3, 0, 2],
            },
            TestCase {
                // TC6: empty input
                keys: vec![],
                n: 3,
                order: RankOrder::Ascending,
                expected: vec![],
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let ranked = top_n(&test.keys, test.n, test.order, |key| *key);
            assert_eq!(indices(&test.keys, &ranked), test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_position_helpers() {
        let position = |coin: &str, distance: Option<f64>, value: f64, pnl: f64| Position {
            coin: coin.into(),
            distance_to_liquidation_pct: distance,
            value,
            pnl,
            ..Default::default()
        };
        let positions = vec![
            position("BTC", Some(12.0), 5_000.0, 300.0),
            position("ETH", None, 9_000.0, -800.0),
            position("SOL", Some(1.5), 1_000.0, -50.0),
            position("DOGE", Some(4.0), 2_000.0, 20.0),
        ];

        let coins = |ranked: Vec<&Position>| -> Vec<String> {
            ranked.into_iter().map(|p| p.coin.to_string()).collect()
        };

        assert_eq!(coins(closest_to_liquidation(&positions, 2)), vec!["SOL", "DOGE"]);
        assert_eq!(coins(closest_to_liquidation(&positions, 4))[3], "ETH");
        assert_eq!(coins(largest_by_value(&positions, 1)), vec!["ETH"]);
        assert_eq!(coins(largest_by_pnl(&positions, 2)), vec!["BTC", "DOGE"]);
        assert_eq!(coins(largest_losers(&positions, 2)), vec!["ETH", "SOL"]);
    }

    #[test]
    fn test_top_traders() {
        let traders = vec![
            TraderSummary {
                address: "0x1".to_string(),
                pnl: 1_000.0,
                ..Default::default()
            },
            TraderSummary {
                address: "0x2".to_string(),
                pnl: 50_000.0,
                ..Default::default()
            },
        ];

        let top = top_traders(&traders, 5);

        assert_eq!(top.len(), 2);
        assert_eq!(top[0].address, "0x2");
    }
}
