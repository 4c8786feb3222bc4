/// Win/loss streak analysis over chronological fills
///
/// Only fills that realised PnL move the state machine; a zero `closed_pnl`
/// (pure opens, break-even closes) neither extends nor breaks a streak.
use crate::shared::types::Fill;
use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Kind of the streak in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize, Display)]
pub enum StreakKind {
    #[display("Win")]
    Win,
    #[display("Loss")]
    Loss,
    #[default]
    #[display("None")]
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum StreakState {
    #[default]
    NoStreak,
    Win(u32),
    Loss(u32),
}

/// Summary of a sequence of closed trades
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct StreakReport {
    pub max_win_streak: u32,
    pub max_loss_streak: u32,
    pub current_streak_length: u32,
    pub current_streak_type: StreakKind,
}

/// Incremental streak tracker
#[derive(Debug, Clone, Default)]
pub struct StreakAnalyzer {
    state: StreakState,
    max_win_streak: u32,
    max_loss_streak: u32,
}

impl StreakAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the realised PnL of the next fill in time order
    pub fn update(&mut self, closed_pnl: f64) {
        self.state = if closed_pnl > 0.0 {
            match self.state {
                StreakState::Win(length) => StreakState::Win(length + 1),
                _ => StreakState::Win(1),
            }
        } else if closed_pnl < 0.0 {
            match self.state {
                StreakState::Loss(length) => StreakState::Loss(length + 1),
                _ => StreakState::Loss(1),
            }
        } else {
            return;
        };

        match self.state {
            StreakState::Win(length) => self.max_win_streak = self.max_win_streak.max(length),
            StreakState::Loss(length) => self.max_loss_streak = self.max_loss_streak.max(length),
            StreakState::NoStreak => {}
        }
    }

    pub fn report(&self) -> StreakReport {
        let (current_streak_type, current_streak_length) = match self.state {
            StreakState::NoStreak => (StreakKind::None, 0),
            StreakState::Win(length) => (StreakKind::Win, length),
            StreakState::Loss(length) => (StreakKind::Loss, length),
        };

        StreakReport {
            max_win_streak: self.max_win_streak,
            max_loss_streak: self.max_loss_streak,
            current_streak_length,
            current_streak_type,
        }
    }
}

/// Streaks over fills that are already in chronological order
pub fn analyze_streaks<'a, I>(fills: I) -> StreakReport
where
    I: IntoIterator<Item = &'a Fill>,
{
    fills
        .into_iter()
        .fold(StreakAnalyzer::new(), |mut analyzer, fill| {
            analyzer.update(fill.closed_pnl);
            analyzer
        })
        .report()
}

/// Oldest first; fills sharing a timestamp keep their relative order
pub fn sort_chronologically(fills: &mut [Fill]) {
    fills.sort_by_key(|fill| fill.timestamp_ms);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fills(pnls: &[f64]) -> Vec<Fill> {
        pnls.iter()
            .enumerate()
            .map(|(index, pnl)| Fill {
                closed_pnl: *pnl,
                timestamp_ms: index as i64,
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn test_analyze_streaks() {
        struct TestCase {
            input: Vec<f64>,
            expected: StreakReport,
        }

        let report = |max_win, max_loss, current, kind| StreakReport {
            max_win_streak: max_win,
            max_loss_streak: max_loss,
            current_streak_length: current,
            current_streak_type: kind,
        };

        let tests = vec![
            TestCase {
                // TC0: mixed sequence ending on a fresh win; -2, -1, -1 is a run of three
                input: vec![5.0, 3.0, -2.0, -1.0, -1.0, 10.0],
                expected: report(2, 3, 1, StreakKind::Win),
            },
            TestCase {
                // TC1: empty
                input: vec![],
                expected: report(0, 0, 0, StreakKind::None),
            },
            TestCase {
                // TC2: zeros are skipped, not streak breakers
                input: vec![1.0, 0.0, 2.0, 0.0],
                expected: report(2, 0, 2, StreakKind::Win),
            },
            TestCase {
                // TC3: only zeros
                input: vec![0.0, 0.0],
                expected: report(0, 0, 0, StreakKind::None),
            },
            TestCase {
                // TC4: ends on a loss run
                input: vec![-1.0, 4.0, -3.0, -3.0],
                expected: report(1, 2, 2, StreakKind::Loss),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = analyze_streaks(&fills(&test.input));
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_incremental_matches_batch() {
        let pnls = [2.0, -1.0, -1.0, 0.0, 3.0, 3.0, 3.0];
        let mut analyzer = StreakAnalyzer::new();
        for pnl in pnls {
            analyzer.update(pnl);
        }

        assert_eq!(analyzer.report(), analyze_streaks(&fills(&pnls)));
        assert_eq!(analyzer.report().current_streak_type.to_string(), "Win");
    }

    #[test]
    fn test_sort_chronologically() {
        let mut batch = fills(&[1.0, -1.0, 2.0]);
        batch[0].timestamp_ms = 300;
        batch[1].timestamp_ms = 100;
        batch[2].timestamp_ms = 100;

        sort_chronologically(&mut batch);

        let order: Vec<f64> = batch.iter().map(|f| f.closed_pnl).collect();
        assert_eq!(order, vec![-1.0, 2.0, 1.0]);
    }
}
