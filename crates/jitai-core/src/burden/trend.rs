//! Call-over-call burden score history.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const DEFAULT_HISTORY: usize = 20;
/// Cumulative change across the history that counts as a trend on its own.
const CUMULATIVE_THRESHOLD: i32 = 5;
const RUN_LENGTH: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendDirection {
    Escalating,
    #[default]
    Stable,
    Recovering,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurdenTrend {
    pub direction: TrendDirection,
    pub last_delta: Option<i32>,
    pub average_delta: f64,
    pub samples: usize,
    pub latest_score: Option<i32>,
}

/// Bounded history of `(timestamp_ms, score)` observations.
#[derive(Debug, Clone)]
pub struct BurdenTrendMonitor {
    history: VecDeque<(i64, i32)>,
    capacity: usize,
}

impl Default for BurdenTrendMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY)
    }
}

impl BurdenTrendMonitor {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn record(&mut self, timestamp_ms: i64, score: i32) {
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back((timestamp_ms, score));
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    pub fn trend(&self) -> BurdenTrend {
        let scores: Vec<i32> = self.history.iter().map(|(_, s)| *s).collect();
        let deltas: Vec<i32> = scores.windows(2).map(|w| w[1] - w[0]).collect();

        let average_delta = if deltas.is_empty() {
            0.0
        } else {
            f64::from(deltas.iter().sum::<i32>()) / deltas.len() as f64
        };
        let cumulative = match (scores.first(), scores.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0,
        };
        let tail = &deltas[deltas.len().saturating_sub(RUN_LENGTH)..];
        let full_run = tail.len() == RUN_LENGTH;

        let direction = if (full_run && tail.iter().all(|d| *d > 0)) || cumulative >= CUMULATIVE_THRESHOLD {
            TrendDirection::Escalating
        } else if (full_run && tail.iter().all(|d| *d < 0)) || cumulative <= -CUMULATIVE_THRESHOLD {
            TrendDirection::Recovering
        } else {
            TrendDirection::Stable
        };

        BurdenTrend {
            direction,
            last_delta: deltas.last().copied(),
            average_delta,
            samples: scores.len(),
            latest_score: scores.last().copied(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor_with(scores: &[i32]) -> BurdenTrendMonitor {
        let mut monitor = BurdenTrendMonitor::default();
        for (i, s) in scores.iter().enumerate() {
            monitor.record(i as i64, *s);
        }
        monitor
    }

    #[test]
    fn test_empty_is_stable() {
        let trend = BurdenTrendMonitor::default().trend();
        assert_eq!(trend.direction, TrendDirection::Stable);
        assert_eq!(trend.samples, 0);
        assert!(trend.last_delta.is_none());
    }

    #[test]
    fn test_three_rising_deltas_escalate() {
        assert_eq!(monitor_with(&[2, 3, 4, 5]).trend().direction, TrendDirection::Escalating);
        assert_eq!(monitor_with(&[2, 3, 4]).trend().direction, TrendDirection::Stable);
    }

    #[test]
    fn test_large_jump_escalates() {
        let trend = monitor_with(&[1, 7]).trend();
        assert_eq!(trend.direction, TrendDirection::Escalating);
        assert_eq!(trend.last_delta, Some(6));
    }

    #[test]
    fn test_falling_scores_recover() {
        assert_eq!(monitor_with(&[9, 8, 6, 5]).trend().direction, TrendDirection::Recovering);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut monitor = BurdenTrendMonitor::new(3);
        for s in 0..10 {
            monitor.record(s as i64, 4);
        }
        assert_eq!(monitor.trend().samples, 3);
    }
}
