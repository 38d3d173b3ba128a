//! Heuristic attractiveness scoring.
//!
//! Each symbol gets four sub-scores derived from its metric record. Every
//! sub-score is capped at [`SUB_SCORE_CAP`]; only the RSI sub-score has a
//! floor. The final score is the weighted sum, left unclamped.

use analysis_core::MetricRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Upper bound applied to every sub-score
pub const SUB_SCORE_CAP: f64 = 10.0;
/// Volume trend percent per sub-score point
pub const VOLUME_DIVISOR: f64 = 10.0;
/// Price change percent per sub-score point
pub const MOMENTUM_DIVISOR: f64 = 5.0;
/// RSI value that earns the full technical sub-score
pub const RSI_CENTER: f64 = 50.0;
/// RSI points away from the center per lost sub-score point
pub const RSI_DIVISOR: f64 = 5.0;
/// Mean SMA deviation percent per sub-score point
pub const TREND_DIVISOR: f64 = 2.0;
/// Default ranking length
pub const DEFAULT_TOP_N: usize = 5;

/// Weights for the sub-scores. Tunable heuristics, not fitted values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    /// Weight for recent volume versus average
    pub volume: f64,
    /// Weight for price momentum
    pub momentum: f64,
    /// Weight for RSI closeness to neutral
    pub technical: f64,
    /// Weight for price versus moving averages
    pub trend: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            volume: 0.30,
            momentum: 0.25,
            technical: 0.25,
            trend: 0.20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubScores {
    pub volume: f64,
    pub momentum: f64,
    pub technical: f64,
    pub trend: f64,
}

impl SubScores {
    pub fn from_metrics(metrics: &MetricRecord) -> Self {
        let volume = (metrics.volume_trend.value / VOLUME_DIVISOR).min(SUB_SCORE_CAP);

        let momentum = (metrics.change_pct.value / MOMENTUM_DIVISOR).min(SUB_SCORE_CAP);

        let technical = (SUB_SCORE_CAP - (metrics.rsi.value - RSI_CENTER).abs() / RSI_DIVISOR)
            .clamp(0.0, SUB_SCORE_CAP);

        let sma_deviation = (metrics.price_vs_sma20.value + metrics.price_vs_sma50.value) / 2.0;
        let trend = (sma_deviation / TREND_DIVISOR).min(SUB_SCORE_CAP);

        Self {
            volume,
            momentum,
            technical,
            trend,
        }
    }

    pub fn weighted(&self, weights: &ScoringWeights) -> f64 {
        self.volume * weights.volume
            + self.momentum * weights.momentum
            + self.technical * weights.technical
            + self.trend * weights.trend
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedSymbol {
    /// 1-based position
    pub rank: usize,
    pub symbol: String,
    pub score: f64,
    pub sub_scores: SubScores,
}

/// Symbols ordered by descending score, truncated to the requested length
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ranking {
    pub entries: Vec<RankedSymbol>,
    /// Symbols scored before truncation
    pub total_scored: usize,
}

impl Ranking {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.symbol.as_str())
    }

    pub fn get(&self, symbol: &str) -> Option<&RankedSymbol> {
        self.entries.iter().find(|e| e.symbol == symbol)
    }
}

/// Scores metric records and orders them
#[derive(Debug, Clone, Default)]
pub struct StockRanker {
    weights: ScoringWeights,
}

impl StockRanker {
    /// Create a new ranker with default weights
    pub fn new() -> Self {
        Self::default()
    }

    /// Create ranker with custom weights
    pub fn with_weights(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    pub fn score(&self, metrics: &MetricRecord) -> (f64, SubScores) {
        let sub_scores = SubScores::from_metrics(metrics);
        (sub_scores.weighted(&self.weights), sub_scores)
    }

    /// Score every symbol and sort descending.
    ///
    /// The map iterates in symbol order and the sort is stable, so equal
    /// scores stay alphabetical.
    pub fn score_all(&self, metrics: &BTreeMap<String, MetricRecord>) -> Vec<RankedSymbol> {
        let mut scored: Vec<RankedSymbol> = metrics
            .iter()
            .map(|(symbol, record)| {
                let (score, sub_scores) = self.score(record);
                debug!("{} scored {:.3} ({:?})", symbol, score, sub_scores);
                RankedSymbol {
                    rank: 0,
                    symbol: symbol.clone(),
                    score,
                    sub_scores,
                }
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));

        for (i, entry) in scored.iter_mut().enumerate() {
            entry.rank = i + 1;
        }
        scored
    }

    /// Get top N symbols
    pub fn rank(&self, metrics: &BTreeMap<String, MetricRecord>, top_n: usize) -> Ranking {
        let mut entries = self.score_all(metrics);
        let total_scored = entries.len();
        entries.truncate(top_n);

        Ranking {
            entries,
            total_scored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::Metric;
    use approx::assert_relative_eq;

    fn record(volume_trend: f64, change_pct: f64, rsi: f64, vs20: f64, vs50: f64) -> MetricRecord {
        MetricRecord {
            current_price: 100.0,
            change_pct: Metric::computed(change_pct),
            avg_volume: 1000.0,
            recent_volume: 1000.0,
            volume_trend: Metric::computed(volume_trend),
            volatility: Metric::computed(20.0),
            sma_20: Metric::computed(100.0),
            sma_50: Metric::computed(100.0),
            rsi: Metric::computed(rsi),
            price_vs_sma20: Metric::computed(vs20),
            price_vs_sma50: Metric::computed(vs50),
        }
    }

    #[test]
    fn test_sub_scores_cap_at_ten() {
        let s = SubScores::from_metrics(&record(1000.0, 1000.0, 50.0, 500.0, 500.0));
        assert_relative_eq!(s.volume, 10.0);
        assert_relative_eq!(s.momentum, 10.0);
        assert_relative_eq!(s.technical, 10.0);
        assert_relative_eq!(s.trend, 10.0);
    }

    #[test]
    fn test_sub_scores_have_no_floor_except_rsi() {
        let s = SubScores::from_metrics(&record(-500.0, -100.0, 100.0, -40.0, -60.0));
        assert_relative_eq!(s.volume, -50.0);
        assert_relative_eq!(s.momentum, -20.0);
        assert_relative_eq!(s.technical, 0.0);
        assert_relative_eq!(s.trend, -25.0);
    }

    #[test]
    fn test_rsi_sub_score_linear_around_center() {
        assert_relative_eq!(SubScores::from_metrics(&record(0.0, 0.0, 70.0, 0.0, 0.0)).technical, 6.0);
        assert_relative_eq!(SubScores::from_metrics(&record(0.0, 0.0, 30.0, 0.0, 0.0)).technical, 6.0);
        assert_relative_eq!(SubScores::from_metrics(&record(0.0, 0.0, 0.0, 0.0, 0.0)).technical, 0.0);
    }

    #[test]
    fn test_weighted_score() {
        let ranker = StockRanker::new();
        // volume 2, momentum 1, technical 10, trend 1.5
        let (score, _) = ranker.score(&record(20.0, 5.0, 50.0, 2.0, 4.0));
        assert_relative_eq!(score, 2.0 * 0.30 + 1.0 * 0.25 + 10.0 * 0.25 + 1.5 * 0.20, epsilon = 1e-12);
    }

    #[test]
    fn test_final_score_is_not_clamped() {
        let (score, _) = StockRanker::new().score(&record(-1000.0, -1000.0, 0.0, -1000.0, -1000.0));
        assert!(score < -100.0);
    }

    #[test]
    fn test_ranking_orders_descending_and_truncates() {
        let mut metrics = BTreeMap::new();
        for i in 0..10 {
            metrics.insert(format!("S{:02}", i), record(i as f64 * 10.0, 0.0, 50.0, 0.0, 0.0));
        }

        let ranking = StockRanker::new().rank(&metrics, 3);

        assert_eq!(ranking.len(), 3);
        assert_eq!(ranking.total_scored, 10);
        assert_eq!(ranking.symbols().collect::<Vec<_>>(), vec!["S09", "S08", "S07"]);
        assert_eq!(
            ranking.entries.iter().map(|e| e.rank).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_ties_break_alphabetically() {
        let mut metrics = BTreeMap::new();
        metrics.insert("ZZZ".to_string(), record(10.0, 10.0, 50.0, 1.0, 1.0));
        metrics.insert("AAA".to_string(), record(10.0, 10.0, 50.0, 1.0, 1.0));
        metrics.insert("MMM".to_string(), record(10.0, 10.0, 50.0, 1.0, 1.0));

        let ranking = StockRanker::new().rank(&metrics, 5);
        assert_eq!(ranking.symbols().collect::<Vec<_>>(), vec!["AAA", "MMM", "ZZZ"]);
    }

    #[test]
    fn test_ranking_is_deterministic() {
        let mut metrics = BTreeMap::new();
        metrics.insert("A".to_string(), record(12.0, -3.0, 44.0, 1.0, -2.0));
        metrics.insert("B".to_string(), record(-8.0, 7.0, 61.0, 3.0, 5.0));
        metrics.insert("C".to_string(), record(40.0, 1.0, 75.0, -1.0, 0.5));

        let ranker = StockRanker::new();
        assert_eq!(ranker.rank(&metrics, 5), ranker.rank(&metrics, 5));
    }

    #[test]
    fn test_custom_weights() {
        let ranker = StockRanker::with_weights(ScoringWeights {
            volume: 1.0,
            momentum: 0.0,
            technical: 0.0,
            trend: 0.0,
        });
        let (score, _) = ranker.score(&record(35.0, 99.0, 50.0, 9.0, 9.0));
        assert_relative_eq!(score, 3.5);
    }

    #[test]
    fn test_empty_metrics_give_empty_ranking() {
        let ranking = StockRanker::new().rank(&BTreeMap::new(), DEFAULT_TOP_N);
        assert!(ranking.is_empty());
        assert_eq!(ranking.total_scored, 0);
    }
}
