use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::AnalysisError;

/// Daily OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Daily bars for one symbol, strictly ascending by date.
///
/// Construction validates the ordering and value invariants, so every
/// consumer can index closes and volumes without re-checking them.
/// Deserialization goes through the same checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTimeSeries")]
pub struct TimeSeries {
    symbol: String,
    bars: Vec<Bar>,
}

#[derive(Deserialize)]
struct RawTimeSeries {
    symbol: String,
    bars: Vec<Bar>,
}

impl TryFrom<RawTimeSeries> for TimeSeries {
    type Error = AnalysisError;

    fn try_from(raw: RawTimeSeries) -> Result<Self, Self::Error> {
        TimeSeries::new(raw.symbol, raw.bars)
    }
}

impl TimeSeries {
    pub fn new(symbol: impl Into<String>, bars: Vec<Bar>) -> Result<Self, AnalysisError> {
        let symbol = symbol.into();

        for pair in bars.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(AnalysisError::InvalidData(format!(
                    "{}: dates not strictly increasing at {}",
                    symbol, pair[1].date
                )));
            }
        }

        if let Some(bar) = bars.iter().find(|b| !(b.close > 0.0) || !b.close.is_finite()) {
            return Err(AnalysisError::InvalidData(format!(
                "{}: non-positive close on {}",
                symbol, bar.date
            )));
        }

        if let Some(bar) = bars.iter().find(|b| !(b.volume >= 0.0) || !b.volume.is_finite()) {
            return Err(AnalysisError::InvalidData(format!(
                "{}: negative volume on {}",
                symbol, bar.date
            )));
        }

        Ok(Self { symbol, bars })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume).collect()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }
}

/// Why a metric carries a substitute value instead of a computed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fallback {
    /// Window shorter than the statistic needs; a documented substitute was used.
    ShortWindow,
    /// Ratio had a zero or undefined denominator.
    UndefinedRatio,
}

/// A derived statistic plus a marker telling whether it was defaulted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<Fallback>,
}

impl Metric {
    pub fn computed(value: f64) -> Self {
        Self { value, fallback: None }
    }

    pub fn fallback(value: f64, reason: Fallback) -> Self {
        Self {
            value,
            fallback: Some(reason),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

/// Fixed-schema statistics for one symbol. Every value is finite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub current_price: f64,
    /// Percent change over the last 30 bars (first bar when shorter)
    pub change_pct: Metric,
    pub avg_volume: f64,
    pub recent_volume: f64,
    pub volume_trend: Metric,
    /// Annualized stdev of daily returns, in percent
    pub volatility: Metric,
    pub sma_20: Metric,
    pub sma_50: Metric,
    pub rsi: Metric,
    pub price_vs_sma20: Metric,
    pub price_vs_sma50: Metric,
}

impl MetricRecord {
    /// Names of the fields that hold a fallback value.
    pub fn fallback_fields(&self) -> Vec<&'static str> {
        [
            ("change_pct", &self.change_pct),
            ("volume_trend", &self.volume_trend),
            ("volatility", &self.volatility),
            ("sma_20", &self.sma_20),
            ("sma_50", &self.sma_50),
            ("rsi", &self.rsi),
            ("price_vs_sma20", &self.price_vs_sma20),
            ("price_vs_sma50", &self.price_vs_sma50),
        ]
        .into_iter()
        .filter(|(_, m)| m.is_fallback())
        .map(|(name, _)| name)
        .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Fitted smoothing parameters behind a forecast
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmoothingFit {
    pub alpha: f64,
    pub beta: f64,
    pub initial_level: f64,
    pub initial_trend: f64,
    /// In-sample sum of squared one-step errors
    pub sse: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub symbol: String,
    pub points: Vec<ForecastPoint>,
    pub fit: SmoothingFit,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(day: u32, close: f64, volume: f64) -> Bar {
        Bar {
            date: NaiveDate::from_ymd_opt(2025, 1, day).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume,
        }
    }

    #[test]
    fn test_series_accepts_ordered_bars() {
        let series = TimeSeries::new("BBCA.JK", vec![bar(2, 100.0, 10.0), bar(3, 101.0, 0.0)]).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.closes(), vec![100.0, 101.0]);
        assert_eq!(series.last_date(), NaiveDate::from_ymd_opt(2025, 1, 3));
    }

    #[test]
    fn test_series_rejects_duplicate_dates() {
        let result = TimeSeries::new("X", vec![bar(2, 100.0, 10.0), bar(2, 101.0, 10.0)]);
        assert!(matches!(result, Err(AnalysisError::InvalidData(_))));
    }

    #[test]
    fn test_series_rejects_bad_values() {
        assert!(TimeSeries::new("X", vec![bar(2, 0.0, 10.0)]).is_err());
        assert!(TimeSeries::new("X", vec![bar(2, f64::NAN, 10.0)]).is_err());
        assert!(TimeSeries::new("X", vec![bar(2, 10.0, -1.0)]).is_err());
    }

    #[test]
    fn test_deserialize_validates_series() {
        let series = TimeSeries::new("X", vec![bar(2, 100.0, 10.0), bar(3, 101.0, 5.0)]).unwrap();
        let json = serde_json::to_string(&series).unwrap();
        assert_eq!(serde_json::from_str::<TimeSeries>(&json).unwrap(), series);

        let unordered = r#"{"symbol":"X","bars":[
            {"date":"2025-01-03","open":1.0,"high":1.0,"low":1.0,"close":1.0,"volume":1.0},
            {"date":"2025-01-02","open":1.0,"high":1.0,"low":1.0,"close":1.0,"volume":1.0}]}"#;
        let err = serde_json::from_str::<TimeSeries>(unordered).unwrap_err();
        assert!(err.to_string().contains("not strictly increasing"));

        let bad_close = r#"{"symbol":"X","bars":[
            {"date":"2025-01-02","open":1.0,"high":1.0,"low":1.0,"close":-1.0,"volume":1.0}]}"#;
        assert!(serde_json::from_str::<TimeSeries>(bad_close).is_err());
    }

    #[test]
    fn test_fallback_fields_lists_defaulted_metrics() {
        let record = MetricRecord {
            current_price: 10.0,
            change_pct: Metric::computed(1.0),
            avg_volume: 5.0,
            recent_volume: 5.0,
            volume_trend: Metric::computed(0.0),
            volatility: Metric::computed(12.0),
            sma_20: Metric::fallback(10.0, Fallback::ShortWindow),
            sma_50: Metric::fallback(10.0, Fallback::ShortWindow),
            rsi: Metric::fallback(50.0, Fallback::UndefinedRatio),
            price_vs_sma20: Metric::computed(0.0),
            price_vs_sma50: Metric::computed(0.0),
        };
        assert_eq!(record.fallback_fields(), vec!["sma_20", "sma_50", "rsi"]);
    }

    #[test]
    fn test_metric_serializes_fallback_flag_only_when_set() {
        let computed = serde_json::to_value(Metric::computed(1.5)).unwrap();
        assert!(computed.get("fallback").is_none());

        let defaulted = serde_json::to_value(Metric::fallback(50.0, Fallback::UndefinedRatio)).unwrap();
        assert_eq!(defaulted["fallback"], "undefined_ratio");
    }
}
