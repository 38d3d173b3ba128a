use analysis_core::{AnalysisError, Fallback, Metric, MetricRecord, TimeSeries};
use tracing::debug;

use crate::indicators::*;

/// Minimum bars for a symbol to be analyzed at all
pub const MIN_BARS: usize = 5;
/// Bars back used as the momentum baseline
pub const CHANGE_LOOKBACK: usize = 30;
/// Bars averaged for `recent_volume`
pub const RECENT_VOLUME_WINDOW: usize = 5;
pub const SMA_SHORT: usize = 20;
pub const SMA_LONG: usize = 50;
pub const RSI_PERIOD: usize = 14;
/// RSI reported when the gain/loss ratio is undefined
pub const NEUTRAL_RSI: f64 = 50.0;

/// Turns one symbol's daily series into a [`MetricRecord`].
#[derive(Debug, Clone, Default)]
pub struct MetricEngine;

impl MetricEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn compute(&self, series: &TimeSeries) -> Result<MetricRecord, AnalysisError> {
        if series.len() < MIN_BARS {
            return Err(AnalysisError::InsufficientData {
                symbol: series.symbol().to_string(),
                required: MIN_BARS,
                actual: series.len(),
            });
        }

        let closes = series.closes();
        let volumes = series.volumes();
        let current_price = closes[closes.len() - 1];

        let change_pct = change_since_lookback(&closes);

        let avg_volume = mean(&volumes).unwrap_or(0.0);
        let recent_volume = mean(&volumes[volumes.len() - RECENT_VOLUME_WINDOW..]).unwrap_or(0.0);
        let volume_trend = match pct_change(avg_volume, recent_volume) {
            Some(v) => Metric::computed(v),
            None => Metric::fallback(0.0, Fallback::UndefinedRatio),
        };

        let volatility = match annualized_volatility(&closes) {
            Some(v) => Metric::computed(v),
            None => Metric::fallback(0.0, Fallback::UndefinedRatio),
        };

        let sma_20 = trailing_sma(&closes, SMA_SHORT, current_price);
        let sma_50 = trailing_sma(&closes, SMA_LONG, current_price);

        let rsi = match rsi(&closes, RSI_PERIOD).last() {
            Some(Some(v)) => Metric::computed(*v),
            Some(None) => Metric::fallback(NEUTRAL_RSI, Fallback::UndefinedRatio),
            None => Metric::fallback(NEUTRAL_RSI, Fallback::ShortWindow),
        };

        let record = MetricRecord {
            current_price,
            change_pct,
            avg_volume,
            recent_volume,
            volume_trend,
            volatility,
            price_vs_sma20: deviation_from(current_price, &sma_20),
            price_vs_sma50: deviation_from(current_price, &sma_50),
            sma_20,
            sma_50,
            rsi,
        };

        let defaulted = record.fallback_fields();
        if !defaulted.is_empty() {
            debug!("{}: fallback values used for {:?}", series.symbol(), defaulted);
        }

        Ok(record)
    }
}

/// Percent change from 30 bars back, or from the first bar on shorter series.
fn change_since_lookback(closes: &[f64]) -> Metric {
    let last = closes[closes.len() - 1];
    let (baseline, short) = if closes.len() >= CHANGE_LOOKBACK {
        (closes[closes.len() - CHANGE_LOOKBACK], false)
    } else {
        (closes[0], true)
    };

    match pct_change(baseline, last) {
        Some(v) if short => Metric::fallback(v, Fallback::ShortWindow),
        Some(v) => Metric::computed(v),
        None => Metric::fallback(0.0, Fallback::UndefinedRatio),
    }
}

fn trailing_sma(closes: &[f64], period: usize, current_price: f64) -> Metric {
    match sma(closes, period).last() {
        Some(&v) => Metric::computed(v),
        None => Metric::fallback(current_price, Fallback::ShortWindow),
    }
}

/// Deviation of the price from a moving average. Inherits the average's
/// fallback marker so a defaulted SMA never reads as a measured 0%.
fn deviation_from(current_price: f64, average: &Metric) -> Metric {
    match pct_change(average.value, current_price) {
        Some(v) => Metric {
            value: v,
            fallback: average.fallback,
        },
        None => Metric::fallback(0.0, Fallback::UndefinedRatio),
    }
}
