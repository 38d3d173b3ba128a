//! Yahoo Finance chart payloads and their conversion into a [`TimeSeries`].

use analysis_core::{Bar, FetchError, TimeSeries};
use chrono::DateTime;
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
pub(crate) struct ChartResponse {
    chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Option<Vec<i64>>,
    indicators: ChartIndicators,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    /// Exchange offset from UTC in seconds
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
    #[serde(default)]
    adjclose: Option<Vec<ChartAdjClose>>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct ChartAdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

/// Parses a chart body into a validated series.
///
/// Rows without a positive close are dropped, missing volume counts as zero,
/// dates are exchange-local, and a repeated date keeps its last row. With
/// `adjust` set, OHLC are scaled by `adjclose / close` when present.
pub fn parse_chart(symbol: &str, body: &str, adjust: bool) -> Result<TimeSeries, FetchError> {
    let response: ChartResponse = serde_json::from_str(body)
        .map_err(|e| FetchError::invalid(symbol, format!("malformed chart payload: {}", e)))?;

    if let Some(error) = response.chart.error {
        return Err(chart_error(symbol, error));
    }

    let result = response
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| FetchError::Empty(symbol.to_string()))?;

    let timestamps = result.timestamp.unwrap_or_default();
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let adjclose = result
        .indicators
        .adjclose
        .and_then(|a| a.into_iter().next())
        .map(|a| a.adjclose)
        .filter(|_| adjust);

    let mut by_date = BTreeMap::new();
    for (i, &ts) in timestamps.iter().enumerate() {
        let close = match quote.close.get(i).copied().flatten() {
            Some(c) if c > 0.0 && c.is_finite() => c,
            _ => continue,
        };
        let date = match DateTime::from_timestamp(ts + result.meta.gmtoffset, 0) {
            Some(dt) => dt.date_naive(),
            None => continue,
        };

        let ratio = adjclose
            .as_ref()
            .and_then(|a| a.get(i).copied().flatten())
            .filter(|adj| *adj > 0.0 && adj.is_finite())
            .map(|adj| adj / close)
            .unwrap_or(1.0);

        let field = |values: &[Option<f64>]| values.get(i).copied().flatten().unwrap_or(close) * ratio;

        by_date.insert(
            date,
            Bar {
                date,
                open: field(&quote.open),
                high: field(&quote.high),
                low: field(&quote.low),
                close: close * ratio,
                volume: quote
                    .volume
                    .get(i)
                    .copied()
                    .flatten()
                    .filter(|v| *v >= 0.0)
                    .unwrap_or(0.0),
            },
        );
    }

    if by_date.is_empty() {
        return Err(FetchError::Empty(symbol.to_string()));
    }

    TimeSeries::new(symbol, by_date.into_values().collect())
        .map_err(|e| FetchError::invalid(symbol, e.to_string()))
}

fn chart_error(symbol: &str, error: ChartError) -> FetchError {
    let description = error.description.unwrap_or_default();
    if error.code.eq_ignore_ascii_case("Not Found") {
        FetchError::NotFound(symbol.to_string())
    } else {
        FetchError::invalid(symbol, format!("{}: {}", error.code, description))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    // 2025-01-06 02:00 UTC (09:00 WIB) and the two following days
    const BODY: &str = r#"{
        "chart": {
            "result": [{
                "meta": {"currency": "IDR", "symbol": "BBCA.JK", "gmtoffset": 25200},
                "timestamp": [1736128800, 1736215200, 1736301600],
                "indicators": {
                    "quote": [{
                        "open":   [9500, 9600, null],
                        "high":   [9700, 9650, 9800],
                        "low":    [9450, 9500, 9600],
                        "close":  [9600, null, 9750],
                        "volume": [120000, 90000, null]
                    }],
                    "adjclose": [{"adjclose": [4800, null, 9750]}]
                }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn test_parses_rows_and_drops_missing_close() {
        let series = parse_chart("BBCA.JK", BODY, false).unwrap();

        assert_eq!(series.symbol(), "BBCA.JK");
        assert_eq!(series.len(), 2);
        let bars = series.bars();
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2025, 1, 6).unwrap());
        assert_eq!(bars[0].close, 9600.0);
        assert_eq!(bars[0].volume, 120000.0);
        assert_eq!(bars[1].date, NaiveDate::from_ymd_opt(2025, 1, 8).unwrap());
        // Missing open falls back to close, missing volume to zero
        assert_eq!(bars[1].open, 9750.0);
        assert_eq!(bars[1].volume, 0.0);
    }

    #[test]
    fn test_adjusts_prices_by_adjclose() {
        let series = parse_chart("BBCA.JK", BODY, true).unwrap();
        let bar = &series.bars()[0];
        assert_eq!(bar.close, 4800.0);
        assert_eq!(bar.open, 4750.0);
        assert_eq!(bar.high, 4850.0);
    }

    #[test]
    fn test_uses_exchange_local_dates() {
        // 2025-01-06 20:00 UTC is already 2025-01-07 in UTC+7
        let body = r#"{"chart":{"result":[{"meta":{"gmtoffset":25200},"timestamp":[1736193600],
            "indicators":{"quote":[{"open":[1],"high":[1],"low":[1],"close":[1],"volume":[1]}]}}],"error":null}}"#;
        let series = parse_chart("X", body, false).unwrap();
        assert_eq!(series.bars()[0].date, NaiveDate::from_ymd_opt(2025, 1, 7).unwrap());
    }

    #[test]
    fn test_duplicate_dates_keep_last_row() {
        let body = r#"{"chart":{"result":[{"meta":{"gmtoffset":0},"timestamp":[1736128800, 1736150400],
            "indicators":{"quote":[{"open":[1,2],"high":[1,2],"low":[1,2],"close":[10,20],"volume":[5,6]}]}}],"error":null}}"#;
        let series = parse_chart("X", body, false).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.bars()[0].close, 20.0);
    }

    #[test]
    fn test_not_found_error() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        assert_eq!(
            parse_chart("NOPE.JK", body, true),
            Err(FetchError::NotFound("NOPE.JK".to_string()))
        );
    }

    #[test]
    fn test_empty_result() {
        let body = r#"{"chart":{"result":[{"meta":{},"indicators":{"quote":[{}]}}],"error":null}}"#;
        assert_eq!(parse_chart("X", body, true), Err(FetchError::Empty("X".to_string())));

        let body = r#"{"chart":{"result":[],"error":null}}"#;
        assert_eq!(parse_chart("X", body, true), Err(FetchError::Empty("X".to_string())));
    }

    #[test]
    fn test_malformed_payload() {
        assert!(matches!(
            parse_chart("X", "<html>", true),
            Err(FetchError::InvalidResponse { .. })
        ));
    }
}
