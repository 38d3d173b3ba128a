//! Console rendering of a screening run.

use analysis_core::{Metric, MetricRecord};
use analysis_orchestrator::{FailureStage, ForecastOutcome, ScreenReport, StockUniverse};
use std::fmt::{self, Write};

const NAME_WIDTH: usize = 28;
const RULE: &str = "--------------------------------------------------------------------------------";
const HEAVY_RULE: &str = "================================================================================";

/// Drop an exchange suffix such as `.JK`; class suffixes like `BRK.B` stay.
pub fn short_symbol(symbol: &str) -> &str {
    match symbol.rsplit_once('.') {
        Some((base, suffix))
            if !base.is_empty()
                && suffix.len() >= 2
                && suffix.chars().all(|c| c.is_ascii_alphabetic()) =>
        {
            base
        }
        _ => symbol,
    }
}

pub fn truncate_name(name: &str, width: usize) -> String {
    name.chars().take(width).collect()
}

fn marker(metric: &Metric) -> &'static str {
    if metric.is_fallback() {
        "*"
    } else {
        ""
    }
}

fn price(value: f64) -> String {
    if value >= 1000.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}

/// Reasons a ranked symbol looks attractive
pub fn prediction_factors(metrics: &MetricRecord) -> Vec<String> {
    let mut factors = Vec::new();
    if metrics.volume_trend.value > 0.0 {
        factors.push(format!(
            "High volume activity (+{:.1}%)",
            metrics.volume_trend.value
        ));
    }
    if metrics.change_pct.value > 0.0 {
        factors.push(format!(
            "Positive price momentum (+{:.1}%)",
            metrics.change_pct.value
        ));
    }
    if (30.0..=70.0).contains(&metrics.rsi.value) {
        factors.push(format!("Healthy RSI ({:.1})", metrics.rsi.value));
    }
    if metrics.price_vs_sma20.value > 0.0 {
        factors.push("Above 20-day moving average".to_string());
    }
    factors
}

pub fn render(report: &ScreenReport, universe: &StockUniverse) -> String {
    let mut out = String::new();
    match write_report(&mut out, report, universe) {
        Ok(()) => out,
        Err(_) => String::new(),
    }
}

fn write_report(out: &mut String, report: &ScreenReport, universe: &StockUniverse) -> fmt::Result {
    writeln!(out, "🚀 Stock Screener")?;
    writeln!(out, "{}", &HEAVY_RULE[..50])?;
    writeln!(
        out,
        "📊 Analyzed {} stocks over {} ({})",
        report.attempted,
        report.lookback,
        report.generated_at.format("%Y-%m-%d %H:%M UTC")
    )?;

    write_fetch_summary(out, report)?;
    write_change_table(out, report, universe)?;
    write_ranking(out, report, universe)?;
    write_details(out, report, universe)?;
    write_forecasts(out, report)?;

    writeln!(out)?;
    writeln!(out, "⚠️  Disclaimer: This analysis is for educational purposes only.")?;
    writeln!(out, "   Always do your own research before making investment decisions.")?;
    Ok(())
}

fn write_fetch_summary(out: &mut String, report: &ScreenReport) -> fmt::Result {
    writeln!(out)?;
    writeln!(
        out,
        "📈 Computed metrics for {} of {} stocks",
        report.metrics.len(),
        report.attempted
    )?;
    for failure in &report.failures {
        let stage = match failure.stage {
            FailureStage::Fetch => "fetch",
            FailureStage::Metrics => "metrics",
        };
        writeln!(out, "   ❌ {} ({}): {}", failure.symbol, stage, failure.reason)?;
    }
    Ok(())
}

fn write_change_table(out: &mut String, report: &ScreenReport, universe: &StockUniverse) -> fmt::Result {
    let mut rows: Vec<(&String, &MetricRecord)> = report.metrics.iter().collect();
    rows.sort_by(|a, b| b.1.change_pct.value.total_cmp(&a.1.change_pct.value));

    writeln!(out)?;
    writeln!(out, "📋 Stocks sorted by change %:")?;
    writeln!(out, "{}", RULE)?;
    writeln!(
        out,
        "{:<10} {:<30} {:>9} {:>12} {:>15}",
        "Symbol", "Name", "Change%", "Price", "Volume Trend%"
    )?;
    writeln!(out, "{}", RULE)?;

    for (symbol, m) in rows {
        writeln!(
            out,
            "{:<10} {:<30} {:>8.1}%{:<1}{:>12} {:>13.1}%{}",
            short_symbol(symbol),
            truncate_name(universe.display_name(symbol), NAME_WIDTH),
            m.change_pct.value,
            marker(&m.change_pct),
            price(m.current_price),
            m.volume_trend.value,
            marker(&m.volume_trend),
        )?;
    }
    Ok(())
}

fn write_ranking(out: &mut String, report: &ScreenReport, universe: &StockUniverse) -> fmt::Result {
    writeln!(out)?;
    writeln!(
        out,
        "🎯 Top {} of {} ranked stocks:",
        report.ranking.len(),
        report.ranking.total_scored
    )?;
    writeln!(out, "{}", RULE)?;
    writeln!(
        out,
        "{:<5} {:<10} {:<30} {:>7} {:>14} {:>9}",
        "Rank", "Symbol", "Name", "Score", "Price", "Change%"
    )?;
    writeln!(out, "{}", RULE)?;

    for entry in &report.ranking.entries {
        let Some(m) = report.metrics.get(&entry.symbol) else {
            continue;
        };
        writeln!(
            out,
            "{:<5} {:<10} {:<30} {:>7.2} {:>14} {:>8.1}%",
            entry.rank,
            short_symbol(&entry.symbol),
            truncate_name(universe.display_name(&entry.symbol), NAME_WIDTH),
            entry.score,
            price(m.current_price),
            m.change_pct.value,
        )?;
    }
    Ok(())
}

fn write_details(out: &mut String, report: &ScreenReport, universe: &StockUniverse) -> fmt::Result {
    writeln!(out)?;
    writeln!(out, "📊 Detailed analysis of top ranked stocks:")?;
    writeln!(out, "{}", HEAVY_RULE)?;

    let mut any_fallback = false;
    for entry in &report.ranking.entries {
        let Some(m) = report.metrics.get(&entry.symbol) else {
            continue;
        };
        any_fallback |= !m.fallback_fields().is_empty();
        let s = &entry.sub_scores;

        writeln!(out)?;
        writeln!(
            out,
            "{}. {} - {}",
            entry.rank,
            entry.symbol,
            universe.display_name(&entry.symbol)
        )?;
        writeln!(
            out,
            "   Score: {:.2} (volume {:.1}, momentum {:.1}, technical {:.1}, trend {:.1})",
            entry.score, s.volume, s.momentum, s.technical, s.trend
        )?;
        writeln!(out, "   Current Price: {}", price(m.current_price))?;
        writeln!(out, "   Change (30 bars): {:.1}%{}", m.change_pct.value, marker(&m.change_pct))?;
        writeln!(out, "   Volume Trend: {:.1}%{}", m.volume_trend.value, marker(&m.volume_trend))?;
        writeln!(out, "   RSI: {:.1}{}", m.rsi.value, marker(&m.rsi))?;
        writeln!(out, "   Volatility: {:.1}%{}", m.volatility.value, marker(&m.volatility))?;
        writeln!(
            out,
            "   vs SMA20: {:+.1}%{}  vs SMA50: {:+.1}%{}",
            m.price_vs_sma20.value,
            marker(&m.price_vs_sma20),
            m.price_vs_sma50.value,
            marker(&m.price_vs_sma50)
        )?;

        writeln!(out, "   📈 Factors:")?;
        let factors = prediction_factors(m);
        if factors.is_empty() {
            writeln!(out, "      (none)")?;
        }
        for factor in factors {
            writeln!(out, "      ✅ {}", factor)?;
        }
    }

    if any_fallback {
        writeln!(out)?;
        writeln!(out, "   * fallback value: window too short or ratio undefined")?;
    }
    Ok(())
}

fn write_forecasts(out: &mut String, report: &ScreenReport) -> fmt::Result {
    for (symbol, outcome) in &report.forecasts {
        writeln!(out)?;
        match outcome {
            ForecastOutcome::Ready(result) => {
                writeln!(
                    out,
                    "🔮 {}-day forecast for {} (alpha {:.3}, beta {:.3})",
                    result.points.len(),
                    symbol,
                    result.fit.alpha,
                    result.fit.beta
                )?;
                writeln!(out, "   {:<12} {:>15}", "Date", "Predicted close")?;
                for point in &result.points {
                    writeln!(out, "   {:<12} {:>15.2}", point.date.format("%Y-%m-%d"), point.value)?;
                }
            }
            ForecastOutcome::Failed { reason } => {
                writeln!(out, "🔮 Forecast for {} unavailable: {}", symbol, reason)?;
            }
        }
    }
    Ok(())
}
