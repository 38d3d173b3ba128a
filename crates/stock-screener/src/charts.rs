use crate::report::short_symbol;
use analysis_core::{ForecastResult, TimeSeries};
use analysis_orchestrator::{ForecastOutcome, ScreenReport};
use anyhow::{Context, Result};
use plotters::prelude::*;
use std::path::{Path, PathBuf};

type DrawResult<T> = std::result::Result<T, Box<dyn std::error::Error>>;

pub const ANALYSIS_CHART: &str = "stock_analysis.svg";

const FONT: &str = "sans-serif";
const ORANGE: RGBColor = RGBColor(255, 140, 0);
const SCORE_LOW: RGBColor = RGBColor(68, 1, 84);
const SCORE_HIGH: RGBColor = RGBColor(253, 231, 37);

/// One bar of a categorical bar panel
struct BarValue {
    label: String,
    value: f64,
    color: RGBColor,
}

/// Write the analysis panel and one forecast chart per successful forecast.
pub fn write_charts(report: &ScreenReport, dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let mut written = Vec::new();

    let path = dir.join(ANALYSIS_CHART);
    draw_analysis(report, &path)
        .map_err(|e| anyhow::anyhow!("Failed to draw {}: {}", path.display(), e))?;
    written.push(path);

    for (symbol, outcome) in &report.forecasts {
        let (ForecastOutcome::Ready(forecast), Some(series)) = (outcome, report.series.get(symbol))
        else {
            continue;
        };
        let path = dir.join(forecast_file_name(symbol));
        draw_forecast(series, forecast, &path)
            .map_err(|e| anyhow::anyhow!("Failed to draw {}: {}", path.display(), e))?;
        written.push(path);
    }

    Ok(written)
}

pub fn forecast_file_name(symbol: &str) -> String {
    let safe: String = short_symbol(symbol)
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect();
    format!("forecast_{}.svg", safe)
}

fn draw_analysis(report: &ScreenReport, path: &Path) -> DrawResult<()> {
    let root = SVGBackend::new(path, (1600, 1200)).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.titled("Stock Screen Analysis", (FONT, 32))?;
    let panels = root.split_evenly((2, 2));

    let changes: Vec<BarValue> = report
        .metrics
        .iter()
        .map(|(symbol, m)| BarValue {
            label: short_symbol(symbol).to_string(),
            value: m.change_pct.value,
            color: if m.change_pct.value > 0.0 { GREEN } else { RED },
        })
        .collect();
    bar_panel(&panels[0], "Change % (last 30 bars)", &changes, None, &[], true)?;

    let volume: Vec<BarValue> = report
        .metrics
        .iter()
        .map(|(symbol, m)| BarValue {
            label: short_symbol(symbol).to_string(),
            value: m.volume_trend.value,
            color: if m.volume_trend.value > 0.0 { BLUE } else { ORANGE },
        })
        .collect();
    bar_panel(&panels[1], "Volume Trend % (recent vs average)", &volume, None, &[], false)?;

    let rsi: Vec<BarValue> = report
        .metrics
        .iter()
        .map(|(symbol, m)| BarValue {
            label: short_symbol(symbol).to_string(),
            value: m.rsi.value,
            color: rsi_color(m.rsi.value),
        })
        .collect();
    bar_panel(
        &panels[2],
        "RSI (14)",
        &rsi,
        Some((0.0, 100.0)),
        &[(70.0, RED), (30.0, GREEN)],
        false,
    )?;

    let last = report.ranking.len().saturating_sub(1).max(1) as f64;
    let scores: Vec<BarValue> = report
        .ranking
        .entries
        .iter()
        .enumerate()
        .map(|(i, entry)| BarValue {
            label: short_symbol(&entry.symbol).to_string(),
            value: entry.score,
            color: blend(SCORE_LOW, SCORE_HIGH, i as f64 / last),
        })
        .collect();
    let title = format!("Top {} Ranked Scores", report.ranking.len());
    bar_panel(&panels[3], &title, &scores, None, &[], true)?;

    root.present()?;
    Ok(())
}

fn rsi_color(rsi: f64) -> RGBColor {
    if rsi > 70.0 {
        RED
    } else if rsi < 30.0 {
        GREEN
    } else {
        BLUE
    }
}

fn blend(from: RGBColor, to: RGBColor, t: f64) -> RGBColor {
    let t = t.clamp(0.0, 1.0);
    let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    RGBColor(mix(from.0, to.0), mix(from.1, to.1), mix(from.2, to.2))
}

/// Value range that always includes zero, padded so labels fit.
fn value_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values.fold((0.0_f64, 0.0_f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let pad = ((hi - lo) * 0.1).max(1.0);
    (if lo < 0.0 { lo - pad } else { 0.0 }, hi + pad)
}

fn bar_panel(
    area: &DrawingArea<SVGBackend<'_>, plotters::coord::Shift>,
    title: &str,
    bars: &[BarValue],
    fixed_range: Option<(f64, f64)>,
    guides: &[(f64, RGBColor)],
    value_labels: bool,
) -> DrawResult<()> {
    let n = bars.len().max(1);
    let (lo, hi) = fixed_range.unwrap_or_else(|| value_range(bars.iter().map(|b| b.value)));

    let mut chart = ChartBuilder::on(area)
        .caption(title, (FONT, 22))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5..(n as f64 - 0.5), lo..hi)?;

    let label_at = |x: &f64| {
        let i = x.round();
        if (x - i).abs() > 1e-6 || i < 0.0 {
            return String::new();
        }
        bars.get(i as usize).map(|b| b.label.clone()).unwrap_or_default()
    };
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n)
        .x_label_formatter(&label_at)
        .draw()?;

    chart.draw_series(bars.iter().enumerate().map(|(i, bar)| {
        let x = i as f64;
        Rectangle::new([(x - 0.4, 0.0), (x + 0.4, bar.value)], bar.color.mix(0.75).filled())
    }))?;

    if value_labels {
        chart.draw_series(bars.iter().enumerate().map(|(i, bar)| {
            Text::new(
                format!("{:.1}", bar.value),
                (i as f64 - 0.3, bar.value.max(0.0) + (hi - lo) * 0.04),
                (FONT, 12).into_font(),
            )
        }))?;
    }

    let zero = std::iter::once(PathElement::new(
        vec![(-0.5, 0.0), (n as f64 - 0.5, 0.0)],
        BLACK.mix(0.3),
    ));
    chart.draw_series(zero)?;

    for (y, color) in guides {
        chart.draw_series(std::iter::once(PathElement::new(
            vec![(-0.5, *y), (n as f64 - 0.5, *y)],
            color.stroke_width(2),
        )))?;
    }

    Ok(())
}

fn draw_forecast(series: &TimeSeries, forecast: &ForecastResult, path: &Path) -> DrawResult<()> {
    let closes = series.closes();
    let Some(&last_close) = closes.last() else {
        return Ok(());
    };
    let n = closes.len();

    let history: Vec<(f64, f64)> = closes.iter().enumerate().map(|(i, &c)| (i as f64, c)).collect();
    let projected: Vec<(f64, f64)> = std::iter::once(((n - 1) as f64, last_close))
        .chain(
            forecast
                .points
                .iter()
                .enumerate()
                .map(|(i, p)| ((n + i) as f64, p.value)),
        )
        .collect();

    let dates: Vec<String> = series
        .bars()
        .iter()
        .map(|b| b.date)
        .chain(forecast.points.iter().map(|p| p.date))
        .map(|d| d.format("%m-%d").to_string())
        .collect();

    let (min, max) = history
        .iter()
        .chain(projected.iter())
        .fold((f64::MAX, f64::MIN), |(lo, hi), &(_, y)| (lo.min(y), hi.max(y)));
    let pad = ((max - min) * 0.05).max(max.abs() * 0.01).max(1e-6);
    let x_end = (dates.len().max(2) - 1) as f64;

    let root = SVGBackend::new(path, (1200, 800)).into_drawing_area();
    root.fill(&WHITE)?;
    let (price_area, volume_area) = root.split_vertically(580);

    let title = format!(
        "{} close with {}-day forecast (alpha {:.2}, beta {:.2})",
        series.symbol(),
        forecast.points.len(),
        forecast.fit.alpha,
        forecast.fit.beta
    );
    let mut chart = ChartBuilder::on(&price_area)
        .caption(title, (FONT, 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(0.0..x_end, (min - pad)..(max + pad))?;

    let label_at = |x: &f64| {
        let i = x.round();
        if i < 0.0 {
            return String::new();
        }
        dates.get(i as usize).cloned().unwrap_or_default()
    };
    chart
        .configure_mesh()
        .x_labels(10)
        .x_label_formatter(&label_at)
        .y_desc("Close")
        .draw()?;

    chart
        .draw_series(LineSeries::new(history, BLUE.stroke_width(2)))?
        .label("Historical close")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));

    chart
        .draw_series(LineSeries::new(projected.clone(), RED.stroke_width(2)))?
        .label("Forecast")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));
    chart.draw_series(
        projected
            .iter()
            .skip(1)
            .map(|&(x, y)| Circle::new((x, y), 4, RED.filled())),
    )?;

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    volume_strip(&volume_area, series, x_end, &label_at)?;

    root.present()?;
    Ok(())
}

/// Daily volume bars aligned with the price chart's x axis
fn volume_strip(
    area: &DrawingArea<SVGBackend<'_>, plotters::coord::Shift>,
    series: &TimeSeries,
    x_end: f64,
    label_at: &dyn Fn(&f64) -> String,
) -> DrawResult<()> {
    let volumes = series.volumes();
    let max = volumes.iter().cloned().fold(0.0_f64, f64::max).max(1.0);

    let mut chart = ChartBuilder::on(area)
        .caption("Volume", (FONT, 18))
        .margin(20)
        .x_label_area_size(30)
        .y_label_area_size(70)
        .build_cartesian_2d(0.0..x_end, 0.0..max * 1.1)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(10)
        .x_label_formatter(label_at)
        .y_label_formatter(&|v| format!("{:.0}", v))
        .draw()?;

    let closes = series.closes();
    chart.draw_series(volumes.iter().enumerate().map(|(i, &v)| {
        let up = i == 0 || closes[i] >= closes[i - 1];
        let color = if up { GREEN } else { RED };
        let x = i as f64;
        Rectangle::new([(x - 0.4, 0.0), (x + 0.4, v)], color.mix(0.6).filled())
    }))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{Bar, Lookback, Metric, MetricRecord};
    use analysis_orchestrator::StockUniverse;
    use chrono::{Duration, NaiveDate, Utc};
    use std::collections::BTreeMap;
    use stock_ranker::StockRanker;

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("stock-screener-{}-{}", name, std::process::id()))
    }

    fn series(symbol: &str) -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let bars = (0..30)
            .map(|i| {
                let close = 100.0 + i as f64;
                Bar {
                    date: start + Duration::days(i),
                    open: close,
                    high: close,
                    low: close,
                    close,
                    volume: 1000.0,
                }
            })
            .collect();
        TimeSeries::new(symbol, bars).unwrap()
    }

    fn record(change: f64, rsi: f64) -> MetricRecord {
        MetricRecord {
            current_price: 129.0,
            change_pct: Metric::computed(change),
            avg_volume: 1000.0,
            recent_volume: 1000.0,
            volume_trend: Metric::computed(-change),
            volatility: Metric::computed(10.0),
            sma_20: Metric::computed(120.0),
            sma_50: Metric::computed(110.0),
            rsi: Metric::computed(rsi),
            price_vs_sma20: Metric::computed(7.5),
            price_vs_sma50: Metric::computed(17.3),
        }
    }

    #[test]
    fn test_forecast_file_name() {
        assert_eq!(forecast_file_name("BBCA.JK"), "forecast_BBCA.svg");
        assert_eq!(forecast_file_name("^JKSE"), "forecast__JKSE.svg");
    }

    #[test]
    fn test_value_range_includes_zero() {
        assert_eq!(value_range([5.0, 10.0].into_iter()), (0.0, 11.0));
        let (lo, hi) = value_range([-20.0, 10.0].into_iter());
        assert!(lo < -20.0 && hi > 10.0);
        assert_eq!(value_range(std::iter::empty()), (0.0, 1.0));
    }

    #[test]
    fn test_rsi_colors() {
        let rgb = |c: RGBColor| (c.0, c.1, c.2);
        assert_eq!(rgb(rsi_color(75.0)), rgb(RED));
        assert_eq!(rgb(rsi_color(25.0)), rgb(GREEN));
        assert_eq!(rgb(rsi_color(50.0)), rgb(BLUE));
    }

    #[test]
    fn test_write_charts() {
        let ts = series("BBCA.JK");
        let forecast = sample_forecast(&ts);

        let mut metrics = BTreeMap::new();
        metrics.insert("BBCA.JK".to_string(), record(12.0, 75.0));
        metrics.insert("TLKM.JK".to_string(), record(-4.0, 25.0));
        let ranking = StockRanker::new().rank(&metrics, 5);

        let mut forecasts = BTreeMap::new();
        forecasts.insert("BBCA.JK".to_string(), ForecastOutcome::Ready(forecast));
        forecasts.insert(
            "TLKM.JK".to_string(),
            ForecastOutcome::Failed {
                reason: "no data".to_string(),
            },
        );
        let mut series_map = BTreeMap::new();
        series_map.insert("BBCA.JK".to_string(), ts);

        let report = ScreenReport {
            generated_at: Utc::now(),
            lookback: Lookback::Months(2),
            attempted: StockUniverse::IdxMostActive.len(),
            metrics,
            ranking,
            forecasts,
            failures: Vec::new(),
            series: series_map,
        };

        let dir = temp_dir("charts");
        let written = write_charts(&report, &dir).unwrap();

        assert_eq!(written.len(), 2);
        assert!(written[0].ends_with(ANALYSIS_CHART));
        assert!(written[1].ends_with("forecast_BBCA.svg"));
        for path in &written {
            let svg = std::fs::read_to_string(path).unwrap();
            assert!(svg.contains("<svg"));
        }
        let forecast_svg = std::fs::read_to_string(&written[1]).unwrap();
        assert!(forecast_svg.contains("Volume"));
        std::fs::remove_dir_all(&dir).ok();
    }

    fn sample_forecast(ts: &TimeSeries) -> ForecastResult {
        use analysis_core::{ForecastPoint, SmoothingFit};
        let last = ts.last_date().unwrap();
        ForecastResult {
            symbol: ts.symbol().to_string(),
            points: (1..=7)
                .map(|i| ForecastPoint {
                    date: last + Duration::days(i),
                    value: 129.0 + i as f64,
                })
                .collect(),
            fit: SmoothingFit {
                alpha: 1.0,
                beta: 0.0,
                initial_level: 100.0,
                initial_trend: 1.0,
                sse: 0.0,
            },
        }
    }
}
