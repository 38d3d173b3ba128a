//! Holt's linear (additive trend, no seasonality) exponential smoothing.
//!
//! Recursions, with `y_t` the observation at step `t`:
//!
//! ```text
//! forecast_t = level_{t-1} + trend_{t-1}
//! level_t    = alpha * y_t + (1 - alpha) * (level_{t-1} + trend_{t-1})
//! trend_t    = beta * (level_t - level_{t-1}) + (1 - beta) * trend_{t-1}
//! ```
//!
//! Fitting minimises the in-sample sum of squared one-step errors over
//! `alpha`, `beta` and the initial level/trend. For fixed smoothing
//! parameters the one-step forecasts are linear in the initial state, so the
//! initial state is solved exactly by least squares and only the two
//! smoothing parameters are searched.

use analysis_core::{ForecastPoint, ForecastResult, SmoothingFit, TimeSeries};
use nalgebra::{Matrix2, Vector2};
use tracing::debug;

use crate::calendar::next_business_days;
use crate::error::ForecastError;

/// Forecast steps produced per symbol
pub const FORECAST_HORIZON: usize = 7;
/// Fewest observations the model is fitted on
pub const MIN_OBSERVATIONS: usize = 3;

const GRID_STEPS: usize = 20;
const REFINE_TOLERANCE: f64 = 1e-4;

/// A fitted model, holding the smoothed state after the last observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoltModel {
    pub alpha: f64,
    pub beta: f64,
    pub initial_level: f64,
    pub initial_trend: f64,
    pub level: f64,
    pub trend: f64,
    pub sse: f64,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    alpha: f64,
    beta: f64,
    initial_level: f64,
    initial_trend: f64,
    sse: f64,
}

impl HoltModel {
    pub fn fit(data: &[f64]) -> Result<Self, ForecastError> {
        if data.len() < MIN_OBSERVATIONS {
            return Err(ForecastError::InsufficientData {
                required: MIN_OBSERVATIONS,
                actual: data.len(),
            });
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::NonFinite);
        }

        let best = refine(data, grid_search(data));
        let (_, level, trend) = smooth(data, best.alpha, best.beta, best.initial_level, best.initial_trend);

        if !(best.sse.is_finite() && level.is_finite() && trend.is_finite()) {
            return Err(ForecastError::NonFinite);
        }

        debug!(
            "holt fit: alpha={:.4} beta={:.4} sse={:.4} over {} points",
            best.alpha,
            best.beta,
            best.sse,
            data.len()
        );

        Ok(Self {
            alpha: best.alpha,
            beta: best.beta,
            initial_level: best.initial_level,
            initial_trend: best.initial_trend,
            level,
            trend,
            sse: best.sse,
        })
    }

    /// Forecasts for steps `1..=steps` past the last observation.
    pub fn predict(&self, steps: usize) -> Vec<f64> {
        (1..=steps).map(|h| self.level + h as f64 * self.trend).collect()
    }

    pub fn summary(&self) -> SmoothingFit {
        SmoothingFit {
            alpha: self.alpha,
            beta: self.beta,
            initial_level: self.initial_level,
            initial_trend: self.initial_trend,
            sse: self.sse,
        }
    }
}

/// Runs the recursions, returning the one-step forecasts and the final level/trend.
fn smooth(data: &[f64], alpha: f64, beta: f64, level0: f64, trend0: f64) -> (Vec<f64>, f64, f64) {
    let mut level = level0;
    let mut trend = trend0;
    let mut forecasts = Vec::with_capacity(data.len());

    for &y in data {
        forecasts.push(level + trend);
        let prev_level = level;
        level = alpha * y + (1.0 - alpha) * (level + trend);
        trend = beta * (level - prev_level) + (1.0 - beta) * trend;
    }

    (forecasts, level, trend)
}

fn sum_squared_errors(data: &[f64], forecasts: &[f64]) -> f64 {
    data.iter()
        .zip(forecasts)
        .map(|(y, f)| (y - f).powi(2))
        .sum()
}

/// Least-squares initial level/trend for fixed smoothing parameters.
///
/// The forecasts decompose as `u_t * level0 + v_t * trend0 + w_t`, where
/// `w` is the run from a zero state and `u`, `v` are unit-state runs on a
/// zero series.
fn initial_state(data: &[f64], alpha: f64, beta: f64) -> Option<(f64, f64)> {
    let zeros = vec![0.0; data.len()];
    let (w, _, _) = smooth(data, alpha, beta, 0.0, 0.0);
    let (u, _, _) = smooth(&zeros, alpha, beta, 1.0, 0.0);
    let (v, _, _) = smooth(&zeros, alpha, beta, 0.0, 1.0);

    let mut normal = Matrix2::<f64>::zeros();
    let mut rhs = Vector2::<f64>::zeros();
    for t in 0..data.len() {
        let r = data[t] - w[t];
        normal[(0, 0)] += u[t] * u[t];
        normal[(0, 1)] += u[t] * v[t];
        normal[(1, 1)] += v[t] * v[t];
        rhs[0] += u[t] * r;
        rhs[1] += v[t] * r;
    }
    normal[(1, 0)] = normal[(0, 1)];

    let solution = normal.lu().solve(&rhs)?;
    (solution[0].is_finite() && solution[1].is_finite()).then(|| (solution[0], solution[1]))
}

fn evaluate(data: &[f64], alpha: f64, beta: f64) -> Candidate {
    let (initial_level, initial_trend) =
        initial_state(data, alpha, beta).unwrap_or((data[0], data[1] - data[0]));
    let (forecasts, _, _) = smooth(data, alpha, beta, initial_level, initial_trend);
    let sse = sum_squared_errors(data, &forecasts);

    Candidate {
        alpha,
        beta,
        initial_level,
        initial_trend,
        sse: if sse.is_finite() { sse } else { f64::INFINITY },
    }
}

fn grid_search(data: &[f64]) -> Candidate {
    let mut best: Option<Candidate> = None;
    for i in 0..=GRID_STEPS {
        for j in 0..=GRID_STEPS {
            let alpha = i as f64 / GRID_STEPS as f64;
            let beta = j as f64 / GRID_STEPS as f64;
            let candidate = evaluate(data, alpha, beta);
            if best.map_or(true, |b| candidate.sse < b.sse) {
                best = Some(candidate);
            }
        }
    }
    // The grid is never empty
    best.unwrap_or_else(|| evaluate(data, 0.5, 0.5))
}

/// Compass search around the best grid point, halving the step on failure.
fn refine(data: &[f64], start: Candidate) -> Candidate {
    let mut best = start;
    let mut step = 0.5 / GRID_STEPS as f64;

    while step > REFINE_TOLERANCE {
        let mut improved = false;
        for (da, db) in [(step, 0.0), (-step, 0.0), (0.0, step), (0.0, -step)] {
            let alpha = (best.alpha + da).clamp(0.0, 1.0);
            let beta = (best.beta + db).clamp(0.0, 1.0);
            if alpha == best.alpha && beta == best.beta {
                continue;
            }
            let candidate = evaluate(data, alpha, beta);
            if candidate.sse < best.sse {
                best = candidate;
                improved = true;
            }
        }
        if !improved {
            step /= 2.0;
        }
    }
    best
}

/// Produces the fixed-horizon business-day forecast for one series.
#[derive(Debug, Clone, Default)]
pub struct ForecastEngine;

impl ForecastEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn horizon(&self) -> usize {
        FORECAST_HORIZON
    }

    pub fn forecast(&self, series: &TimeSeries) -> Result<ForecastResult, ForecastError> {
        let closes = series.closes();
        let last_date = series.last_date().ok_or(ForecastError::InsufficientData {
            required: MIN_OBSERVATIONS,
            actual: 0,
        })?;

        let model = HoltModel::fit(&closes)?;
        let values = model.predict(FORECAST_HORIZON);
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::NonFinite);
        }

        let points = next_business_days(last_date, FORECAST_HORIZON)
            .into_iter()
            .zip(values)
            .map(|(date, value)| ForecastPoint { date, value })
            .collect();

        Ok(ForecastResult {
            symbol: series.symbol().to_string(),
            points,
            fit: model.summary(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::Bar;
    use approx::assert_relative_eq;
    use chrono::{Datelike, Duration, NaiveDate, Weekday};

    fn series(closes: &[f64]) -> TimeSeries {
        // Consecutive weekdays starting Monday 2025-01-06
        let dates = next_business_days(NaiveDate::from_ymd_opt(2025, 1, 5).unwrap(), closes.len());
        let bars = dates
            .into_iter()
            .zip(closes)
            .map(|(date, &close)| Bar {
                date,
                open: close,
                high: close,
                low: close,
                close,
                volume: 1.0,
            })
            .collect();
        TimeSeries::new("PYFA.JK", bars).unwrap()
    }

    fn noisy(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 1000.0 + 3.0 * i as f64 + 25.0 * ((i as f64) * 1.7).sin())
            .collect()
    }

    #[test]
    fn test_too_few_points() {
        assert_eq!(
            HoltModel::fit(&[1.0, 2.0]),
            Err(ForecastError::InsufficientData { required: 3, actual: 2 })
        );
        assert!(HoltModel::fit(&[]).is_err());
    }

    #[test]
    fn test_non_finite_input() {
        assert_eq!(HoltModel::fit(&[1.0, f64::NAN, 3.0]), Err(ForecastError::NonFinite));
    }

    #[test]
    fn test_linear_series_extrapolates_exactly() {
        let data: Vec<f64> = (0..40).map(|i| 100.0 + 2.0 * i as f64).collect();
        let model = HoltModel::fit(&data).unwrap();

        assert!(model.sse < 1e-9);
        let forecast = model.predict(3);
        assert_relative_eq!(forecast[0], 180.0, epsilon = 1e-6);
        assert_relative_eq!(forecast[1], 182.0, epsilon = 1e-6);
        assert_relative_eq!(forecast[2], 184.0, epsilon = 1e-6);
    }

    #[test]
    fn test_constant_series_forecasts_constant() {
        let model = HoltModel::fit(&[50.0; 25]).unwrap();
        for value in model.predict(FORECAST_HORIZON) {
            assert_relative_eq!(value, 50.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_parameters_stay_in_unit_interval() {
        let model = HoltModel::fit(&noisy(60)).unwrap();
        assert!((0.0..=1.0).contains(&model.alpha));
        assert!((0.0..=1.0).contains(&model.beta));
        assert!(model.sse.is_finite());
    }

    #[test]
    fn test_fit_beats_every_grid_point_with_naive_init() {
        let data = noisy(45);
        let model = HoltModel::fit(&data).unwrap();

        for (alpha, beta) in [(0.2, 0.1), (0.5, 0.5), (0.9, 0.05), (1.0, 0.0)] {
            let (forecasts, _, _) = smooth(&data, alpha, beta, data[0], data[1] - data[0]);
            assert!(model.sse <= sum_squared_errors(&data, &forecasts) + 1e-9);
        }
    }

    #[test]
    fn test_initial_state_is_least_squares_optimal() {
        let data = noisy(30);
        let (l0, b0) = initial_state(&data, 0.3, 0.2).unwrap();
        let base = {
            let (f, _, _) = smooth(&data, 0.3, 0.2, l0, b0);
            sum_squared_errors(&data, &f)
        };
        for (dl, db) in [(0.5, 0.0), (-0.5, 0.0), (0.0, 0.1), (0.0, -0.1)] {
            let (f, _, _) = smooth(&data, 0.3, 0.2, l0 + dl, b0 + db);
            assert!(sum_squared_errors(&data, &f) > base);
        }
    }

    #[test]
    fn test_fit_is_deterministic() {
        let data = noisy(50);
        assert_eq!(HoltModel::fit(&data).unwrap(), HoltModel::fit(&data).unwrap());
    }

    #[test]
    fn test_engine_produces_seven_business_days() {
        let result = ForecastEngine::new().forecast(&series(&noisy(40))).unwrap();

        assert_eq!(result.points.len(), FORECAST_HORIZON);
        assert_eq!(result.symbol, "PYFA.JK");

        let last = series(&noisy(40)).last_date().unwrap();
        assert!(result.points[0].date > last);
        assert!(result.points.windows(2).all(|w| w[0].date < w[1].date));
        assert!(result
            .points
            .iter()
            .all(|p| !matches!(p.date.weekday(), Weekday::Sat | Weekday::Sun)));
        assert!(result.points.iter().all(|p| p.value.is_finite()));
    }

    #[test]
    fn test_engine_dates_follow_last_bar() {
        // 11 weekdays from Monday 2025-01-06 end on Monday 2025-01-20
        let result = ForecastEngine::new().forecast(&series(&noisy(11))).unwrap();
        let last = NaiveDate::from_ymd_opt(2025, 1, 20).unwrap();
        assert_eq!(result.points[0].date, last + Duration::days(1));
        assert_eq!(result.points[6].date, last + Duration::days(9));
    }

    #[test]
    fn test_engine_rejects_short_series() {
        let err = ForecastEngine::new().forecast(&series(&[10.0, 11.0])).unwrap_err();
        assert_eq!(err, ForecastError::InsufficientData { required: 3, actual: 2 });
    }
}
