use crate::StockUniverse;
use analysis_core::{
    AnalysisError, DataSource, FetchError, ForecastResult, Lookback, MetricRecord, TimeSeries,
};
use chrono::{DateTime, Utc};
use forecast_engine::ForecastEngine;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use stock_ranker::{Ranking, StockRanker, DEFAULT_TOP_N};
use technical_analysis::MetricEngine;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Default number of in-flight fetches
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Which symbols get a forecast after ranking
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ForecastTargets {
    /// Every symbol in the ranking
    #[default]
    Ranked,
    Symbols(Vec<String>),
    None,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub lookback: Lookback,
    pub top_n: usize,
    pub concurrency: usize,
    pub forecast: ForecastTargets,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lookback: Lookback::default(),
            top_n: DEFAULT_TOP_N,
            concurrency: DEFAULT_CONCURRENCY,
            forecast: ForecastTargets::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Fetch,
    Metrics,
}

/// A symbol dropped before ranking
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolFailure {
    pub symbol: String,
    pub stage: FailureStage,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ForecastOutcome {
    Ready(ForecastResult),
    Failed { reason: String },
}

impl ForecastOutcome {
    pub fn result(&self) -> Option<&ForecastResult> {
        match self {
            ForecastOutcome::Ready(result) => Some(result),
            ForecastOutcome::Failed { .. } => None,
        }
    }
}

/// Everything one screening run produced
#[derive(Debug, Clone, Serialize)]
pub struct ScreenReport {
    pub generated_at: DateTime<Utc>,
    pub lookback: Lookback,
    /// Symbols in the universe
    pub attempted: usize,
    pub metrics: BTreeMap<String, MetricRecord>,
    pub ranking: Ranking,
    pub forecasts: BTreeMap<String, ForecastOutcome>,
    pub failures: Vec<SymbolFailure>,
    /// Fetched series, kept for chart rendering
    #[serde(skip)]
    pub series: BTreeMap<String, TimeSeries>,
}

impl ScreenReport {
    pub fn failures_at(&self, stage: FailureStage) -> impl Iterator<Item = &SymbolFailure> {
        self.failures.iter().filter(move |f| f.stage == stage)
    }
}

/// Fetch, measure, rank and forecast a universe of symbols.
///
/// Fetches fan out over a bounded set of tasks; per-symbol failures are
/// recorded and skipped. Only an empty metric mapping fails the run.
pub struct ScreenerPipeline {
    source: Arc<dyn DataSource>,
    metric_engine: MetricEngine,
    ranker: StockRanker,
    forecaster: ForecastEngine,
    config: PipelineConfig,
}

impl ScreenerPipeline {
    pub fn new(source: Arc<dyn DataSource>, config: PipelineConfig) -> Self {
        Self {
            source,
            metric_engine: MetricEngine::new(),
            ranker: StockRanker::new(),
            forecaster: ForecastEngine::new(),
            config,
        }
    }

    pub fn with_ranker(mut self, ranker: StockRanker) -> Self {
        self.ranker = ranker;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn run(&self, universe: &StockUniverse) -> Result<ScreenReport, AnalysisError> {
        let symbols = universe.symbols();
        let attempted = symbols.len();

        info!(
            "📊 Screening {} symbols over {} (top {}, concurrency {})",
            attempted, self.config.lookback, self.config.top_n, self.config.concurrency
        );

        let (mut series, mut failures) = self.fetch_all(&symbols).await;
        let (metrics, metric_failures) = self.compute_metrics(&series);
        failures.extend(metric_failures);

        if metrics.is_empty() {
            error!("No metrics computed for any of {} symbols", attempted);
            return Err(AnalysisError::NoMetricsComputed { attempted });
        }

        let ranking = self.ranker.rank(&metrics, self.config.top_n);
        info!(
            "Ranked {} symbols, top {}: {:?}",
            ranking.total_scored,
            ranking.len(),
            ranking.symbols().collect::<Vec<_>>()
        );

        let targets: Vec<String> = match &self.config.forecast {
            ForecastTargets::Ranked => ranking.symbols().map(str::to_string).collect(),
            ForecastTargets::Symbols(list) => list.clone(),
            ForecastTargets::None => Vec::new(),
        };
        let forecasts = self.forecast_all(&targets, &mut series).await;

        Ok(ScreenReport {
            generated_at: Utc::now(),
            lookback: self.config.lookback,
            attempted,
            metrics,
            ranking,
            forecasts,
            failures,
            series,
        })
    }

    /// Fetch every symbol, at most `concurrency` at a time.
    pub async fn fetch_all(
        &self,
        symbols: &[String],
    ) -> (BTreeMap<String, TimeSeries>, Vec<SymbolFailure>) {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let lookback = self.config.lookback;
        let mut tasks = JoinSet::new();
        let mut task_symbols = HashMap::new();

        for symbol in symbols {
            let source = Arc::clone(&self.source);
            let semaphore = Arc::clone(&semaphore);
            let task_symbol = symbol.clone();
            let symbol = symbol.clone();
            let handle = tasks.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => source.fetch(&symbol, lookback).await,
                    Err(e) => Err(FetchError::network(&symbol, e.to_string())),
                };
                (symbol, result)
            });
            task_symbols.insert(handle.id(), task_symbol);
        }

        let mut series = BTreeMap::new();
        let mut failures = Vec::new();

        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((_, (symbol, Ok(ts)))) if ts.is_empty() => {
                    let err = AnalysisError::DataUnavailable {
                        symbol: symbol.clone(),
                        source: FetchError::Empty(symbol.clone()),
                    };
                    warn!("{}", err);
                    failures.push(SymbolFailure {
                        symbol,
                        stage: FailureStage::Fetch,
                        reason: err.to_string(),
                    });
                }
                Ok((_, (symbol, Ok(ts)))) => {
                    debug!("Fetched {} bars for {}", ts.len(), symbol);
                    series.insert(symbol, ts);
                }
                Ok((_, (symbol, Err(source)))) => {
                    let err = AnalysisError::DataUnavailable {
                        symbol: symbol.clone(),
                        source,
                    };
                    warn!("{}", err);
                    failures.push(SymbolFailure {
                        symbol,
                        stage: FailureStage::Fetch,
                        reason: err.to_string(),
                    });
                }
                Err(e) => {
                    let symbol = task_symbols
                        .remove(&e.id())
                        .unwrap_or_else(|| "<unknown>".to_string());
                    error!("Fetch task for {} failed: {}", symbol, e);
                    failures.push(SymbolFailure {
                        symbol,
                        stage: FailureStage::Fetch,
                        reason: format!("fetch task failed: {}", e),
                    });
                }
            }
        }

        failures.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        info!(
            "Fetched {}/{} symbols ({} failed)",
            series.len(),
            symbols.len(),
            failures.len()
        );
        (series, failures)
    }

    pub fn compute_metrics(
        &self,
        series: &BTreeMap<String, TimeSeries>,
    ) -> (BTreeMap<String, MetricRecord>, Vec<SymbolFailure>) {
        let mut metrics = BTreeMap::new();
        let mut failures = Vec::new();

        for (symbol, ts) in series {
            match self.metric_engine.compute(ts) {
                Ok(record) => {
                    metrics.insert(symbol.clone(), record);
                }
                Err(e) => {
                    warn!("Skipping {}: {}", symbol, e);
                    failures.push(SymbolFailure {
                        symbol: symbol.clone(),
                        stage: FailureStage::Metrics,
                        reason: e.to_string(),
                    });
                }
            }
        }
        (metrics, failures)
    }

    /// Forecast each target, reusing fetched series and fetching the rest.
    /// Failures stay local to their entry.
    pub async fn forecast_all(
        &self,
        targets: &[String],
        series: &mut BTreeMap<String, TimeSeries>,
    ) -> BTreeMap<String, ForecastOutcome> {
        let mut forecasts = BTreeMap::new();

        for symbol in targets {
            if forecasts.contains_key(symbol) {
                continue;
            }
            if !series.contains_key(symbol) {
                match self.source.fetch(symbol, self.config.lookback).await {
                    Ok(ts) => {
                        series.insert(symbol.clone(), ts);
                    }
                    Err(e) => {
                        warn!("Forecast fetch failed for {}: {}", symbol, e);
                        forecasts.insert(
                            symbol.clone(),
                            ForecastOutcome::Failed {
                                reason: e.to_string(),
                            },
                        );
                        continue;
                    }
                }
            }

            let outcome = match series.get(symbol).map(|ts| self.forecaster.forecast(ts)) {
                Some(Ok(result)) => {
                    debug!(
                        "Forecast for {}: alpha={:.3} beta={:.3}",
                        symbol, result.fit.alpha, result.fit.beta
                    );
                    ForecastOutcome::Ready(result)
                }
                Some(Err(e)) => {
                    warn!("Forecast failed for {}: {}", symbol, e);
                    ForecastOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
                None => ForecastOutcome::Failed {
                    reason: format!("no series for {}", symbol),
                },
            };
            forecasts.insert(symbol.clone(), outcome);
        }
        forecasts
    }
}
