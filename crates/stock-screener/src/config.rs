use analysis_core::Lookback;
use analysis_orchestrator::{ForecastTargets, PipelineConfig, StockUniverse, DEFAULT_CONCURRENCY};
use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;
use stock_ranker::DEFAULT_TOP_N;

pub const USAGE: &str = "\
Usage: stock-screener [OPTIONS]

Options:
  --symbols SYM[=Name] ...   Symbols to screen (default: IDX most active)
  --lookback PERIOD          History window, e.g. 2mo, 60d, 1y (default: 2mo)
  --top N                    Ranking length (default: 5)
  --concurrency N            Parallel fetches (default: 4)
  --forecast SYM ...         Symbols to forecast (default: ranked symbols)
  --no-forecast              Skip forecasting
  --output-dir DIR           Where charts are written (default: .)
  --no-charts                Skip SVG charts
  --json PATH                Write the full report as JSON
  -h, --help                 Show this message";

#[derive(Debug, Clone)]
pub struct ScreenerConfig {
    pub universe: StockUniverse,
    pub lookback: Lookback,
    pub top_n: usize,
    pub concurrency: usize,
    pub forecast: ForecastTargets,
    pub output_dir: PathBuf,
    pub charts: bool,
    pub json_path: Option<PathBuf>,
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            universe: StockUniverse::IdxMostActive,
            lookback: Lookback::default(),
            top_n: DEFAULT_TOP_N,
            concurrency: DEFAULT_CONCURRENCY,
            forecast: ForecastTargets::Ranked,
            output_dir: PathBuf::from("."),
            charts: true,
            json_path: None,
        }
    }
}

impl ScreenerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup("SCREENER_SYMBOLS") {
            config.universe =
                StockUniverse::parse(&raw).context("invalid SCREENER_SYMBOLS")?;
        }
        if let Some(raw) = lookup("SCREENER_LOOKBACK") {
            config.lookback = raw.parse().context("invalid SCREENER_LOOKBACK")?;
        }
        if let Some(raw) = lookup("SCREENER_TOP_N") {
            config.top_n = raw.trim().parse().context("invalid SCREENER_TOP_N")?;
        }
        if let Some(raw) = lookup("SCREENER_CONCURRENCY") {
            config.concurrency = raw.trim().parse().context("invalid SCREENER_CONCURRENCY")?;
        }
        if let Some(raw) = lookup("SCREENER_FORECAST") {
            config.forecast = parse_forecast_list(&raw);
        }
        if let Some(raw) = lookup("SCREENER_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("SCREENER_CHARTS") {
            config.charts = raw.trim().parse().context("invalid SCREENER_CHARTS")?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Apply command line flags on top of the env configuration.
    pub fn apply_args(mut self, args: &[String]) -> Result<Self> {
        let mut i = 0;
        while i < args.len() {
            let flag = args[i].as_str();
            match flag {
                "--symbols" => {
                    let values = values_after(args, i);
                    if values.is_empty() {
                        bail!("--symbols needs at least one symbol");
                    }
                    self.universe = StockUniverse::parse(&values.join(","))
                        .context("invalid --symbols")?;
                    i += values.len();
                }
                "--forecast" => {
                    let values = values_after(args, i);
                    if values.is_empty() {
                        bail!("--forecast needs at least one symbol");
                    }
                    self.forecast = parse_forecast_list(&values.join(","));
                    i += values.len();
                }
                "--lookback" => {
                    self.lookback = value_after(args, i, flag)?
                        .parse()
                        .context("invalid --lookback")?;
                    i += 1;
                }
                "--top" => {
                    self.top_n = value_after(args, i, flag)?
                        .parse()
                        .context("invalid --top")?;
                    i += 1;
                }
                "--concurrency" => {
                    self.concurrency = value_after(args, i, flag)?
                        .parse()
                        .context("invalid --concurrency")?;
                    i += 1;
                }
                "--output-dir" => {
                    self.output_dir = PathBuf::from(value_after(args, i, flag)?);
                    i += 1;
                }
                "--json" => {
                    self.json_path = Some(PathBuf::from(value_after(args, i, flag)?));
                    i += 1;
                }
                "--no-charts" => self.charts = false,
                "--no-forecast" => self.forecast = ForecastTargets::None,
                other => bail!("unknown argument '{}'\n\n{}", other, USAGE),
            }
            i += 1;
        }

        self.validate()?;
        Ok(self)
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            lookback: self.lookback,
            top_n: self.top_n,
            concurrency: self.concurrency,
            forecast: self.forecast.clone(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.top_n == 0 {
            bail!("top N must be at least 1");
        }
        if self.concurrency == 0 {
            bail!("concurrency must be at least 1");
        }
        Ok(())
    }
}

/// Comma separated symbols; `none` or an empty list disables forecasting.
fn parse_forecast_list(raw: &str) -> ForecastTargets {
    let symbols: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_uppercase)
        .collect();

    match symbols.as_slice() {
        [] => ForecastTargets::None,
        [only] if only == "NONE" => ForecastTargets::None,
        [only] if only == "RANKED" => ForecastTargets::Ranked,
        _ => ForecastTargets::Symbols(symbols),
    }
}

fn values_after(args: &[String], i: usize) -> Vec<String> {
    args[i + 1..]
        .iter()
        .take_while(|a| !a.starts_with("--"))
        .cloned()
        .collect()
}

fn value_after<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str> {
    args.get(i + 1)
        .map(String::as_str)
        .filter(|v| !v.starts_with("--"))
        .with_context(|| format!("{} needs a value", flag))
}
