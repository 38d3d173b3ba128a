//! stock-screener: rank a universe of stocks by short-term attractiveness
//! and project closing prices a week ahead.
//!
//! Usage:
//!   cargo run -p stock-screener
//!   cargo run -p stock-screener -- --symbols AAPL MSFT NVDA --top 3
//!   cargo run -p stock-screener -- --lookback 3mo --forecast BBCA.JK --json report.json

use analysis_core::AnalysisError;
use analysis_orchestrator::ScreenerPipeline;
use anyhow::{Context, Result};
use std::sync::Arc;
use yahoo_client::YahooClient;

mod charts;
mod config;
mod report;

use config::{ScreenerConfig, USAGE};

const DEFAULT_LOG_FILTER: &str = "stock_screener=info,analysis_orchestrator=info,yahoo_client=warn";

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("{}", USAGE);
        return Ok(());
    }

    let config = ScreenerConfig::from_env()?.apply_args(&args)?;
    tracing::info!(
        "Screening {} symbols, lookback {}, top {}",
        config.universe.len(),
        config.lookback,
        config.top_n
    );

    let client = YahooClient::from_env();
    tracing::debug!("Yahoo endpoint: {}", client.config().base_url);

    let pipeline = ScreenerPipeline::new(Arc::new(client), config.pipeline_config());
    let screen = match pipeline.run(&config.universe).await {
        Ok(screen) => screen,
        Err(e @ AnalysisError::NoMetricsComputed { .. }) => {
            eprintln!("❌ {}. Check your network connection and symbol list.", e);
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    println!("{}", report::render(&screen, &config.universe));

    if config.charts {
        let written = charts::write_charts(&screen, &config.output_dir)?;
        for path in &written {
            println!("📊 Chart written to {}", path.display());
        }
    }

    if let Some(path) = &config.json_path {
        let json = serde_json::to_string_pretty(&screen)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        println!("💾 Report written to {}", path.display());
    }

    Ok(())
}
