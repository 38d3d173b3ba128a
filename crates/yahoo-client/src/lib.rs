//! Daily price history from the Yahoo Finance chart API.

mod chart;

pub use chart::parse_chart;

use analysis_core::{DataSource, FetchError, Lookback, TimeSeries};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode, Url};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Sliding-window rate limiter: at most `max_requests` per `window` duration.
#[derive(Clone)]
struct RateLimiter {
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
            max_requests: max_requests.max(1),
            window,
        }
    }

    async fn acquire(&self) {
        loop {
            let mut ts = self.timestamps.lock().await;
            let now = Instant::now();

            // Remove timestamps outside the window
            while let Some(&front) = ts.front() {
                if now.duration_since(front) >= self.window {
                    ts.pop_front();
                } else {
                    break;
                }
            }

            let oldest = match ts.front() {
                Some(&oldest) if ts.len() >= self.max_requests => oldest,
                _ => {
                    ts.push_back(now);
                    return;
                }
            };

            // Wait until the oldest request falls out of the window
            let sleep_dur = (oldest + self.window).duration_since(now) + Duration::from_millis(50);
            drop(ts);
            tracing::debug!("Rate limiter: waiting {:.1}s for Yahoo slot", sleep_dur.as_secs_f64());
            tokio::time::sleep(sleep_dur).await;
        }
    }
}

#[derive(Debug, Clone)]
pub struct YahooClientConfig {
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Extra attempts after a transient failure
    pub max_retries: u32,
    /// Delay before retry `n` is `retry_backoff * n`
    pub retry_backoff: Duration,
    pub rate_limit_per_minute: usize,
    /// Scale prices by the split/dividend adjusted close
    pub adjusted: bool,
}

impl Default for YahooClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_backoff: Duration::from_millis(500),
            rate_limit_per_minute: 120,
            adjusted: true,
        }
    }
}

impl YahooClientConfig {
    /// Defaults overridden by `YAHOO_BASE_URL`, `YAHOO_TIMEOUT_SECS`,
    /// `YAHOO_MAX_RETRIES` and `YAHOO_RATE_LIMIT`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("YAHOO_BASE_URL") {
            config.base_url = url;
        }
        if let Some(secs) = env_parse::<u64>("YAHOO_TIMEOUT_SECS") {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = env_parse::<u32>("YAHOO_MAX_RETRIES") {
            config.max_retries = retries;
        }
        if let Some(limit) = env_parse::<usize>("YAHOO_RATE_LIMIT") {
            config.rate_limit_per_minute = limit;
        }
        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring unparseable {}={:?}", key, raw);
            None
        }
    }
}

#[derive(Clone)]
pub struct YahooClient {
    client: Client,
    config: YahooClientConfig,
    rate_limiter: RateLimiter,
}

impl YahooClient {
    pub fn new(config: YahooClientConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            rate_limiter: RateLimiter::new(config.rate_limit_per_minute, Duration::from_secs(60)),
            config,
        }
    }

    pub fn from_env() -> Self {
        Self::new(YahooClientConfig::from_env())
    }

    pub fn config(&self) -> &YahooClientConfig {
        &self.config
    }

    fn chart_url(&self, symbol: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Url, FetchError> {
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|e| FetchError::network(symbol, format!("bad base url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| FetchError::network(symbol, "base url cannot take a path"))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", symbol]);
        url.query_pairs_mut()
            .append_pair("period1", &from.timestamp().to_string())
            .append_pair("period2", &to.timestamp().to_string())
            .append_pair("interval", "1d")
            .append_pair("includeAdjustedClose", "true");
        Ok(url)
    }

    /// GET with rate limiting and bounded retries on transport errors, 429 and 5xx.
    async fn send_request(&self, symbol: &str, url: Url) -> Result<(StatusCode, String), FetchError> {
        let attempts = self.config.max_retries + 1;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            self.rate_limiter.acquire().await;

            match self.client.get(url.clone()).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status != StatusCode::TOO_MANY_REQUESTS && !status.is_server_error() {
                        let body = response
                            .text()
                            .await
                            .map_err(|e| FetchError::network(symbol, e.to_string()))?;
                        return Ok((status, body));
                    }
                    last_error = format!("HTTP {}", status);
                }
                Err(e) => {
                    last_error = if e.is_timeout() {
                        format!("timed out after {:?}", self.config.timeout)
                    } else {
                        e.to_string()
                    };
                }
            }

            if attempt < attempts {
                let wait = self.config.retry_backoff * attempt;
                tracing::warn!(
                    "Yahoo request for {} failed ({}), retry {}/{} in {:?}",
                    symbol,
                    last_error,
                    attempt,
                    self.config.max_retries,
                    wait
                );
                tokio::time::sleep(wait).await;
            }
        }

        Err(FetchError::network(
            symbol,
            format!("{} after {} attempts", last_error, attempts),
        ))
    }

    /// Get daily bars for a symbol between two instants
    pub async fn get_daily_bars(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<TimeSeries, FetchError> {
        let url = self.chart_url(symbol, from, to)?;
        let (status, body) = self.send_request(symbol, url).await?;

        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(symbol.to_string()));
        }
        if !status.is_success() {
            return Err(FetchError::network(
                symbol,
                format!("HTTP {}: {}", status, body.chars().take(200).collect::<String>()),
            ));
        }

        let series = parse_chart(symbol, &body, self.config.adjusted)?;
        tracing::debug!("Fetched {} bars for {}", series.len(), symbol);
        Ok(series)
    }
}

#[async_trait]
impl DataSource for YahooClient {
    async fn fetch(&self, symbol: &str, lookback: Lookback) -> Result<TimeSeries, FetchError> {
        let to = Utc::now();
        self.get_daily_bars(symbol, lookback.start_from(to), to).await
    }
}
