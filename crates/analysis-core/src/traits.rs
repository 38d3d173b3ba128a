use async_trait::async_trait;

use crate::{FetchError, Lookback, TimeSeries};

/// Source of daily price/volume history.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn fetch(&self, symbol: &str, lookback: Lookback) -> Result<TimeSeries, FetchError>;
}
