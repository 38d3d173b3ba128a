use statrs::statistics::Statistics;

/// Trading days used to annualize daily statistics
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Simple Moving Average
pub fn sma(data: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || data.len() < period {
        return vec![];
    }

    let mut result = Vec::with_capacity(data.len() - period + 1);
    for i in period - 1..data.len() {
        let sum: f64 = data[i + 1 - period..=i].iter().sum();
        result.push(sum / period as f64);
    }
    result
}

/// Arithmetic mean, `None` for an empty slice
pub fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        None
    } else {
        Some(data.iter().sum::<f64>() / data.len() as f64)
    }
}

/// `(new - old) / old * 100`, `None` when `old` is zero or the result is not finite
pub fn pct_change(old: f64, new: f64) -> Option<f64> {
    if old == 0.0 {
        return None;
    }
    let pct = (new - old) / old * 100.0;
    pct.is_finite().then_some(pct)
}

/// Day-over-day fractional returns
pub fn daily_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect()
}

/// Sample stdev of daily returns scaled by sqrt(252), in percent.
/// `None` when fewer than two returns exist.
pub fn annualized_volatility(prices: &[f64]) -> Option<f64> {
    let returns = daily_returns(prices);
    if returns.len() < 2 {
        return None;
    }

    let vol = returns.std_dev() * TRADING_DAYS_PER_YEAR.sqrt() * 100.0;
    vol.is_finite().then_some(vol)
}

/// Relative Strength Index over simple rolling means of gains and losses.
///
/// The change into the first price counts as zero, so `period` prices
/// already fill one window and entry `i` ends at `data[i + period - 1]`.
/// An entry is `None` when both averages are zero (flat window). A window
/// with gains and no losses evaluates to 100.
pub fn rsi(data: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 || data.len() < period {
        return vec![];
    }

    let mut gains = Vec::with_capacity(data.len());
    let mut losses = Vec::with_capacity(data.len());
    gains.push(0.0);
    losses.push(0.0);

    for i in 1..data.len() {
        let change = data[i] - data[i - 1];
        if change > 0.0 {
            gains.push(change);
            losses.push(0.0);
        } else {
            gains.push(0.0);
            losses.push(-change);
        }
    }

    gains
        .windows(period)
        .zip(losses.windows(period))
        .map(|(g, l)| {
            let avg_gain = g.iter().sum::<f64>() / period as f64;
            let avg_loss = l.iter().sum::<f64>() / period as f64;

            if avg_loss == 0.0 {
                return (avg_gain > 0.0).then_some(100.0);
            }

            let rs = avg_gain / avg_loss;
            Some(100.0 - (100.0 / (1.0 + rs)))
        })
        .collect()
}
