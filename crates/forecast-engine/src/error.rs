use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    #[error("Insufficient data to fit forecast model: need {required} points, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("Forecast model produced non-finite values")]
    NonFinite,
}
