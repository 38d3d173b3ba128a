//! Screening pipeline: fetch a universe, compute metrics, rank, forecast.

pub mod screener;
pub mod universe;

pub use screener::*;
pub use universe::*;
