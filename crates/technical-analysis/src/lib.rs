pub mod indicators;
pub mod metrics;


pub use indicators::*;
pub use metrics::*;
