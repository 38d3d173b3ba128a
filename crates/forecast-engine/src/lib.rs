pub mod calendar;
pub mod error;
pub mod holt;

pub use calendar::*;
pub use error::*;
pub use holt::*;
