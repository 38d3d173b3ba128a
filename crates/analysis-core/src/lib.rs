pub mod error;
pub mod lookback;
pub mod traits;
pub mod types;

pub use error::*;
pub use lookback::*;
pub use traits::*;
pub use types::*;
