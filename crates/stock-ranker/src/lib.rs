//! Stock ranking
//!
//! Combines per-symbol metric records into a single heuristic score and
//! orders symbols by it.

pub mod ranker;

pub use ranker::*;
