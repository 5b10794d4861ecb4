//! Utility functions module
//!
//! Contains helpers for formatting durations and rates.

pub mod units;

// Re-export commonly used functions
pub use units::{calculate_rate, format_latency, format_rate, parse_duration};
