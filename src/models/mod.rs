//! Data models module
//!
//! Contains case reports and sample statistics.

pub mod result;

// Re-export commonly used types
pub use result::{CaseReport, SampleStats};
