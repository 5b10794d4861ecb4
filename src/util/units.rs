//! Units formatting and conversion utilities
//!
//! Provides human-readable formatting of iteration times and install rates.

use std::time::Duration;

/// Parse duration string into Duration
///
/// Accepts anything `humantime` does: "30s", "1m 30s", "250us", "1.5ms".
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use bundlebench::util::units::parse_duration;
///
/// assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
/// assert_eq!(parse_duration("250us").unwrap(), Duration::from_micros(250));
/// ```
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    humantime::parse_duration(input.trim()).map_err(|e| format!("Invalid duration '{}': {}", input, e))
}

/// Events per second over `duration`
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use bundlebench::util::units::calculate_rate;
///
/// let rate = calculate_rate(5000, Duration::from_millis(500));
/// assert!((rate - 10_000.0).abs() < 0.01);
/// ```
pub fn calculate_rate(count: u64, duration: Duration) -> f64 {
    if duration.is_zero() {
        return 0.0;
    }

    count as f64 / duration.as_secs_f64()
}

/// Format an install rate with appropriate units
///
/// # Examples
/// ```
/// use bundlebench::util::units::format_rate;
///
/// assert_eq!(format_rate(1500.0), "1.5K installs/s");
/// assert_eq!(format_rate(2500000.0), "2.5M installs/s");
/// ```
pub fn format_rate(rate: f64) -> String {
    if rate >= 1_000_000.0 {
        format!("{:.1}M installs/s", rate / 1_000_000.0)
    } else if rate >= 1_000.0 {
        format!("{:.1}K installs/s", rate / 1_000.0)
    } else {
        format!("{:.0} installs/s", rate)
    }
}

/// Format an iteration time with appropriate precision
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use bundlebench::util::units::format_latency;
///
/// assert_eq!(format_latency(Duration::from_millis(5)), "5.00ms");
/// assert_eq!(format_latency(Duration::from_micros(500)), "500μs");
/// ```
pub fn format_latency(duration: Duration) -> String {
    let micros = duration.as_micros();

    if micros >= 1_000_000 {
        format!("{:.3}s", duration.as_secs_f64())
    } else if micros >= 1000 {
        let millis = micros as f64 / 1000.0;
        format!("{:.2}ms", millis)
    } else {
        format!("{}μs", micros)
    }
}
