//! Formatting helpers for CLI output and log lines
//!
//! # Example
//!
//! ```rust
//! use posql_client::utils::Helpers;
//! use std::time::Duration;
//!
//! assert_eq!(Helpers::format_duration(Duration::from_millis(1234)), "1.23s");
//! assert_eq!(Helpers::short_hex(&[0xab; 40], 4), "0xabababab…(40 bytes)");
//! ```

use std::time::Duration;

/// Formatting helpers
pub struct Helpers;

impl Helpers {
    /// Format a duration as seconds, milliseconds or microseconds
    ///
    /// # Arguments
    /// * `duration` - Elapsed time
    ///
    /// # Returns
    /// Formatted string (e.g., "1.23s", "500ms", "12µs")
    pub fn format_duration(duration: Duration) -> String {
        if duration.as_secs() >= 1 {
            format!("{:.2}s", duration.as_secs_f64())
        } else if duration.as_millis() >= 1 {
            format!("{}ms", duration.as_millis())
        } else {
            format!("{}µs", duration.as_micros())
        }
    }

    /// `0x`-prefixed hex of at most `max_bytes` bytes
    ///
    /// Longer inputs are cut and suffixed with their full length.
    pub fn short_hex(bytes: &[u8], max_bytes: usize) -> String {
        if bytes.len() <= max_bytes {
            format!("0x{}", hex::encode(bytes))
        } else {
            format!(
                "0x{}…({} bytes)",
                hex::encode(&bytes[..max_bytes]),
                bytes.len()
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(Helpers::format_duration(Duration::from_secs(59)), "59.00s");
        assert_eq!(Helpers::format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(Helpers::format_duration(Duration::from_micros(12)), "12µs");
    }

    #[test]
    fn test_short_hex() {
        assert_eq!(Helpers::short_hex(&[0xab, 0x12], 8), "0xab12");
        assert_eq!(Helpers::short_hex(&[], 8), "0x");
        assert_eq!(Helpers::short_hex(&[1, 2, 3], 2), "0x0102…(3 bytes)");
    }
}
