//! Human-readable sizes, rates and durations.

use std::time::Duration;

const MB: u64 = 1024 * 1024;
const GB: u64 = MB * 1024;

/// Convert a byte count to the label stored on records ("16.00 MB").
///
/// Below one megabyte the exact byte count is shown.
pub fn format_size(size_bytes: u64) -> String {
    if size_bytes >= GB {
        format!("{:.2} GB", size_bytes as f64 / GB as f64)
    } else if size_bytes >= MB {
        format!("{:.2} MB", size_bytes as f64 / MB as f64)
    } else {
        format!("{} bytes", size_bytes)
    }
}

/// Transfer rate label, e.g. "4.00 MB/s".
pub fn format_rate(bytes_per_sec: f64) -> String {
    if !bytes_per_sec.is_finite() || bytes_per_sec <= 0.0 {
        return "0 bytes/s".into();
    }
    format!("{}/s", format_size(bytes_per_sec.round() as u64))
}

/// Elapsed or remaining time: "1h 02m 03s", "2m 05s" or "12s".
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 3600 {
        format!(
            "{}h {:02}m {:02}s",
            secs / 3600,
            (secs % 3600) / 60,
            secs % 60
        )
    } else if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_use_binary_units() {
        assert_eq!(format_size(0), "0 bytes");
        assert_eq!(format_size(1023 * 1024), "1047552 bytes");
        assert_eq!(format_size(16 * MB), "16.00 MB");
        assert_eq!(format_size(3 * GB / 2), "1.50 GB");
    }

    #[test]
    fn rate_handles_degenerate_values() {
        assert_eq!(format_rate(0.0), "0 bytes/s");
        assert_eq!(format_rate(f64::INFINITY), "0 bytes/s");
        assert_eq!(format_rate(4.0 * MB as f64), "4.00 MB/s");
    }

    #[test]
    fn durations_pick_largest_unit() {
        assert_eq!(format_duration(Duration::from_secs(12)), "12s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 05s");
        assert_eq!(format_duration(Duration::from_secs(3723)), "1h 02m 03s");
    }
}
