//! Plain-text range report

use crate::LatencyRange;
use std::io::{self, Write};

pub const RANGE_REPORT_HEADER: &str = "[start value]    - [end value]       ->  [latency]";

/// Header followed by one line per range
pub fn write_range_report<W: Write>(out: &mut W, ranges: &[LatencyRange]) -> io::Result<()> {
    writeln!(out, "{}", RANGE_REPORT_HEADER)?;
    for range in ranges {
        writeln!(out, "{}", range)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_lines() {
        let ranges = [
            LatencyRange { start: 0, end: 1, latency: 10 },
            LatencyRange { start: 2, end: u64::MAX, latency: 20 },
        ];

        let mut out = Vec::new();
        write_range_report(&mut out, &ranges).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], RANGE_REPORT_HEADER);
        assert_eq!(lines[1], "0000000000000000 - 0000000000000001  ->    10 cycle(s)");
        assert_eq!(lines[2], "0000000000000002 - ffffffffffffffff  ->    20 cycle(s)");
    }

    #[test]
    fn test_ranges_serialize_to_json() {
        let ranges = vec![LatencyRange { start: 0, end: u64::MAX, latency: 7 }];
        let json = serde_json::to_string(&ranges).unwrap();
        let back: Vec<LatencyRange> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ranges);
    }
}
