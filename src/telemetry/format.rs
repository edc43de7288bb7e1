//! Formatting helpers for progress and summary output.

/// Format byte counts as human-readable strings.
///
/// Picks the largest SI unit with a nonzero whole part, showing one decimal
/// place below ten units and none above, so summary columns stay narrow.
pub fn format_storage(bytes: u64) -> String {
    const UNITS: [(u64, &str); 4] = [
        (1_000_000_000_000, "TB"),
        (1_000_000_000, "GB"),
        (1_000_000, "MB"),
        (1_000, "KB"),
    ];
    for (scale, unit) in UNITS {
        if bytes >= scale {
            let value = bytes as f64 / scale as f64;
            return if value < 10.0 {
                format!("{:.1} {}", value, unit)
            } else {
                format!("{:.0} {}", value, unit)
            };
        }
    }
    format!("{} B", bytes)
}

/// Format a count with thousands separators, e.g. `1,234,567`.
pub fn format_integer(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_storage_below_one_unit() {
        assert_eq!(format_storage(0), "0 B");
        assert_eq!(format_storage(999), "999 B");
    }

    #[test]
    fn test_format_storage_precision_by_magnitude() {
        // One decimal below ten units, none above.
        assert_eq!(format_storage(1_000), "1.0 KB");
        assert_eq!(format_storage(6_400), "6.4 KB");
        assert_eq!(format_storage(64_000), "64 KB");
        assert_eq!(format_storage(3_200_000), "3.2 MB");
        assert_eq!(format_storage(450_000_000), "450 MB");
        assert_eq!(format_storage(7_000_000_000), "7.0 GB");
        assert_eq!(format_storage(1_200_000_000_000), "1.2 TB");
    }

    #[test]
    fn test_format_integer() {
        assert_eq!(format_integer(0), "0");
        assert_eq!(format_integer(999), "999");
        assert_eq!(format_integer(1_000), "1,000");
        assert_eq!(format_integer(1_234_567), "1,234,567");
    }
}
