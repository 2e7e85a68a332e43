//! Human-readable sizes for stream lengths and transfer amounts

const BINARY_UNITS: &[(u64, &str)] = &[
    (1 << 60, "EiB"),
    (1 << 50, "PiB"),
    (1 << 40, "TiB"),
    (1 << 30, "GiB"),
    (1 << 20, "MiB"),
    (1 << 10, "KiB"),
];

const DECIMAL_BIT_UNITS: &[(u64, &str)] = &[
    (1_000_000_000_000_000_000, "Ebit"),
    (1_000_000_000_000_000, "Pbit"),
    (1_000_000_000_000, "Tbit"),
    (1_000_000_000, "Gbit"),
    (1_000_000, "Mbit"),
    (1_000, "Kbit"),
];

/// Truncate `value` to at most `decimals` fractional digits
pub fn round_to_decimals(value: f64, decimals: u32) -> f64 {
    // Beyond f64 precision there is nothing left to cut
    if decimals >= 15 {
        return value;
    }
    let scale = 10f64.powi(decimals as i32);
    (value * scale).trunc() / scale
}

fn format_scaled(amount: u64, units: &[(u64, &str)], base_unit: &str, decimals: u32) -> String {
    for &(factor, name) in units {
        if amount >= factor {
            let scaled = round_to_decimals(amount as f64 / factor as f64, decimals);
            return format!("{:.*} {}", decimals as usize, scaled, name);
        }
    }
    format!("{} {}", amount, base_unit)
}

/// Format a byte count with binary prefixes (KiB, MiB, ...)
///
/// ```rust
/// use spanio_core::bytes_to_binary_unit;
///
/// assert_eq!(bytes_to_binary_unit(1536, 1), "1.5 KiB");
/// assert_eq!(bytes_to_binary_unit(512, 0), "512 B");
/// ```
pub fn bytes_to_binary_unit(size: u64, decimals: u32) -> String {
    format_scaled(size, BINARY_UNITS, "B", decimals)
}

/// Format a byte count as bits with decimal prefixes (Kbit, Mbit, ...)
pub fn bytes_to_decimal_bit_unit(bytes: u64, decimals: u32) -> String {
    format_scaled(bytes.saturating_mul(8), DECIMAL_BIT_UNITS, "bit", decimals)
}
