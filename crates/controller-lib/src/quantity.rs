//! Kubernetes resource quantity parsing
//!
//! Converts the quantity strings reported by the metrics API into CPU cores
//! and memory megabytes (MiB).

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Split a quantity into its numeric part and suffix
fn split_quantity(quantity: &str) -> Option<(f64, &str)> {
    let quantity = quantity.trim();
    let split_at = quantity
        .find(|c: char| c.is_ascii_alphabetic() && c != 'e' && c != 'E')
        .unwrap_or(quantity.len());
    let (number, suffix) = quantity.split_at(split_at);
    let value = number.parse::<f64>().ok()?;
    Some((value, suffix))
}

fn suffix_multiplier(suffix: &str) -> Option<f64> {
    let multiplier = match suffix {
        "" => 1.0,
        "n" => 1e-9,
        "u" => 1e-6,
        "m" => 1e-3,
        "k" => 1e3,
        "M" => 1e6,
        "G" => 1e9,
        "T" => 1e12,
        "P" => 1e15,
        "Ki" => 1024.0,
        "Mi" => 1024.0 * 1024.0,
        "Gi" => 1024.0 * 1024.0 * 1024.0,
        "Ti" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        "Pi" => 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => return None,
    };
    Some(multiplier)
}

/// Parse a quantity into its base unit value (cores for CPU, bytes for memory)
pub fn parse_quantity(quantity: &str) -> Option<f64> {
    let (value, suffix) = split_quantity(quantity)?;
    Some(value * suffix_multiplier(suffix)?)
}

/// Parse a CPU quantity (`250m`, `1`, `123456789n`) into cores
pub fn parse_cpu_cores(quantity: &str) -> Option<f64> {
    parse_quantity(quantity)
}

/// Parse a memory quantity (`128Mi`, `1Gi`, `2048Ki`, `1G`) into MiB
pub fn parse_memory_mb(quantity: &str) -> Option<f64> {
    parse_quantity(quantity).map(|bytes| bytes / BYTES_PER_MB)
}
