//! Utility functions

const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

/// Format a byte count for display (binary units, one decimal place)
///
/// # Examples
///
/// ```
/// use mediasheet::utils::format_size;
///
/// assert_eq!(format_size(512), "512 B");
/// assert_eq!(format_size(1536), "1.5 KB");
/// assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
/// ```
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}
