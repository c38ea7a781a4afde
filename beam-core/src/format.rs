//! Human-readable sizes and rates for progress output.

const SIZE_UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];
const SPEED_UNITS: [&str; 4] = ["B/s", "KB/s", "MB/s", "GB/s"];

pub fn format_size(bytes: u64) -> String {
    scaled(bytes as f64, &SIZE_UNITS)
}

pub fn format_speed(bytes_per_second: f64) -> String {
    scaled(bytes_per_second, &SPEED_UNITS)
}

fn scaled(value: f64, units: &[&str]) -> String {
    if value <= 0.0 || !value.is_finite() {
        return format!("0 {}", units[0]);
    }

    let mut scaled = value;
    let mut unit = 0;
    while scaled >= 1024.0 && unit + 1 < units.len() {
        scaled /= 1024.0;
        unit += 1;
    }

    let rounded = (scaled * 100.0).round() / 100.0;
    format!("{} {}", rounded, units[unit])
}
