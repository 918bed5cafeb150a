/// Render a human-friendly transfer speed string.
#[must_use]
pub fn format_speed(bytes_per_sec: f32) -> String {
    const KIB: f32 = 1024.0;
    const MIB: f32 = KIB * 1024.0;

    if bytes_per_sec < KIB {
        format!("{bytes_per_sec:.0} B/s")
    } else if bytes_per_sec < MIB {
        format!("{:.1} KB/s", bytes_per_sec / KIB)
    } else {
        format!("{:.1} MB/s", bytes_per_sec / MIB)
    }
}

/// Fraction of a transfer that has completed, or `None` when the total is unknown.
#[must_use]
pub fn progress_fraction(downloaded: u64, total: Option<u64>) -> Option<f32> {
    match total {
        Some(total) if total > 0 => Some((downloaded as f32 / total as f32).clamp(0.0, 1.0)),
        _ => None,
    }
}
