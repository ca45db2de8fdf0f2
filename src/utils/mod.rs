use std::time::Instant;
use tracing::{debug, info};

/// Logs how long a batch took when it goes out of scope.
#[must_use = "the timer reports when dropped"]
pub struct Timer {
    label: &'static str,
    start: Instant,
}

impl Timer {
    pub fn start(label: &'static str) -> Self {
        debug!("{}: started", label);
        Self {
            label,
            start: Instant::now(),
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        info!("{}: done in {:.2?}", self.label, self.start.elapsed());
    }
}

/// "12345" → "12.1 KiB", for cache listings.
pub fn fmt_size(bytes: usize) -> String {
    const UNITS: [&str; 3] = ["B", "KiB", "MiB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}
