//! Periodic progress logging for full input scans.

use tracing::info;

const MIB: u64 = 1024 * 1024;

/// Emits an `info!` event every time a scan crosses another interval.
///
/// Purely informational: nothing in the pipeline branches on it.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    label: String,
    total_bytes: u64,
    interval_bytes: u64,
    next_report: u64,
}

impl ProgressReporter {
    /// Creates a reporter for a scan over `total_bytes`, logging every
    /// `interval_mb` MiB. An interval of 0 disables reporting.
    #[must_use]
    pub fn new(label: impl Into<String>, total_bytes: u64, interval_mb: u64) -> Self {
        let interval_bytes = interval_mb.saturating_mul(MIB);
        Self {
            label: label.into(),
            total_bytes,
            interval_bytes,
            next_report: interval_bytes,
        }
    }

    /// A reporter that never logs.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new("", 0, 0)
    }

    /// Renames the scan being reported and restarts the interval count.
    pub fn restart(&mut self, label: impl Into<String>) {
        self.label = label.into();
        self.next_report = self.interval_bytes;
    }

    /// Records that `bytes_read` bytes of the current scan have been consumed.
    ///
    /// Returns `true` if a progress line was emitted.
    pub fn update(&mut self, bytes_read: u64) -> bool {
        if self.interval_bytes == 0 || bytes_read < self.next_report {
            return false;
        }
        while self.next_report <= bytes_read {
            self.next_report = self.next_report.saturating_add(self.interval_bytes);
        }
        let percent = if self.total_bytes == 0 {
            100.0
        } else {
            100.0 * bytes_read as f64 / self.total_bytes as f64
        };
        info!(
            scan = %self.label,
            "{} / {} bytes read, {:.2}% complete",
            bytes_read, self.total_bytes, percent
        );
        true
    }
}
