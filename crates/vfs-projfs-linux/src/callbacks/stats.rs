//! Dispatch statistics.
//!
//! Counters are updated from driver worker threads without locking and
//! read through [`DispatchStats::snapshot`].

use std::sync::atomic::{AtomicU64, Ordering};

/// Live dispatch counters.
#[derive(Debug, Default)]
pub struct DispatchStats {
    directory_enumerations: AtomicU64,
    file_streams: AtomicU64,
    notifications: AtomicU64,
    permission_checks: AtomicU64,
    ignored_events: AtomicU64,
    denied: AtomicU64,
    failed: AtomicU64,
}

impl DispatchStats {
    /// Counters starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_enumeration(&self) {
        self.directory_enumerations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_file_stream(&self) {
        self.file_streams.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_notification(&self, perm: bool) {
        if perm {
            self.permission_checks.fetch_add(1, Ordering::Relaxed);
        } else {
            self.notifications.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_ignored(&self) {
        self.ignored_events.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_denied(&self) {
        self.denied.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters.
    pub fn snapshot(&self) -> DispatchStatsSnapshot {
        DispatchStatsSnapshot {
            directory_enumerations: self.directory_enumerations.load(Ordering::Relaxed),
            file_streams: self.file_streams.load(Ordering::Relaxed),
            notifications: self.notifications.load(Ordering::Relaxed),
            permission_checks: self.permission_checks.load(Ordering::Relaxed),
            ignored_events: self.ignored_events.load(Ordering::Relaxed),
            denied: self.denied.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Copy of [`DispatchStats`] at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStatsSnapshot {
    /// Directory listings dispatched to the provider.
    pub directory_enumerations: u64,
    /// File content requests dispatched to the provider.
    pub file_streams: u64,
    /// Plain notifications dispatched.
    pub notifications: u64,
    /// Permission-gated notifications dispatched.
    pub permission_checks: u64,
    /// Notification events with no handled type.
    pub ignored_events: u64,
    /// Permission-gated events the provider vetoed.
    pub denied: u64,
    /// Events answered with an error code.
    pub failed: u64,
}

impl DispatchStatsSnapshot {
    /// Total events that reached a provider callback.
    pub fn dispatched(&self) -> u64 {
        self.directory_enumerations + self.file_streams + self.notifications + self.permission_checks
    }

    /// Format stats as a display grid.
    ///
    /// # Returns
    /// Multi-line string with formatted statistics.
    pub fn display_grid(&self) -> String {
        let mut lines: Vec<String> = Vec::new();

        lines.push("╔══════════════════════════════════════════════════════════╗".to_string());
        lines.push("║                 ProjFS Dispatch Statistics               ║".to_string());
        lines.push("╠══════════════════════════════════════════════════════════╣".to_string());
        lines.push(format!("║   Enumerations:      {:>36} ║", self.directory_enumerations));
        lines.push(format!("║   File streams:      {:>36} ║", self.file_streams));
        lines.push(format!("║   Notifications:     {:>36} ║", self.notifications));
        lines.push(format!("║   Permission checks: {:>36} ║", self.permission_checks));
        lines.push(format!("║   Ignored:           {:>36} ║", self.ignored_events));
        lines.push("╠══════════════════════════════════════════════════════════╣".to_string());
        lines.push(format!("║   Denied:            {:>36} ║", self.denied));
        lines.push(format!("║   Failed:            {:>36} ║", self.failed));
        lines.push("╚══════════════════════════════════════════════════════════╝".to_string());

        lines.join("\n")
    }
}
