use std::sync::atomic::{AtomicU64, Ordering};

/// Running counts of loops that gave up and maneuvers aborted by hardware faults.
#[derive(Debug, Default)]
pub struct ManeuverDiagnostics {
    pub timeouts: AtomicU64,
    pub faults: AtomicU64,
}

impl ManeuverDiagnostics {
    pub fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fault(&self) {
        self.faults.fetch_add(1, Ordering::Relaxed);
    }

    pub fn timeouts(&self) -> u64 {
        self.timeouts.load(Ordering::Relaxed)
    }

    pub fn faults(&self) -> u64 {
        self.faults.load(Ordering::Relaxed)
    }
}
