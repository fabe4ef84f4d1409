use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by the gateway and its dispatch pipeline.
#[derive(Debug, Default)]
pub struct GatewayStats {
    accepted: AtomicU64,
    delivered: AtomicU64,
    rejected: AtomicU64,
    transport_errors: AtomicU64,
    admission_denied: AtomicU64,
    requeued: AtomicU64,
    dropped: AtomicU64,
    max_attempts: AtomicU64,
}

impl GatewayStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_admission_denied(&self) {
        self.admission_denied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_requeued(&self, attempts: u64) {
        self.requeued.fetch_add(1, Ordering::Relaxed);
        self.max_attempts.fetch_max(attempts, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn requeued(&self) -> u64 {
        self.requeued.load(Ordering::Relaxed)
    }

    pub fn max_attempts(&self) -> u64 {
        self.max_attempts.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            timestamp: Utc::now().to_rfc3339(),
            accepted: self.accepted(),
            delivered: self.delivered(),
            rejected: self.rejected.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            admission_denied: self.admission_denied.load(Ordering::Relaxed),
            requeued: self.requeued(),
            dropped: self.dropped.load(Ordering::Relaxed),
            max_attempts: self.max_attempts(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub timestamp: String,
    pub accepted: u64,
    pub delivered: u64,
    pub rejected: u64,
    pub transport_errors: u64,
    pub admission_denied: u64,
    pub requeued: u64,
    pub dropped: u64,
    pub max_attempts: u64,
}

impl StatsSnapshot {
    pub fn print_report(&self) {
        info!("gateway stats at {}", self.timestamp);
        info!("  accepted:         {}", self.accepted);
        info!("  delivered:        {}", self.delivered);
        info!("  rejected:         {}", self.rejected);
        info!("  transport errors: {}", self.transport_errors);
        info!("  admission denied: {}", self.admission_denied);
        info!("  requeued:         {}", self.requeued);
        info!("  dropped:          {}", self.dropped);
        info!("  max attempts:     {}", self.max_attempts);
    }

    /// Appends one row to `filename`, writing the header on first use.
    pub fn save_to_csv(&self, filename: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let path = filename.as_ref();
        let file_exists = path.exists();
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;

        let mut wtr = csv::WriterBuilder::new()
            .has_headers(!file_exists)
            .from_writer(file);
        wtr.serialize(self)?;
        wtr.flush()?;
        Ok(())
    }
}
