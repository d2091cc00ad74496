//! Prometheus metrics for monitoring.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Metrics collector.
#[derive(Debug, Default)]
pub struct Metrics {
    /// Total requests dispatched
    pub requests_total: AtomicU64,
    /// Requests answered with a result
    pub requests_success: AtomicU64,
    /// Requests whose handler failed
    pub requests_failed: AtomicU64,
    /// Requests for unknown methods
    pub method_not_found: AtomicU64,
    /// Messages rejected before dispatch (parse or shape errors)
    pub protocol_errors: AtomicU64,
    /// Socket connections accepted
    pub connections_total: AtomicU64,
    /// Socket connections currently open
    pub active_connections: AtomicU64,
    /// Progress records currently held
    pub tracked_tasks: AtomicU64,
}

impl Metrics {
    /// Create a new metrics collector.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_requests(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_success(&self) {
        self.requests_success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_failed(&self) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_method_not_found(&self) {
        self.method_not_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_protocol_errors(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a newly accepted socket connection.
    pub fn connection_opened(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a closed socket connection.
    pub fn connection_closed(&self) {
        let _ = self
            .active_connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    pub fn set_tracked_tasks(&self, count: u64) {
        self.tracked_tasks.store(count, Ordering::Relaxed);
    }

    /// Get all metrics as a snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            requests_success: self.requests_success.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            method_not_found: self.method_not_found.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            connections_total: self.connections_total.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            tracked_tasks: self.tracked_tasks.load(Ordering::Relaxed),
        }
    }

    /// Export metrics in Prometheus format.
    pub fn to_prometheus(&self) -> String {
        let s = self.snapshot();
        format!(
            r#"# HELP gimp_mcp_requests_total Total number of dispatched requests
# TYPE gimp_mcp_requests_total counter
gimp_mcp_requests_total {}

# HELP gimp_mcp_requests_success Requests answered with a result
# TYPE gimp_mcp_requests_success counter
gimp_mcp_requests_success {}

# HELP gimp_mcp_requests_failed Requests whose handler failed
# TYPE gimp_mcp_requests_failed counter
gimp_mcp_requests_failed {}

# HELP gimp_mcp_method_not_found Requests for unknown methods
# TYPE gimp_mcp_method_not_found counter
gimp_mcp_method_not_found {}

# HELP gimp_mcp_protocol_errors Messages rejected before dispatch
# TYPE gimp_mcp_protocol_errors counter
gimp_mcp_protocol_errors {}

# HELP gimp_mcp_connections_total Socket connections accepted
# TYPE gimp_mcp_connections_total counter
gimp_mcp_connections_total {}

# HELP gimp_mcp_active_connections Socket connections currently open
# TYPE gimp_mcp_active_connections gauge
gimp_mcp_active_connections {}

# HELP gimp_mcp_tracked_tasks Progress records currently held
# TYPE gimp_mcp_tracked_tasks gauge
gimp_mcp_tracked_tasks {}
"#,
            s.requests_total,
            s.requests_success,
            s.requests_failed,
            s.method_not_found,
            s.protocol_errors,
            s.connections_total,
            s.active_connections,
            s.tracked_tasks
        )
    }
}

/// Metrics snapshot.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub requests_success: u64,
    pub requests_failed: u64,
    pub method_not_found: u64,
    pub protocol_errors: u64,
    pub connections_total: u64,
    pub active_connections: u64,
    pub tracked_tasks: u64,
}

/// Timer for measuring durations.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed time in milliseconds.
    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
