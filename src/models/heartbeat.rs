// Sampling and heartbeat wire models

use serde::{Deserialize, Serialize};

/// Raw monotonically increasing kernel counters captured in one read pass.
/// Interface counters come from /proc/net/dev, TCP open counters from
/// /proc/net/netstat (TcpExt).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawCounters {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_packets: u64,
    pub tx_packets: u64,
    pub rx_drop: u64,
    pub tx_drop: u64,
    pub tcp_active_opens: u64,
    pub tcp_passive_opens: u64,
}

/// One capture of raw counters plus the wall-clock second it was taken.
/// Immutable once built; the loop keeps exactly one previous window for
/// delta computation.
#[derive(Debug, Clone, Copy)]
pub struct SampleWindow {
    pub taken_at: u64,
    pub counters: RawCounters,
}

impl SampleWindow {
    pub fn new(taken_at: u64, counters: RawCounters) -> Self {
        Self { taken_at, counters }
    }
}

/// Point-in-time gauges (not counters): uptime, load, memory.
#[derive(Debug, Clone, Default)]
pub struct Gauges {
    pub uptime_s: u64,
    pub load1: String,
    pub mem_total_mb: u64,
    pub mem_free_mb: u64,
}

/// CPU utilization derived from a short secondary /proc/stat sample pair.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuUtilization {
    pub total_pct: f64,
    pub softirq_pct: f64,
}

/// Per-second rates derived from two successive sample windows.
/// All zeros on the first iteration (no previous window) or when elapsed
/// time is zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LinkRates {
    pub bw_rx_mbps: f64,
    pub bw_tx_mbps: f64,
    pub bw_total_mbps: f64,
    pub pps_rx: u64,
    pub pps_tx: u64,
    pub pps_total: u64,
    pub conn_est_rate_s: u64,
}

/// Latency percentiles and loss ratio from one echo-probe batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PingStats {
    pub latency_p50_ms: f64,
    pub latency_p95_ms: f64,
    pub packet_loss_pct: f64,
}

impl PingStats {
    /// Fail-safe default: total loss, zero latencies.
    pub fn total_loss() -> Self {
        Self {
            latency_p50_ms: 0.0,
            latency_p95_ms: 0.0,
            packet_loss_pct: 100.0,
        }
    }
}

/// Full heartbeat payload sent to the ingestion endpoint once per iteration.
/// generated_at/ready_at bracket the iteration and are diagnostic only; the
/// control plane rejects them if unparsable but the agent ignores the reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRecord {
    pub server_id: String,
    pub generated_at: String,
    pub ready_at: String,
    pub iface: String,
    pub ping_target: String,
    pub uptime_s: u64,
    pub load1: String,
    pub mem_total_mb: u64,
    pub mem_free_mb: u64,
    pub cpu_total_pct: f64,
    pub softirq_pct: f64,
    pub bw_rx_mbps: f64,
    pub bw_tx_mbps: f64,
    pub bw_total_mbps: f64,
    pub pps_rx: u64,
    pub pps_tx: u64,
    pub pps_total: u64,
    pub conn_est_rate_s: u64,
    pub active_conns: u64,
    pub conntrack_usage_pct: f64,
    pub rx_dropped: u64,
    pub tx_dropped: u64,
    pub latency_p50_ms: f64,
    pub latency_p95_ms: f64,
    pub packet_loss_pct: f64,
}
