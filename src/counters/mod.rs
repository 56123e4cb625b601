// Kernel counter sampling: gauges via sysinfo, raw counters via /proc parsers

pub mod cpu_stat;
pub mod net_dev;
pub mod netstat;

use crate::command;
use crate::models::{CpuUtilization, Gauges, RawCounters};
use crate::rates;
use std::path::PathBuf;
use std::time::Duration;
use sysinfo::System;

/// Interval between the two /proc/stat reads backing one CPU utilization
/// figure. Kept short so the secondary pair never stalls the iteration.
const CPU_SAMPLE_GAP: Duration = Duration::from_millis(200);

const SUBPROCESS_TIMEOUT: Duration = Duration::from_secs(5);

/// Reads gauges and raw counters for one iteration. Every source degrades to
/// its zero value on read or parse failure; a missing metric never blocks
/// heartbeat delivery.
pub struct CounterSampler {
    proc_root: PathBuf,
    iface: String,
    sys: std::sync::Mutex<System>,
}

impl CounterSampler {
    pub fn new(iface: String) -> Self {
        Self::with_proc_root(iface, PathBuf::from("/proc"))
    }

    /// Root the /proc readers somewhere else (tests point this at a tempdir).
    pub fn with_proc_root(iface: String, proc_root: PathBuf) -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        Self {
            proc_root,
            iface,
            sys: std::sync::Mutex::new(sys),
        }
    }

    pub fn iface(&self) -> &str {
        &self.iface
    }

    fn read_source(&self, rel: &str) -> String {
        std::fs::read_to_string(self.proc_root.join(rel)).unwrap_or_default()
    }

    /// Uptime, 1-minute load, memory total/available in MB.
    pub fn gauges(&self) -> Gauges {
        let (mem_total_mb, mem_free_mb) = match self.sys.lock() {
            Ok(mut sys) => {
                sys.refresh_memory();
                (
                    sys.total_memory() / (1024 * 1024),
                    sys.available_memory() / (1024 * 1024),
                )
            }
            Err(e) => {
                tracing::warn!(error = %e, operation = "gauges", "sysinfo lock poisoned");
                (0, 0)
            }
        };
        Gauges {
            uptime_s: System::uptime(),
            load1: format!("{:.2}", System::load_average().one),
            mem_total_mb,
            mem_free_mb,
        }
    }

    /// One read pass over the monotonic counter sources.
    pub fn counters(&self) -> RawCounters {
        let dev = net_dev::parse_interface(&self.read_source("net/dev"), &self.iface)
            .unwrap_or_default();
        let opens = netstat::parse_tcp_opens(&self.read_source("net/netstat")).unwrap_or_default();
        RawCounters {
            rx_bytes: dev.rx_bytes,
            tx_bytes: dev.tx_bytes,
            rx_packets: dev.rx_packets,
            tx_packets: dev.tx_packets,
            rx_drop: dev.rx_drop,
            tx_drop: dev.tx_drop,
            tcp_active_opens: opens.active_opens,
            tcp_passive_opens: opens.passive_opens,
        }
    }

    /// CPU busy and softirq percentages from an independent short-interval
    /// sample pair, separate from the heartbeat-interval counter windows.
    pub async fn cpu_utilization(&self) -> CpuUtilization {
        let first = cpu_stat::parse_cpu_ticks(&self.read_source("stat"));
        tokio::time::sleep(CPU_SAMPLE_GAP).await;
        let second = cpu_stat::parse_cpu_ticks(&self.read_source("stat"));
        match (first, second) {
            (Some(a), Some(b)) => rates::cpu_percentages(&a, &b),
            _ => CpuUtilization::default(),
        }
    }

    /// Conntrack table usage percentage; 0.0 when the module is absent.
    pub fn conntrack_usage(&self) -> f64 {
        let read_u64 = |rel: &str| -> Option<u64> { self.read_source(rel).trim().parse().ok() };
        let count = read_u64("sys/net/netfilter/nf_conntrack_count").unwrap_or(0);
        let max = read_u64("sys/net/netfilter/nf_conntrack_max").unwrap_or(0);
        if max == 0 {
            return 0.0;
        }
        (count as f64 * 1000.0 / max as f64).round() / 10.0
    }

    /// Established connections to the proxy port, counted via `ss`.
    pub async fn active_connections(&self, port: u16) -> u64 {
        let filter = format!("( dport = :{} )", port);
        let out = match command::run(
            "ss",
            &["-tn", "state", "established", &filter],
            SUBPROCESS_TIMEOUT,
        )
        .await
        {
            Ok(out) if out.success => out,
            Ok(out) => {
                tracing::debug!(stderr = %out.stderr.trim(), "ss exited non-zero");
                return 0;
            }
            Err(e) => {
                tracing::debug!(error = %e, "ss invocation failed");
                return 0;
            }
        };
        // First line is the column header.
        out.stdout
            .lines()
            .filter(|l| !l.trim().is_empty())
            .count()
            .saturating_sub(1) as u64
    }
}

/// Resolve the interface carrying the default route, via `ip route get`.
pub async fn detect_default_iface() -> Option<String> {
    let out = command::run("ip", &["route", "get", "1.1.1.1"], SUBPROCESS_TIMEOUT)
        .await
        .ok()
        .filter(|o| o.success)?;
    let fields: Vec<&str> = out.stdout.split_whitespace().collect();
    let dev_idx = fields.iter().position(|f| *f == "dev")?;
    fields.get(dev_idx + 1).map(|s| s.to_string())
}
