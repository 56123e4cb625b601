// Echo-probe batch: ping subprocess, loss/RTT parsing, nearest-rank percentiles

use crate::command;
use crate::models::PingStats;
use std::time::Duration;

/// Sends one fixed batch of ICMP echo probes per loop iteration and reduces
/// the output to latency percentiles and a loss ratio. Any failure mode of
/// the probe command reports total loss (fail-safe).
pub struct LatencyProbe {
    target: String,
    count: u32,
    deadline_secs: u32,
}

impl LatencyProbe {
    pub fn new(target: String, count: u32, deadline_secs: u32) -> Self {
        Self {
            target,
            count,
            deadline_secs,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub async fn measure(&self) -> PingStats {
        let count = self.count.to_string();
        let deadline = self.deadline_secs.to_string();
        let timeout = Duration::from_secs(u64::from(self.deadline_secs) + 2);
        let out = match command::run(
            "ping",
            &["-n", "-q", "-w", &deadline, "-c", &count, &self.target],
            timeout,
        )
        .await
        {
            Ok(out) if out.success => out,
            Ok(_) | Err(_) => return PingStats::total_loss(),
        };
        parse_ping_output(&out.stdout)
    }
}

/// Reduce successful ping output to stats. Zero parsed round-trip samples
/// leave latencies at zero while the parsed loss value stands.
pub fn parse_ping_output(output: &str) -> PingStats {
    let loss = parse_loss_pct(output).unwrap_or(100.0);
    let mut times = parse_rtt_samples(output);
    if times.is_empty() {
        return PingStats {
            latency_p50_ms: 0.0,
            latency_p95_ms: 0.0,
            packet_loss_pct: loss,
        };
    }
    times.sort_by(|a, b| a.total_cmp(b));
    PingStats {
        latency_p50_ms: percentile(&times, 0.5),
        latency_p95_ms: percentile(&times, 0.95),
        packet_loss_pct: loss,
    }
}

/// Extract "X% packet loss" from the ping summary line.
fn parse_loss_pct(output: &str) -> Option<f64> {
    let line = output.lines().find(|l| l.contains("packet loss"))?;
    line.split_whitespace()
        .find_map(|tok| tok.strip_suffix('%'))
        .and_then(|n| n.parse().ok())
}

/// Extract individual "time=X ms" round-trip samples.
fn parse_rtt_samples(output: &str) -> Vec<f64> {
    output
        .lines()
        .filter_map(|line| {
            let rest = line.split("time=").nth(1)?;
            let num = rest.split_whitespace().next()?;
            num.parse::<f64>().ok()
        })
        .collect()
}

/// Nearest-rank percentile over sorted samples:
/// index = round(p * (n-1)), clamped to [0, n-1]. Empty input yields 0.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = (p * (sorted.len() - 1) as f64).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}
