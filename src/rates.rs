// Rate estimation: successive counter windows -> per-second rates

use crate::counters::cpu_stat::CpuTicks;
use crate::models::{CpuUtilization, LinkRates, SampleWindow};

/// Integer per-second rate from a counter pair. A counter reset (current
/// below previous) yields 0, never a negative rate.
pub fn counter_rate(current: u64, previous: u64, elapsed_s: u64) -> u64 {
    if elapsed_s == 0 {
        return 0;
    }
    current.saturating_sub(previous) / elapsed_s
}

/// Bandwidth in megabits per second (bytes x 8, decimal 10^6 scale),
/// rounded to 2 decimals.
pub fn bandwidth_mbps(current_bytes: u64, previous_bytes: u64, elapsed_s: u64) -> f64 {
    if elapsed_s == 0 {
        return 0.0;
    }
    let bits = current_bytes.saturating_sub(previous_bytes) as f64 * 8.0;
    round2(bits / (elapsed_s as f64 * 1_000_000.0))
}

/// Derive link rates from the current window and the retained previous one.
/// No previous window, or zero elapsed time, means all rates are zero.
pub fn estimate(previous: Option<&SampleWindow>, current: &SampleWindow) -> LinkRates {
    let Some(prev) = previous else {
        return LinkRates::default();
    };
    let elapsed = current.taken_at.saturating_sub(prev.taken_at);
    if elapsed == 0 {
        return LinkRates::default();
    }

    let cur = &current.counters;
    let old = &prev.counters;
    let bw_rx_mbps = bandwidth_mbps(cur.rx_bytes, old.rx_bytes, elapsed);
    let bw_tx_mbps = bandwidth_mbps(cur.tx_bytes, old.tx_bytes, elapsed);
    let pps_rx = counter_rate(cur.rx_packets, old.rx_packets, elapsed);
    let pps_tx = counter_rate(cur.tx_packets, old.tx_packets, elapsed);
    // Connection establishment rate sums active and passive open deltas.
    let conn_delta = cur.tcp_active_opens.saturating_sub(old.tcp_active_opens)
        + cur.tcp_passive_opens.saturating_sub(old.tcp_passive_opens);

    LinkRates {
        bw_rx_mbps,
        bw_tx_mbps,
        bw_total_mbps: round2(bw_rx_mbps + bw_tx_mbps),
        pps_rx,
        pps_tx,
        pps_total: pps_rx + pps_tx,
        conn_est_rate_s: conn_delta / elapsed,
    }
}

/// CPU busy and softirq percentages over a tick-bucket pair. Idle time
/// counts idle + iowait; both figures are rounded to 1 decimal.
pub fn cpu_percentages(first: &CpuTicks, second: &CpuTicks) -> CpuUtilization {
    let total = second.total().saturating_sub(first.total()).max(1);
    let idle = second.idle_total().saturating_sub(first.idle_total());
    let busy = total.saturating_sub(idle);
    let softirq = second.softirq.saturating_sub(first.softirq);
    CpuUtilization {
        total_pct: round1(busy as f64 * 100.0 / total as f64),
        softirq_pct: round1(softirq as f64 * 100.0 / total as f64),
    }
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
