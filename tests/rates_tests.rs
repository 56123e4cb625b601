// Rate estimation properties: deltas, resets, first iteration, percentiles

use vpn_agent::counters::cpu_stat::CpuTicks;
use vpn_agent::latency::percentile;
use vpn_agent::models::{RawCounters, SampleWindow};
use vpn_agent::rates;

fn window(taken_at: u64, counters: RawCounters) -> SampleWindow {
    SampleWindow::new(taken_at, counters)
}

#[test]
fn test_rate_is_delta_over_elapsed() {
    assert_eq!(rates::counter_rate(1_000, 400, 30), 20);
    // 30 MB over 10 s = 24 Mbps at decimal scale
    assert_eq!(rates::bandwidth_mbps(40_000_000, 10_000_000, 10), 24.0);
}

#[test]
fn test_counter_reset_never_negative() {
    assert_eq!(rates::counter_rate(5, 1_000_000, 10), 0);
    assert_eq!(rates::bandwidth_mbps(5, 1_000_000, 10), 0.0);
}

#[test]
fn test_first_iteration_rates_are_zero() {
    let cur = window(
        100,
        RawCounters {
            rx_bytes: 999,
            tx_bytes: 999,
            rx_packets: 99,
            tx_packets: 99,
            ..Default::default()
        },
    );
    let link = rates::estimate(None, &cur);
    assert_eq!(link, Default::default());
}

#[test]
fn test_zero_elapsed_rates_are_zero() {
    let prev = window(100, RawCounters::default());
    let cur = window(
        100,
        RawCounters {
            rx_bytes: 1_000_000,
            ..Default::default()
        },
    );
    let link = rates::estimate(Some(&prev), &cur);
    assert_eq!(link, Default::default());
}

#[test]
fn test_estimate_full_window_pair() {
    let prev = window(
        100,
        RawCounters {
            rx_bytes: 0,
            tx_bytes: 0,
            rx_packets: 0,
            tx_packets: 100,
            tcp_active_opens: 50,
            tcp_passive_opens: 10,
            ..Default::default()
        },
    );
    let cur = window(
        110,
        RawCounters {
            rx_bytes: 25_000_000,
            tx_bytes: 12_500_000,
            rx_packets: 30_000,
            tx_packets: 10_100,
            tcp_active_opens: 110,
            tcp_passive_opens: 50,
            ..Default::default()
        },
    );
    let link = rates::estimate(Some(&prev), &cur);
    assert_eq!(link.bw_rx_mbps, 20.0);
    assert_eq!(link.bw_tx_mbps, 10.0);
    assert_eq!(link.bw_total_mbps, 30.0);
    assert_eq!(link.pps_rx, 3_000);
    assert_eq!(link.pps_tx, 1_000);
    assert_eq!(link.pps_total, 4_000);
    // (110-50) + (50-10) = 100 opens over 10 s
    assert_eq!(link.conn_est_rate_s, 10);
}

#[test]
fn test_cpu_percentages() {
    let a = CpuTicks {
        user: 100,
        nice: 0,
        system: 50,
        idle: 800,
        iowait: 40,
        irq: 0,
        softirq: 10,
        steal: 0,
    };
    let b = CpuTicks {
        user: 160,
        nice: 0,
        system: 70,
        idle: 890,
        iowait: 50,
        irq: 0,
        softirq: 30,
        steal: 0,
    };
    // total delta 200, idle delta (890+50)-(800+40)=100 -> 50% busy
    let cpu = rates::cpu_percentages(&a, &b);
    assert_eq!(cpu.total_pct, 50.0);
    assert_eq!(cpu.softirq_pct, 10.0);
}

#[test]
fn test_cpu_tick_rollback_clamps_to_zero() {
    let a = CpuTicks {
        user: 100,
        idle: 100,
        ..Default::default()
    };
    let b = CpuTicks::default();
    let cpu = rates::cpu_percentages(&a, &b);
    assert_eq!(cpu.total_pct, 0.0);
    assert_eq!(cpu.softirq_pct, 0.0);
}

#[test]
fn test_percentile_nearest_rank() {
    let samples = [10.0, 20.0, 30.0, 40.0];
    // p50: round(0.5 * 3) = 2 -> 30; p95: round(0.95 * 3) = 3 -> 40
    assert_eq!(percentile(&samples, 0.5), 30.0);
    assert_eq!(percentile(&samples, 0.95), 40.0);
    assert_eq!(percentile(&samples, 0.0), 10.0);
    assert_eq!(percentile(&samples, 1.0), 40.0);
}

#[test]
fn test_percentile_edge_inputs() {
    assert_eq!(percentile(&[], 0.5), 0.0);
    assert_eq!(percentile(&[7.5], 0.95), 7.5);
}
