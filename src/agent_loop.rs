// Level-triggered agent loop: every iteration runs the full cycle
// (sample -> rates -> probe -> report -> pull -> reconcile -> ack)
// regardless of what failed last time.

use crate::control_client::{AckStatus, ControlClient};
use crate::counters::CounterSampler;
use crate::latency::LatencyProbe;
use crate::models::{HeartbeatRecord, SampleWindow, normalize_pulled};
use crate::mutator::ConfigMutator;
use crate::rates;
use std::sync::Arc;
use tokio::time::{Duration, MissedTickBehavior, interval};

/// Collaborators for one iteration. The mutator is shared with the push
/// listener; its internal mutex is the exclusion between the two.
pub struct LoopDeps {
    pub sampler: Arc<CounterSampler>,
    pub prober: Arc<LatencyProbe>,
    pub client: Arc<ControlClient>,
    pub mutator: Arc<ConfigMutator>,
}

pub struct LoopConfig {
    pub heartbeat_interval_secs: u64,
    pub proxy_port: u16,
}

fn now_unix() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn now_rfc3339() -> String {
    chrono::Utc::now()
        .to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// One full cycle. Takes the previous sample window and returns the new one;
/// the accumulator is threaded through the loop explicitly rather than held
/// in shared state. Nothing in here raises: every failing step degrades to
/// its zero/default so the cadence survives any one collaborator.
pub async fn run_iteration(
    deps: &LoopDeps,
    config: &LoopConfig,
    previous: Option<SampleWindow>,
) -> Option<SampleWindow> {
    let generated_at = now_rfc3339();

    let gauges = deps.sampler.gauges();
    let cpu = deps.sampler.cpu_utilization().await;
    let window = SampleWindow::new(now_unix(), deps.sampler.counters());
    let link = rates::estimate(previous.as_ref(), &window);
    let active_conns = deps.sampler.active_connections(config.proxy_port).await;
    let conntrack_usage_pct = deps.sampler.conntrack_usage();
    let ping = deps.prober.measure().await;

    let record = HeartbeatRecord {
        server_id: deps.client.server_id().to_string(),
        generated_at,
        ready_at: now_rfc3339(),
        iface: deps.sampler.iface().to_string(),
        ping_target: deps.prober.target().to_string(),
        uptime_s: gauges.uptime_s,
        load1: gauges.load1,
        mem_total_mb: gauges.mem_total_mb,
        mem_free_mb: gauges.mem_free_mb,
        cpu_total_pct: cpu.total_pct,
        softirq_pct: cpu.softirq_pct,
        bw_rx_mbps: link.bw_rx_mbps,
        bw_tx_mbps: link.bw_tx_mbps,
        bw_total_mbps: link.bw_total_mbps,
        pps_rx: link.pps_rx,
        pps_tx: link.pps_tx,
        pps_total: link.pps_total,
        conn_est_rate_s: link.conn_est_rate_s,
        active_conns,
        conntrack_usage_pct,
        rx_dropped: window.counters.rx_drop,
        tx_dropped: window.counters.tx_drop,
        latency_p50_ms: ping.latency_p50_ms,
        latency_p95_ms: ping.latency_p95_ms,
        packet_loss_pct: ping.packet_loss_pct,
    };

    // Fire-and-forget: the result is discarded. A missed heartbeat is
    // superseded by the next cycle's heartbeat.
    if let Err(e) = deps.client.send_heartbeat(&record).await {
        tracing::debug!(error = %e, operation = "send_heartbeat", "heartbeat delivery failed");
    }

    let tasks = match deps.client.fetch_tasks().await {
        Ok(tasks) => tasks,
        Err(e) => {
            tracing::warn!(error = %e, operation = "fetch_tasks", "task pull failed");
            Vec::new()
        }
    };
    if !tasks.is_empty() {
        let ops = normalize_pulled(&tasks);
        // Idempotent no-ops count as success; only a failed pass (config
        // unreadable or unwritable) acks "failed".
        let status = match deps.mutator.apply(&ops).await {
            Ok(outcome) => {
                tracing::debug!(
                    tasks = tasks.len(),
                    changed = outcome.changed,
                    "pulled batch applied"
                );
                AckStatus::Done
            }
            Err(e) => {
                tracing::error!(error = %e, operation = "apply_tasks", "reconciliation pass failed");
                AckStatus::Failed
            }
        };
        for task in &tasks {
            if let Err(e) = deps.client.ack_task(task.task_id, status).await {
                tracing::warn!(
                    task_id = task.task_id,
                    error = %e,
                    "ack failed; task stays delivered on the control plane"
                );
            }
        }
    }

    Some(window)
}

/// Spawn the agent loop. Iteration N+1 never starts before N's
/// reconciliation completes; a shutdown signal between iterations may drop
/// an in-flight heartbeat or ack, both of which are designed to be lost.
pub fn spawn(
    deps: LoopDeps,
    config: LoopConfig,
    mut shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval(Duration::from_secs(config.heartbeat_interval_secs.max(1)));
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut previous: Option<SampleWindow> = None;
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    previous = run_iteration(&deps, &config, previous).await;
                }
                _ = &mut shutdown_rx => {
                    tracing::debug!("Agent loop shutting down");
                    break;
                }
            }
        }
    })
}
