// Iteration-level tests against an in-process control plane

mod common;

use common::{ControlPlane, TOKEN, spawn_control_plane};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use vpn_agent::agent_loop::{LoopConfig, LoopDeps, run_iteration};
use vpn_agent::control_client::ControlClient;
use vpn_agent::counters::CounterSampler;
use vpn_agent::latency::LatencyProbe;
use vpn_agent::models::TaskKind;
use vpn_agent::mutator::{ConfigMutator, ProxyConfig, ProxyService};
use vpn_agent::task_queue::TaskStatus;

const SERVER_ID: &str = "edge-test";

const BASE_CONFIG: &str = r#"{
  "inbounds": [
    {
      "protocol": "vless",
      "settings": {"clients": [{"id": "K2", "flow": "xtls-rprx-vision"}]}
    }
  ]
}"#;

struct Fixture {
    cp: ControlPlane,
    deps: LoopDeps,
    config: LoopConfig,
    proxy_path: std::path::PathBuf,
    _dir: tempfile::TempDir,
}

async fn fixture() -> Fixture {
    let cp = ControlPlane::new();
    let base_url = spawn_control_plane(cp.clone()).await;

    let dir = tempfile::TempDir::new().unwrap();
    let proxy_path = dir.path().join("config.json");
    std::fs::write(&proxy_path, BASE_CONFIG).unwrap();

    // Proc root is an empty tempdir: every counter source degrades to zero.
    let deps = LoopDeps {
        sampler: Arc::new(CounterSampler::with_proc_root(
            "eth0".to_string(),
            dir.path().join("proc"),
        )),
        prober: Arc::new(LatencyProbe::new("127.0.0.1".to_string(), 1, 1)),
        client: Arc::new(ControlClient::new(&base_url, TOKEN, SERVER_ID).unwrap()),
        mutator: Arc::new(ConfigMutator::new(
            &proxy_path,
            "vless".to_string(),
            ProxyService::Disabled,
        )),
    };
    Fixture {
        cp,
        deps,
        config: LoopConfig {
            heartbeat_interval_secs: 30,
            proxy_port: 443,
        },
        proxy_path,
        _dir: dir,
    }
}

fn client_ids(path: &std::path::Path) -> Vec<String> {
    let cfg: ProxyConfig = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    cfg.inbounds[0]
        .settings
        .clients
        .iter()
        .map(|c| c.id.clone())
        .collect()
}

#[tokio::test]
async fn test_iteration_reports_pulls_applies_and_acks() {
    let fx = fixture().await;
    let (add_id, del_id) = {
        let mut queue = fx.cp.queue.lock().unwrap();
        (
            queue.create(SERVER_ID, TaskKind::AddKey, "K1", None).unwrap(),
            queue.create(SERVER_ID, TaskKind::DelKey, "K2", None).unwrap(),
        )
    };

    let window = run_iteration(&fx.deps, &fx.config, None).await;
    assert!(window.is_some());

    assert_eq!(fx.cp.heartbeats.load(Ordering::Relaxed), 1);
    assert_eq!(client_ids(&fx.proxy_path), vec!["K1".to_string()]);

    let acks = fx.cp.acks.lock().unwrap().clone();
    assert_eq!(
        acks,
        vec![(add_id, "done".to_string()), (del_id, "done".to_string())]
    );
    let queue = fx.cp.queue.lock().unwrap();
    assert_eq!(queue.get(add_id).unwrap().status, TaskStatus::Done);
    assert_eq!(queue.get(del_id).unwrap().status, TaskStatus::Done);
}

#[tokio::test]
async fn test_heartbeat_failure_does_not_block_task_pull() {
    let fx = fixture().await;
    fx.cp.fail_heartbeats.store(true, Ordering::Relaxed);
    let task_id = fx
        .cp
        .queue
        .lock()
        .unwrap()
        .create(SERVER_ID, TaskKind::AddKey, "K1", None)
        .unwrap();

    // Must not raise out of the iteration despite the 500s.
    run_iteration(&fx.deps, &fx.config, None).await;

    assert_eq!(fx.cp.heartbeats.load(Ordering::Relaxed), 0);
    assert!(client_ids(&fx.proxy_path).contains(&"K1".to_string()));
    assert_eq!(
        fx.cp.queue.lock().unwrap().get(task_id).unwrap().status,
        TaskStatus::Done
    );
}

#[tokio::test]
async fn test_unreachable_control_plane_keeps_iteration_alive() {
    let mut fx = fixture().await;
    // Point the client at a closed port.
    fx.deps.client = Arc::new(
        ControlClient::new("http://127.0.0.1:9", TOKEN, SERVER_ID).unwrap(),
    );

    let window = run_iteration(&fx.deps, &fx.config, None).await;
    assert!(window.is_some());
    assert_eq!(client_ids(&fx.proxy_path), vec!["K2".to_string()]);
}

#[tokio::test]
async fn test_apply_failure_acks_failed() {
    let fx = fixture().await;
    // Break the proxy config so the reconciliation pass errors.
    std::fs::remove_file(&fx.proxy_path).unwrap();
    let task_id = fx
        .cp
        .queue
        .lock()
        .unwrap()
        .create(SERVER_ID, TaskKind::AddKey, "K1", None)
        .unwrap();

    run_iteration(&fx.deps, &fx.config, None).await;

    assert_eq!(
        fx.cp.queue.lock().unwrap().get(task_id).unwrap().status,
        TaskStatus::Failed
    );
}

#[tokio::test]
async fn test_redelivered_batch_is_idempotent() {
    let fx = fixture().await;
    fx.cp
        .queue
        .lock()
        .unwrap()
        .create(SERVER_ID, TaskKind::AddKey, "K1", None)
        .unwrap();

    let prev = run_iteration(&fx.deps, &fx.config, None).await;
    // Same ops pushed again directly (redelivery path): outcome unchanged.
    let ops = vec![vpn_agent::models::KeyOp {
        kind: TaskKind::AddKey,
        key_id: "K1".to_string(),
        email: None,
    }];
    let outcome = fx.deps.mutator.apply(&ops).await.unwrap();
    assert!(!outcome.changed);

    run_iteration(&fx.deps, &fx.config, prev).await;
    let ids = client_ids(&fx.proxy_path);
    assert_eq!(ids.iter().filter(|id| *id == "K1").count(), 1);
}
