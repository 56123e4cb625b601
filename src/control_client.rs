// Outbound control-plane calls: heartbeat, task pull, acknowledgment

use crate::models::{HeartbeatRecord, Task};
use serde::Serialize;
use std::time::Duration;

/// Terminal task outcome reported back to the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AckStatus {
    Done,
    Failed,
}

#[derive(Serialize)]
struct AckBody {
    status: AckStatus,
}

/// HTTP client for the control plane, authenticated with the shared bearer
/// token. Every call carries the client-level timeout; callers decide
/// whether a failure matters (heartbeat and ack results are discarded by
/// design, pull degrades to an empty batch).
pub struct ControlClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    server_id: String,
}

impl ControlClient {
    pub fn new(base_url: &str, token: &str, server_id: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            server_id: server_id.to_string(),
        })
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    /// POST one heartbeat. Fire-and-forget at the call site: the loop logs
    /// and drops the result, no retry, no queueing.
    pub async fn send_heartbeat(&self, record: &HeartbeatRecord) -> anyhow::Result<()> {
        let url = format!("{}/heartbeat", self.base_url);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(record)
            .send()
            .await?;
        anyhow::ensure!(
            resp.status().is_success(),
            "heartbeat rejected: {}",
            resp.status()
        );
        Ok(())
    }

    /// Pull pending tasks addressed to this agent. The control plane marks
    /// returned tasks delivered as part of this response; a reply lost after
    /// that point leaves them stranded until manual intervention.
    pub async fn fetch_tasks(&self) -> anyhow::Result<Vec<Task>> {
        let url = format!("{}/tasks", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[("server_id", self.server_id.as_str())])
            .bearer_auth(&self.token)
            .send()
            .await?;
        anyhow::ensure!(
            resp.status().is_success(),
            "task pull rejected: {}",
            resp.status()
        );
        Ok(resp.json().await?)
    }

    /// Report one terminal task outcome, best-effort.
    pub async fn ack_task(&self, task_id: i64, status: AckStatus) -> anyhow::Result<()> {
        let url = format!("{}/tasks/{}/ack", self.base_url, task_id);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&AckBody { status })
            .send()
            .await?;
        anyhow::ensure!(
            resp.status().is_success(),
            "ack rejected: {}",
            resp.status()
        );
        Ok(())
    }
}
