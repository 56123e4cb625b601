// Proxy user-list reconciliation: read all, mutate in memory, atomic rewrite, reload

use crate::command;
use crate::models::{KeyOp, TaskKind};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::Mutex;

/// Transport descriptor stamped on newly provisioned user entries.
pub const DEFAULT_TRANSPORT: &str = "xtls-rprx-vision";

const SERVICE_CMD_TIMEOUT: Duration = Duration::from_secs(30);

/// Proxy configuration file. Only `inbounds[].settings.clients` is touched;
/// everything else round-trips untouched through the flattened maps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default)]
    pub inbounds: Vec<Inbound>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inbound {
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub settings: InboundSettings,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InboundSettings {
    #[serde(default)]
    pub clients: Vec<ClientEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One authorized user on an inbound listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientEntry {
    pub id: String,
    #[serde(default)]
    pub flow: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// How to signal the proxy after a config rewrite.
#[derive(Debug, Clone)]
pub enum ProxyService {
    /// `systemctl reload <unit>`, falling back to a full restart.
    Systemd { unit: String },
    /// No signal (tests, dry runs).
    Disabled,
}

impl ProxyService {
    /// None when no signal is configured, otherwise whether reload (or the
    /// restart fallback) succeeded.
    async fn reload_or_restart(&self) -> Option<bool> {
        let ProxyService::Systemd { unit } = self else {
            return None;
        };
        match command::run("systemctl", &["reload", unit], SERVICE_CMD_TIMEOUT).await {
            Ok(out) if out.success => return Some(true),
            Ok(out) => {
                tracing::warn!(unit, stderr = %out.stderr.trim(), "reload failed, trying restart")
            }
            Err(e) => tracing::warn!(unit, error = %e, "reload failed, trying restart"),
        }
        match command::run("systemctl", &["restart", unit], SERVICE_CMD_TIMEOUT).await {
            Ok(out) if out.success => Some(true),
            Ok(out) => {
                tracing::error!(unit, stderr = %out.stderr.trim(), "restart fallback failed");
                Some(false)
            }
            Err(e) => {
                tracing::error!(unit, error = %e, "restart fallback failed");
                Some(false)
            }
        }
    }
}

/// What one reconciliation pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub changed: bool,
    pub reload_attempted: bool,
    pub reload_ok: bool,
}

/// Applies key operations to the proxy user list. The whole
/// read-modify-write-reload cycle runs under one mutex so the concurrent
/// push listener cannot interleave with the main loop.
pub struct ConfigMutator {
    path: PathBuf,
    protocol: String,
    service: ProxyService,
    lock: Mutex<()>,
}

impl ConfigMutator {
    pub fn new(path: impl Into<PathBuf>, protocol: String, service: ProxyService) -> Self {
        Self {
            path: path.into(),
            protocol,
            service,
            lock: Mutex::new(()),
        }
    }

    /// Apply a batch in delivery order. Redelivery is harmless: adds skip
    /// present ids, deletes skip absent ones. The file is rewritten (tmp +
    /// rename) and the service signaled only when an entry set changed;
    /// read or write failure aborts the pass with the old file intact.
    pub async fn apply(&self, ops: &[KeyOp]) -> anyhow::Result<ApplyOutcome> {
        if ops.is_empty() {
            return Ok(ApplyOutcome::default());
        }
        let _guard = self.lock.lock().await;

        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("read proxy config {}", self.path.display()))?;
        let mut cfg: ProxyConfig = serde_json::from_str(&raw)
            .with_context(|| format!("parse proxy config {}", self.path.display()))?;

        if !apply_ops(&mut cfg, &self.protocol, ops) {
            tracing::debug!(ops = ops.len(), "batch changed nothing, skipping rewrite");
            return Ok(ApplyOutcome::default());
        }

        write_atomic(&self.path, &cfg).await?;
        let reload = self.service.reload_or_restart().await;
        tracing::info!(
            ops = ops.len(),
            reload_ok = reload.unwrap_or(false),
            "proxy user list rewritten"
        );
        Ok(ApplyOutcome {
            changed: true,
            reload_attempted: reload.is_some(),
            reload_ok: reload.unwrap_or(false),
        })
    }
}

/// Mutate the in-memory config; true when any listener's entry set changed.
/// Operations apply to every inbound of the target protocol, in order.
pub fn apply_ops(cfg: &mut ProxyConfig, protocol: &str, ops: &[KeyOp]) -> bool {
    let mut changed = false;
    for op in ops {
        for inbound in cfg.inbounds.iter_mut().filter(|b| b.protocol == protocol) {
            let clients = &mut inbound.settings.clients;
            match op.kind {
                TaskKind::AddKey => {
                    if !clients.iter().any(|c| c.id == op.key_id) {
                        clients.push(ClientEntry {
                            id: op.key_id.clone(),
                            flow: DEFAULT_TRANSPORT.to_string(),
                            email: op.email.clone(),
                            extra: Map::new(),
                        });
                        changed = true;
                    }
                }
                TaskKind::DelKey => {
                    let before = clients.len();
                    clients.retain(|c| c.id != op.key_id);
                    if clients.len() != before {
                        changed = true;
                    }
                }
            }
        }
    }
    changed
}

/// Write via sibling temp file then rename, so a reader only ever sees the
/// old or the new config, never a partial write.
async fn write_atomic(path: &Path, cfg: &ProxyConfig) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(cfg).context("serialize proxy config")?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("proxy config path has no file name"))?;
    let tmp = path.with_file_name(format!("{}.tmp", file_name));
    tokio::fs::write(&tmp, json)
        .await
        .with_context(|| format!("write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("rename {} over {}", tmp.display(), path.display()))?;
    Ok(())
}
