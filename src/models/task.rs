// Task wire models and push-payload normalization

use serde::{Deserialize, Serialize};

/// Requested configuration change on the proxy user list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    AddKey,
    DelKey,
}

/// Task as returned by the control plane's pull endpoint. `type`/`id` are
/// the wire names; `id` is the opaque key identifier, not the task id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    #[serde(rename = "type")]
    pub kind: TaskKind,
    #[serde(rename = "id")]
    pub key_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub payload: Option<String>,
    pub task_id: i64,
}

/// Task as pushed directly to the local listener (no queue bookkeeping,
/// hence no task_id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    #[serde(rename = "type")]
    pub kind: TaskKind,
    #[serde(rename = "id")]
    pub key_id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Accepted push bodies: `{"tasks": [...]}`, a single task object, or a
/// bare array. Anything else is malformed.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PushPayload {
    Batch { tasks: Vec<TaskRequest> },
    Single(TaskRequest),
    Many(Vec<TaskRequest>),
}

/// Rejections raised while normalizing a push payload at the boundary.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("task has empty key id")]
    EmptyKeyId,
}

/// Uniform ordered operation handed to the config mutator by both the pull
/// and push paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyOp {
    pub kind: TaskKind,
    pub key_id: String,
    pub email: Option<String>,
}

impl TryFrom<TaskRequest> for KeyOp {
    type Error = PayloadError;

    fn try_from(req: TaskRequest) -> Result<Self, Self::Error> {
        let key_id = req.key_id.trim().to_string();
        if key_id.is_empty() {
            return Err(PayloadError::EmptyKeyId);
        }
        Ok(KeyOp {
            kind: req.kind,
            key_id,
            email: req.email,
        })
    }
}

impl PushPayload {
    /// Normalize into delivery-order ops. A single bad key id rejects the
    /// whole payload; push callers get a 400, not a partial apply.
    pub fn into_ops(self) -> Result<Vec<KeyOp>, PayloadError> {
        let tasks = match self {
            PushPayload::Batch { tasks } => tasks,
            PushPayload::Single(task) => vec![task],
            PushPayload::Many(tasks) => tasks,
        };
        tasks.into_iter().map(KeyOp::try_from).collect()
    }
}

/// Normalize a pulled batch. Unlike push, a malformed task from the control
/// plane cannot be bounced back with a 400; it is dropped with a warning and
/// the rest of the batch proceeds in order.
pub fn normalize_pulled(tasks: &[Task]) -> Vec<KeyOp> {
    tasks
        .iter()
        .filter_map(|t| {
            let key_id = t.key_id.trim();
            if key_id.is_empty() {
                tracing::warn!(task_id = t.task_id, "pulled task has empty key id, skipping");
                return None;
            }
            Some(KeyOp {
                kind: t.kind,
                key_id: key_id.to_string(),
                email: t.email.clone(),
            })
        })
        .collect()
}
