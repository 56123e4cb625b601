// Control-plane task state machine: pending -> delivered -> done | failed

use crate::models::{Task, TaskKind};

/// Delivery state of a queued task. `Delivered` is set by pull, the terminal
/// states only by explicit acknowledgment; nothing is ever inferred or timed
/// out, so a delivered task with a lost ack stays delivered indefinitely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Delivered,
    Done,
    Failed,
}

#[derive(Debug, Clone)]
pub struct QueuedTask {
    pub task_id: i64,
    pub server_id: String,
    pub kind: TaskKind,
    pub key_id: String,
    pub email: Option<String>,
    pub payload: Option<String>,
    pub status: TaskStatus,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TaskQueueError {
    #[error("a {kind:?} task for this server and key is already pending or delivered")]
    Duplicate { kind: TaskKind },
    #[error("task {0} not found")]
    UnknownTask(i64),
    #[error("status {0:?} is not a terminal acknowledgment")]
    NotTerminal(TaskStatus),
}

/// In-memory task queue, id-ordered. The agent only ever sees this through
/// the pull and ack endpoints; tests exercise it directly.
#[derive(Debug)]
pub struct TaskQueue {
    next_id: i64,
    tasks: Vec<QueuedTask>,
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            tasks: Vec::new(),
        }
    }

    /// Enqueue a task. Creation is rejected while a pending or delivered
    /// task already exists for the same {server, key, kind}; terminal tasks
    /// do not block re-creation.
    pub fn create(
        &mut self,
        server_id: &str,
        kind: TaskKind,
        key_id: &str,
        email: Option<String>,
    ) -> Result<i64, TaskQueueError> {
        let in_flight = self.tasks.iter().any(|t| {
            t.server_id == server_id
                && t.key_id == key_id
                && t.kind == kind
                && matches!(t.status, TaskStatus::Pending | TaskStatus::Delivered)
        });
        if in_flight {
            return Err(TaskQueueError::Duplicate { kind });
        }
        let task_id = self.next_id;
        self.next_id += 1;
        self.tasks.push(QueuedTask {
            task_id,
            server_id: server_id.to_string(),
            kind,
            key_id: key_id.to_string(),
            email,
            payload: None,
            status: TaskStatus::Pending,
        });
        Ok(task_id)
    }

    /// Return a server's pending tasks in id order, flipping each to
    /// delivered as part of the response. A response lost after this point
    /// strands the tasks (accepted at-most-once gap).
    pub fn pull(&mut self, server_id: &str) -> Vec<Task> {
        let mut out = Vec::new();
        for t in self
            .tasks
            .iter_mut()
            .filter(|t| t.server_id == server_id && t.status == TaskStatus::Pending)
        {
            t.status = TaskStatus::Delivered;
            out.push(Task {
                kind: t.kind,
                key_id: t.key_id.clone(),
                email: t.email.clone(),
                payload: t.payload.clone(),
                task_id: t.task_id,
            });
        }
        out
    }

    /// Record an explicit terminal acknowledgment. Unknown ids and
    /// non-terminal statuses are rejected.
    pub fn ack(&mut self, task_id: i64, status: TaskStatus) -> Result<(), TaskQueueError> {
        if !matches!(status, TaskStatus::Done | TaskStatus::Failed) {
            return Err(TaskQueueError::NotTerminal(status));
        }
        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.task_id == task_id)
            .ok_or(TaskQueueError::UnknownTask(task_id))?;
        task.status = status;
        Ok(())
    }

    pub fn get(&self, task_id: i64) -> Option<&QueuedTask> {
        self.tasks.iter().find(|t| t.task_id == task_id)
    }
}
