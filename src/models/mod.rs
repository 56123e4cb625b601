// Domain models (wire formats match the control plane)

mod heartbeat;
mod task;

pub use heartbeat::{
    CpuUtilization, Gauges, HeartbeatRecord, LinkRates, PingStats, RawCounters, SampleWindow,
};
pub use task::{KeyOp, PayloadError, PushPayload, Task, TaskKind, TaskRequest, normalize_pulled};
