//! Observability trail for capability invocations.
//!
//! Rather than a process-wide mutable list, the registry writes to an
//! injected, caller-owned [`ExecutionSink`], so traces stay scoped to
//! whoever wired the registry and concurrent pipeline runs never interleave
//! into hidden global state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Mutex;

/// One record per invocation, success or failure. Purely for
/// observability/debugging; correctness never depends on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    pub capability_id: String,
    pub input: Value,
    pub output: Option<Value>,
    pub tokens_used: u32,
    pub duration_ms: u64,
    pub success: bool,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Destination for execution records.
///
/// Implementations must tolerate concurrent `record` calls; parallel group
/// members and fan-out batches invoke capabilities concurrently.
pub trait ExecutionSink: Send + Sync {
    fn record(&self, entry: ExecutionLogEntry);
}

/// Simple in-memory collector, mostly for tests and local debugging.
pub struct MemoryExecutionLog {
    entries: Mutex<Vec<ExecutionLogEntry>>,
}

impl MemoryExecutionLog {
    pub fn new() -> Self {
        MemoryExecutionLog {
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn entries(&self) -> Vec<ExecutionLogEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryExecutionLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionSink for MemoryExecutionLog {
    fn record(&self, entry: ExecutionLogEntry) {
        self.entries.lock().unwrap().push(entry);
    }
}

/// Sink that drops everything. For callers that do their own tracing.
pub struct NullExecutionSink;

impl ExecutionSink for NullExecutionSink {
    fn record(&self, _entry: ExecutionLogEntry) {}
}
