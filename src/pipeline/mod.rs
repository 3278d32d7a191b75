//! Declarative pipeline definitions.
//!
//! A pipeline is a named, ordered list of [`PipelineNode`]s built once at
//! startup. Node kinds form a closed tagged union dispatched by `match`;
//! there is no duck-typing on shape. Execution lives in [`orchestrator`].

pub mod orchestrator;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// The run-scoped key→value accumulator threading data between steps.
/// Seeded by the caller, enriched by each node's declared output key, owned
/// by exactly one run.
pub type PipelineContext = HashMap<String, Value>;

/// Context key the orchestrator reads to scope a run to a tenant.
pub const TENANT_ID_KEY: &str = "tenant_id";

/// Function of the run context producing a step's input payload.
pub type ContextFn = Arc<dyn Fn(&PipelineContext) -> Value + Send + Sync>;

/// Boolean gate over the run context.
pub type ContextPredicate = Arc<dyn Fn(&PipelineContext) -> bool + Send + Sync>;

/// Per-item input builder for fan-out: (item, index, context) → payload.
pub type ItemFn = Arc<dyn Fn(&Value, usize, &PipelineContext) -> Value + Send + Sync>;

/// What a step feeds its capability.
#[derive(Clone)]
pub enum StepInput {
    /// A fixed payload, known at definition time.
    Literal(Value),
    /// Derived from the run context at execution time.
    FromContext(ContextFn),
}

impl StepInput {
    pub fn resolve(&self, context: &PipelineContext) -> Value {
        match self {
            StepInput::Literal(value) => value.clone(),
            StepInput::FromContext(f) => f(context),
        }
    }
}

/// What to do when a step's attempts are exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Fail the whole pipeline immediately.
    Abort,
    /// Record the failure and continue; the output key stays unset.
    Skip,
    /// Same continuation behaviour as `Skip`, but declared intent is that
    /// `attempts` was raised above 1.
    Retry,
}

/// A single capability invocation inside a pipeline.
#[derive(Clone)]
pub struct Step {
    pub id: String,
    pub capability: String,
    pub input: StepInput,
    pub output_key: String,
    pub condition: Option<ContextPredicate>,
    pub on_error: ErrorPolicy,
    /// Total invocation attempts, minimum 1. Values above 1 only make sense
    /// with [`ErrorPolicy::Retry`].
    pub attempts: u32,
}

impl Step {
    pub fn new(id: impl Into<String>, capability: impl Into<String>) -> Self {
        Step {
            id: id.into(),
            capability: capability.into(),
            input: StepInput::Literal(Value::Null),
            output_key: String::new(),
            condition: None,
            on_error: ErrorPolicy::Skip,
            attempts: 1,
        }
    }

    /// Fixed input payload.
    pub fn literal_input(mut self, input: Value) -> Self {
        self.input = StepInput::Literal(input);
        self
    }

    /// Input derived from the run context.
    pub fn input_from<F>(mut self, f: F) -> Self
    where
        F: Fn(&PipelineContext) -> Value + Send + Sync + 'static,
    {
        self.input = StepInput::FromContext(Arc::new(f));
        self
    }

    pub fn output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = key.into();
        self
    }

    /// Skip the step (status `Skipped`, zero cost) when the predicate is
    /// false against the current context.
    pub fn when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&PipelineContext) -> bool + Send + Sync + 'static,
    {
        self.condition = Some(Arc::new(predicate));
        self
    }

    pub fn on_error(mut self, policy: ErrorPolicy) -> Self {
        self.on_error = policy;
        self
    }

    /// Total invocation attempts (floor 1). The attempt loop runs for every
    /// policy; `on_error` only decides what happens once attempts are
    /// exhausted.
    pub fn attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }
}

/// Bounded concurrent invocation of one capability across an array.
#[derive(Clone)]
pub struct ForEach {
    pub id: String,
    /// Context key holding the array to iterate.
    pub source_key: String,
    pub capability: String,
    pub item_input: ItemFn,
    pub output_key: String,
    /// Batch size: items within a batch run concurrently, batches run
    /// strictly one after another.
    pub max_concurrency: usize,
}

impl ForEach {
    pub fn new(
        id: impl Into<String>,
        source_key: impl Into<String>,
        capability: impl Into<String>,
    ) -> Self {
        ForEach {
            id: id.into(),
            source_key: source_key.into(),
            capability: capability.into(),
            item_input: Arc::new(|item, _index, _context| item.clone()),
            output_key: String::new(),
            max_concurrency: 3,
        }
    }

    pub fn map<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, usize, &PipelineContext) -> Value + Send + Sync + 'static,
    {
        self.item_input = Arc::new(f);
        self
    }

    pub fn output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = key.into();
        self
    }

    pub fn max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }
}

/// The closed set of node kinds a pipeline is built from.
#[derive(Clone)]
pub enum PipelineNode {
    Step(Step),
    /// Steps executed concurrently against the same pre-group context
    /// snapshot; all must settle before the next node runs.
    ParallelGroup { id: String, steps: Vec<Step> },
    ForEach(ForEach),
}

impl PipelineNode {
    pub fn id(&self) -> &str {
        match self {
            PipelineNode::Step(step) => &step.id,
            PipelineNode::ParallelGroup { id, .. } => id,
            PipelineNode::ForEach(for_each) => &for_each.id,
        }
    }
}

/// A named, declarative composition of capability invocations.
#[derive(Clone)]
pub struct PipelineDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub nodes: Vec<PipelineNode>,
}

impl PipelineDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        PipelineDefinition {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            nodes: Vec::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn step(mut self, step: Step) -> Self {
        self.nodes.push(PipelineNode::Step(step));
        self
    }

    pub fn parallel(mut self, id: impl Into<String>, steps: Vec<Step>) -> Self {
        self.nodes.push(PipelineNode::ParallelGroup {
            id: id.into(),
            steps,
        });
        self
    }

    pub fn for_each(mut self, for_each: ForEach) -> Self {
        self.nodes.push(PipelineNode::ForEach(for_each));
        self
    }
}

/// Holds every pipeline registered at process start, keyed by id.
pub struct PipelineStore {
    pipelines: HashMap<String, PipelineDefinition>,
}

impl PipelineStore {
    pub fn new() -> Self {
        PipelineStore {
            pipelines: HashMap::new(),
        }
    }

    pub fn register(&mut self, definition: PipelineDefinition) {
        if self.pipelines.contains_key(&definition.id) {
            log::warn!(
                "pipeline '{}' was already registered, replacing it",
                definition.id
            );
        }
        self.pipelines.insert(definition.id.clone(), definition);
    }

    pub fn get(&self, id: &str) -> Option<&PipelineDefinition> {
        self.pipelines.get(id)
    }

    pub fn pipeline_ids(&self) -> impl Iterator<Item = &str> {
        self.pipelines.keys().map(String::as_str)
    }
}

impl Default for PipelineStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Status of one executed (or deliberately not executed) step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    /// Condition evaluated false; never collapsed into `Error`.
    Skipped,
    Error,
}

/// One line of the per-run trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineLogEntry {
    pub node_id: String,
    pub capability_id: String,
    pub status: StepStatus,
    pub tokens_used: u32,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Aggregated outcome of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    /// False only when the run aborted or the pipeline id was unknown.
    /// Per-step failures under `Skip`/`Retry` policies leave this true.
    pub success: bool,
    pub run_id: Uuid,
    pub context: PipelineContext,
    pub log: Vec<PipelineLogEntry>,
    pub total_tokens: u32,
    pub total_duration_ms: u64,
    pub error: Option<String>,
}
