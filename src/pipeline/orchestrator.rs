//! Walks a [`PipelineDefinition`] and turns it into capability invocations.
//!
//! Top-level nodes run strictly in declaration order. Parallel groups and
//! fan-out batches run their members concurrently but merge results back into
//! the context only after everything in the node has settled, so the context
//! is never mutated concurrently.

use futures::future::join_all;
use futures::stream::{FuturesOrdered, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::pipeline::{
    ErrorPolicy, ForEach, PipelineContext, PipelineDefinition, PipelineLogEntry, PipelineNode,
    PipelineResult, PipelineStore, Step, StepStatus, TENANT_ID_KEY,
};
use crate::registry::CapabilityRegistry;
use crate::registry::result::CapabilityResult;
use crate::tenant::CredentialResolver;

const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

/// Outcome of one step: the log line plus the value to merge, if any.
struct StepOutcome {
    entry: PipelineLogEntry,
    output: Option<Value>,
}

/// Executes registered pipelines against a capability registry.
pub struct PipelineOrchestrator {
    registry: Arc<CapabilityRegistry>,
    resolver: Arc<CredentialResolver>,
    pipelines: PipelineStore,
    retry_base_delay: Duration,
}

impl PipelineOrchestrator {
    pub fn new(registry: Arc<CapabilityRegistry>, resolver: Arc<CredentialResolver>) -> Self {
        PipelineOrchestrator {
            registry,
            resolver,
            pipelines: PipelineStore::new(),
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
        }
    }

    /// Override the backoff base. Attempt `n` failing waits `base * n` before
    /// attempt `n + 1`.
    pub fn retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    pub fn register_pipeline(&mut self, definition: PipelineDefinition) {
        self.pipelines.register(definition);
    }

    pub fn pipeline(&self, id: &str) -> Option<&PipelineDefinition> {
        self.pipelines.get(id)
    }

    /// Run a pipeline to completion (or abort) and return the aggregate.
    ///
    /// The tenant for the whole run is read from the context key
    /// [`TENANT_ID_KEY`]; absent or empty means the platform credential.
    pub async fn run(&self, pipeline_id: &str, initial_context: PipelineContext) -> PipelineResult {
        let run_id = Uuid::new_v4();

        let Some(definition) = self.pipelines.get(pipeline_id) else {
            return PipelineResult {
                success: false,
                run_id,
                context: initial_context,
                log: Vec::new(),
                total_tokens: 0,
                total_duration_ms: 0,
                error: Some(format!("pipeline '{}' is not registered", pipeline_id)),
            };
        };

        let tenant = initial_context
            .get(TENANT_ID_KEY)
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        let mut context = initial_context;
        let mut log: Vec<PipelineLogEntry> = Vec::new();

        for node in &definition.nodes {
            match node {
                PipelineNode::Step(step) => {
                    let outcome = self.run_step(step, &context, &tenant).await;
                    let aborted = self.merge_step(step, outcome, &mut context, &mut log);
                    if let Some(error) = aborted {
                        return finish(run_id, false, context, log, Some(error));
                    }
                }
                PipelineNode::ParallelGroup { steps, .. } => {
                    // Every member sees the pre-group context; nobody sees a
                    // sibling's output.
                    let snapshot = context.clone();
                    let outcomes = join_all(
                        steps
                            .iter()
                            .map(|step| self.run_step(step, &snapshot, &tenant)),
                    )
                    .await;

                    let mut abort_error = None;
                    for (step, outcome) in steps.iter().zip(outcomes) {
                        let aborted = self.merge_step(step, outcome, &mut context, &mut log);
                        if abort_error.is_none() {
                            abort_error = aborted;
                        }
                    }
                    if let Some(error) = abort_error {
                        return finish(run_id, false, context, log, Some(error));
                    }
                }
                PipelineNode::ForEach(for_each) => {
                    self.run_for_each(for_each, &mut context, &mut log, &tenant)
                        .await;
                }
            }
        }

        finish(run_id, true, context, log, None)
    }

    /// Merge a step outcome into context and log. Returns the abort error if
    /// the step failed under [`ErrorPolicy::Abort`].
    fn merge_step(
        &self,
        step: &Step,
        outcome: StepOutcome,
        context: &mut PipelineContext,
        log: &mut Vec<PipelineLogEntry>,
    ) -> Option<String> {
        if let Some(output) = outcome.output {
            if !step.output_key.is_empty() {
                context.insert(step.output_key.clone(), output);
            }
        }

        let abort_error = if outcome.entry.status == StepStatus::Error
            && step.on_error == ErrorPolicy::Abort
        {
            Some(format!(
                "step '{}' failed: {}",
                step.id,
                outcome.entry.error.as_deref().unwrap_or("unknown error")
            ))
        } else {
            None
        };

        log.push(outcome.entry);
        abort_error
    }

    /// Execute a single step: condition gate, credential resolution, then up
    /// to `attempts` invocations with increasing backoff.
    async fn run_step(&self, step: &Step, context: &PipelineContext, tenant: &str) -> StepOutcome {
        if let Some(condition) = &step.condition {
            if !condition(context) {
                return StepOutcome {
                    entry: PipelineLogEntry {
                        node_id: step.id.clone(),
                        capability_id: step.capability.clone(),
                        status: StepStatus::Skipped,
                        tokens_used: 0,
                        duration_ms: 0,
                        error: None,
                    },
                    output: None,
                };
            }
        }

        let input = step.input.resolve(context);

        let mut tokens_used = 0u32;
        let mut duration_ms = 0u64;
        let mut last_error = None;

        for attempt in 1..=step.attempts {
            // Resolved fresh for every attempt; a missing credential is a
            // configuration error and is never retried.
            let credential = match self.resolver.resolve(tenant) {
                Ok(credential) => credential,
                Err(e) => {
                    last_error = Some(e.to_string());
                    break;
                }
            };

            let result = self.registry.invoke(&step.capability, &input, &credential).await;
            tokens_used += result.tokens_used;
            duration_ms += result.duration_ms;

            if result.success {
                return StepOutcome {
                    entry: PipelineLogEntry {
                        node_id: step.id.clone(),
                        capability_id: step.capability.clone(),
                        status: StepStatus::Success,
                        tokens_used,
                        duration_ms,
                        error: None,
                    },
                    output: result.output,
                };
            }

            last_error = result.error;
            if attempt < step.attempts {
                log::debug!(
                    "step '{}' attempt {}/{} failed, backing off",
                    step.id,
                    attempt,
                    step.attempts
                );
                tokio::time::sleep(self.retry_base_delay * attempt).await;
            }
        }

        StepOutcome {
            entry: PipelineLogEntry {
                node_id: step.id.clone(),
                capability_id: step.capability.clone(),
                status: StepStatus::Error,
                tokens_used,
                duration_ms,
                error: last_error.or_else(|| Some("step failed".to_string())),
            },
            output: None,
        }
    }

    /// Fan one capability out over an array in sequential batches of
    /// `max_concurrency` concurrent items. The output array is index-aligned
    /// with the input regardless of completion order.
    async fn run_for_each(
        &self,
        for_each: &ForEach,
        context: &mut PipelineContext,
        log: &mut Vec<PipelineLogEntry>,
        tenant: &str,
    ) {
        let Some(items) = context
            .get(&for_each.source_key)
            .and_then(Value::as_array)
            .cloned()
        else {
            log::error!(
                "fan-out '{}': context key '{}' is missing or not an array",
                for_each.id,
                for_each.source_key
            );
            log.push(PipelineLogEntry {
                node_id: for_each.id.clone(),
                capability_id: for_each.capability.clone(),
                status: StepStatus::Error,
                tokens_used: 0,
                duration_ms: 0,
                error: Some(format!(
                    "context key '{}' is missing or not an array",
                    for_each.source_key
                )),
            });
            // Downstream consumers tolerate gaps; give them an empty array.
            if !for_each.output_key.is_empty() {
                context.insert(for_each.output_key.clone(), Value::Array(Vec::new()));
            }
            return;
        };

        let indexed: Vec<(usize, Value)> = items.into_iter().enumerate().collect();
        let mut outputs: Vec<Value> = Vec::with_capacity(indexed.len());

        for batch in indexed.chunks(for_each.max_concurrency) {
            let mut in_flight: FuturesOrdered<_> = batch
                .iter()
                .map(|(index, item)| {
                    let payload = (for_each.item_input)(item, *index, context);
                    let index = *index;
                    async move {
                        let result = self.invoke_scoped(&for_each.capability, &payload, tenant).await;
                        (index, result)
                    }
                })
                .collect();

            while let Some((index, result)) = in_flight.next().await {
                log.push(PipelineLogEntry {
                    node_id: format!("{}[{}]", for_each.id, index),
                    capability_id: for_each.capability.clone(),
                    status: if result.success {
                        StepStatus::Success
                    } else {
                        StepStatus::Error
                    },
                    tokens_used: result.tokens_used,
                    duration_ms: result.duration_ms,
                    error: result.error,
                });
                // FuturesOrdered yields in submission order, which is input
                // order within the batch; batches themselves are sequential.
                outputs.push(result.output.unwrap_or(Value::Null));
            }
        }

        if !for_each.output_key.is_empty() {
            context.insert(for_each.output_key.clone(), Value::Array(outputs));
        }
    }

    async fn invoke_scoped(&self, capability: &str, input: &Value, tenant: &str) -> CapabilityResult {
        self.registry
            .invoke_for_tenant(capability, input, tenant, &self.resolver)
            .await
    }
}

fn finish(
    run_id: Uuid,
    success: bool,
    context: PipelineContext,
    log: Vec<PipelineLogEntry>,
    error: Option<String>,
) -> PipelineResult {
    let total_tokens = log.iter().map(|entry| entry.tokens_used).sum();
    let total_duration_ms = log.iter().map(|entry| entry.duration_ms).sum();
    PipelineResult {
        success,
        run_id,
        context,
        log,
        total_tokens,
        total_duration_ms,
        error,
    }
}
