//! Capability catalogue and invoker.
//!
//! The registry holds every [`CapabilityDescriptor`] registered at startup and
//! turns `invoke` calls into exactly one provider round trip each: build the
//! request from the descriptor, fire it, recover a structured payload from
//! whatever text came back, and emit a uniform [`CapabilityResult`] plus one
//! [`ExecutionLogEntry`]. Retrying is deliberately not this layer's job.

pub mod descriptor;
pub mod extract;
pub mod log;
pub mod result;

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::provider::{Credential, GenerationRequest, TextGenerator};
use crate::tenant::CredentialResolver;
use self::descriptor::CapabilityDescriptor;
use self::extract::extract_structured;
use self::log::{ExecutionLogEntry, ExecutionSink};
use self::result::CapabilityResult;

/// The capability descriptor store plus invoker.
pub struct CapabilityRegistry {
    descriptors: HashMap<String, CapabilityDescriptor>,
    generator: Arc<dyn TextGenerator>,
    sink: Arc<dyn ExecutionSink>,
    /// Fixed model identifier used for every request.
    model: String,
}

impl CapabilityRegistry {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        sink: Arc<dyn ExecutionSink>,
        model: impl Into<String>,
    ) -> Self {
        CapabilityRegistry {
            descriptors: HashMap::new(),
            generator,
            sink,
            model: model.into(),
        }
    }

    /// Add or replace a descriptor by id. Registration happens once at
    /// process start; replacing an id is legal but suspicious, so it warns.
    pub fn register(&mut self, descriptor: CapabilityDescriptor) {
        if self.descriptors.contains_key(&descriptor.id) {
            ::log::warn!(
                "capability '{}' was already registered, replacing it",
                descriptor.id
            );
        }
        self.descriptors.insert(descriptor.id.clone(), descriptor);
    }

    pub fn get(&self, id: &str) -> Option<&CapabilityDescriptor> {
        self.descriptors.get(id)
    }

    pub fn capability_ids(&self) -> impl Iterator<Item = &str> {
        self.descriptors.keys().map(String::as_str)
    }

    /// Invoke one capability with an already-resolved credential.
    ///
    /// Never returns `Err`: every failure mode (unknown id, transport error,
    /// unparseable response) is folded into the result envelope so the
    /// orchestrator can apply policy uniformly.
    pub async fn invoke(&self, id: &str, input: &Value, credential: &Credential) -> CapabilityResult {
        let started = Instant::now();

        let Some(descriptor) = self.descriptors.get(id) else {
            let result = CapabilityResult::failed(
                format!("capability '{}' is not registered", id),
                0,
                elapsed_ms(started),
            );
            self.record(id, input, &result);
            return result;
        };

        let request = GenerationRequest {
            system: descriptor.instruction.clone(),
            user: build_user_payload(input),
            model: self.model.clone(),
            temperature: descriptor.params.temperature,
            max_output_tokens: descriptor.params.max_output_tokens,
        };

        let result = match self.generator.generate(request, credential).await {
            Err(e) => CapabilityResult::failed(e.to_string(), 0, elapsed_ms(started)),
            Ok(response) => {
                // Tokens were spent whether or not the text parses.
                let tokens = response.total_tokens();
                match extract_structured(&response.text) {
                    Ok(output) => CapabilityResult::succeeded(output, tokens, elapsed_ms(started)),
                    Err(e) => CapabilityResult::failed(e.to_string(), tokens, elapsed_ms(started)),
                }
            }
        };

        self.record(id, input, &result);
        result
    }

    /// Tenant-scoped invocation: resolve the credential first and fail fast
    /// before spending a network round trip.
    pub async fn invoke_for_tenant(
        &self,
        id: &str,
        input: &Value,
        tenant_id: &str,
        resolver: &CredentialResolver,
    ) -> CapabilityResult {
        match resolver.resolve(tenant_id) {
            Ok(credential) => self.invoke(id, input, &credential).await,
            Err(e) => {
                let result = CapabilityResult::failed(e.to_string(), 0, 0);
                self.record(id, input, &result);
                result
            }
        }
    }

    fn record(&self, id: &str, input: &Value, result: &CapabilityResult) {
        self.sink.record(ExecutionLogEntry {
            capability_id: id.to_string(),
            input: input.clone(),
            output: result.output.clone(),
            tokens_used: result.tokens_used,
            duration_ms: result.duration_ms,
            success: result.success,
            error: result.error.clone(),
            timestamp: chrono::Utc::now(),
        });
    }
}

/// Serialize the input and pin the response format down.
fn build_user_payload(input: &Value) -> String {
    format!(
        "Input:\n{}\n\nRespond ONLY with a single valid JSON value matching the declared \
         output shape. No prose, no markdown fences.",
        serde_json::to_string_pretty(input).unwrap_or_else(|_| input.to_string())
    )
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
