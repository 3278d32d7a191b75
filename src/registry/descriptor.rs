//! Declarative metadata for a single capability unit.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Broad grouping used to organise the catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityCategory {
    Strategy,
    Copy,
    Visual,
    Qa,
    Utility,
}

/// Model parameters fixed per capability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    /// Sampling temperature.
    pub temperature: f32,
    /// Output token ceiling.
    pub max_output_tokens: u32,
}

impl Default for ModelParams {
    fn default() -> Self {
        ModelParams {
            temperature: 0.7,
            max_output_tokens: 2048,
        }
    }
}

/// One declaratively-described unit of work backed by a single remote
/// generation call.
///
/// Created at process start, identified by `id` (unique within a registry),
/// never mutated after registration. The input/output shapes document the
/// contract for callers and tooling; they are not enforced at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    pub id: String,
    pub name: String,
    pub category: CapabilityCategory,
    /// Expected shape of the input payload.
    pub input_shape: Value,
    /// Expected shape of the structured output.
    pub output_shape: Value,
    /// The natural-language instruction template, treated as opaque data.
    pub instruction: String,
    pub params: ModelParams,
}

impl CapabilityDescriptor {
    /// Start building a descriptor. `instruction` is required before
    /// registration; everything else has a sensible default.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: CapabilityCategory,
    ) -> Self {
        CapabilityDescriptor {
            id: id.into(),
            name: name.into(),
            category,
            input_shape: Value::Null,
            output_shape: Value::Null,
            instruction: String::new(),
            params: ModelParams::default(),
        }
    }

    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    pub fn input_shape(mut self, shape: Value) -> Self {
        self.input_shape = shape;
        self
    }

    pub fn output_shape(mut self, shape: Value) -> Self {
        self.output_shape = shape;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.params.temperature = temperature;
        self
    }

    pub fn max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.params.max_output_tokens = max_output_tokens;
        self
    }
}
