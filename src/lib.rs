//! # Tessera
//!
//! A tenant-aware registry of generative-text capabilities and a declarative
//! pipeline orchestrator for composing them into multi-step workflows.
//!
//! ## Features
//!
//! - **Typed capability units**: each capability is one remote generation call
//!   with a declared input/output contract and fixed model parameters
//! - **Declarative pipelines**: sequential steps, parallel groups, and bounded
//!   data-driven fan-out, composed at startup and executed on demand
//! - **Tenant isolation**: per-tenant credential resolution with tier policy,
//!   resolved fresh for every invocation
//! - **Partial-failure policy**: abort, skip, or retry per step, with an
//!   auditable per-run trace of tokens, durations, and outcomes
//! - **Pluggable provider**: the remote generator is a trait; the bundled
//!   HTTP client is feature-gated (`http`)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tessera::prelude::*;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn run(generator: Arc<dyn TextGenerator>) {
//! // Register capabilities once at startup
//! let sink = Arc::new(MemoryExecutionLog::new());
//! let mut registry = CapabilityRegistry::new(generator, sink, "gemini-2.5-flash");
//! registry.register(
//!     CapabilityDescriptor::new("strategy", "Content Strategy", CapabilityCategory::Strategy)
//!         .instruction("Plan a month of editorial content for the given brand.")
//!         .max_output_tokens(4096),
//! );
//!
//! // Wire tenant-aware credential resolution
//! let resolver = Arc::new(CredentialResolver::new(
//!     Credential::new("platform-key"),
//!     Arc::new(InMemoryTenantStore::new()),
//! ));
//!
//! // Declare a pipeline and run it
//! let mut orchestrator = PipelineOrchestrator::new(Arc::new(registry), resolver);
//! orchestrator.register_pipeline(
//!     PipelineDefinition::new("monthly_plan", "Monthly Plan")
//!         .step(
//!             Step::new("plan", "strategy")
//!                 .literal_input(json!({"brand": "Acme"}))
//!                 .output_key("plan"),
//!         ),
//! );
//!
//! let result = orchestrator.run("monthly_plan", Default::default()).await;
//! println!("spent {} tokens over {} steps", result.total_tokens, result.log.len());
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`registry`]: capability descriptors, the invoker, structured extraction,
//!   and the execution trace sink
//! - [`pipeline`]: pipeline definitions and the orchestrator
//! - [`tenant`]: tenant settings and credential resolution
//! - [`provider`]: the text-generation boundary (trait + error taxonomy)
//! - [`prelude`]: commonly used types (import with `use tessera::prelude::*`)

// ============================================================================
// Modules
// ============================================================================

pub mod pipeline;
pub mod provider;
pub mod registry;
pub mod tenant;

// ============================================================================
// Public Re-exports - Granular Imports
// ============================================================================

// Registry
pub use registry::CapabilityRegistry;
pub use registry::descriptor::{CapabilityCategory, CapabilityDescriptor, ModelParams};
pub use registry::extract::{ExtractError, extract_structured};
pub use registry::log::{ExecutionLogEntry, ExecutionSink, MemoryExecutionLog, NullExecutionSink};
pub use registry::result::CapabilityResult;

// Pipelines
pub use pipeline::orchestrator::PipelineOrchestrator;
pub use pipeline::{
    ErrorPolicy, ForEach, PipelineContext, PipelineDefinition, PipelineLogEntry, PipelineNode,
    PipelineResult, PipelineStore, Step, StepInput, StepStatus, TENANT_ID_KEY,
};

// Tenancy
pub use tenant::{
    CredentialError, CredentialResolver, InMemoryTenantStore, SubscriptionTier, TenantSettings,
    TenantStore,
};

// Provider boundary
pub use provider::{
    Credential, GenerationRequest, GenerationResponse, ProviderError, TextGenerator,
};

#[cfg(feature = "http")]
pub use provider::http::GeminiGenerator;

// ============================================================================
// Prelude Module - Convenient Bulk Imports
// ============================================================================

/// The main prelude: everything needed to register capabilities, declare
/// pipelines, and run them.
///
/// # Example
/// ```rust
/// use tessera::prelude::*;
/// ```
pub mod prelude {
    pub use super::{
        CapabilityCategory,
        CapabilityDescriptor,
        // Registry
        CapabilityRegistry,
        CapabilityResult,
        // Provider
        Credential,
        CredentialResolver,
        ErrorPolicy,
        ExecutionLogEntry,
        ExecutionSink,
        ForEach,
        GenerationRequest,
        GenerationResponse,
        InMemoryTenantStore,
        MemoryExecutionLog,
        ModelParams,
        PipelineContext,
        PipelineDefinition,
        // Pipelines
        PipelineOrchestrator,
        PipelineResult,
        ProviderError,
        Step,
        StepStatus,
        // Tenancy
        SubscriptionTier,
        TenantSettings,
        TenantStore,
        TextGenerator,
    };

    #[cfg(feature = "http")]
    pub use super::GeminiGenerator;
}

// ============================================================================
// Re-export commonly used external types for convenience
// ============================================================================

pub use serde_json::Value as JsonValue;
pub use std::collections::HashMap;

// ============================================================================
// Library Metadata
// ============================================================================

/// The version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The name of this crate.
pub const NAME: &str = env!("CARGO_PKG_NAME");
