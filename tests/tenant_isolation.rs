//! Tier policy and credential isolation, observed from the provider's side.
//!
//! The provider records which key every call arrived with, so these tests
//! verify the resolution policy end to end rather than by inspecting the
//! resolver alone.

use async_trait::async_trait;
use serde_json::json;
use std::sync::{Arc, Mutex};
use tessera::prelude::*;

/// Provider that remembers the credential each call used.
struct KeyRecordingProvider {
    seen_keys: Mutex<Vec<String>>,
}

impl KeyRecordingProvider {
    fn new() -> Self {
        KeyRecordingProvider {
            seen_keys: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl TextGenerator for KeyRecordingProvider {
    async fn generate(
        &self,
        _request: GenerationRequest,
        credential: &Credential,
    ) -> Result<GenerationResponse, ProviderError> {
        self.seen_keys
            .lock()
            .unwrap()
            .push(credential.expose().to_string());
        Ok(GenerationResponse {
            text: r#"{"ok": true}"#.to_string(),
            input_tokens: 1,
            output_tokens: 1,
        })
    }
}

fn build_world() -> (
    Arc<CapabilityRegistry>,
    Arc<CredentialResolver>,
    Arc<KeyRecordingProvider>,
) {
    let provider = Arc::new(KeyRecordingProvider::new());
    let sink = Arc::new(MemoryExecutionLog::new());
    let mut registry = CapabilityRegistry::new(
        Arc::clone(&provider) as Arc<dyn TextGenerator>,
        sink,
        "test-model",
    );
    registry.register(
        CapabilityDescriptor::new("noop", "No-op", CapabilityCategory::Utility)
            .instruction("Reply with JSON."),
    );

    let mut tenants = InMemoryTenantStore::new();
    tenants.insert(
        "starter_with_key",
        TenantSettings {
            tier: SubscriptionTier::Starter,
            api_key: Some("starter-own-key".to_string()),
        },
    );
    tenants.insert(
        "pro_without_key",
        TenantSettings {
            tier: SubscriptionTier::Professional,
            api_key: None,
        },
    );
    tenants.insert(
        "pro_with_key",
        TenantSettings {
            tier: SubscriptionTier::Professional,
            api_key: Some("pro-own-key".to_string()),
        },
    );

    let resolver = Arc::new(CredentialResolver::new(
        Credential::new("platform-key"),
        Arc::new(tenants),
    ));

    (Arc::new(registry), resolver, provider)
}

#[tokio::test]
async fn test_base_tier_custom_key_is_ignored_by_policy() {
    let (registry, resolver, provider) = build_world();

    let result = registry
        .invoke_for_tenant("noop", &json!({}), "starter_with_key", &resolver)
        .await;

    assert!(result.success);
    assert_eq!(
        provider.seen_keys.lock().unwrap().as_slice(),
        &["platform-key".to_string()]
    );
}

#[tokio::test]
async fn test_higher_tier_without_key_falls_back_to_platform() {
    let (registry, resolver, provider) = build_world();

    let result = registry
        .invoke_for_tenant("noop", &json!({}), "pro_without_key", &resolver)
        .await;

    assert!(result.success);
    assert_eq!(
        provider.seen_keys.lock().unwrap().as_slice(),
        &["platform-key".to_string()]
    );
}

#[tokio::test]
async fn test_higher_tier_with_key_uses_it() {
    let (registry, resolver, provider) = build_world();

    let result = registry
        .invoke_for_tenant("noop", &json!({}), "pro_with_key", &resolver)
        .await;

    assert!(result.success);
    assert_eq!(
        provider.seen_keys.lock().unwrap().as_slice(),
        &["pro-own-key".to_string()]
    );
}

#[tokio::test]
async fn test_pipeline_run_scopes_every_invocation_to_the_tenant() {
    let (registry, resolver, provider) = build_world();

    let mut orchestrator = PipelineOrchestrator::new(registry, resolver);
    orchestrator.register_pipeline(
        PipelineDefinition::new("p", "P")
            .step(
                Step::new("seed", "noop")
                    .literal_input(json!([1, 2, 3]))
                    .output_key("seeded"),
            )
            .for_each(
                ForEach::new("fan", "items", "noop")
                    .output_key("fanned")
                    .max_concurrency(2),
            ),
    );

    let mut context = PipelineContext::new();
    context.insert("tenant_id".to_string(), json!("pro_with_key"));
    context.insert("items".to_string(), json!([1, 2, 3]));

    let result = orchestrator.run("p", context).await;

    assert!(result.success);
    let seen = provider.seen_keys.lock().unwrap();
    assert_eq!(seen.len(), 4);
    assert!(seen.iter().all(|key| key == "pro-own-key"));
}

#[tokio::test]
async fn test_missing_platform_key_fails_fast_without_network() {
    let provider = Arc::new(KeyRecordingProvider::new());
    let sink = Arc::new(MemoryExecutionLog::new());
    let mut registry = CapabilityRegistry::new(
        Arc::clone(&provider) as Arc<dyn TextGenerator>,
        sink,
        "test-model",
    );
    registry.register(
        CapabilityDescriptor::new("noop", "No-op", CapabilityCategory::Utility)
            .instruction("Reply with JSON."),
    );
    let resolver = CredentialResolver::new(
        Credential::new(""),
        Arc::new(InMemoryTenantStore::new()),
    );

    let result = registry
        .invoke_for_tenant("noop", &json!({}), "anyone", &resolver)
        .await;

    assert!(!result.success);
    assert!(result.error.as_deref().unwrap().contains("no usable credential"));
    assert!(provider.seen_keys.lock().unwrap().is_empty());
}
