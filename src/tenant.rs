//! Per-tenant credential resolution.
//!
//! One tenant's workflow must never run on another tenant's key or budget.
//! Resolution happens fresh for every invocation and the resulting
//! [`Credential`] lives only for that call.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::provider::Credential;

/// Subscription tiers. `Starter` is the base tier: tenant-supplied keys are
/// ignored by policy there, even if configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    Starter,
    Professional,
    Enterprise,
}

impl SubscriptionTier {
    pub fn allows_custom_key(self) -> bool {
        !matches!(self, SubscriptionTier::Starter)
    }
}

/// The slice of tenant configuration this crate reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantSettings {
    pub tier: SubscriptionTier,
    /// Tenant-supplied provider key, if any.
    pub api_key: Option<String>,
}

/// Read-only lookup of tenant configuration.
pub trait TenantStore: Send + Sync {
    fn settings(&self, tenant_id: &str) -> Option<TenantSettings>;
}

/// Map-backed store for tests and single-process deployments.
pub struct InMemoryTenantStore {
    tenants: HashMap<String, TenantSettings>,
}

impl InMemoryTenantStore {
    pub fn new() -> Self {
        InMemoryTenantStore {
            tenants: HashMap::new(),
        }
    }

    pub fn insert(&mut self, tenant_id: impl Into<String>, settings: TenantSettings) {
        self.tenants.insert(tenant_id.into(), settings);
    }
}

impl Default for InMemoryTenantStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TenantStore for InMemoryTenantStore {
    fn settings(&self, tenant_id: &str) -> Option<TenantSettings> {
        self.tenants.get(tenant_id).cloned()
    }
}

#[derive(Debug, Error)]
pub enum CredentialError {
    /// Neither the tenant nor the platform has a usable key. A configuration
    /// error: surfaced immediately, never retried.
    #[error("no usable credential for tenant '{tenant_id}'")]
    NoUsableCredential { tenant_id: String },
}

/// Decides which provider key an invocation runs on.
pub struct CredentialResolver {
    platform_key: Credential,
    store: std::sync::Arc<dyn TenantStore>,
}

impl CredentialResolver {
    pub fn new(platform_key: Credential, store: std::sync::Arc<dyn TenantStore>) -> Self {
        CredentialResolver { platform_key, store }
    }

    /// Resolve the credential for `tenant_id`.
    ///
    /// Policy: empty/unknown tenant → platform default. Base tier → platform
    /// default regardless of any configured key. Higher tiers → the tenant's
    /// key when present and non-empty, else the platform default.
    pub fn resolve(&self, tenant_id: &str) -> Result<Credential, CredentialError> {
        if tenant_id.is_empty() {
            return self.platform_default(tenant_id);
        }

        let Some(settings) = self.store.settings(tenant_id) else {
            return self.platform_default(tenant_id);
        };

        if settings.tier.allows_custom_key() {
            if let Some(key) = settings.api_key.filter(|k| !k.is_empty()) {
                return Ok(Credential::new(key));
            }
        }

        self.platform_default(tenant_id)
    }

    fn platform_default(&self, tenant_id: &str) -> Result<Credential, CredentialError> {
        if self.platform_key.is_empty() {
            return Err(CredentialError::NoUsableCredential {
                tenant_id: tenant_id.to_string(),
            });
        }
        Ok(self.platform_key.clone())
    }
}
