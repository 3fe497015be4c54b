//! Provider registry
//!
//! Fixed, sorted mapping from provider key to display name and provider
//! implementation. Built once at startup.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::provider::{IdentityProvider, OAuth2Provider, preset};
use crate::config::AppConfig;
use crate::error::AppError;

/// A provider available for login
#[derive(Clone)]
pub struct RegisteredProvider {
    pub display_name: String,
    pub provider: Arc<dyn IdentityProvider>,
}

impl std::fmt::Debug for RegisteredProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredProvider")
            .field("display_name", &self.display_name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, RegisteredProvider>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build OAuth providers for every configured entry
    ///
    /// # Errors
    /// Returns `AppError::Config` if any provider cannot be constructed
    pub fn from_config(config: &AppConfig, http_client: &reqwest::Client) -> Result<Self, AppError> {
        let mut registry = Self::new();

        for (key, provider_config) in &config.auth.providers {
            let provider =
                OAuth2Provider::from_config(key, provider_config, config, http_client.clone())?;
            let display_name = provider_config
                .display_name
                .clone()
                .or_else(|| preset(key).map(|p| p.display_name.to_string()))
                .unwrap_or_else(|| key.clone());

            registry = registry.with_provider(key, display_name, Arc::new(provider));
        }

        tracing::info!(providers = ?registry.keys(), "Login providers registered");
        Ok(registry)
    }

    /// Register a provider, replacing any previous entry for `key`
    pub fn with_provider(
        mut self,
        key: impl Into<String>,
        display_name: impl Into<String>,
        provider: Arc<dyn IdentityProvider>,
    ) -> Self {
        self.providers.insert(
            key.into(),
            RegisteredProvider {
                display_name: display_name.into(),
                provider,
            },
        );
        self
    }

    /// Look up a provider by key
    ///
    /// # Errors
    /// Returns `AppError::UnknownProvider` for unregistered keys
    pub fn get(&self, key: &str) -> Result<&RegisteredProvider, AppError> {
        self.providers
            .get(key)
            .ok_or_else(|| AppError::UnknownProvider(key.to_string()))
    }

    /// Provider keys in sorted order
    pub fn keys(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    /// Provider key to display name
    pub fn display_names(&self) -> BTreeMap<String, String> {
        self.providers
            .iter()
            .map(|(key, entry)| (key.clone(), entry.display_name.clone()))
            .collect()
    }
}
