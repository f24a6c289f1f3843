use std::collections::HashMap;

use crate::error::ReconcileError;
use crate::types::Provider;

/// Read-only provider lookups the resolver needs. Implementations are
/// expected to be in-memory; the reconciler never suspends.
pub trait ProviderDirectory: Send + Sync {
    fn by_uuid(&self, uuid: &str) -> Option<Provider>;
    fn by_identifier(&self, identifier: &str) -> Option<Provider>;
}

/// Plain list-backed directory. Adapters preload the providers an accession
/// references plus the fallback into one of these.
#[derive(Clone, Debug, Default)]
pub struct StaticProviderDirectory {
    providers: Vec<Provider>,
}

impl StaticProviderDirectory {
    pub fn new(providers: Vec<Provider>) -> Self {
        Self { providers }
    }

    pub fn insert(&mut self, provider: Provider) {
        if !self.providers.iter().any(|p| p.uuid == provider.uuid) {
            self.providers.push(provider);
        }
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl ProviderDirectory for StaticProviderDirectory {
    fn by_uuid(&self, uuid: &str) -> Option<Provider> {
        self.providers.iter().find(|p| p.uuid == uuid).cloned()
    }

    fn by_identifier(&self, identifier: &str) -> Option<Provider> {
        self.providers
            .iter()
            .find(|p| p.identifier == identifier)
            .cloned()
    }
}

/// Resolves external provider ids to local providers for one pass.
///
/// The cache lives exactly as long as the resolver; a new resolver is built
/// for every reconciliation pass.
pub struct ProviderResolver<'a> {
    directory: &'a dyn ProviderDirectory,
    fallback_identifier: &'a str,
    cache: HashMap<String, Provider>,
}

impl<'a> ProviderResolver<'a> {
    pub fn new(directory: &'a dyn ProviderDirectory, fallback_identifier: &'a str) -> Self {
        Self {
            directory,
            fallback_identifier,
            cache: HashMap::new(),
        }
    }

    /// Blank and unknown ids resolve to the fallback provider. Only a missing
    /// fallback is an error.
    pub fn resolve(&mut self, external_id: Option<&str>) -> Result<Provider, ReconcileError> {
        let key = external_id.map(str::trim).unwrap_or("").to_string();
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit.clone());
        }

        let found = if key.is_empty() {
            None
        } else {
            self.directory.by_uuid(&key)
        };

        let provider = match found {
            Some(p) => p,
            None => {
                tracing::debug!(external_id = %key, fallback = %self.fallback_identifier, "provider not found, using fallback");
                self.directory
                    .by_identifier(self.fallback_identifier)
                    .ok_or_else(|| ReconcileError::MissingFallbackProvider {
                        identifier: self.fallback_identifier.to_string(),
                    })?
            }
        };

        self.cache.insert(key, provider.clone());
        Ok(provider)
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}
