//! Registry of knowledge bases keyed by name and version.

use std::collections::HashMap;

use crate::error::{ExecutionError, RuleResult, ValidationError};

use super::{KnowledgeBase, KnowledgeBaseInstance};

/// Holds knowledge bases so callers can instantiate them by
/// `(name, version)`.
#[derive(Debug, Default, Clone)]
pub struct KnowledgeLibrary {
    bases: HashMap<(String, String), KnowledgeBase>,
}

impl KnowledgeLibrary {
    /// Creates an empty library.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `kb`. A `(name, version)` pair can only be registered once.
    pub fn add(&mut self, kb: KnowledgeBase) -> Result<(), ValidationError> {
        let key = (kb.name().to_string(), kb.version().to_string());
        if self.bases.contains_key(&key) {
            return Err(ValidationError::DuplicateKnowledgeBase {
                name: key.0,
                version: key.1,
            });
        }
        tracing::debug!(
            knowledge_base = kb.name(),
            version = kb.version(),
            rules = kb.len(),
            fingerprint = kb.fingerprint(),
            "knowledge base registered"
        );
        self.bases.insert(key, kb);
        Ok(())
    }

    /// Looks up a registered knowledge base.
    #[must_use]
    pub fn get(&self, name: &str, version: &str) -> Option<&KnowledgeBase> {
        self.bases.get(&(name.to_string(), version.to_string()))
    }

    /// Creates a fresh instance of a registered knowledge base.
    pub fn new_instance(&self, name: &str, version: &str) -> RuleResult<KnowledgeBaseInstance> {
        self.get(name, version)
            .map(KnowledgeBase::new_instance)
            .ok_or_else(|| {
                ExecutionError::KnowledgeBaseNotFound {
                    name: name.to_string(),
                    version: version.to_string(),
                }
                .into()
            })
    }

    /// Removes a knowledge base. Existing instances keep working.
    pub fn remove(&mut self, name: &str, version: &str) -> Option<KnowledgeBase> {
        self.bases.remove(&(name.to_string(), version.to_string()))
    }

    /// Registered versions of `name`, sorted.
    #[must_use]
    pub fn versions(&self, name: &str) -> Vec<&str> {
        let mut versions: Vec<&str> = self
            .bases
            .keys()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
            .collect();
        versions.sort_unstable();
        versions
    }

    /// Number of registered knowledge bases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bases.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }
}
