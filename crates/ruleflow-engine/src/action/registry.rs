//! Provider registry with priority-ordered dispatch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::{Action, ActionProvider};
use crate::error::ActionCreationError;
use crate::model::ActionDefinition;

/// Registry of [`ActionProvider`]s.
///
/// Registration happens during the build phase; after that the registry is
/// effectively immutable and dispatch is a read-only scan safe to call from
/// any number of concurrent executions. Providers are kept in registration
/// order and sorted lazily: registering invalidates the order, the next
/// dispatch re-sorts by descending priority with registration order breaking
/// ties.
#[derive(Default)]
pub struct ActionRegistry {
    providers: RwLock<Vec<Arc<dyn ActionProvider>>>,
    sorted: AtomicBool,
}

impl ActionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider.
    pub fn register_provider(&self, provider: Arc<dyn ActionProvider>) {
        debug!(
            provider = provider.provider_name(),
            priority = provider.priority(),
            "registered action provider"
        );
        self.providers.write().push(provider);
        self.sorted.store(false, Ordering::Release);
    }

    /// Register several providers at once.
    pub fn register_providers(&self, providers: impl IntoIterator<Item = Arc<dyn ActionProvider>>) {
        for provider in providers {
            self.register_provider(provider);
        }
    }

    /// Instantiate an action: the first provider (by descending priority)
    /// whose `supports` matches the definition's type tag creates it.
    pub fn create_action(
        &self,
        definition: &ActionDefinition,
    ) -> Result<Box<dyn Action>, ActionCreationError> {
        self.ensure_sorted();

        let providers = self.providers.read();
        for provider in providers.iter() {
            if provider.supports(&definition.action_type) {
                debug!(
                    provider = provider.provider_name(),
                    action_type = %definition.action_type,
                    action_id = %definition.action_id,
                    "creating action"
                );
                return provider.create_action(definition);
            }
        }

        Err(ActionCreationError::UnsupportedType {
            action_type: definition.action_type.clone(),
            action_id: definition.action_id.clone(),
            available: self.provider_info_locked(&providers),
        })
    }

    /// Whether any provider supports the given type tag.
    pub fn supports(&self, action_type: &str) -> bool {
        self.providers
            .read()
            .iter()
            .any(|provider| provider.supports(action_type))
    }

    /// All providers supporting a given type tag, in dispatch order.
    pub fn providers_for(&self, action_type: &str) -> Vec<Arc<dyn ActionProvider>> {
        self.ensure_sorted();
        self.providers
            .read()
            .iter()
            .filter(|provider| provider.supports(action_type))
            .cloned()
            .collect()
    }

    /// Diagnostic description of all providers, in dispatch order.
    pub fn provider_info(&self) -> String {
        self.ensure_sorted();
        self.provider_info_locked(&self.providers.read())
    }

    /// Number of registered providers.
    pub fn provider_count(&self) -> usize {
        self.providers.read().len()
    }

    /// Drop all providers.
    pub fn clear(&self) {
        self.providers.write().clear();
        self.sorted.store(false, Ordering::Release);
    }

    fn ensure_sorted(&self) {
        if self.sorted.load(Ordering::Acquire) {
            return;
        }
        let mut providers = self.providers.write();
        // Stable sort keeps registration order among equal priorities.
        providers.sort_by_key(|provider| std::cmp::Reverse(provider.priority()));
        self.sorted.store(true, Ordering::Release);
    }

    fn provider_info_locked(&self, providers: &[Arc<dyn ActionProvider>]) -> String {
        if providers.is_empty() {
            return String::from("none");
        }
        providers
            .iter()
            .map(|provider| {
                format!("{} (priority: {})", provider.provider_name(), provider.priority())
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("provider_count", &self.provider_count())
            .finish()
    }
}
