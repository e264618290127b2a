//! Concurrency-safe table of live orchestrators.

use crate::config::EvictionPolicy;
use crate::orchestrator::Orchestrator;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Maps pipeline identities to their orchestrators.
///
/// Locks are held only for the map operation itself, never across an await.
#[derive(Debug, Default)]
pub struct PipelineRegistry {
    orchestrators: RwLock<HashMap<Uuid, Arc<Orchestrator>>>,
    policy: EvictionPolicy,
}

impl PipelineRegistry {
    /// Creates an empty registry with the given eviction policy.
    #[must_use]
    pub fn new(policy: EvictionPolicy) -> Self {
        Self {
            orchestrators: RwLock::new(HashMap::new()),
            policy,
        }
    }

    /// Returns the eviction policy.
    #[must_use]
    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    /// Registers an orchestrator under its own identity.
    pub fn insert(&self, orchestrator: Arc<Orchestrator>) {
        self.orchestrators.write().insert(orchestrator.id(), orchestrator);
    }

    /// Looks up an orchestrator.
    #[must_use]
    pub fn get(&self, pipeline_id: Uuid) -> Option<Arc<Orchestrator>> {
        self.orchestrators.read().get(&pipeline_id).cloned()
    }

    /// Removes an orchestrator, returning it if it was registered.
    pub fn remove(&self, pipeline_id: Uuid) -> Option<Arc<Orchestrator>> {
        self.orchestrators.write().remove(&pipeline_id)
    }

    /// Removes an orchestrator if the policy evicts terminal pipelines.
    ///
    /// Returns true if it was removed.
    pub fn evict_terminal(&self, pipeline_id: Uuid) -> bool {
        match self.policy {
            EvictionPolicy::Retain => false,
            EvictionPolicy::OnTerminal => self.remove(pipeline_id).is_some(),
        }
    }

    /// Returns true if an orchestrator is registered for the pipeline.
    #[must_use]
    pub fn contains(&self, pipeline_id: Uuid) -> bool {
        self.orchestrators.read().contains_key(&pipeline_id)
    }

    /// Returns the number of registered orchestrators.
    #[must_use]
    pub fn len(&self) -> usize {
        self.orchestrators.read().len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orchestrators.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KernelConfig;
    use crate::core::ExecutionMode;
    use crate::events::NoOpBroadcaster;
    use crate::ports::InMemoryRepository;

    fn orchestrator() -> Arc<Orchestrator> {
        Arc::new(Orchestrator::new(
            ExecutionMode::Sequential,
            Uuid::new_v4(),
            Arc::new(InMemoryRepository::new()),
            Arc::new(NoOpBroadcaster),
            KernelConfig::default(),
        ))
    }

    #[test]
    fn test_insert_and_get() {
        let registry = PipelineRegistry::default();
        assert!(registry.is_empty());

        let orch = orchestrator();
        let id = orch.id();
        registry.insert(orch);

        assert!(registry.contains(id));
        assert_eq!(registry.get(id).map(|o| o.id()), Some(id));
        assert!(registry.get(Uuid::new_v4()).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_retain_policy_never_evicts() {
        let registry = PipelineRegistry::new(EvictionPolicy::Retain);
        let orch = orchestrator();
        let id = orch.id();
        registry.insert(orch);

        assert!(!registry.evict_terminal(id));
        assert!(registry.contains(id));
    }

    #[test]
    fn test_on_terminal_policy_evicts() {
        let registry = PipelineRegistry::new(EvictionPolicy::OnTerminal);
        let orch = orchestrator();
        let id = orch.id();
        registry.insert(orch);

        assert!(registry.evict_terminal(id));
        assert!(!registry.contains(id));
        assert!(!registry.evict_terminal(id));
    }

    #[test]
    fn test_remove() {
        let registry = PipelineRegistry::default();
        let orch = orchestrator();
        let id = orch.id();
        registry.insert(orch);

        assert!(registry.remove(id).is_some());
        assert!(registry.remove(id).is_none());
    }
}
