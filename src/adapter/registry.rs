use std::collections::BTreeMap;

use parking_lot::RwLock;

use super::{DeleteHostAnswer, ResourceStateAdapter};
use crate::models::*;
use crate::outcome::{DeclineReason, Outcome};
use crate::resource::ServerResource;
use crate::{Error, Result};

/// Registered adapters, asked in registration order.
///
/// Hooks run while holding the read lock, so registering or unregistering
/// waits for in-flight materialization and deletion calls to finish.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: RwLock<Vec<(String, ResourceStateAdapter)>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<String>, adapter: ResourceStateAdapter) -> Result<()> {
        let name = name.into();
        let mut adapters = self.adapters.write();
        if adapters.iter().any(|(n, _)| *n == name) {
            return Err(Error::DuplicateAdapter(name));
        }
        tracing::info!(adapter = %name, "Registered resource state adapter");
        adapters.push((name, adapter));
        Ok(())
    }

    pub fn unregister(&self, name: &str) -> bool {
        let mut adapters = self.adapters.write();
        let before = adapters.len();
        adapters.retain(|(n, _)| n != name);
        let removed = adapters.len() != before;
        if removed {
            tracing::info!(adapter = %name, "Unregistered resource state adapter");
        }
        removed
    }

    pub fn contains(&self, name: &str) -> bool {
        self.adapters.read().iter().any(|(n, _)| n == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.adapters.read().iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.read().is_empty()
    }

    pub fn create_host_for_connected_agent(
        &self,
        host: &HostRecord,
        startup: &[StartupCommand],
    ) -> Result<Outcome<HostRecord>> {
        let adapters = self.adapters.read();
        for (name, adapter) in adapters.iter() {
            if let Outcome::Succeeded(record) = adapter.materializer.create_host_for_connected_agent(host, startup)? {
                tracing::debug!(adapter = %name, host = record.id, "Adapter materialized connected agent");
                return Ok(Outcome::Succeeded(record));
            }
        }
        Ok(Outcome::Declined(DeclineReason::NotApplicable))
    }

    pub fn create_host_for_direct_connect_agent(
        &self,
        host: &HostRecord,
        startup: &[StartupCommand],
        resource: &dyn ServerResource,
        details: &BTreeMap<String, String>,
        host_tags: &[String],
    ) -> Result<Outcome<HostRecord>> {
        let adapters = self.adapters.read();
        for (name, adapter) in adapters.iter() {
            let outcome = adapter.materializer.create_host_for_direct_connect_agent(
                host.clone(),
                startup,
                resource,
                details,
                host_tags,
            )?;
            if let Outcome::Succeeded(record) = outcome {
                tracing::debug!(adapter = %name, host = record.id, "Adapter materialized direct connect agent");
                return Ok(Outcome::Succeeded(record));
            }
        }
        Ok(Outcome::Declined(DeclineReason::NotApplicable))
    }

    /// First guard that owns the host decides; a veto is an `Err`
    pub fn delete_host(
        &self,
        host: &HostRecord,
        is_forced: bool,
        is_force_delete_storage: bool,
    ) -> Result<Outcome<DeleteHostAnswer>> {
        let adapters = self.adapters.read();
        for (name, adapter) in adapters.iter() {
            if let Outcome::Succeeded(answer) = adapter.guard.delete_host(host, is_forced, is_force_delete_storage)? {
                tracing::debug!(adapter = %name, host = host.id, "Adapter approved host deletion");
                return Ok(Outcome::Succeeded(answer));
            }
        }
        Ok(Outcome::Declined(DeclineReason::NotApplicable))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::adapter::{BareMetalMaterializer, MockHostDeletionGuard};

    fn declining_guard() -> MockHostDeletionGuard {
        let mut guard = MockHostDeletionGuard::new();
        guard
            .expect_delete_host()
            .returning(|_, _, _| Ok(Outcome::Declined(DeclineReason::NotApplicable)));
        guard
    }

    fn approving_guard(removed: Vec<u64>) -> MockHostDeletionGuard {
        let mut guard = MockHostDeletionGuard::new();
        guard.expect_delete_host().returning(move |_, _, _| {
            Ok(Outcome::Succeeded(DeleteHostAnswer {
                success: true,
                removed_vms: removed.clone(),
            }))
        });
        guard
    }

    fn adapter(guard: MockHostDeletionGuard) -> ResourceStateAdapter {
        ResourceStateAdapter::new(Arc::new(BareMetalMaterializer::default()), Arc::new(guard))
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let registry = AdapterRegistry::new();
        registry.register("bm", adapter(declining_guard())).unwrap();
        let err = registry.register("bm", adapter(declining_guard())).unwrap_err();
        assert!(matches!(err, Error::DuplicateAdapter(ref n) if n == "bm"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister() {
        let registry = AdapterRegistry::new();
        registry.register("bm", adapter(declining_guard())).unwrap();
        assert!(registry.contains("bm"));
        assert!(registry.unregister("bm"));
        assert!(!registry.unregister("bm"));
        assert!(registry.is_empty());

        // Name is free again
        registry.register("bm", adapter(declining_guard())).unwrap();
        assert_eq!(registry.names(), vec!["bm".to_string()]);
    }

    #[test]
    fn test_first_owner_decides_deletion() {
        let registry = AdapterRegistry::new();
        registry.register("other", adapter(declining_guard())).unwrap();
        registry.register("bm", adapter(approving_guard(vec![4]))).unwrap();

        let mut never = MockHostDeletionGuard::new();
        never.expect_delete_host().never();
        registry.register("late", adapter(never)).unwrap();

        let host = HostRecord::new(1, HostType::Routing);
        let answer = registry.delete_host(&host, false, false).unwrap().succeeded().unwrap();
        assert_eq!(answer.removed_vms, vec![4]);
    }

    #[test]
    fn test_all_decline() {
        let registry = AdapterRegistry::new();
        registry.register("other", adapter(declining_guard())).unwrap();
        let host = HostRecord::new(1, HostType::Routing);
        assert!(registry.delete_host(&host, false, false).unwrap().is_declined());
        assert!(registry
            .create_host_for_connected_agent(&host, &[])
            .unwrap()
            .is_declined());
    }

    #[test]
    fn test_veto_propagates() {
        let registry = AdapterRegistry::new();
        let mut guard = MockHostDeletionGuard::new();
        guard
            .expect_delete_host()
            .returning(|h, _, _| Err(Error::HostBusy { vm_id: 1, host_id: h.id }));
        registry.register("bm", adapter(guard)).unwrap();

        let host = HostRecord::new(3, HostType::Routing);
        assert!(registry.delete_host(&host, true, true).unwrap_err().is_busy());
    }
}
