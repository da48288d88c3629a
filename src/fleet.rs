//! Fleet manager: turns discovered endpoints into tracked hosts

use std::sync::Arc;

use parking_lot::RwLock;

use crate::adapter::{AdapterRegistry, DeleteHostAnswer, ResourceStateAdapter};
use crate::discovery::{DiscoveredResource, Discoverer, DiscoveryRequest};
use crate::inventory::HostStore;
use crate::models::*;
use crate::outcome::{DeclineReason, Outcome};
use crate::resource::ServerResource;
use crate::{Error, Result};

/// Owns the discoverers, the adapter registry and the host inventory
pub struct FleetManager {
    registry: Arc<AdapterRegistry>,
    discoverers: RwLock<Vec<Arc<dyn Discoverer>>>,
    hosts: Arc<dyn HostStore>,
    management_server_id: u64,
}

impl FleetManager {
    pub fn new(hosts: Arc<dyn HostStore>, management_server_id: u64) -> Self {
        Self {
            registry: Arc::new(AdapterRegistry::new()),
            discoverers: RwLock::new(Vec::new()),
            hosts,
            management_server_id,
        }
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    /// Start a discovery component; its adapter is registered under the
    /// discoverer's name for as long as the component runs.
    pub fn start_component(&self, discoverer: Arc<dyn Discoverer>, adapter: ResourceStateAdapter) -> Result<()> {
        self.registry.register(discoverer.name(), adapter)?;
        tracing::info!(discoverer = %discoverer.name(), "Started discovery component");
        self.discoverers.write().push(discoverer);
        Ok(())
    }

    pub fn stop_component(&self, name: &str) -> bool {
        let mut discoverers = self.discoverers.write();
        let before = discoverers.len();
        discoverers.retain(|d| d.name() != name);
        let stopped = discoverers.len() != before;
        if stopped {
            self.registry.unregister(name);
            tracing::info!(discoverer = %name, "Stopped discovery component");
        }
        stopped
    }

    /// Stop every component
    pub fn shutdown(&self) {
        let names: Vec<String> = self.discoverers.read().iter().map(|d| d.name().to_string()).collect();
        for name in names {
            self.stop_component(&name);
        }
    }

    pub fn components(&self) -> Vec<String> {
        self.discoverers.read().iter().map(|d| d.name().to_string()).collect()
    }

    /// Offer the request to each discoverer in turn; the first one that
    /// recognises the endpoint wins. Hard errors stop the search.
    pub fn discover(&self, request: &DiscoveryRequest) -> Result<Outcome<Vec<DiscoveredResource>>> {
        Ok(self.find(request)?.map(|(_, found)| found))
    }

    fn find(&self, request: &DiscoveryRequest) -> Result<Outcome<(Arc<dyn Discoverer>, Vec<DiscoveredResource>)>> {
        let discoverers = self.discoverers.read().clone();
        let mut last = DeclineReason::NotApplicable;

        for discoverer in discoverers {
            match discoverer.find(request)? {
                Outcome::Succeeded(found) => {
                    tracing::info!(
                        discoverer = %discoverer.name(),
                        url = %request.endpoint,
                        count = found.len(),
                        "Discovered resources"
                    );
                    return Ok(Outcome::Succeeded((discoverer, found)));
                }
                Outcome::Declined(reason) => {
                    tracing::debug!(discoverer = %discoverer.name(), reason = %reason, "Discoverer declined");
                    last = reason;
                }
            }
        }
        Ok(Outcome::Declined(last))
    }

    /// Discover the endpoint and persist a host record for each resource found
    pub fn add_host(&self, request: &DiscoveryRequest) -> Result<Outcome<Vec<HostRecord>>> {
        let (discoverer, found) = match self.find(request)? {
            Outcome::Succeeded(found) => found,
            Outcome::Declined(reason) => {
                tracing::info!(url = %request.endpoint, reason = %reason, "No discoverer accepted endpoint");
                return Ok(Outcome::Declined(reason));
            }
        };

        let hosts = self.connect_discovered(request, &found)?;
        discoverer.post_discovery(&hosts, self.management_server_id)?;
        Ok(Outcome::Succeeded(hosts))
    }

    /// Materialize and persist host records for discovered resources.
    ///
    /// A resource no adapter claims is stopped and skipped.
    pub fn connect_discovered(
        &self,
        request: &DiscoveryRequest,
        found: &[DiscoveredResource],
    ) -> Result<Vec<HostRecord>> {
        let mut hosts = Vec::with_capacity(found.len());

        for discovered in found {
            let resource = discovered.resource.as_ref();
            let startup = resource.initialize();
            let skeleton = self.skeleton(request, resource)?;

            let outcome = self.registry.create_host_for_direct_connect_agent(
                &skeleton,
                &startup,
                resource,
                &discovered.details,
                &request.host_tags,
            );
            let mut host = match outcome {
                Ok(Outcome::Succeeded(host)) => host,
                Ok(Outcome::Declined(reason)) => {
                    tracing::warn!(guid = %resource.guid(), reason = %reason, "No adapter claimed resource");
                    resource.stop()?;
                    continue;
                }
                Err(e) => {
                    resource.stop()?;
                    return Err(e);
                }
            };

            if resource.is_running() {
                host.state = HostState::Up;
            }
            self.hosts.save_host(&host)?;
            tracing::info!(host = host.id, guid = ?host.guid, state = %host.state, "Host added to fleet");
            hosts.push(host);
        }

        Ok(hosts)
    }

    /// Existing record for the resource's guid, or a fresh one
    fn skeleton(&self, request: &DiscoveryRequest, resource: &dyn ServerResource) -> Result<HostRecord> {
        let mut host = match self.hosts.find_host_by_guid(resource.guid())? {
            Some(existing) => {
                tracing::debug!(host = existing.id, guid = %resource.guid(), "Rediscovered known host");
                existing
            }
            None => HostRecord::new(self.hosts.next_host_id()?, HostType::Routing),
        };
        host.zone_id = Some(request.zone_id);
        host.pod_id = request.pod_id;
        host.cluster_id = request.cluster_id;
        Ok(host)
    }

    /// Remove a host once an adapter has approved it
    pub fn delete_host(&self, id: u64, is_forced: bool, is_force_delete_storage: bool) -> Result<DeleteHostAnswer> {
        let host = self
            .hosts
            .find_host(id)?
            .ok_or_else(|| Error::NotFound(format!("host {}", id)))?;

        match self.registry.delete_host(&host, is_forced, is_force_delete_storage)? {
            // The guard has already dropped the host's VM records
            Outcome::Succeeded(answer) => match self.hosts.remove_host(id) {
                Ok(_) => {
                    tracing::info!(host = id, "Host removed from fleet");
                    Ok(answer)
                }
                Err(e) => {
                    tracing::error!(
                        host = id,
                        removed_vms = answer.removed_vms.len(),
                        error = %e,
                        "VM records cleared but host record could not be removed"
                    );
                    Err(e)
                }
            },
            Outcome::Declined(_) => Err(Error::Validation(format!(
                "no registered adapter can delete host {}",
                id
            ))),
        }
    }

    pub fn list_hosts(&self) -> Result<Vec<HostRecord>> {
        self.hosts.list_hosts()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::discovery::keys;
    use crate::inventory::{MemoryInventory, MockHostStore, VmStore};
    use crate::resource::BareMetalResource;

    /// Discoverer returning a fixed answer
    struct Fixed {
        name: &'static str,
        answer: fn() -> Result<Outcome<Vec<DiscoveredResource>>>,
    }

    impl Discoverer for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        fn hypervisor_type(&self) -> HypervisorType {
            HypervisorType::BareMetal
        }

        fn find(&self, _request: &DiscoveryRequest) -> Result<Outcome<Vec<DiscoveredResource>>> {
            (self.answer)()
        }
    }

    fn bare_metal(guid: &str) -> DiscoveredResource {
        let params: BTreeMap<String, String> = [
            (keys::ZONE, "1"),
            (keys::POD, "2"),
            (keys::CLUSTER, "3"),
            (keys::GUID, guid),
            (keys::PRIVATE_IP, "10.0.0.5"),
            (keys::MEMORY, "4096"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let resource = BareMetalResource::configure("agent", params).unwrap();
        resource.start().unwrap();
        DiscoveredResource {
            resource: Arc::new(resource),
            details: [(keys::PASSWORD.to_string(), "s3cret".to_string())].into_iter().collect(),
        }
    }

    fn request() -> DiscoveryRequest {
        DiscoveryRequest::new(1, "http://host1").pod(2).cluster(3).tag("gold")
    }

    fn manager(inv: &MemoryInventory) -> FleetManager {
        FleetManager::new(Arc::new(inv.clone()), 42)
    }

    fn declining() -> Result<Outcome<Vec<DiscoveredResource>>> {
        Ok(Outcome::Declined(DeclineReason::UnsupportedScheme("ftp".into())))
    }

    fn finding() -> Result<Outcome<Vec<DiscoveredResource>>> {
        Ok(Outcome::Succeeded(vec![bare_metal("guid-1")]))
    }

    fn failing() -> Result<Outcome<Vec<DiscoveredResource>>> {
        Err(Error::MissingRequiredField("clusterId"))
    }

    #[test]
    fn test_components_pair_with_adapters() {
        let inv = MemoryInventory::new();
        let fleet = manager(&inv);
        let vms: Arc<dyn VmStore> = Arc::new(inv.clone());

        fleet
            .start_component(Arc::new(Fixed { name: "bm", answer: finding }), ResourceStateAdapter::bare_metal(vms.clone()))
            .unwrap();
        assert!(fleet.registry().contains("bm"));

        let dup = fleet.start_component(Arc::new(Fixed { name: "bm", answer: finding }), ResourceStateAdapter::bare_metal(vms));
        assert!(matches!(dup, Err(Error::DuplicateAdapter(_))));
        assert_eq!(fleet.components(), vec!["bm".to_string()]);

        assert!(fleet.stop_component("bm"));
        assert!(!fleet.registry().contains("bm"));
        assert!(!fleet.stop_component("bm"));
    }

    #[test]
    fn test_first_success_wins() {
        let inv = MemoryInventory::new();
        let fleet = manager(&inv);
        let vms: Arc<dyn VmStore> = Arc::new(inv.clone());
        fleet
            .start_component(Arc::new(Fixed { name: "a", answer: declining }), ResourceStateAdapter::bare_metal(vms.clone()))
            .unwrap();
        fleet
            .start_component(Arc::new(Fixed { name: "b", answer: finding }), ResourceStateAdapter::bare_metal(vms.clone()))
            .unwrap();
        fleet
            .start_component(Arc::new(Fixed { name: "c", answer: failing }), ResourceStateAdapter::bare_metal(vms))
            .unwrap();

        let found = fleet.discover(&request()).unwrap().succeeded().unwrap();
        assert_eq!(found[0].resource.guid(), "guid-1");
    }

    #[test]
    fn test_hard_error_stops_search() {
        let inv = MemoryInventory::new();
        let fleet = manager(&inv);
        let vms: Arc<dyn VmStore> = Arc::new(inv.clone());
        fleet
            .start_component(Arc::new(Fixed { name: "c", answer: failing }), ResourceStateAdapter::bare_metal(vms.clone()))
            .unwrap();
        fleet
            .start_component(Arc::new(Fixed { name: "b", answer: finding }), ResourceStateAdapter::bare_metal(vms))
            .unwrap();

        assert!(matches!(fleet.add_host(&request()), Err(Error::MissingRequiredField(_))));
        assert!(fleet.list_hosts().unwrap().is_empty());
    }

    #[test]
    fn test_add_host_persists_running_host() {
        let inv = MemoryInventory::new();
        let fleet = manager(&inv);
        fleet
            .start_component(
                Arc::new(Fixed { name: "bm", answer: finding }),
                ResourceStateAdapter::bare_metal(Arc::new(inv.clone())),
            )
            .unwrap();

        let hosts = fleet.add_host(&request()).unwrap().succeeded().unwrap();
        assert_eq!(hosts.len(), 1);
        let host = &hosts[0];
        assert_eq!(host.state, HostState::Up);
        assert_eq!(host.zone_id, Some(1));
        assert_eq!(host.cluster_id, Some(3));
        assert_eq!(host.memory_bytes, Some(4096 * 1024 * 1024));
        assert_eq!(host.host_tags, vec!["gold".to_string()]);
        assert!(!host.details.contains_key(keys::PASSWORD));
        assert_eq!(inv.find_host_by_guid("guid-1").unwrap().unwrap().id, host.id);

        // Rediscovery reuses the record
        let again = fleet.add_host(&request()).unwrap().succeeded().unwrap();
        assert_eq!(again[0].id, host.id);
        assert_eq!(fleet.list_hosts().unwrap().len(), 1);
    }

    #[test]
    fn test_all_declined() {
        let inv = MemoryInventory::new();
        let fleet = manager(&inv);
        fleet
            .start_component(
                Arc::new(Fixed { name: "a", answer: declining }),
                ResourceStateAdapter::bare_metal(Arc::new(inv.clone())),
            )
            .unwrap();
        let outcome = fleet.add_host(&request()).unwrap();
        assert_eq!(
            outcome.decline_reason(),
            Some(&DeclineReason::UnsupportedScheme("ftp".into()))
        );
    }

    #[test]
    fn test_unclaimed_resource_is_stopped() {
        let mut hosts = MockHostStore::new();
        hosts.expect_find_host_by_guid().returning(|_| Ok(None));
        hosts.expect_next_host_id().returning(|| Ok(1));
        hosts.expect_save_host().never();
        let fleet = FleetManager::new(Arc::new(hosts), 1);

        let found = vec![bare_metal("guid-1")];
        let saved = fleet.connect_discovered(&request(), &found).unwrap();
        assert!(saved.is_empty());
        assert!(!found[0].resource.is_running());
    }

    #[test]
    fn test_delete_host_paths() {
        let inv = MemoryInventory::new();
        let fleet = manager(&inv);
        fleet
            .start_component(
                Arc::new(Fixed { name: "bm", answer: finding }),
                ResourceStateAdapter::bare_metal(Arc::new(inv.clone())),
            )
            .unwrap();

        assert!(matches!(fleet.delete_host(99, false, false), Err(Error::NotFound(_))));

        let storage = HostRecord::new(50, HostType::Storage);
        inv.save_host(&storage).unwrap();
        assert!(matches!(fleet.delete_host(50, false, false), Err(Error::Validation(_))));
        assert!(inv.find_host(50).unwrap().is_some());

        let host = fleet.add_host(&request()).unwrap().succeeded().unwrap().remove(0);
        inv.add_vm(VmAssociation::new(1, "vm-1", VmState::Running).on_host(host.id));
        assert!(fleet.delete_host(host.id, true, true).unwrap_err().is_busy());
        assert!(inv.find_host(host.id).unwrap().is_some());
    }

    #[test]
    fn test_failed_host_removal_after_approval_is_reported() {
        let mut hosts = MockHostStore::new();
        hosts
            .expect_find_host()
            .returning(|id| Ok(Some(HostRecord::new(id, HostType::Routing).with_hypervisor(HypervisorType::BareMetal))));
        hosts
            .expect_remove_host()
            .times(1)
            .returning(|_| Err(Error::Io(std::io::Error::other("disk full"))));
        let fleet = FleetManager::new(Arc::new(hosts), 1);

        let inv = MemoryInventory::new();
        inv.add_vm(VmAssociation::new(1, "old", VmState::Stopped).last_on(7));
        fleet
            .registry()
            .register("bm", ResourceStateAdapter::bare_metal(Arc::new(inv.clone())))
            .unwrap();

        assert!(matches!(fleet.delete_host(7, false, false), Err(Error::Io(_))));
        assert!(inv.vms().is_empty());
    }
}
