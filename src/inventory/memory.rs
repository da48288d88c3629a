//! In-memory inventory with JSON snapshots

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::{ClusterStore, HostStore, VmStore, ZoneStore};
use crate::command::{AutoScaleService, LoadBalancerLookup};
use crate::models::*;
use crate::{Error, Result};

#[derive(Debug, Default, Serialize, Deserialize)]
struct InventoryState {
    #[serde(default)]
    zones: BTreeMap<u64, ZoneRecord>,
    #[serde(default)]
    clusters: BTreeMap<u64, ClusterRecord>,
    #[serde(default)]
    hosts: BTreeMap<u64, HostRecord>,
    #[serde(default)]
    vms: BTreeMap<u64, VmAssociation>,
    #[serde(default)]
    load_balancers: BTreeMap<u64, LoadBalancerRule>,
    #[serde(default)]
    groups: BTreeMap<u64, AutoScaleGroupEntity>,
    #[serde(default)]
    last_host_id: u64,
    #[serde(default)]
    last_group_id: u64,
}

/// Shared in-memory store; clones share the same state
#[derive(Clone, Default)]
pub struct MemoryInventory {
    state: Arc<RwLock<InventoryState>>,
}

impl MemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot, or start empty if the file does not exist yet
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new());
        }
        let raw = std::fs::read_to_string(path)?;
        let state: InventoryState = serde_json::from_str(&raw)?;
        Ok(Self {
            state: Arc::new(RwLock::new(state)),
        })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(&*self.state.read())?;
        std::fs::write(path, json)?;
        Ok(())
    }

    // ===== Seeding =====

    pub fn add_zone(&self, zone: ZoneRecord) {
        self.state.write().zones.insert(zone.id, zone);
    }

    pub fn add_cluster(&self, cluster: ClusterRecord) {
        self.state.write().clusters.insert(cluster.id, cluster);
    }

    pub fn add_vm(&self, vm: VmAssociation) {
        self.state.write().vms.insert(vm.vm_id, vm);
    }

    pub fn add_load_balancer(&self, rule: LoadBalancerRule) {
        self.state.write().load_balancers.insert(rule.id, rule);
    }

    // ===== Inspection =====

    pub fn vms(&self) -> Vec<VmAssociation> {
        self.state.read().vms.values().cloned().collect()
    }

    pub fn groups(&self) -> Vec<AutoScaleGroupEntity> {
        self.state.read().groups.values().cloned().collect()
    }
}

impl ClusterStore for MemoryInventory {
    fn find_cluster(&self, id: u64) -> Result<Option<ClusterRecord>> {
        Ok(self.state.read().clusters.get(&id).cloned())
    }

    fn update_cluster(&self, cluster: &ClusterRecord) -> Result<()> {
        let mut state = self.state.write();
        let slot = state
            .clusters
            .get_mut(&cluster.id)
            .ok_or_else(|| Error::NotFound(format!("cluster {}", cluster.id)))?;
        *slot = cluster.clone();
        Ok(())
    }
}

impl ZoneStore for MemoryInventory {
    fn find_zone(&self, id: u64) -> Result<Option<ZoneRecord>> {
        Ok(self.state.read().zones.get(&id).cloned())
    }

    fn update_zone(&self, zone: &ZoneRecord) -> Result<()> {
        let mut state = self.state.write();
        let slot = state
            .zones
            .get_mut(&zone.id)
            .ok_or_else(|| Error::NotFound(format!("zone {}", zone.id)))?;
        *slot = zone.clone();
        Ok(())
    }
}

impl HostStore for MemoryInventory {
    fn next_host_id(&self) -> Result<u64> {
        let mut state = self.state.write();
        state.last_host_id += 1;
        Ok(state.last_host_id)
    }

    fn find_host(&self, id: u64) -> Result<Option<HostRecord>> {
        Ok(self.state.read().hosts.get(&id).cloned())
    }

    fn find_host_by_guid(&self, guid: &str) -> Result<Option<HostRecord>> {
        Ok(self
            .state
            .read()
            .hosts
            .values()
            .find(|h| h.guid.as_deref() == Some(guid))
            .cloned())
    }

    fn list_hosts(&self) -> Result<Vec<HostRecord>> {
        Ok(self.state.read().hosts.values().cloned().collect())
    }

    fn save_host(&self, host: &HostRecord) -> Result<()> {
        let mut state = self.state.write();
        state.last_host_id = state.last_host_id.max(host.id);
        state.hosts.insert(host.id, host.clone());
        Ok(())
    }

    fn remove_host(&self, id: u64) -> Result<bool> {
        Ok(self.state.write().hosts.remove(&id).is_some())
    }
}

impl VmStore for MemoryInventory {
    fn list_by_last_host(&self, host_id: u64) -> Result<Vec<VmAssociation>> {
        Ok(self
            .state
            .read()
            .vms
            .values()
            .filter(|vm| vm.last_host_id == Some(host_id))
            .cloned()
            .collect())
    }

    fn list_for_host(&self, host_id: u64) -> Result<Vec<VmAssociation>> {
        Ok(self
            .state
            .read()
            .vms
            .values()
            .filter(|vm| vm.references_host(host_id))
            .cloned()
            .collect())
    }

    fn remove_stale_for_host(&self, host_id: u64) -> Result<Vec<u64>> {
        let mut state = self.state.write();
        if let Some(active) = state
            .vms
            .values()
            .find(|vm| vm.references_host(host_id) && vm.is_active())
        {
            return Err(Error::HostBusy {
                vm_id: active.vm_id,
                host_id,
            });
        }

        let ids: Vec<u64> = state
            .vms
            .values()
            .filter(|vm| vm.last_host_id == Some(host_id))
            .map(|vm| vm.vm_id)
            .collect();
        for id in &ids {
            state.vms.remove(id);
        }
        Ok(ids)
    }
}

impl LoadBalancerLookup for MemoryInventory {
    fn find_load_balancer(&self, id: u64) -> Result<Option<LoadBalancerRule>> {
        Ok(self.state.read().load_balancers.get(&id).cloned())
    }
}

impl AutoScaleService for MemoryInventory {
    fn create_group(
        &self,
        owner: AccountId,
        request: &AutoScaleGroupRequest,
    ) -> Result<Option<AutoScaleGroupEntity>> {
        let mut state = self.state.write();
        state.last_group_id += 1;
        let group = AutoScaleGroupEntity::allocate(state.last_group_id, owner, request);
        state.groups.insert(group.id, group.clone());
        Ok(Some(group))
    }

    fn configure_group(&self, group_id: u64) -> Result<bool> {
        let mut state = self.state.write();
        match state.groups.get_mut(&group_id) {
            Some(group) if group.state == GroupState::Allocated => {
                group.state = GroupState::Active;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn delete_group(&self, group_id: u64) -> Result<bool> {
        Ok(self.state.write().groups.remove(&group_id).is_some())
    }

    fn find_group(&self, group_id: u64) -> Result<Option<AutoScaleGroupEntity>> {
        Ok(self.state.read().groups.get(&group_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_remove_stale_is_all_or_nothing() {
        let inv = MemoryInventory::new();
        inv.add_vm(VmAssociation::new(1, "dead", VmState::Stopped).last_on(5));
        inv.add_vm(VmAssociation::new(2, "live", VmState::Running).last_on(5));
        inv.add_vm(VmAssociation::new(3, "elsewhere", VmState::Stopped).last_on(6));

        let err = inv.remove_stale_for_host(5).unwrap_err();
        assert!(matches!(err, Error::HostBusy { vm_id: 2, host_id: 5 }));
        assert_eq!(inv.vms().len(), 3);
    }

    #[test]
    fn test_vm_placed_on_host_blocks_removal() {
        let inv = MemoryInventory::new();
        inv.add_vm(VmAssociation::new(1, "dead", VmState::Stopped).last_on(5));
        let mut placed = VmAssociation::new(2, "placed", VmState::Running).last_on(6);
        placed.host_id = Some(5);
        inv.add_vm(placed);

        let mut listed: Vec<u64> = inv.list_for_host(5).unwrap().iter().map(|vm| vm.vm_id).collect();
        listed.sort();
        assert_eq!(listed, vec![1, 2]);

        let err = inv.remove_stale_for_host(5).unwrap_err();
        assert!(matches!(err, Error::HostBusy { vm_id: 2, host_id: 5 }));
        assert_eq!(inv.vms().len(), 2);
    }

    #[test]
    fn test_remove_stale_scoped_to_host() {
        let inv = MemoryInventory::new();
        inv.add_vm(VmAssociation::new(1, "dead", VmState::Stopped).last_on(5));
        inv.add_vm(VmAssociation::new(2, "gone", VmState::Destroyed).last_on(5));
        inv.add_vm(VmAssociation::new(3, "elsewhere", VmState::Running).on_host(6));

        let mut removed = inv.remove_stale_for_host(5).unwrap();
        removed.sort();
        assert_eq!(removed, vec![1, 2]);
        assert_eq!(inv.vms().len(), 1);
    }

    #[test]
    fn test_group_lifecycle() {
        let inv = MemoryInventory::new();
        let req = AutoScaleGroupRequest::builder(1, 2).members(1, 2).scale_up(1).scale_down(2).build();
        let group = inv.create_group(9, &req).unwrap().unwrap();
        assert_eq!(group.id, 1);

        assert!(inv.configure_group(group.id).unwrap());
        // Already active
        assert!(!inv.configure_group(group.id).unwrap());
        assert_eq!(inv.find_group(group.id).unwrap().unwrap().state, GroupState::Active);

        assert!(inv.delete_group(group.id).unwrap());
        assert!(inv.find_group(group.id).unwrap().is_none());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state.json");

        let inv = MemoryInventory::new();
        inv.add_zone(ZoneRecord::new(1, "zone-1"));
        inv.add_cluster(ClusterRecord::new(2, 3, "cluster-2", HypervisorType::BareMetal));
        let id = inv.next_host_id().unwrap();
        inv.save_host(&HostRecord::new(id, HostType::Routing)).unwrap();
        inv.save(&path).unwrap();

        let loaded = MemoryInventory::load(&path).unwrap();
        assert!(loaded.find_zone(1).unwrap().is_some());
        assert_eq!(loaded.find_cluster(2).unwrap().unwrap().hypervisor_type, HypervisorType::BareMetal);
        assert_eq!(loaded.list_hosts().unwrap().len(), 1);
        assert_eq!(loaded.next_host_id().unwrap(), id + 1);
    }

    #[test]
    fn test_load_missing_file_starts_empty() {
        let temp = TempDir::new().unwrap();
        let inv = MemoryInventory::load(temp.path().join("absent.json")).unwrap();
        assert!(inv.list_hosts().unwrap().is_empty());
    }
}
