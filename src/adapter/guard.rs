use std::sync::Arc;

use super::{DeleteHostAnswer, HostDeletionGuard};
use crate::inventory::VmStore;
use crate::models::*;
use crate::outcome::{DeclineReason, Outcome};
use crate::{Error, Result};

/// Vetoes deletion of bare-metal hosts that still carry VMs and garbage
/// collects the VM bookkeeping of those that don't.
pub struct HostLifecycleGuard {
    vms: Arc<dyn VmStore>,
}

impl HostLifecycleGuard {
    pub fn new(vms: Arc<dyn VmStore>) -> Self {
        Self { vms }
    }
}

impl HostDeletionGuard for HostLifecycleGuard {
    /// The force flags are accepted for symmetry with other guards and are
    /// not consulted: an active VM always blocks deletion.
    fn delete_host(
        &self,
        host: &HostRecord,
        _is_forced: bool,
        _is_force_delete_storage: bool,
    ) -> Result<Outcome<DeleteHostAnswer>> {
        if !host.is_routing_for(HypervisorType::BareMetal) {
            return Ok(Outcome::Declined(DeclineReason::NotApplicable));
        }

        let vms = self.vms.list_for_host(host.id)?;
        if let Some(vm) = vms.iter().find(|vm| vm.is_active()) {
            tracing::warn!(host = host.id, vm = vm.vm_id, state = %vm.state, "Host still has an active VM");
            return Err(Error::HostBusy {
                vm_id: vm.vm_id,
                host_id: host.id,
            });
        }

        // Re-validated by the store under its own lock
        let removed_vms = self.vms.remove_stale_for_host(host.id)?;
        tracing::info!(host = host.id, removed = removed_vms.len(), "Cleared VM records of deleted host");

        Ok(Outcome::Succeeded(DeleteHostAnswer {
            success: true,
            removed_vms,
        }))
    }
}
