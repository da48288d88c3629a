//! Host lifecycle adapters
//!
//! When an agent connects, the fleet manager asks each registered adapter in
//! turn to turn its startup announcements into a host record; when a host is
//! decommissioned, each adapter's deletion guard may veto the removal. An
//! adapter that does not own the host declines and the next one is asked.

mod guard;
mod materializer;
mod registry;

pub use guard::HostLifecycleGuard;
pub use materializer::{BareMetalMaterializer, HostRecordFiller, RoutingHostFiller};
pub use registry::AdapterRegistry;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::inventory::VmStore;
use crate::models::*;
use crate::outcome::Outcome;
use crate::resource::ServerResource;
use crate::Result;

pub trait HostMaterializer: Send + Sync {
    /// Materialize a record for an agent that is reconnecting
    fn create_host_for_connected_agent(
        &self,
        host: &HostRecord,
        startup: &[StartupCommand],
    ) -> Result<Outcome<HostRecord>>;

    /// Materialize a record for a freshly discovered, directly managed resource.
    ///
    /// `Ok(Declined)` when the startup payload is not one this adapter owns;
    /// `Err` when it is but the record could not be filled.
    fn create_host_for_direct_connect_agent(
        &self,
        host: HostRecord,
        startup: &[StartupCommand],
        resource: &dyn ServerResource,
        details: &BTreeMap<String, String>,
        host_tags: &[String],
    ) -> Result<Outcome<HostRecord>>;
}

#[cfg_attr(test, mockall::automock)]
pub trait HostDeletionGuard: Send + Sync {
    /// Approve removal of `host` after cleaning up what this adapter owns.
    ///
    /// Fails with [`crate::Error::HostBusy`] when the host still carries work.
    fn delete_host(
        &self,
        host: &HostRecord,
        is_forced: bool,
        is_force_delete_storage: bool,
    ) -> Result<Outcome<DeleteHostAnswer>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteHostAnswer {
    pub success: bool,
    /// VM bookkeeping records removed along with the host
    pub removed_vms: Vec<u64>,
}

/// A registered adapter: one materializer and one deletion guard
#[derive(Clone)]
pub struct ResourceStateAdapter {
    pub materializer: Arc<dyn HostMaterializer>,
    pub guard: Arc<dyn HostDeletionGuard>,
}

impl ResourceStateAdapter {
    pub fn new(materializer: Arc<dyn HostMaterializer>, guard: Arc<dyn HostDeletionGuard>) -> Self {
        Self { materializer, guard }
    }

    /// Adapter paired with the bare-metal discoverer
    pub fn bare_metal(vms: Arc<dyn VmStore>) -> Self {
        Self::new(
            Arc::new(BareMetalMaterializer::default()),
            Arc::new(HostLifecycleGuard::new(vms)),
        )
    }
}
