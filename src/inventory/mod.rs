//! Persistence boundary
//!
//! The orchestration core talks to storage only through these narrow traits.
//! [`MemoryInventory`] implements all of them and can be snapshotted to a
//! JSON file.

mod memory;

pub use memory::MemoryInventory;

use crate::models::*;
use crate::Result;

#[cfg_attr(test, mockall::automock)]
pub trait ClusterStore: Send + Sync {
    fn find_cluster(&self, id: u64) -> Result<Option<ClusterRecord>>;
    fn update_cluster(&self, cluster: &ClusterRecord) -> Result<()>;
}

#[cfg_attr(test, mockall::automock)]
pub trait ZoneStore: Send + Sync {
    fn find_zone(&self, id: u64) -> Result<Option<ZoneRecord>>;
    fn update_zone(&self, zone: &ZoneRecord) -> Result<()>;
}

#[cfg_attr(test, mockall::automock)]
pub trait HostStore: Send + Sync {
    fn next_host_id(&self) -> Result<u64>;
    fn find_host(&self, id: u64) -> Result<Option<HostRecord>>;
    fn find_host_by_guid(&self, guid: &str) -> Result<Option<HostRecord>>;
    fn list_hosts(&self) -> Result<Vec<HostRecord>>;
    /// Insert or replace
    fn save_host(&self, host: &HostRecord) -> Result<()>;
    fn remove_host(&self, id: u64) -> Result<bool>;
}

#[cfg_attr(test, mockall::automock)]
pub trait VmStore: Send + Sync {
    /// Every VM whose last host is `host_id`
    fn list_by_last_host(&self, host_id: u64) -> Result<Vec<VmAssociation>>;

    /// Every VM currently placed on `host_id` or whose last host it is
    fn list_for_host(&self, host_id: u64) -> Result<Vec<VmAssociation>>;

    /// Drop every VM record whose last host is `host_id`, all or nothing.
    ///
    /// Implementations must re-check every record returned by
    /// [`VmStore::list_for_host`] under the same lock that guards the removal
    /// and fail with [`crate::Error::HostBusy`] without removing anything if
    /// one of them is active.
    fn remove_stale_for_host(&self, host_id: u64) -> Result<Vec<u64>>;
}
