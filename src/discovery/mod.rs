//! Host discovery
//!
//! A [`Discoverer`] recognises new host endpoints for one hypervisor family.
//! The fleet manager offers each endpoint to its discoverers in turn; a
//! discoverer that does not apply declines instead of failing.

mod baremetal;
mod endpoint;
mod identity;

pub use baremetal::{BareMetalDiscoverer, BARE_METAL_DISCOVERER};
pub use endpoint::Endpoint;
pub use identity::{host_guid, AddressResolver, SystemResolver};

#[cfg(test)]
pub use identity::MockAddressResolver;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::models::*;
use crate::outcome::Outcome;
use crate::resource::ServerResource;
use crate::secret::{Secret, REDACTED};
use crate::Result;

/// Keys used in discovery details and resource parameters
pub mod keys {
    pub const ZONE: &str = "zone";
    pub const POD: &str = "pod";
    pub const CLUSTER: &str = "cluster";
    pub const GUID: &str = "guid";
    pub const PRIVATE_IP: &str = "privateip";
    pub const USERNAME: &str = "username";
    pub const PASSWORD: &str = "password";
    pub const MEMORY: &str = "memory";
    pub const CPU_SPEED: &str = "cpuspeed";
    pub const CPU_NUMBER: &str = "cpunumber";
    pub const HOST_MAC: &str = "hostmac";
    pub const HOST_TAG: &str = "hostTag";
}

#[derive(Debug, Clone)]
pub struct DiscoveryRequest {
    pub zone_id: u64,
    pub pod_id: Option<u64>,
    pub cluster_id: Option<u64>,
    pub endpoint: String,
    pub username: String,
    pub password: Secret,
    pub host_tags: Vec<String>,
}

impl DiscoveryRequest {
    pub fn new(zone_id: u64, endpoint: impl Into<String>) -> Self {
        Self {
            zone_id,
            pod_id: None,
            cluster_id: None,
            endpoint: endpoint.into(),
            username: String::new(),
            password: Secret::default(),
            host_tags: Vec::new(),
        }
    }

    pub fn pod(mut self, pod_id: u64) -> Self {
        self.pod_id = Some(pod_id);
        self
    }

    pub fn cluster(mut self, cluster_id: u64) -> Self {
        self.cluster_id = Some(cluster_id);
        self
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<Secret>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.host_tags.push(tag.into());
        self
    }
}

/// A host recognised by a discoverer, ready to be materialized
#[derive(Clone)]
pub struct DiscoveredResource {
    pub resource: Arc<dyn ServerResource>,
    /// Capability attributes, credentials and derived identity
    pub details: BTreeMap<String, String>,
}

impl DiscoveredResource {
    pub fn detail(&self, key: &str) -> Option<&str> {
        self.details.get(key).map(String::as_str)
    }
}

impl fmt::Debug for DiscoveredResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let details: BTreeMap<&str, &str> = self
            .details
            .iter()
            .map(|(k, v)| {
                let v = if k == keys::PASSWORD { REDACTED } else { v.as_str() };
                (k.as_str(), v)
            })
            .collect();
        f.debug_struct("DiscoveredResource")
            .field("resource", &self.resource)
            .field("details", &details)
            .finish()
    }
}

pub trait Discoverer: Send + Sync {
    fn name(&self) -> &str;

    fn hypervisor_type(&self) -> HypervisorType;

    fn matches_hypervisor(&self, hypervisor: &str) -> bool {
        self.hypervisor_type().to_string().eq_ignore_ascii_case(hypervisor)
    }

    /// Try to recognise the endpoint in `request`.
    ///
    /// `Ok(Declined)` when this discoverer does not apply or the host could
    /// not be reached; `Err` only for malformed or contradictory input.
    fn find(&self, request: &DiscoveryRequest) -> Result<Outcome<Vec<DiscoveredResource>>>;

    /// Called once discovered hosts have been persisted
    fn post_discovery(&self, _hosts: &[HostRecord], _management_server_id: u64) -> Result<()> {
        Ok(())
    }
}
