//! Discovery of bare-metal hosts through their out-of-band management interface

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;

use uuid::Uuid;

use super::{host_guid, keys, AddressResolver, DiscoveredResource, Discoverer, DiscoveryRequest, Endpoint};
use crate::config::FleetConfig;
use crate::inventory::{ClusterStore, ZoneStore};
use crate::locks::KeyedLocks;
use crate::models::*;
use crate::outcome::{DeclineReason, Outcome};
use crate::probe::{Capabilities, ProbeTarget, ResourceProbe};
use crate::resource::{BareMetalResource, ServerResource};
use crate::secret::REDACTED;
use crate::{Error, Result};

const SCHEME: &str = "http";

/// Component name; the paired adapter is registered under the same name
pub const BARE_METAL_DISCOVERER: &str = "BareMetalDiscoverer";

pub struct BareMetalDiscoverer {
    clusters: Arc<dyn ClusterStore>,
    zones: Arc<dyn ZoneStore>,
    probe: Arc<dyn ResourceProbe>,
    resolver: Arc<dyn AddressResolver>,
    agent_name: String,
    defaults: BTreeMap<String, String>,
    cluster_locks: KeyedLocks<u64>,
    zone_locks: KeyedLocks<u64>,
}

impl BareMetalDiscoverer {
    pub fn new(
        clusters: Arc<dyn ClusterStore>,
        zones: Arc<dyn ZoneStore>,
        probe: Arc<dyn ResourceProbe>,
        resolver: Arc<dyn AddressResolver>,
    ) -> Self {
        let config = FleetConfig::default();
        Self {
            clusters,
            zones,
            probe,
            resolver,
            agent_name: config.agent_name,
            defaults: config.discovery_defaults,
            cluster_locks: KeyedLocks::new(),
            zone_locks: KeyedLocks::new(),
        }
    }

    pub fn with_config(mut self, config: &FleetConfig) -> Self {
        self.agent_name = config.agent_name.clone();
        self.defaults = config.discovery_defaults.clone();
        self
    }

    /// Everything after input validation. Errors here are absorbed by `find`.
    fn discover(
        &self,
        request: &DiscoveryRequest,
        endpoint: &Endpoint,
        pod_id: u64,
        cluster_id: u64,
    ) -> Result<Outcome<Vec<DiscoveredResource>>> {
        let address = self.resolver.resolve(&endpoint.host)?.to_canonical();
        let guid = host_guid(&address);

        let target = ProbeTarget {
            address,
            username: request.username.clone(),
            password: request.password.clone(),
        };
        let caps = match self.probe.ping(&target) {
            Ok(caps) => caps,
            Err(e) => {
                tracing::warn!(
                    ip = %address,
                    username = %request.username,
                    password = REDACTED,
                    reason = %e,
                    "Can not set up ipmi connection"
                );
                return Ok(Outcome::Declined(DeclineReason::ProbeFailed(e.to_string())));
            }
        };

        self.stamp_cluster(cluster_id)?;

        let params = self.resource_params(request, pod_id, cluster_id, &guid, &address, &caps);
        let resource = Arc::new(BareMetalResource::configure(self.agent_name.clone(), params)?);
        let details = self.details(request, &address, &caps);

        resource.start()?;
        if let Err(e) = self.use_external_providers(request.zone_id) {
            resource.stop()?;
            return Err(e);
        }

        tracing::debug!(
            ip = %address,
            username = %request.username,
            password = REDACTED,
            cpu_num = caps.cpu_number.as_deref().unwrap_or_default(),
            cpu_capacity = caps.cpu_speed.as_deref().unwrap_or_default(),
            mem_capacity = caps.memory.as_deref().unwrap_or_default(),
            "Discover Bare Metal host successfully"
        );

        Ok(Outcome::Succeeded(vec![DiscoveredResource {
            resource: resource as Arc<dyn ServerResource>,
            details,
        }]))
    }

    /// First successful discovery in a cluster gives the cluster its guid
    fn stamp_cluster(&self, cluster_id: u64) -> Result<()> {
        self.cluster_locks.with(&cluster_id, || {
            let mut cluster = self
                .clusters
                .find_cluster(cluster_id)?
                .ok_or_else(|| Error::NotFound(format!("cluster {}", cluster_id)))?;
            if cluster.guid.is_none() {
                let guid = Uuid::new_v4().to_string();
                tracing::info!(cluster = cluster_id, guid = %guid, "Assigning cluster guid");
                cluster.guid = Some(guid);
                self.clusters.update_cluster(&cluster)?;
            }
            Ok(())
        })
    }

    fn use_external_providers(&self, zone_id: u64) -> Result<()> {
        self.zone_locks.with(&zone_id, || {
            let mut zone = self
                .zones
                .find_zone(zone_id)?
                .ok_or(Error::UnknownZone(zone_id))?;
            zone.use_external_providers();
            self.zones.update_zone(&zone)
        })
    }

    fn resource_params(
        &self,
        request: &DiscoveryRequest,
        pod_id: u64,
        cluster_id: u64,
        guid: &str,
        address: &IpAddr,
        caps: &Capabilities,
    ) -> BTreeMap<String, String> {
        let mut params = self.defaults.clone();
        for (key, value) in capability_entries(caps) {
            params.insert(key.to_string(), value.to_string());
        }
        params.insert(keys::ZONE.into(), request.zone_id.to_string());
        params.insert(keys::POD.into(), pod_id.to_string());
        params.insert(keys::CLUSTER.into(), cluster_id.to_string());
        params.insert(keys::GUID.into(), guid.to_string());
        params.insert(keys::PRIVATE_IP.into(), address.to_string());
        params.insert(keys::USERNAME.into(), request.username.clone());
        params.insert(keys::PASSWORD.into(), request.password.expose().to_string());
        params
    }

    fn details(&self, request: &DiscoveryRequest, address: &IpAddr, caps: &Capabilities) -> BTreeMap<String, String> {
        let mut details = BTreeMap::new();
        // Only the first tag is recorded
        if let Some(tag) = request.host_tags.first() {
            details.insert(keys::HOST_TAG.to_string(), tag.clone());
        }
        for (key, value) in capability_entries(caps) {
            details.insert(key.to_string(), value.to_string());
        }
        details.insert(keys::USERNAME.to_string(), request.username.clone());
        details.insert(keys::PASSWORD.to_string(), request.password.expose().to_string());
        details.insert(keys::PRIVATE_IP.to_string(), address.to_string());
        details
    }
}

fn capability_entries(caps: &Capabilities) -> impl Iterator<Item = (&'static str, &str)> {
    [
        (keys::MEMORY, caps.memory.as_deref()),
        (keys::CPU_SPEED, caps.cpu_speed.as_deref()),
        (keys::CPU_NUMBER, caps.cpu_number.as_deref()),
        (keys::HOST_MAC, caps.mac.as_deref()),
    ]
    .into_iter()
    .filter_map(|(k, v)| v.map(|v| (k, v)))
}

impl Discoverer for BareMetalDiscoverer {
    fn name(&self) -> &str {
        BARE_METAL_DISCOVERER
    }

    fn hypervisor_type(&self) -> HypervisorType {
        HypervisorType::BareMetal
    }

    fn find(&self, request: &DiscoveryRequest) -> Result<Outcome<Vec<DiscoveredResource>>> {
        let endpoint = Endpoint::parse(&request.endpoint)?;
        if endpoint.scheme != SCHEME {
            tracing::debug!(
                url = %request.endpoint,
                "urlString is not http so we're not taking care of the discovery for this"
            );
            return Ok(Outcome::Declined(DeclineReason::UnsupportedScheme(endpoint.scheme)));
        }

        let cluster_id = request.cluster_id.ok_or(Error::MissingRequiredField("clusterId"))?;
        let pod_id = request.pod_id.ok_or(Error::MissingRequiredField("podId"))?;

        match self.clusters.find_cluster(cluster_id)? {
            Some(cluster) if cluster.hypervisor_type == HypervisorType::BareMetal => {}
            _ => {
                tracing::info!(cluster = cluster_id, "invalid cluster id or cluster is not for Bare Metal hosts");
                return Ok(Outcome::Declined(DeclineReason::HypervisorMismatch));
            }
        }

        if self.zones.find_zone(request.zone_id)?.is_none() {
            return Err(Error::UnknownZone(request.zone_id));
        }

        match self.discover(request, &endpoint, pod_id, cluster_id) {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::warn!(url = %request.endpoint, error = %e, "Can not set up bare metal agent");
                Ok(Outcome::Declined(DeclineReason::Unexpected(e.to_string())))
            }
        }
    }
}
