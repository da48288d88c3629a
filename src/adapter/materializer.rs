use std::collections::BTreeMap;
use std::sync::Arc;

use super::HostMaterializer;
use crate::discovery::keys;
use crate::models::*;
use crate::outcome::{DeclineReason, Outcome};
use crate::resource::ServerResource;
use crate::{Error, Result};

/// Generic "fill host record" step shared by routing adapters
#[cfg_attr(test, mockall::automock)]
pub trait HostRecordFiller: Send + Sync {
    fn fill_routing_host(
        &self,
        host: HostRecord,
        startup: &RoutingStartup,
        details: &BTreeMap<String, String>,
        host_tags: &[String],
    ) -> Result<HostRecord>;
}

/// Populates a routing host from its startup announcement.
///
/// Credentials never make it into the persisted details.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoutingHostFiller;

impl HostRecordFiller for RoutingHostFiller {
    fn fill_routing_host(
        &self,
        mut host: HostRecord,
        startup: &RoutingStartup,
        details: &BTreeMap<String, String>,
        host_tags: &[String],
    ) -> Result<HostRecord> {
        if startup.guid.is_empty() {
            return Err(Error::Validation(format!(
                "routing startup from {} carries no guid",
                startup.name
            )));
        }

        host.name = startup.name.clone();
        host.guid = Some(startup.guid.clone());
        host.host_type = HostType::Routing;
        host.hypervisor_type = Some(startup.hypervisor_type);
        host.private_ip = Some(startup.private_ip.clone()).filter(|ip| !ip.is_empty());
        host.mac = startup.mac.clone();
        host.cpus = Some(startup.cpus);
        host.cpu_speed_mhz = Some(startup.cpu_speed_mhz);
        host.memory_bytes = Some(startup.memory_bytes);
        host.host_tags = host_tags.to_vec();
        host.details = details
            .iter()
            .filter(|(k, _)| k.as_str() != keys::PASSWORD)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(host)
    }
}

/// Materializes hosts announced by bare-metal resources
pub struct BareMetalMaterializer {
    filler: Arc<dyn HostRecordFiller>,
}

impl BareMetalMaterializer {
    pub fn new(filler: Arc<dyn HostRecordFiller>) -> Self {
        Self { filler }
    }
}

impl Default for BareMetalMaterializer {
    fn default() -> Self {
        Self::new(Arc::new(RoutingHostFiller))
    }
}

impl HostMaterializer for BareMetalMaterializer {
    fn create_host_for_connected_agent(
        &self,
        _host: &HostRecord,
        _startup: &[StartupCommand],
    ) -> Result<Outcome<HostRecord>> {
        // Reconnecting agents are not ours to materialize
        Ok(Outcome::Declined(DeclineReason::NotApplicable))
    }

    fn create_host_for_direct_connect_agent(
        &self,
        host: HostRecord,
        startup: &[StartupCommand],
        resource: &dyn ServerResource,
        details: &BTreeMap<String, String>,
        host_tags: &[String],
    ) -> Result<Outcome<HostRecord>> {
        let routing = match startup.first().and_then(StartupCommand::as_routing) {
            Some(r) if r.hypervisor_type == HypervisorType::BareMetal => r,
            _ => return Ok(Outcome::Declined(DeclineReason::NotApplicable)),
        };

        let host = self.filler.fill_routing_host(host, routing, details, host_tags)?;
        tracing::debug!(
            host = host.id,
            guid = %resource.guid(),
            resource = %resource.name(),
            "Materialized bare metal host"
        );
        Ok(Outcome::Succeeded(host))
    }
}
