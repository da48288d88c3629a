//! Zone, cluster and host records

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Hypervisor family managing a cluster or host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HypervisorType {
    BareMetal,
    Kvm,
    XenServer,
    VMware,
    Hyperv,
}

impl std::fmt::Display for HypervisorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HypervisorType::BareMetal => write!(f, "BareMetal"),
            HypervisorType::Kvm => write!(f, "KVM"),
            HypervisorType::XenServer => write!(f, "XenServer"),
            HypervisorType::VMware => write!(f, "VMware"),
            HypervisorType::Hyperv => write!(f, "Hyperv"),
        }
    }
}

impl FromStr for HypervisorType {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        [
            HypervisorType::BareMetal,
            HypervisorType::Kvm,
            HypervisorType::XenServer,
            HypervisorType::VMware,
            HypervisorType::Hyperv,
        ]
        .into_iter()
        .find(|h| h.to_string().eq_ignore_ascii_case(s))
        .ok_or_else(|| crate::Error::Validation(format!("unknown hypervisor type '{}'", s)))
    }
}

/// Role a host plays in the fleet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostType {
    /// Runs guest VMs
    Routing,
    Storage,
    ConsoleProxy,
    ExternalDhcp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostState {
    Creating,
    Connecting,
    Up,
    Down,
    Disconnected,
}

impl std::fmt::Display for HostState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostState::Creating => write!(f, "Creating"),
            HostState::Connecting => write!(f, "Connecting"),
            HostState::Up => write!(f, "Up"),
            HostState::Down => write!(f, "Down"),
            HostState::Disconnected => write!(f, "Disconnected"),
        }
    }
}

/// Network service providers a zone can be configured with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkProvider {
    VirtualRouter,
    ExternalGateWay,
    ExternalDhcpServer,
}

impl NetworkProvider {
    pub fn name(&self) -> &'static str {
        match self {
            NetworkProvider::VirtualRouter => "VirtualRouter",
            NetworkProvider::ExternalGateWay => "ExternalGateWay",
            NetworkProvider::ExternalDhcpServer => "ExternalDhcpServer",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneRecord {
    pub id: u64,
    pub name: String,
    pub gateway_provider: Option<String>,
    pub dns_provider: Option<String>,
    pub dhcp_provider: Option<String>,
}

impl ZoneRecord {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            gateway_provider: None,
            dns_provider: None,
            dhcp_provider: None,
        }
    }

    /// Hand gateway, DNS and DHCP over to external providers
    pub fn use_external_providers(&mut self) {
        self.gateway_provider = Some(NetworkProvider::ExternalGateWay.name().to_string());
        self.dns_provider = Some(NetworkProvider::ExternalDhcpServer.name().to_string());
        self.dhcp_provider = Some(NetworkProvider::ExternalDhcpServer.name().to_string());
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterRecord {
    pub id: u64,
    pub pod_id: u64,
    pub name: String,
    pub hypervisor_type: HypervisorType,
    /// Stamped by the first successful discovery in this cluster
    pub guid: Option<String>,
}

impl ClusterRecord {
    pub fn new(id: u64, pod_id: u64, name: impl Into<String>, hypervisor_type: HypervisorType) -> Self {
        Self {
            id,
            pod_id,
            name: name.into(),
            hypervisor_type,
            guid: None,
        }
    }
}

/// A fleet member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRecord {
    pub id: u64,
    pub name: String,
    /// Derived from the management address; stable across rediscovery
    pub guid: Option<String>,
    pub host_type: HostType,
    pub hypervisor_type: Option<HypervisorType>,
    pub state: HostState,
    pub zone_id: Option<u64>,
    pub pod_id: Option<u64>,
    pub cluster_id: Option<u64>,
    pub private_ip: Option<String>,
    pub mac: Option<String>,
    pub cpus: Option<u32>,
    pub cpu_speed_mhz: Option<u64>,
    pub memory_bytes: Option<u64>,
    pub host_tags: Vec<String>,
    #[serde(default)]
    pub details: BTreeMap<String, String>,
}

impl HostRecord {
    /// Skeleton record handed to materialization hooks before filling
    pub fn new(id: u64, host_type: HostType) -> Self {
        Self {
            id,
            name: String::new(),
            guid: None,
            host_type,
            hypervisor_type: None,
            state: HostState::Creating,
            zone_id: None,
            pod_id: None,
            cluster_id: None,
            private_ip: None,
            mac: None,
            cpus: None,
            cpu_speed_mhz: None,
            memory_bytes: None,
            host_tags: Vec::new(),
            details: BTreeMap::new(),
        }
    }

    pub fn with_hypervisor(mut self, hypervisor: HypervisorType) -> Self {
        self.hypervisor_type = Some(hypervisor);
        self
    }

    pub fn is_routing_for(&self, hypervisor: HypervisorType) -> bool {
        self.host_type == HostType::Routing && self.hypervisor_type == Some(hypervisor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hypervisor_parse_is_case_insensitive() {
        assert_eq!("baremetal".parse::<HypervisorType>().unwrap(), HypervisorType::BareMetal);
        assert_eq!("kvm".parse::<HypervisorType>().unwrap(), HypervisorType::Kvm);
        assert!("qemu".parse::<HypervisorType>().is_err());
    }

    #[test]
    fn test_zone_external_providers() {
        let mut zone = ZoneRecord::new(1, "zone-1");
        zone.use_external_providers();
        assert_eq!(zone.gateway_provider.as_deref(), Some("ExternalGateWay"));
        assert_eq!(zone.dns_provider.as_deref(), Some("ExternalDhcpServer"));
        assert_eq!(zone.dhcp_provider.as_deref(), Some("ExternalDhcpServer"));
    }

    #[test]
    fn test_host_routing_check() {
        let host = HostRecord::new(1, HostType::Routing).with_hypervisor(HypervisorType::BareMetal);
        assert!(host.is_routing_for(HypervisorType::BareMetal));
        assert!(!host.is_routing_for(HypervisorType::Kvm));

        let storage = HostRecord::new(2, HostType::Storage).with_hypervisor(HypervisorType::BareMetal);
        assert!(!storage.is_routing_for(HypervisorType::BareMetal));
        assert_eq!(storage.state, HostState::Creating);
    }
}
