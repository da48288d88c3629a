//! Startup announcements sent by connecting agents

use super::HypervisorType;
use serde::{Deserialize, Serialize};

/// Sent by an agent whose host can run guest VMs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingStartup {
    pub name: String,
    pub guid: String,
    pub hypervisor_type: HypervisorType,
    pub private_ip: String,
    pub cpus: u32,
    pub cpu_speed_mhz: u64,
    pub memory_bytes: u64,
    pub mac: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartupCommand {
    Routing(RoutingStartup),
    Storage { name: String, guid: String },
    Proxy { name: String, guid: String },
}

impl StartupCommand {
    pub fn as_routing(&self) -> Option<&RoutingStartup> {
        match self {
            StartupCommand::Routing(r) => Some(r),
            _ => None,
        }
    }
}
