//! Server resource handles produced by discovery

use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

use parking_lot::RwLock;

use crate::discovery::keys;
use crate::models::*;
use crate::{Error, Result};

/// State of a resource handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    Configured,
    Running,
    Stopped,
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceState::Configured => write!(f, "Configured"),
            ResourceState::Running => write!(f, "Running"),
            ResourceState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Agent-side handle to a managed host
pub trait ServerResource: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;
    fn guid(&self) -> &str;
    fn hypervisor_type(&self) -> HypervisorType;
    /// Startup announcements sent when the fleet manager connects to it
    fn initialize(&self) -> Vec<StartupCommand>;
    fn start(&self) -> Result<()>;
    fn stop(&self) -> Result<()>;
    fn state(&self) -> ResourceState;

    fn is_running(&self) -> bool {
        self.state() == ResourceState::Running
    }
}

/// Resource handle for a bare-metal host reached over its management interface
pub struct BareMetalResource {
    name: String,
    guid: String,
    params: BTreeMap<String, String>,
    state: RwLock<ResourceState>,
    started_at: RwLock<Option<Instant>>,
}

/// The `memory` parameter is in MiB
const BYTES_PER_MIB: u64 = 1024 * 1024;

const REQUIRED_PARAMS: [&str; 5] = [keys::ZONE, keys::POD, keys::CLUSTER, keys::GUID, keys::PRIVATE_IP];

impl BareMetalResource {
    pub fn configure(name: impl Into<String>, params: BTreeMap<String, String>) -> Result<Self> {
        let name = name.into();
        if let Some(missing) = REQUIRED_PARAMS.iter().find(|k| !params.contains_key(**k)) {
            return Err(Error::Validation(format!(
                "resource '{}' is missing parameter '{}'",
                name, missing
            )));
        }
        let guid = params[keys::GUID].clone();

        Ok(Self {
            name,
            guid,
            params,
            state: RwLock::new(ResourceState::Configured),
            started_at: RwLock::new(None),
        })
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn uptime(&self) -> Option<std::time::Duration> {
        self.started_at.read().map(|t| t.elapsed())
    }

    fn numeric<T: std::str::FromStr + Default>(&self, key: &str) -> T {
        self.param(key).and_then(|v| v.parse().ok()).unwrap_or_default()
    }
}

impl ServerResource for BareMetalResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn guid(&self) -> &str {
        &self.guid
    }

    fn hypervisor_type(&self) -> HypervisorType {
        HypervisorType::BareMetal
    }

    fn initialize(&self) -> Vec<StartupCommand> {
        vec![StartupCommand::Routing(RoutingStartup {
            name: self.param(keys::PRIVATE_IP).unwrap_or(&self.name).to_string(),
            guid: self.guid.clone(),
            hypervisor_type: HypervisorType::BareMetal,
            private_ip: self.param(keys::PRIVATE_IP).unwrap_or_default().to_string(),
            cpus: self.numeric(keys::CPU_NUMBER),
            cpu_speed_mhz: self.numeric(keys::CPU_SPEED),
            memory_bytes: self.numeric::<u64>(keys::MEMORY).saturating_mul(BYTES_PER_MIB),
            mac: self.param(keys::HOST_MAC).map(str::to_string),
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
        })]
    }

    fn start(&self) -> Result<()> {
        let mut state = self.state.write();
        if *state != ResourceState::Running {
            *state = ResourceState::Running;
            *self.started_at.write() = Some(Instant::now());
            tracing::info!(resource = %self.name, guid = %self.guid, "Resource started");
        }
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        let mut state = self.state.write();
        if *state == ResourceState::Running {
            tracing::info!(resource = %self.name, guid = %self.guid, "Resource stopped");
        }
        *state = ResourceState::Stopped;
        *self.started_at.write() = None;
        Ok(())
    }

    fn state(&self) -> ResourceState {
        *self.state.read()
    }
}

impl fmt::Debug for BareMetalResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BareMetalResource")
            .field("name", &self.name)
            .field("guid", &self.guid)
            .field("address", &self.param(keys::PRIVATE_IP))
            .field("state", &self.state())
            .finish()
    }
}
