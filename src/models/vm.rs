//! VM bookkeeping model

use serde::{Deserialize, Serialize};

/// State of a VM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VmState {
    Starting,
    /// Currently executing
    Running,
    Stopping,
    /// Shut down, record kept
    Stopped,
    Migrating,
    /// Gone, record awaiting cleanup
    Destroyed,
    Error,
}

impl std::fmt::Display for VmState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VmState::Starting => write!(f, "Starting"),
            VmState::Running => write!(f, "Running"),
            VmState::Stopping => write!(f, "Stopping"),
            VmState::Stopped => write!(f, "Stopped"),
            VmState::Migrating => write!(f, "Migrating"),
            VmState::Destroyed => write!(f, "Destroyed"),
            VmState::Error => write!(f, "Error"),
        }
    }
}

/// Link between a VM and the hosts it ran on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmAssociation {
    pub vm_id: u64,
    pub name: String,
    /// Host the VM is placed on right now
    pub host_id: Option<u64>,
    /// Host the VM last ran on
    pub last_host_id: Option<u64>,
    pub state: VmState,
}

impl VmAssociation {
    pub fn new(vm_id: u64, name: impl Into<String>, state: VmState) -> Self {
        Self {
            vm_id,
            name: name.into(),
            host_id: None,
            last_host_id: None,
            state,
        }
    }

    pub fn on_host(mut self, host_id: u64) -> Self {
        self.host_id = Some(host_id);
        self.last_host_id = Some(host_id);
        self
    }

    pub fn last_on(mut self, host_id: u64) -> Self {
        self.last_host_id = Some(host_id);
        self
    }

    /// Placed on `host_id` now, or last ran there
    pub fn references_host(&self, host_id: u64) -> bool {
        self.host_id == Some(host_id) || self.last_host_id == Some(host_id)
    }

    /// A VM that is running or still placed on a host keeps its last host alive
    pub fn is_active(&self) -> bool {
        self.state == VmState::Running || self.host_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vm_state_display() {
        assert_eq!(VmState::Running.to_string(), "Running");
        assert_eq!(VmState::Stopped.to_string(), "Stopped");
    }

    #[test]
    fn test_vm_is_active() {
        let stopped = VmAssociation::new(1, "vm-1", VmState::Stopped).last_on(10);
        assert!(!stopped.is_active());

        let running = VmAssociation::new(2, "vm-2", VmState::Running).last_on(10);
        assert!(running.is_active());

        let placed = VmAssociation::new(3, "vm-3", VmState::Stopped).on_host(10);
        assert!(placed.is_active());
        assert_eq!(placed.last_host_id, Some(10));
    }
}
