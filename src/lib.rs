//! Host fleet orchestration
//!
//! Two long-lived entity lifecycles over a fleet of managed hosts:
//!
//! - **Autoscale VM groups** are created in two phases. [`CommandLifecycleController::create`]
//!   allocates a dormant group owned by the load balancer rule's account and
//!   [`CommandLifecycleController::execute`] activates it, deleting the group
//!   again if activation fails.
//! - **Bare-metal hosts** are discovered through their out-of-band
//!   management interface by [`BareMetalDiscoverer`], materialized into host
//!   records through the [`AdapterRegistry`], and guarded against deletion
//!   while VMs still run on them.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use hostfleet::{
//!     BareMetalDiscoverer, DiscoveryRequest, FleetConfig, FleetManager, MemoryInventory,
//!     ResourceStateAdapter, ScriptProbe, SystemResolver,
//! };
//!
//! let config = FleetConfig::builder().search_path("/usr/share/fleet").build_validated()?;
//! let inventory = MemoryInventory::load("fleet.json")?;
//!
//! let discoverer = BareMetalDiscoverer::new(
//!     Arc::new(inventory.clone()),
//!     Arc::new(inventory.clone()),
//!     Arc::new(ScriptProbe::from_config(&config)?),
//!     Arc::new(SystemResolver),
//! )
//! .with_config(&config);
//!
//! let fleet = FleetManager::new(Arc::new(inventory.clone()), config.management_server_id);
//! fleet.start_component(
//!     Arc::new(discoverer),
//!     ResourceStateAdapter::bare_metal(Arc::new(inventory.clone())),
//! )?;
//!
//! let request = DiscoveryRequest::new(1, "http://10.0.0.5")
//!     .pod(2)
//!     .cluster(3)
//!     .credentials("admin", "secret");
//! let hosts = fleet.add_host(&request)?;
//!
//! inventory.save("fleet.json")?;
//! # Ok::<(), hostfleet::Error>(())
//! ```

pub mod adapter;
pub mod command;
pub mod config;
pub mod discovery;
pub mod error;
pub mod fleet;
pub mod inventory;
pub mod locks;
pub mod models;
pub mod outcome;
pub mod probe;
pub mod resource;
pub mod secret;

pub use adapter::{AdapterRegistry, DeleteHostAnswer, HostLifecycleGuard, ResourceStateAdapter};
pub use command::{CommandLifecycleController, CreateAutoScaleGroupCmd};
pub use config::FleetConfig;
pub use discovery::{BareMetalDiscoverer, DiscoveredResource, BARE_METAL_DISCOVERER, Discoverer, DiscoveryRequest, SystemResolver};
pub use error::{Error, Result};
pub use fleet::FleetManager;
pub use inventory::MemoryInventory;
pub use outcome::{DeclineReason, Outcome};
pub use probe::{ResourceProbe, ScriptProbe};
pub use secret::Secret;
