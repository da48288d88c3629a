//! hostfleet CLI

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use hostfleet::command::{COMMAND_NAME, RESULT_OBJECT_NAME};
use hostfleet::models::*;
use hostfleet::{
    BareMetalDiscoverer, CommandLifecycleController, DiscoveryRequest, FleetConfig, FleetManager, MemoryInventory,
    Outcome, ResourceStateAdapter, ScriptProbe, SystemResolver, BARE_METAL_DISCOVERER,
};

type CliResult<T> = std::result::Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "hostfleet")]
#[command(about = "Bare-metal host discovery and autoscale group orchestration", long_about = None)]
struct Cli {
    /// Inventory snapshot kept between invocations
    #[arg(long, global = true, default_value = "hostfleet.json")]
    state: PathBuf,
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Autoscale VM groups
    Autoscale {
        #[command(subcommand)]
        action: AutoscaleAction,
    },
    /// Discover a bare-metal host and add it to the fleet
    Discover {
        #[arg(long)]
        zone: u64,
        #[arg(long)]
        pod: Option<u64>,
        #[arg(long)]
        cluster: Option<u64>,
        /// Management endpoint, e.g. http://10.0.0.5
        #[arg(long)]
        url: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        /// Host tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Fleet hosts
    Host {
        #[command(subcommand)]
        action: HostAction,
    },
    /// Zones
    Zone {
        #[command(subcommand)]
        action: ZoneAction,
    },
    /// Clusters
    Cluster {
        #[command(subcommand)]
        action: ClusterAction,
    },
    /// Load balancer rules
    Lb {
        #[command(subcommand)]
        action: LbAction,
    },
}

#[derive(Subcommand)]
enum AutoscaleAction {
    /// Create and activate a group
    Create {
        #[arg(long)]
        lb_rule: u64,
        #[arg(long)]
        min: u32,
        #[arg(long)]
        max: u32,
        /// Seconds between policy evaluations
        #[arg(long)]
        interval: Option<u32>,
        #[arg(long = "scale-up", required = true)]
        scale_up: Vec<u64>,
        #[arg(long = "scale-down", required = true)]
        scale_down: Vec<u64>,
        /// VM profile id
        #[arg(long)]
        profile: u64,
    },
    /// List groups
    List,
}

#[derive(Subcommand)]
enum HostAction {
    Delete {
        #[arg(long)]
        id: u64,
        #[arg(long)]
        forced: bool,
        #[arg(long)]
        force_delete_storage: bool,
    },
    List,
}

#[derive(Subcommand)]
enum ZoneAction {
    Add {
        #[arg(long)]
        id: u64,
        #[arg(long)]
        name: String,
    },
}

#[derive(Subcommand)]
enum ClusterAction {
    Add {
        #[arg(long)]
        id: u64,
        #[arg(long)]
        pod: u64,
        #[arg(long)]
        name: String,
        /// Hypervisor type, e.g. BareMetal
        #[arg(long, default_value = "BareMetal")]
        hypervisor: String,
    },
}

#[derive(Subcommand)]
enum LbAction {
    Add {
        #[arg(long)]
        id: u64,
        /// Owning account
        #[arg(long)]
        account: u64,
        #[arg(long)]
        name: String,
    },
}

#[tokio::main]
async fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive("hostfleet=info".parse()?))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => FleetConfig::from_file(path)?,
        None => FleetConfig::default(),
    };
    let inventory = MemoryInventory::load(&cli.state)?;

    match cli.command {
        Commands::Autoscale { action } => handle_autoscale(&inventory, action).await?,
        Commands::Discover {
            zone,
            pod,
            cluster,
            url,
            username,
            password,
            tags,
        } => {
            let mut request = DiscoveryRequest::new(zone, url).credentials(username, password);
            request.pod_id = pod;
            request.cluster_id = cluster;
            request.host_tags = tags;
            cmd_discover(&inventory, &config, request).await?;
        }
        Commands::Host { action } => handle_host(&inventory, &config, action).await?,
        Commands::Zone {
            action: ZoneAction::Add { id, name },
        } => {
            inventory.add_zone(ZoneRecord::new(id, &name));
            println!("Zone added: {} ({})", name, id);
        }
        Commands::Cluster {
            action: ClusterAction::Add { id, pod, name, hypervisor },
        } => {
            let hypervisor: HypervisorType = hypervisor.parse()?;
            inventory.add_cluster(ClusterRecord::new(id, pod, &name, hypervisor));
            println!("Cluster added: {} ({}, {})", name, id, hypervisor);
        }
        Commands::Lb {
            action: LbAction::Add { id, account, name },
        } => {
            inventory.add_load_balancer(LoadBalancerRule {
                id,
                account_id: account,
                name: name.clone(),
            });
            println!("Load balancer rule added: {} ({})", name, id);
        }
    }

    save(&inventory, &cli.state)
}

fn save(inventory: &MemoryInventory, path: &Path) -> CliResult<()> {
    inventory.save(path)?;
    tracing::debug!(path = %path.display(), "Saved inventory");
    Ok(())
}

/// Run a blocking core call off the async runtime, optionally bounded
async fn blocking<T, F>(limit: Option<Duration>, f: F) -> CliResult<T>
where
    F: FnOnce() -> hostfleet::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let task = tokio::task::spawn_blocking(f);
    let joined = match limit {
        Some(limit) => tokio::time::timeout(limit, task)
            .await
            .map_err(|_| format!("operation timed out after {}s", limit.as_secs()))?,
        None => task.await,
    };
    Ok(joined??)
}

async fn handle_autoscale(inventory: &MemoryInventory, action: AutoscaleAction) -> CliResult<()> {
    match action {
        AutoscaleAction::Create {
            lb_rule,
            min,
            max,
            interval,
            scale_up,
            scale_down,
            profile,
        } => {
            let mut builder = AutoScaleGroupRequest::builder(lb_rule, profile).members(min, max);
            if let Some(seconds) = interval {
                builder = builder.interval(seconds);
            }
            for id in scale_up {
                builder = builder.scale_up(id);
            }
            for id in scale_down {
                builder = builder.scale_down(id);
            }
            let request = builder.build();

            let controller =
                CommandLifecycleController::new(Arc::new(inventory.clone()), Arc::new(inventory.clone()));
            let response = blocking(None, move || controller.submit(request)).await?;

            let mut object = serde_json::Map::new();
            object.insert(RESULT_OBJECT_NAME.to_string(), serde_json::to_value(&response)?);
            let mut wrapped = serde_json::Map::new();
            wrapped.insert(COMMAND_NAME.to_string(), serde_json::Value::Object(object));
            println!("{}", serde_json::to_string_pretty(&wrapped)?);
        }
        AutoscaleAction::List => {
            let groups = inventory.groups();
            if groups.is_empty() {
                println!("No autoscale groups.");
                return Ok(());
            }
            println!("{:<6} {:<38} {:<8} {:<8} {:<10}", "ID", "UUID", "LB", "MEMBERS", "STATE");
            for g in groups {
                println!(
                    "{:<6} {:<38} {:<8} {:<8} {:<10}",
                    g.id,
                    g.external_id,
                    g.load_balancer_rule_id,
                    format!("{}-{}", g.min_members, g.max_members),
                    format!("{:?}", g.state)
                );
            }
        }
    }
    Ok(())
}

async fn cmd_discover(inventory: &MemoryInventory, config: &FleetConfig, request: DiscoveryRequest) -> CliResult<()> {
    let probe = ScriptProbe::from_config(config)?;
    let discoverer = BareMetalDiscoverer::new(
        Arc::new(inventory.clone()),
        Arc::new(inventory.clone()),
        Arc::new(probe),
        Arc::new(SystemResolver),
    )
    .with_config(config);

    let fleet = FleetManager::new(Arc::new(inventory.clone()), config.management_server_id);
    fleet.start_component(
        Arc::new(discoverer),
        ResourceStateAdapter::bare_metal(Arc::new(inventory.clone())),
    )?;

    let limit = config.discovery_timeout_secs.map(Duration::from_secs);
    let url = request.endpoint.clone();
    let outcome = blocking(limit, move || {
        let outcome = fleet.add_host(&request);
        fleet.shutdown();
        outcome
    })
    .await?;

    match outcome {
        Outcome::Succeeded(hosts) => {
            for host in hosts {
                println!(
                    "Host added: {} (id {}, guid {}, {})",
                    host.name,
                    host.id,
                    host.guid.as_deref().unwrap_or("-"),
                    host.state
                );
            }
        }
        Outcome::Declined(reason) => println!("Endpoint {} not added: {}", url, reason),
    }
    Ok(())
}

async fn handle_host(inventory: &MemoryInventory, config: &FleetConfig, action: HostAction) -> CliResult<()> {
    let fleet = FleetManager::new(Arc::new(inventory.clone()), config.management_server_id);

    match action {
        HostAction::Delete {
            id,
            forced,
            force_delete_storage,
        } => {
            // Deletion needs the adapter only, not a working probe
            fleet
                .registry()
                .register(BARE_METAL_DISCOVERER, ResourceStateAdapter::bare_metal(Arc::new(inventory.clone())))?;
            let answer = blocking(None, move || fleet.delete_host(id, forced, force_delete_storage)).await?;
            println!("Host {} deleted ({} VM records removed)", id, answer.removed_vms.len());
        }
        HostAction::List => {
            let hosts = fleet.list_hosts()?;
            if hosts.is_empty() {
                println!("No hosts.");
                return Ok(());
            }
            println!(
                "{:<6} {:<20} {:<16} {:<10} {:<8} {:<8}",
                "ID", "NAME", "IP", "STATE", "CLUSTER", "CPUS"
            );
            for h in hosts {
                println!(
                    "{:<6} {:<20} {:<16} {:<10} {:<8} {:<8}",
                    h.id,
                    h.name,
                    h.private_ip.as_deref().unwrap_or("-"),
                    h.state.to_string(),
                    h.cluster_id.map(|c| c.to_string()).unwrap_or_else(|| "-".into()),
                    h.cpus.map(|c| c.to_string()).unwrap_or_else(|| "-".into()),
                );
            }
        }
    }
    Ok(())
}
