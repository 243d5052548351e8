//! Inventory snapshot for a drain run
//!
//! Loading is explicit and happens once per run:
//!
//! 1. [`HostDirectory::load`] fetches every host, keyed by name, so the
//!    source and destination names can be resolved before anything else.
//! 2. [`Inventory::load`] fetches domains and the three workload collections
//!    scoped to the source host.
//!
//! Everything after that is a pure read over the snapshot.

use std::collections::HashMap;
use tracing::{debug, info};

use crate::api::{CloudApi, Domain, Host, PlatformVm, ProjectScope, UserVm};
use crate::error::{DrainError, Result};

/// All hosts in the zone, keyed by name
#[derive(Debug, Clone, Default)]
pub struct HostDirectory {
    hosts: HashMap<String, Host>,
}

impl HostDirectory {
    /// Fetch every host
    pub async fn load(api: &dyn CloudApi) -> Result<Self> {
        let hosts = api.list_hosts().await?;
        debug!(count = hosts.len(), "Loaded hosts");
        Ok(Self::from_hosts(hosts))
    }

    /// Build a directory from already-fetched hosts
    pub fn from_hosts(hosts: impl IntoIterator<Item = Host>) -> Self {
        Self {
            hosts: hosts.into_iter().map(|h| (h.name.clone(), h)).collect(),
        }
    }

    /// Look up a host by name
    pub fn get(&self, name: &str) -> Option<&Host> {
        self.hosts.get(name)
    }

    /// Whether a host with this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.hosts.contains_key(name)
    }

    /// Look up a host by name, failing with [`DrainError::HostNotFound`]
    pub fn resolve(&self, name: &str) -> Result<&Host> {
        self.get(name).ok_or_else(|| DrainError::host_not_found(name))
    }

    /// Number of hosts
    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    /// Whether the directory is empty
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

/// Domains and workloads on the source host
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    /// All domains
    pub domains: Vec<Domain>,

    /// User VMs, largest memory first
    pub user_vms: Vec<UserVm>,

    /// System VMs
    pub system_vms: Vec<PlatformVm>,

    /// Virtual routers
    pub routers: Vec<PlatformVm>,
}

impl Inventory {
    /// Fetch domains and every workload on `source`
    pub async fn load(api: &dyn CloudApi, source: &Host) -> Result<Self> {
        let domains = api.list_domains().await?;
        let system_vms = api.list_system_vms(&source.id).await?;
        let routers = api.list_routers(&source.id).await?;

        let mut user_vms = api
            .list_virtual_machines(&source.id, ProjectScope::Default)
            .await?;
        let project_vms = api
            .list_virtual_machines(&source.id, ProjectScope::AllProjects)
            .await?;
        user_vms.extend(project_vms);
        sort_by_memory_desc(&mut user_vms);

        let inventory = Self {
            domains,
            user_vms,
            system_vms,
            routers,
        };

        info!(
            host = %source.name,
            host_id = %source.id,
            user_vms = inventory.user_vms.len(),
            system_vms = inventory.system_vms.len(),
            routers = inventory.routers.len(),
            "Loaded inventory"
        );

        Ok(inventory)
    }

    /// Whether any workload is on the host, ignoring domain filters
    pub fn has_any_workload(&self) -> bool {
        !self.user_vms.is_empty() || !self.system_vms.is_empty() || !self.routers.is_empty()
    }

    /// Total number of workloads, ignoring domain filters
    pub fn workload_count(&self) -> usize {
        self.user_vms.len() + self.system_vms.len() + self.routers.len()
    }

    /// Whether a domain filter value names a known domain
    pub fn knows_domain(&self, value: &str) -> bool {
        self.domains.iter().any(|d| d.matches(value))
    }
}

/// Stable sort, largest memory first
///
/// Big movers go first so destination capacity problems surface early.
pub fn sort_by_memory_desc(vms: &mut [UserVm]) {
    vms.sort_by(|a, b| b.memory_mb.cmp(&a.memory_mb));
}
