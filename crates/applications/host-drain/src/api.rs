//! Orchestration API boundary
//!
//! The drain engine talks to the platform ONLY through [`CloudApi`]. The
//! HTTP implementation lives in [`crate::client`]; tests use an in-memory
//! fake.
//!
//! Records here are the typed form of the platform's list responses. Field
//! names on the wire are the platform's lowercase keys (`instancename`,
//! `hostid`, ...).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// Hypervisor host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    /// Stable id used in API calls
    pub id: String,

    /// Host name (inventory key)
    pub name: String,

    /// Current allocation state
    #[serde(default, rename = "resourcestate")]
    pub allocation_state: AllocationState,
}

/// Allocation state of a host as reported by the platform
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AllocationState {
    /// Accepting new workloads
    Enabled,
    /// Not accepting new workloads
    Disabled,
    /// Transitioning to disabled
    Disabling,
    /// In maintenance mode
    Maintenance,
    /// Reported but not modelled
    Other(String),
    /// Not reported
    #[default]
    Unknown,
}

impl From<String> for AllocationState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Enabled" => Self::Enabled,
            "Disabled" => Self::Disabled,
            "Disabling" => Self::Disabling,
            "Maintenance" => Self::Maintenance,
            "" => Self::Unknown,
            _ => Self::Other(s),
        }
    }
}

impl From<AllocationState> for String {
    fn from(state: AllocationState) -> Self {
        match state {
            AllocationState::Enabled => "Enabled".to_string(),
            AllocationState::Disabled => "Disabled".to_string(),
            AllocationState::Disabling => "Disabling".to_string(),
            AllocationState::Maintenance => "Maintenance".to_string(),
            AllocationState::Other(s) => s,
            AllocationState::Unknown => String::new(),
        }
    }
}

/// Allocation state change requested through `updateHost`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationChange {
    /// Allow new workloads on the host
    Enable,
    /// Stop placing new workloads on the host
    Disable,
}

impl AllocationChange {
    /// Value of the `allocationstate` request parameter
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enable => "Enable",
            Self::Disable => "Disable",
        }
    }
}

/// Tenant domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    /// Domain id
    pub id: String,

    /// Domain name
    #[serde(default)]
    pub name: String,

    /// Full path (`ROOT/customer/...`)
    #[serde(default)]
    pub path: String,
}

impl Domain {
    /// Whether a filter value refers to this domain
    pub fn matches(&self, value: &str) -> bool {
        self.name == value || self.path == value
    }
}

/// End-user virtual machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserVm {
    /// VM id
    pub id: String,

    /// Hypervisor-level instance name
    #[serde(default, rename = "instancename")]
    pub instance_name: String,

    /// Display name
    pub name: String,

    /// Memory size in MB
    #[serde(default, rename = "memory")]
    pub memory_mb: u64,

    /// Host the VM currently runs on
    #[serde(default, rename = "hostid")]
    pub host_id: Option<String>,

    /// Domain the VM is recorded under
    #[serde(rename = "domain")]
    pub domain_path: String,
}

/// Platform-owned VM (system VM or virtual router)
///
/// These have no domain attribution; instance name and memory are often
/// omitted by the platform and default to empty / 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformVm {
    /// VM id
    pub id: String,

    /// Name (`s-12-VM`, `r-40-VM`, ...)
    pub name: String,

    /// Hypervisor-level instance name
    #[serde(default, rename = "instancename")]
    pub instance_name: String,

    /// Memory size in MB
    #[serde(default, rename = "memory")]
    pub memory_mb: u64,

    /// Host the VM currently runs on
    #[serde(default, rename = "hostid")]
    pub host_id: Option<String>,
}

/// Async job handle returned by migration requests
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Status of an async job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    /// Still running (code 0)
    Running,
    /// Finished successfully (code 1)
    Succeeded,
    /// Finished with an error (code 2)
    Failed,
}

impl JobStatus {
    /// Parse the platform's numeric `jobstatus`
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Running),
            1 => Some(Self::Succeeded),
            2 => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Project scope of a VM listing
///
/// The platform hides project-owned VMs from a plain listing, so the loader
/// asks twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectScope {
    /// Plain listing
    Default,
    /// `projectid=-1`: VMs that belong to projects
    AllProjects,
}

/// Operations the drain engine needs from the orchestration platform
#[async_trait]
pub trait CloudApi: Send + Sync {
    /// All hosts in the zone
    async fn list_hosts(&self) -> Result<Vec<Host>>;

    /// All domains visible to the caller
    async fn list_domains(&self) -> Result<Vec<Domain>>;

    /// User VMs on a host
    async fn list_virtual_machines(&self, host_id: &str, scope: ProjectScope) -> Result<Vec<UserVm>>;

    /// System VMs on a host
    async fn list_system_vms(&self, host_id: &str) -> Result<Vec<PlatformVm>>;

    /// Virtual routers on a host
    async fn list_routers(&self, host_id: &str) -> Result<Vec<PlatformVm>>;

    /// Change a host's allocation state
    async fn update_host_allocation_state(&self, host_id: &str, change: AllocationChange) -> Result<()>;

    /// Start migrating a user VM to `host_id`
    async fn migrate_virtual_machine(&self, host_id: &str, vm_id: &str) -> Result<JobId>;

    /// Start migrating a system VM or router to `host_id`
    async fn migrate_system_vm(&self, host_id: &str, vm_id: &str) -> Result<JobId>;

    /// Current status of an async job
    async fn query_async_job_result(&self, job_id: &JobId) -> Result<JobStatus>;
}
