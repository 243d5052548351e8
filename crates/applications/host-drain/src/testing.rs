//! In-memory `CloudApi` for tests

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use crate::api::{
    AllocationChange, AllocationState, CloudApi, Domain, Host, JobId, JobStatus, PlatformVm,
    ProjectScope, UserVm,
};
use crate::error::{DrainError, Result};

type MigrateHook = Box<dyn Fn(&str) + Send + Sync>;

/// Recorded API call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListHosts,
    ListDomains,
    ListVirtualMachines { host_id: String, scope: ProjectScope },
    ListSystemVms { host_id: String },
    ListRouters { host_id: String },
    UpdateHost { host_id: String, change: AllocationChange },
    MigrateVirtualMachine { host_id: String, vm_id: String },
    MigrateSystemVm { host_id: String, vm_id: String },
    QueryJob { job_id: String },
}

/// Scriptable fake platform
///
/// Migrations return job id `job-<vm id>`. Job polls are answered from the
/// script first, then from per-VM outcomes, then with `Succeeded`.
#[derive(Default)]
pub struct FakeCloud {
    hosts: Vec<Host>,
    domains: Vec<Domain>,
    user_vms: Vec<UserVm>,
    project_vms: Vec<UserVm>,
    system_vms: Vec<PlatformVm>,
    routers: Vec<PlatformVm>,
    job_script: Mutex<VecDeque<std::result::Result<JobStatus, String>>>,
    job_outcomes: HashMap<String, JobStatus>,
    rejected: HashSet<String>,
    on_migrate: Option<MigrateHook>,
    calls: Mutex<Vec<Call>>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hosts(mut self, hosts: Vec<Host>) -> Self {
        self.hosts = hosts;
        self
    }

    pub fn with_domains(mut self, domains: Vec<Domain>) -> Self {
        self.domains = domains;
        self
    }

    pub fn with_user_vms(mut self, vms: Vec<UserVm>) -> Self {
        self.user_vms = vms;
        self
    }

    pub fn with_project_vms(mut self, vms: Vec<UserVm>) -> Self {
        self.project_vms = vms;
        self
    }

    pub fn with_system_vms(mut self, vms: Vec<PlatformVm>) -> Self {
        self.system_vms = vms;
        self
    }

    pub fn with_routers(mut self, vms: Vec<PlatformVm>) -> Self {
        self.routers = vms;
        self
    }

    /// Answers for the next job polls, in order (`Err` = query failure)
    pub fn with_job_script(self, script: Vec<std::result::Result<JobStatus, String>>) -> Self {
        *self.job_script.lock().unwrap() = script.into();
        self
    }

    /// Status every poll of this VM's migration job returns
    pub fn with_job_outcome(mut self, vm_id: &str, status: JobStatus) -> Self {
        self.job_outcomes.insert(job_id_for(vm_id), status);
        self
    }

    /// Make the migrate request for this VM fail
    pub fn with_rejected_migration(mut self, vm_id: &str) -> Self {
        self.rejected.insert(vm_id.to_string());
        self
    }

    /// Run `hook` with the VM id on every migrate request
    pub fn with_migrate_hook(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_migrate = Some(Box::new(hook));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn migrations(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::MigrateVirtualMachine { .. } | Call::MigrateSystemVm { .. }))
            .collect()
    }

    pub fn poll_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::QueryJob { .. }))
            .count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn start_migration(&self, vm_id: &str) -> Result<JobId> {
        if let Some(hook) = &self.on_migrate {
            hook(vm_id);
        }
        if self.rejected.contains(vm_id) {
            return Err(DrainError::api("migrate", 431, format!("cannot migrate {}", vm_id)));
        }
        Ok(JobId(job_id_for(vm_id)))
    }
}

fn job_id_for(vm_id: &str) -> String {
    format!("job-{}", vm_id)
}

#[async_trait]
impl CloudApi for FakeCloud {
    async fn list_hosts(&self) -> Result<Vec<Host>> {
        self.record(Call::ListHosts);
        Ok(self.hosts.clone())
    }

    async fn list_domains(&self) -> Result<Vec<Domain>> {
        self.record(Call::ListDomains);
        Ok(self.domains.clone())
    }

    async fn list_virtual_machines(&self, host_id: &str, scope: ProjectScope) -> Result<Vec<UserVm>> {
        self.record(Call::ListVirtualMachines {
            host_id: host_id.to_string(),
            scope,
        });
        Ok(match scope {
            ProjectScope::Default => self.user_vms.clone(),
            ProjectScope::AllProjects => self.project_vms.clone(),
        })
    }

    async fn list_system_vms(&self, host_id: &str) -> Result<Vec<PlatformVm>> {
        self.record(Call::ListSystemVms {
            host_id: host_id.to_string(),
        });
        Ok(self.system_vms.clone())
    }

    async fn list_routers(&self, host_id: &str) -> Result<Vec<PlatformVm>> {
        self.record(Call::ListRouters {
            host_id: host_id.to_string(),
        });
        Ok(self.routers.clone())
    }

    async fn update_host_allocation_state(&self, host_id: &str, change: AllocationChange) -> Result<()> {
        self.record(Call::UpdateHost {
            host_id: host_id.to_string(),
            change,
        });
        Ok(())
    }

    async fn migrate_virtual_machine(&self, host_id: &str, vm_id: &str) -> Result<JobId> {
        self.record(Call::MigrateVirtualMachine {
            host_id: host_id.to_string(),
            vm_id: vm_id.to_string(),
        });
        self.start_migration(vm_id)
    }

    async fn migrate_system_vm(&self, host_id: &str, vm_id: &str) -> Result<JobId> {
        self.record(Call::MigrateSystemVm {
            host_id: host_id.to_string(),
            vm_id: vm_id.to_string(),
        });
        self.start_migration(vm_id)
    }

    async fn query_async_job_result(&self, job_id: &JobId) -> Result<JobStatus> {
        self.record(Call::QueryJob {
            job_id: job_id.0.clone(),
        });

        if let Some(next) = self.job_script.lock().unwrap().pop_front() {
            return next.map_err(|e| DrainError::api("queryAsyncJobResult", 530, e));
        }

        Ok(self
            .job_outcomes
            .get(&job_id.0)
            .copied()
            .unwrap_or(JobStatus::Succeeded))
    }
}

pub fn host(id: &str, name: &str) -> Host {
    Host {
        id: id.to_string(),
        name: name.to_string(),
        allocation_state: AllocationState::Enabled,
    }
}

pub fn domain(id: &str, name: &str) -> Domain {
    Domain {
        id: id.to_string(),
        name: name.to_string(),
        path: format!("ROOT/{}", name),
    }
}

pub fn user_vm(id: &str, domain: &str, memory_mb: u64) -> UserVm {
    UserVm {
        id: id.to_string(),
        instance_name: format!("i-2-{}-VM", id),
        name: format!("vm-{}", id),
        memory_mb,
        host_id: Some("h1".to_string()),
        domain_path: domain.to_string(),
    }
}

pub fn platform_vm(id: &str, name: &str) -> PlatformVm {
    PlatformVm {
        id: id.to_string(),
        name: name.to_string(),
        instance_name: name.to_string(),
        memory_mb: 256,
        host_id: Some("h1".to_string()),
    }
}
