//! Per-workload migration dispatch
//!
//! Workloads move strictly one at a time, user VMs first (largest memory
//! first), then system VMs, then routers. Each workload goes through:
//!
//! ```text
//! Eligible ─┬─ dry run ──────────────▶ DryRun
//!           └─ migrate ─▶ wait job ─┬▶ Succeeded
//!                                   └▶ Failed (job failed or timed out)
//! ```
//!
//! The status prefix for a workload is printed and flushed before its
//! migration starts so the operator sees what is being waited on. The
//! cancellation token is checked after every workload.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use tracing::{debug, info, warn};

use crate::api::{CloudApi, PlatformVm, UserVm};
use crate::cancel::CancellationToken;
use crate::error::Result;
use crate::filter::DomainFilter;
use crate::inventory::Inventory;
use crate::job::JobWaiter;

/// Status text for a dry-run workload
pub const STATUS_DRY_RUN: &str = "DRYRUN";

/// Status text for a completed migration
pub const STATUS_SUCCESS: &str = "Migration successful";

/// Status text for a failed or timed-out migration
pub const STATUS_FAILURE: &str = "Migration unsuccessful!";

/// Workload category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkloadKind {
    /// End-user VM
    User,
    /// System VM
    System,
    /// Virtual router
    Router,
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user VM"),
            Self::System => write!(f, "system VM"),
            Self::Router => write!(f, "router VM"),
        }
    }
}

/// Borrowed view of one workload in the inventory
#[derive(Debug, Clone, Copy)]
pub enum Workload<'a> {
    /// End-user VM
    User(&'a UserVm),
    /// System VM
    System(&'a PlatformVm),
    /// Virtual router
    Router(&'a PlatformVm),
}

impl<'a> Workload<'a> {
    /// Workload category
    pub fn kind(&self) -> WorkloadKind {
        match self {
            Self::User(_) => WorkloadKind::User,
            Self::System(_) => WorkloadKind::System,
            Self::Router(_) => WorkloadKind::Router,
        }
    }

    /// VM id
    pub fn id(&self) -> &'a str {
        match self {
            Self::User(vm) => &vm.id,
            Self::System(vm) | Self::Router(vm) => &vm.id,
        }
    }

    /// VM name
    pub fn name(&self) -> &'a str {
        match self {
            Self::User(vm) => &vm.name,
            Self::System(vm) | Self::Router(vm) => &vm.name,
        }
    }

    /// Progress line up to (not including) the status text
    pub fn status_prefix(&self) -> String {
        match self {
            Self::User(vm) => format!(
                "    UUID: {}  Name: {:<16} [{:<24}] {:>8}Mb  State: ",
                vm.id,
                vm.instance_name,
                truncate(&vm.name, 24),
                vm.memory_mb
            ),
            Self::System(vm) | Self::Router(vm) => {
                format!("    UUID: {}  Name: {:<16} State: ", vm.id, vm.name)
            }
        }
    }
}

/// How a single workload ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// Dry run, nothing sent
    DryRun,
    /// Migration job succeeded
    Succeeded,
    /// Migration request, job, or job wait failed
    Failed,
}

impl Outcome {
    /// Text printed after the status prefix
    pub fn status_text(&self) -> &'static str {
        match self {
            Self::DryRun => STATUS_DRY_RUN,
            Self::Succeeded => STATUS_SUCCESS,
            Self::Failed => STATUS_FAILURE,
        }
    }
}

/// Outcome of one workload, for the run report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadOutcome {
    /// Workload category
    pub kind: WorkloadKind,
    /// VM id
    pub id: String,
    /// VM name
    pub name: String,
    /// How it ended
    pub outcome: Outcome,
}

/// Workloads of one kind, in dispatch order
#[derive(Debug, Clone)]
pub struct Section<'a> {
    /// Workload category
    pub kind: WorkloadKind,
    /// Eligible workloads
    pub workloads: Vec<Workload<'a>>,
}

/// Eligible workloads grouped by kind, in dispatch order
///
/// A section is present when the host has any workload of that kind, even if
/// the domain filter leaves it empty. System VMs and routers are dropped
/// entirely under an include filter.
pub fn plan<'a>(inventory: &'a Inventory, filter: &DomainFilter) -> Vec<Section<'a>> {
    let mut sections = Vec::with_capacity(3);

    if !inventory.user_vms.is_empty() {
        sections.push(Section {
            kind: WorkloadKind::User,
            workloads: inventory
                .user_vms
                .iter()
                .filter(|vm| filter.includes(vm))
                .map(Workload::User)
                .collect(),
        });
    }

    if filter.includes_platform_vms() {
        if !inventory.system_vms.is_empty() {
            sections.push(Section {
                kind: WorkloadKind::System,
                workloads: inventory.system_vms.iter().map(Workload::System).collect(),
            });
        }
        if !inventory.routers.is_empty() {
            sections.push(Section {
                kind: WorkloadKind::Router,
                workloads: inventory.routers.iter().map(Workload::Router).collect(),
            });
        }
    }

    sections
}

/// Result of a dispatch pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSummary {
    /// Outcomes in dispatch order
    pub outcomes: Vec<WorkloadOutcome>,
    /// Stopped early by the operator
    pub cancelled: bool,
}

impl DispatchSummary {
    /// Number of workloads with the given outcome
    pub fn count(&self, outcome: Outcome) -> usize {
        self.outcomes.iter().filter(|o| o.outcome == outcome).count()
    }
}

/// Migrates workloads one by one and prints progress to `out`
pub struct Dispatcher<'a, W: Write> {
    api: &'a dyn CloudApi,
    waiter: JobWaiter,
    token: CancellationToken,
    destination_id: String,
    dry_run: bool,
    out: W,
}

impl<'a, W: Write> Dispatcher<'a, W> {
    /// Create a dispatcher migrating to host `destination_id`
    pub fn new(
        api: &'a dyn CloudApi,
        waiter: JobWaiter,
        token: CancellationToken,
        destination_id: impl Into<String>,
        dry_run: bool,
        out: W,
    ) -> Self {
        Self {
            api,
            waiter,
            token,
            destination_id: destination_id.into(),
            dry_run,
            out,
        }
    }

    /// Consume the dispatcher, returning the output sink
    pub fn into_output(self) -> W {
        self.out
    }

    /// Dispatch every eligible workload in `inventory`
    ///
    /// Per-workload failures are reported and skipped over; only output
    /// errors abort the pass.
    pub async fn run(&mut self, inventory: &Inventory, filter: &DomainFilter) -> Result<DispatchSummary> {
        let mut summary = DispatchSummary::default();

        for section in plan(inventory, filter) {
            writeln!(self.out, "Starting migration of {}:", section.kind)?;
            debug!(kind = %section.kind, eligible = section.workloads.len(), "Starting section");

            for workload in section.workloads {
                let outcome = self.process(&workload).await?;
                summary.outcomes.push(WorkloadOutcome {
                    kind: workload.kind(),
                    id: workload.id().to_string(),
                    name: workload.name().to_string(),
                    outcome,
                });

                if self.token.is_cancelled() {
                    info!(
                        processed = summary.outcomes.len(),
                        "Stopping on operator request"
                    );
                    summary.cancelled = true;
                    return Ok(summary);
                }
            }
        }

        Ok(summary)
    }

    async fn process(&mut self, workload: &Workload<'_>) -> Result<Outcome> {
        write!(self.out, "{}", workload.status_prefix())?;
        self.out.flush()?;

        let outcome = if self.dry_run {
            Outcome::DryRun
        } else {
            self.migrate(workload).await
        };

        writeln!(self.out, "{}", outcome.status_text())?;
        self.out.flush()?;

        Ok(outcome)
    }

    async fn migrate(&self, workload: &Workload<'_>) -> Outcome {
        let destination = self.destination_id.as_str();
        let request = match workload {
            Workload::User(vm) => self.api.migrate_virtual_machine(destination, &vm.id).await,
            Workload::System(vm) | Workload::Router(vm) => {
                self.api.migrate_system_vm(destination, &vm.id).await
            }
        };

        let job_id = match request {
            Ok(job_id) => job_id,
            Err(e) => {
                warn!(
                    kind = %workload.kind(),
                    vm_id = %workload.id(),
                    error = %e,
                    "Migration request rejected"
                );
                return Outcome::Failed;
            }
        };

        debug!(vm_id = %workload.id(), job_id = %job_id, "Migration started");

        if self.waiter.wait(self.api, &job_id).await {
            Outcome::Succeeded
        } else {
            Outcome::Failed
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
