//! Host drain run
//!
//! One run, start to finish, in memory:
//!
//! ```text
//! load hosts ── resolve --from / --to ── (not found: abort, nothing touched)
//!     │
//!     ├── 1. Load inventory on the source host
//!     │
//!     ├── 2. Disable source host (if requested and it hosts anything)
//!     │
//!     ├── 3. Dispatch user VMs, then system VMs, then routers
//!     │
//!     └── 4. Report (stopping early is not an error)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use tracing::{info, warn};

use crate::api::CloudApi;
use crate::cancel::CancellationToken;
use crate::dispatch::{Dispatcher, Outcome, WorkloadOutcome};
use crate::error::Result;
use crate::filter::DomainFilter;
use crate::host_state::{DisableOutcome, HostStateController};
use crate::inventory::{HostDirectory, Inventory};
use crate::job::JobWaiter;

/// What to drain and how
#[derive(Debug, Clone)]
pub struct DrainOptions {
    /// Source host name
    pub source: String,

    /// Destination host name
    pub destination: String,

    /// Disable the source host before migrating
    pub disable_host: bool,

    /// Report only, migrate nothing
    pub dry_run: bool,

    /// User VM domain scope
    pub filter: DomainFilter,

    /// Job poll budget
    pub waiter: JobWaiter,
}

impl DrainOptions {
    /// Dry-run drain of `source` onto `destination` with no filter
    pub fn new(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            disable_host: false,
            dry_run: true,
            filter: DomainFilter::None,
            waiter: JobWaiter::default(),
        }
    }

    /// Disable the source host if it hosts anything
    pub fn with_disable_host(mut self, disable: bool) -> Self {
        self.disable_host = disable;
        self
    }

    /// Actually migrate (`false`) or only report (`true`)
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Restrict user VMs by domain
    pub fn with_filter(mut self, filter: DomainFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Set the job poll budget
    pub fn with_waiter(mut self, waiter: JobWaiter) -> Self {
        self.waiter = waiter;
        self
    }
}

/// Result of a drain run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrainReport {
    /// Source host name
    pub source: String,

    /// Destination host name
    pub destination: String,

    /// Dry run
    pub dry_run: bool,

    /// Domain scope used
    pub filter: DomainFilter,

    /// Source host allocation state step
    pub host_state: DisableOutcome,

    /// Workload outcomes in dispatch order
    pub outcomes: Vec<WorkloadOutcome>,

    /// Stopped early by the operator
    pub cancelled: bool,

    /// Run start
    pub started_at: DateTime<Utc>,

    /// Run end
    pub finished_at: DateTime<Utc>,
}

impl DrainReport {
    /// Number of workloads with the given outcome
    pub fn count(&self, outcome: Outcome) -> usize {
        self.outcomes.iter().filter(|o| o.outcome == outcome).count()
    }

    /// Whether every dispatched migration succeeded
    pub fn all_succeeded(&self) -> bool {
        self.count(Outcome::Failed) == 0
    }
}

/// Drain `options.source` onto `options.destination`
///
/// Progress lines go to `out`. Only startup problems (unknown host, API
/// unreachable while loading, disable rejected) and output errors are
/// returned as `Err`; per-workload failures end up in the report.
pub async fn run<W: Write>(
    api: &dyn CloudApi,
    options: &DrainOptions,
    token: CancellationToken,
    out: W,
) -> Result<DrainReport> {
    let started_at = Utc::now();

    let hosts = HostDirectory::load(api).await?;
    let source = hosts.resolve(&options.source)?.clone();
    let destination = hosts.resolve(&options.destination)?.clone();

    if source.id == destination.id {
        warn!(host = %source.name, "Source and destination are the same host");
    }

    info!(
        source = %source.name,
        destination = %destination.name,
        dry_run = options.dry_run,
        filter = %options.filter,
        "Starting drain"
    );

    let inventory = Inventory::load(api, &source).await?;

    if let Some(domain) = options.filter.domain() {
        if !inventory.knows_domain(domain) {
            warn!(domain = %domain, "Domain filter does not match any known domain");
        }
    }

    let host_state = HostStateController::new(api)
        .maybe_disable(&source, options.disable_host, &inventory)
        .await?;

    let mut dispatcher = Dispatcher::new(
        api,
        options.waiter,
        token,
        destination.id.clone(),
        options.dry_run,
        out,
    );
    let summary = dispatcher.run(&inventory, &options.filter).await?;

    let report = DrainReport {
        source: source.name,
        destination: destination.name,
        dry_run: options.dry_run,
        filter: options.filter.clone(),
        host_state,
        outcomes: summary.outcomes,
        cancelled: summary.cancelled,
        started_at,
        finished_at: Utc::now(),
    };

    info!(
        succeeded = report.count(Outcome::Succeeded),
        failed = report.count(Outcome::Failed),
        dry_run = report.count(Outcome::DryRun),
        cancelled = report.cancelled,
        host_disabled = report.host_state.is_disabled(),
        elapsed_secs = (report.finished_at - report.started_at).num_seconds(),
        "Drain finished"
    );

    Ok(report)
}
