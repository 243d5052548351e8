//! # Host Drain
//!
//! Empties a hypervisor host by live-migrating everything on it to another
//! host, through a CloudStack/Cosmic-compatible orchestration API.
//!
//! ## Architecture
//!
//! ```text
//! empty-host (CLI)
//! ├── Credentials (INI profile)
//! ├── CosmicClient ──────────── signed HTTP ───▶ orchestration API
//! └── drain::run
//!     ├── HostDirectory / Inventory   (snapshot, loaded once)
//!     ├── HostStateController         (disable source host)
//!     └── Dispatcher                  (one workload at a time)
//!         ├── DomainFilter            (user VMs only)
//!         ├── JobWaiter               (bounded async job poll)
//!         └── CancellationToken       (checked between workloads)
//! ```
//!
//! The engine only sees the [`CloudApi`] trait, so everything above the HTTP
//! client is exercised in tests against an in-memory platform.
//!
//! ## Run semantics
//!
//! - Dry run by default; `--exec` migrates.
//! - User VMs go first, largest memory first, then system VMs, then routers.
//! - A failed or timed-out migration is reported and skipped; the run goes on.
//! - Ctrl+C stops the run after the current workload. A host disabled by the
//!   run stays disabled.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod cancel;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod drain;
pub mod error;
pub mod filter;
pub mod host_state;
pub mod inventory;
pub mod job;

#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Public exports - Drain engine
// ============================================================================

// Run orchestration
pub use drain::{run, DrainOptions, DrainReport};

// Dispatch
pub use dispatch::{Dispatcher, DispatchSummary, Outcome, Workload, WorkloadKind, WorkloadOutcome};

// Components
pub use cancel::{install_interrupt_handler, CancellationToken};
pub use filter::DomainFilter;
pub use host_state::{DisableOutcome, HostStateController};
pub use inventory::{HostDirectory, Inventory};
pub use job::{JobWaiter, DEFAULT_MAX_RETRIES, DEFAULT_POLL_INTERVAL_SECS};

// ============================================================================
// Public exports - Platform access
// ============================================================================

// Error handling
pub use error::{DrainError, Result};

// API boundary
pub use api::{
    AllocationChange, AllocationState, CloudApi, Domain, Host, JobId, JobStatus, PlatformVm,
    ProjectScope, UserVm,
};

// HTTP client and credentials
pub use client::CosmicClient;
pub use config::{Credentials, DEFAULT_CONFIG_PATH};
