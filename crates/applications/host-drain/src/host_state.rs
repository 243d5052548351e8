//! Source host allocation state
//!
//! Disabling is a one-way drain signal: a run never re-enables the host, not
//! at the end and not on cancellation. The operator does that.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::{AllocationChange, AllocationState, CloudApi, Host};
use crate::error::Result;
use crate::inventory::Inventory;

/// What happened to the source host's allocation state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisableOutcome {
    /// `--disablehost` was not given
    NotRequested,
    /// Nothing on the host, left as is
    NoWorkloads,
    /// Disable request issued
    Disabled,
}

impl DisableOutcome {
    /// Whether the disable request was issued
    pub fn is_disabled(&self) -> bool {
        matches!(self, Self::Disabled)
    }
}

/// Issues allocation-state changes for the source host
pub struct HostStateController<'a> {
    api: &'a dyn CloudApi,
}

impl<'a> HostStateController<'a> {
    /// Create a controller on top of `api`
    pub fn new(api: &'a dyn CloudApi) -> Self {
        Self { api }
    }

    /// Disable `source` if requested and it hosts anything at all
    ///
    /// Workload presence is taken from the unfiltered inventory, so a host
    /// can end up disabled even when the domain filter selects nothing.
    /// Dry runs disable too: the host stops taking new placements while the
    /// operator reviews what would move.
    pub async fn maybe_disable(
        &self,
        source: &Host,
        requested: bool,
        inventory: &Inventory,
    ) -> Result<DisableOutcome> {
        if !requested {
            return Ok(DisableOutcome::NotRequested);
        }

        if !inventory.has_any_workload() {
            info!(host = %source.name, "No workloads on host, leaving allocation state unchanged");
            return Ok(DisableOutcome::NoWorkloads);
        }

        if source.allocation_state == AllocationState::Disabled {
            warn!(host = %source.name, "Host already disabled, re-issuing disable");
        }

        self.api
            .update_host_allocation_state(&source.id, AllocationChange::Disable)
            .await?;

        info!(
            host = %source.name,
            host_id = %source.id,
            workloads = inventory.workload_count(),
            "Host disabled; re-enable it manually once the drain is done"
        );

        Ok(DisableOutcome::Disabled)
    }
}
