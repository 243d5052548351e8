//! Domain scoping for user VMs

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::api::UserVm;
use crate::error::{DrainError, Result};

/// Which user VMs a run is restricted to
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DomainFilter {
    /// Only VMs in this domain
    Include(String),
    /// Every VM except those in this domain
    Exclude(String),
    /// No restriction
    #[default]
    None,
}

impl DomainFilter {
    /// Build from the `--domain` / `--exceptdomain` pair
    pub fn from_flags(include: Option<String>, exclude: Option<String>) -> Result<Self> {
        match (include, exclude) {
            (Some(include), Some(exclude)) => {
                Err(DrainError::ConflictingDomainFilter { include, exclude })
            }
            (Some(include), None) => Ok(Self::Include(include)),
            (None, Some(exclude)) => Ok(Self::Exclude(exclude)),
            (None, None) => Ok(Self::None),
        }
    }

    /// Whether `vm` is in scope
    pub fn includes(&self, vm: &UserVm) -> bool {
        match self {
            Self::Include(domain) => vm.domain_path == *domain,
            Self::Exclude(domain) => vm.domain_path != *domain,
            Self::None => true,
        }
    }

    /// Whether system VMs and routers are in scope
    ///
    /// Platform VMs belong to no tenant, so an include filter leaves them
    /// out. An exclude filter does not.
    pub fn includes_platform_vms(&self) -> bool {
        !matches!(self, Self::Include(_))
    }

    /// The domain named by the filter, if any
    pub fn domain(&self) -> Option<&str> {
        match self {
            Self::Include(d) | Self::Exclude(d) => Some(d.as_str()),
            Self::None => None,
        }
    }
}

impl fmt::Display for DomainFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Include(d) => write!(f, "only domain {}", d),
            Self::Exclude(d) => write!(f, "all domains except {}", d),
            Self::None => write!(f, "all domains"),
        }
    }
}
