//! ManagedClusterAddOn resource types
//!
//! One `ManagedClusterAddOn` exists per `(cluster, addon)` pair, namespaced by
//! the managed cluster name. It is created by the install-decision controller;
//! this crate only updates `status.healthCheck` and the `Available` condition.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::Condition;

/// Specification for a ManagedClusterAddOn
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "addon.open-cluster-management.io",
    version = "v1alpha1",
    kind = "ManagedClusterAddOn",
    plural = "managedclusteraddons",
    shortname = "mca",
    status = "ManagedClusterAddOnStatus",
    namespaced,
    printcolumn = r#"{"name":"Available","type":"string","jsonPath":".status.conditions[?(@.type==\"Available\")].status"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ManagedClusterAddOnSpec {
    /// Namespace on the managed cluster the agent is installed into
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_namespace: Option<String>,
}

/// Status for a ManagedClusterAddOn
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManagedClusterAddOnStatus {
    /// Observed conditions; the health reconciler owns the `Available` entry,
    /// sibling controllers own the rest
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// How the availability of the add-on agent is determined
    #[serde(default)]
    pub health_check: HealthCheck,
}

/// Health checking configuration reported on the add-on status
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct HealthCheck {
    /// The active health checking mode
    #[serde(default)]
    pub mode: HealthCheckMode,
}

/// Health checking mode for an add-on
///
/// `Lease` means the agent maintains a lease on the managed cluster and a
/// sibling controller derives availability from it. `Customized` means this
/// crate derives availability from the agent's declared prober.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum HealthCheckMode {
    /// Availability follows the agent's lease on the managed cluster
    #[default]
    Lease,
    /// Availability follows the registered prober strategy
    Customized,
}

impl std::fmt::Display for HealthCheckMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lease => write!(f, "Lease"),
            Self::Customized => write!(f, "Customized"),
        }
    }
}

impl ManagedClusterAddOn {
    /// The currently reported health check mode, falling back to the API
    /// default for a fresh object with no status.
    pub fn health_check_mode(&self) -> HealthCheckMode {
        self.status
            .as_ref()
            .map(|s| s.health_check.mode.clone())
            .unwrap_or_default()
    }
}
