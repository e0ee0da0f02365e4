//! Agent descriptor contract
//!
//! Add-on authors describe their agent to the framework through
//! [`AgentAddon`]: a name plus an optional [`HealthProber`] declaring how the
//! health of the deployed agent is determined. Manifest rendering and
//! registration belong to the sibling deploy and registration controllers;
//! the health reconciler consumes only the prober.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::{HealthCheckMode, StatusFeedbackResult};

/// An agent descriptor registered with the framework.
///
/// Implementations must be cheap to query; `options` is called on every
/// reconcile of the add-on.
pub trait AgentAddon: Send + Sync {
    /// The declared options for this agent
    fn options(&self) -> AgentAddonOptions;
}

/// Options an add-on author declares for their agent
#[derive(Clone)]
pub struct AgentAddonOptions {
    /// Name of the add-on, matching `ManagedClusterAddOn` object names
    pub addon_name: String,

    /// How agent health is determined. Absent means the add-on is out of
    /// scope for the health reconciler entirely.
    pub health_prober: Option<HealthProber>,
}

/// Strategy for deriving an add-on's `Available` condition.
///
/// A closed set: the evaluator dispatches over these variants and nothing
/// else, so the full decision table lives in one place.
#[derive(Clone, Debug)]
pub enum HealthProber {
    /// No availability checking; only the health check mode is maintained
    None,
    /// Availability follows the agent's lease; owned by the lease controller
    Lease,
    /// Availability is the conjunction of all deploy works' `Available`
    /// conditions
    DeploymentAvailability,
    /// Availability is derived from deploy works, optionally refined by
    /// per-resource feedback probing
    Work(Option<WorkProber>),
}

impl HealthProber {
    /// The health check mode this prober maps to
    pub fn mode(&self) -> HealthCheckMode {
        match self {
            HealthProber::Lease => HealthCheckMode::Lease,
            _ => HealthCheckMode::Customized,
        }
    }

    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            HealthProber::None => "None",
            HealthProber::Lease => "Lease",
            HealthProber::DeploymentAvailability => "DeploymentAvailability",
            HealthProber::Work(_) => "Work",
        }
    }
}

/// Feedback-driven prober for `Work`-type health checking
#[derive(Clone)]
pub struct WorkProber {
    /// The resources whose feedback is required for the add-on to be healthy
    pub probe_fields: Vec<ProbeField>,

    /// Health judgment over one resource's harvested feedback
    pub health_check: HealthCheckFn,
}

impl fmt::Debug for WorkProber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkProber")
            .field("probe_fields", &self.probe_fields)
            .finish_non_exhaustive()
    }
}

/// Pure callback judging one probed resource.
///
/// Returns `Ok(())` when the feedback indicates a healthy resource, or a
/// [`ProbeFailure`] naming why it is not. Must be side-effect-free; it may be
/// invoked any number of times with cached inputs.
pub type HealthCheckFn =
    Arc<dyn Fn(&ResourceIdentifier, &StatusFeedbackResult) -> Result<(), ProbeFailure> + Send + Sync>;

/// A health check's reason for judging a resource unhealthy
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ProbeFailure(String);

impl ProbeFailure {
    /// Create a probe failure with the given reason
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// One resource to probe, with the feedback rules the work agent applies
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProbeField {
    /// Identity of the resource to probe
    pub resource_identifier: ResourceIdentifier,

    /// Feedback rules shipped on the deploy work for this resource
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub probe_rules: Vec<FeedbackRule>,
}

/// Identity of a probed resource
///
/// `group` is optional; when empty, manifests are matched on
/// `(resource, name, namespace)` alone.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct ResourceIdentifier {
    /// API group; empty for the core group or to match any group
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub group: String,
    /// Lowercase plural resource name
    pub resource: String,
    /// Resource name
    pub name: String,
    /// Resource namespace; empty for cluster-scoped resources
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
}

impl fmt::Display for ResourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}/{}", self.resource, self.name)
        } else {
            write!(f, "{}/{}/{}", self.resource, self.namespace, self.name)
        }
    }
}

/// How the work agent harvests a feedback value
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRule {
    /// Rule type
    #[serde(rename = "type")]
    pub type_: FeedbackRuleType,

    /// JSON paths to harvest when the type is `JsonPaths`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub json_paths: Vec<JsonPath>,
}

/// Kind of feedback rule
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum FeedbackRuleType {
    /// Harvest the well-known status fields for the resource kind
    WellKnownStatus,
    /// Harvest explicit JSON paths
    JSONPaths,
}

/// A named JSON path to harvest from a resource's status
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JsonPath {
    /// Name the harvested value is reported under
    pub name: String,
    /// The JSON path expression
    pub path: String,
    /// Restrict the rule to a specific resource version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}
