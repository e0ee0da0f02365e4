//! Hub API object model
//!
//! Rust types for the two hub-side resources the core consumes:
//! [`ManagedClusterAddOn`] (the per-cluster add-on record whose status the
//! core owns parts of) and [`ManifestWork`] (the deployment artifact whose
//! status the core aggregates). The CRDs themselves are installed by the hub;
//! these types only read and write the fields named in the status contract.

mod addon;
mod types;
mod work;

pub use addon::{HealthCheck, HealthCheckMode, ManagedClusterAddOn, ManagedClusterAddOnSpec, ManagedClusterAddOnStatus};
pub use types::{find_condition, is_condition_true, upsert_condition, Condition, ConditionStatus};
pub use work::{
    FeedbackValue, FieldValue, ManifestCondition, ManifestResourceMeta, ManifestResourceStatus,
    ManifestWork, ManifestWorkSpec, ManifestWorkStatus, ManifestsTemplate, StatusFeedbackResult,
    ValueType,
};
