//! ManifestWork resource types
//!
//! A `ManifestWork` is the hub-side record of a resource bundle delivered to
//! one managed cluster. The deploy controller creates them (labeled with the
//! owning add-on); the work agent on the managed cluster reports back an
//! `Available` condition and optional per-resource status feedback. This crate
//! treats the whole resource as read-only input.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::Condition;

/// Specification for a ManifestWork
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "work.open-cluster-management.io",
    version = "v1",
    kind = "ManifestWork",
    plural = "manifestworks",
    status = "ManifestWorkStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ManifestWorkSpec {
    /// The resource payload shipped to the managed cluster. Opaque to the
    /// health reconciler; only the deploy controller renders it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workload: Option<ManifestsTemplate>,
}

/// Wrapper for the list of raw manifests in a work
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct ManifestsTemplate {
    /// Raw manifests to apply on the managed cluster
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub manifests: Vec<serde_json::Value>,
}

/// Status for a ManifestWork, reported by the work agent
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManifestWorkStatus {
    /// Work-level conditions, including `Available`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// Per-resource observed status
    #[serde(default)]
    pub resource_status: ManifestResourceStatus,
}

/// Observed status of each resource the work shipped
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct ManifestResourceStatus {
    /// One entry per shipped manifest
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub manifests: Vec<ManifestCondition>,
}

/// Observed status of a single shipped resource
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManifestCondition {
    /// Identity of the resource on the managed cluster
    #[serde(default)]
    pub resource_meta: ManifestResourceMeta,

    /// Feedback values harvested from the resource's status
    #[serde(default)]
    pub status_feedbacks: StatusFeedbackResult,

    /// Per-resource conditions reported by the work agent
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

/// Identity of a resource within a work's manifest list
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManifestResourceMeta {
    /// Position of the resource in the work's manifest list
    #[serde(default)]
    pub ordinal: i32,
    /// API group
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub group: String,
    /// API version
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    /// Resource kind
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    /// Lowercase plural resource name
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource: String,
    /// Resource name
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Resource namespace; empty for cluster-scoped resources
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
}

/// Feedback values harvested from one resource
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct StatusFeedbackResult {
    /// The harvested values, keyed by rule name
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<FeedbackValue>,
}

/// One harvested feedback value
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackValue {
    /// Name of the feedback rule that produced this value
    pub name: String,

    /// The harvested value; absent when the rule matched nothing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_value: Option<FieldValue>,
}

/// Typed scalar carried by a feedback value
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FieldValue {
    /// Which of the payload fields is set
    #[serde(rename = "type")]
    pub type_: ValueType,

    /// Integer payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integer: Option<i64>,

    /// String payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string: Option<String>,

    /// Boolean payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boolean: Option<bool>,

    /// Raw JSON payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_raw: Option<String>,
}

/// Discriminator for [`FieldValue`]
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ValueType {
    /// Integer payload
    Integer,
    /// String payload
    String,
    /// Boolean payload
    Boolean,
    /// Raw JSON payload
    JsonRaw,
}
