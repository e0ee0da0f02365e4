//! Addon Manager - hub-side framework core for managed cluster add-ons
//!
//! A hub cluster manages a fleet of managed clusters; each managed cluster may
//! run zero or more add-on agents. The hub records the desired configuration
//! and observed state of every `(cluster, addon)` pair in a
//! `ManagedClusterAddOn` resource, and ships deployment artifacts to the
//! cluster as labeled `ManifestWork` bundles.
//!
//! This crate implements the health reconciliation core: for every
//! `(cluster, addon)` pair it derives the `Available` status condition and the
//! `healthCheck.mode` field of the `ManagedClusterAddOn` from the registered
//! agent's declared probing strategy and the observed `ManifestWork` statuses.
//!
//! # Modules
//!
//! - [`api`] - Hub API object model (ManagedClusterAddOn, ManifestWork, conditions)
//! - [`agent`] - Agent descriptor contract (health probers, probe fields)
//! - [`registry`] - In-memory registry of agent descriptors
//! - [`probe`] - Pure availability evaluator over observed work statuses
//! - [`store`] - Cache-backed readers over reflector stores
//! - [`controller`] - Health reconciler and status write path
//! - [`manager`] - Controller wiring: watch streams, work queue, workers
//! - [`telemetry`] - Tracing subscriber initialization for embedding processes
//! - [`error`] - Error types for the framework core
//!
//! The process launcher, leader election, and the sibling controllers that
//! create `ManifestWork` or handle registration are external collaborators;
//! embedders construct a [`kube::Client`], register agents, and call
//! [`manager::AddonManager::run`].

#![deny(missing_docs)]

pub mod agent;
pub mod api;
pub mod controller;
pub mod error;
pub mod manager;
pub mod probe;
pub mod registry;
pub mod store;
pub mod telemetry;

pub use error::Error;
pub use manager::{AddonManager, AddonManagerConfig};
pub use registry::AgentRegistry;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Label carried by every `ManifestWork` owned by an add-on.
///
/// The value is the add-on name; together with the work's namespace (the
/// managed cluster name) it identifies the `(cluster, addon)` pair the work
/// belongs to. Works without this label are ignored by the core.
pub const ADDON_LABEL_KEY: &str = "open-cluster-management.io/addon-name";

/// The single condition type owned by the health reconciler.
///
/// `ManifestWork` reports its own `Available` condition under the same type
/// name; the aggregation rules in [`probe`] fold the work-level conditions
/// into the add-on-level one.
pub const CONDITION_AVAILABLE: &str = "Available";
