//! Kubernetes controller reconciliation logic

mod health;

pub use health::{
    error_policy, reconcile, sync, AddonStatusClient, Backoff, Context, HubStatusClient,
};
