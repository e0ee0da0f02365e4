//! In-memory registry of agent descriptors
//!
//! The registry is read on every reconcile and mutated rarely (startup and
//! hot-reload), so it hands out copy-on-write snapshots: readers clone an
//! `Arc` under a momentary lock and never contend with an in-progress
//! registration.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::agent::AgentAddon;

type AgentMap = HashMap<String, Arc<dyn AgentAddon>>;

/// Registry mapping add-on names to their registered descriptors.
///
/// Cloning the registry is cheap and shares the underlying map; all clones
/// observe the same registrations.
#[derive(Clone, Default)]
pub struct AgentRegistry {
    inner: Arc<RwLock<Arc<AgentMap>>>,
}

impl AgentRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent descriptor, replacing any existing descriptor with
    /// the same add-on name.
    pub fn register(&self, agent: Arc<dyn AgentAddon>) {
        let name = agent.options().addon_name;
        debug!(addon = %name, "registering agent descriptor");

        let mut guard = self.inner.write().expect("registry lock poisoned");
        let mut map = guard.as_ref().clone();
        map.insert(name, agent);
        *guard = Arc::new(map);
    }

    /// Look up the descriptor for an add-on name
    pub fn lookup(&self, addon_name: &str) -> Option<Arc<dyn AgentAddon>> {
        self.snapshot().get(addon_name).cloned()
    }

    /// A point-in-time snapshot of the registered set.
    ///
    /// The snapshot is immutable; registrations performed after it is taken
    /// are not visible through it.
    pub fn snapshot(&self) -> Arc<AgentMap> {
        self.inner.read().expect("registry lock poisoned").clone()
    }

    /// Names of all registered add-ons, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.snapshot().keys().cloned().collect();
        names.sort();
        names
    }
}
