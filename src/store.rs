//! Cache-backed readers
//!
//! All reads in the reconcile hot path go through local reflector stores;
//! the hub API is only contacted for writes. The traits here are the seams
//! the reconciler depends on, so tests can substitute fixture-backed readers.

use std::sync::Arc;

use kube::runtime::reflector::{ObjectRef, Store};
use kube::ResourceExt;

use crate::api::{ManagedClusterAddOn, ManifestWork};
use crate::ADDON_LABEL_KEY;

/// Read access to the cached `ManagedClusterAddOn` objects
pub trait AddonReader: Send + Sync {
    /// The add-on record for a `(cluster, addon)` pair, if cached.
    ///
    /// A missing object is not an error; the reconciler treats it as
    /// "nothing to do".
    fn get(&self, cluster: &str, addon: &str) -> Option<Arc<ManagedClusterAddOn>>;
}

/// Read access to the cached `ManifestWork` objects
pub trait WorkReader: Send + Sync {
    /// All deploy works owned by an add-on on one cluster, sorted by name.
    ///
    /// Multiple works per add-on are expected; all of them participate in
    /// availability aggregation.
    fn list(&self, cluster: &str, addon: &str) -> Vec<Arc<ManifestWork>>;
}

/// Reflector-store-backed [`AddonReader`]
pub struct AddonCache {
    store: Store<ManagedClusterAddOn>,
}

impl AddonCache {
    /// Wrap a reflector store
    pub fn new(store: Store<ManagedClusterAddOn>) -> Self {
        Self { store }
    }
}

impl AddonReader for AddonCache {
    fn get(&self, cluster: &str, addon: &str) -> Option<Arc<ManagedClusterAddOn>> {
        self.store
            .get(&ObjectRef::<ManagedClusterAddOn>::new(addon).within(cluster))
    }
}

/// Reflector-store-backed [`WorkReader`]
pub struct WorkCache {
    store: Store<ManifestWork>,
}

impl WorkCache {
    /// Wrap a reflector store
    pub fn new(store: Store<ManifestWork>) -> Self {
        Self { store }
    }
}

impl WorkReader for WorkCache {
    fn list(&self, cluster: &str, addon: &str) -> Vec<Arc<ManifestWork>> {
        select_works(self.store.state(), cluster, addon)
    }
}

/// Filter a cache snapshot down to the works owned by `(cluster, addon)`.
///
/// Ownership is the addon label within the cluster namespace. The result is
/// sorted by work name so downstream probing is deterministic when several
/// works report the same resource.
pub(crate) fn select_works(
    state: Vec<Arc<ManifestWork>>,
    cluster: &str,
    addon: &str,
) -> Vec<Arc<ManifestWork>> {
    let mut works: Vec<Arc<ManifestWork>> = state
        .into_iter()
        .filter(|work| work.metadata.namespace.as_deref() == Some(cluster))
        .filter(|work| {
            work.metadata
                .labels
                .as_ref()
                .and_then(|labels| labels.get(ADDON_LABEL_KEY))
                .map(String::as_str)
                == Some(addon)
        })
        .collect();
    works.sort_by_key(|work| work.name_any());
    works
}
