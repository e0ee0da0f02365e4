//! Controller wiring
//!
//! [`AddonManager`] owns the hub client and the agent registry and runs the
//! health controller: reflector-backed watch streams over both resources feed
//! a deduplicating, per-key-serialized work queue drained by a configurable
//! number of workers. `ManagedClusterAddOn` events enqueue their own key;
//! `ManifestWork` events enqueue the owning add-on derived from the addon
//! label and are dropped when the label is absent.
//!
//! The same reflected streams that trigger the queue populate the cache
//! readers, so a reconcile always observes a cache at least as fresh as the
//! event that enqueued its key.

use std::sync::Arc;

use futures::StreamExt;
use kube::api::Api;
use kube::runtime::controller::Config as ControllerConfig;
use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::{reflector, watcher, Controller, WatchStreamExt};
use kube::Client;
use tracing::{debug, error, info};

use crate::api::{ManagedClusterAddOn, ManifestWork};
use crate::controller::{error_policy, reconcile, Backoff, Context, HubStatusClient};
use crate::registry::AgentRegistry;
use crate::store::{AddonCache, WorkCache};
use crate::ADDON_LABEL_KEY;

/// Runtime configuration for the health controller
#[derive(Clone, Debug)]
pub struct AddonManagerConfig {
    /// Number of parallel reconcile workers draining the queue.
    ///
    /// Keys are still processed serially per `(cluster, addon)` pair; this
    /// only bounds concurrency across different keys.
    pub concurrency: u16,
}

impl Default for AddonManagerConfig {
    fn default() -> Self {
        Self { concurrency: 1 }
    }
}

/// Hub-side manager for registered add-on agents
pub struct AddonManager {
    client: Client,
    registry: AgentRegistry,
}

impl AddonManager {
    /// Create a manager with an empty registry
    pub fn new(client: Client) -> Self {
        Self {
            client,
            registry: AgentRegistry::new(),
        }
    }

    /// Register an agent descriptor, replacing any previous descriptor for
    /// the same add-on name
    pub fn register(&self, agent: Arc<dyn crate::agent::AgentAddon>) {
        self.registry.register(agent);
    }

    /// The shared agent registry
    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// Run the health controller until shutdown
    pub async fn run(self, config: AddonManagerConfig) {
        info!(
            concurrency = config.concurrency,
            addons = ?self.registry.names(),
            "starting add-on health controller"
        );

        let addons: Api<ManagedClusterAddOn> = Api::all(self.client.clone());
        let works: Api<ManifestWork> = Api::all(self.client.clone());

        let (addon_reader, addon_writer) = reflector::store();
        let addon_stream = watcher(addons, WatcherConfig::default())
            .default_backoff()
            .reflect(addon_writer)
            .applied_objects();

        let (work_reader, work_writer) = reflector::store();
        let work_stream = watcher(works, WatcherConfig::default())
            .default_backoff()
            .reflect(work_writer)
            .touched_objects();

        let ctx = Arc::new(Context {
            addons: Arc::new(AddonCache::new(addon_reader.clone())),
            works: Arc::new(WorkCache::new(work_reader)),
            registry: self.registry,
            status: Arc::new(HubStatusClient::new(self.client)),
            backoff: Backoff::default(),
        });

        Controller::for_stream(addon_stream, addon_reader)
            .watches_stream(work_stream, work_to_addon_key)
            .with_config(ControllerConfig::default().concurrency(config.concurrency))
            .shutdown_on_signal()
            .run(reconcile, error_policy, ctx)
            .for_each(|result| async move {
                match result {
                    Ok((obj, _action)) => {
                        debug!(addon = %obj.name, "health reconciliation completed")
                    }
                    Err(e) => error!(error = ?e, "health reconciliation error"),
                }
            })
            .await;

        info!("add-on health controller stopped");
    }
}

/// Map a `ManifestWork` event to the key of the add-on that owns it.
///
/// Ownership is the addon label; unlabeled works are not managed by the
/// framework and their events are dropped.
fn work_to_addon_key(work: ManifestWork) -> Option<ObjectRef<ManagedClusterAddOn>> {
    let namespace = work.metadata.namespace.clone()?;
    let addon = work
        .metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(ADDON_LABEL_KEY))?
        .clone();
    Some(ObjectRef::new(&addon).within(&namespace))
}
