//! Health reconciler
//!
//! The event-driven core: for each enqueued `(cluster, addon)` key, read the
//! add-on and its deploy works from the local caches, resolve the registered
//! prober, evaluate availability, and write back the minimal status change.
//!
//! Two write shapes are used deliberately. Mode transitions are rare and go
//! through a full status update, where a read-modify-write race is tolerable.
//! Condition transitions are frequent and go through a JSON merge patch that
//! carries the full conditions array with every peer condition copied from
//! the cached object, so conditions owned by other controllers are never
//! clobbered.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};
use tracing::{debug, info, instrument, warn};

#[cfg(test)]
use mockall::automock;

use crate::api::{upsert_condition, Condition, ManagedClusterAddOn};
use crate::probe::{evaluate, ProbeOutcome};
use crate::registry::AgentRegistry;
use crate::store::{AddonReader, WorkReader};
use crate::{Error, CONDITION_AVAILABLE};

/// Trait abstracting the status write path for `ManagedClusterAddOn`
///
/// This trait allows mocking the hub client in tests while using the real
/// client in production. Reads never go through here; they are served by the
/// cache readers.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AddonStatusClient: Send + Sync {
    /// Replace the full status of an add-on (mode transitions)
    async fn update_status(&self, addon: &ManagedClusterAddOn) -> Result<(), Error>;

    /// Merge-patch the status subresource of an add-on (condition transitions)
    async fn patch_status(
        &self,
        cluster: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<(), Error>;
}

/// Real hub-backed implementation of [`AddonStatusClient`]
pub struct HubStatusClient {
    client: Client,
}

impl HubStatusClient {
    /// Create a new HubStatusClient wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AddonStatusClient for HubStatusClient {
    async fn update_status(&self, addon: &ManagedClusterAddOn) -> Result<(), Error> {
        let cluster = addon
            .namespace()
            .ok_or_else(|| Error::internal("add-on without a cluster namespace"))?;
        let api: Api<ManagedClusterAddOn> = Api::namespaced(self.client.clone(), &cluster);

        let data = serde_json::to_vec(addon).map_err(|e| Error::serialization(e.to_string()))?;
        api.replace_status(&addon.name_any(), &PostParams::default(), data)
            .await?;
        Ok(())
    }

    async fn patch_status(
        &self,
        cluster: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<(), Error> {
        let api: Api<ManagedClusterAddOn> = Api::namespaced(self.client.clone(), cluster);
        api.patch_status(name, &PatchParams::default(), &Patch::Merge(patch))
            .await?;
        Ok(())
    }
}

/// Per-key exponential backoff for requeues after failed writes.
///
/// Starts in the low-millisecond range and doubles up to a cap near 16
/// minutes; a successful reconcile resets the key.
pub struct Backoff {
    base: Duration,
    cap: Duration,
    attempts: Mutex<HashMap<String, u32>>,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(5),
            cap: Duration::from_secs(1000),
            attempts: Mutex::new(HashMap::new()),
        }
    }
}

impl Backoff {
    /// The next requeue delay for a key, doubling on every call
    pub fn next_delay(&self, cluster: &str, addon: &str) -> Duration {
        let mut attempts = self.attempts.lock().expect("backoff lock poisoned");
        let n = attempts.entry(format!("{}/{}", cluster, addon)).or_insert(0);
        let delay = self.base.saturating_mul(1u32 << (*n).min(28)).min(self.cap);
        *n += 1;
        delay
    }

    /// Forget the failure history of a key
    pub fn reset(&self, cluster: &str, addon: &str) {
        self.attempts
            .lock()
            .expect("backoff lock poisoned")
            .remove(&format!("{}/{}", cluster, addon));
    }
}

/// Controller context shared across all reconciliation calls
pub struct Context {
    /// Cached `ManagedClusterAddOn` reader
    pub addons: Arc<dyn AddonReader>,
    /// Cached `ManifestWork` reader
    pub works: Arc<dyn WorkReader>,
    /// Registered agent descriptors
    pub registry: AgentRegistry,
    /// Status write path (trait object for testability)
    pub status: Arc<dyn AddonStatusClient>,
    /// Per-key requeue backoff
    pub backoff: Backoff,
}

/// Reconcile one `(cluster, addon)` key.
///
/// Level-triggered: state is always reread from the caches, never threaded
/// from the triggering event. A missing add-on or descriptor means the key is
/// out of scope and succeeds without writes.
pub async fn sync(ctx: &Context, cluster: &str, addon_name: &str) -> Result<(), Error> {
    let Some(addon) = ctx.addons.get(cluster, addon_name) else {
        debug!(cluster, addon = addon_name, "add-on not in cache, nothing to do");
        return Ok(());
    };

    let Some(agent) = ctx.registry.lookup(addon_name) else {
        debug!(cluster, addon = addon_name, "no agent registered, nothing to do");
        return Ok(());
    };

    let Some(prober) = agent.options().health_prober else {
        return Ok(());
    };

    // Mode is a function of the prober type alone and rarely flips; when it
    // does, write it with a full status update and let the condition follow
    // on the next pass.
    let desired_mode = prober.mode();
    if addon.health_check_mode() != desired_mode {
        info!(
            cluster,
            addon = addon_name,
            prober = prober.kind(),
            mode = %desired_mode,
            "updating health check mode"
        );
        let mut updated = (*addon).clone();
        let status = updated.status.get_or_insert_with(Default::default);
        status.health_check.mode = desired_mode;
        ctx.status.update_status(&updated).await?;
        return Ok(());
    }

    let works = ctx.works.list(cluster, addon_name);
    match evaluate(Some(&prober), &works) {
        ProbeOutcome::Skip | ProbeOutcome::ModeOnly(_) => Ok(()),
        ProbeOutcome::Verdict {
            status,
            reason,
            message,
        } => {
            debug!(
                cluster,
                addon = addon_name,
                status = %status,
                reason = %reason,
                works = works.len(),
                "patching availability"
            );

            let mut conditions = addon
                .status
                .as_ref()
                .map(|s| s.conditions.clone())
                .unwrap_or_default();
            upsert_condition(
                &mut conditions,
                Condition::new(CONDITION_AVAILABLE, status, reason, message),
            );

            let patch = serde_json::json!({"status": {"conditions": conditions}});
            ctx.status.patch_status(cluster, addon_name, &patch).await
        }
    }
}

/// Reconcile a `ManagedClusterAddOn` resource.
///
/// Thin adapter from the controller runtime to [`sync`]: the object's
/// namespace is the managed cluster name and its name is the add-on name.
#[instrument(skip(addon, ctx), fields(cluster = %addon.namespace().unwrap_or_default(), addon = %addon.name_any()))]
pub async fn reconcile(
    addon: Arc<ManagedClusterAddOn>,
    ctx: Arc<Context>,
) -> Result<Action, Error> {
    let cluster = addon
        .namespace()
        .ok_or_else(|| Error::internal("add-on without a cluster namespace"))?;
    let name = addon.name_any();

    sync(&ctx, &cluster, &name).await?;

    ctx.backoff.reset(&cluster, &name);
    Ok(Action::await_change())
}

/// Error policy for the controller.
///
/// Write conflicts are expected under concurrent status writers and requeue
/// quietly; anything else is logged before the same backoff applies.
pub fn error_policy(addon: Arc<ManagedClusterAddOn>, error: &Error, ctx: Arc<Context>) -> Action {
    let cluster = addon.namespace().unwrap_or_default();
    let name = addon.name_any();
    let delay = ctx.backoff.next_delay(&cluster, &name);

    if error.is_conflict() {
        debug!(cluster = %cluster, addon = %name, ?delay, "status write conflicted, requeueing");
    } else {
        warn!(cluster = %cluster, addon = %name, error = %error, ?delay, "reconciliation failed, requeueing");
    }

    Action::requeue(delay)
}
