//! Pure availability evaluator
//!
//! Given an add-on's declared prober and the deploy works observed for one
//! `(cluster, addon)` pair, [`evaluate`] decides what (if anything) the
//! reconciler should write. The evaluator is side-effect-free; all hub state
//! flows in through its arguments.
//!
//! Works are expected in lexicographic name order (the cache reader sorts
//! them) and manifests are scanned in list order with the first identity
//! match winning, so reconciles with identical inputs always reach the same
//! verdict even when several manifests match a probe field.

use std::sync::Arc;

use crate::agent::{HealthProber, ResourceIdentifier, WorkProber};
use crate::api::{
    find_condition, Condition, ConditionStatus, HealthCheckMode, ManifestWork, StatusFeedbackResult,
};
use crate::CONDITION_AVAILABLE;

/// What the reconciler should do for one `(cluster, addon)` pair
#[derive(Clone, Debug, PartialEq)]
pub enum ProbeOutcome {
    /// The add-on is out of scope; perform no write at all
    Skip,
    /// Only keep the health check mode in sync; the `Available` condition is
    /// owned elsewhere or not maintained
    ModeOnly(HealthCheckMode),
    /// Set the `Available` condition to this verdict
    Verdict {
        /// Availability status
        status: ConditionStatus,
        /// Machine-readable reason
        reason: String,
        /// Human-readable message
        message: String,
    },
}

impl ProbeOutcome {
    fn verdict(status: ConditionStatus, reason: &str, message: impl Into<String>) -> Self {
        ProbeOutcome::Verdict {
            status,
            reason: reason.to_string(),
            message: message.into(),
        }
    }
}

/// Evaluate the availability of one add-on from its prober and the deploy
/// works observed for it.
pub fn evaluate(prober: Option<&HealthProber>, works: &[Arc<ManifestWork>]) -> ProbeOutcome {
    let Some(prober) = prober else {
        return ProbeOutcome::Skip;
    };

    match prober {
        HealthProber::None => ProbeOutcome::ModeOnly(HealthCheckMode::Customized),
        HealthProber::Lease => ProbeOutcome::ModeOnly(HealthCheckMode::Lease),
        HealthProber::DeploymentAvailability | HealthProber::Work(None) => {
            aggregate_work_conditions(works)
        }
        HealthProber::Work(Some(work_prober)) => probe_work_feedback(work_prober, works),
    }
}

/// Fold the `Available` conditions of all deploy works into one verdict:
/// available iff every work reports `Available=True`.
fn aggregate_work_conditions(works: &[Arc<ManifestWork>]) -> ProbeOutcome {
    if works.is_empty() {
        return ProbeOutcome::verdict(
            ConditionStatus::Unknown,
            "WorkNotFound",
            "deploy work for the add-on is not found",
        );
    }

    let mut pending = false;
    for work in works {
        match work_available_condition(work) {
            Some(c) if c.status == ConditionStatus::False => {
                let message = if c.message.is_empty() {
                    format!("deploy work {} failed to apply", work_name(work))
                } else {
                    c.message.clone()
                };
                return ProbeOutcome::verdict(ConditionStatus::False, "WorkApplyFailed", message);
            }
            Some(c) if c.status == ConditionStatus::True => {}
            _ => pending = true,
        }
    }

    if pending {
        ProbeOutcome::verdict(
            ConditionStatus::Unknown,
            "WorkNotApplied",
            "deploy work is not applied yet",
        )
    } else {
        ProbeOutcome::verdict(
            ConditionStatus::True,
            "WorkAvailable",
            "deploy work is applied and available",
        )
    }
}

/// Probe per-resource feedback: every probe field must be matched by a
/// manifest in some work, and the health check must accept each match.
fn probe_work_feedback(prober: &WorkProber, works: &[Arc<ManifestWork>]) -> ProbeOutcome {
    if works.is_empty() || prober.probe_fields.is_empty() {
        return ProbeOutcome::verdict(
            ConditionStatus::Unknown,
            "NoProbeResult",
            "probe results are not returned",
        );
    }

    // Match every identifier before judging any of them: a single unmatched
    // field means the agent has not reported enough to reach a verdict.
    let mut matched = Vec::with_capacity(prober.probe_fields.len());
    for field in &prober.probe_fields {
        let identifier = &field.resource_identifier;
        match find_feedback(identifier, works) {
            Some(feedback) => matched.push((identifier, feedback)),
            None => {
                return ProbeOutcome::verdict(
                    ConditionStatus::Unknown,
                    "NoProbeResult",
                    format!("probe result for {} is not returned", identifier),
                );
            }
        }
    }

    let failures: Vec<String> = matched
        .into_iter()
        .filter_map(|(identifier, feedback)| {
            (prober.health_check)(identifier, feedback)
                .err()
                .map(|e| format!("{}: {}", identifier, e))
        })
        .collect();

    if failures.is_empty() {
        ProbeOutcome::verdict(
            ConditionStatus::True,
            "ProbeAvailable",
            "add-on is available",
        )
    } else {
        ProbeOutcome::verdict(ConditionStatus::False, "ProbeUnavailable", failures.join("; "))
    }
}

/// Find the feedback for an identifier across all works.
///
/// Works are scanned in slice order and manifests in list order; the first
/// identity match wins. `group` participates in matching only when the probe
/// field sets it.
fn find_feedback<'a>(
    identifier: &ResourceIdentifier,
    works: &'a [Arc<ManifestWork>],
) -> Option<&'a StatusFeedbackResult> {
    for work in works {
        let Some(status) = work.status.as_ref() else {
            continue;
        };
        for manifest in &status.resource_status.manifests {
            let meta = &manifest.resource_meta;
            if meta.resource == identifier.resource
                && meta.name == identifier.name
                && meta.namespace == identifier.namespace
                && (identifier.group.is_empty() || meta.group == identifier.group)
            {
                return Some(&manifest.status_feedbacks);
            }
        }
    }
    None
}

fn work_available_condition(work: &ManifestWork) -> Option<&Condition> {
    work.status
        .as_ref()
        .and_then(|s| find_condition(&s.conditions, CONDITION_AVAILABLE))
}

fn work_name(work: &ManifestWork) -> String {
    work.metadata.name.clone().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{ProbeField, ProbeFailure, WorkProber};
    use crate::api::{
        FeedbackValue, ManifestCondition, ManifestResourceMeta, ManifestResourceStatus,
        ManifestWorkSpec, ManifestWorkStatus,
    };
    use kube::api::ObjectMeta;
    use std::sync::Mutex;

    fn work(name: &str, available: Option<ConditionStatus>) -> Arc<ManifestWork> {
        let status = available.map(|status| ManifestWorkStatus {
            conditions: vec![Condition::new(
                CONDITION_AVAILABLE,
                status,
                "ResourcesAvailable",
                "",
            )],
            ..Default::default()
        });
        Arc::new(ManifestWork {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("cluster1".to_string()),
                ..Default::default()
            },
            spec: ManifestWorkSpec::default(),
            status,
        })
    }

    fn manifest(resource: &str, name: &str, namespace: &str, value_name: &str) -> ManifestCondition {
        ManifestCondition {
            resource_meta: ManifestResourceMeta {
                resource: resource.to_string(),
                name: name.to_string(),
                namespace: namespace.to_string(),
                ..Default::default()
            },
            status_feedbacks: StatusFeedbackResult {
                values: vec![FeedbackValue {
                    name: value_name.to_string(),
                    field_value: None,
                }],
            },
            conditions: vec![],
        }
    }

    fn work_with_manifests(name: &str, manifests: Vec<ManifestCondition>) -> Arc<ManifestWork> {
        let mut base = Arc::try_unwrap(work(name, Some(ConditionStatus::True))).unwrap();
        base.status.as_mut().unwrap().resource_status = ManifestResourceStatus { manifests };
        Arc::new(base)
    }

    fn identifier(resource: &str, name: &str, namespace: &str) -> ResourceIdentifier {
        ResourceIdentifier {
            resource: resource.to_string(),
            name: name.to_string(),
            namespace: namespace.to_string(),
            ..Default::default()
        }
    }

    fn probe_field(resource: &str, name: &str, namespace: &str) -> ProbeField {
        ProbeField {
            resource_identifier: identifier(resource, name, namespace),
            probe_rules: vec![],
        }
    }

    fn verdict_of(outcome: ProbeOutcome) -> (ConditionStatus, String) {
        match outcome {
            ProbeOutcome::Verdict { status, reason, .. } => (status, reason),
            other => panic!("expected a verdict, got {:?}", other),
        }
    }

    #[test]
    fn absent_prober_skips_entirely() {
        assert_eq!(evaluate(None, &[]), ProbeOutcome::Skip);
        assert_eq!(
            evaluate(None, &[work("w", Some(ConditionStatus::True))]),
            ProbeOutcome::Skip
        );
    }

    #[test]
    fn none_and_lease_probers_only_maintain_mode() {
        assert_eq!(
            evaluate(Some(&HealthProber::None), &[]),
            ProbeOutcome::ModeOnly(HealthCheckMode::Customized)
        );
        // The lease controller owns the Available condition for Lease probers
        assert_eq!(
            evaluate(Some(&HealthProber::Lease), &[]),
            ProbeOutcome::ModeOnly(HealthCheckMode::Lease)
        );
    }

    #[test]
    fn work_prober_without_works_is_unknown() {
        let (status, reason) = verdict_of(evaluate(Some(&HealthProber::Work(None)), &[]));
        assert_eq!(status, ConditionStatus::Unknown);
        assert_eq!(reason, "WorkNotFound");
    }

    #[test]
    fn partial_availability_is_unknown() {
        let works = vec![
            work("addon-test-deploy-0", Some(ConditionStatus::True)),
            work("addon-test-deploy-1", None),
        ];
        let (status, reason) = verdict_of(evaluate(Some(&HealthProber::Work(None)), &works));
        assert_eq!(status, ConditionStatus::Unknown);
        assert_eq!(reason, "WorkNotApplied");
    }

    #[test]
    fn all_works_available_is_available() {
        let works = vec![
            work("addon-test-deploy-0", Some(ConditionStatus::True)),
            work("addon-test-deploy-1", Some(ConditionStatus::True)),
        ];
        let (status, reason) = verdict_of(evaluate(Some(&HealthProber::Work(None)), &works));
        assert_eq!(status, ConditionStatus::True);
        assert_eq!(reason, "WorkAvailable");
    }

    #[test]
    fn any_failed_work_is_unavailable() {
        let mut failed = Arc::try_unwrap(work("addon-test-deploy-1", Some(ConditionStatus::False)))
            .unwrap();
        failed.status.as_mut().unwrap().conditions[0].message =
            "deployment apply rejected".to_string();
        let works = vec![
            work("addon-test-deploy-0", Some(ConditionStatus::True)),
            Arc::new(failed),
        ];

        match evaluate(Some(&HealthProber::Work(None)), &works) {
            ProbeOutcome::Verdict {
                status,
                reason,
                message,
            } => {
                assert_eq!(status, ConditionStatus::False);
                assert_eq!(reason, "WorkApplyFailed");
                assert_eq!(message, "deployment apply rejected");
            }
            other => panic!("expected a verdict, got {:?}", other),
        }
    }

    #[test]
    fn failed_work_outranks_pending_work() {
        // One work is still pending and another already failed; failure wins.
        let works = vec![
            work("addon-test-deploy-0", None),
            work("addon-test-deploy-1", Some(ConditionStatus::False)),
        ];
        let (status, reason) = verdict_of(evaluate(Some(&HealthProber::Work(None)), &works));
        assert_eq!(status, ConditionStatus::False);
        assert_eq!(reason, "WorkApplyFailed");
    }

    #[test]
    fn deployment_availability_aggregates_like_plain_work() {
        let works = vec![work("addon-test-deploy-0", Some(ConditionStatus::True))];
        let (status, reason) =
            verdict_of(evaluate(Some(&HealthProber::DeploymentAvailability), &works));
        assert_eq!(status, ConditionStatus::True);
        assert_eq!(reason, "WorkAvailable");

        let (status, reason) =
            verdict_of(evaluate(Some(&HealthProber::DeploymentAvailability), &[]));
        assert_eq!(status, ConditionStatus::Unknown);
        assert_eq!(reason, "WorkNotFound");
    }

    fn feedback_prober(
        fields: Vec<ProbeField>,
        check: impl Fn(&ResourceIdentifier, &StatusFeedbackResult) -> Result<(), ProbeFailure>
            + Send
            + Sync
            + 'static,
    ) -> HealthProber {
        HealthProber::Work(Some(WorkProber {
            probe_fields: fields,
            health_check: Arc::new(check),
        }))
    }

    #[test]
    fn feedback_prober_without_works_is_unknown() {
        let prober = feedback_prober(vec![probe_field("tests", "test", "testns")], |_, _| Ok(()));
        let (status, reason) = verdict_of(evaluate(Some(&prober), &[]));
        assert_eq!(status, ConditionStatus::Unknown);
        assert_eq!(reason, "NoProbeResult");
    }

    #[test]
    fn feedback_prober_without_fields_is_unknown() {
        let prober = feedback_prober(vec![], |_, _| Ok(()));
        let works = vec![work("addon-test-deploy-0", Some(ConditionStatus::True))];
        let (status, reason) = verdict_of(evaluate(Some(&prober), &works));
        assert_eq!(status, ConditionStatus::Unknown);
        assert_eq!(reason, "NoProbeResult");
    }

    #[test]
    fn unmatched_identifier_is_unknown_even_when_matched_checks_fail() {
        // Only "test" is reported; "test2" is missing, so no verdict can be
        // reached and the failing callback must not run the outcome to False.
        let works = vec![work_with_manifests(
            "addon-test-deploy-0",
            vec![manifest("tests", "test", "testns", "noop")],
        )];
        let prober = feedback_prober(
            vec![
                probe_field("tests", "test", "testns"),
                probe_field("tests", "test2", "testns"),
            ],
            |_, _| Err(ProbeFailure::new("always failing")),
        );

        let (status, reason) = verdict_of(evaluate(Some(&prober), &works));
        assert_eq!(status, ConditionStatus::Unknown);
        assert_eq!(reason, "NoProbeResult");
    }

    #[test]
    fn failing_check_is_unavailable() {
        // Feedback for the two probed resources is spread across two works
        let works = vec![
            work_with_manifests(
                "addon-test-deploy-0",
                vec![manifest("tests", "test", "testns", "noop")],
            ),
            work_with_manifests(
                "addon-test-deploy-1",
                vec![manifest("tests", "test2", "testns", "noop")],
            ),
        ];
        let prober = feedback_prober(
            vec![
                probe_field("tests", "test", "testns"),
                probe_field("tests", "test2", "testns"),
            ],
            |identifier, _| {
                if identifier.name == "test" {
                    Err(ProbeFailure::new("health check fails"))
                } else {
                    Ok(())
                }
            },
        );

        match evaluate(Some(&prober), &works) {
            ProbeOutcome::Verdict {
                status,
                reason,
                message,
            } => {
                assert_eq!(status, ConditionStatus::False);
                assert_eq!(reason, "ProbeUnavailable");
                assert!(message.contains("tests/testns/test"));
                assert!(message.contains("health check fails"));
            }
            other => panic!("expected a verdict, got {:?}", other),
        }
    }

    #[test]
    fn passing_checks_are_available() {
        let works = vec![
            work_with_manifests(
                "addon-test-deploy-0",
                vec![manifest("tests", "test", "testns", "noop")],
            ),
            work_with_manifests(
                "addon-test-deploy-1",
                vec![manifest("tests", "test2", "testns", "noop")],
            ),
        ];
        let prober = feedback_prober(
            vec![
                probe_field("tests", "test", "testns"),
                probe_field("tests", "test2", "testns"),
            ],
            |_, _| Ok(()),
        );

        let (status, reason) = verdict_of(evaluate(Some(&prober), &works));
        assert_eq!(status, ConditionStatus::True);
        assert_eq!(reason, "ProbeAvailable");
    }

    #[test]
    fn group_is_matched_only_when_set_on_the_probe_field() {
        let mut with_group = manifest("tests", "test", "testns", "grouped");
        with_group.resource_meta.group = "example.io".to_string();
        let works = vec![work_with_manifests("addon-test-deploy-0", vec![with_group])];

        // Group set and mismatching: no match
        let mut grouped_field = probe_field("tests", "test", "testns");
        grouped_field.resource_identifier.group = "other.io".to_string();
        let prober = feedback_prober(vec![grouped_field], |_, _| Ok(()));
        let (status, _) = verdict_of(evaluate(Some(&prober), &works));
        assert_eq!(status, ConditionStatus::Unknown);

        // Group unset: matched regardless of the manifest's group
        let prober = feedback_prober(vec![probe_field("tests", "test", "testns")], |_, _| Ok(()));
        let (status, _) = verdict_of(evaluate(Some(&prober), &works));
        assert_eq!(status, ConditionStatus::True);
    }

    #[test]
    fn first_matching_manifest_in_work_order_wins() {
        // Both works report feedback for the same identifier with different
        // payloads; the first work in slice order must be the one judged.
        let works = vec![
            work_with_manifests(
                "addon-test-deploy-0",
                vec![manifest("tests", "test", "testns", "from-first")],
            ),
            work_with_manifests(
                "addon-test-deploy-1",
                vec![manifest("tests", "test", "testns", "from-second")],
            ),
        ];

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_in_check = seen.clone();
        let prober = feedback_prober(vec![probe_field("tests", "test", "testns")], move |_, fb| {
            let names: Vec<String> = fb.values.iter().map(|v| v.name.clone()).collect();
            seen_in_check.lock().unwrap().extend(names);
            Ok(())
        });

        verdict_of(evaluate(Some(&prober), &works));
        assert_eq!(*seen.lock().unwrap(), vec!["from-first".to_string()]);
    }
}
