//! Placement engine
//!
//! Two regimes, chosen by resource kind:
//! - elastic (compute-service): validates the desired count against the
//!   autoscaling bounds; capacity itself is requested from the provider
//! - constrained (external-compute-service, load-balancer): filters
//!   registered nodes by every constraint and selects one node per instance

use crate::error::PlacementError;
use crate::health::{HealthProbe, wait_healthy};
use crate::model::{Node, Placement, PlacementRegime};
use async_trait::async_trait;
use stackfleet_core::{
    ConstraintKind, PlacementConstraint, ResourceDescriptor, ResourceKind, WorkloadSpec,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// `<stack>/<resource>`
pub fn service_key(stack: &str, resource: &str) -> String {
    format!("{}/{}", stack, resource)
}

/// Constraints in force for a workload.
///
/// External services without an authored cluster constraint are bound to
/// the cluster named by their (resolved) `cluster` input.
pub fn effective_constraints(
    resource: &ResourceDescriptor,
    cluster: Option<&str>,
) -> Vec<PlacementConstraint> {
    let mut constraints = resource
        .workload
        .as_ref()
        .map(|w| w.placement.clone())
        .unwrap_or_default();

    let has_cluster_constraint = constraints
        .iter()
        .any(|c| c.kind == ConstraintKind::MemberOfCluster);
    if resource.kind == ResourceKind::ExternalComputeService
        && !has_cluster_constraint
        && let Some(cluster) = cluster
    {
        constraints.push(PlacementConstraint::member_of_cluster(cluster));
    }

    constraints
}

/// Place a workload resource onto capacity
pub fn place(
    service: &str,
    resource: &ResourceDescriptor,
    constraints: &[PlacementConstraint],
    candidates: &[Node],
) -> Result<Placement, PlacementError> {
    if !resource.kind.is_workload() {
        return Err(PlacementError::NotAWorkload {
            service: service.to_string(),
            kind: resource.kind,
        });
    }

    let default_workload = WorkloadSpec::default();
    let workload = resource.workload.as_ref().unwrap_or(&default_workload);
    validate_scaling(service, workload)?;

    if resource.kind.is_elastic() {
        debug!(service, desired = workload.desired_count, "Elastic placement");
        return Ok(Placement {
            service: service.to_string(),
            regime: PlacementRegime::Elastic,
            desired_count: workload.desired_count,
            nodes: Vec::new(),
            scaling: workload.autoscaling.clone(),
        });
    }

    let eligible: Vec<&Node> = candidates
        .iter()
        .filter(|node| node.satisfies(constraints))
        .collect();

    if eligible.is_empty() {
        return Err(PlacementError::NoEligibleNode {
            service: service.to_string(),
            constraints: describe(constraints),
        });
    }

    let desired = workload.desired_count;
    if desired as usize > eligible.len() {
        return Err(PlacementError::InsufficientCapacity {
            service: service.to_string(),
            desired,
            eligible: eligible.len(),
        });
    }

    let nodes: Vec<String> = eligible
        .iter()
        .take(desired as usize)
        .map(|n| n.id.clone())
        .collect();
    debug!(service, nodes = ?nodes, "Constrained placement");

    Ok(Placement {
        service: service.to_string(),
        regime: PlacementRegime::Constrained,
        desired_count: desired,
        nodes,
        scaling: workload.autoscaling.clone(),
    })
}

/// `min ≤ desired ≤ max` when an autoscaling policy is attached
fn validate_scaling(service: &str, workload: &WorkloadSpec) -> Result<(), PlacementError> {
    if let Some(policy) = &workload.autoscaling {
        let desired = workload.desired_count;
        if desired < policy.min_capacity || desired > policy.max_capacity {
            return Err(PlacementError::ScalingOutOfBounds {
                service: service.to_string(),
                desired,
                min: policy.min_capacity,
                max: policy.max_capacity,
            });
        }
    }
    Ok(())
}

fn describe(constraints: &[PlacementConstraint]) -> String {
    if constraints.is_empty() {
        return "none".to_string();
    }
    constraints
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Re-applies a previous placement during rollback
#[async_trait]
pub trait Redeploy: Send + Sync {
    async fn redeploy(&self, placement: &Placement) -> Result<(), String>;
}

/// Placement with a health gate and last-stable tracking
pub struct PlacementEngine {
    probe: Arc<dyn HealthProbe>,
    stable: RwLock<HashMap<String, Placement>>,
}

impl PlacementEngine {
    pub fn new(probe: Arc<dyn HealthProbe>) -> Self {
        Self {
            probe,
            stable: RwLock::new(HashMap::new()),
        }
    }

    /// Seed the last stable placements, e.g. from persisted state
    pub fn with_stable(self, placements: impl IntoIterator<Item = Placement>) -> Self {
        let stable = placements
            .into_iter()
            .map(|p| (p.service.clone(), p))
            .collect();
        Self {
            probe: self.probe,
            stable: RwLock::new(stable),
        }
    }

    pub fn place(
        &self,
        service: &str,
        resource: &ResourceDescriptor,
        constraints: &[PlacementConstraint],
        candidates: &[Node],
    ) -> Result<Placement, PlacementError> {
        place(service, resource, constraints, candidates)
    }

    pub async fn last_stable(&self, service: &str) -> Option<Placement> {
        self.stable.read().await.get(service).cloned()
    }

    /// All stable placements, sorted by service
    pub async fn stable_placements(&self) -> Vec<Placement> {
        let mut placements: Vec<Placement> = self.stable.read().await.values().cloned().collect();
        placements.sort_by(|a, b| a.service.cmp(&b.service));
        placements
    }

    /// Gate a freshly deployed placement on its health check.
    ///
    /// Healthy (or unchecked) placements become the last stable placement.
    /// An unhealthy placement with rollback enabled is reverted to the
    /// previous stable placement through `redeploy`; either way the result
    /// is an error and nothing is retried.
    pub async fn health_gate(
        &self,
        placement: &Placement,
        workload: &WorkloadSpec,
        redeploy: &dyn Redeploy,
    ) -> Result<(), PlacementError> {
        let Some(check) = &workload.health else {
            self.record_stable(placement).await;
            return Ok(());
        };

        match wait_healthy(self.probe.as_ref(), placement, check).await {
            Ok(attempts) => {
                info!(service = %placement.service, attempts, "Placement healthy");
                self.record_stable(placement).await;
                Ok(())
            }
            Err(attempts) => {
                warn!(service = %placement.service, attempts, "Placement unhealthy");
                let previous = if workload.rollback {
                    self.last_stable(&placement.service).await
                } else {
                    None
                };

                let Some(previous) = previous else {
                    return Err(PlacementError::Unhealthy {
                        service: placement.service.clone(),
                        attempts,
                        rolled_back: false,
                    });
                };

                info!(service = %placement.service, nodes = ?previous.nodes, "Rolling back to last stable placement");
                redeploy.redeploy(&previous).await.map_err(|message| {
                    PlacementError::RollbackFailed {
                        service: placement.service.clone(),
                        message,
                    }
                })?;

                Err(PlacementError::Unhealthy {
                    service: placement.service.clone(),
                    attempts,
                    rolled_back: true,
                })
            }
        }
    }

    async fn record_stable(&self, placement: &Placement) {
        self.stable
            .write()
            .await
            .insert(placement.service.clone(), placement.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::AlwaysHealthy;
    use stackfleet_core::{HealthCheck, HealthProtocol, ScalingPolicy, TargetMetric, Value};
    use std::sync::Mutex;

    fn nodes() -> Vec<Node> {
        vec![
            Node::new("n1", "anywhere").with_attribute("role", "loadbalancer"),
            Node::new("n2", "anywhere").with_attribute("role", "webserver"),
        ]
    }

    fn external(desired_count: u32) -> ResourceDescriptor {
        ResourceDescriptor::new("traefik", ResourceKind::ExternalComputeService)
            .with_input("cluster", Value::literal("anywhere"))
            .with_input("image", Value::literal("traefik:v2.10"))
            .with_workload(WorkloadSpec {
                desired_count,
                placement: vec![PlacementConstraint::attribute_equals(
                    "role",
                    "loadbalancer",
                )],
                ..WorkloadSpec::default()
            })
    }

    fn elastic(desired_count: u32) -> ResourceDescriptor {
        ResourceDescriptor::new("web", ResourceKind::ComputeService)
            .with_input("cluster", Value::literal("main"))
            .with_input("image", Value::literal("myla-dev:1.2"))
            .with_workload(WorkloadSpec {
                desired_count,
                autoscaling: Some(ScalingPolicy {
                    min_capacity: 2,
                    max_capacity: 6,
                    target_metric: TargetMetric::CpuUtilization,
                    target_percent: 75.0,
                }),
                ..WorkloadSpec::default()
            })
    }

    #[test]
    fn test_attribute_constraint_selects_matching_node() {
        let resource = external(1);
        let constraints = effective_constraints(&resource, Some("anywhere"));
        let placement = place("lb/traefik", &resource, &constraints, &nodes()).unwrap();
        assert_eq!(placement.regime, PlacementRegime::Constrained);
        assert_eq!(placement.nodes, vec!["n1".to_string()]);
    }

    #[test]
    fn test_no_overcommit() {
        let resource = external(2);
        let constraints = effective_constraints(&resource, Some("anywhere"));
        let err = place("lb/traefik", &resource, &constraints, &nodes()).unwrap_err();
        assert_eq!(
            err,
            PlacementError::InsufficientCapacity {
                service: "lb/traefik".to_string(),
                desired: 2,
                eligible: 1,
            }
        );
    }

    #[test]
    fn test_no_eligible_node() {
        let resource = external(1);
        let err = place(
            "lb/traefik",
            &resource,
            &[PlacementConstraint::attribute_equals("role", "database")],
            &nodes(),
        )
        .unwrap_err();
        assert!(matches!(err, PlacementError::NoEligibleNode { .. }));
    }

    #[test]
    fn test_implicit_cluster_membership() {
        let resource = external(1);
        let constraints = effective_constraints(&resource, Some("other-cluster"));
        assert_eq!(constraints.len(), 2);
        assert!(matches!(
            place("lb/traefik", &resource, &constraints, &nodes()).unwrap_err(),
            PlacementError::NoEligibleNode { .. }
        ));

        // load balancers are not bound implicitly
        let mut lb = external(1);
        lb.kind = ResourceKind::LoadBalancer;
        assert_eq!(effective_constraints(&lb, Some("other-cluster")).len(), 1);
    }

    #[test]
    fn test_elastic_within_bounds() {
        let placement = place("ecs/web", &elastic(2), &[], &[]).unwrap();
        assert!(placement.is_elastic());
        assert!(placement.nodes.is_empty());
        assert_eq!(placement.scaling.unwrap().max_capacity, 6);
    }

    #[test]
    fn test_elastic_out_of_bounds() {
        let err = place("ecs/web", &elastic(8), &[], &[]).unwrap_err();
        assert_eq!(
            err,
            PlacementError::ScalingOutOfBounds {
                service: "ecs/web".to_string(),
                desired: 8,
                min: 2,
                max: 6,
            }
        );
    }

    #[test]
    fn test_distinct_nodes_per_instance() {
        let mut resource = external(2);
        resource.workload.as_mut().unwrap().placement.clear();
        let candidates = vec![
            Node::new("a", "anywhere").with_capacity(0),
            Node::new("b", "anywhere").with_capacity(3),
            Node::new("c", "anywhere"),
        ];
        let placement = place("lb/traefik", &resource, &[], &candidates).unwrap();
        assert_eq!(placement.nodes, vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_non_workload_kind() {
        let vpc = ResourceDescriptor::new("vpc", ResourceKind::Network);
        assert!(matches!(
            place("net/vpc", &vpc, &[], &[]).unwrap_err(),
            PlacementError::NotAWorkload { .. }
        ));
    }

    struct Unhealthy;

    #[async_trait]
    impl HealthProbe for Unhealthy {
        async fn probe(&self, _placement: &Placement, _check: &HealthCheck) -> bool {
            false
        }
    }

    #[derive(Default)]
    struct RecordingRedeploy {
        redeployed: Mutex<Vec<Placement>>,
    }

    #[async_trait]
    impl Redeploy for RecordingRedeploy {
        async fn redeploy(&self, placement: &Placement) -> Result<(), String> {
            self.redeployed.lock().unwrap().push(placement.clone());
            Ok(())
        }
    }

    fn gated(rollback: bool) -> WorkloadSpec {
        let mut health = HealthCheck::new("/health", HealthProtocol::Http);
        health.retries = 2;
        health.interval_ms = 1;
        WorkloadSpec {
            health: Some(health),
            rollback,
            ..WorkloadSpec::default()
        }
    }

    fn constrained(node: &str) -> Placement {
        Placement {
            service: "lb/traefik".to_string(),
            regime: PlacementRegime::Constrained,
            desired_count: 1,
            nodes: vec![node.to_string()],
            scaling: None,
        }
    }

    #[tokio::test]
    async fn test_healthy_placement_becomes_stable() {
        let engine = PlacementEngine::new(Arc::new(AlwaysHealthy));
        let redeploy = RecordingRedeploy::default();

        engine
            .health_gate(&constrained("n1"), &gated(true), &redeploy)
            .await
            .unwrap();
        assert_eq!(
            engine.last_stable("lb/traefik").await,
            Some(constrained("n1"))
        );
        assert!(redeploy.redeployed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unhealthy_rolls_back_to_last_stable() {
        let engine =
            PlacementEngine::new(Arc::new(Unhealthy)).with_stable(vec![constrained("n1")]);
        let redeploy = RecordingRedeploy::default();

        let err = engine
            .health_gate(&constrained("n3"), &gated(true), &redeploy)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            PlacementError::Unhealthy {
                service: "lb/traefik".to_string(),
                attempts: 2,
                rolled_back: true,
            }
        );
        assert_eq!(
            redeploy.redeployed.lock().unwrap().as_slice(),
            &[constrained("n1")]
        );
        // stable placement unchanged
        assert_eq!(
            engine.last_stable("lb/traefik").await,
            Some(constrained("n1"))
        );
    }

    #[tokio::test]
    async fn test_unhealthy_without_rollback() {
        let engine =
            PlacementEngine::new(Arc::new(Unhealthy)).with_stable(vec![constrained("n1")]);
        let redeploy = RecordingRedeploy::default();

        let err = engine
            .health_gate(&constrained("n3"), &gated(false), &redeploy)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PlacementError::Unhealthy {
                rolled_back: false,
                ..
            }
        ));
        assert!(redeploy.redeployed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unhealthy_first_deploy_has_nothing_to_roll_back() {
        let engine = PlacementEngine::new(Arc::new(Unhealthy));
        let err = engine
            .health_gate(
                &constrained("n1"),
                &gated(true),
                &RecordingRedeploy::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PlacementError::Unhealthy {
                rolled_back: false,
                ..
            }
        ));
        assert!(engine.stable_placements().await.is_empty());
    }
}
