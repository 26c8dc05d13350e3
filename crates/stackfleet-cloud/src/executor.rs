//! Provisioning executor
//!
//! Walks the graph with a bounded pool of stack workers. A stack starts once
//! every predecessor is materialized; a failure marks every transitive
//! dependent as skipped while already-running siblings finish. Provider
//! calls share one counting semaphore.

use crate::error::{MaterializeError, ProviderError};
use crate::inject::SecretInjector;
use crate::provider::{MaterializeOutcome, MaterializeRequest, ProviderRegistry};
use crate::report::{ExecutionReport, ResourceReport, StackError, StackReport, StackState};
use crate::secrets::SecretStore;
use async_trait::async_trait;
use stackfleet_core::{
    Handle, HandleTable, ProvisioningGraph, ResourceDescriptor, Stack, WorkloadSpec, publish,
    resolve_all,
};
use stackfleet_registry::{
    NodeRegistry, Placement, PlacementEngine, PlacementError, Redeploy, effective_constraints,
    service_key,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Scheduler limits
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Stacks materializing at the same time
    pub max_parallel_stacks: usize,
    /// Concurrent provider calls across all stacks
    pub provider_rate_limit: usize,
    /// Applied to resources without their own `timeout_secs`
    pub resource_timeout: Option<Duration>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_parallel_stacks: 4,
            provider_rate_limit: 8,
            resource_timeout: None,
        }
    }
}

/// Shared by every stack worker of one run
struct Context {
    providers: Arc<ProviderRegistry>,
    nodes: Arc<dyn NodeRegistry>,
    placement: Arc<PlacementEngine>,
    injector: SecretInjector,
    provider_permits: Semaphore,
    resource_timeout: Option<Duration>,
}

impl Context {
    async fn ensure(&self, request: &MaterializeRequest) -> Result<MaterializeOutcome, ProviderError> {
        let _permit = self
            .provider_permits
            .acquire()
            .await
            .map_err(|e| ProviderError::Failed(e.to_string()))?;
        self.providers.ensure(request).await
    }
}

struct StackSuccess {
    resources: Vec<ResourceReport>,
    handles: Vec<Handle>,
}

struct StackFailure {
    resource: Option<String>,
    message: String,
    resources: Vec<ResourceReport>,
}

pub struct Executor {
    providers: Arc<ProviderRegistry>,
    nodes: Arc<dyn NodeRegistry>,
    placement: Arc<PlacementEngine>,
    secrets: Arc<dyn SecretStore>,
    config: ExecutorConfig,
}

impl Executor {
    pub fn new(
        providers: Arc<ProviderRegistry>,
        nodes: Arc<dyn NodeRegistry>,
        placement: Arc<PlacementEngine>,
        secrets: Arc<dyn SecretStore>,
    ) -> Self {
        Self {
            providers,
            nodes,
            placement,
            secrets,
            config: ExecutorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Materialize every stack of `graph` and report each outcome
    #[tracing::instrument(skip_all, fields(stacks = graph.len()))]
    pub async fn execute(&self, graph: &ProvisioningGraph) -> ExecutionReport {
        let started = Instant::now();
        let ctx = Arc::new(Context {
            providers: self.providers.clone(),
            nodes: self.nodes.clone(),
            placement: self.placement.clone(),
            injector: SecretInjector::new(self.secrets.clone(), graph.secrets().clone()),
            provider_permits: Semaphore::new(self.config.provider_rate_limit.max(1)),
            resource_timeout: self.config.resource_timeout,
        });

        let n = graph.len();
        let mut rank = vec![0; n];
        for (position, &index) in graph.order().iter().enumerate() {
            rank[index] = position;
        }

        let mut reports: Vec<StackReport> = graph
            .stacks()
            .iter()
            .map(|s| StackReport::new(s.id.clone(), StackState::Pending))
            .collect();
        let mut waiting: Vec<usize> = (0..n).map(|i| graph.predecessors(i).len()).collect();
        // keyed by position in the provisioning order
        let mut ready: BTreeSet<usize> = (0..n).filter(|&i| waiting[i] == 0).map(|i| rank[i]).collect();
        let mut handles = HandleTable::new();
        let mut tasks = JoinSet::new();
        let mut running = 0usize;
        let limit = self.config.max_parallel_stacks.max(1);

        loop {
            while running < limit
                && let Some(next) = ready.pop_first()
            {
                let index = graph.order()[next];
                let stack = graph.stacks()[index].clone();
                reports[index].state = StackState::Materializing;
                info!(stack = %stack.id, "Materializing stack");

                let ctx = ctx.clone();
                let snapshot = handles.clone();
                tasks.spawn(async move {
                    let started = Instant::now();
                    let result = match tokio::spawn(materialize_stack(ctx, stack, snapshot)).await {
                        Ok(result) => result,
                        Err(e) => Err(StackFailure {
                            resource: None,
                            message: format!("stack worker aborted: {}", e),
                            resources: Vec::new(),
                        }),
                    };
                    (index, started.elapsed(), result)
                });
                running += 1;
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };
            running -= 1;

            let (index, elapsed, result) = match joined {
                Ok(done) => done,
                Err(e) => {
                    error!(error = %e, "Scheduler task failed");
                    continue;
                }
            };

            let report = &mut reports[index];
            report.duration_ms = elapsed.as_millis() as u64;

            match result {
                Ok(success) => {
                    report.state = StackState::Materialized;
                    report.resources = success.resources;
                    for handle in success.handles {
                        report
                            .outputs
                            .insert(handle.output().to_string(), handle.value().to_json());
                        publish(&mut handles, handle);
                    }
                    info!(stack = %report.id, duration_ms = report.duration_ms, "Stack materialized");

                    for &consumer in graph.successors(index) {
                        waiting[consumer] -= 1;
                        if waiting[consumer] == 0 && reports[consumer].state == StackState::Pending {
                            ready.insert(rank[consumer]);
                        }
                    }
                }
                Err(failure) => {
                    report.state = StackState::Failed;
                    report.resources = failure.resources;
                    warn!(
                        stack = %report.id,
                        resource = failure.resource.as_deref().unwrap_or("-"),
                        error = %failure.message,
                        "Stack failed"
                    );
                    report.error = Some(StackError {
                        resource: failure.resource,
                        message: failure.message,
                    });

                    for dependent in graph.transitive_dependents(index) {
                        if reports[dependent].state == StackState::Pending {
                            debug!(stack = %reports[dependent].id, "Skipping dependent stack");
                            reports[dependent].state = StackState::Skipped;
                        }
                    }
                }
            }
        }

        for report in &mut reports {
            match report.state {
                StackState::Pending => report.state = StackState::Skipped,
                StackState::Materializing => {
                    report.state = StackState::Failed;
                    report.error = Some(StackError {
                        resource: None,
                        message: "stack worker did not report back".to_string(),
                    });
                }
                _ => {}
            }
        }

        let report = ExecutionReport {
            order: graph.order_ids().into_iter().map(str::to_string).collect(),
            stacks: graph
                .order()
                .iter()
                .map(|&i| reports[i].clone())
                .collect(),
            duration_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            materialized = report.count(StackState::Materialized),
            failed = report.count(StackState::Failed),
            skipped = report.count(StackState::Skipped),
            "Provisioning finished"
        );
        report
    }
}

/// Materialize a stack's resources in declared order
async fn materialize_stack(
    ctx: Arc<Context>,
    stack: Arc<Stack>,
    mut handles: HandleTable,
) -> Result<StackSuccess, StackFailure> {
    let mut resources = Vec::new();
    let mut published = Vec::new();

    for resource in &stack.resources {
        let limit = resource
            .timeout_secs
            .map(Duration::from_secs)
            .or(ctx.resource_timeout);
        let work = materialize_resource(&ctx, &stack.id, resource, &handles);
        let result = match limit {
            Some(limit) => timeout(limit, work)
                .await
                .unwrap_or(Err(MaterializeError::Timeout(limit))),
            None => work.await,
        };

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                return Err(StackFailure {
                    resource: Some(resource.id.clone()),
                    message: e.to_string(),
                    resources,
                });
            }
        };

        debug!(stack = %stack.id, resource = %resource.id, action = %outcome.action, "Resource materialized");
        resources.push(ResourceReport {
            id: resource.id.clone(),
            action: outcome.action,
        });

        // same-stack consumers later in the list see these right away
        for (output, attribute) in stack.outputs_of(&resource.id) {
            let Some(value) = outcome.outputs.get(attribute) else {
                return Err(StackFailure {
                    resource: Some(resource.id.clone()),
                    message: ProviderError::MissingOutput {
                        output: attribute.to_string(),
                    }
                    .to_string(),
                    resources,
                });
            };
            let handle = Handle::new(stack.id.clone(), output, value.clone());
            publish(&mut handles, handle.clone());
            published.push(handle);
        }
    }

    Ok(StackSuccess {
        resources,
        handles: published,
    })
}

async fn materialize_resource(
    ctx: &Context,
    stack: &str,
    resource: &ResourceDescriptor,
    handles: &HandleTable,
) -> Result<MaterializeOutcome, MaterializeError> {
    let inputs = resolve_all(&resource.inputs, handles)?;
    let mut request = MaterializeRequest::new(stack, resource, inputs);

    if !resource.kind.is_workload() {
        return Ok(ctx.ensure(&request).await?);
    }

    let default_workload = WorkloadSpec::default();
    let workload = resource.workload.as_ref().unwrap_or(&default_workload);
    let service = service_key(stack, &resource.id);

    // placement is decided before any provider call
    let constraints = effective_constraints(resource, request.input_str("cluster"));
    let candidates = if resource.kind.is_elastic() {
        Vec::new()
    } else {
        ctx.nodes
            .list_nodes()
            .await
            .map_err(|e| PlacementError::Registry(e.to_string()))?
    };
    let placement = ctx
        .placement
        .place(&service, resource, &constraints, &candidates)?;

    let environment = resolve_all(&workload.environment, handles)?;
    let runtime = ctx
        .injector
        .inject(&service, &environment, &workload.secrets)
        .await?;
    request.placement = Some(placement.clone());
    request.environment = Some(runtime);

    let outcome = ctx.ensure(&request).await?;

    let rollback = Rollback {
        ctx,
        request: &request,
    };
    ctx.placement
        .health_gate(&placement, workload, &rollback)
        .await?;

    Ok(outcome)
}

/// Re-ensures a workload with a previous placement
struct Rollback<'a> {
    ctx: &'a Context,
    request: &'a MaterializeRequest,
}

#[async_trait]
impl<'a> Redeploy for Rollback<'a> {
    async fn redeploy(&self, placement: &Placement) -> Result<(), String> {
        let mut request = self.request.clone();
        request.placement = Some(placement.clone());
        self.ctx
            .ensure(&request)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}
