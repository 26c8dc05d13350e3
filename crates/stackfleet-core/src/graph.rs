//! Dependency graph builder
//!
//! Turns a declaration-ordered list of stacks into a validated DAG with a
//! deterministic provisioning order. Validation is total: a graph either
//! builds completely or not at all.

use crate::error::GraphError;
use crate::model::{ResourceKind, Stack, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

/// Where a secret id is declared
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretDeclaration {
    pub stack: String,
    pub resource: String,
    /// Store-specific lookup key (`source` input, or the secret id)
    pub source: String,
}

/// Validated set of stacks plus derived dependency edges
#[derive(Debug, Clone)]
pub struct ProvisioningGraph {
    stacks: Vec<Arc<Stack>>,
    index: HashMap<String, usize>,
    predecessors: Vec<BTreeSet<usize>>,
    successors: Vec<BTreeSet<usize>>,
    order: Vec<usize>,
    secrets: BTreeMap<String, SecretDeclaration>,
}

impl ProvisioningGraph {
    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    /// Stacks in declaration order
    pub fn stacks(&self) -> &[Arc<Stack>] {
        &self.stacks
    }

    pub fn stack(&self, id: &str) -> Option<&Arc<Stack>> {
        self.index.get(id).map(|&i| &self.stacks[i])
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Provisioning order as indices into [`stacks`](Self::stacks)
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn ordered_stacks(&self) -> impl Iterator<Item = &Arc<Stack>> {
        self.order.iter().map(|&i| &self.stacks[i])
    }

    pub fn order_ids(&self) -> Vec<&str> {
        self.ordered_stacks().map(|s| s.id.as_str()).collect()
    }

    pub fn predecessors(&self, index: usize) -> &BTreeSet<usize> {
        &self.predecessors[index]
    }

    pub fn successors(&self, index: usize) -> &BTreeSet<usize> {
        &self.successors[index]
    }

    /// Ids of the stacks `id` depends on
    pub fn dependencies_of(&self, id: &str) -> Vec<&str> {
        self.index_of(id)
            .map(|i| {
                self.predecessors[i]
                    .iter()
                    .map(|&p| self.stacks[p].id.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// `(producer, consumer)` pairs in declaration order
    pub fn edges(&self) -> Vec<(&str, &str)> {
        self.successors
            .iter()
            .enumerate()
            .flat_map(|(p, succ)| {
                succ.iter()
                    .map(move |&c| (self.stacks[p].id.as_str(), self.stacks[c].id.as_str()))
            })
            .collect()
    }

    /// Every stack reachable from `index` along dependency edges
    pub fn transitive_dependents(&self, index: usize) -> BTreeSet<usize> {
        let mut seen = BTreeSet::new();
        let mut pending: Vec<usize> = self.successors[index].iter().copied().collect();
        while let Some(next) = pending.pop() {
            if seen.insert(next) {
                pending.extend(self.successors[next].iter().copied());
            }
        }
        seen
    }

    pub fn secrets(&self) -> &BTreeMap<String, SecretDeclaration> {
        &self.secrets
    }
}

/// Build and validate the provisioning graph.
///
/// Ties in the topological order are broken by declaration order, so the
/// same input always yields the same order.
#[tracing::instrument(skip(stacks), fields(stacks = stacks.len()))]
pub fn build(stacks: Vec<Stack>) -> Result<ProvisioningGraph, GraphError> {
    let mut index = HashMap::with_capacity(stacks.len());
    for (i, stack) in stacks.iter().enumerate() {
        // `stack.output` references split on the first dot
        if stack.id.contains('.') {
            return Err(GraphError::InvalidStackId(stack.id.clone()));
        }
        if index.insert(stack.id.clone(), i).is_some() {
            return Err(GraphError::DuplicateStack(stack.id.clone()));
        }
    }

    for stack in &stacks {
        validate_stack(stack)?;
    }
    let secrets = collect_secrets(&stacks)?;

    let n = stacks.len();
    let mut predecessors = vec![BTreeSet::new(); n];
    let mut successors = vec![BTreeSet::new(); n];

    for (consumer, stack) in stacks.iter().enumerate() {
        for (position, resource) in stack.resources.iter().enumerate() {
            for reference in resource.handle_refs() {
                let producer =
                    *index
                        .get(&reference.stack)
                        .ok_or_else(|| GraphError::UnknownStack {
                            consumer: stack.id.clone(),
                            stack: reference.stack.clone(),
                        })?;
                let binding = stacks[producer]
                    .declared_outputs
                    .get(&reference.output)
                    .ok_or_else(|| GraphError::UnknownOutput {
                        consumer: stack.id.clone(),
                        stack: reference.stack.clone(),
                        output: reference.output.clone(),
                    })?;

                if producer == consumer {
                    // same-stack handle: declared order is authoritative
                    let source = stack.resource_position(&binding.resource);
                    if source.is_none_or(|p| p >= position) {
                        return Err(GraphError::ForwardReference {
                            stack: stack.id.clone(),
                            resource: resource.id.clone(),
                            output: reference.output.clone(),
                        });
                    }
                    continue;
                }

                if successors[producer].insert(consumer) {
                    debug!(
                        producer = %stacks[producer].id,
                        consumer = %stack.id,
                        "Added dependency edge"
                    );
                }
                predecessors[consumer].insert(producer);
            }

            for reference in resource.secret_refs() {
                if !secrets.contains_key(&reference.secret) {
                    return Err(GraphError::DanglingSecret {
                        consumer: stack.id.clone(),
                        secret: reference.secret.clone(),
                    });
                }
            }
        }
    }

    if let Some(cycle) = find_cycle(&successors) {
        let path = cycle.into_iter().map(|i| stacks[i].id.clone()).collect();
        return Err(GraphError::Cycle(path));
    }

    let order = topological_order(&predecessors, &successors);
    let stacks: Vec<Arc<Stack>> = stacks.into_iter().map(Arc::new).collect();

    info!(
        stacks = stacks.len(),
        edges = successors.iter().map(BTreeSet::len).sum::<usize>(),
        secrets = secrets.len(),
        "Provisioning graph built"
    );

    Ok(ProvisioningGraph {
        stacks,
        index,
        predecessors,
        successors,
        order,
        secrets,
    })
}

/// Per-stack checks that do not need the rest of the graph
fn validate_stack(stack: &Stack) -> Result<(), GraphError> {
    let mut seen = BTreeSet::new();
    for resource in &stack.resources {
        if !seen.insert(resource.id.as_str()) {
            return Err(GraphError::DuplicateResource {
                stack: stack.id.clone(),
                resource: resource.id.clone(),
            });
        }

        for key in resource.kind.required_inputs() {
            if !resource.inputs.contains_key(*key) {
                return Err(GraphError::MissingInput {
                    stack: stack.id.clone(),
                    resource: resource.id.clone(),
                    kind: resource.kind,
                    key: key.to_string(),
                });
            }
        }

        if let Some(workload) = &resource.workload
            && let Some(bad) = workload.placement.iter().find(|c| !c.is_well_formed())
        {
            return Err(GraphError::InvalidPlacement {
                stack: stack.id.clone(),
                resource: resource.id.clone(),
                expression: bad.expression.clone(),
            });
        }
    }

    for (name, binding) in &stack.declared_outputs {
        let resource = stack
            .resource(&binding.resource)
            .ok_or_else(|| GraphError::UnknownResource {
                stack: stack.id.clone(),
                output: name.clone(),
                resource: binding.resource.clone(),
            })?;
        let attribute = binding.attribute_for(name);
        if !resource.declared_outputs.contains(attribute) {
            return Err(GraphError::UnknownOutput {
                consumer: stack.id.clone(),
                stack: stack.id.clone(),
                output: format!("{}.{}", binding.resource, attribute),
            });
        }
    }

    Ok(())
}

fn collect_secrets(stacks: &[Stack]) -> Result<BTreeMap<String, SecretDeclaration>, GraphError> {
    let mut secrets: BTreeMap<String, SecretDeclaration> = BTreeMap::new();
    for stack in stacks {
        for resource in stack.resources.iter().filter(|r| r.kind == ResourceKind::Secret) {
            let source = resource
                .inputs
                .get("source")
                .and_then(|v| match v {
                    Value::Literal(l) => l.as_str().map(str::to_string),
                    _ => None,
                })
                .unwrap_or_else(|| resource.id.clone());

            let declaration = SecretDeclaration {
                stack: stack.id.clone(),
                resource: resource.id.clone(),
                source,
            };
            if let Some(first) = secrets.get(&resource.id) {
                return Err(GraphError::DuplicateSecret {
                    secret: resource.id.clone(),
                    first: first.stack.clone(),
                    second: stack.id.clone(),
                });
            }
            secrets.insert(resource.id.clone(), declaration);
        }
    }
    Ok(secrets)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// DFS with white/gray/black coloring; returns the first cycle found as a
/// closed path (`a -> b -> a`).
fn find_cycle(successors: &[BTreeSet<usize>]) -> Option<Vec<usize>> {
    fn visit(
        node: usize,
        successors: &[BTreeSet<usize>],
        color: &mut [Color],
        path: &mut Vec<usize>,
    ) -> Option<Vec<usize>> {
        color[node] = Color::Gray;
        path.push(node);
        for &next in &successors[node] {
            match color[next] {
                Color::Gray => {
                    let start = path.iter().position(|&p| p == next)?;
                    let mut cycle = path[start..].to_vec();
                    cycle.push(next);
                    return Some(cycle);
                }
                Color::White => {
                    if let Some(cycle) = visit(next, successors, color, path) {
                        return Some(cycle);
                    }
                }
                Color::Black => {}
            }
        }
        path.pop();
        color[node] = Color::Black;
        None
    }

    let mut color = vec![Color::White; successors.len()];
    let mut path = Vec::new();
    for root in 0..successors.len() {
        if color[root] == Color::White
            && let Some(cycle) = visit(root, successors, &mut color, &mut path)
        {
            return Some(cycle);
        }
    }
    None
}

/// Kahn's algorithm; the frontier always yields the earliest-declared stack
fn topological_order(predecessors: &[BTreeSet<usize>], successors: &[BTreeSet<usize>]) -> Vec<usize> {
    let mut in_degree: Vec<usize> = predecessors.iter().map(BTreeSet::len).collect();
    let mut frontier: BTreeSet<usize> = (0..in_degree.len())
        .filter(|&i| in_degree[i] == 0)
        .collect();
    let mut order = Vec::with_capacity(in_degree.len());

    while let Some(next) = frontier.pop_first() {
        order.push(next);
        for &consumer in &successors[next] {
            in_degree[consumer] -= 1;
            if in_degree[consumer] == 0 {
                frontier.insert(consumer);
            }
        }
    }

    order
}
