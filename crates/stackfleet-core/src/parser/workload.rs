//! `workload` blocks of compute resources

use super::{first_string, integer_property, parse_value, property, string_property};
use crate::error::{LoadError, Result};
use crate::model::{
    ConstraintKind, HealthCheck, HealthProtocol, PlacementConstraint, ScalingPolicy, SecretRef,
    TargetMetric, WorkloadSpec,
};
use kdl::KdlNode;

/// Parse a `workload { ... }` block
pub fn parse_workload(node: &KdlNode) -> Result<WorkloadSpec> {
    let mut workload = WorkloadSpec::default();

    let Some(children) = node.children() else {
        return Ok(workload);
    };

    for child in children.nodes() {
        match child.name().value() {
            "desired-count" => {
                let value = child
                    .entries()
                    .first()
                    .and_then(|e| e.value().as_integer())
                    .ok_or_else(|| {
                        LoadError::InvalidConfig(
                            "desired-count requires an integer".to_string(),
                        )
                    })?;
                workload.desired_count = to_u32(value, "desired-count")?;
            }
            "env" => {
                let key = first_string(child).ok_or_else(|| {
                    LoadError::InvalidConfig("env requires a variable name".to_string())
                })?;
                if workload.environment.contains_key(key) {
                    return Err(LoadError::InvalidConfig(format!(
                        "duplicate env '{}'",
                        key
                    )));
                }
                workload
                    .environment
                    .insert(key.to_string(), parse_value(child)?);
            }
            "secret-env" => {
                let key = first_string(child).ok_or_else(|| {
                    LoadError::InvalidConfig("secret-env requires a variable name".to_string())
                })?;
                let secret = string_property(child, "secret").ok_or_else(|| {
                    LoadError::InvalidConfig(format!("secret-env '{}' requires secret=", key))
                })?;
                if workload.secrets.contains_key(key) {
                    return Err(LoadError::InvalidConfig(format!(
                        "duplicate secret-env '{}'",
                        key
                    )));
                }
                workload
                    .secrets
                    .insert(key.to_string(), SecretRef::new(secret));
            }
            "placement" => {
                workload.placement.push(parse_placement(child)?);
            }
            "autoscaling" => {
                workload.autoscaling = Some(parse_autoscaling(child)?);
            }
            "health" => {
                workload.health = Some(parse_health(child)?);
            }
            "rollback" => {
                workload.rollback = child
                    .entries()
                    .first()
                    .and_then(|e| e.value().as_bool())
                    .unwrap_or(true);
            }
            _ => {}
        }
    }

    Ok(workload)
}

fn parse_placement(node: &KdlNode) -> Result<PlacementConstraint> {
    if let Some(expression) = string_property(node, "attribute") {
        return Ok(PlacementConstraint {
            kind: ConstraintKind::AttributeEquals,
            expression: expression.to_string(),
        });
    }
    if let Some(cluster) = string_property(node, "cluster") {
        return Ok(PlacementConstraint::member_of_cluster(cluster));
    }
    Err(LoadError::InvalidConfig(
        "placement requires attribute= or cluster=".to_string(),
    ))
}

fn parse_autoscaling(node: &KdlNode) -> Result<ScalingPolicy> {
    let min = integer_property(node, "min")
        .ok_or_else(|| LoadError::InvalidConfig("autoscaling requires min=".to_string()))?;
    let max = integer_property(node, "max")
        .ok_or_else(|| LoadError::InvalidConfig("autoscaling requires max=".to_string()))?;

    let target_metric = match string_property(node, "metric") {
        Some(metric) => TargetMetric::parse(metric).ok_or_else(|| {
            LoadError::InvalidConfig(format!("unknown autoscaling metric '{}'", metric))
        })?,
        None => TargetMetric::CpuUtilization,
    };

    // integer or float
    let target_percent = match property(node, "target") {
        Some(value) => value
            .as_float()
            .or_else(|| value.as_integer().map(|i| i as f64))
            .ok_or_else(|| {
                LoadError::InvalidConfig("autoscaling target= must be a number".to_string())
            })?,
        None => 75.0,
    };

    Ok(ScalingPolicy {
        min_capacity: to_u32(min, "min")?,
        max_capacity: to_u32(max, "max")?,
        target_metric,
        target_percent,
    })
}

fn parse_health(node: &KdlNode) -> Result<HealthCheck> {
    let path = string_property(node, "path").unwrap_or("/");
    let protocol = match string_property(node, "protocol") {
        Some(p) => HealthProtocol::parse(p).ok_or_else(|| {
            LoadError::InvalidConfig(format!("unknown health protocol '{}'", p))
        })?,
        None => HealthProtocol::default(),
    };

    let mut health = HealthCheck::new(path, protocol);
    if let Some(retries) = integer_property(node, "retries") {
        health.retries = to_u32(retries, "retries")?;
    }
    if let Some(interval) = integer_property(node, "interval-ms") {
        health.interval_ms = to_u32(interval, "interval-ms")? as u64;
    }
    if let Some(max) = integer_property(node, "max-interval-ms") {
        health.max_interval_ms = to_u32(max, "max-interval-ms")? as u64;
    }

    Ok(health)
}

fn to_u32(value: i128, field: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| LoadError::InvalidConfig(format!("{} out of range: {}", field, value)))
}
