//! Workload settings for compute resources

use super::value::{SecretRef, Value};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

/// `role == loadbalancer`, optionally in the ECS query form `attribute:role == loadbalancer`
static ATTRIBUTE_EXPR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*(?:attribute:)?([A-Za-z0-9_.\-]+)\s*==\s*"?([^"]*?)"?\s*$"#)
        .expect("attribute expression regex is valid")
});

/// Workload runtime and scheduling settings
///
/// ```kdl
/// workload {
///     desired-count 2
///     env "DB_HOST" ref="stateful.dbHost"
///     secret-env "DB_PASSWORD" secret="db-credentials"
///     placement attribute="role == webserver"
///     autoscaling min=2 max=6 metric="cpu" target=70
///     health path="/health" protocol="https" retries=3
///     rollback #true
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadSpec {
    #[serde(default = "default_desired_count")]
    pub desired_count: u32,
    /// Plain environment; values may be handle references
    #[serde(default)]
    pub environment: BTreeMap<String, Value>,
    /// Environment keys bound to secrets at materialization time
    #[serde(default)]
    pub secrets: BTreeMap<String, SecretRef>,
    #[serde(default)]
    pub placement: Vec<PlacementConstraint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoscaling: Option<ScalingPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthCheck>,
    /// Revert to the last stable placement when the health gate fails
    #[serde(default)]
    pub rollback: bool,
}

fn default_desired_count() -> u32 {
    1
}

impl Default for WorkloadSpec {
    fn default() -> Self {
        Self {
            desired_count: default_desired_count(),
            environment: BTreeMap::new(),
            secrets: BTreeMap::new(),
            placement: Vec::new(),
            autoscaling: None,
            health: None,
            rollback: false,
        }
    }
}

/// Kind of placement predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConstraintKind {
    AttributeEquals,
    MemberOfCluster,
}

/// Predicate evaluated against candidate nodes at placement time
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlacementConstraint {
    pub kind: ConstraintKind,
    pub expression: String,
}

impl PlacementConstraint {
    pub fn attribute_equals(key: &str, value: &str) -> Self {
        Self {
            kind: ConstraintKind::AttributeEquals,
            expression: format!("{} == {}", key, value),
        }
    }

    pub fn member_of_cluster(cluster: impl Into<String>) -> Self {
        Self {
            kind: ConstraintKind::MemberOfCluster,
            expression: cluster.into(),
        }
    }

    /// Split an attribute expression into `(key, value)`
    pub fn attribute(&self) -> Option<(&str, &str)> {
        if self.kind != ConstraintKind::AttributeEquals {
            return None;
        }
        let caps = ATTRIBUTE_EXPR.captures(&self.expression)?;
        let key = caps.get(1)?.as_str();
        let value = caps.get(2)?.as_str();
        Some((key, value))
    }

    pub fn is_well_formed(&self) -> bool {
        match self.kind {
            ConstraintKind::AttributeEquals => self.attribute().is_some(),
            ConstraintKind::MemberOfCluster => !self.expression.trim().is_empty(),
        }
    }

    /// Evaluate against a node's attributes and cluster membership
    pub fn matches(&self, attributes: &BTreeMap<String, String>, cluster_id: &str) -> bool {
        match self.kind {
            ConstraintKind::AttributeEquals => match self.attribute() {
                Some((key, value)) => attributes.get(key).is_some_and(|v| v == value),
                None => false,
            },
            ConstraintKind::MemberOfCluster => cluster_id == self.expression.trim(),
        }
    }
}

impl fmt::Display for PlacementConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ConstraintKind::AttributeEquals => write!(f, "attribute:{}", self.expression.trim()),
            ConstraintKind::MemberOfCluster => write!(f, "memberOf:{}", self.expression.trim()),
        }
    }
}

/// Metric tracked by target-tracking autoscaling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetMetric {
    #[serde(rename = "cpu", alias = "CPUUtilization")]
    CpuUtilization,
    #[serde(rename = "memory", alias = "MemoryUtilization")]
    MemoryUtilization,
}

impl TargetMetric {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cpu" | "cpuutilization" => Some(Self::CpuUtilization),
            "memory" | "memoryutilization" => Some(Self::MemoryUtilization),
            _ => None,
        }
    }
}

impl fmt::Display for TargetMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetMetric::CpuUtilization => write!(f, "CPUUtilization"),
            TargetMetric::MemoryUtilization => write!(f, "MemoryUtilization"),
        }
    }
}

/// Target-tracking scaling policy for elastic workloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingPolicy {
    pub min_capacity: u32,
    pub max_capacity: u32,
    pub target_metric: TargetMetric,
    pub target_percent: f64,
}

/// Health check protocol
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthProtocol {
    #[default]
    Http,
    Https,
    Tcp,
}

impl HealthProtocol {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "http" => Some(Self::Http),
            "https" => Some(Self::Https),
            "tcp" => Some(Self::Tcp),
            _ => None,
        }
    }
}

/// Health gate configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub path: String,
    #[serde(default)]
    pub protocol: HealthProtocol,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,
}

fn default_retries() -> u32 {
    5
}
fn default_interval_ms() -> u64 {
    1000
}
fn default_max_interval_ms() -> u64 {
    30000
}

impl HealthCheck {
    pub fn new(path: impl Into<String>, protocol: HealthProtocol) -> Self {
        Self {
            path: path.into(),
            protocol,
            retries: default_retries(),
            interval_ms: default_interval_ms(),
            max_interval_ms: default_max_interval_ms(),
        }
    }

    /// Exponential backoff delay before the given attempt, capped at `max_interval_ms`
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        let delay = self.interval_ms as f64 * 2f64.powi(attempt as i32);
        (delay as u64).min(self.max_interval_ms)
    }
}
