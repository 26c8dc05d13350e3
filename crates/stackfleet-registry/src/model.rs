//! Nodes and placements

use serde::{Deserialize, Serialize};
use stackfleet_core::{PlacementConstraint, ScalingPolicy};
use std::collections::BTreeMap;

/// Externally registered execution host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    pub cluster_id: String,
    /// Instances this node can host; 0 means draining
    #[serde(default = "default_capacity")]
    pub capacity: u32,
}

fn default_capacity() -> u32 {
    1
}

impl Node {
    pub fn new(id: impl Into<String>, cluster_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: BTreeMap::new(),
            cluster_id: cluster_id.into(),
            capacity: default_capacity(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    /// Whether this node satisfies every constraint
    pub fn satisfies(&self, constraints: &[PlacementConstraint]) -> bool {
        self.capacity > 0
            && constraints
                .iter()
                .all(|c| c.matches(&self.attributes, &self.cluster_id))
    }
}

/// Scheduling regime a placement was made under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlacementRegime {
    /// Cloud-managed capacity, requested from the provider
    Elastic,
    /// Explicitly selected external nodes
    Constrained,
}

/// Result of placing a workload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    /// `<stack>/<resource>`
    pub service: String,
    pub regime: PlacementRegime,
    pub desired_count: u32,
    /// Selected nodes; empty for elastic placements
    #[serde(default)]
    pub nodes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaling: Option<ScalingPolicy>,
}

impl Placement {
    pub fn is_elastic(&self) -> bool {
        self.regime == PlacementRegime::Elastic
    }
}
