//! Node registry contract

use crate::error::Result;
use crate::model::Node;
use crate::parser::parse_nodes_file;
use async_trait::async_trait;
use std::path::Path;
use tracing::info;

/// Read-only listing of nodes available at placement time
#[async_trait]
pub trait NodeRegistry: Send + Sync {
    async fn list_nodes(&self) -> Result<Vec<Node>>;
}

/// Fixed set of nodes, typically loaded from `nodes.kdl`
#[derive(Debug, Clone, Default)]
pub struct StaticNodeRegistry {
    nodes: Vec<Node>,
}

impl StaticNodeRegistry {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let nodes = parse_nodes_file(path)?;
        info!(path = %path.display(), nodes = nodes.len(), "Loaded node registry");
        Ok(Self::new(nodes))
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }
}

#[async_trait]
impl NodeRegistry for StaticNodeRegistry {
    async fn list_nodes(&self) -> Result<Vec<Node>> {
        Ok(self.nodes.clone())
    }
}
