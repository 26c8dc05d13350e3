//! nodes.kdl parser
//!
//! ```kdl
//! node "n1" cluster="anywhere" capacity=2 {
//!     attribute "role" "loadbalancer"
//! }
//! ```

use crate::error::{RegistryError, Result};
use crate::model::Node;
use kdl::{KdlDocument, KdlNode};
use std::collections::HashSet;
use std::path::Path;

/// Parse a KDL file into nodes
pub fn parse_nodes_file(path: &Path) -> Result<Vec<Node>> {
    let content = std::fs::read_to_string(path)?;
    parse_nodes(&content)
}

/// Parse KDL text into nodes. Non-`node` top-level entries are ignored.
pub fn parse_nodes(content: &str) -> Result<Vec<Node>> {
    let doc: KdlDocument = content.parse()?;

    let mut nodes = Vec::new();
    let mut seen = HashSet::new();
    for node in doc.nodes() {
        if node.name().value() != "node" {
            continue;
        }
        let parsed = parse_node(node)?;
        if !seen.insert(parsed.id.clone()) {
            return Err(RegistryError::DuplicateNode(parsed.id));
        }
        nodes.push(parsed);
    }

    Ok(nodes)
}

fn parse_node(node: &KdlNode) -> Result<Node> {
    let id = node
        .entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .ok_or_else(|| RegistryError::InvalidConfig("node requires an id".to_string()))?
        .to_string();

    let mut cluster = None;
    let mut capacity = None;
    for entry in node.entries() {
        if let Some(name) = entry.name() {
            match name.value() {
                "cluster" => cluster = entry.value().as_string().map(|s| s.to_string()),
                "capacity" => capacity = entry.value().as_integer(),
                _ => {}
            }
        }
    }

    let cluster = cluster
        .ok_or_else(|| RegistryError::InvalidConfig(format!("node '{}' requires cluster=", id)))?;
    let mut parsed = Node::new(id, cluster);
    if let Some(capacity) = capacity {
        parsed.capacity = u32::try_from(capacity).map_err(|_| {
            RegistryError::InvalidConfig(format!(
                "node '{}' has invalid capacity {}",
                parsed.id, capacity
            ))
        })?;
    }

    if let Some(children) = node.children() {
        for child in children.nodes() {
            if child.name().value() == "attribute" {
                let mut values = child
                    .entries()
                    .iter()
                    .filter(|e| e.name().is_none())
                    .filter_map(|e| e.value().as_string());
                if let (Some(key), Some(value)) = (values.next(), values.next()) {
                    parsed.attributes.insert(key.to_string(), value.to_string());
                }
            }
        }
    }

    Ok(parsed)
}
