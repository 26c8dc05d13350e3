//! Stack definitions

use super::resource::ResourceDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Binding of a stack output to the resource output that produces it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputBinding {
    pub resource: String,
    /// Resource output name; defaults to the stack output name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl OutputBinding {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            attribute: None,
        }
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// Resource output that backs the stack output `name`
    pub fn attribute_for<'a>(&'a self, name: &'a str) -> &'a str {
        self.attribute.as_deref().unwrap_or(name)
    }
}

/// Named, independently provisionable group of resources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stack {
    pub id: String,
    /// Materialized in this order
    #[serde(default)]
    pub resources: Vec<ResourceDescriptor>,
    #[serde(default, rename = "outputs")]
    pub declared_outputs: BTreeMap<String, OutputBinding>,
}

impl Stack {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            resources: Vec::new(),
            declared_outputs: BTreeMap::new(),
        }
    }

    pub fn with_resource(mut self, resource: ResourceDescriptor) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn with_output(mut self, name: impl Into<String>, binding: OutputBinding) -> Self {
        self.declared_outputs.insert(name.into(), binding);
        self
    }

    pub fn resource(&self, id: &str) -> Option<&ResourceDescriptor> {
        self.resources.iter().find(|r| r.id == id)
    }

    pub fn resource_position(&self, id: &str) -> Option<usize> {
        self.resources.iter().position(|r| r.id == id)
    }

    /// Stacks this stack consumes handles from, derived from its references
    pub fn depends_on(&self) -> BTreeSet<&str> {
        self.resources
            .iter()
            .flat_map(|r| r.handle_refs())
            .map(|r| r.stack.as_str())
            .filter(|s| *s != self.id)
            .collect()
    }

    /// Stack outputs produced by the given resource, as `(stack output, resource output)`
    pub fn outputs_of<'a>(&'a self, resource: &'a str) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.declared_outputs
            .iter()
            .filter(move |(_, b)| b.resource == resource)
            .map(|(name, b)| (name.as_str(), b.attribute_for(name)))
    }
}
