//! Stack and resource nodes

use super::workload::parse_workload;
use super::{first_string, integer_property, parse_value, string_property};
use crate::error::{LoadError, Result};
use crate::model::{OutputBinding, ResourceDescriptor, ResourceKind, Stack};
use kdl::KdlNode;

/// Parse a `stack` node
pub fn parse_stack(node: &KdlNode) -> Result<Stack> {
    let id = first_string(node)
        .ok_or_else(|| LoadError::InvalidConfig("stack requires an id".to_string()))?;

    let mut stack = Stack::new(id);

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "resource" => {
                    let resource = parse_resource(child, id)?;
                    stack.resources.push(resource);
                }
                "output" => {
                    let (name, binding) = parse_output(child, id)?;
                    if stack.declared_outputs.contains_key(&name) {
                        return Err(LoadError::InvalidConfig(format!(
                            "duplicate output '{}.{}'",
                            id, name
                        )));
                    }
                    stack.declared_outputs.insert(name, binding);
                }
                _ => {}
            }
        }
    }

    Ok(stack)
}

fn parse_resource(node: &KdlNode, stack: &str) -> Result<ResourceDescriptor> {
    let id = first_string(node).ok_or_else(|| {
        LoadError::InvalidConfig(format!("resource in stack '{}' requires an id", stack))
    })?;
    let kind_name = string_property(node, "kind").ok_or_else(|| {
        LoadError::InvalidConfig(format!("resource '{}/{}' requires kind=", stack, id))
    })?;
    let kind = ResourceKind::parse(kind_name).ok_or_else(|| {
        LoadError::InvalidConfig(format!(
            "resource '{}/{}' has unknown kind '{}'",
            stack, id, kind_name
        ))
    })?;

    let mut resource = ResourceDescriptor::new(id, kind);

    if let Some(secs) = integer_property(node, "timeout-secs") {
        let secs = u64::try_from(secs).map_err(|_| {
            LoadError::InvalidConfig(format!("resource '{}/{}': invalid timeout-secs", stack, id))
        })?;
        resource.timeout_secs = Some(secs);
    }

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "input" => {
                    let key = first_string(child).ok_or_else(|| {
                        LoadError::InvalidConfig(format!(
                            "input of '{}/{}' requires a key",
                            stack, id
                        ))
                    })?;
                    if resource.inputs.contains_key(key) {
                        return Err(LoadError::InvalidConfig(format!(
                            "duplicate input '{}' in '{}/{}'",
                            key, stack, id
                        )));
                    }
                    resource.inputs.insert(key.to_string(), parse_value(child)?);
                }
                "outputs" => {
                    resource.declared_outputs.extend(
                        child
                            .entries()
                            .iter()
                            .filter(|e| e.name().is_none())
                            .filter_map(|e| e.value().as_string().map(|s| s.to_string())),
                    );
                }
                "workload" => {
                    if !kind.is_workload() {
                        return Err(LoadError::InvalidConfig(format!(
                            "resource '{}/{}' of kind {} cannot have a workload block",
                            stack, id, kind
                        )));
                    }
                    resource.workload = Some(parse_workload(child)?);
                }
                _ => {}
            }
        }
    }

    Ok(resource)
}

fn parse_output(node: &KdlNode, stack: &str) -> Result<(String, OutputBinding)> {
    let name = first_string(node).ok_or_else(|| {
        LoadError::InvalidConfig(format!("output in stack '{}' requires a name", stack))
    })?;
    let resource = string_property(node, "resource").ok_or_else(|| {
        LoadError::InvalidConfig(format!("output '{}.{}' requires resource=", stack, name))
    })?;

    let mut binding = OutputBinding::new(resource);
    if let Some(attribute) = string_property(node, "attribute") {
        binding = binding.with_attribute(attribute);
    }

    Ok((name.to_string(), binding))
}
