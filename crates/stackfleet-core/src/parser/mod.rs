//! KDL parser
//!
//! Parses stack definitions from KDL. Unknown top-level nodes are skipped so
//! that one file can also hold node registrations.

mod stack;
mod workload;

pub use stack::parse_stack;
pub use workload::parse_workload;

use crate::error::{LoadError, Result};
use crate::model::{HandleRef, Literal, Stack, Value};
use kdl::{KdlDocument, KdlNode, KdlValue};
use std::fs;
use std::path::Path;

/// Parse a KDL file into stacks
pub fn parse_kdl_file<P: AsRef<Path>>(path: P) -> Result<Vec<Stack>> {
    let content = fs::read_to_string(path.as_ref())?;
    parse_kdl_string(&content)
}

/// Parse KDL text into stacks, in declaration order
pub fn parse_kdl_string(content: &str) -> Result<Vec<Stack>> {
    let doc: KdlDocument = content.parse()?;

    let mut stacks = Vec::new();
    for node in doc.nodes() {
        if node.name().value() == "stack" {
            stacks.push(parse_stack(node)?);
        }
    }

    Ok(stacks)
}

/// First positional argument as a string
pub(crate) fn first_string(node: &KdlNode) -> Option<&str> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
}

/// Named property (`key=value`)
pub(crate) fn property<'a>(node: &'a KdlNode, key: &str) -> Option<&'a KdlValue> {
    node.entries()
        .iter()
        .find(|e| e.name().is_some_and(|n| n.value() == key))
        .map(|e| e.value())
}

pub(crate) fn string_property<'a>(node: &'a KdlNode, key: &str) -> Option<&'a str> {
    property(node, key).and_then(|v| v.as_string())
}

pub(crate) fn integer_property(node: &KdlNode, key: &str) -> Option<i128> {
    property(node, key).and_then(|v| v.as_integer())
}

pub(crate) fn to_literal(value: &KdlValue) -> Option<Literal> {
    if let Some(s) = value.as_string() {
        Some(Literal::String(s.to_string()))
    } else if let Some(i) = value.as_integer() {
        i64::try_from(i).ok().map(Literal::Integer)
    } else if let Some(f) = value.as_float() {
        Some(Literal::Float(f))
    } else {
        value.as_bool().map(Literal::Bool)
    }
}

/// Value of an `input`/`env` node: `ref=`, `secret=`, or the second positional argument
pub(crate) fn parse_value(node: &KdlNode) -> Result<Value> {
    if let Some(reference) = string_property(node, "ref") {
        return HandleRef::parse(reference)
            .map(Value::HandleRef)
            .ok_or_else(|| {
                LoadError::InvalidConfig(format!(
                    "invalid reference '{}', expected <stack>.<output>",
                    reference
                ))
            });
    }
    if let Some(secret) = string_property(node, "secret") {
        return Ok(Value::secret(secret));
    }

    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .nth(1)
        .and_then(|e| to_literal(e.value()))
        .map(Value::Literal)
        .ok_or_else(|| {
            LoadError::InvalidConfig(format!(
                "'{}' requires a value, ref= or secret=",
                node.name().value()
            ))
        })
}
