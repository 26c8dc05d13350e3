//! Declared input values

use serde::{Deserialize, Serialize};
use std::fmt;

/// A plain scalar value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl Literal {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Literal::Integer(i) => Some(*i),
            Literal::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Literal::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Literal::Bool(b) => serde_json::Value::Bool(*b),
            Literal::Integer(i) => serde_json::Value::from(*i),
            Literal::Float(f) => serde_json::Value::from(*f),
            Literal::String(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Integer(i) => write!(f, "{}", i),
            Literal::Float(v) => write!(f, "{}", v),
            Literal::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::String(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Literal::String(value)
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Literal::Integer(value)
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Bool(value)
    }
}

/// Weak reference to an output declared by some stack.
///
/// It only names the producer; nothing is owned and resolution happens
/// during provisioning.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HandleRef {
    pub stack: String,
    pub output: String,
}

impl HandleRef {
    pub fn new(stack: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            stack: stack.into(),
            output: output.into(),
        }
    }

    /// Parse the `stack.output` shorthand used in KDL files. Splits on the
    /// first dot; stack ids never contain one.
    pub fn parse(reference: &str) -> Option<Self> {
        let (stack, output) = reference.split_once('.')?;
        if stack.is_empty() || output.is_empty() {
            return None;
        }
        Some(Self::new(stack, output))
    }
}

impl fmt::Display for HandleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.stack, self.output)
    }
}

/// Reference to a secret declared somewhere in the graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecretRef {
    pub secret: String,
}

impl SecretRef {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

/// A declared resource input.
///
/// In YAML/JSON a scalar is a literal, `{stack, output}` is a handle
/// reference and `{secret}` is a secret reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Literal(Literal),
    HandleRef(HandleRef),
    SecretRef(SecretRef),
}

impl Value {
    pub fn literal(value: impl Into<Literal>) -> Self {
        Value::Literal(value.into())
    }

    pub fn handle(stack: impl Into<String>, output: impl Into<String>) -> Self {
        Value::HandleRef(HandleRef::new(stack, output))
    }

    pub fn secret(secret: impl Into<String>) -> Self {
        Value::SecretRef(SecretRef::new(secret))
    }

    pub fn as_handle_ref(&self) -> Option<&HandleRef> {
        match self {
            Value::HandleRef(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_secret_ref(&self) -> Option<&SecretRef> {
        match self {
            Value::SecretRef(r) => Some(r),
            _ => None,
        }
    }
}
