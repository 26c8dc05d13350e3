//! Materialized handles and resolved values

use super::value::Literal;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Lookup key for a handle: `(stack id, output name)`
pub type HandleKey = (String, String);

/// Handles published so far during a provisioning run
pub type HandleTable = HashMap<HandleKey, Handle>;

#[derive(Debug)]
struct HandleInner {
    stack: String,
    output: String,
    value: Literal,
}

/// Immutable runtime value of a declared stack output.
///
/// Produced once per stack materialization and shared by reference
/// among every consumer; cloning only bumps a reference count.
#[derive(Debug, Clone)]
pub struct Handle(Arc<HandleInner>);

impl Handle {
    pub fn new(stack: impl Into<String>, output: impl Into<String>, value: Literal) -> Self {
        Self(Arc::new(HandleInner {
            stack: stack.into(),
            output: output.into(),
            value,
        }))
    }

    pub fn stack(&self) -> &str {
        &self.0.stack
    }

    pub fn output(&self) -> &str {
        &self.0.output
    }

    pub fn value(&self) -> &Literal {
        &self.0.value
    }

    pub fn key(&self) -> HandleKey {
        (self.0.stack.clone(), self.0.output.clone())
    }

    /// Whether both handles point at the same published value
    pub fn ptr_eq(&self, other: &Handle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Handle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
            || (self.0.stack == other.0.stack
                && self.0.output == other.0.output
                && self.0.value == other.0.value)
    }
}

/// Opaque reference to a secret. Carries no plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SecretHandle {
    secret_id: String,
}

impl SecretHandle {
    pub fn new(secret_id: impl Into<String>) -> Self {
        Self {
            secret_id: secret_id.into(),
        }
    }

    pub fn secret_id(&self) -> &str {
        &self.secret_id
    }
}

impl fmt::Display for SecretHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "secret:{}", self.secret_id)
    }
}

/// A value after handle propagation
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedValue {
    Literal(Literal),
    Handle(Handle),
    Secret(SecretHandle),
}

impl ResolvedValue {
    /// Concrete scalar, if this is not a secret
    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            ResolvedValue::Literal(l) => Some(l),
            ResolvedValue::Handle(h) => Some(h.value()),
            ResolvedValue::Secret(_) => None,
        }
    }

    pub fn as_secret(&self) -> Option<&SecretHandle> {
        match self {
            ResolvedValue::Secret(s) => Some(s),
            _ => None,
        }
    }

    /// JSON form safe for state files and logs; secrets render as their id
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ResolvedValue::Secret(s) => serde_json::Value::String(s.to_string()),
            other => other
                .as_literal()
                .map(Literal::to_json)
                .unwrap_or(serde_json::Value::Null),
        }
    }
}

impl fmt::Display for ResolvedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedValue::Literal(l) => write!(f, "{}", l),
            ResolvedValue::Handle(h) => write!(f, "{}", h.value()),
            ResolvedValue::Secret(s) => write!(f, "{}", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_clone_shares_value() {
        let handle = Handle::new("net-base", "vpcId", Literal::from("vpc-1"));
        let shared = handle.clone();
        assert!(handle.ptr_eq(&shared));
        assert_eq!(shared.value(), &Literal::from("vpc-1"));
        assert_eq!(shared.key(), ("net-base".to_string(), "vpcId".to_string()));
    }

    #[test]
    fn test_secret_renders_id_only() {
        let value = ResolvedValue::Secret(SecretHandle::new("db-credentials"));
        assert_eq!(value.to_string(), "secret:db-credentials");
        assert_eq!(value.to_json(), serde_json::json!("secret:db-credentials"));
        assert!(value.as_literal().is_none());
    }
}
