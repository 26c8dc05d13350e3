//! Output handle propagation
//!
//! Replaces handle references with the handles published by producer
//! stacks. Secret references become opaque [`SecretHandle`]s and are never
//! dereferenced here.

use crate::error::PropagationError;
use crate::model::{Handle, HandleTable, ResolvedValue, SecretHandle, Value};
use std::collections::BTreeMap;

/// Resolve one input value against the handles published so far
pub fn resolve(value: &Value, handles: &HandleTable) -> Result<ResolvedValue, PropagationError> {
    match value {
        Value::Literal(literal) => Ok(ResolvedValue::Literal(literal.clone())),
        Value::HandleRef(reference) => handles
            .get(&(reference.stack.clone(), reference.output.clone()))
            .map(|handle| ResolvedValue::Handle(handle.clone()))
            .ok_or_else(|| PropagationError::NotYetMaterialized {
                stack: reference.stack.clone(),
                output: reference.output.clone(),
            }),
        Value::SecretRef(reference) => Ok(ResolvedValue::Secret(SecretHandle::new(
            reference.secret.clone(),
        ))),
    }
}

/// Resolve a whole input map, failing on the first unresolved handle
pub fn resolve_all(
    inputs: &BTreeMap<String, Value>,
    handles: &HandleTable,
) -> Result<BTreeMap<String, ResolvedValue>, PropagationError> {
    inputs
        .iter()
        .map(|(key, value)| Ok((key.clone(), resolve(value, handles)?)))
        .collect()
}

/// Add a handle to the table. The first publication of a key wins.
pub fn publish(handles: &mut HandleTable, handle: Handle) -> bool {
    let key = handle.key();
    if handles.contains_key(&key) {
        return false;
    }
    handles.insert(key, handle);
    true
}
