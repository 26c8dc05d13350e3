//! State-backed local provider
//!
//! Records each ensured resource in [`GlobalState`] and answers "ensure"
//! idempotently: a resource whose inputs are unchanged is a no-op and
//! returns its stored outputs.

use crate::action::ActionType;
use crate::error::ProviderError;
use crate::provider::{MaterializeOutcome, MaterializeRequest, Materializer};
use crate::state::{GlobalState, ResourceState};
use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use stackfleet_core::Literal;
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub struct LocalProvider {
    state: Mutex<GlobalState>,
}

impl LocalProvider {
    pub fn new(state: GlobalState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    /// Current state, for persisting after a run
    pub async fn snapshot(&self) -> GlobalState {
        self.state.lock().await.clone()
    }
}

/// Hex SHA-256, stable across builds so persisted fingerprints keep matching
fn digest(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}

/// Digest of everything that defines the desired resource. Secret values
/// are not part of it; only which variables are secret-bound.
fn fingerprint(request: &MaterializeRequest) -> Result<String, ProviderError> {
    let inputs: BTreeMap<&String, serde_json::Value> = request
        .inputs
        .iter()
        .map(|(k, v)| (k, v.to_json()))
        .collect();
    let environment = request.environment.as_ref().map(|env| {
        serde_json::json!({
            "variables": env.variables(),
            "secrets": env.secret_keys().collect::<Vec<_>>(),
        })
    });

    let canonical = serde_json::to_string(&serde_json::json!({
        "kind": request.kind,
        "inputs": inputs,
        "placement": request.placement,
        "environment": environment,
    }))
    .map_err(|e| ProviderError::Failed(e.to_string()))?;

    Ok(digest(&canonical))
}

#[async_trait]
impl Materializer for LocalProvider {
    async fn ensure(&self, request: &MaterializeRequest) -> Result<MaterializeOutcome, ProviderError> {
        let key = request.key();
        let fingerprint = fingerprint(request)?;
        let mut state = self.state.lock().await;

        let existing = state.get_resource(&key).cloned();
        if let Some(existing) = &existing
            && existing.fingerprint == fingerprint
            && request
                .declared_outputs
                .iter()
                .all(|o| existing.outputs.contains_key(o))
        {
            debug!(resource = %key, "Resource unchanged");
            return Ok(MaterializeOutcome {
                action: ActionType::NoOp,
                outputs: existing.outputs.clone(),
            });
        }

        let mut outputs = BTreeMap::new();
        for output in &request.declared_outputs {
            let value = existing
                .as_ref()
                .and_then(|e| e.outputs.get(output).cloned())
                .or_else(|| request.inputs.get(output).and_then(|v| v.as_literal().cloned()))
                .unwrap_or_else(|| {
                    Literal::from(format!(
                        "{}-{}",
                        request.kind,
                        &digest(&format!("{}#{}", key, output))[..8]
                    ))
                });
            outputs.insert(output.clone(), value);
        }

        let (action, resource) = match existing {
            Some(mut resource) => {
                resource.fingerprint = fingerprint;
                resource.outputs = outputs.clone();
                resource.updated_at = Utc::now();
                (ActionType::Update, resource)
            }
            None => {
                let id = format!("local-{}-{}", request.kind, &digest(&key)[..8]);
                let mut resource = ResourceState::new(id, request.kind, fingerprint);
                resource.outputs = outputs.clone();
                (ActionType::Create, resource)
            }
        };

        info!(resource = %key, id = %resource.id, %action, "Resource ensured");
        state.set_resource(key, resource);

        Ok(MaterializeOutcome { action, outputs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackfleet_core::{ResolvedValue, ResourceDescriptor, ResourceKind, SecretHandle, Value};

    fn request(cidr: &str) -> MaterializeRequest {
        let vpc = ResourceDescriptor::new("vpc", ResourceKind::Network)
            .with_input("cidr", Value::literal(cidr))
            .with_output("vpcId");
        MaterializeRequest::new(
            "net-base",
            &vpc,
            BTreeMap::from([
                (
                    "cidr".to_string(),
                    ResolvedValue::Literal(Literal::from(cidr)),
                ),
                (
                    "key".to_string(),
                    ResolvedValue::Secret(SecretHandle::new("mssql_secret")),
                ),
            ]),
        )
    }

    #[tokio::test]
    async fn test_create_then_noop_then_update() {
        let provider = LocalProvider::new(GlobalState::new());

        let created = provider.ensure(&request("10.13.0.0/16")).await.unwrap();
        assert_eq!(created.action, ActionType::Create);
        let vpc_id = created.outputs["vpcId"].clone();

        let again = provider.ensure(&request("10.13.0.0/16")).await.unwrap();
        assert_eq!(again.action, ActionType::NoOp);
        assert_eq!(again.outputs["vpcId"], vpc_id);

        let updated = provider.ensure(&request("10.14.0.0/16")).await.unwrap();
        assert_eq!(updated.action, ActionType::Update);
        // provider ids survive updates
        assert_eq!(updated.outputs["vpcId"], vpc_id);

        let snapshot = provider.snapshot().await;
        assert_eq!(snapshot.resources.len(), 1);
        assert!(snapshot.resources["net-base/vpc"].id.starts_with("local-network-"));
    }

    #[tokio::test]
    async fn test_state_survives_new_provider() {
        let first = LocalProvider::new(GlobalState::new());
        first.ensure(&request("10.13.0.0/16")).await.unwrap();

        let second = LocalProvider::new(first.snapshot().await);
        let outcome = second.ensure(&request("10.13.0.0/16")).await.unwrap();
        assert_eq!(outcome.action, ActionType::NoOp);
    }

    #[test]
    fn test_digest_is_stable_sha256() {
        assert_eq!(
            digest("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn test_fingerprint_persisted_in_state_matches_on_reload() {
        let first = LocalProvider::new(GlobalState::new());
        first.ensure(&request("10.13.0.0/16")).await.unwrap();
        let stored = first.snapshot().await.resources["net-base/vpc"].clone();
        assert_eq!(stored.fingerprint.len(), 64);
        assert_eq!(stored.fingerprint, fingerprint(&request("10.13.0.0/16")).unwrap());

        // through the JSON state file format
        let json = serde_json::to_string(&first.snapshot().await).unwrap();
        let reloaded: GlobalState = serde_json::from_str(&json).unwrap();
        let outcome = LocalProvider::new(reloaded)
            .ensure(&request("10.13.0.0/16"))
            .await
            .unwrap();
        assert_eq!(outcome.action, ActionType::NoOp);
    }

    #[tokio::test]
    async fn test_output_seeded_from_input() {
        let vpc = ResourceDescriptor::new("vpc", ResourceKind::Network).with_output("vpcId");
        let request = MaterializeRequest::new(
            "a",
            &vpc,
            BTreeMap::from([(
                "vpcId".to_string(),
                ResolvedValue::Literal(Literal::from("vpc-1")),
            )]),
        );
        let outcome = LocalProvider::new(GlobalState::new())
            .ensure(&request)
            .await
            .unwrap();
        assert_eq!(outcome.outputs["vpcId"], Literal::from("vpc-1"));
    }
}
