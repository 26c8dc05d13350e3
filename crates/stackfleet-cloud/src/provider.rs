//! Provider boundary
//!
//! Every resource kind is realized by exactly one [`Materializer`], looked up
//! through a closed per-kind table.

use crate::action::ActionType;
use crate::error::ProviderError;
use crate::inject::RuntimeEnvironment;
use async_trait::async_trait;
use stackfleet_core::{Literal, ResolvedValue, ResourceDescriptor, ResourceKind};
use stackfleet_registry::Placement;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// Everything a materializer needs to ensure one resource
#[derive(Debug, Clone)]
pub struct MaterializeRequest {
    pub stack: String,
    pub resource: String,
    pub kind: ResourceKind,
    /// Inputs after handle propagation; secrets stay opaque
    pub inputs: BTreeMap<String, ResolvedValue>,
    pub declared_outputs: BTreeSet<String>,
    /// Set for workload kinds
    pub placement: Option<Placement>,
    /// Set for workload kinds
    pub environment: Option<RuntimeEnvironment>,
}

impl MaterializeRequest {
    pub fn new(
        stack: &str,
        resource: &ResourceDescriptor,
        inputs: BTreeMap<String, ResolvedValue>,
    ) -> Self {
        Self {
            stack: stack.to_string(),
            resource: resource.id.clone(),
            kind: resource.kind,
            inputs,
            declared_outputs: resource.declared_outputs.clone(),
            placement: None,
            environment: None,
        }
    }

    /// `<stack>/<resource>`
    pub fn key(&self) -> String {
        format!("{}/{}", self.stack, self.resource)
    }

    pub fn input_str(&self, key: &str) -> Option<&str> {
        self.inputs
            .get(key)
            .and_then(ResolvedValue::as_literal)
            .and_then(Literal::as_str)
    }
}

/// Result of an ensure call
#[derive(Debug, Clone, PartialEq)]
pub struct MaterializeOutcome {
    pub action: ActionType,
    pub outputs: BTreeMap<String, Literal>,
}

impl MaterializeOutcome {
    pub fn new(action: ActionType) -> Self {
        Self {
            action,
            outputs: BTreeMap::new(),
        }
    }

    pub fn with_output(mut self, name: impl Into<String>, value: impl Into<Literal>) -> Self {
        self.outputs.insert(name.into(), value.into());
        self
    }
}

/// Idempotent "ensure resource of kind K with inputs I exists; return outputs O"
#[async_trait]
pub trait Materializer: Send + Sync {
    async fn ensure(&self, request: &MaterializeRequest) -> Result<MaterializeOutcome, ProviderError>;
}

/// Per-kind materializer table
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    materializers: HashMap<ResourceKind, Arc<dyn Materializer>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, kind: ResourceKind, materializer: Arc<dyn Materializer>) -> Self {
        self.materializers.insert(kind, materializer);
        self
    }

    /// Use one materializer for every kind
    pub fn with_all(mut self, materializer: Arc<dyn Materializer>) -> Self {
        for kind in ResourceKind::ALL {
            self.materializers.insert(kind, materializer.clone());
        }
        self
    }

    pub fn get(&self, kind: ResourceKind) -> Option<&Arc<dyn Materializer>> {
        self.materializers.get(&kind)
    }

    /// Dispatch to the kind's materializer and check the declared outputs came back
    pub async fn ensure(
        &self,
        request: &MaterializeRequest,
    ) -> Result<MaterializeOutcome, ProviderError> {
        let materializer = self
            .get(request.kind)
            .ok_or(ProviderError::Unsupported(request.kind))?;
        let outcome = materializer.ensure(request).await?;

        if let Some(missing) = request
            .declared_outputs
            .iter()
            .find(|o| !outcome.outputs.contains_key(*o))
        {
            return Err(ProviderError::MissingOutput {
                output: missing.clone(),
            });
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackfleet_core::Value;

    struct Fixed(MaterializeOutcome);

    #[async_trait]
    impl Materializer for Fixed {
        async fn ensure(
            &self,
            _request: &MaterializeRequest,
        ) -> Result<MaterializeOutcome, ProviderError> {
            Ok(self.0.clone())
        }
    }

    fn vpc_request() -> MaterializeRequest {
        let vpc = ResourceDescriptor::new("vpc", ResourceKind::Network)
            .with_input("cidr", Value::literal("10.13.0.0/16"))
            .with_output("vpcId");
        let inputs = BTreeMap::from([(
            "cidr".to_string(),
            ResolvedValue::Literal(Literal::from("10.13.0.0/16")),
        )]);
        MaterializeRequest::new("net-base", &vpc, inputs)
    }

    #[tokio::test]
    async fn test_dispatch_by_kind() {
        let registry = ProviderRegistry::new().register(
            ResourceKind::Network,
            Arc::new(Fixed(
                MaterializeOutcome::new(ActionType::Create).with_output("vpcId", "vpc-1"),
            )),
        );

        let request = vpc_request();
        assert_eq!(request.key(), "net-base/vpc");
        assert_eq!(request.input_str("cidr"), Some("10.13.0.0/16"));

        let outcome = registry.ensure(&request).await.unwrap();
        assert_eq!(outcome.outputs["vpcId"], Literal::from("vpc-1"));
    }

    #[tokio::test]
    async fn test_unsupported_kind() {
        let err = ProviderRegistry::new()
            .ensure(&vpc_request())
            .await
            .unwrap_err();
        assert_eq!(err, ProviderError::Unsupported(ResourceKind::Network));
    }

    #[tokio::test]
    async fn test_missing_declared_output() {
        let registry = ProviderRegistry::new().with_all(Arc::new(Fixed(MaterializeOutcome::new(
            ActionType::Create,
        ))));
        let err = registry.ensure(&vpc_request()).await.unwrap_err();
        assert_eq!(
            err,
            ProviderError::MissingOutput {
                output: "vpcId".to_string()
            }
        );
    }
}
