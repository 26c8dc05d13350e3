//! Resource descriptors

use super::value::{HandleRef, SecretRef, Value};
use super::workload::WorkloadSpec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Closed set of resource kinds.
///
/// The kind decides which inputs are required and which materializer
/// realizes the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Network,
    Cluster,
    Datastore,
    ComputeService,
    ExternalComputeService,
    LoadBalancer,
    DnsRecord,
    IamRole,
    Secret,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 9] = [
        ResourceKind::Network,
        ResourceKind::Cluster,
        ResourceKind::Datastore,
        ResourceKind::ComputeService,
        ResourceKind::ExternalComputeService,
        ResourceKind::LoadBalancer,
        ResourceKind::DnsRecord,
        ResourceKind::IamRole,
        ResourceKind::Secret,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "network" | "vpc" => Some(Self::Network),
            "cluster" => Some(Self::Cluster),
            "datastore" | "database" => Some(Self::Datastore),
            "compute-service" | "compute_service" => Some(Self::ComputeService),
            "external-compute-service" | "external_compute_service" => {
                Some(Self::ExternalComputeService)
            }
            "load-balancer" | "load_balancer" => Some(Self::LoadBalancer),
            "dns-record" | "dns_record" => Some(Self::DnsRecord),
            "iam-role" | "iam_role" => Some(Self::IamRole),
            "secret" => Some(Self::Secret),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Cluster => "cluster",
            Self::Datastore => "datastore",
            Self::ComputeService => "compute-service",
            Self::ExternalComputeService => "external-compute-service",
            Self::LoadBalancer => "load-balancer",
            Self::DnsRecord => "dns-record",
            Self::IamRole => "iam-role",
            Self::Secret => "secret",
        }
    }

    /// Input keys that must be present on every resource of this kind
    pub fn required_inputs(&self) -> &'static [&'static str] {
        match self {
            Self::Network => &["cidr"],
            Self::Cluster => &["network"],
            Self::Datastore => &["engine", "network"],
            Self::ComputeService | Self::ExternalComputeService | Self::LoadBalancer => {
                &["cluster", "image"]
            }
            Self::DnsRecord => &["zone", "name"],
            Self::IamRole => &["principal"],
            Self::Secret => &[],
        }
    }

    /// Kinds that run workloads and go through placement
    pub fn is_workload(&self) -> bool {
        matches!(
            self,
            Self::ComputeService | Self::ExternalComputeService | Self::LoadBalancer
        )
    }

    /// Cloud-managed capacity scaled by the provider rather than placed on nodes
    pub fn is_elastic(&self) -> bool {
        matches!(self, Self::ComputeService)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable declaration of a single infrastructure resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// Unique within the owning stack
    pub id: String,
    pub kind: ResourceKind,
    #[serde(default)]
    pub inputs: BTreeMap<String, Value>,
    /// Output names this resource promises to produce
    #[serde(default, rename = "outputs")]
    pub declared_outputs: BTreeSet<String>,
    /// Workload settings, only meaningful for workload kinds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workload: Option<WorkloadSpec>,
    /// Per-resource materialization timeout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl ResourceDescriptor {
    pub fn new(id: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            id: id.into(),
            kind,
            inputs: BTreeMap::new(),
            declared_outputs: BTreeSet::new(),
            workload: None,
            timeout_secs: None,
        }
    }

    pub fn with_input(mut self, key: impl Into<String>, value: Value) -> Self {
        self.inputs.insert(key.into(), value);
        self
    }

    pub fn with_output(mut self, name: impl Into<String>) -> Self {
        self.declared_outputs.insert(name.into());
        self
    }

    pub fn with_workload(mut self, workload: WorkloadSpec) -> Self {
        self.workload = Some(workload);
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Every value this resource consumes: inputs, then workload environment
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        let env = self
            .workload
            .iter()
            .flat_map(|w| w.environment.values());
        self.inputs.values().chain(env)
    }

    /// All handle references, in declaration order
    pub fn handle_refs(&self) -> impl Iterator<Item = &HandleRef> {
        self.values().filter_map(Value::as_handle_ref)
    }

    /// All secret references, including workload secret bindings
    pub fn secret_refs(&self) -> impl Iterator<Item = &SecretRef> {
        let bound = self.workload.iter().flat_map(|w| w.secrets.values());
        self.values().filter_map(Value::as_secret_ref).chain(bound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse_round_trip() {
        for kind in ResourceKind::ALL {
            assert_eq!(ResourceKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ResourceKind::parse("vpc"), Some(ResourceKind::Network));
        assert_eq!(ResourceKind::parse("bucket"), None);
    }

    #[test]
    fn test_kind_serde_matches_as_str() {
        let json = serde_json::to_string(&ResourceKind::ExternalComputeService).unwrap();
        assert_eq!(json, "\"external-compute-service\"");
        let kind: ResourceKind = serde_json::from_str("\"dns-record\"").unwrap();
        assert_eq!(kind, ResourceKind::DnsRecord);
    }

    #[test]
    fn test_references_include_workload_environment() {
        let mut workload = WorkloadSpec::default();
        workload
            .environment
            .insert("DB_HOST".to_string(), Value::handle("stateful", "dbHost"));
        workload
            .secrets
            .insert("DB_PASSWORD".to_string(), SecretRef::new("db-secret"));

        let resource = ResourceDescriptor::new("web", ResourceKind::ExternalComputeService)
            .with_input("cluster", Value::handle("net-base", "clusterAnywhere"))
            .with_input("image", Value::literal("myla-dev:1.2"))
            .with_input("pem", Value::secret("saml-pem"))
            .with_workload(workload);

        let handles: Vec<String> = resource.handle_refs().map(|r| r.to_string()).collect();
        assert_eq!(handles, vec!["net-base.clusterAnywhere", "stateful.dbHost"]);

        let secrets: Vec<&str> = resource.secret_refs().map(|r| r.secret.as_str()).collect();
        assert_eq!(secrets, vec!["saml-pem", "db-secret"]);
    }

    #[test]
    fn test_workload_kinds() {
        assert!(ResourceKind::ComputeService.is_workload());
        assert!(ResourceKind::ComputeService.is_elastic());
        assert!(ResourceKind::ExternalComputeService.is_workload());
        assert!(!ResourceKind::ExternalComputeService.is_elastic());
        assert!(!ResourceKind::Datastore.is_workload());
    }
}
