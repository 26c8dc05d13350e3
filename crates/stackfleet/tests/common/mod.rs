#![allow(deprecated)]

use assert_cmd::Command;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Three stacks: a network, a datastore consuming its handle and a secret,
/// and an external service placed on registered nodes.
pub const FLEET: &str = r#"
stack "net-base" {
    resource "vpc" kind="network" {
        input "cidr" "10.13.0.0/16"
        outputs "vpcId"
    }
    output "vpcId" resource="vpc"
}

stack "stateful" {
    resource "mssql_secret" kind="secret"
    resource "rds" kind="datastore" {
        input "engine" "sqlserver-ex"
        input "network" ref="net-base.vpcId"
        input "credentials" secret="mssql_secret"
        outputs "hostname"
    }
    output "dbHost" resource="rds" attribute="hostname"
}

stack "rabbit-anywhere" {
    resource "rabbit" kind="external-compute-service" {
        input "cluster" "anywhere"
        input "image" "rabbitmq:3-management"
        workload {
            env "DB_HOST" ref="stateful.dbHost"
            secret-env "DB_PASSWORD" secret="mssql_secret"
            placement attribute="role == webserver"
        }
    }
}
"#;

pub const NODES: &str = r#"
node "n1" cluster="anywhere" {
    attribute "role" "webserver"
}
node "n2" cluster="anywhere" capacity=0 {
    attribute "role" "webserver"
}
"#;

pub struct TestProject {
    pub root: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        Self { root }
    }

    /// Project with [`FLEET`] and [`NODES`]
    #[allow(dead_code)]
    pub fn fleet() -> Self {
        let project = Self::new();
        project.write_stack_kdl(FLEET);
        project.write_nodes_kdl(NODES);
        project
    }

    pub fn write_stack_kdl(&self, content: &str) {
        fs::write(self.root.path().join("stackfleet.kdl"), content).unwrap();
    }

    #[allow(dead_code)]
    pub fn write_nodes_kdl(&self, content: &str) {
        fs::write(self.root.path().join("nodes.kdl"), content).unwrap();
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }

    #[allow(dead_code)]
    pub fn state_file(&self) -> PathBuf {
        self.path().join(".stackfleet").join("state.json")
    }

    /// `stackfleet` running inside the project, isolated from the
    /// caller's environment and global config
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("stackfleet").unwrap();
        cmd.current_dir(self.path())
            .env("XDG_CONFIG_HOME", self.path().join(".config"))
            .env_remove("STACKFLEET_CONFIG_PATH")
            .env_remove("STACKFLEET_PROJECT_ROOT")
            .env_remove("STACKFLEET_MAX_PARALLEL_STACKS")
            .env_remove("STACKFLEET_PROVIDER_RATE_LIMIT")
            .env_remove("STACKFLEET_RESOURCE_TIMEOUT_SECS")
            .env_remove("STACKFLEET_SECRET_MSSQL_SECRET")
            .env("STACKFLEET_SECRET_BACKEND", "env")
            .env_remove("RUST_LOG");
        cmd
    }
}
