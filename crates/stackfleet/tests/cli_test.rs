#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

mod common;
use common::TestProject;

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("stackfleet").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("apply"))
        .stdout(predicate::str::contains("nodes"));
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("stackfleet").unwrap();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("stackfleet"));
}

#[test]
fn test_apply_help() {
    let mut cmd = Command::cargo_bin("stackfleet").unwrap();
    cmd.arg("apply")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--concurrency"))
        .stdout(predicate::str::contains("--json"));
}

#[test]
fn test_invalid_command() {
    let mut cmd = Command::cargo_bin("stackfleet").unwrap();
    cmd.arg("invalid-command").assert().failure();
}

#[test]
fn test_validate_fleet() {
    let project = TestProject::fleet();
    project
        .command()
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Stack definitions are valid"))
        .stdout(predicate::str::contains("stacks: 3"))
        .stdout(predicate::str::contains("depends on net-base"))
        .stdout(predicate::str::contains("mssql_secret"));
}

#[test]
fn test_validate_rejects_cycle() {
    let project = TestProject::new();
    project.write_stack_kdl(
        r#"
stack "a" {
    resource "vpc" kind="network" {
        input "cidr" ref="b.cidr"
        outputs "vpcId"
    }
    output "vpcId" resource="vpc"
}
stack "b" {
    resource "net" kind="network" {
        input "cidr" ref="a.vpcId"
        outputs "cidr"
    }
    output "cidr" resource="net"
}
"#,
    );

    project
        .command()
        .arg("validate")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("cycle"));
}

#[test]
fn test_validate_rejects_unknown_output() {
    let project = TestProject::new();
    project.write_stack_kdl(
        r#"
stack "net-base" {
    resource "vpc" kind="network" {
        input "cidr" "10.13.0.0/16"
        outputs "vpcId"
    }
    output "vpcId" resource="vpc"
}
stack "stateful" {
    resource "rds" kind="datastore" {
        input "engine" "sqlserver-ex"
        input "network" ref="net-base.subnetId"
    }
}
"#,
    );

    project
        .command()
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("net-base.subnetId"));
}

#[test]
fn test_validate_without_project() {
    let project = TestProject::new();
    project.command().arg("validate").assert().failure();
}

#[test]
fn test_validate_yaml_file() {
    let project = TestProject::new();
    let file = project.path().join("fleet.yaml");
    fs::write(
        &file,
        r#"
stacks:
  - id: net-base
    resources:
      - id: vpc
        kind: network
        inputs:
          cidr: 10.13.0.0/16
        outputs: [vpcId]
    outputs:
      vpcId: { resource: vpc }
  - id: dns
    resources:
      - id: app
        kind: dns-record
        inputs:
          zone: ecs.my.la.gov
          name: app
"#,
    )
    .unwrap();

    project
        .command()
        .arg("validate")
        .arg("--file")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("stacks: 2"));
}

#[test]
fn test_plan_shows_order_and_edges() {
    let project = TestProject::fleet();
    project
        .command()
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("1. net-base"))
        .stdout(predicate::str::contains("2. stateful"))
        .stdout(predicate::str::contains("3. rabbit-anywhere"))
        .stdout(predicate::str::contains("net-base -> stateful"))
        .stdout(predicate::str::contains("stateful -> rabbit-anywhere"))
        .stdout(predicate::str::contains("create"));
}

#[test]
fn test_nodes_lists_registered_nodes() {
    let project = TestProject::fleet();
    project
        .command()
        .arg("nodes")
        .assert()
        .success()
        .stdout(predicate::str::contains("n1"))
        .stdout(predicate::str::contains("role=webserver"))
        .stdout(predicate::str::contains("draining"));
}

#[test]
fn test_nodes_without_registry() {
    let project = TestProject::new();
    project.write_stack_kdl(common::FLEET);
    project
        .command()
        .arg("nodes")
        .assert()
        .success()
        .stdout(predicate::str::contains("No nodes registered"));
}
