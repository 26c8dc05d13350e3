mod common;
use common::TestProject;
use predicates::prelude::*;
use std::fs;

const CANARY: &str = "canary-7f3a";

fn report(output: &[u8]) -> serde_json::Value {
    serde_json::from_slice(output).unwrap()
}

fn stack<'a>(report: &'a serde_json::Value, id: &str) -> &'a serde_json::Value {
    report["stacks"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["id"] == id)
        .unwrap()
}

#[test]
fn test_apply_materializes_fleet() {
    let project = TestProject::fleet();
    project
        .command()
        .arg("apply")
        .env("STACKFLEET_SECRET_MSSQL_SECRET", CANARY)
        .assert()
        .success()
        .stdout(predicate::str::contains("3 materialized, 0 failed, 0 skipped"))
        .stdout(predicate::str::contains(CANARY).not())
        .stderr(predicate::str::contains(CANARY).not());

    let state = fs::read_to_string(project.state_file()).unwrap();
    assert!(!state.contains(CANARY));
    assert!(state.contains("net-base/vpc"));
    // the external service landed on the only node with capacity
    let state: serde_json::Value = serde_json::from_str(&state).unwrap();
    assert_eq!(
        state["placements"]["rabbit-anywhere/rabbit"]["nodes"],
        serde_json::json!(["n1"])
    );
    assert!(!project.path().join(".stackfleet").join("lock.json").exists());
}

#[test]
fn test_apply_rerun_is_noop() {
    let project = TestProject::fleet();
    let run = || {
        project
            .command()
            .arg("apply")
            .arg("--json")
            .env("STACKFLEET_SECRET_MSSQL_SECRET", CANARY)
            .output()
            .unwrap()
    };

    let first = run();
    assert!(first.status.success());
    let second = run();
    assert!(second.status.success());

    let first = report(&first.stdout);
    let second = report(&second.stdout);
    assert_eq!(first["order"], second["order"]);
    assert_eq!(
        second["order"],
        serde_json::json!(["net-base", "stateful", "rabbit-anywhere"])
    );
    for stack in second["stacks"].as_array().unwrap() {
        assert_eq!(stack["state"], "materialized");
        for resource in stack["resources"].as_array().unwrap() {
            assert_eq!(resource["action"], "no_op");
        }
    }
    assert_eq!(
        stack(&first, "stateful")["outputs"],
        stack(&second, "stateful")["outputs"]
    );
}

#[test]
fn test_apply_missing_secret_fails_consumer() {
    let project = TestProject::fleet();
    let output = project
        .command()
        .arg("apply")
        .arg("--json")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let report = report(&output.stdout);
    assert_eq!(stack(&report, "net-base")["state"], "materialized");
    assert_eq!(stack(&report, "stateful")["state"], "materialized");

    let rabbit = stack(&report, "rabbit-anywhere");
    assert_eq!(rabbit["state"], "failed");
    assert_eq!(rabbit["error"]["resource"], "rabbit");
    assert!(
        rabbit["error"]["message"]
            .as_str()
            .unwrap()
            .contains("mssql_secret")
    );
}

#[test]
fn test_apply_failure_skips_dependents() {
    let project = TestProject::new();
    // no eligible node for the datastore consumer's service
    project.write_stack_kdl(
        r#"
stack "edge" {
    resource "lb" kind="load-balancer" {
        input "cluster" "anywhere"
        input "image" "haproxy:2.9"
        outputs "cluster"
        workload {
            placement attribute="role == loadbalancer"
        }
    }
    output "endpoint" resource="lb" attribute="cluster"
}
stack "dns" {
    resource "app" kind="dns-record" {
        input "zone" "ecs.my.la.gov"
        input "name" ref="edge.endpoint"
    }
}
stack "net-base" {
    resource "vpc" kind="network" {
        input "cidr" "10.13.0.0/16"
    }
}
"#,
    );
    project.write_nodes_kdl(common::NODES);

    project
        .command()
        .arg("apply")
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("1 materialized, 1 failed, 1 skipped"))
        .stdout(predicate::str::contains("no eligible node"));
}

#[test]
fn test_apply_respects_settings_file() {
    let project = TestProject::fleet();
    let dir = project.path().join(".stackfleet");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("settings.yaml"), "max_parallel_stacks: 1\n").unwrap();

    project
        .command()
        .arg("apply")
        .env("STACKFLEET_SECRET_MSSQL_SECRET", CANARY)
        .assert()
        .success()
        .stdout(predicate::str::contains("(1 in parallel)"));

    project
        .command()
        .arg("apply")
        .arg("--concurrency")
        .arg("3")
        .env("STACKFLEET_SECRET_MSSQL_SECRET", CANARY)
        .assert()
        .success()
        .stdout(predicate::str::contains("(3 in parallel)"));
}
