// ABOUTME: Integration tests for the hangar CLI commands.
// ABOUTME: Runs the binary against a fleet snapshot in a temporary directory.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const FLEET: &str = r#"
load_balancers:
  - id: 1
    domain: lb1.example.com
    fragment_name_postfix: -test
    configuration_version: 2
    deployed_configuration_version: 2
instances:
  - id: 10
    name: demo
    domains:
      - name: demo.example.com
    load_balancing_server: 1
    created: 2026-01-01T00:00:00Z
servers:
  - id: 20
    name: demo-appserver-1
    status: ready
    public_ip: 10.0.0.5
    created: 2026-03-01T00:00:00Z
  - id: 21
    name: demo-appserver-2
    status: ready
    public_ip: 10.0.0.6
    created: 2026-02-28T00:00:00Z
  - id: 22
    name: demo-appserver-3
    status: ready
    public_ip: 10.0.0.7
    created: 2026-02-01T00:00:00Z
appservers:
  - id: 30
    instance_id: 10
    server_id: 20
    status: running
    is_active: true
    created: 2026-03-01T00:00:00Z
    last_activated: 2026-03-05T00:00:00Z
  - id: 31
    instance_id: 10
    server_id: 21
    status: running
    created: 2026-02-28T00:00:00Z
  - id: 32
    instance_id: 10
    server_id: 22
    status: failed
    created: 2026-02-01T00:00:00Z
"#;

fn hangar_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("hangar"))
}

/// A directory with a default hangar.yml and the fleet snapshot above.
fn workspace() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("hangar.yml"), "{}\n").unwrap();
    fs::write(dir.path().join("fleet.yml"), FLEET).unwrap();
    dir
}

#[test]
fn help_shows_commands() {
    hangar_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("render-lb"))
        .stdout(predicate::str::contains("plan-retention"))
        .stdout(predicate::str::contains("status"));
}

#[test]
fn init_creates_config_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("hangar.yml");

    hangar_cmd()
        .current_dir(temp_dir.path())
        .args(["init", "--zone", "hosting.example.org"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created hangar.yml"));

    assert!(config_path.exists(), "hangar.yml should be created");
    let content = fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("zone: hosting.example.org"));
    assert!(content.contains("disable_reconfiguration: false"));
}

#[test]
fn init_refuses_to_overwrite_existing_config() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("hangar.yml");

    fs::write(&config_path, "existing: config").unwrap();

    hangar_cmd()
        .current_dir(temp_dir.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn commands_fail_without_config() {
    let temp_dir = tempfile::tempdir().unwrap();

    hangar_cmd()
        .current_dir(temp_dir.path())
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration file not found"));
}

#[test]
fn check_summarizes_the_fleet() {
    let dir = workspace();

    hangar_cmd()
        .current_dir(dir.path())
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("Instances:      1"))
        .stdout(predicate::str::contains("AppServers:     3 (1 active)"))
        .stdout(predicate::str::contains("Fleet snapshot is valid (0 warning(s))"));
}

#[test]
fn check_warns_about_undeployed_configuration() {
    let dir = workspace();
    fs::write(
        dir.path().join("fleet.yml"),
        FLEET.replace("deployed_configuration_version: 2", "deployed_configuration_version: 1"),
    )
    .unwrap();

    hangar_cmd()
        .current_dir(dir.path())
        .arg("check")
        .assert()
        .success()
        .stderr(predicate::str::contains("Warning: load balancer 1"))
        .stdout(predicate::str::contains("(1 warning(s))"));
}

#[test]
fn check_rejects_undeclared_status() {
    let dir = workspace();
    fs::write(
        dir.path().join("fleet.yml"),
        FLEET.replace("status: failed", "status: exploded"),
    )
    .unwrap();

    hangar_cmd()
        .current_dir(dir.path())
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid fleet snapshot"));
}

#[test]
fn render_lb_prints_backends_of_active_appservers() {
    let dir = workspace();

    hangar_cmd()
        .current_dir(dir.path())
        .args(["render-lb", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("demo.example.com be-demo-test"))
        .stdout(predicate::str::contains(
            "server appserver-30 10.0.0.5:80 check",
        ))
        .stdout(predicate::str::contains("appserver-31").not());
}

#[test]
fn render_lb_json_is_one_object() {
    let dir = workspace();

    let output = hangar_cmd()
        .current_dir(dir.path())
        .args(["--json", "render-lb", "1"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let value: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(value["backend_map"], "demo.example.com be-demo-test");
}

#[test]
fn render_lb_honours_the_kill_switch() {
    let dir = workspace();
    fs::write(
        dir.path().join("hangar.yml"),
        "load_balancer:\n  disable_reconfiguration: true\n",
    )
    .unwrap();

    hangar_cmd()
        .current_dir(dir.path())
        .args(["render-lb", "1"])
        .assert()
        .success()
        .stderr(predicate::str::contains("rendered configuration is empty"));
}

#[test]
fn plan_retention_lists_decisions() {
    let dir = workspace();

    hangar_cmd()
        .current_dir(dir.path())
        .args(["plan-retention", "10", "--days", "2", "--now", "2026-03-06T00:00:00Z"])
        .assert()
        .success()
        .stdout(predicate::str::contains("keep (active)"))
        .stdout(predicate::str::contains("keep (fallback)"))
        .stdout(predicate::str::contains("1 of 3 appserver(s) would be terminated"));
}

#[test]
fn plan_retention_rejects_bad_timestamp() {
    let dir = workspace();

    hangar_cmd()
        .current_dir(dir.path())
        .args(["plan-retention", "10", "--now", "yesterday"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid --now"));
}

#[test]
fn status_lists_available_operations() {
    let dir = workspace();

    hangar_cmd()
        .current_dir(dir.path())
        .args(["status", "appserver", "30"])
        .assert()
        .success()
        .stdout(predicate::str::contains("appserver 30: Running (running)"))
        .stdout(predicate::str::contains("operations: terminate, make_inactive"));

    hangar_cmd()
        .current_dir(dir.path())
        .args(["--json", "status", "lb", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""state_id":"clean""#));
}

#[test]
fn status_of_unknown_resource_fails() {
    let dir = workspace();

    hangar_cmd()
        .current_dir(dir.path())
        .args(["status", "instance", "99"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("instance 99"));
}

#[test]
fn check_warns_when_dns_token_is_unresolvable() {
    let dir = workspace();
    fs::write(
        dir.path().join("hangar.yml"),
        "dns:\n  zone: example.com\n  api_token:\n    env: HANGAR_CLI_TEST_DNS_TOKEN\n",
    )
    .unwrap();

    hangar_cmd()
        .current_dir(dir.path())
        .env_remove("HANGAR_CLI_TEST_DNS_TOKEN")
        .arg("check")
        .assert()
        .success()
        .stderr(predicate::str::contains("$HANGAR_CLI_TEST_DNS_TOKEN"))
        .stdout(predicate::str::contains("(1 warning(s))"));

    hangar_cmd()
        .current_dir(dir.path())
        .env("HANGAR_CLI_TEST_DNS_TOKEN", "t0ken")
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("(0 warning(s))"));
}
