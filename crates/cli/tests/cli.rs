use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;

/// `dbseed` with settings isolated from the developer's environment.
fn dbseed() -> Command {
    let mut cmd = Command::cargo_bin("dbseed").unwrap();
    cmd.env("DBSEED_CONFIG_DIR", "/nonexistent/dbseed-config")
        .env("DBSEED_ENV", "local")
        .env("RUST_LOG", "off")
        .env_remove("DBSEED_BOOTSTRAP__SPEC_PATH")
        .env_remove("MONGODB_URL")
        .env_remove("MONGODB_PORT")
        .env_remove("MONGODB_USERNAME")
        .env_remove("MONGODB_PASSWORD");
    cmd
}

fn write_spec(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("dbseed-{}-{}.json", std::process::id(), name));
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn validate_accepts_embedded_spec() {
    dbseed()
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("spec is valid: 2 action(s)"));
}

#[test]
fn validate_rejects_invalid_spec_with_exit_code_3() {
    let path = write_spec(
        "invalid",
        r#"{"actions": [{"kind": "ensure_collection", "database": "my.db", "name": "test"}]}"#,
    );

    dbseed()
        .args(["validate", "--spec"])
        .arg(&path)
        .assert()
        .code(3)
        .stderr(predicate::str::contains("action #0"));
}

#[test]
fn dry_run_applies_spec_to_empty_database() {
    dbseed()
        .args(["run", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "[ok] ensure_user appuser@admin: success",
        ))
        .stdout(predicate::str::contains(
            "[ok] ensure_collection mydatabase.test: success",
        ));
}

#[test]
fn dry_run_json_output_redacts_password() {
    dbseed()
        .args(["run", "--dry-run", "--output", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"outcome\": \"completed\""))
        .stdout(predicate::str::contains("apppassword").not());
}

#[test]
fn show_prints_spec_without_password() {
    dbseed()
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"username\": \"appuser\""))
        .stdout(predicate::str::contains("apppassword").not());
}

#[test]
fn unreachable_database_exits_with_code_2() {
    dbseed()
        .env("DBSEED_DATABASE__HOST", "127.0.0.1")
        .env("DBSEED_DATABASE__PORT", "1")
        .env("DBSEED_DATABASE__CONNECT_TIMEOUT_MS", "300")
        .arg("run")
        .assert()
        .code(2)
        .stdout(predicate::str::contains("connection_failed"));
}

#[test]
fn unsupported_environment_exits_with_code_3() {
    dbseed()
        .env("DBSEED_ENV", "qa")
        .arg("validate")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("unsupported environment"));
}
