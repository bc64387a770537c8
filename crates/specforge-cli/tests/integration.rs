#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn specforge(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("specforge").unwrap();
    cmd.current_dir(dir.path())
        .env("SPECFORGE_ROOT", dir.path())
        .env_remove("CLAUDE_API_KEY")
        .env_remove("ANTHROPIC_API_KEY")
        .env_remove("CLAUDE_MODEL")
        .env_remove("CLAUDE_MAX_TOKENS");
    cmd
}

fn init_project(dir: &TempDir) {
    specforge(dir).arg("init").assert().success();
}

fn json_output(cmd: &mut Command) -> serde_json::Value {
    let out = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&out).unwrap()
}

/// Walks `acme` from welcome to summary with two MVP features and one v2.
fn discovery_at_summary(dir: &TempDir) {
    specforge(dir)
        .args(["discovery", "show", "acme"])
        .assert()
        .success()
        .stdout(predicate::str::contains("welcome (1 of 5)"));
    specforge(dir)
        .args([
            "discovery",
            "set",
            "acme",
            "--problem",
            "Teams lose track of requirements",
            "--goal",
            "Ship faster",
        ])
        .assert()
        .success();
    specforge(dir)
        .args(["discovery", "add-user", "acme", "Product manager", "--count", "5"])
        .assert()
        .success();
    specforge(dir)
        .args(["discovery", "add-user", "acme", "Admin", "--permissions"])
        .assert()
        .success();
    for (name, priority, version) in [
        ("Sign in", "1", None),
        ("Dashboard", "2", None),
        ("Exports", "1", Some("v2")),
    ] {
        let mut cmd = specforge(dir);
        cmd.args(["discovery", "add-feature", "acme", name, "--priority", priority]);
        if let Some(v) = version {
            cmd.args(["--version", v]);
        }
        cmd.assert().success();
    }
    for _ in 0..4 {
        specforge(dir)
            .args(["discovery", "advance", "acme"])
            .assert()
            .success();
    }
}

fn confirmed(dir: &TempDir) {
    discovery_at_summary(dir);
    specforge(dir)
        .args(["discovery", "confirm", "acme"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Seeded 2 PRD(s)"));
}

// ---------------------------------------------------------------------------
// specforge init / config
// ---------------------------------------------------------------------------

#[test]
fn init_creates_config_and_gitignore_entry() {
    let dir = TempDir::new().unwrap();
    specforge(&dir)
        .args(["init", "--name", "acme"])
        .assert()
        .success()
        .stdout(predicate::str::contains("created: .specforge/config.yaml"));

    let config = std::fs::read_to_string(dir.path().join(".specforge/config.yaml")).unwrap();
    let value: serde_yaml::Value = serde_yaml::from_str(&config).unwrap();
    assert_eq!(value["project"]["name"].as_str(), Some("acme"));

    let gitignore = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
    assert!(gitignore.contains(".specforge/specforge.redb"));
}

#[test]
fn init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    specforge(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("exists:"));

    let gitignore = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
    assert_eq!(gitignore.matches(".specforge/specforge.redb").count(), 1);
}

#[test]
fn config_validate_on_fresh_project() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    specforge(&dir)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Config is valid"));
}

#[test]
fn config_show_never_prints_the_key() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    let value = json_output(
        specforge(&dir)
            .args(["config", "show", "--json"])
            .env("CLAUDE_API_KEY", "sk-secret"),
    );
    assert_eq!(value["generation"]["api_key"], "set");
}

#[test]
fn commands_before_init_fail() {
    let dir = TempDir::new().unwrap();
    specforge(&dir)
        .args(["discovery", "show", "acme"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialized"));
}

// ---------------------------------------------------------------------------
// specforge discovery
// ---------------------------------------------------------------------------

#[test]
fn set_without_fields_is_rejected() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    specforge(&dir)
        .args(["discovery", "show", "acme"])
        .assert()
        .success();
    specforge(&dir)
        .args(["discovery", "set", "acme"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nothing to update"));
}

#[test]
fn advance_without_discovery_points_at_show() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    specforge(&dir)
        .args(["discovery", "advance", "acme"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("specforge discovery show acme"));
}

#[test]
fn summary_splits_mvp_and_future_features() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    discovery_at_summary(&dir);

    let summary = json_output(specforge(&dir).args(["discovery", "summary", "acme", "--json"]));
    assert_eq!(summary["users"].as_array().unwrap().len(), 2);
    assert_eq!(summary["mvpFeatures"].as_array().unwrap().len(), 2);
    assert_eq!(summary["futureFeatures"].as_array().unwrap().len(), 1);
}

#[test]
fn confirmed_discovery_rejects_edits() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    confirmed(&dir);

    specforge(&dir)
        .args(["discovery", "add-user", "acme", "Late arrival"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already complete"));
}

#[test]
fn history_records_changed_fields() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    specforge(&dir)
        .args(["discovery", "show", "acme"])
        .assert()
        .success();
    specforge(&dir)
        .args(["discovery", "set", "acme", "--problem", "first"])
        .assert()
        .success();
    specforge(&dir)
        .args(["discovery", "set", "acme", "--problem", "second"])
        .assert()
        .success();
    specforge(&dir)
        .args(["discovery", "history", "acme"])
        .assert()
        .success()
        .stdout(predicate::str::contains("second"));
}

// ---------------------------------------------------------------------------
// specforge prd
// ---------------------------------------------------------------------------

#[test]
fn confirm_seeds_mvp_prds() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    confirmed(&dir);

    let list = json_output(specforge(&dir).args(["prd", "list", "acme", "--json"]));
    assert_eq!(list["totalCount"], 2);
    assert_eq!(list["mvpCount"], 2);
    for prd in list["prds"].as_array().unwrap() {
        assert_eq!(prd["status"], "pending");
    }
}

#[test]
fn retry_without_key_records_failed_attempt() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    confirmed(&dir);

    let list = json_output(specforge(&dir).args(["prd", "list", "acme", "--json"]));
    let id = list["prds"][0]["id"].as_str().unwrap().to_string();

    specforge(&dir)
        .args(["prd", "retry", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("generation failed (attempt 1)"));

    let prd = json_output(specforge(&dir).args(["prd", "show", &id, "--json"]));
    assert_eq!(prd["status"], "pending");
    assert_eq!(prd["generationAttempts"], 1);
}

#[test]
fn invalid_status_value_is_rejected() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    confirmed(&dir);

    let list = json_output(specforge(&dir).args(["prd", "list", "acme", "--json"]));
    let id = list["prds"][0]["id"].as_str().unwrap().to_string();

    specforge(&dir)
        .args(["prd", "status", &id, "shipped"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid status value"));
}

#[test]
fn no_active_prd_is_an_error() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    confirmed(&dir);

    specforge(&dir)
        .args(["prd", "active", "acme"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no active PRD"));
    specforge(&dir)
        .args(["prd", "clear", "acme"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No active PRD."));
}

#[test]
fn next_requires_a_ready_prd() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    confirmed(&dir);

    specforge(&dir)
        .args(["prd", "next", "acme"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no ready PRD"));
}
