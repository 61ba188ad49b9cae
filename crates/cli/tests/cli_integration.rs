//! CLI integration tests for all implemented subcommands.
//!
//! Uses `assert_cmd` to spawn the `shire` binary and verify
//! exit codes, stdout content, and stderr content.
//!
//! Every test builds its own project in a temporary directory and points
//! `--root` at it.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Helper: create a Command for the `shire` binary, running inside `dir`.
fn shire(dir: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("shire");
    cmd.current_dir(dir);
    cmd.env_remove("RUST_LOG");
    cmd
}

/// A small Kotlin/Python project plus a few scripts.
fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("src")).unwrap();
    fs::create_dir_all(root.join("scripts")).unwrap();
    fs::write(root.join("src/a.kt"), "fun a() {}\n").unwrap();
    fs::write(root.join("src/b.py"), "def b(): pass\n").unwrap();
    fs::write(root.join("src/c.kt"), "fun c() {}\n").unwrap();
    fs::write(
        root.join("scripts/review.shire"),
        "---\nname: Review Kotlin\nactionLocation: ContextMenu\nvariables:\n  files: /\\.kt$/ { sort(\"-name\") }\n---\nReview $files for $language.\n",
    )
    .unwrap();
    fs::write(
        root.join("scripts/hidden.shire"),
        "---\nactionLocation: ContextMenu\nenabled: false\n---\nnothing\n",
    )
    .unwrap();
    fs::write(
        root.join("scripts/panel.shire"),
        "---\nname: Panel\n---\nFiles: @file-func:regex(\"src/.*\\.py\")\n",
    )
    .unwrap();
    fs::write(
        root.join("scripts/broken.shire"),
        "---\nname: Broken\n---\nuses $undeclared\n",
    )
    .unwrap();
    dir
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    let dir = TempDir::new().unwrap();
    shire(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Shire script toolchain"));
}

#[test]
fn version_exits_0() {
    let dir = TempDir::new().unwrap();
    shire(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("shire"));
}

// ──────────────────────────────────────────────
// 2. parse / check
// ──────────────────────────────────────────────

#[test]
fn parse_prints_front_matter() {
    let dir = project();
    shire(dir.path())
        .args(["parse", "scripts/review.shire"])
        .assert()
        .success()
        .stdout(predicate::str::contains("name: Review Kotlin"))
        .stdout(predicate::str::contains("actionLocation: ContextMenu"))
        .stdout(predicate::str::contains("files (line 5): pattern"));
}

#[test]
fn parse_json_emits_typed_values() {
    let dir = project();
    let out = shire(dir.path())
        .args(["--output", "json", "parse", "scripts/review.shire"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let json: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(json["name"], "Review Kotlin");
    assert_eq!(json["variables"][0]["value"]["kind"], "pattern");
}

#[test]
fn check_lists_symbols() {
    let dir = project();
    shire(dir.path())
        .args(["check", "scripts/review.shire"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ok, 7 symbols"))
        .stdout(predicate::str::contains("UserDefined"));
}

#[test]
fn check_undeclared_variable_exits_1() {
    let dir = project();
    shire(dir.path())
        .args(["check", "scripts/broken.shire"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("line 4: variable 'undeclared' not found"));
}

#[test]
fn check_json_error_has_line() {
    let dir = project();
    let out = shire(dir.path())
        .args(["--output", "json", "check", "scripts/broken.shire"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    let json: serde_json::Value = serde_json::from_slice(&out.stderr).unwrap();
    assert_eq!(json["line"], 4);
}

#[test]
fn missing_file_exits_1() {
    let dir = project();
    shire(dir.path())
        .args(["check", "scripts/nope.shire"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not read"));
}

// ──────────────────────────────────────────────
// 3. run
// ──────────────────────────────────────────────

#[test]
fn run_renders_variables_and_context() {
    let dir = project();
    shire(dir.path())
        .args([
            "run",
            "scripts/review.shire",
            "--var",
            "language=Kotlin",
        ])
        .assert()
        .success()
        .stdout("Review src/c.kt, src/a.kt for Kotlin.\n");
}

#[test]
fn run_expands_inline_commands() {
    let dir = project();
    shire(dir.path())
        .args(["run", "scripts/panel.shire"])
        .assert()
        .success()
        .stdout("Files: src/b.py\n");
}

#[test]
fn run_json_includes_variables() {
    let dir = project();
    let out = shire(dir.path())
        .args(["--output", "json", "run", "scripts/review.shire"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let json: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(json["variables"]["files"], "src/c.kt, src/a.kt");
}

#[test]
fn run_with_echo_agent_streams_response() {
    let dir = project();
    fs::write(
        dir.path().join("scripts/ask.shire"),
        "---\nagent: echo\n---\nExplain $selection\n",
    )
    .unwrap();
    shire(dir.path())
        .args(["run", "scripts/ask.shire", "--var", "selection=main"])
        .assert()
        .success()
        .stdout("Explain main\n");
}

#[test]
fn run_rejects_malformed_var() {
    let dir = project();
    shire(dir.path())
        .args(["run", "scripts/review.shire", "--var", "novalue"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected KEY=VALUE"));
}

// ──────────────────────────────────────────────
// 4. exec
// ──────────────────────────────────────────────

#[test]
fn exec_regex_joins_matches() {
    let dir = project();
    shire(dir.path())
        .args(["exec", r#"regex(".*\.kt")"#])
        .assert()
        .success()
        .stdout("src/a.kt, src/c.kt\n");
}

#[test]
fn exec_unknown_function_exits_1() {
    let dir = project();
    shire(dir.path())
        .args(["exec", "foo()"])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("<SHIRE_ERROR>: Unknown function: foo"));
}

#[test]
fn exec_respects_config_ignore() {
    let dir = project();
    fs::write(dir.path().join("shire.toml"), "[index]\nignore = [\"src\"]\n").unwrap();
    shire(dir.path())
        .args(["exec", r#"regex(".*\.kt")"#])
        .assert()
        .success()
        .stdout("\n");
}

#[test]
fn invalid_config_exits_1() {
    let dir = project();
    fs::write(dir.path().join("shire.toml"), "[index\n").unwrap();
    shire(dir.path())
        .args(["exec", "regex(\"x\")"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not parse"));
}

// ──────────────────────────────────────────────
// 5. actions
// ──────────────────────────────────────────────

#[test]
fn actions_lists_enabled_scripts() {
    let dir = project();
    shire(dir.path())
        .args(["actions", "scripts"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Review Kotlin"))
        .stdout(predicate::str::contains("Panel"))
        .stdout(predicate::str::contains("hidden").not())
        .stderr(predicate::str::contains("skipping"));
}

#[test]
fn actions_filters_by_location() {
    let dir = project();
    let out = shire(dir.path())
        .args([
            "--output",
            "json",
            "actions",
            "scripts",
            "--location",
            "contextmenu",
        ])
        .output()
        .unwrap();
    assert!(out.status.success());
    let json: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let names: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Review Kotlin"]);
}

#[test]
fn verbose_logs_config_and_registration() {
    let dir = project();
    shire(dir.path())
        .args(["--verbose", "actions", "scripts"])
        .assert()
        .success()
        .stderr(predicate::str::contains("config loaded"))
        .stderr(predicate::str::contains("action registered"))
        .stdout(predicate::str::contains("config loaded").not());
}

#[test]
fn actions_unknown_location_is_rejected() {
    let dir = project();
    shire(dir.path())
        .args(["actions", "scripts", "--location", "Toolbar"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown action location"));
}
