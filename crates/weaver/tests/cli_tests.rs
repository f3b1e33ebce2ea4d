//! CLI integration tests.
//!
//! These tests exercise the CLI commands end-to-end.

use std::fs;
use std::process::{Command, Output};

fn weaver(args: &[&str], cwd: &std::path::Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_weaver"))
        .args(args)
        .arg("--print-logs")
        .current_dir(cwd)
        .env("RUST_LOG", "off")
        .output()
        .expect("Failed to execute command")
}

#[test]
fn test_help_command() {
    let temp_dir = tempfile::tempdir().unwrap();
    let output = weaver(&["--help"], temp_dir.path());

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("parse"));
    assert!(stdout.contains("serve"));
}

#[test]
fn test_parse_command_prints_json() {
    let temp_dir = tempfile::tempdir().unwrap();
    fs::write(
        temp_dir.path().join("turn.txt"),
        "Hi <boltAction type=\"shell\">ls</boltAction> bye",
    )
    .unwrap();

    let output = weaver(&["parse", "turn.txt", "--chunk-size", "3"], temp_dir.path());

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["visible"], "Hi <weaver-action id=\"parse:0\"/> bye");
    assert_eq!(report["actions"][0]["action"]["type"], "shell");
}

#[test]
fn test_parse_missing_file_fails() {
    let temp_dir = tempfile::tempdir().unwrap();
    let output = weaver(&["parse", "nope.txt"], temp_dir.path());

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("nope.txt"));
}

#[test]
fn test_config_command_shows_project_source() {
    let temp_dir = tempfile::tempdir().unwrap();
    fs::write(
        temp_dir.path().join("weaver.json"),
        r#"{ "executor": { "start_grace_ms": 750 } }"#,
    )
    .unwrap();

    let output = weaver(&["config"], temp_dir.path());

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("weaver.json"));
    assert!(stdout.contains("750"));
}

#[test]
fn test_run_command_executes_actions() {
    let temp_dir = tempfile::tempdir().unwrap();
    let project = temp_dir.path().join("project");
    fs::create_dir(&project).unwrap();
    fs::write(
        temp_dir.path().join("turn.txt"),
        concat!(
            "Writing.\n",
            "<boltAction type=\"file\" path=\"src/main.js\">console.log(1);</boltAction>\n",
            "<boltAction type=\"shell\">cp src/main.js copy.js</boltAction>\n",
        ),
    )
    .unwrap();

    let output = weaver(
        &["run", "turn.txt", "--root", project.to_str().unwrap()],
        temp_dir.path(),
    );

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(
        fs::read_to_string(project.join("copy.js")).unwrap(),
        "console.log(1);\n"
    );
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("Writing.\n"));
}

#[test]
fn test_run_command_fails_when_an_action_fails() {
    let temp_dir = tempfile::tempdir().unwrap();
    fs::write(
        temp_dir.path().join("turn.txt"),
        "<boltAction type=\"shell\">exit 3</boltAction>",
    )
    .unwrap();

    let output = weaver(
        &["run", "turn.txt", "--root", temp_dir.path().to_str().unwrap()],
        temp_dir.path(),
    );

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("1 of 1 actions failed"));
}
