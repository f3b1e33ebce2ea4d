//! Configuration loading from project directories.

use weaver_core::{Config, CoreError};
use weaver_test_utils::TestProject;

#[tokio::test]
async fn test_load_project_config() {
    let project = TestProject::new()
        .with_config(
            r#"{
                "log_level": "debug",
                "executor": { "start_grace_ms": 500 },
                "sandbox": { "workdir": "/srv/app" }
            }"#,
        )
        .build();

    let (config, sources) = Config::load(Some(project.path()))
        .await
        .expect("Failed to load config");

    assert_eq!(config.executor.start_grace_ms, 500);
    assert_eq!(config.sandbox.workdir, "/srv/app");
    assert!(sources.iter().any(|s| s.ends_with("weaver.json")));
}

#[tokio::test]
async fn test_load_jsonc_config() {
    let project = TestProject::new()
        .with_file(
            "weaver.jsonc",
            r#"{
                // Streaming off for slow sandboxes
                "parser": { "stream_file_actions": false },
                /* build into public/ */
                "executor": { "build_output_dirs": ["public"] }
            }"#,
        )
        .build();

    let (config, _) = Config::load(Some(project.path()))
        .await
        .expect("Failed to load config");

    assert!(!config.parser.stream_file_actions);
    assert_eq!(config.executor.build_output_dirs, vec!["public".to_string()]);
}

#[tokio::test]
async fn test_jsonc_wins_over_json() {
    let project = TestProject::new()
        .with_file("weaver.jsonc", r#"{ "executor": { "start_grace_ms": 1 } }"#)
        .with_file("weaver.json", r#"{ "executor": { "start_grace_ms": 2 } }"#)
        .build();

    let (config, _) = Config::load(Some(project.path())).await.unwrap();
    assert_eq!(config.executor.start_grace_ms, 1);
}

#[tokio::test]
async fn test_default_config_without_project_file() {
    let project = TestProject::new().build();

    let (config, sources) = Config::load(Some(project.path()))
        .await
        .expect("Failed to load config");

    assert!(!sources.iter().any(|s| s.starts_with(project.path())));
    assert_eq!(config.executor.build_command_shell, "sh");
}

#[tokio::test]
async fn test_invalid_project_config_is_rejected() {
    let project = TestProject::new()
        .with_config(r#"{ "sandbox": { "workdir": "relative/dir" } }"#)
        .build();

    let err = Config::load(Some(project.path())).await.unwrap_err();
    assert!(matches!(err, CoreError::Config(_)));
}

#[tokio::test]
async fn test_malformed_json_names_the_file() {
    let project = TestProject::new().with_config("{ not json").build();

    let err = Config::load(Some(project.path())).await.unwrap_err();
    assert!(err.to_string().contains("weaver.json"));
}
