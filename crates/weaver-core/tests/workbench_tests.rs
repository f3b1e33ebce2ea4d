//! End-to-end turns through the workbench against a local sandbox.

use std::sync::Arc;
use weaver_core::{ActionKind, ActionStatus, Workbench};
use weaver_test_utils::assertions::{assert_all_complete, assert_file_equals};
use weaver_test_utils::fixtures::transcripts;
use weaver_test_utils::{cumulative_chunks, RecordingAlertSink, RecordingDeploymentSink, TestProject};

struct Harness {
    bench: Workbench,
    alerts: RecordingAlertSink,
    deployments: RecordingDeploymentSink,
}

fn harness(project: &weaver_test_utils::fixtures::BuiltTestProject) -> Harness {
    let alerts = RecordingAlertSink::new();
    let deployments = RecordingDeploymentSink::new();
    let bench = Workbench::new(
        project.session(),
        &project.config(),
        Arc::new(alerts.clone()),
        Arc::new(deployments.clone()),
    );
    Harness {
        bench,
        alerts,
        deployments,
    }
}

async fn run_turn(bench: &mut Workbench, turn_id: &str, text: &str, chunk_size: usize) -> String {
    let mut visible = String::new();
    for chunk in cumulative_chunks(text, chunk_size) {
        visible.push_str(&bench.feed(turn_id, chunk));
    }
    visible.push_str(&bench.finish(turn_id, text).await);
    visible
}

#[tokio::test]
async fn test_scaffold_turn_applies_every_action() {
    let project = TestProject::new().build();
    let mut h = harness(&project);

    let visible = run_turn(&mut h.bench, "trn_1", transcripts::SCAFFOLD, 16).await;

    assert_eq!(
        visible,
        concat!(
            "I'll set up the project.\n\n",
            "<weaver-action id=\"trn_1:0\"/>\n",
            "<weaver-action id=\"trn_1:1\"/>\n",
            "<weaver-action id=\"trn_1:2\"/>\n",
            "All set."
        )
    );
    assert_all_complete(h.bench.registry());
    assert_file_equals(
        &project.path().join("src/app.js"),
        "export const greeting = 'hello, world';\n",
    );
    assert_file_equals(
        &project.path().join("app.copy.js"),
        "export const greeting = 'hello, world';\n",
    );
    assert!(h.alerts.is_empty());
    h.bench.shutdown().await;
}

#[tokio::test]
async fn test_visible_text_does_not_depend_on_chunking() {
    let mut outputs = Vec::new();
    for chunk_size in [1, 5, 64, transcripts::SCAFFOLD.len()] {
        let project = TestProject::new().build();
        let mut h = harness(&project);
        outputs.push(run_turn(&mut h.bench, "trn_c", transcripts::SCAFFOLD, chunk_size).await);
        h.bench.shutdown().await;
    }
    assert!(outputs.windows(2).all(|pair| pair[0] == pair[1]));
}

#[tokio::test]
async fn test_failed_modify_leaves_file_untouched() {
    let original = "<html><title>Home</title></html>\n";
    let project = TestProject::new().with_file("index.html", original).build();
    let mut h = harness(&project);

    run_turn(&mut h.bench, "trn_2", transcripts::BAD_MODIFY, 32).await;

    let records = h.bench.registry().snapshot();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].action.kind(), ActionKind::Modify);
    assert!(matches!(records[0].status, ActionStatus::Failed { .. }));
    assert_file_equals(&project.path().join("index.html"), original);
    h.bench.shutdown().await;
}

#[tokio::test]
async fn test_build_turn_deploys_output_dir() {
    let project = TestProject::new().with_node_project("demo").build();
    let mut h = harness(&project);

    run_turn(&mut h.bench, "trn_3", transcripts::BUILD, 8).await;

    assert_all_complete(h.bench.registry());
    let builds = h.deployments.builds();
    assert_eq!(builds.len(), 1);
    assert_eq!(builds[0].path, "/home/project/dist");
    assert_eq!(builds[0].exit_code, 0);
    assert!(builds[0].output.contains("built"));
    assert!(project.dir_exists("dist"));
    h.bench.shutdown().await;
}

#[tokio::test]
async fn test_dev_server_settles_after_grace() {
    let project = TestProject::new().build();
    let mut h = harness(&project);

    run_turn(&mut h.bench, "trn_4", transcripts::DEV_SERVER, 64).await;

    assert_all_complete(h.bench.registry());
    assert!(h.alerts.is_empty());
}

#[tokio::test]
async fn test_failed_command_alerts_and_turn_continues() {
    let project = TestProject::new().build();
    let mut h = harness(&project);
    let text = concat!(
        "<boltAction type=\"shell\">echo nope && exit 2</boltAction>\n",
        "<boltAction type=\"file\" path=\"after.txt\">still here</boltAction>\n",
    );

    run_turn(&mut h.bench, "trn_5", text, 10).await;

    let records = h.bench.registry().snapshot();
    assert!(matches!(records[0].status, ActionStatus::Failed { .. }));
    assert_eq!(records[1].status, ActionStatus::Complete);
    assert_eq!(project.read_file("after.txt"), "still here\n");

    let alerts = h.alerts.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].title, "Command Failed");
    assert!(alerts[0].content.contains("nope"));
    h.bench.shutdown().await;
}

#[tokio::test]
async fn test_turns_number_actions_independently() {
    let project = TestProject::new().build();
    let mut h = harness(&project);
    let text = "<boltAction type=\"file\" path=\"a.txt\">a</boltAction>";

    let first = run_turn(&mut h.bench, "trn_a", text, 4).await;
    let second = run_turn(&mut h.bench, "trn_b", text, 4).await;

    assert_eq!(first, "<weaver-action id=\"trn_a:0\"/>");
    assert_eq!(second, "<weaver-action id=\"trn_b:0\"/>");
    assert_eq!(h.bench.registry().snapshot().len(), 2);
    h.bench.shutdown().await;
}
