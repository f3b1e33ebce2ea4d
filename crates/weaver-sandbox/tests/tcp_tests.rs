//! Remote sessions against a local sandbox served over TCP.

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use weaver_sandbox::{LocalSandbox, SandboxConfig, SandboxSession, TextEncoding};
use weaver_test_utils::TestProject;

async fn serve(sandbox: LocalSandbox) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move { sandbox.serve_listener(listener).await });
    addr
}

#[tokio::test]
async fn test_remote_session_reads_and_writes() {
    let project = TestProject::new()
        .with_file("README.md", "# demo\n")
        .build();
    let addr = serve(LocalSandbox::from_config(&project.sandbox_config()).unwrap()).await;

    let session = SandboxSession::new(SandboxConfig {
        url: Some(addr),
        ..Default::default()
    });
    let client = session.client().await.unwrap();

    assert_eq!(
        client
            .read_text("README.md", TextEncoding::Utf8)
            .await
            .unwrap(),
        "# demo\n"
    );
    client.mkdir("src/lib", true).await.unwrap();
    client
        .write_text("/home/project/src/lib/a.js", "export {};\n")
        .await
        .unwrap();
    assert_eq!(project.read_file("src/lib/a.js"), "export {};\n");

    let entries = client.readdir_with_types("src").await.unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].is_dir());
}

#[tokio::test]
async fn test_remote_session_authenticates() {
    let project = TestProject::new().build();
    let sandbox = LocalSandbox::from_config(&project.sandbox_config())
        .unwrap()
        .with_token("s3cret");
    let addr = serve(sandbox).await;

    let denied = SandboxSession::new(SandboxConfig {
        url: Some(addr.clone()),
        auth_token: Some("wrong".to_string()),
        ..Default::default()
    });
    let err = denied.client().await.err().unwrap();
    assert_eq!(err.code(), Some("EACCES"));

    let allowed = SandboxSession::new(SandboxConfig {
        url: Some(addr),
        auth_token: Some("s3cret".to_string()),
        ..Default::default()
    });
    let client = allowed.client().await.unwrap();
    client.write_text("ok.txt", "ok").await.unwrap();
    assert!(project.file_exists("ok.txt"));
}

#[tokio::test]
async fn test_remote_shell_runs_in_workdir() {
    let project = TestProject::new().with_file("hello.txt", "hi").build();
    let addr = serve(LocalSandbox::from_config(&project.sandbox_config()).unwrap()).await;
    let session = SandboxSession::new(SandboxConfig {
        url: Some(addr),
        ..Default::default()
    });

    let shell = session.shell().await.unwrap();
    let output = shell
        .execute_command("cat hello.txt", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(output.exit_code, 0);
    assert!(output.output.contains("hi"));
    session.close();
}

#[tokio::test]
async fn test_unreachable_sandbox_fails_to_connect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let session = SandboxSession::new(SandboxConfig {
        url: Some(addr),
        ..Default::default()
    });
    assert!(session.client().await.is_err());
}
