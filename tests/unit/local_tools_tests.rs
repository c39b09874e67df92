//! Unit tests for the workspace-rooted tool host.

use std::fs;
use std::path::Path;
use std::process::Output;
use std::sync::{Arc, Mutex};

use acp_conductor::tools::local::LocalToolHost;
use acp_conductor::tools::process::ProcessRunner;
use acp_conductor::tools::{CommandRequest, PathParams, ToolHost, WriteFileParams};
use acp_conductor::transport::BoxFuture;

fn host(root: &Path) -> LocalToolHost {
    LocalToolHost::new(root.canonicalize().unwrap())
}

#[tokio::test]
async fn write_creates_parent_directories() {
    let temp = tempfile::tempdir().expect("tempdir");
    let host = host(temp.path());

    host.write_text_file(&WriteFileParams {
        path: "nested/dir/a.txt".into(),
        content: "hi".into(),
    })
    .await
    .expect("write");

    assert_eq!(
        fs::read_to_string(temp.path().join("nested/dir/a.txt")).unwrap(),
        "hi"
    );
}

#[tokio::test]
async fn read_returns_file_text() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(temp.path().join("notes.md"), "# title\n").unwrap();
    let host = host(temp.path());

    let content = host
        .read_text_file(&PathParams {
            path: "notes.md".into(),
        })
        .await
        .expect("read");

    assert_eq!(content, "# title\n");
}

#[tokio::test]
async fn missing_file_reports_message() {
    let temp = tempfile::tempdir().expect("tempdir");
    let host = host(temp.path());

    let err = host
        .read_text_file(&PathParams {
            path: "absent.txt".into(),
        })
        .await
        .unwrap_err();

    assert!(err.contains("failed to read"), "got {err}");
}

#[tokio::test]
async fn listing_is_sorted_and_flags_directories() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(temp.path().join("b.txt"), "").unwrap();
    fs::create_dir(temp.path().join("a_dir")).unwrap();
    fs::write(temp.path().join("c.txt"), "").unwrap();
    let host = host(temp.path());

    let entries = host
        .list_directory(&PathParams { path: ".".into() })
        .await
        .expect("list");

    let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["a_dir", "b.txt", "c.txt"]);
    assert!(entries[0].is_directory);
    assert!(!entries[1].is_directory);
}

#[tokio::test]
async fn escaping_paths_never_touch_disk() {
    let temp = tempfile::tempdir().expect("tempdir");
    let workspace = temp.path().join("ws");
    fs::create_dir(&workspace).unwrap();
    let host = host(&workspace);

    let err = host
        .write_text_file(&WriteFileParams {
            path: "../escaped.txt".into(),
            content: "x".into(),
        })
        .await
        .unwrap_err();

    assert!(err.contains("path violation"), "got {err}");
    assert!(!temp.path().join("escaped.txt").exists());
}

/// Runner that records its calls and exits successfully.
#[derive(Default)]
struct RecordingRunner {
    calls: Mutex<Vec<(CommandRequest, std::path::PathBuf)>>,
}

impl ProcessRunner for RecordingRunner {
    fn run<'a>(&'a self, request: &'a CommandRequest, cwd: &'a Path) -> BoxFuture<'a, std::io::Result<Output>> {
        Box::pin(async move {
            self.calls
                .lock()
                .unwrap()
                .push((request.clone(), cwd.to_path_buf()));
            let status = successful_status();
            Ok(Output {
                status,
                stdout: b"done\n".to_vec(),
                stderr: Vec::new(),
            })
        })
    }
}

#[cfg(unix)]
fn successful_status() -> std::process::ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    std::process::ExitStatus::from_raw(0)
}

#[cfg(windows)]
fn successful_status() -> std::process::ExitStatus {
    use std::os::windows::process::ExitStatusExt;
    std::process::ExitStatus::from_raw(0)
}

#[tokio::test]
async fn command_runs_in_validated_cwd() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::create_dir(temp.path().join("sub")).unwrap();
    let root = temp.path().canonicalize().unwrap();
    let runner = Arc::new(RecordingRunner::default());
    let host = LocalToolHost::with_runner(root.clone(), runner.clone());

    let output = host
        .run_command(&CommandRequest {
            command: "make".into(),
            args: vec!["test".into()],
            cwd: Some("sub".into()),
        })
        .await
        .expect("run");

    assert!(output.id.starts_with("term-"));
    assert_eq!(output.exit_code, Some(0));
    assert_eq!(output.stdout, "done\n");
    let calls = runner.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1, root.join("sub"));
}

#[tokio::test]
async fn command_cwd_outside_workspace_is_refused() {
    let temp = tempfile::tempdir().expect("tempdir");
    let runner = Arc::new(RecordingRunner::default());
    let host = LocalToolHost::with_runner(temp.path().canonicalize().unwrap(), runner.clone());

    let err = host
        .run_command(&CommandRequest {
            command: "ls".into(),
            args: Vec::new(),
            cwd: Some("/".into()),
        })
        .await
        .unwrap_err();

    assert!(err.contains("path"), "got {err}");
    assert!(runner.calls.lock().unwrap().is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn shell_runner_captures_exit_code_and_streams() {
    let temp = tempfile::tempdir().expect("tempdir");
    let host = host(temp.path());

    let output = host
        .run_command(&CommandRequest {
            command: "echo out; echo err 1>&2; exit 3".into(),
            args: Vec::new(),
            cwd: None,
        })
        .await
        .expect("run");

    assert_eq!(output.exit_code, Some(3));
    assert_eq!(output.stdout, "out\n");
    assert_eq!(output.stderr, "err\n");
}
