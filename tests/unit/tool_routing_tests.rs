//! Unit tests for tool method aliasing, parameter validation and result
//! shaping.

use serde_json::{json, Value};

use acp_conductor::tools::{
    execute, CommandOutput, CommandRequest, DirEntry, PathParams, ToolHost, ToolKind, ToolParams,
    ToolResult, WriteFileParams,
};
use acp_conductor::transport::BoxFuture;

/// Host returning canned values for every tool.
struct CannedHost;

impl ToolHost for CannedHost {
    fn write_text_file<'a>(&'a self, _params: &'a WriteFileParams) -> BoxFuture<'a, ToolResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn read_text_file<'a>(&'a self, params: &'a PathParams) -> BoxFuture<'a, ToolResult<String>> {
        Box::pin(async move { Ok(format!("contents of {}", params.path)) })
    }

    fn list_directory<'a>(&'a self, _params: &'a PathParams) -> BoxFuture<'a, ToolResult<Vec<DirEntry>>> {
        Box::pin(async {
            Ok(vec![DirEntry {
                name: "src".into(),
                is_directory: true,
            }])
        })
    }

    fn run_command<'a>(&'a self, _request: &'a CommandRequest) -> BoxFuture<'a, ToolResult<CommandOutput>> {
        Box::pin(async { Err("spawn refused".to_owned()) })
    }
}

#[test]
fn every_alias_maps_to_its_kind() {
    for kind in [
        ToolKind::WriteFile,
        ToolKind::ReadFile,
        ToolKind::ListDirectory,
        ToolKind::RunCommand,
    ] {
        assert!(!kind.aliases().is_empty());
        for alias in kind.aliases() {
            assert_eq!(ToolKind::from_method(alias), Some(kind), "alias {alias}");
        }
    }
}

#[test]
fn namespaced_spellings_are_equivalent() {
    let bare = ToolKind::from_method("writeTextFile");
    assert_eq!(bare, ToolKind::from_method("fs/writeTextFile"));
    assert_eq!(bare, ToolKind::from_method("fs.writeTextFile"));
    assert_eq!(ToolKind::from_method("terminal/create"), Some(ToolKind::RunCommand));
}

#[test]
fn unknown_methods_are_not_tools() {
    assert_eq!(ToolKind::from_method("session/update"), None);
    assert_eq!(ToolKind::from_method("fs/deleteFile"), None);
    assert_eq!(ToolKind::from_method("WRITETEXTFILE"), None);
}

#[test]
fn params_must_match_the_kind() {
    let ok = ToolParams::parse(
        ToolKind::WriteFile,
        json!({"sessionId": "s1", "path": "a.txt", "content": "hi"}),
    )
    .unwrap();
    assert_eq!(
        ok,
        ToolParams::WriteFile(WriteFileParams {
            path: "a.txt".into(),
            content: "hi".into(),
        })
    );

    assert!(ToolParams::parse(ToolKind::WriteFile, json!({"path": "a.txt"})).is_err());
    assert!(ToolParams::parse(ToolKind::ReadFile, json!({"path": 5})).is_err());
    assert!(ToolParams::parse(ToolKind::RunCommand, Value::Null).is_err());
}

#[test]
fn command_params_default_args() {
    let parsed = ToolParams::parse(ToolKind::RunCommand, json!({"command": "ls -la"})).unwrap();
    let ToolParams::RunCommand(request) = parsed else {
        panic!("expected command params");
    };
    assert!(request.args.is_empty());
    assert_eq!(request.cwd, None);
}

#[tokio::test]
async fn results_are_shaped_per_kind() {
    let host = CannedHost;

    let write = ToolParams::parse(ToolKind::WriteFile, json!({"path": "a", "content": ""})).unwrap();
    assert_eq!(execute(&host, &write).await, Ok(json!({})));

    let read = ToolParams::parse(ToolKind::ReadFile, json!({"path": "a"})).unwrap();
    assert_eq!(execute(&host, &read).await, Ok(json!({"content": "contents of a"})));

    let list = ToolParams::parse(ToolKind::ListDirectory, json!({"path": "."})).unwrap();
    assert_eq!(
        execute(&host, &list).await,
        Ok(json!({"entries": [{"name": "src", "isDirectory": true}]}))
    );

    let run = ToolParams::parse(ToolKind::RunCommand, json!({"command": "true"})).unwrap();
    assert_eq!(execute(&host, &run).await, Err("spawn refused".to_owned()));
}
