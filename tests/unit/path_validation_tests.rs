//! Unit tests for workspace path validation.

use std::fs;

use acp_conductor::tools::path_safety::validate_path;
use acp_conductor::AppError;

#[test]
fn relative_path_resolves_under_root() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path().canonicalize().unwrap();

    let resolved = validate_path(&root, "src/lib.rs").expect("inside workspace");

    assert_eq!(resolved, root.join("src").join("lib.rs"));
}

#[test]
fn dot_segments_are_folded() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path().canonicalize().unwrap();

    let resolved = validate_path(&root, "./a/./b/../c.txt").expect("inside workspace");

    assert_eq!(resolved, root.join("a").join("c.txt"));
}

#[test]
fn traversal_outside_root_is_rejected() {
    let temp = tempfile::tempdir().expect("tempdir");

    let err = validate_path(temp.path(), "../outside.txt").unwrap_err();

    assert!(matches!(err, AppError::PathViolation(_)), "got {err}");
}

#[test]
fn missing_root_is_rejected() {
    let temp = tempfile::tempdir().expect("tempdir");
    let gone = temp.path().join("missing");

    assert!(matches!(
        validate_path(&gone, "a.txt"),
        Err(AppError::PathViolation(_))
    ));
}

#[cfg(unix)]
#[test]
fn symlink_escape_is_rejected() {
    let workspace = tempfile::tempdir().expect("workspace");
    let outside = tempfile::tempdir().expect("outside");
    fs::write(outside.path().join("secret.txt"), "x").unwrap();
    std::os::unix::fs::symlink(outside.path(), workspace.path().join("link")).unwrap();

    let existing = validate_path(workspace.path(), "link/secret.txt").unwrap_err();
    let new_file = validate_path(workspace.path(), "link/new.txt").unwrap_err();

    assert!(matches!(existing, AppError::PathViolation(ref m) if m.contains("symlink")));
    assert!(matches!(new_file, AppError::PathViolation(ref m) if m.contains("symlink")));
}

#[cfg(unix)]
#[test]
fn symlink_inside_workspace_is_allowed() {
    let workspace = tempfile::tempdir().expect("workspace");
    fs::create_dir(workspace.path().join("real")).unwrap();
    std::os::unix::fs::symlink(workspace.path().join("real"), workspace.path().join("alias"))
        .unwrap();

    assert!(validate_path(workspace.path(), "alias/file.txt").is_ok());
}

#[cfg(unix)]
#[test]
fn dangling_symlink_to_outside_is_rejected() {
    let workspace = tempfile::tempdir().expect("workspace");
    let outside = tempfile::tempdir().expect("outside");
    let target = outside.path().join("planted.txt");
    std::os::unix::fs::symlink(&target, workspace.path().join("trap.txt")).unwrap();

    let err = validate_path(workspace.path(), "trap.txt").unwrap_err();

    assert!(matches!(err, AppError::PathViolation(ref m) if m.contains("symlink")), "got {err}");
    assert!(!target.exists());
}

#[cfg(unix)]
#[test]
fn dangling_symlink_inside_workspace_is_allowed() {
    let workspace = tempfile::tempdir().expect("workspace");
    std::os::unix::fs::symlink("later.txt", workspace.path().join("pointer.txt")).unwrap();

    assert!(validate_path(workspace.path(), "pointer.txt").is_ok());
}

#[cfg(unix)]
#[test]
fn symlink_loop_is_rejected() {
    let workspace = tempfile::tempdir().expect("workspace");
    std::os::unix::fs::symlink("b", workspace.path().join("a")).unwrap();
    std::os::unix::fs::symlink("a", workspace.path().join("b")).unwrap();

    assert!(matches!(
        validate_path(workspace.path(), "a"),
        Err(AppError::PathViolation(_))
    ));
}
