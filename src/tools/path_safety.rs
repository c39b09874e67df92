//! Workspace path validation and symlink-escape detection.
//!
//! Every tool path is resolved against the workspace root before use.
//! `..` segments are folded lexically, absolute paths must already lie
//! inside the root, and the nearest existing ancestor is canonicalised so
//! a symlink cannot lead outside the workspace, even for a file that does
//! not exist yet. A dangling symlink is followed by hand, since a write
//! through it would create its target.

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::{AppError, Result};

/// Dangling links followed before a path is given up as unresolvable.
const MAX_LINK_HOPS: usize = 8;

/// Validate that `candidate` resides within `workspace_root`.
///
/// Relative candidates are joined onto the root. Returns the resolved
/// absolute path on success.
///
/// # Errors
///
/// Returns `AppError::PathViolation` if:
/// - The workspace root cannot be canonicalized.
/// - The candidate contains `..` segments that climb above the root.
/// - The resolved path does not start with the workspace root.
/// - An existing ancestor is a symlink whose target escapes the workspace,
///   including a dangling one.
pub fn validate_path(workspace_root: &Path, candidate: impl AsRef<Path>) -> Result<PathBuf> {
    let root = workspace_root
        .canonicalize()
        .map_err(|err| AppError::PathViolation(format!("workspace root invalid: {err}")))?;

    let resolved = fold_within(&root, candidate.as_ref())?;
    check_links(&root, &resolved, MAX_LINK_HOPS)?;
    Ok(resolved)
}

/// Join `candidate` onto `root` and fold `.`/`..` without touching disk.
fn fold_within(root: &Path, candidate: &Path) -> Result<PathBuf> {
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    };

    let mut resolved = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::ParentDir => {
                if !resolved.pop() || !resolved.starts_with(root) {
                    return Err(AppError::PathViolation(
                        "path attempts to escape workspace".into(),
                    ));
                }
            }
            Component::CurDir => {}
            other => resolved.push(other),
        }
    }

    if !resolved.starts_with(root) {
        return Err(AppError::PathViolation(format!(
            "path outside workspace: {}",
            candidate.display()
        )));
    }
    Ok(resolved)
}

/// Check that the nearest on-disk entry of `resolved` stays under `root`.
fn check_links(root: &Path, resolved: &Path, hops: usize) -> Result<()> {
    // `symlink_metadata` also sees dangling links, which `exists` skips.
    let anchor = resolved
        .ancestors()
        .find(|p| p.symlink_metadata().is_ok())
        .unwrap_or(root);

    match anchor.canonicalize() {
        Ok(canonical) if canonical.starts_with(root) => Ok(()),
        Ok(_) => Err(escape()),
        Err(_) if hops > 0 && is_symlink(anchor) => {
            let link = fs::read_link(anchor)
                .map_err(|err| AppError::PathViolation(format!("cannot read link: {err}")))?;
            let base = anchor
                .parent()
                .unwrap_or(root)
                .canonicalize()
                .map_err(|err| AppError::PathViolation(format!("cannot resolve path: {err}")))?;
            let target = fold_within(root, &base.join(link)).map_err(|_| escape())?;
            let next = match resolved.strip_prefix(anchor) {
                Ok(rest) if !rest.as_os_str().is_empty() => target.join(rest),
                _ => target,
            };
            check_links(root, &next, hops - 1)
        }
        Err(err) => Err(AppError::PathViolation(format!(
            "cannot resolve path: {err}"
        ))),
    }
}

fn is_symlink(path: &Path) -> bool {
    path.symlink_metadata()
        .is_ok_and(|meta| meta.file_type().is_symlink())
}

fn escape() -> AppError {
    AppError::PathViolation("symlink target escapes workspace".into())
}
