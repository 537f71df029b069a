//! The four Dockerfile tools bound to the agent.
//!
//! Every tool has two behaviours selected by [`ToolMode`]: `Placeholder`
//! answers with canned text and never touches the disk, `Workspace` reads and
//! writes real files relative to [`ToolContext::working_dir`].
//! `optimize_dockerfile` is a pass-through in both modes.
//!
//! [`ToolMode`]: dockhand_core::config::ToolMode
//! [`ToolContext::working_dir`]: dockhand_core::types::ToolContext

pub mod optimize_dockerfile;
pub mod read_dockerfile;
pub mod read_file;
pub mod write_dockerfile;

use std::path::{Component, Path, PathBuf};

use serde::de::DeserializeOwned;

use dockhand_core::error::{DockhandError, Result};

pub use optimize_dockerfile::OptimizeDockerfileTool;
pub use read_dockerfile::ReadDockerfileTool;
pub use read_file::ReadFileTool;
pub use write_dockerfile::WriteDockerfileTool;

/// Prefix shared by the optimize and write tools' answers.
pub const OPTIMIZED_PREFIX: &str = "Here is the optimized Dockerfile.";

/// Resolve `file_path` against `working_dir`, refusing anything that lands
/// outside it. The target need not exist yet; its deepest existing ancestor
/// is canonicalized so symlinks cannot escape either.
pub(crate) fn resolve_path(file_path: &str, working_dir: &Path) -> Result<PathBuf> {
    let input = Path::new(file_path);
    if input.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(DockhandError::ToolValidation(format!(
            "path traversal is not allowed: {}",
            file_path
        )));
    }

    let root = std::fs::canonicalize(working_dir)?;
    let full = root.join(input);

    let mut existing = full.as_path();
    let mut missing = Vec::new();
    let mut resolved = loop {
        match std::fs::canonicalize(existing) {
            Ok(canonical) => break canonical,
            Err(_) => match (existing.file_name(), existing.parent()) {
                (Some(name), Some(parent)) => {
                    missing.push(name.to_os_string());
                    existing = parent;
                }
                _ => {
                    return Err(DockhandError::ToolValidation(format!(
                        "cannot resolve path: {}",
                        file_path
                    )))
                }
            },
        }
    };
    for name in missing.into_iter().rev() {
        resolved.push(name);
    }

    if !resolved.starts_with(&root) {
        return Err(DockhandError::ToolValidation(format!(
            "{} is outside the working directory {}",
            file_path,
            root.display()
        )));
    }
    Ok(resolved)
}

/// Deserialize tool arguments, reporting failures as `ToolValidation`.
pub(crate) fn parse_input<T: DeserializeOwned>(input: &serde_json::Value) -> Result<T> {
    T::deserialize(input).map_err(|e| DockhandError::ToolValidation(e.to_string()))
}

/// First `n` characters of `s`, never splitting a code point.
pub fn char_prefix(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_prefix() {
        assert_eq!(char_prefix("# syntax=docker/dockerfile:1", 11), "# syntax=do");
        assert_eq!(char_prefix("short", 11), "short");
        assert_eq!(char_prefix("ééééé", 2), "éé");
    }

    #[test]
    fn test_resolve_path_inside_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let root = std::fs::canonicalize(dir.path()).unwrap();
        std::fs::write(root.join("go.mod"), "module x\n").unwrap();

        assert_eq!(resolve_path("go.mod", dir.path()).unwrap(), root.join("go.mod"));
        assert_eq!(
            resolve_path("docker/Dockerfile", dir.path()).unwrap(),
            root.join("docker/Dockerfile")
        );
        let absolute = root.join("go.mod");
        assert_eq!(
            resolve_path(absolute.to_str().unwrap(), dir.path()).unwrap(),
            absolute
        );
    }

    #[test]
    fn test_resolve_path_rejects_escapes() {
        let dir = tempfile::tempdir().unwrap();
        for escape in ["/etc/hostname", "../../../../../../etc/passwd", "sub/../../x"] {
            let err = resolve_path(escape, dir.path()).unwrap_err();
            assert!(
                matches!(err, DockhandError::ToolValidation(_)),
                "{} was not rejected",
                escape
            );
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_path_rejects_symlink_escape() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

        let err = resolve_path("link/Dockerfile", dir.path()).unwrap_err();
        assert!(matches!(err, DockhandError::ToolValidation(_)));
    }
}
