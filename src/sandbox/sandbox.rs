//! Enforces the `file()` project-scope rule: every resolved path must be a
//! canonicalized descendant of `CMAKE_SOURCE_DIR` or `CMAKE_BINARY_DIR`.
//! Rejects `..` traversal in the requested path text and symlink escapes
//! once the target exists. Violations are reported to the caller as
//! `FsError::SecurityViolation`, which `evaluator::commands::file_cmd`
//! turns into an `EV_DIAGNOSTIC` with cause `"Security Violation: ..."`.
//!
//! A small guard type in front of the filesystem trait, mirroring how the
//! rest of this crate puts a narrow checked wrapper in front of anything
//! that touches the outside world.

use crate::fs::{FileSystem, FsError};

pub struct Sandbox {
    source_dir: String,
    binary_dir: String,
}

impl Sandbox {
    /// `source_dir`/`binary_dir` are canonicalized once at construction
    /// (falling back to the as-given string if the directory doesn't exist
    /// yet, e.g. a fresh build tree).
    pub fn new(fs: &dyn FileSystem, source_dir: &str, binary_dir: &str) -> Self {
        Self {
            source_dir: fs
                .realpath(source_dir)
                .unwrap_or_else(|_| lexical_normalize(source_dir)),
            binary_dir: fs
                .realpath(binary_dir)
                .unwrap_or_else(|_| lexical_normalize(binary_dir)),
        }
    }

    /// Resolves `requested_path` against `base_dir` and verifies the result
    /// stays within the project scope. Returns the resolved absolute path
    /// on success.
    pub fn enforce(
        &self,
        fs: &dyn FileSystem,
        base_dir: &str,
        requested_path: &str,
    ) -> Result<String, FsError> {
        if has_parent_traversal(requested_path) {
            return Err(FsError::SecurityViolation {
                message: format!(
                    "path '{requested_path}' escapes the project via '..' traversal"
                ),
            });
        }

        let absolute = fs.resolve_path(base_dir, requested_path);
        let normalized = lexical_normalize(&absolute);
        if !self.is_in_scope(&normalized) {
            return Err(FsError::SecurityViolation {
                message: format!(
                    "path '{requested_path}' resolves outside CMAKE_SOURCE_DIR/CMAKE_BINARY_DIR"
                ),
            });
        }

        if fs.exists(&normalized) {
            if let Ok(real) = fs.realpath(&normalized) {
                if !self.is_in_scope(&real) {
                    return Err(FsError::SecurityViolation {
                        message: format!(
                            "path '{requested_path}' is a symlink that escapes the project scope"
                        ),
                    });
                }
                return Ok(real);
            }
        }

        Ok(normalized)
    }

    fn is_in_scope(&self, path: &str) -> bool {
        is_descendant(path, &self.source_dir) || is_descendant(path, &self.binary_dir)
    }
}

fn has_parent_traversal(path: &str) -> bool {
    path.split('/').any(|segment| segment == "..")
}

fn is_descendant(path: &str, root: &str) -> bool {
    path == root || path.starts_with(&format!("{}/", root.trim_end_matches('/')))
}

/// Collapse `.`/`..` components without touching the filesystem (no
/// symlink resolution — that's `realpath`'s job, called separately when
/// the target exists).
fn lexical_normalize(path: &str) -> String {
    let is_absolute = path.starts_with('/');
    let mut stack: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            other => stack.push(other),
        }
    }
    let joined = stack.join("/");
    if is_absolute {
        format!("/{joined}")
    } else {
        joined
    }
}
