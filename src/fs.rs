//! Path-sandboxed filesystem helpers
//!
//! The broker writes journal files named after wire-supplied topic names, so
//! every path is resolved through a [`Sandbox`] rooted at the data
//! directory. Paths that are absolute or climb out of the root are refused
//! before any filesystem call is made.

use std::io;
use std::path::{Component, Path, PathBuf};

/// A directory the broker is allowed to create files in
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
}

impl Sandbox {
    /// Open a sandbox rooted at `root`, creating the directory if needed
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative path inside the sandbox
    ///
    /// Rejects absolute paths and any `..` component. The check is lexical;
    /// the sandbox never follows the contents of the path on disk.
    pub fn resolve(&self, rel: impl AsRef<Path>) -> io::Result<PathBuf> {
        let rel = rel.as_ref();
        let mut resolved = self.root.clone();
        for component in rel.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(io::Error::new(
                        io::ErrorKind::PermissionDenied,
                        format!("path escapes sandbox: {}", rel.display()),
                    ));
                }
            }
        }
        Ok(resolved)
    }

    /// Create (or truncate) a file, creating missing parent directories
    pub fn create_file(&self, rel: impl AsRef<Path>) -> io::Result<PathBuf> {
        let path = self.resolve(rel)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::File::create(&path)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_file_truncates_and_confines() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = Sandbox::new(dir.path().join("data")).unwrap();

        let path = sandbox.create_file("weather").unwrap();
        assert!(path.exists());
        assert!(path.starts_with(sandbox.root()));

        // Re-creating an existing file clears its contents.
        std::fs::write(&path, "stale contents").unwrap();
        sandbox.create_file("weather").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_nested_paths_create_parents() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = Sandbox::new(dir.path()).unwrap();
        let path = sandbox.create_file("a/b/topic").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_escape_attempts_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = Sandbox::new(dir.path().join("data")).unwrap();

        assert!(sandbox.resolve("../outside").is_err());
        assert!(sandbox.resolve("a/../../outside").is_err());
        assert!(sandbox.resolve("/etc/passwd").is_err());
        assert!(sandbox.create_file("../escape").is_err());
    }

    #[test]
    fn test_curdir_components_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = Sandbox::new(dir.path()).unwrap();
        let path = sandbox.resolve("./topic").unwrap();
        assert_eq!(path, dir.path().join("topic"));
    }
}
