//! Resolution of archive member paths against an extraction root.

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// A destination root in canonical form, against which member paths are resolved.
#[derive(Debug, Clone)]
pub struct SafeRoot {
    root: PathBuf,
}

impl SafeRoot {
    /// Canonicalise `root`, which must already exist.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        let root = std::fs::canonicalize(root).map_err(|e| Error::fs("resolve", root, e))?;
        Ok(Self { root })
    }

    /// The canonical root.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Join `member` onto the root, resolving `.` and `..` lexically. Fails if the result is not
    /// the root itself or somewhere beneath it. Absolute members are always rejected.
    pub fn resolve<P: AsRef<Path>>(&self, member: P) -> Result<PathBuf> {
        let member = member.as_ref();
        let mut resolved = self.root.clone();
        for component in member.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    resolved.pop();
                }
                Component::RootDir | Component::Prefix(_) => return Err(self.escape(member)),
            }
        }
        // `starts_with` compares whole components, so `/cache/pkg-evil` is not inside `/cache/pkg`
        if resolved.starts_with(&self.root) {
            Ok(resolved)
        } else {
            Err(self.escape(member))
        }
    }

    fn escape(&self, member: &Path) -> Error {
        Error::PathTraversal {
            member: member.to_path_buf(),
            root: self.root.clone(),
        }
    }
}

/// Resolve a single member path against `root`. Prefer [`SafeRoot`] when resolving many members,
/// as this canonicalises `root` on every call.
pub fn resolve<R: AsRef<Path>, P: AsRef<Path>>(root: R, member: P) -> Result<PathBuf> {
    SafeRoot::new(root)?.resolve(member)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> (tempfile::TempDir, SafeRoot) {
        let dir = tempfile::tempdir().unwrap();
        let root = SafeRoot::new(dir.path()).unwrap();
        (dir, root)
    }

    #[test]
    fn nested_member_stays_inside() {
        let (_dir, root) = root();
        let resolved = root.resolve("pkg-1.0/src/lib.c").unwrap();
        assert_eq!(resolved, root.path().join("pkg-1.0/src/lib.c"));
    }

    #[test]
    fn dot_segments_are_collapsed() {
        let (_dir, root) = root();
        let resolved = root.resolve("./a/./b/../c.txt").unwrap();
        assert_eq!(resolved, root.path().join("a/c.txt"));
    }

    #[test]
    fn member_resolving_to_root_is_accepted() {
        let (_dir, root) = root();
        assert_eq!(root.resolve("a/..").unwrap(), root.path());
        assert_eq!(root.resolve("./").unwrap(), root.path());
    }

    #[test]
    fn parent_escape_is_rejected() {
        let (_dir, root) = root();
        let err = root.resolve("../escape.txt").unwrap_err();
        assert!(matches!(err, Error::PathTraversal { ref member, .. }
            if member == Path::new("../escape.txt")));
    }

    #[test]
    fn deep_parent_escape_is_rejected() {
        let (_dir, root) = root();
        assert!(matches!(
            root.resolve("a/b/../../../escape.txt"),
            Err(Error::PathTraversal { .. })
        ));
    }

    #[test]
    fn sibling_with_shared_prefix_is_rejected() {
        let (_dir, root) = root();
        let name = root.path().file_name().unwrap().to_string_lossy().to_string();
        let sneaky = format!("../{name}-evil/payload");
        assert!(matches!(
            root.resolve(sneaky),
            Err(Error::PathTraversal { .. })
        ));
    }

    #[test]
    fn absolute_member_is_rejected() {
        let (_dir, root) = root();
        let absolute = if cfg!(windows) { "C:\\escape.txt" } else { "/tmp/escape.txt" };
        assert!(matches!(
            root.resolve(absolute),
            Err(Error::PathTraversal { .. })
        ));
    }

    #[test]
    fn absolute_member_inside_root_is_still_rejected() {
        let (_dir, root) = root();
        let inside = root.path().join("file.txt");
        assert!(matches!(
            root.resolve(inside),
            Err(Error::PathTraversal { .. })
        ));
    }

    #[test]
    fn missing_root_is_an_io_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve(dir.path().join("missing"), "a.txt").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::IoFailure);
    }
}
