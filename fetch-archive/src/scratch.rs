//! Per-invocation staging directories.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Staging space owned by one acquisition: `download/` receives the archive and `extract/`
/// receives its members.
///
/// The workspace lives beside the destination, so moving the payload into place is a rename on
/// the same filesystem. Its name carries a random suffix, so separate invocations never share
/// scratch state. It is removed by [`ScratchWorkspace::close`], or on drop if that never happens.
#[derive(Debug)]
pub struct ScratchWorkspace {
    dir: tempfile::TempDir,
    download: PathBuf,
    extract: PathBuf,
}

impl ScratchWorkspace {
    /// Create a fresh workspace next to `dest`. The parent of `dest` is created if missing;
    /// `dest` itself is not touched.
    pub fn create<P: AsRef<Path>>(dest: P) -> Result<Self> {
        let dest = dest.as_ref();
        let parent = match dest.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).map_err(|e| Error::fs("create directory", parent, e))?;
        let stem = dest
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "archive".to_string());
        let prefix = format!(".{stem}.dxx-scratch.");
        let dir = tempfile::Builder::new()
            .prefix(&prefix)
            .tempdir_in(parent)
            .map_err(|e| Error::fs("create scratch directory in", parent, e))?;
        let download = dir.path().join("download");
        fs::create_dir(&download).map_err(|e| Error::fs("create directory", &download, e))?;
        let extract = dir.path().join("extract");
        tracing::debug!("created scratch workspace {}", dir.path().display());
        Ok(Self {
            dir,
            download,
            extract,
        })
    }

    /// The workspace root.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where the archive is downloaded to.
    pub fn download_dir(&self) -> &Path {
        &self.download
    }

    /// Where members are extracted to. Not created until extraction starts.
    pub fn extract_dir(&self) -> &Path {
        &self.extract
    }

    /// Remove the workspace and everything still in it.
    pub fn close(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir
            .close()
            .map_err(|e| Error::fs("remove scratch directory", path, e))?;
        Ok(())
    }
}
