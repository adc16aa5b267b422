//! Extraction of tar and zip containers into a destination root.
//!
//! Every member path is checked with [`SafeRoot`] before anything is written, and the first member
//! that would land outside the root aborts the whole extraction. Symlinks, hard links and device
//! nodes are skipped without error.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::format::{self, ArchiveFormat};
use crate::progress::{MemberAction, Reporter};
use crate::safe_path::SafeRoot;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// What an archive member is, as far as extraction cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MemberKind {
    Directory,
    File,
    /// Symlinks, hard links, devices, fifos and anything else that isn't a plain file.
    Other,
}

/// One entry read from a container.
pub(crate) struct Member<R> {
    pub path: PathBuf,
    pub kind: MemberKind,
    pub mode: Option<u32>,
    pub reader: R,
}

/// Writes members beneath a root, keeping track of what was written.
pub(crate) struct Unpacker<'a> {
    root: SafeRoot,
    archive: &'a Path,
    reporter: &'a dyn Reporter,
    written: usize,
    skipped: usize,
}

impl<'a> Unpacker<'a> {
    fn new(root: SafeRoot, archive: &'a Path, reporter: &'a dyn Reporter) -> Self {
        Self {
            root,
            archive,
            reporter,
            written: 0,
            skipped: 0,
        }
    }

    /// The archive being read, for error reporting.
    pub fn archive(&self) -> &Path {
        self.archive
    }

    pub fn unpack<R: Read>(&mut self, member: Member<R>) -> Result<()> {
        let Member {
            path,
            kind,
            mode,
            mut reader,
        } = member;
        let target = self.root.resolve(&path)?;
        match kind {
            MemberKind::Directory => {
                if target.symlink_metadata().is_ok_and(|meta| !meta.is_dir()) {
                    return Err(self.conflict(&path, "a file"));
                }
                self.reporter.member(MemberAction::Creating, &path);
                fs::create_dir_all(&target).map_err(|e| Error::fs("create directory", &target, e))?;
            }
            MemberKind::File => {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent).map_err(|e| Error::fs("create directory", parent, e))?;
                }
                let action = match target.symlink_metadata() {
                    Ok(meta) if meta.is_dir() => return Err(self.conflict(&path, "a directory")),
                    Ok(_) => {
                        // A previous member may have been read-only, so remove rather than truncate
                        fs::remove_file(&target).map_err(|e| Error::fs("replace", &target, e))?;
                        MemberAction::Replacing
                    }
                    Err(_) => MemberAction::Extracting,
                };
                self.reporter.member(action, &path);
                let size = self.write_file(&mut reader, &target)?;
                if let Some(mode) = mode {
                    set_permissions(&target, mode)?;
                }
                tracing::trace!("{action}: {} ({size} bytes)", path.display());
            }
            MemberKind::Other => {
                tracing::debug!("skipping non-regular member {}", path.display());
                self.skipped += 1;
                return Ok(());
            }
        }
        self.written += 1;
        Ok(())
    }

    /// An earlier member already put `existing` at this member's path.
    fn conflict(&self, member: &Path, existing: &str) -> Error {
        Error::corrupt(
            self.archive,
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!(
                    "member '{}' clashes with {existing} from an earlier member",
                    member.display()
                ),
            ),
        )
    }

    /// Stream a member's bytes to `target`. Read failures mean the archive is bad, write failures
    /// are the filesystem's.
    fn write_file<R: Read>(&self, reader: &mut R, target: &Path) -> Result<u64> {
        let mut out = fs::File::create(target).map_err(|e| Error::fs("create", target, e))?;
        let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
        let mut total = 0u64;
        loop {
            let n = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::corrupt(self.archive, e)),
            };
            out.write_all(&buffer[..n])
                .map_err(|e| Error::fs("write", target, e))?;
            total += n as u64;
        }
        out.flush().map_err(|e| Error::fs("write", target, e))?;
        Ok(total)
    }
}

#[cfg(unix)]
fn set_permissions(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mode = mode & 0o7777;
    if mode == 0 {
        return Ok(());
    }
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|e| Error::fs("set permissions on", path, e))
}

#[cfg(not(unix))]
fn set_permissions(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

/// Extract `archive` into `dest_root`, creating it if needed, and return the directory now
/// holding the extracted tree.
///
/// The container format is detected from the file's contents. On error, whatever was already
/// written stays in `dest_root`; callers are expected to extract into scratch space.
pub fn extract<A, D>(archive: A, dest_root: D, reporter: &dyn Reporter) -> Result<PathBuf>
where
    A: AsRef<Path>,
    D: AsRef<Path>,
{
    let archive = archive.as_ref();
    let dest_root = dest_root.as_ref();
    let format = format::detect(archive)?;
    fs::create_dir_all(dest_root).map_err(|e| Error::fs("create directory", dest_root, e))?;
    let root = SafeRoot::new(dest_root)?;
    tracing::debug!("extracting {format} archive {}", archive.display());
    let mut unpacker = Unpacker::new(root, archive, reporter);
    match format {
        ArchiveFormat::Tar(compression) => crate::tar::unpack(archive, compression, &mut unpacker)?,
        ArchiveFormat::Zip => crate::zip::unpack(archive, &mut unpacker)?,
    }
    tracing::debug!(
        "extracted {} member(s), skipped {}",
        unpacker.written,
        unpacker.skipped
    );
    Ok(dest_root.to_path_buf())
}
