//! Moving an extracted tree into its destination.
//!
//! Many archives wrap everything in one top-level directory (`pkg-1.0/...`). When that is the
//! only entry, its contents are the payload and the wrapper is thrown away. Otherwise the whole
//! extracted tree is the payload.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

fn list(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)
        .map_err(|e| Error::fs("read directory", dir, e))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| Error::fs("read directory", dir, e))?;
    entries.sort();
    Ok(entries)
}

fn is_real_dir(path: &Path) -> bool {
    path.symlink_metadata()
        .map(|meta| meta.is_dir())
        .unwrap_or(false)
}

/// Absent, or an empty directory, so the payload can be renamed onto it in one step.
fn is_vacant(dest: &Path) -> Result<bool> {
    match dest.symlink_metadata() {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
        Err(e) => Err(Error::fs("inspect", dest, e)),
        Ok(meta) if meta.is_dir() => Ok(list(dest)?.is_empty()),
        Ok(_) => Ok(false),
    }
}

type Mover = dyn Fn(&Path, &Path) -> std::io::Result<()>;

/// Renames applied to the destination so far, so they can be undone.
struct Swap<'a> {
    mover: &'a Mover,
    /// `(original location, parked location)` of entries moved out of the destination.
    displaced: Vec<(PathBuf, PathBuf)>,
    /// `(location in the destination, where it came from)` of payload entries moved in.
    installed: Vec<(PathBuf, PathBuf)>,
}

impl<'a> Swap<'a> {
    fn new(mover: &'a Mover) -> Self {
        Self {
            mover,
            displaced: Vec::new(),
            installed: Vec::new(),
        }
    }

    fn park(&mut self, from: &Path, to: PathBuf) -> Result<()> {
        (self.mover)(from, &to).map_err(|e| Error::fs("move aside", from, e))?;
        self.displaced.push((from.to_path_buf(), to));
        Ok(())
    }

    fn install(&mut self, from: &Path, to: &Path) -> Result<()> {
        (self.mover)(from, to).map_err(|e| Error::fs("move", from, e))?;
        self.installed.push((to.to_path_buf(), from.to_path_buf()));
        Ok(())
    }

    /// Put the destination back the way it was.
    fn undo(self) {
        let moves = self.installed.into_iter().rev().chain(
            self.displaced
                .into_iter()
                .rev()
                .map(|(original, parked)| (parked, original)),
        );
        for (from, to) in moves {
            if let Err(e) = (self.mover)(&from, &to) {
                tracing::warn!(
                    "failed to restore {} from {}: {e}",
                    to.display(),
                    from.display()
                );
            }
        }
    }
}

/// Move the payload of `extracted` into `dest` and return `dest`. `extracted` no longer exists
/// afterwards. Entries already in `dest` that share a name with a payload entry are replaced
/// rather than merged into; other entries are left alone.
///
/// Entries being replaced are first moved aside next to `extracted`, so if any move fails the
/// ones already made are undone and `dest` is left as it was found.
///
/// Not safe to run twice on the same extracted tree.
pub fn normalize<S, D>(extracted: S, dest: D) -> Result<PathBuf>
where
    S: AsRef<Path>,
    D: AsRef<Path>,
{
    normalize_with(extracted.as_ref(), dest.as_ref(), &|from: &Path, to: &Path| {
        fs::rename(from, to)
    })
}

fn normalize_with(extracted: &Path, dest: &Path, mover: &Mover) -> Result<PathBuf> {
    let top_level = list(extracted)?;
    let payload = match top_level.as_slice() {
        [only] if is_real_dir(only) => {
            tracing::debug!("collapsing wrapper directory {}", only.display());
            only.clone()
        }
        _ => extracted.to_path_buf(),
    };

    let staging = match extracted.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let aside = tempfile::Builder::new()
        .prefix(".displaced.")
        .tempdir_in(staging)
        .map_err(|e| Error::fs("create directory in", staging, e))?;

    let mut swap = Swap::new(mover);
    if let Err(e) = move_into_place(&payload, dest, aside.path(), &mut swap) {
        swap.undo();
        return Err(e);
    }

    // Anything still in `aside` is what the payload replaced
    let aside_path = aside.path().to_path_buf();
    if let Err(e) = aside.close() {
        tracing::warn!("failed to remove {}: {e}", aside_path.display());
    }
    if extracted.symlink_metadata().is_ok() {
        fs::remove_dir_all(extracted).map_err(|e| Error::fs("remove", extracted, e))?;
    }
    Ok(dest.to_path_buf())
}

fn move_into_place(payload: &Path, dest: &Path, aside: &Path, swap: &mut Swap<'_>) -> Result<()> {
    if is_vacant(dest)? {
        if dest.symlink_metadata().is_ok() {
            swap.park(dest, aside.join("dest"))?;
        } else if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::fs("create directory", parent, e))?;
        }
        return swap.install(payload, dest);
    }
    for (index, entry) in list(payload)?.into_iter().enumerate() {
        let Some(name) = entry.file_name() else {
            continue;
        };
        let target = dest.join(name);
        if target.symlink_metadata().is_ok() {
            tracing::debug!("replacing {}", target.display());
            swap.park(&target, aside.join(index.to_string()))?;
        }
        swap.install(&entry, &target)?;
    }
    Ok(())
}
