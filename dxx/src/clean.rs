use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use walkdir::WalkDir;

use crate::error::AppError;

/// Directories holding per-project download state.
const PROJECT_STATE_DIR: &str = ".dxx";

/// Marker in the name of a scratch workspace.
const SCRATCH_MARKER: &str = ".dxx-scratch.";

/// Scratch workspaces touched more recently than this may belong to a download still running.
const STALE_AFTER: Duration = Duration::from_secs(15 * 60);

/// Every `.dxx` directory beneath `project_dir`, outermost first. Symlinks are not followed and
/// nothing inside a match is visited.
fn project_state_dirs(project_dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut walker = WalkDir::new(project_dir).follow_links(false).into_iter();
    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("skipping unreadable entry: {e}");
                continue;
            }
        };
        if entry.depth() > 0 && entry.file_type().is_dir() && entry.file_name() == PROJECT_STATE_DIR {
            found.push(entry.into_path());
            walker.skip_current_dir();
        }
    }
    found
}

/// The most recent modification time of anything in `dir`, including `dir` itself.
fn last_modified(dir: &Path) -> Option<SystemTime> {
    WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter_map(|entry| entry.metadata().ok()?.modified().ok())
        .max()
}

fn is_stale(dir: &Path, now: SystemTime) -> bool {
    let stale = last_modified(dir)
        .and_then(|modified| now.duration_since(modified).ok())
        .is_some_and(|age| age >= STALE_AFTER);
    if !stale {
        tracing::info!(
            "keeping {}: modified recently, a download may still be using it",
            dir.display()
        );
    }
    stale
}

/// Scratch workspaces left in `sources_dir` by interrupted runs, as of `now`.
fn stale_scratch_dirs(sources_dir: &Path, now: SystemTime) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(sources_dir) else {
        return Vec::new();
    };
    let mut found: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
        .filter(|entry| entry.file_name().to_string_lossy().contains(SCRATCH_MARKER))
        .map(|entry| entry.path())
        .filter(|path| is_stale(path, now))
        .collect();
    found.sort();
    found
}

/// Remove project state and stale scratch directories. Returns what was removed.
///
/// Scratch directories modified in the last [`STALE_AFTER`] are left alone.
pub fn clean(project_dir: &Path, sources_dir: Option<&Path>) -> Result<Vec<PathBuf>, AppError> {
    let mut targets = project_state_dirs(project_dir);
    if let Some(sources_dir) = sources_dir {
        targets.extend(stale_scratch_dirs(sources_dir, SystemTime::now()));
    }
    for target in &targets {
        tracing::info!("removing {}", target.display());
        std::fs::remove_dir_all(target).map_err(|e| AppError::clean(target.clone(), e))?;
    }
    Ok(targets)
}
