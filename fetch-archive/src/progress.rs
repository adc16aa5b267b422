//! Hooks through which the pipeline reports what it's doing.

use std::path::Path;

/// What happened to an archive member as it was written to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberAction {
    /// A directory was created.
    Creating,
    /// A file was written to a new path.
    Extracting,
    /// A file overwrote an existing path.
    Replacing,
}

impl std::fmt::Display for MemberAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Creating => write!(f, "creating"),
            Self::Extracting => write!(f, "extracting"),
            Self::Replacing => write!(f, "replace"),
        }
    }
}

/// Receives progress and log events. Every method defaults to doing nothing, so implementors only
/// override what they render.
pub trait Reporter {
    /// A transfer began. `total` is the server-reported size, if any.
    fn download_started(&self, _description: &str, _total: Option<u64>) {}

    /// `current` bytes have been received so far. Never decreases.
    fn download_progress(&self, _current: u64) {}

    /// The transfer finished successfully.
    fn download_finished(&self) {}

    /// An archive member was handled. `member` is the path as recorded in the archive.
    fn member(&self, _action: MemberAction, _member: &Path) {}

    /// The payload is now in place at `dest`.
    fn extracted(&self, _dest: &Path) {}
}

/// A [`Reporter`] that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl Reporter for NoopReporter {}

