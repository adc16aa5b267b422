use std::path::PathBuf;

/// Broad categories of failure, for callers deciding whether to retry or give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Connection failure, timeout or a non-success HTTP status.
    Network,
    /// The downloaded file is not a supported container, or it is corrupt.
    BadArchive,
    /// An archive member would be written outside the destination root.
    PathTraversal,
    /// A filesystem operation failed.
    IoFailure,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::BadArchive => write!(f, "bad archive"),
            Self::PathTraversal => write!(f, "path traversal"),
            Self::IoFailure => write!(f, "i/o failure"),
        }
    }
}

/// The main error enum for this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to download {url}")]
    Network {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("server returned status {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("unrecognised archive format: {}", path.display())]
    UnsupportedArchive { path: PathBuf },

    #[error("corrupt archive: {}", path.display())]
    CorruptArchive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt zip archive: {}", path.display())]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("archive member '{}' escapes destination {}", member.display(), root.display())]
    PathTraversal { member: PathBuf, root: PathBuf },

    #[error("failed to {action} {}", path.display())]
    Fs {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The category this error falls into.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network { .. } | Self::HttpStatus { .. } => ErrorKind::Network,
            Self::UnsupportedArchive { .. } | Self::CorruptArchive { .. } | Self::Zip { .. } => {
                ErrorKind::BadArchive
            }
            Self::PathTraversal { .. } => ErrorKind::PathTraversal,
            Self::Fs { .. } | Self::Io(_) => ErrorKind::IoFailure,
        }
    }

    pub(crate) fn fs<P: Into<PathBuf>>(action: &'static str, path: P, source: std::io::Error) -> Self {
        Self::Fs {
            action,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt<P: Into<PathBuf>>(path: P, source: std::io::Error) -> Self {
        Self::CorruptArchive {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn network<U, E>(url: U, source: E) -> Self
    where
        U: Into<String>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Network {
            url: url.into(),
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
