use std::path::PathBuf;
use std::process::ExitCode;

use fetch_archive::config::ConfigError;

/// Categories of application errors that can be matched on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppErrorKind {
    /// Argument validation errors
    ArgValidation,
    /// A package name that isn't configured, or a URL that can't be fetched
    Lookup,
    /// General IO errors
    IO,
    /// Configuration file reading or parsing errors
    Config,
    /// Source fetching errors
    /// Used to indicate that errors occurred during fetching; these errors are reported immediately,
    /// so this variant only exists to produce the correct `ExitCode`.
    Fetch,
    /// Output serialisation errors
    Output,
    /// Cache cleaning errors
    Clean,
}

/// Internal error type that contains all application error variants.
#[derive(Debug, thiserror::Error)]
pub enum AppErrorInner {
    #[error("Argument error: {0}")]
    ArgValidation(String),
    #[error(transparent)]
    Lookup(ConfigError),
    #[error(transparent)]
    IO(#[from] std::io::Error),
    #[error(transparent)]
    Config(ConfigError),
    #[error("Failed to fetch one or more source(s)")]
    Fetch,
    #[error("failed to format output as {format}: {message}")]
    Output {
        format: &'static str,
        message: String,
    },
    #[error("failed to remove {}", path.display())]
    Clean {
        path: PathBuf,
        #[source]
        err: std::io::Error,
    },
}

/// The main application-level error type. This represents all top-level application errors we'd
/// want to report to the user. We don't use `anyhow::{Context, Error}` for this as we still care
/// about the concrete error type (for the exit code). In particular, the `Fetch` variant is only
/// used to indicate that errors occurred during fetching - these errors are reported immediately
/// rather than being returned, so this variant only exists to produce the correct `ExitCode`.
///
/// This type uses the newtype pattern to wrap a boxed inner error, reducing stack size.
#[derive(Debug)]
pub struct AppError(Box<AppErrorInner>, AppErrorKind);

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl AppError {
    /// Create a new AppError with the given inner error and kind
    pub fn new(inner: AppErrorInner, kind: AppErrorKind) -> Self {
        Self(Box::new(inner), kind)
    }

    /// Get the error kind for pattern matching
    pub fn error_kind(&self) -> &AppErrorKind {
        &self.1
    }

    /// Create an argument validation error
    pub fn arg_validation(msg: String) -> Self {
        Self::new(AppErrorInner::ArgValidation(msg), AppErrorKind::ArgValidation)
    }

    /// Create a fetch error
    pub fn fetch() -> Self {
        Self::new(AppErrorInner::Fetch, AppErrorKind::Fetch)
    }

    /// Create an output formatting error
    pub fn output(format: &'static str, err: impl std::fmt::Display) -> Self {
        Self::new(
            AppErrorInner::Output {
                format,
                message: err.to_string(),
            },
            AppErrorKind::Output,
        )
    }

    /// Create a cache cleaning error
    pub fn clean(path: PathBuf, err: std::io::Error) -> Self {
        Self::new(AppErrorInner::Clean { path, err }, AppErrorKind::Clean)
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::UnknownPackage { .. } | ConfigError::Source { .. } => {
                Self::new(AppErrorInner::Lookup(err), AppErrorKind::Lookup)
            }
            ConfigError::Read { .. } | ConfigError::Parse { .. } => {
                Self::new(AppErrorInner::Config(err), AppErrorKind::Config)
            }
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::new(AppErrorInner::IO(err), AppErrorKind::IO)
    }
}

impl From<AppError> for ExitCode {
    fn from(error: AppError) -> Self {
        ExitCode::from(match error.error_kind() {
            AppErrorKind::Fetch => 1,
            AppErrorKind::ArgValidation | AppErrorKind::Lookup => 2,
            _ => 3,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_errors_are_argument_errors() {
        let err = AppError::from(ConfigError::UnknownPackage {
            name: "sdl2".to_string(),
            available: vec![],
        });
        assert_eq!(err.error_kind(), &AppErrorKind::Lookup);
        assert_eq!(ExitCode::from(err), ExitCode::from(2));
    }

    #[test]
    fn fetch_failures_exit_with_one() {
        assert_eq!(ExitCode::from(AppError::fetch()), ExitCode::from(1));
    }

    #[test]
    fn io_errors_exit_with_three() {
        let err = AppError::from(std::io::Error::other("disk on fire"));
        assert_eq!(ExitCode::from(err), ExitCode::from(3));
    }
}
