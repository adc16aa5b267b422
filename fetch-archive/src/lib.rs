#![allow(rustdoc::redundant_explicit_links)]
//! Download source archives and unpack them safely into a dependency cache.
//!
//! An archive is streamed into a private scratch directory, checked to be a real tar or zip
//! container, extracted with every member path confined to the extraction root, and then moved
//! into its destination. A single wrapping directory (`pkg-1.0/...`) is collapsed so the
//! destination holds the package's contents directly. The scratch directory is removed however
//! the acquisition ends, and the destination is only touched once everything else has succeeded.
//!
//! # Features
//!
//! - `http` (default): fetch over HTTP(S) with [`reqwest`]. Without it, supply your own
//!   [`Transport`].
//! - `bzip2` (default): extract `.tar.bz2` archives.
//! - `xz` (default): extract `.tar.xz` archives.
//!
//! Gzip-compressed and plain tar archives and zip archives are always supported.
//!
//! [`reqwest`]: https://crates.io/crates/reqwest
//!
//! # Usage
//!
//! Fetch an archive into a cache directory:
//!
//! ```no_run
//! use fetch_archive::{ArchiveSource, Fetcher, NoopReporter};
//!
//! let source = ArchiveSource::new("https://zlib.net/zlib-1.3.1.tar.gz")?;
//! let artefact = Fetcher::new().acquire_into(&source, "/tmp/sources", &NoopReporter)?;
//! assert_eq!(artefact.path(), std::path::Path::new("/tmp/sources/zlib-1.3.1"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Resolve archive members against an extraction root:
//!
//! ```rust
//! use fetch_archive::{ErrorKind, SafeRoot};
//!
//! let root = SafeRoot::new(std::env::temp_dir())?;
//! assert!(root.resolve("pkg/src/main.c")?.starts_with(root.path()));
//! assert_eq!(root.resolve("../etc/passwd").unwrap_err().kind(), ErrorKind::PathTraversal);
//! # Ok::<(), fetch_archive::Error>(())
//! ```
//!
//! # Errors
//!
//! Every failure of the pipeline is an [`Error`] whose [`kind`](Error::kind) is one of
//! [`ErrorKind::Network`], [`ErrorKind::BadArchive`], [`ErrorKind::PathTraversal`] or
//! [`ErrorKind::IoFailure`]. Problems with a URL are reported as a [`SourceError`] when the
//! [`ArchiveSource`] is built, before anything is fetched.
//!

mod acquire;
pub mod config;
mod error;
mod extract;
pub mod format;
pub mod layout;
mod progress;
mod safe_path;
mod scratch;
mod source;
mod tar;
mod transport;
mod zip;

#[doc(inline)]
pub use crate::acquire::{Artefact, DEFAULT_TIMEOUT, Fetcher, Stage};
#[doc(inline)]
pub use crate::error::{Error, ErrorKind, Result};
#[doc(inline)]
pub use crate::extract::extract;
#[doc(inline)]
pub use crate::progress::{MemberAction, NoopReporter, Reporter};
#[doc(inline)]
pub use crate::safe_path::{SafeRoot, resolve};
#[doc(inline)]
pub use crate::scratch::ScratchWorkspace;
#[doc(inline)]
pub use crate::source::{ARCHIVE_SUFFIXES, ArchiveSource, SourceError, strip_archive_suffix};
#[cfg(feature = "http")]
#[doc(inline)]
pub use crate::transport::HttpTransport;
#[doc(inline)]
pub use crate::transport::{CHUNK_SIZE, Response, Transport};
