//! The download, extract and install pipeline.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::extract::extract;
use crate::layout::normalize;
use crate::progress::Reporter;
use crate::scratch::ScratchWorkspace;
use crate::source::ArchiveSource;
#[cfg(feature = "http")]
use crate::transport::HttpTransport;
use crate::transport::Transport;

/// Network stall timeout used unless one is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Where an acquisition has got to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Downloading,
    Downloaded,
    Extracting,
    Normalizing,
    Done,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Downloading => write!(f, "downloading"),
            Self::Downloaded => write!(f, "downloaded"),
            Self::Extracting => write!(f, "extracting"),
            Self::Normalizing => write!(f, "normalizing"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// An archive that has been fetched and installed.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Artefact {
    source: ArchiveSource,
    path: PathBuf,
    size: u64,
}

impl Artefact {
    pub fn source(&self) -> &ArchiveSource {
        &self.source
    }

    /// The destination directory now holding the archive's contents.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes downloaded.
    pub fn size(&self) -> u64 {
        self.size
    }
}

impl AsRef<Path> for Artefact {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

impl AsRef<ArchiveSource> for Artefact {
    fn as_ref(&self) -> &ArchiveSource {
        &self.source
    }
}

/// Fetches archives into destination directories.
///
/// Each acquisition stages its work in a fresh [`ScratchWorkspace`] beside the destination. The
/// destination is only touched once the archive has been fully downloaded and extracted, and the
/// workspace is removed however the acquisition ends. There is no retry; a failed acquisition
/// can simply be run again.
#[derive(Debug, Clone)]
pub struct Fetcher<T> {
    transport: T,
    timeout: Duration,
}

#[cfg(feature = "http")]
impl Fetcher<HttpTransport> {
    /// A fetcher using HTTP(S) and [`DEFAULT_TIMEOUT`].
    pub fn new() -> Self {
        Self::with_transport(HttpTransport::new())
    }
}

#[cfg(feature = "http")]
impl Default for Fetcher<HttpTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> Fetcher<T> {
    pub fn with_transport(transport: T) -> Self {
        Self {
            transport,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set how long connecting, or waiting for the next piece of the response, may take.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fetch `source` into `parent/<name>`.
    pub fn acquire_into<P: AsRef<Path>>(
        &self,
        source: &ArchiveSource,
        parent: P,
        reporter: &dyn Reporter,
    ) -> Result<Artefact> {
        self.acquire(source, source.dest_in(parent), reporter)
    }

    /// Download `source`, extract it and move its contents into `dest`.
    ///
    /// On failure `dest` is left exactly as it was. Running this again for the same source and
    /// destination replaces what the previous run installed.
    pub fn acquire<P: AsRef<Path>>(
        &self,
        source: &ArchiveSource,
        dest: P,
        reporter: &dyn Reporter,
    ) -> Result<Artefact> {
        let dest = dest.as_ref();
        let scratch = ScratchWorkspace::create(dest)?;
        let scratch_path = scratch.path().to_path_buf();
        let result = self.run(source, dest, &scratch, reporter);
        match (result, scratch.close()) {
            (Ok(artefact), Err(e)) => {
                tracing::warn!(
                    "{}: failed to clean up {}: {e}",
                    source.name(),
                    scratch_path.display()
                );
                Ok(artefact)
            }
            (Err(e), Err(cleanup)) => {
                tracing::warn!(
                    "{}: failed to clean up {}: {cleanup}",
                    source.name(),
                    scratch_path.display()
                );
                Err(e)
            }
            (result, Ok(())) => {
                tracing::debug!("{}: removed {}", source.name(), scratch_path.display());
                result
            }
        }
    }

    fn run(
        &self,
        source: &ArchiveSource,
        dest: &Path,
        scratch: &ScratchWorkspace,
        reporter: &dyn Reporter,
    ) -> Result<Artefact> {
        enter(source, Stage::Downloading);
        let (archive, size) = self.download(source, scratch.download_dir(), reporter)?;
        enter(source, Stage::Downloaded);

        enter(source, Stage::Extracting);
        let extracted = extract(&archive, scratch.extract_dir(), reporter)?;
        if let Err(e) = fs::remove_file(&archive) {
            tracing::warn!("failed to remove {}: {e}", archive.display());
        }

        enter(source, Stage::Normalizing);
        let path = normalize(&extracted, dest)?;

        enter(source, Stage::Done);
        reporter.extracted(&path);
        Ok(Artefact {
            source: source.clone(),
            path,
            size,
        })
    }

    /// Stream the archive to `<file>.tmp` in `dir`, then rename it to `<file>`.
    fn download(
        &self,
        source: &ArchiveSource,
        dir: &Path,
        reporter: &dyn Reporter,
    ) -> Result<(PathBuf, u64)> {
        let archive = dir.join(source.file_name());
        let partial = dir.join(format!("{}.tmp", source.file_name()));
        let response = self.transport.get(source.url(), self.timeout)?;
        reporter.download_started(source.name(), response.content_length);

        let mut out = fs::File::create(&partial).map_err(|e| Error::fs("create", &partial, e))?;
        let mut received = 0u64;
        for chunk in response.body {
            let chunk = chunk.map_err(|e| Error::network(source.url(), e))?;
            if chunk.is_empty() {
                continue;
            }
            out.write_all(&chunk)
                .map_err(|e| Error::fs("write", &partial, e))?;
            received += chunk.len() as u64;
            reporter.download_progress(received);
        }
        out.sync_all().map_err(|e| Error::fs("write", &partial, e))?;
        drop(out);
        reporter.download_finished();

        match response.content_length {
            Some(expected) if expected != received => tracing::debug!(
                "{}: server advertised {expected} bytes but sent {received}",
                source.name()
            ),
            _ => {}
        }
        fs::rename(&partial, &archive).map_err(|e| Error::fs("move", &partial, e))?;
        Ok((archive, received))
    }
}

fn enter(source: &ArchiveSource, stage: Stage) {
    tracing::debug!("{}: {stage}", source.name());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopReporter;
    use crate::transport::Response;

    type Body = Vec<std::io::Result<Vec<u8>>>;

    /// Serves one scripted response.
    struct Scripted(std::sync::Mutex<Option<(Body, Option<u64>)>>);

    impl Transport for Scripted {
        fn get(&self, _url: &str, _timeout: Duration) -> Result<Response> {
            let (chunks, length) = self.0.lock().unwrap().take().unwrap();
            Ok(Response::from_chunks(length, chunks))
        }
    }

    fn fetcher(chunks: Body, length: Option<u64>) -> Fetcher<Scripted> {
        Fetcher::with_transport(Scripted(std::sync::Mutex::new(Some((chunks, length)))))
    }

    fn source() -> ArchiveSource {
        ArchiveSource::new("https://example.com/pkg.tar.gz").unwrap()
    }

    #[test]
    fn download_skips_empty_chunks_and_renames() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(
            vec![Ok(b"ab".to_vec()), Ok(Vec::new()), Ok(b"cd".to_vec())],
            Some(4),
        );
        let (path, size) = fetcher
            .download(&source(), dir.path(), &NoopReporter)
            .unwrap();
        assert_eq!(path, dir.path().join("pkg.tar.gz"));
        assert_eq!(size, 4);
        assert_eq!(fs::read(&path).unwrap(), b"abcd");
        assert!(!dir.path().join("pkg.tar.gz.tmp").exists());
    }

    #[test]
    fn length_mismatch_is_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(vec![Ok(b"abc".to_vec())], Some(1000));
        let (_, size) = fetcher
            .download(&source(), dir.path(), &NoopReporter)
            .unwrap();
        assert_eq!(size, 3);
    }

    #[test]
    fn interrupted_body_is_a_network_error() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(
            vec![
                Ok(b"abc".to_vec()),
                Err(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "reset",
                )),
            ],
            None,
        );
        let err = fetcher
            .download(&source(), dir.path(), &NoopReporter)
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Network);
        assert!(!dir.path().join("pkg.tar.gz").exists());
    }

    #[test]
    fn stages_display() {
        assert_eq!(Stage::Downloading.to_string(), "downloading");
        assert_eq!(Stage::Done.to_string(), "done");
    }
}
