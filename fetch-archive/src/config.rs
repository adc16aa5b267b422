//! Project configuration read from `dxx.toml`.
//!
//! ```toml
//! [package_name]
//! sdl2 = "https://www.libsdl.org/release/SDL2-2.28.5.tar.gz"
//!
//! [download]
//! dir = "/custom/cache"
//! timeout = 60
//! ```
//!
//! Both tables are optional, and other tables are ignored.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::source::{ArchiveSource, SourceError};

/// The configuration file looked for in a project directory.
pub const CONFIG_FILE: &str = "dxx.toml";

/// Errors encountered when loading configuration or looking up a package.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration in {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// The name is neither a URL nor a configured package.
    #[error("package '{name}' not found in the configuration{}", available_hint(available))]
    UnknownPackage {
        name: String,
        available: Vec<String>,
    },

    #[error("package '{name}' has an unusable url")]
    Source {
        name: String,
        #[source]
        source: SourceError,
    },
}

fn available_hint(available: &[String]) -> String {
    if available.is_empty() {
        String::new()
    } else {
        format!("; available packages are: {}", available.join(", "))
    }
}

/// The `[download]` table.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct DownloadSettings {
    /// Root of the download cache.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    /// Network stall timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

/// The contents of `dxx.toml`.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct Config {
    #[serde(default)]
    package_name: BTreeMap<String, String>,
    #[serde(default)]
    download: DownloadSettings,
}

impl Config {
    /// Load `dxx.toml` from `dir`. A missing file is an empty configuration. A relative
    /// `download.dir` is taken relative to `dir`.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self, ConfigError> {
        let path = dir.as_ref().join(CONFIG_FILE);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("no {} found, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };
        tracing::debug!("loading configuration from {}", path.display());
        let mut config: Self =
            toml::from_str(&text).map_err(|source| ConfigError::Parse { path, source })?;
        if let Some(download_dir) = config.download.dir.as_mut() {
            if download_dir.is_relative() {
                *download_dir = dir.as_ref().join(&*download_dir);
            }
        }
        Ok(config)
    }

    /// Configured packages, by name.
    pub fn packages(&self) -> &BTreeMap<String, String> {
        &self.package_name
    }

    pub fn download_settings(&self) -> &DownloadSettings {
        &self.download
    }

    /// The configured download cache, if any.
    pub fn download_dir(&self) -> Option<&Path> {
        self.download.dir.as_deref()
    }

    /// The configured network stall timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.download.timeout.map(Duration::from_secs)
    }

    /// Turn a command-line argument into a source. Arguments starting with `http://` or
    /// `https://` are used directly; anything else must name a configured package, and the
    /// package name is used as the source name.
    pub fn resolve(&self, package_or_url: &str) -> Result<ArchiveSource, ConfigError> {
        if is_url(package_or_url) {
            return ArchiveSource::new(package_or_url).map_err(|source| ConfigError::Source {
                name: package_or_url.to_string(),
                source,
            });
        }
        let url = self
            .package_name
            .get(package_or_url)
            .ok_or_else(|| ConfigError::UnknownPackage {
                name: package_or_url.to_string(),
                available: self.package_name.keys().cloned().collect(),
            })?;
        tracing::debug!("found url for '{package_or_url}': {url}");
        ArchiveSource::named(url, package_or_url).map_err(|source| ConfigError::Source {
            name: package_or_url.to_string(),
            source,
        })
    }
}

fn is_url(arg: &str) -> bool {
    arg.starts_with("http://") || arg.starts_with("https://")
}

/// Where extracted sources are kept beneath a download cache.
pub fn sources_dir<P: AsRef<Path>>(download_dir: P) -> PathBuf {
    download_dir.as_ref().join("sources")
}
