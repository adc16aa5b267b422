//! Remote archives and the names they are stored under.

use std::path::{Component, Path, PathBuf};

/// Archive suffixes stripped from a file name to get a source's default name. Multi-part suffixes
/// come first so `.tar.gz` wins over `.gz`.
pub const ARCHIVE_SUFFIXES: &[&str] = &[
    ".tar.gz", ".tar.bz2", ".tar.xz", ".tgz", ".tbz2", ".txz", ".zip",
];

/// Errors encountered when describing a source, before anything is fetched.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The URL could not be parsed.
    #[error("invalid url '{url}'")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// Only `http` and `https` URLs can be fetched.
    #[error("unsupported url scheme '{scheme}' in '{url}': expected http or https")]
    UnsupportedScheme { url: String, scheme: String },

    /// The URL path has no final segment to use as a file name.
    #[error("url '{url}' does not name a file")]
    NoFileName { url: String },

    /// The name can't be used as a single directory name.
    #[error("'{name}' is not a valid source name")]
    InvalidName { name: String },
}

/// A remote archive and the logical name it is stored under.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ArchiveSource {
    url: String,
    name: String,
    #[serde(skip)]
    file_name: String,
}

impl ArchiveSource {
    /// A source named after its archive, e.g. `zlib-1.3.1` for `.../zlib-1.3.1.tar.gz`.
    pub fn new<S: AsRef<str>>(url: S) -> Result<Self, SourceError> {
        let (url, file_name) = parse_url(url.as_ref())?;
        let name = strip_archive_suffix(&file_name).to_string();
        check_name(&name)?;
        Ok(Self {
            url,
            name,
            file_name,
        })
    }

    /// A source with an explicit name, such as a package name from configuration.
    pub fn named<S: AsRef<str>, N: Into<String>>(url: S, name: N) -> Result<Self, SourceError> {
        let (url, file_name) = parse_url(url.as_ref())?;
        let name = name.into();
        check_name(&name)?;
        Ok(Self {
            url,
            name,
            file_name,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// The directory name the extracted archive is stored under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The last segment of the URL path.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Where this source lives beneath `dir`.
    pub fn dest_in<P: AsRef<Path>>(&self, dir: P) -> PathBuf {
        dir.as_ref().join(&self.name)
    }
}

impl std::fmt::Display for ArchiveSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.url)
    }
}

fn parse_url(raw: &str) -> Result<(String, String), SourceError> {
    let parsed = url::Url::parse(raw).map_err(|source| SourceError::InvalidUrl {
        url: raw.to_string(),
        source,
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(SourceError::UnsupportedScheme {
            url: raw.to_string(),
            scheme: parsed.scheme().to_string(),
        });
    }
    let file_name = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .ok_or_else(|| SourceError::NoFileName {
            url: raw.to_string(),
        })?
        .to_string();
    if !is_single_component(&file_name) {
        return Err(SourceError::NoFileName {
            url: raw.to_string(),
        });
    }
    Ok((parsed.to_string(), file_name))
}

/// Strip a known archive suffix, or failing that the last extension.
pub fn strip_archive_suffix(file_name: &str) -> &str {
    if let Some(stem) = ARCHIVE_SUFFIXES
        .iter()
        .find_map(|suffix| file_name.strip_suffix(suffix))
    {
        return stem;
    }
    Path::new(file_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(file_name)
}

fn is_single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains(['/', '\\'])
}

fn check_name(name: &str) -> Result<(), SourceError> {
    if is_single_component(name) {
        Ok(())
    } else {
        Err(SourceError::InvalidName {
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_strips_multi_part_suffix() {
        let source = ArchiveSource::new("https://zlib.net/zlib-1.3.1.tar.gz").unwrap();
        assert_eq!(source.name(), "zlib-1.3.1");
        assert_eq!(source.file_name(), "zlib-1.3.1.tar.gz");
    }

    #[test]
    fn known_suffixes() {
        assert_eq!(strip_archive_suffix("a.tar.bz2"), "a");
        assert_eq!(strip_archive_suffix("a.tar.xz"), "a");
        assert_eq!(strip_archive_suffix("a.tgz"), "a");
        assert_eq!(strip_archive_suffix("a-1.0.zip"), "a-1.0");
        assert_eq!(strip_archive_suffix("a.tar"), "a");
        assert_eq!(strip_archive_suffix("release.7z"), "release");
        assert_eq!(strip_archive_suffix("noext"), "noext");
    }

    #[test]
    fn named_source_keeps_url_file_name() {
        let source =
            ArchiveSource::named("https://www.libsdl.org/release/SDL2-2.28.5.tar.gz", "sdl2")
                .unwrap();
        assert_eq!(source.name(), "sdl2");
        assert_eq!(source.file_name(), "SDL2-2.28.5.tar.gz");
        assert_eq!(source.dest_in("/cache"), PathBuf::from("/cache/sdl2"));
    }

    #[test]
    fn query_string_is_not_part_of_file_name() {
        let source = ArchiveSource::new("https://example.com/dl/pkg.zip?token=abc").unwrap();
        assert_eq!(source.file_name(), "pkg.zip");
        assert_eq!(source.name(), "pkg");
    }

    #[test]
    fn invalid_url_fails() {
        assert!(matches!(
            ArchiveSource::new("not a url"),
            Err(SourceError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn non_http_scheme_fails() {
        assert!(matches!(
            ArchiveSource::new("ftp://example.com/pkg.tar.gz"),
            Err(SourceError::UnsupportedScheme { .. })
        ));
    }

    #[test]
    fn url_without_file_fails() {
        assert!(matches!(
            ArchiveSource::new("https://example.com/"),
            Err(SourceError::NoFileName { .. })
        ));
    }

    #[test]
    fn path_like_names_are_rejected() {
        for name in ["..", "a/b", "", "."] {
            assert!(
                matches!(
                    ArchiveSource::named("https://example.com/a.zip", name),
                    Err(SourceError::InvalidName { .. })
                ),
                "{name:?} should be rejected"
            );
        }
    }
}
