//! Container format detection by content sniffing.

use std::io::Read;
use std::path::Path;

use crate::error::{Error, Result};

/// Compression wrapped around a tar stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Bzip2,
    Xz,
}

/// A container format this crate knows how to extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Tar(Compression),
    Zip,
}

impl std::fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tar(Compression::None) => write!(f, "tar"),
            Self::Tar(Compression::Gzip) => write!(f, "tar.gz"),
            Self::Tar(Compression::Bzip2) => write!(f, "tar.bz2"),
            Self::Tar(Compression::Xz) => write!(f, "tar.xz"),
            Self::Zip => write!(f, "zip"),
        }
    }
}

const TAR_BLOCK: usize = 512;

/// Identify a container from its leading bytes. At least one tar block is needed to recognise an
/// uncompressed tar.
pub fn detect_bytes(header: &[u8]) -> Option<ArchiveFormat> {
    match header {
        [b'P', b'K', 0x03, 0x04, ..] | [b'P', b'K', 0x05, 0x06, ..] | [b'P', b'K', 0x07, 0x08, ..] => {
            Some(ArchiveFormat::Zip)
        }
        [0x1F, 0x8B, ..] => Some(ArchiveFormat::Tar(Compression::Gzip)),
        [b'B', b'Z', b'h', ..] => Some(ArchiveFormat::Tar(Compression::Bzip2)),
        [0xFD, b'7', b'z', b'X', b'Z', 0x00, ..] => Some(ArchiveFormat::Tar(Compression::Xz)),
        _ if is_tar_header(header) => Some(ArchiveFormat::Tar(Compression::None)),
        _ => None,
    }
}

/// Detect the format of the file at `path` from its contents. A `.bz2` file which isn't otherwise
/// recognised is assumed to be a bzip2-compressed tar stream.
pub fn detect<P: AsRef<Path>>(path: P) -> Result<ArchiveFormat> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| Error::fs("open", path, e))?;
    let mut header = Vec::with_capacity(TAR_BLOCK);
    file.take(TAR_BLOCK as u64)
        .read_to_end(&mut header)
        .map_err(|e| Error::fs("read", path, e))?;
    if let Some(format) = detect_bytes(&header) {
        return Ok(format);
    }
    let is_bz2 = path
        .file_name()
        .map(|name| name.to_string_lossy().ends_with(".bz2"))
        .unwrap_or(false);
    if is_bz2 {
        tracing::debug!("treating {} as bzip2-compressed tar", path.display());
        Ok(ArchiveFormat::Tar(Compression::Bzip2))
    } else {
        Err(Error::UnsupportedArchive {
            path: path.to_path_buf(),
        })
    }
}

/// A tar header either carries the POSIX/GNU `ustar` magic or, for old v7 archives, at least a
/// checksum that matches the block's contents.
fn is_tar_header(block: &[u8]) -> bool {
    if block.len() < TAR_BLOCK {
        return false;
    }
    if &block[257..262] == b"ustar" {
        return true;
    }
    let Some(recorded) = parse_octal(&block[148..156]) else {
        return false;
    };
    let computed: u32 = block[..TAR_BLOCK]
        .iter()
        .enumerate()
        .map(|(i, b)| if (148..156).contains(&i) { u32::from(b' ') } else { u32::from(*b) })
        .sum();
    recorded == computed
}

fn parse_octal(field: &[u8]) -> Option<u32> {
    let text = std::str::from_utf8(field).ok()?;
    let text = text.trim_matches(|c: char| c == '\0' || c == ' ');
    if text.is_empty() {
        return None;
    }
    u32::from_str_radix(text, 8).ok()
}
