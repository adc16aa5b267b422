//! Reading tar archives, optionally compressed with gzip, bzip2 or xz.

use std::fs;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;

use crate::error::{Error, Result};
use crate::extract::{Member, MemberKind, Unpacker};
use crate::format::Compression;

/// Wrap `reader` in the decoder for `compression`.
fn decoder<R: Read + 'static>(
    reader: R,
    compression: Compression,
    archive: &Path,
) -> Result<Box<dyn Read>> {
    match compression {
        Compression::None => Ok(Box::new(reader)),
        Compression::Gzip => Ok(Box::new(GzDecoder::new(reader))),
        #[cfg(feature = "bzip2")]
        Compression::Bzip2 => Ok(Box::new(bzip2::read::BzDecoder::new(reader))),
        #[cfg(feature = "xz")]
        Compression::Xz => Ok(Box::new(xz2::read::XzDecoder::new(reader))),
        #[allow(unreachable_patterns)]
        _ => Err(Error::UnsupportedArchive {
            path: archive.to_path_buf(),
        }),
    }
}

fn member_kind(entry_type: tar::EntryType, raw_path: &[u8]) -> MemberKind {
    if entry_type.is_dir() {
        MemberKind::Directory
    } else if entry_type.is_file() {
        // v7 archives mark directories with a trailing slash rather than a type flag
        if raw_path.ends_with(b"/") {
            MemberKind::Directory
        } else {
            MemberKind::File
        }
    } else {
        MemberKind::Other
    }
}

/// Unpack every entry of the tar archive at `archive`, in archive order.
pub(crate) fn unpack(archive: &Path, compression: Compression, unpacker: &mut Unpacker) -> Result<()> {
    let file = fs::File::open(archive).map_err(|e| Error::fs("open", archive, e))?;
    let reader = decoder(BufReader::new(file), compression, archive)?;
    let mut tarball = tar::Archive::new(reader);
    let entries = tarball
        .entries()
        .map_err(|e| Error::corrupt(unpacker.archive(), e))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::corrupt(unpacker.archive(), e))?;
        let path: PathBuf = entry
            .path()
            .map_err(|e| Error::corrupt(unpacker.archive(), e))?
            .into_owned();
        let header = entry.header();
        let kind = member_kind(header.entry_type(), &entry.path_bytes());
        let mode = header.mode().ok();
        unpacker.unpack(Member {
            path,
            kind,
            mode,
            reader: entry,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract;
    use crate::progress::NoopReporter;
    use flate2::Compression as Level;
    use flate2::write::GzEncoder;

    fn append_file(builder: &mut tar::Builder<impl std::io::Write>, path: &str, data: &[u8], mode: u32) {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(mode);
        header.set_entry_type(tar::EntryType::Regular);
        builder.append_data(&mut header, path, data).unwrap();
    }

    /// `Builder::append_data` refuses `..` and absolute paths, so write the name field directly.
    fn append_raw(builder: &mut tar::Builder<impl std::io::Write>, raw_path: &[u8], data: &[u8]) {
        let mut header = tar::Header::new_old();
        header.as_old_mut().name[..raw_path.len()].copy_from_slice(raw_path);
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_cksum();
        builder.append(&header, data).unwrap();
    }

    fn tar_gz<F: FnOnce(&mut tar::Builder<GzEncoder<Vec<u8>>>)>(build: F) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Level::default()));
        build(&mut builder);
        builder.into_inner().unwrap().finish().unwrap()
    }

    fn write_archive(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn extract_tar_gz_tree() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = tar_gz(|b| {
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(tar::EntryType::Directory);
            header.set_size(0);
            header.set_mode(0o755);
            b.append_data(&mut header, "pkg-1.0/", std::io::empty()).unwrap();
            append_file(b, "pkg-1.0/a.txt", b"alpha", 0o644);
            append_file(b, "pkg-1.0/b/c.txt", b"gamma", 0o644);
        });
        let archive = write_archive(dir.path(), "pkg-1.0.tar.gz", &bytes);
        let out = dir.path().join("out");
        extract(&archive, &out, &NoopReporter).unwrap();
        assert_eq!(fs::read_to_string(out.join("pkg-1.0/a.txt")).unwrap(), "alpha");
        assert_eq!(fs::read_to_string(out.join("pkg-1.0/b/c.txt")).unwrap(), "gamma");
    }

    #[test]
    fn parent_traversal_aborts_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = tar_gz(|b| {
            append_file(b, "ok.txt", b"fine", 0o644);
            append_raw(b, b"../escape.txt", b"pwned");
            append_file(b, "never.txt", b"unreached", 0o644);
        });
        let archive = write_archive(dir.path(), "evil.tar.gz", &bytes);
        let out = dir.path().join("out");
        let err = extract(&archive, &out, &NoopReporter).unwrap_err();
        assert!(matches!(err, Error::PathTraversal { ref member, .. }
            if member == Path::new("../escape.txt")));
        assert!(!dir.path().join("escape.txt").exists());
        assert!(!out.join("never.txt").exists());
    }

    #[test]
    fn absolute_member_aborts_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("abs-escape.txt");
        let raw = target.to_string_lossy().into_owned();
        let bytes = tar_gz(|b| append_raw(b, raw.as_bytes(), b"pwned"));
        let archive = write_archive(dir.path(), "abs.tar.gz", &bytes);
        let err = extract(&archive, dir.path().join("out"), &NoopReporter).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::PathTraversal);
        assert!(!target.exists());
    }

    #[test]
    fn symlinks_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = tar_gz(|b| {
            append_file(b, "real.txt", b"data", 0o644);
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(tar::EntryType::Symlink);
            header.set_size(0);
            b.append_link(&mut header, "link.txt", "real.txt").unwrap();
        });
        let archive = write_archive(dir.path(), "links.tar.gz", &bytes);
        let out = dir.path().join("out");
        extract(&archive, &out, &NoopReporter).unwrap();
        assert!(out.join("real.txt").is_file());
        assert!(out.join("link.txt").symlink_metadata().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn executable_bit_is_preserved() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let bytes = tar_gz(|b| append_file(b, "configure", b"#!/bin/sh\n", 0o755));
        let archive = write_archive(dir.path(), "exec.tar.gz", &bytes);
        let out = dir.path().join("out");
        extract(&archive, &out, &NoopReporter).unwrap();
        let mode = fs::metadata(out.join("configure")).unwrap().permissions().mode();
        assert_ne!(mode & 0o111, 0);
    }

    #[test]
    fn truncated_archive_is_bad() {
        let dir = tempfile::tempdir().unwrap();
        let payload = vec![7u8; 64 * 1024];
        let bytes = tar_gz(|b| {
            for i in 0..10 {
                append_file(b, &format!("member-{i}.bin"), &payload, 0o644);
            }
        });
        let truncated = &bytes[..bytes.len() / 2];
        let archive = write_archive(dir.path(), "cut.tar.gz", truncated);
        let err = extract(&archive, dir.path().join("out"), &NoopReporter).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::BadArchive);
    }

    #[test]
    fn plain_tar_is_extracted() {
        let dir = tempfile::tempdir().unwrap();
        let mut builder = tar::Builder::new(Vec::new());
        append_file(&mut builder, "plain.txt", b"uncompressed", 0o644);
        let bytes = builder.into_inner().unwrap();
        let archive = write_archive(dir.path(), "download", &bytes);
        let out = dir.path().join("out");
        extract(&archive, &out, &NoopReporter).unwrap();
        assert_eq!(fs::read_to_string(out.join("plain.txt")).unwrap(), "uncompressed");
    }

    #[cfg(feature = "bzip2")]
    #[test]
    fn tar_bz2_is_extracted() {
        let dir = tempfile::tempdir().unwrap();
        let mut builder = tar::Builder::new(bzip2::write::BzEncoder::new(
            Vec::new(),
            bzip2::Compression::default(),
        ));
        append_file(&mut builder, "bz.txt", b"bzipped", 0o644);
        let bytes = builder.into_inner().unwrap().finish().unwrap();
        let archive = write_archive(dir.path(), "pkg.tar.bz2", &bytes);
        let out = dir.path().join("out");
        extract(&archive, &out, &NoopReporter).unwrap();
        assert_eq!(fs::read_to_string(out.join("bz.txt")).unwrap(), "bzipped");
    }

    #[cfg(feature = "xz")]
    #[test]
    fn tar_xz_is_extracted() {
        let dir = tempfile::tempdir().unwrap();
        let mut builder = tar::Builder::new(xz2::write::XzEncoder::new(Vec::new(), 6));
        append_file(&mut builder, "xz.txt", b"xzipped", 0o644);
        let bytes = builder.into_inner().unwrap().finish().unwrap();
        let archive = write_archive(dir.path(), "pkg.tar.xz", &bytes);
        let out = dir.path().join("out");
        extract(&archive, &out, &NoopReporter).unwrap();
        assert_eq!(fs::read_to_string(out.join("xz.txt")).unwrap(), "xzipped");
    }
}
