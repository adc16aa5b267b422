//! Reading zip archives.

use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::extract::{Member, MemberKind, Unpacker};

const S_IFMT: u32 = 0o170000;
const S_IFREG: u32 = 0o100000;
const S_IFDIR: u32 = 0o040000;

fn zip_error(archive: &Path, source: zip::result::ZipError) -> Error {
    Error::Zip {
        path: archive.to_path_buf(),
        source,
    }
}

/// Zip entries only carry a file type when written on a unix host. Entries with no type bits are
/// plain files.
fn member_kind(is_dir: bool, mode: Option<u32>) -> MemberKind {
    if is_dir {
        return MemberKind::Directory;
    }
    match mode.map(|m| m & S_IFMT) {
        None | Some(0) | Some(S_IFREG) => MemberKind::File,
        Some(S_IFDIR) => MemberKind::Directory,
        Some(_) => MemberKind::Other,
    }
}

/// Unpack every entry of the zip archive at `archive`, in central directory order.
pub(crate) fn unpack(archive: &Path, unpacker: &mut Unpacker) -> Result<()> {
    let file = fs::File::open(archive).map_err(|e| Error::fs("open", archive, e))?;
    let mut reader =
        zip::ZipArchive::new(BufReader::new(file)).map_err(|e| zip_error(archive, e))?;
    for index in 0..reader.len() {
        let entry = reader.by_index(index).map_err(|e| zip_error(archive, e))?;
        // The raw name, not `enclosed_name()`: a hostile name must fail, not be silently dropped
        let path = PathBuf::from(entry.name());
        let mode = entry.unix_mode();
        let kind = member_kind(entry.is_dir(), mode);
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
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn zip_bytes<F: FnOnce(&mut zip::ZipWriter<std::io::Cursor<Vec<u8>>>)>(build: F) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        build(&mut writer);
        writer.finish().unwrap().into_inner()
    }

    fn add_file(writer: &mut zip::ZipWriter<std::io::Cursor<Vec<u8>>>, name: &str, data: &[u8], mode: u32) {
        let options = SimpleFileOptions::default().unix_permissions(mode);
        writer.start_file(name, options).unwrap();
        writer.write_all(data).unwrap();
    }

    fn write_archive(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn kind_from_mode() {
        assert_eq!(member_kind(true, None), MemberKind::Directory);
        assert_eq!(member_kind(false, None), MemberKind::File);
        assert_eq!(member_kind(false, Some(0o644)), MemberKind::File);
        assert_eq!(member_kind(false, Some(0o100755)), MemberKind::File);
        assert_eq!(member_kind(false, Some(0o120777)), MemberKind::Other);
    }

    #[test]
    fn extract_zip_tree() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = zip_bytes(|w| {
            w.add_directory("pkg/", SimpleFileOptions::default()).unwrap();
            add_file(w, "pkg/a.txt", b"alpha", 0o644);
            add_file(w, "pkg/b/c.txt", b"gamma", 0o644);
        });
        let archive = write_archive(dir.path(), "pkg.zip", &bytes);
        let out = dir.path().join("out");
        extract(&archive, &out, &NoopReporter).unwrap();
        assert_eq!(fs::read_to_string(out.join("pkg/a.txt")).unwrap(), "alpha");
        assert_eq!(fs::read_to_string(out.join("pkg/b/c.txt")).unwrap(), "gamma");
    }

    #[test]
    fn zip_slip_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = zip_bytes(|w| {
            add_file(w, "fine.txt", b"ok", 0o644);
            add_file(w, "../escape.txt", b"pwned", 0o644);
        });
        let archive = write_archive(dir.path(), "evil.zip", &bytes);
        let out = dir.path().join("out");
        let err = extract(&archive, &out, &NoopReporter).unwrap_err();
        assert!(matches!(err, Error::PathTraversal { .. }));
        assert!(!dir.path().join("escape.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn executable_bit_is_preserved() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let bytes = zip_bytes(|w| add_file(w, "gradlew", b"#!/bin/sh\n", 0o755));
        let archive = write_archive(dir.path(), "tool.zip", &bytes);
        let out = dir.path().join("out");
        extract(&archive, &out, &NoopReporter).unwrap();
        let mode = fs::metadata(out.join("gradlew")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn corrupt_zip_is_bad_archive() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = zip_bytes(|w| add_file(w, "a.txt", b"alpha", 0o644));
        // Keep the local header magic but lose the central directory
        bytes.truncate(bytes.len() / 2);
        let archive = write_archive(dir.path(), "broken.zip", &bytes);
        let err = extract(&archive, dir.path().join("out"), &NoopReporter).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::BadArchive);
    }
}
