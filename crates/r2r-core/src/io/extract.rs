//! Archive extraction and binary lookup.
//!
//! Handles tar (plain, gzip, bzip2, xz) and zip. Entries that would land
//! outside the destination are rejected.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};

use r2r_schema::AssetKind;
use thiserror::Error;
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::config::NamePattern;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Unsupported archive format: {0}")]
    UnsupportedFormat(String),

    #[error("Archive error: {0}")]
    Archive(String),
}

/// Information about an extracted file
#[derive(Debug, Clone)]
pub struct ExtractedFile {
    /// Path relative to extraction root
    pub relative_path: PathBuf,
    /// Absolute path on disk
    pub absolute_path: PathBuf,
}

/// Keep only plain path components, refusing anything that climbs out.
fn sanitize(path: &Path) -> Option<PathBuf> {
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (!clean.as_os_str().is_empty()).then_some(clean)
}

/// Extract a tar archive from a reader
fn extract_tar<R: Read>(reader: R, dest_dir: &Path) -> Result<Vec<ExtractedFile>, ExtractError> {
    fs::create_dir_all(dest_dir)?;

    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);
    let mut extracted_files = Vec::new();

    for entry in archive.entries()? {
        let mut entry = entry?;

        // Skip directories
        if entry.header().entry_type().is_dir() {
            continue;
        }

        let entry_path = entry.path()?.into_owned();
        let Some(relative_path) = sanitize(&entry_path) else {
            return Err(ExtractError::Archive(format!(
                "Invalid path in archive: {}",
                entry_path.display()
            )));
        };
        let absolute_path = dest_dir.join(&relative_path);

        if let Some(parent) = absolute_path.parent() {
            fs::create_dir_all(parent)?;
        }

        if !entry.unpack_in(dest_dir)? {
            return Err(ExtractError::Archive(format!(
                "Refused to unpack {}",
                relative_path.display()
            )));
        }

        extracted_files.push(ExtractedFile {
            relative_path,
            absolute_path,
        });
    }

    Ok(extracted_files)
}

/// Extract a zip archive
pub fn extract_zip(
    archive_path: &Path,
    dest_dir: &Path,
) -> Result<Vec<ExtractedFile>, ExtractError> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file).map_err(|e| ExtractError::Archive(e.to_string()))?;

    fs::create_dir_all(dest_dir)?;
    let mut extracted_files = Vec::new();

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| ExtractError::Archive(e.to_string()))?;
        let Some(relative_path) = file.enclosed_name() else {
            return Err(ExtractError::Archive(format!(
                "Invalid path in archive: {}",
                file.name()
            )));
        };

        if file.is_dir() {
            fs::create_dir_all(dest_dir.join(&relative_path))?;
            continue;
        }

        let absolute_path = dest_dir.join(&relative_path);
        if let Some(p) = absolute_path.parent() {
            fs::create_dir_all(p)?;
        }

        let mut outfile = File::create(&absolute_path)?;
        io::copy(&mut file, &mut outfile)?;

        #[cfg(unix)]
        if let Some(mode) = file.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&absolute_path, fs::Permissions::from_mode(mode))?;
        }

        extracted_files.push(ExtractedFile {
            relative_path,
            absolute_path,
        });
    }

    Ok(extracted_files)
}

/// Extract an archive into `dest_dir`, choosing the decoder by `kind`.
///
/// # Errors
///
/// Returns [`ExtractError::UnsupportedFormat`] for non-archive kinds and
/// [`ExtractError::Archive`] for corrupt archives or entries escaping
/// `dest_dir`.
pub fn extract(
    archive_path: &Path,
    kind: AssetKind,
    dest_dir: &Path,
) -> Result<Vec<ExtractedFile>, ExtractError> {
    let open = || -> io::Result<BufReader<File>> { Ok(BufReader::new(File::open(archive_path)?)) };

    match kind {
        AssetKind::TarGz => extract_tar(flate2::read::GzDecoder::new(open()?), dest_dir),
        AssetKind::TarBz2 => extract_tar(bzip2::read::BzDecoder::new(open()?), dest_dir),
        AssetKind::TarXz => extract_tar(xz2::read::XzDecoder::new(open()?), dest_dir),
        AssetKind::Tar => extract_tar(open()?, dest_dir),
        AssetKind::Zip => extract_zip(archive_path, dest_dir),
        AssetKind::Deb | AssetKind::Rpm | AssetKind::Binary => Err(
            ExtractError::UnsupportedFormat(archive_path.display().to_string()),
        ),
    }
}

/// Find the binary to package inside an extracted tree.
///
/// Walks `root` depth-first with entries sorted by name and returns the first
/// regular file whose name equals `name` or fully matches `pattern`.
pub fn locate_binary(root: &Path, name: &str, pattern: Option<&NamePattern>) -> Option<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .find(|entry| {
            let file_name = entry.file_name().to_string_lossy();
            file_name == name || pattern.is_some_and(|p| p.is_match(&file_name))
        })
        .map(walkdir::DirEntry::into_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn tar_gz_with(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (path, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder.append_data(&mut header, path, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[test]
    fn test_extract_tar_gz_and_locate() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("tool.tar.gz");
        fs::write(
            &archive,
            tar_gz_with(&[
                ("tool-1.0/README.md", b"docs"),
                ("tool-1.0/bin/tool", b"#!/bin/sh\necho hi\n"),
            ]),
        )
        .unwrap();

        let dest = tmp.path().join("out");
        let files = extract(&archive, AssetKind::TarGz, &dest).unwrap();
        assert_eq!(files.len(), 2);

        let found = locate_binary(&dest, "tool", None).unwrap();
        assert_eq!(found, dest.join("tool-1.0/bin/tool"));
        assert_eq!(fs::read(found).unwrap(), b"#!/bin/sh\necho hi\n");
    }

    #[test]
    fn test_locate_by_pattern_first_match_wins() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("a")).unwrap();
        fs::create_dir_all(tmp.path().join("b")).unwrap();
        fs::write(tmp.path().join("a/tool-linux-amd64"), b"1").unwrap();
        fs::write(tmp.path().join("b/tool-linux-arm64"), b"2").unwrap();

        let pattern = NamePattern::new("tool-linux-.*").unwrap();
        let found = locate_binary(tmp.path(), "tool", Some(&pattern)).unwrap();
        assert_eq!(found, tmp.path().join("a/tool-linux-amd64"));

        assert!(locate_binary(tmp.path(), "missing", None).is_none());
    }

    #[test]
    fn test_extract_zip() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("tool.zip");
        {
            let mut zip = zip::ZipWriter::new(File::create(&archive).unwrap());
            let options = zip::write::SimpleFileOptions::default().unix_permissions(0o755);
            zip.start_file("dist/tool", options).unwrap();
            zip.write_all(b"binary").unwrap();
            zip.finish().unwrap();
        }

        let dest = tmp.path().join("out");
        extract(&archive, AssetKind::Zip, &dest).unwrap();
        assert_eq!(fs::read(dest.join("dist/tool")).unwrap(), b"binary");
    }

    #[test]
    fn test_sanitize_rejects_escape() {
        assert_eq!(sanitize(Path::new("./a/b")), Some(PathBuf::from("a/b")));
        assert_eq!(sanitize(Path::new("../etc/passwd")), None);
        assert_eq!(sanitize(Path::new("/etc/passwd")), None);
    }

    #[test]
    fn test_binary_is_not_an_archive() {
        let tmp = TempDir::new().unwrap();
        let err = extract(&tmp.path().join("tool"), AssetKind::Binary, tmp.path()).unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedFormat(_)));
    }
}
