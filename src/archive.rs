//! OLM container extraction.
//!
//! An `.olm` file is a ZIP archive. The whole tree is decompressed into a
//! scratch directory before any record is located; a container that cannot be
//! opened is the only fatal failure of a conversion run.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::error::{OlmError, Result};

/// Decompress every entry of `container` into `dest_dir`.
///
/// Entry names that would escape `dest_dir` (absolute paths, `..`) are
/// skipped with a warning. Returns the number of files written.
///
/// # Errors
///
/// - [`OlmError::FileNotFound`] if `container` does not exist.
/// - [`OlmError::InvalidContainer`] if it is not a readable ZIP archive or an
///   entry's compressed stream is corrupt.
/// - [`OlmError::Io`] if the scratch directory cannot be written.
pub fn extract_container(container: &Path, dest_dir: &Path) -> Result<usize> {
    let file = File::open(container).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            OlmError::FileNotFound(container.to_path_buf())
        } else {
            OlmError::io(container, e)
        }
    })?;

    let mut archive = ZipArchive::new(BufReader::new(file))
        .map_err(|e| OlmError::invalid_container(container, e))?;

    info!(
        path = %container.display(),
        entries = archive.len(),
        "Extracting OLM container"
    );

    let mut written = 0usize;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| OlmError::invalid_container(container, e))?;

        let Some(relative) = entry.enclosed_name() else {
            warn!(name = entry.name(), "Skipping entry with unsafe path");
            continue;
        };
        let target = dest_dir.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| OlmError::io(&target, e))?;
            continue;
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| OlmError::io(parent, e))?;
        }

        let mut out = File::create(&target).map_err(|e| OlmError::io(&target, e))?;
        std::io::copy(&mut entry, &mut out).map_err(|e| {
            // Decompression errors surface as io::Error from the entry reader.
            if e.kind() == std::io::ErrorKind::InvalidData {
                OlmError::invalid_container(container, format!("{}: {e}", entry.name()))
            } else {
                OlmError::io(&target, e)
            }
        })?;
        written += 1;
    }

    debug!(files = written, dest = %dest_dir.display(), "Container extracted");
    Ok(written)
}

/// Directory the container is decompressed into.
///
/// A `Temp` directory is removed when dropped; a `Kept` one stays on disk
/// for inspection.
#[derive(Debug)]
pub enum ScratchDir {
    Temp(tempfile::TempDir),
    Kept(PathBuf),
}

impl ScratchDir {
    /// Create a fresh scratch directory under the system temp dir.
    pub fn create(keep: bool) -> Result<Self> {
        let base = std::env::temp_dir();
        if keep {
            let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
            let path = base.join(format!("olmshell-{stamp}-{}", std::process::id()));
            std::fs::create_dir_all(&path).map_err(|e| OlmError::io(&path, e))?;
            info!(path = %path.display(), "Keeping scratch directory");
            Ok(Self::Kept(path))
        } else {
            let dir = tempfile::Builder::new()
                .prefix("olmshell-")
                .tempdir_in(&base)
                .map_err(|e| OlmError::io(&base, e))?;
            Ok(Self::Temp(dir))
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Temp(dir) => dir.path(),
            Self::Kept(path) => path,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    use super::*;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        for (name, data) in entries {
            if name.ends_with('/') {
                zip.add_directory(*name, SimpleFileOptions::default()).unwrap();
            } else {
                zip.start_file(*name, SimpleFileOptions::default()).unwrap();
                zip.write_all(data).unwrap();
            }
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_extracts_nested_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let olm = tmp.path().join("archive.olm");
        write_zip(
            &olm,
            &[
                ("Local/", b""),
                ("Local/Inbox/message_1.xml", b"<email/>"),
                ("Accounts/a/b.olk15Message", b"data"),
            ],
        );

        let dest = tmp.path().join("scratch");
        let count = extract_container(&olm, &dest).unwrap();
        assert_eq!(count, 2);
        assert_eq!(
            std::fs::read(dest.join("Local/Inbox/message_1.xml")).unwrap(),
            b"<email/>"
        );
        assert!(dest.join("Accounts/a/b.olk15Message").is_file());
    }

    #[test]
    fn test_non_archive_is_invalid_container() {
        let tmp = tempfile::tempdir().unwrap();
        let bogus = tmp.path().join("not-an-archive.olm");
        std::fs::write(&bogus, b"this is plain text, not a zip").unwrap();

        let dest = tmp.path().join("scratch");
        let err = extract_container(&bogus, &dest).unwrap_err();
        assert!(matches!(err, OlmError::InvalidContainer { .. }), "{err:?}");
        assert!(!dest.exists());
    }

    #[test]
    fn test_scratch_dir_cleanup() {
        let temp = ScratchDir::create(false).unwrap();
        let path = temp.path().to_path_buf();
        assert!(path.is_dir());
        drop(temp);
        assert!(!path.exists());

        let kept = ScratchDir::create(true).unwrap();
        let path = kept.path().to_path_buf();
        drop(kept);
        assert!(path.is_dir());
        std::fs::remove_dir_all(path).unwrap();
    }

    #[test]
    fn test_missing_container() {
        let tmp = tempfile::tempdir().unwrap();
        let err = extract_container(&tmp.path().join("missing.olm"), tmp.path()).unwrap_err();
        assert!(matches!(err, OlmError::FileNotFound(_)));
    }
}
