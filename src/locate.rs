//! Locating message records inside an extracted OLM tree.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

/// Top-level directories that hold mail folders, searched in this order.
pub const RECORD_ROOTS: [&str; 2] = ["Local", "Accounts"];

/// Legacy per-version record suffixes.
const RECORD_SUFFIXES: [&str; 2] = [".olk15Message", ".olk14Message"];

/// Return every candidate record file below the recognized roots of `root_dir`.
///
/// Roots that do not exist are ignored; if none exists the result is empty.
/// With `sorted`, directory entries are visited in file-name order so the
/// sequence (and therefore output numbering) is reproducible across
/// filesystems. Unreadable directory entries are logged and skipped.
pub fn locate_records(root_dir: &Path, sorted: bool) -> Vec<PathBuf> {
    let mut records = Vec::new();

    for name in RECORD_ROOTS {
        let base = root_dir.join(name);
        if !base.is_dir() {
            debug!(root = %base.display(), "Record root not present");
            continue;
        }

        let walker = if sorted {
            WalkDir::new(&base).sort_by_file_name()
        } else {
            WalkDir::new(&base)
        };

        for entry in walker.follow_links(false) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(root = %base.display(), error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            if entry.file_type().is_file() && is_record_name(&entry.file_name().to_string_lossy())
            {
                records.push(entry.into_path());
            }
        }
    }

    debug!(count = records.len(), "Located records");
    records
}

/// `true` if a file name follows one of the record naming conventions.
pub fn is_record_name(name: &str) -> bool {
    RECORD_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
        || (name.starts_with("message_") && name.ends_with(".xml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_record_names() {
        assert!(is_record_name("0001.olk15Message"));
        assert!(is_record_name("old.olk14Message"));
        assert!(is_record_name("message_12.xml"));
        assert!(!is_record_name("message_12.txt"));
        assert!(!is_record_name("contact_1.xml"));
        assert!(!is_record_name("Categories.xml"));
        assert!(!is_record_name("x.olk15Contact"));
        assert!(!is_record_name("olk15Message"));
    }

    #[test]
    fn test_suffix_only_names_are_records() {
        assert!(is_record_name(".olk15Message"));
        assert!(is_record_name(".olk14Message"));

        let tmp = tempfile::tempdir().unwrap();
        touch(&tmp.path().join("Local/Inbox/.olk15Message"));
        assert_eq!(
            locate_records(tmp.path(), true),
            vec![tmp.path().join("Local/Inbox/.olk15Message")]
        );
    }

    #[test]
    fn test_locate_sorted_local_before_accounts() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        touch(&root.join("Accounts/acct/Inbox/message_2.xml"));
        touch(&root.join("Local/b/z.olk15Message"));
        touch(&root.join("Local/a/message_1.xml"));
        touch(&root.join("Local/a/notes.txt"));
        touch(&root.join("Other/message_9.xml"));

        let found = locate_records(root, true);
        let rel: Vec<_> = found
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            rel,
            vec![
                PathBuf::from("Local/a/message_1.xml"),
                PathBuf::from("Local/b/z.olk15Message"),
                PathBuf::from("Accounts/acct/Inbox/message_2.xml"),
            ]
        );
    }

    #[test]
    fn test_locate_without_roots_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        touch(&tmp.path().join("Misc/message_1.xml"));
        assert!(locate_records(tmp.path(), true).is_empty());
    }
}
