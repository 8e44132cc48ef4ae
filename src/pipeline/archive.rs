//! Archival: move a converted original into its directory's archive slot.
//!
//! The archive slot is a subfolder (default `pages/`) of the directory that
//! holds the original. Moving originals there keeps the converted files
//! side by side with nothing left to re-convert, while discovery skips
//! anything inside a slot on the next run.
//!
//! ## No data loss
//!
//! The original is moved with a single `rename`, never copied and deleted.
//! Either the rename happened and the document is in the slot, or it did not
//! and the document is still where it was. A name already present in the
//! slot is never overwritten: `name.pages` becomes `name_1.pages`,
//! `name_2.pages`, … until a free name is found.

use crate::error::ItemError;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Move `source` into the archive slot named `archive_dir_name` next to it.
///
/// Returns the path the original now lives at.
pub async fn archive(source: &Path, archive_dir_name: &str) -> Result<PathBuf, ItemError> {
    let parent = source.parent().ok_or_else(|| ItemError::Archive {
        path: source.to_path_buf(),
        detail: "document has no parent directory".into(),
    })?;
    archive_into(source, &parent.join(archive_dir_name)).await
}

/// Move `source` into `slot`, creating the slot if needed.
pub async fn archive_into(source: &Path, slot: &Path) -> Result<PathBuf, ItemError> {
    let fail = |detail: String| ItemError::Archive {
        path: source.to_path_buf(),
        detail,
    };

    let file_name = source
        .file_name()
        .ok_or_else(|| fail("document has no file name".into()))?;

    tokio::fs::create_dir_all(slot)
        .await
        .map_err(|e| fail(format!("cannot create {}: {e}", slot.display())))?;

    let destination = free_destination(slot, file_name).await;
    debug!("Moving {} → {}", source.display(), destination.display());

    tokio::fs::rename(source, &destination)
        .await
        .map_err(|e| fail(format!("cannot move to {}: {e}", destination.display())))?;

    info!(
        "Moved to: {}",
        destination
            .strip_prefix(slot.parent().unwrap_or(slot))
            .unwrap_or(&destination)
            .display()
    );
    Ok(destination)
}

/// First name in `slot` not already taken, starting with `file_name` itself.
async fn free_destination(slot: &Path, file_name: &OsStr) -> PathBuf {
    let candidate = slot.join(file_name);
    if !exists(&candidate).await {
        return candidate;
    }
    let mut n = 1usize;
    loop {
        let candidate = slot.join(numbered_name(file_name, n));
        if !exists(&candidate).await {
            return candidate;
        }
        n += 1;
    }
}

/// Insert `_n` before the suffix: `report.pages` → `report_2.pages`.
pub fn numbered_name(file_name: &OsStr, n: usize) -> OsString {
    let path = Path::new(file_name);
    let stem = path.file_stem().unwrap_or(file_name);
    let mut name = stem.to_os_string();
    name.push(format!("_{n}"));
    if let Some(ext) = path.extension() {
        name.push(".");
        name.push(ext);
    }
    name
}

/// Existence without following symlinks, so a dangling link still blocks the name.
async fn exists(path: &Path) -> bool {
    tokio::fs::symlink_metadata(path).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_numbered_name() {
        assert_eq!(numbered_name(OsStr::new("a.pages"), 1), "a_1.pages");
        assert_eq!(numbered_name(OsStr::new("v1.2.pages"), 3), "v1.2_3.pages");
        assert_eq!(numbered_name(OsStr::new("README"), 2), "README_2");
    }

    #[tokio::test]
    async fn test_archive_creates_slot_and_moves() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("a.pages");
        write(&source, "original");

        let dest = archive(&source, "pages").await.unwrap();
        assert_eq!(dest, tmp.path().join("pages/a.pages"));
        assert!(!source.exists());
        assert_eq!(fs::read_to_string(&dest).unwrap(), "original");
    }

    #[tokio::test]
    async fn test_collisions_get_numbered_suffix() {
        let tmp = TempDir::new().unwrap();
        let slot = tmp.path().join("pages");
        write(&slot.join("a.pages"), "first");
        write(&slot.join("a_1.pages"), "second");

        let source = tmp.path().join("a.pages");
        write(&source, "third");
        let dest = archive(&source, "pages").await.unwrap();

        assert_eq!(dest, slot.join("a_2.pages"));
        assert_eq!(fs::read_to_string(slot.join("a.pages")).unwrap(), "first");
        assert_eq!(fs::read_to_string(slot.join("a_1.pages")).unwrap(), "second");
        assert_eq!(fs::read_to_string(&dest).unwrap(), "third");
    }

    #[tokio::test]
    async fn test_same_name_from_two_directories_into_one_slot() {
        let tmp = TempDir::new().unwrap();
        let slot = tmp.path().join("shared");
        let one = tmp.path().join("one/report.pages");
        let two = tmp.path().join("two/report.pages");
        write(&one, "from one");
        write(&two, "from two");

        let d1 = archive_into(&one, &slot).await.unwrap();
        let d2 = archive_into(&two, &slot).await.unwrap();

        assert_ne!(d1, d2);
        assert_eq!(fs::read_to_string(&d1).unwrap(), "from one");
        assert_eq!(fs::read_to_string(&d2).unwrap(), "from two");
    }

    #[tokio::test]
    async fn test_bundle_directory_is_moved_whole() {
        let tmp = TempDir::new().unwrap();
        let bundle = tmp.path().join("Doc.pages");
        write(&bundle.join("Index/Document.iwa"), "iwa");

        let dest = archive(&bundle, "pages").await.unwrap();
        assert!(!bundle.exists());
        assert!(dest.join("Index/Document.iwa").exists());
    }

    #[tokio::test]
    async fn test_missing_source_is_archive_error() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("gone.pages");

        let err = archive(&source, "pages").await.unwrap_err();
        assert!(matches!(err, ItemError::Archive { .. }));
        assert!(!err.is_conversion_failure());
    }

    #[tokio::test]
    async fn test_blocked_slot_leaves_source_in_place() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("a.pages");
        write(&source, "original");
        // A plain file where the slot should be: create_dir_all fails even for root.
        write(&tmp.path().join("pages"), "not a folder");

        let err = archive(&source, "pages").await.unwrap_err();
        match &err {
            ItemError::Archive { path, detail } => {
                assert_eq!(path, &source);
                assert!(detail.starts_with("cannot create"), "{detail}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(fs::read_to_string(&source).unwrap(), "original");
        assert_eq!(
            fs::read_to_string(tmp.path().join("pages")).unwrap(),
            "not a folder"
        );
    }
}
