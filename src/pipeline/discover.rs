//! Work discovery: find candidate documents under a root and classify them.
//!
//! ## Why classify instead of filter?
//!
//! Re-running the tool after an interrupted batch must only surface the work
//! that is really left, but the user still wants to know how much was
//! skipped. Every candidate therefore comes out of the walk as a
//! [`WorkItem`] with a status: `Pending`, `AlreadyConverted` (its target
//! exists) or `AlreadyArchived` (it sits inside an archive slot).
//!
//! ## Ordering
//!
//! Entries of each directory are sorted by name before they are visited, so
//! two scans of an unchanged tree yield the same sequence. Files of a
//! directory come before its subdirectories.
//!
//! ## Bundles
//!
//! Pages documents can be directory bundles. A directory whose name carries
//! the source extension is a single candidate and is never descended into.
//!
//! ## Case
//!
//! Both the source extension and the archive folder name match without
//! regard to ASCII case. On a case-insensitive volume `Pages/` and `pages/`
//! are the same folder, so archiving into one must be recognised as the
//! other on the next scan.

use crate::config::BatchConfig;
use crate::error::BatchError;
use crate::output::{BatchPlan, ItemStatus, WorkItem};
use std::collections::VecDeque;
use std::ffi::OsStr;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

/// Lazy, finite walk over the candidates below a root directory.
///
/// Reflects the filesystem as it is read; it cannot be restarted. Create a
/// new one with [`discover`] to scan again.
#[derive(Debug)]
pub struct Discovery {
    root: PathBuf,
    source_extension: String,
    target_extension: String,
    archive_dir_name: String,
    pending_dirs: Vec<PathBuf>,
    ready: VecDeque<WorkItem>,
}

/// Start a discovery pass below `root`.
///
/// # Errors
/// [`BatchError::DirectoryNotFound`] if `root` does not exist and
/// [`BatchError::NotADirectory`] if it is not a directory. Nothing else is
/// touched in either case.
pub fn discover(root: impl AsRef<Path>, config: &BatchConfig) -> Result<Discovery, BatchError> {
    let root = resolve_root(root.as_ref())?;
    debug!("Scanning {}", root.display());
    Ok(Discovery {
        pending_dirs: vec![root.clone()],
        root,
        source_extension: config.source_extension.clone(),
        target_extension: config.target_extension.clone(),
        archive_dir_name: config.archive_dir_name.clone(),
        ready: VecDeque::new(),
    })
}

/// Run a full discovery pass and split the result into a [`BatchPlan`].
pub fn plan(root: impl AsRef<Path>, config: &BatchConfig) -> Result<BatchPlan, BatchError> {
    let discovery = discover(root, config)?;
    let mut plan = BatchPlan {
        root: discovery.root().to_path_buf(),
        ..Default::default()
    };

    for item in discovery {
        match item.status {
            ItemStatus::Pending => plan.pending.push(item),
            ItemStatus::AlreadyConverted => {
                info!("Skipping (already converted): {}", item.source.display());
                plan.already_converted += 1;
            }
            ItemStatus::AlreadyArchived => {
                debug!("Skipping (in archive folder): {}", item.source.display());
                plan.already_archived += 1;
            }
            ItemStatus::Converted | ItemStatus::Failed => {}
        }
    }

    info!("Found {} total documents", plan.total_found());
    info!("Already processed: {}", plan.already_processed());
    info!("To be converted: {}", plan.pending.len());
    Ok(plan)
}

/// Derive the target path of a source document by swapping its suffix.
pub fn target_path(source: &Path, target_extension: &str) -> PathBuf {
    source.with_extension(target_extension)
}

fn resolve_root(root: &Path) -> Result<PathBuf, BatchError> {
    let resolved = match fs::canonicalize(root) {
        Ok(p) => p,
        Err(_) => {
            return Err(BatchError::DirectoryNotFound {
                path: root.to_path_buf(),
            })
        }
    };
    if !resolved.is_dir() {
        return Err(BatchError::NotADirectory {
            path: root.to_path_buf(),
        });
    }
    Ok(resolved)
}

impl Discovery {
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn has_source_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(OsStr::to_str)
            .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.source_extension))
    }

    /// True if any path segment below the root names an archive slot.
    fn is_archived(&self, path: &Path) -> bool {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let parent = relative.parent().unwrap_or(Path::new(""));
        parent.components().any(|c| match c {
            Component::Normal(name) => name
                .to_str()
                .is_some_and(|n| n.eq_ignore_ascii_case(&self.archive_dir_name)),
            _ => false,
        })
    }

    fn classify(&self, source: PathBuf) -> WorkItem {
        let target = target_path(&source, &self.target_extension);
        let status = if self.is_archived(&source) {
            ItemStatus::AlreadyArchived
        } else if target.exists() {
            ItemStatus::AlreadyConverted
        } else {
            ItemStatus::Pending
        };
        WorkItem {
            source,
            target,
            status,
        }
    }

    /// Read one directory, queueing its candidates and subdirectories.
    fn expand(&mut self, dir: &Path) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot read directory {}: {}", dir.display(), e);
                return;
            }
        };

        let mut paths: Vec<(PathBuf, fs::FileType)> = entries
            .filter_map(|entry| match entry {
                Ok(entry) => match entry.file_type() {
                    Ok(ft) => Some((entry.path(), ft)),
                    Err(e) => {
                        warn!("Cannot stat {}: {}", entry.path().display(), e);
                        None
                    }
                },
                Err(e) => {
                    warn!("Error listing {}: {}", dir.display(), e);
                    None
                }
            })
            .collect();
        paths.sort_by(|a, b| a.0.cmp(&b.0));

        let mut subdirs = Vec::new();
        for (path, file_type) in paths {
            if self.has_source_extension(&path) {
                // Symlinks are followed only to decide whether they point at a document.
                let is_document = if file_type.is_symlink() {
                    fs::metadata(&path).is_ok()
                } else {
                    file_type.is_file() || file_type.is_dir()
                };
                if is_document {
                    let item = self.classify(path);
                    self.ready.push_back(item);
                }
            } else if file_type.is_dir() {
                subdirs.push(path);
            }
        }

        // Reverse so the stack pops subdirectories in name order.
        subdirs.reverse();
        self.pending_dirs.extend(subdirs);
    }
}

impl Iterator for Discovery {
    type Item = WorkItem;

    fn next(&mut self) -> Option<WorkItem> {
        loop {
            if let Some(item) = self.ready.pop_front() {
                return Some(item);
            }
            let dir = self.pending_dirs.pop()?;
            self.expand(&dir);
        }
    }
}
