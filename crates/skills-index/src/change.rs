//! Modification-time change detection over the skill tree.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::Result;
use crate::indexer::document_dirs;

/// Last-modified time of every file under every skill directory.
pub type MTimeSnapshot = HashMap<PathBuf, SystemTime>;

/// Differences between two scans.
#[derive(Debug, Default)]
pub struct Detection {
    pub added: Vec<PathBuf>,
    pub modified: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
    /// The scan just taken; becomes the baseline for the next comparison.
    pub snapshot: MTimeSnapshot,
}

impl Detection {
    pub fn changed(&self) -> bool {
        !(self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty())
    }
}

/// Record the mtime of every file under every skill directory.
///
/// Files that vanish or become unreadable mid-walk are left out rather than
/// failing the scan. Only an unreadable root is an error.
pub fn scan(root: &Path) -> Result<MTimeSnapshot> {
    let mut snapshot = MTimeSnapshot::new();

    for (_, dir) in document_dirs(root)? {
        for entry in WalkDir::new(&dir).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(modified) = entry.metadata().ok().and_then(|m| m.modified().ok()) else {
                continue;
            };
            snapshot.insert(entry.into_path(), modified);
        }
    }

    Ok(snapshot)
}

/// Compare the tree under `root` against `previous`.
pub fn detect(root: &Path, previous: &MTimeSnapshot) -> Result<Detection> {
    let current = scan(root)?;
    let mut detection = Detection::default();

    for (path, mtime) in &current {
        match previous.get(path) {
            Some(old) if old == mtime => {}
            Some(_) => detection.modified.push(path.clone()),
            None => detection.added.push(path.clone()),
        }
    }

    detection.removed = previous
        .keys()
        .filter(|path| !current.contains_key(*path))
        .cloned()
        .collect();

    detection.snapshot = current;
    Ok(detection)
}

/// Stateful detector owning the previous scan.
#[derive(Debug, Default)]
pub struct ChangeDetector {
    previous: MTimeSnapshot,
}

impl ChangeDetector {
    /// A detector with no baseline; its first poll reports every file as new.
    pub fn new() -> Self {
        Self::default()
    }

    /// A detector whose baseline is the current state of `root`.
    pub fn primed(root: &Path) -> Result<Self> {
        Ok(Self {
            previous: scan(root)?,
        })
    }

    /// Number of files in the baseline.
    pub fn tracked(&self) -> usize {
        self.previous.len()
    }

    /// Scan `root`, replace the baseline, and report whether anything changed.
    ///
    /// On error the baseline is left untouched.
    pub fn poll(&mut self, root: &Path) -> Result<bool> {
        let detection = detect(root, &self.previous)?;

        for path in &detection.modified {
            info!("File changed: {}", path.display());
        }
        for path in &detection.removed {
            info!("File deleted: {}", path.display());
        }
        if !detection.added.is_empty() {
            debug!("{} new file(s) under {:?}", detection.added.len(), root);
        }

        let changed = detection.changed();
        self.previous = detection.snapshot;
        Ok(changed)
    }
}
