//! Event-driven alternative to the polling loop.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, error, info, warn};

use crate::error::{IndexError, Result};
use crate::indexer::SkillIndexer;

/// Rebuilds the whole index whenever a file under a skill directory is
/// created, modified, or removed.
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    root: PathBuf,
}

impl FileWatcher {
    /// Create a watcher bound to the indexer's root. Call [`watch`](Self::watch)
    /// to start receiving events.
    pub fn new(indexer: Arc<SkillIndexer>) -> Result<Self> {
        let root = indexer.root().to_path_buf();
        let event_root = root.clone();

        let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    warn!("Watch error: {:?}", e);
                    return;
                }
            };

            if !matches!(
                event.kind,
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
            ) {
                return;
            }

            if !event.paths.iter().any(|p| is_skill_path(&event_root, p)) {
                return;
            }

            debug!("File change detected: {:?}", event.paths);
            if let Err(e) = indexer.reload() {
                error!("Failed to reload index: {}", e);
            }
        })
        .map_err(|e| IndexError::Watch(format!("Failed to create watcher: {}", e)))?;

        Ok(Self { watcher, root })
    }

    /// Start watching the skill root recursively.
    pub fn watch(&mut self) -> Result<()> {
        self.watcher
            .watch(&self.root, RecursiveMode::Recursive)
            .map_err(|e| IndexError::Watch(format!("Failed to watch {:?}: {}", self.root, e)))?;

        info!("Started watching skills directory: {:?}", self.root);
        Ok(())
    }

    /// Stop watching the skill root.
    pub fn unwatch(&mut self) -> Result<()> {
        self.watcher
            .unwatch(&self.root)
            .map_err(|e| IndexError::Watch(format!("Failed to unwatch {:?}: {}", self.root, e)))
    }
}

/// Whether `path` lies inside a skill directory under `root`.
fn is_skill_path(root: &Path, path: &Path) -> bool {
    let Ok(relative) = path.strip_prefix(root) else {
        return false;
    };
    match relative.components().next() {
        Some(Component::Normal(first)) => !first.to_string_lossy().starts_with('.'),
        _ => false,
    }
}
