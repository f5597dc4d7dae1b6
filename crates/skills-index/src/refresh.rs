//! Background polling loop that keeps the published snapshot current.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::change::ChangeDetector;
use crate::error::Result;
use crate::indexer::SkillIndexer;
use crate::models::IndexSnapshot;

/// Result of one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing under the root changed.
    Unchanged,
    /// A change was seen and a new snapshot was published.
    Rebuilt { documents: usize, content_units: usize },
    /// The scan or the rebuild failed; the previous snapshot stays live.
    Failed(String),
}

/// Scan once and rebuild on change. Blocking.
pub fn tick(detector: &mut ChangeDetector, indexer: &SkillIndexer) -> TickOutcome {
    tick_with(detector, indexer.root(), || indexer.reload())
}

/// Scan `root` and run `rebuild` on change.
///
/// A failed rebuild drops the baseline, so the next scan reports the
/// change again and the rebuild is retried.
fn tick_with(
    detector: &mut ChangeDetector,
    root: &Path,
    rebuild: impl FnOnce() -> Result<Arc<IndexSnapshot>>,
) -> TickOutcome {
    match detector.poll(root) {
        Ok(false) => TickOutcome::Unchanged,
        Ok(true) => {
            info!("Changes detected, reloading index...");
            match rebuild() {
                Ok(snapshot) => TickOutcome::Rebuilt {
                    documents: snapshot.len(),
                    content_units: snapshot.content.len(),
                },
                Err(e) => {
                    *detector = ChangeDetector::new();
                    TickOutcome::Failed(e.to_string())
                }
            }
        }
        Err(e) => TickOutcome::Failed(e.to_string()),
    }
}

/// Polls the skill tree on a fixed interval and republishes the index
/// whenever any file is added, removed, or modified.
///
/// The change baseline is owned by the loop alone. Failures are logged and
/// the loop carries on with the last good snapshot.
pub struct RefreshLoop {
    indexer: Arc<SkillIndexer>,
    interval: Duration,
    detector: ChangeDetector,
}

impl RefreshLoop {
    /// A loop with no baseline; its first poll rebuilds the index.
    pub fn new(indexer: Arc<SkillIndexer>, interval: Duration) -> Self {
        Self {
            indexer,
            interval,
            detector: ChangeDetector::new(),
        }
    }

    /// Start from an existing baseline, typically one taken just before an
    /// initial reload.
    pub fn with_detector(mut self, detector: ChangeDetector) -> Self {
        self.detector = detector;
        self
    }

    /// Start the loop on the current tokio runtime.
    pub fn spawn(self) -> RefreshHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(stop_rx));
        RefreshHandle {
            stop: stop_tx,
            task,
        }
    }

    async fn run(mut self, mut stop: watch::Receiver<bool>) {
        info!(
            "Refresh loop started for {:?}, polling every {:?}",
            self.indexer.root(),
            self.interval
        );
        let mut detector = std::mem::take(&mut self.detector);

        loop {
            if *stop.borrow() {
                break;
            }

            let indexer = Arc::clone(&self.indexer);
            let scan = tokio::task::spawn_blocking(move || {
                let outcome = tick(&mut detector, &indexer);
                (detector, outcome)
            });

            detector = match scan.await {
                Ok((detector, outcome)) => {
                    match outcome {
                        TickOutcome::Unchanged => debug!("No skill changes"),
                        TickOutcome::Rebuilt {
                            documents,
                            content_units,
                        } => debug!(
                            "Published snapshot: {} skills, {} content units",
                            documents, content_units
                        ),
                        TickOutcome::Failed(e) => error!("Refresh error: {}", e),
                    }
                    detector
                }
                Err(e) => {
                    error!("Refresh task failed: {}", e);
                    ChangeDetector::new()
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = stop.changed() => break,
            }
        }

        info!("Refresh loop stopped");
    }
}

/// Handle to a running refresh loop. Dropping the handle also stops the
/// loop, without waiting for it.
pub struct RefreshHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    /// Signal the loop and wait for it to exit.
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.task.await {
            warn!("Refresh loop ended abnormally: {}", e);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
