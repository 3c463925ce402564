//! File watching for live reload.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use sitesmith_build::{GlobError, PathSet, SiteConfig, TaskName};
use tokio::sync::mpsc as async_mpsc;
use walkdir::WalkDir;

/// Events emitted by the file watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// File was created
    Created(PathBuf),

    /// File was modified
    Modified(PathBuf),

    /// File was deleted
    Deleted(PathBuf),
}

impl WatchEvent {
    /// The path the event refers to.
    pub fn path(&self) -> &Path {
        match self {
            WatchEvent::Created(p) | WatchEvent::Modified(p) | WatchEvent::Deleted(p) => p,
        }
    }
}

/// File watcher for detecting changes.
pub struct FileWatcher {
    _watcher: Arc<Mutex<RecommendedWatcher>>,
}

impl FileWatcher {
    /// Create a new file watcher for the given paths.
    ///
    /// A path that does not exist yet is picked up once it is created; its
    /// files are then reported as created. Returns the watcher and a channel
    /// to receive events.
    pub fn new(
        paths: &[PathBuf],
    ) -> Result<(Self, async_mpsc::Receiver<WatchEvent>), std::io::Error> {
        let (sync_tx, sync_rx) = mpsc::channel();
        let (async_tx, async_rx) = async_mpsc::channel(100);

        let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
            if let Ok(event) = res {
                let _ = sync_tx.send(event);
            }
        })
        .map_err(std::io::Error::other)?;

        let mut pending = PendingRoots::default();
        for path in paths {
            if path.exists() {
                watcher
                    .watch(path, RecursiveMode::Recursive)
                    .map_err(std::io::Error::other)?;
                tracing::debug!("Watching {}", path.display());
            } else {
                pending.roots.push(path.clone());
            }
        }
        pending.anchor(&mut watcher);

        let watcher = Arc::new(Mutex::new(watcher));
        // Weak, so dropping the FileWatcher still closes the event channel
        let shared = Arc::downgrade(&watcher);

        // Forward notify events into the async channel
        std::thread::spawn(move || {
            while let Ok(event) = sync_rx.recv() {
                if !pending.roots.is_empty() && event.kind.is_create() {
                    let Some(watcher) = shared.upgrade() else {
                        return;
                    };
                    let appeared = match watcher.lock() {
                        Ok(mut guard) => pending.activate(&mut guard),
                        Err(_) => return,
                    };
                    drop(watcher);

                    for path in appeared.iter().flat_map(|root| files_under(root)) {
                        if async_tx.blocking_send(WatchEvent::Created(path)).is_err() {
                            return;
                        }
                    }
                }

                for path in event.paths {
                    if let Some(e) = classify_event(&path, &event.kind) {
                        if async_tx.blocking_send(e).is_err() {
                            return;
                        }
                    }
                }
            }
        });

        Ok((Self { _watcher: watcher }, async_rx))
    }
}

/// Watch roots that did not exist yet, and the ancestors standing in for them.
#[derive(Debug, Default)]
struct PendingRoots {
    roots: Vec<PathBuf>,
    anchors: HashSet<PathBuf>,
}

impl PendingRoots {
    /// Watch the nearest existing ancestor of every pending root.
    fn anchor(&mut self, watcher: &mut RecommendedWatcher) {
        for root in &self.roots {
            let Some(ancestor) = nearest_existing_ancestor(root) else {
                continue;
            };
            if !self.anchors.insert(ancestor.to_path_buf()) {
                continue;
            }

            match watcher.watch(ancestor, RecursiveMode::NonRecursive) {
                Ok(()) => tracing::debug!(
                    "Watching {} until {} exists",
                    ancestor.display(),
                    root.display()
                ),
                Err(e) => tracing::warn!("Failed to watch {}: {}", ancestor.display(), e),
            }
        }
    }

    /// Start watching every pending root that now exists and return them.
    fn activate(&mut self, watcher: &mut RecommendedWatcher) -> Vec<PathBuf> {
        let mut activated = Vec::new();

        loop {
            let (ready, waiting): (Vec<PathBuf>, Vec<PathBuf>) =
                std::mem::take(&mut self.roots)
                    .into_iter()
                    .partition(|root| root.is_dir());
            self.roots = waiting;

            for root in ready {
                match watcher.watch(&root, RecursiveMode::Recursive) {
                    Ok(()) => {
                        tracing::debug!("Watching {}", root.display());
                        activated.push(root);
                    }
                    Err(e) => tracing::warn!("Failed to watch {}: {}", root.display(), e),
                }
            }

            // A root created while anchoring has no event left to wake us
            self.anchor(watcher);
            if !self.roots.iter().any(|root| root.is_dir()) {
                break;
            }
        }

        activated
    }
}

fn nearest_existing_ancestor(path: &Path) -> Option<&Path> {
    path.ancestors().skip(1).find(|p| p.is_dir())
}

fn files_under(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect()
}

/// Classify a notify event into a WatchEvent.
fn classify_event(path: &Path, kind: &notify::EventKind) -> Option<WatchEvent> {
    use notify::EventKind;

    match kind {
        EventKind::Create(_) => Some(WatchEvent::Created(path.to_path_buf())),
        EventKind::Remove(_) => Some(WatchEvent::Deleted(path.to_path_buf())),
        EventKind::Modify(_) => Some(WatchEvent::Modified(path.to_path_buf())),
        _ => None,
    }
}

/// Wait for the next event, then gather everything arriving until the
/// channel has been quiet for `window`.
///
/// Returns `None` once the channel is closed and drained.
pub async fn next_batch(
    rx: &mut async_mpsc::Receiver<WatchEvent>,
    window: Duration,
) -> Option<Vec<WatchEvent>> {
    let first = rx.recv().await?;
    let mut batch = vec![first];

    while let Ok(Some(event)) = tokio::time::timeout(window, rx.recv()).await {
        if !batch.contains(&event) {
            batch.push(event);
        }
    }

    Some(batch)
}

/// Maps changed files to the tasks whose watch globs select them.
#[derive(Debug, Clone)]
pub struct TaskMatcher {
    root: PathBuf,
    sets: Vec<(TaskName, PathSet)>,
}

impl TaskMatcher {
    /// Build a matcher from the configuration's watch globs.
    pub fn new(config: &SiteConfig) -> Result<Self, GlobError> {
        Ok(Self {
            root: config.root.clone(),
            sets: config.watch_sets()?,
        })
    }

    /// Tasks to rerun for a changed path.
    pub fn tasks_for(&self, path: &Path) -> Vec<TaskName> {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);

        self.sets
            .iter()
            .filter(|(_, set)| set.matches(relative))
            .map(|(task, _)| *task)
            .collect()
    }

    /// Tasks to rerun for a batch of events, each task once.
    pub fn tasks_for_batch(&self, events: &[WatchEvent]) -> BTreeSet<TaskName> {
        events
            .iter()
            .flat_map(|event| self.tasks_for(event.path()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn matcher() -> TaskMatcher {
        TaskMatcher::new(&SiteConfig::with_root("/site")).unwrap()
    }

    #[test]
    fn maps_paths_to_tasks() {
        let m = matcher();

        assert_eq!(
            m.tasks_for(Path::new("/site/src/html/index.html")),
            vec![TaskName::Html]
        );
        assert_eq!(
            m.tasks_for(Path::new("/site/src/html/partials/footer.html")),
            vec![TaskName::Html]
        );
        assert_eq!(
            m.tasks_for(Path::new("/site/src/scss/components/_nav.scss")),
            vec![TaskName::Styles]
        );
        assert_eq!(
            m.tasks_for(Path::new("/site/src/scss/vendor.scss")),
            vec![TaskName::Styles, TaskName::VendorStyles]
        );
        assert_eq!(
            m.tasks_for(Path::new("/site/src/js/lib/menu.js")),
            vec![TaskName::Scripts]
        );
        assert_eq!(
            m.tasks_for(Path::new("/site/src/images/hero.png")),
            vec![TaskName::Images]
        );
        assert!(m
            .tasks_for(Path::new("/site/node_modules/jquery/dist/jquery.min.js"))
            .is_empty());
    }

    #[test]
    fn batches_run_each_task_once() {
        let m = matcher();
        let events = vec![
            WatchEvent::Modified(PathBuf::from("/site/src/scss/main.scss")),
            WatchEvent::Modified(PathBuf::from("/site/src/scss/_vars.scss")),
            WatchEvent::Created(PathBuf::from("/site/src/html/new.html")),
        ];

        let tasks: Vec<TaskName> = m.tasks_for_batch(&events).into_iter().collect();

        assert_eq!(tasks, vec![TaskName::Html, TaskName::Styles]);
    }

    #[tokio::test]
    async fn debounces_bursts_into_one_batch() {
        let (tx, mut rx) = async_mpsc::channel(10);
        tx.send(WatchEvent::Modified(PathBuf::from("a"))).await.unwrap();
        tx.send(WatchEvent::Modified(PathBuf::from("a"))).await.unwrap();
        tx.send(WatchEvent::Modified(PathBuf::from("b"))).await.unwrap();
        drop(tx);

        let batch = next_batch(&mut rx, Duration::from_millis(50)).await.unwrap();

        assert_eq!(batch.len(), 2);
        assert!(next_batch(&mut rx, Duration::from_millis(50)).await.is_none());
    }

    #[test]
    fn finds_nearest_existing_ancestor() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("src")).unwrap();

        let missing = temp.path().join("src/images/icons");

        assert_eq!(
            nearest_existing_ancestor(&missing),
            Some(temp.path().join("src").as_path())
        );
    }

    #[tokio::test]
    async fn picks_up_roots_created_later() {
        let temp = tempdir().unwrap();
        let images = temp.path().join("src/images");

        let (watcher, mut rx) = FileWatcher::new(&[images.clone()]).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        fs::create_dir_all(&images).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        fs::write(images.join("hero.png"), b"png").unwrap();

        let seen = tokio::time::timeout(Duration::from_secs(3), async {
            while let Some(event) = rx.recv().await {
                if event.path().ends_with("hero.png") {
                    return true;
                }
            }
            false
        })
        .await;

        drop(watcher);

        assert_eq!(seen.ok(), Some(true), "no event for a file in the new root");
    }

    #[tokio::test]
    async fn watches_file_changes() {
        let temp = tempdir().unwrap();
        let test_file = temp.path().join("main.scss");

        let (watcher, mut rx) = FileWatcher::new(&[temp.path().to_path_buf()]).unwrap();

        // Give inotify time to set up
        tokio::time::sleep(Duration::from_millis(100)).await;

        fs::write(&test_file, ".a { color: red; }").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(3), rx.recv()).await;

        drop(watcher);

        assert!(event.is_ok(), "timeout waiting for file watch event");
        assert!(event.unwrap().is_some(), "channel should not be closed");
    }
}
