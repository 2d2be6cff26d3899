//! Native watch primitive.
//!
//! A [`WatchBackend`] hooks one directory and pushes raw changes into a
//! sink. The production backend wraps `notify`; tests substitute a fake
//! that emits events on demand.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, warn};
use wildmatch::WildMatch;

use crate::error::{MirrorError, Result};
use crate::event::{FileEventKind, WatchMask, classify};

/// Receives raw events from a native watch. Called from the backend's
/// delivery thread.
pub type RawEventSink = Arc<dyn Fn(RawEvent) + Send + Sync>;

/// An unfiltered change or a watch failure.
#[derive(Debug, Clone)]
pub enum RawEvent {
    /// A change below the hooked directory.
    Change { kind: FileEventKind, path: PathBuf },

    /// The watch failed and no longer reports reliably.
    Error(Arc<MirrorError>),
}

/// What to hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookRequest {
    /// Directory to watch. Must exist.
    pub path: PathBuf,

    /// Whether changes in subdirectories are reported.
    pub recursive: bool,

    /// Filename filters; a change is reported if any matches.
    pub filters: Vec<String>,

    /// Which changes are reported.
    pub mask: WatchMask,
}

/// A live native watch.
pub trait NativeWatch: Send {
    /// Stop reporting. Calling it twice is harmless.
    fn close(&mut self);
}

/// Creates native watches.
pub trait WatchBackend: Send + Sync {
    /// Hook a directory. Fails if it does not exist.
    fn hook(&self, request: HookRequest, sink: RawEventSink) -> Result<Box<dyn NativeWatch>>;
}

/// Backend over the platform's recommended `notify` watcher.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotifyBackend;

impl WatchBackend for NotifyBackend {
    fn hook(&self, request: HookRequest, sink: RawEventSink) -> Result<Box<dyn NativeWatch>> {
        let HookRequest {
            path,
            recursive,
            filters,
            mask,
        } = request;

        if !path.is_dir() {
            return Err(MirrorError::DirectoryNotFound(path.display().to_string()));
        }

        let filters = NativeFilters::new(&filters);
        let root = path.clone();
        let mut root_removed = false;

        let mut watcher = notify::recommended_watcher(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    for (kind, changed) in classify(&event) {
                        if kind == FileEventKind::Deleted && (changed == root || !root.exists()) {
                            if !root_removed {
                                root_removed = true;
                                warn!("Watched directory removed: {}", root.display());
                                sink(RawEvent::Error(Arc::new(MirrorError::WatchedPathRemoved(
                                    root.display().to_string(),
                                ))));
                            }
                            continue;
                        }
                        if changed == root || !mask.includes(kind) || !filters.admits(&changed) {
                            continue;
                        }
                        if !mask.directories && kind != FileEventKind::Deleted && changed.is_dir() {
                            continue;
                        }
                        sink(RawEvent::Change {
                            kind,
                            path: changed,
                        });
                    }
                }
                Err(e) => {
                    warn!("Watch error under {}: {e}", root.display());
                    sink(RawEvent::Error(Arc::new(MirrorError::Notify(e))));
                }
            },
        )?;

        let mode = if recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher.watch(&path, mode)?;
        debug!("Started watching: {} ({mode:?})", path.display());

        Ok(Box::new(NotifyWatch {
            watcher: Some(watcher),
            path,
        }))
    }
}

struct NotifyWatch {
    watcher: Option<RecommendedWatcher>,
    path: PathBuf,
}

impl NativeWatch for NotifyWatch {
    fn close(&mut self) {
        // Dropping only signals notify's event loop to shut down. `unwatch`
        // would wait for that loop, which may be the thread calling us.
        if self.watcher.take().is_some() {
            debug!("Stopped watching: {}", self.path.display());
        }
    }
}

impl Drop for NotifyWatch {
    fn drop(&mut self) {
        self.close();
    }
}

/// Coarse filename filters. Always case-insensitive so they never reject
/// something the glob layer would accept.
struct NativeFilters(Vec<WildMatch>);

impl NativeFilters {
    fn new(filters: &[String]) -> Self {
        Self(
            filters
                .iter()
                .map(|filter| WildMatch::new_case_insensitive(filter))
                .collect(),
        )
    }

    fn admits(&self, path: &Path) -> bool {
        if self.0.is_empty() {
            return true;
        }
        let Some(name) = path.file_name() else {
            return true;
        };
        let name = name.to_string_lossy();
        self.0.iter().any(|filter| filter.matches(&name))
    }
}

impl fmt::Debug for NativeFilters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NativeFilters").field(&self.0.len()).finish()
    }
}

/// A backend for tests that records hooks and emits events on demand.
#[cfg(test)]
pub(crate) mod fake {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct Hooked {
        request: HookRequest,
        sink: Option<RawEventSink>,
        closed: Arc<AtomicUsize>,
    }

    /// Every hook request is recorded, including failed ones. Hooking a
    /// path that is not a directory fails like the real backend.
    #[derive(Default)]
    pub(crate) struct FakeBackend {
        hooks: Mutex<Vec<Hooked>>,
    }

    impl FakeBackend {
        pub(crate) fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub(crate) fn requests(&self) -> Vec<HookRequest> {
            self.hooks
                .lock()
                .unwrap()
                .iter()
                .map(|hooked| hooked.request.clone())
                .collect()
        }

        pub(crate) fn hook_count(&self) -> usize {
            self.hooks.lock().unwrap().len()
        }

        /// Emit into hook `index`. Returns false if that hook failed or was closed.
        pub(crate) fn emit(&self, index: usize, event: RawEvent) -> bool {
            let sink = {
                let hooks = self.hooks.lock().unwrap();
                let hooked = &hooks[index];
                if hooked.closed.load(Ordering::SeqCst) > 0 {
                    return false;
                }
                hooked.sink.clone()
            };
            match sink {
                Some(sink) => {
                    sink(event);
                    true
                }
                None => false,
            }
        }

        pub(crate) fn change(
            &self,
            index: usize,
            kind: FileEventKind,
            path: impl Into<PathBuf>,
        ) -> bool {
            self.emit(
                index,
                RawEvent::Change {
                    kind,
                    path: path.into(),
                },
            )
        }

        pub(crate) fn close_count(&self, index: usize) -> usize {
            self.hooks.lock().unwrap()[index].closed.load(Ordering::SeqCst)
        }

        /// Indices of hooks that succeeded and are still open.
        pub(crate) fn open_hooks(&self) -> Vec<usize> {
            self.hooks
                .lock()
                .unwrap()
                .iter()
                .enumerate()
                .filter(|(_, hooked)| {
                    hooked.sink.is_some() && hooked.closed.load(Ordering::SeqCst) == 0
                })
                .map(|(index, _)| index)
                .collect()
        }
    }

    impl WatchBackend for FakeBackend {
        fn hook(&self, request: HookRequest, sink: RawEventSink) -> Result<Box<dyn NativeWatch>> {
            let closed = Arc::new(AtomicUsize::new(0));
            let exists = request.path.is_dir();
            let path = request.path.display().to_string();
            self.hooks.lock().unwrap().push(Hooked {
                request,
                sink: exists.then_some(sink),
                closed: Arc::clone(&closed),
            });
            if !exists {
                return Err(MirrorError::DirectoryNotFound(path));
            }
            Ok(Box::new(FakeWatch { closed }))
        }
    }

    struct FakeWatch {
        closed: Arc<AtomicUsize>,
    }

    impl NativeWatch for FakeWatch {
        fn close(&mut self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    fn request(path: &Path, filters: &[&str]) -> HookRequest {
        HookRequest {
            path: path.to_path_buf(),
            recursive: false,
            filters: filters.iter().map(|f| f.to_string()).collect(),
            mask: WatchMask::ALL,
        }
    }

    #[test]
    fn test_native_filters() {
        let filters = NativeFilters::new(&["*.txt".to_string(), "Makefile".to_string()]);

        assert!(filters.admits(Path::new("/a/b.TXT")));
        assert!(filters.admits(Path::new("/a/makefile")));
        assert!(!filters.admits(Path::new("/a/b.md")));
        assert!(NativeFilters::new(&[]).admits(Path::new("/a/b.md")));
    }

    #[test]
    fn test_hook_missing_directory_fails() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing");
        let sink: RawEventSink = Arc::new(|_| {});

        let err = NotifyBackend.hook(request(&missing, &["*"]), sink).err().unwrap();
        assert!(matches!(err, MirrorError::DirectoryNotFound(_)));
    }

    #[test]
    fn test_notify_backend_reports_creation() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().canonicalize().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink: RawEventSink = {
            let seen = Arc::clone(&seen);
            Arc::new(move |event| {
                if let RawEvent::Change { kind, path } = event {
                    seen.lock().unwrap().push((kind, path));
                }
            })
        };

        let mut watch = NotifyBackend.hook(request(&root, &["*.txt"]), sink).unwrap();
        std::fs::write(root.join("ignored.md"), "x").unwrap();
        std::fs::write(root.join("a.txt"), "x").unwrap();

        let target = root.join("a.txt");
        let mut created = false;
        for _ in 0..100 {
            created = seen
                .lock()
                .unwrap()
                .iter()
                .any(|(kind, path)| *kind == FileEventKind::Created && *path == target);
            if created {
                break;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        watch.close();
        watch.close();

        assert!(created);
        let ignored = root.join("ignored.md");
        assert_eq!(seen.lock().unwrap().iter().filter(|(_, path)| *path == ignored).count(), 0);
    }
}
