//! Glob-aware watch.
//!
//! [`WatchFilter`] hooks a native watch with coarse filename filters and
//! re-checks every change against the full [`PatternSet`] before handing it
//! to subscribers. Subscribers are keyed by a caller-supplied
//! [`SubscriberId`] so they can be removed again; internally each is stored
//! as a wrapper closure that performs the matching.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{MirrorError, Result};
use crate::event::{FileEvent, FileEventKind, WatchMask};
use crate::glob::EntryKind;
use crate::native::{HookRequest, NativeWatch, RawEvent, RawEventSink, WatchBackend};
use crate::pattern_set::PatternSet;

/// Receives selected file events.
pub type EventHandler = Arc<dyn Fn(&FileEvent) + Send + Sync>;

/// Receives watch failures.
pub type ErrorHandler = Arc<dyn Fn(Arc<MirrorError>) + Send + Sync>;

type PathHandler = Arc<dyn Fn(&Path) + Send + Sync>;

/// Identifies a subscription so it can be removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// A process-unique id.
    pub fn new() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a [`WatchFilter`] watches.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Directory to watch; event paths are reported relative to it.
    pub root: PathBuf,

    /// Patterns selecting which changes reach subscribers.
    pub patterns: PatternSet,

    /// Changes the native watch reports.
    pub mask: WatchMask,

    /// Forces recursion on or off. By default the patterns decide.
    pub recursive: Option<bool>,
}

impl WatchConfig {
    pub fn new(root: impl Into<PathBuf>, patterns: PatternSet) -> Self {
        Self {
            root: root.into(),
            patterns,
            mask: WatchMask::ALL,
            recursive: None,
        }
    }

    /// Set the native mask.
    pub fn with_mask(mut self, mask: WatchMask) -> Self {
        self.mask = mask;
        self
    }

    /// Watch only the root's direct entries, whatever the patterns say.
    pub fn non_recursive(mut self) -> Self {
        self.recursive = Some(false);
        self
    }
}

/// Decides whether a raw change is delivered, and how it is reported.
struct Selector {
    root: PathBuf,
    canonical_root: Option<PathBuf>,
    patterns: PatternSet,
    mask: WatchMask,
}

impl Selector {
    fn relative<'a>(&self, path: &'a Path) -> Option<&'a Path> {
        path.strip_prefix(&self.root)
            .ok()
            .or_else(|| {
                self.canonical_root
                    .as_deref()
                    .and_then(|root| path.strip_prefix(root).ok())
            })
            .filter(|relative| !relative.as_os_str().is_empty())
    }

    fn select(&self, kind: FileEventKind, path: &Path) -> Option<FileEvent> {
        let relative = self.relative(path)?;
        let entry = match kind {
            // A deleted path can no longer be inspected.
            FileEventKind::Deleted if self.mask.directories => EntryKind::Unknown,
            FileEventKind::Deleted => EntryKind::File,
            FileEventKind::Created | FileEventKind::Modified if path.is_dir() => {
                EntryKind::Directory
            }
            FileEventKind::Created | FileEventKind::Modified => EntryKind::File,
        };
        self.patterns
            .selects(relative, entry)
            .then(|| FileEvent::new(kind, path, relative))
    }
}

#[derive(Default)]
struct Subscriptions {
    created: Vec<(SubscriberId, PathHandler)>,
    modified: Vec<(SubscriberId, PathHandler)>,
    deleted: Vec<(SubscriberId, PathHandler)>,
    errors: Vec<(SubscriberId, ErrorHandler)>,
}

impl Subscriptions {
    fn table(&mut self, kind: FileEventKind) -> &mut Vec<(SubscriberId, PathHandler)> {
        match kind {
            FileEventKind::Created => &mut self.created,
            FileEventKind::Modified => &mut self.modified,
            FileEventKind::Deleted => &mut self.deleted,
        }
    }

    fn snapshot(&mut self, kind: FileEventKind) -> Vec<PathHandler> {
        self.table(kind)
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect()
    }
}

struct Shared {
    root: PathBuf,
    subscriptions: Mutex<Subscriptions>,
    native: Mutex<Option<Box<dyn NativeWatch>>>,
    disposed: AtomicBool,
    cancel: CancellationToken,
}

impl Shared {
    fn subscriptions(&self) -> MutexGuard<'_, Subscriptions> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn native(&self) -> MutexGuard<'_, Option<Box<dyn NativeWatch>>> {
        self.native.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn store_native(&self, mut watch: Box<dyn NativeWatch>) {
        let mut native = self.native();
        if self.disposed.load(Ordering::Acquire) {
            watch.close();
        } else {
            *native = Some(watch);
        }
    }

    fn deliver(&self, event: RawEvent) {
        // Disposal itself is left to the owner or the cancellation task; this
        // may be running on the native delivery thread.
        if self.disposed.load(Ordering::Acquire) || self.cancel.is_cancelled() {
            return;
        }

        // Handlers run outside the lock so they may (un)subscribe.
        match event {
            RawEvent::Change { kind, path } => {
                let handlers = self.subscriptions().snapshot(kind);
                for handler in handlers {
                    handler(&path);
                }
            }
            RawEvent::Error(error) => {
                warn!("Watch on {} failed: {error}", self.root.display());
                let handlers: Vec<ErrorHandler> = self
                    .subscriptions()
                    .errors
                    .iter()
                    .map(|(_, handler)| Arc::clone(handler))
                    .collect();
                for handler in handlers {
                    handler(Arc::clone(&error));
                }
            }
        }
    }

    /// Returns false if already disposed.
    fn dispose(&self) -> bool {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.cancel.cancel();
        let native = self.native().take();
        if let Some(mut native) = native {
            native.close();
        }
        debug!("Disposed watch on {}", self.root.display());
        true
    }
}

/// A native watch whose events are filtered through glob patterns.
///
/// Disposed on drop, when [`WatchFilter::dispose`] is called, or when the
/// cancellation token fires.
pub struct WatchFilter {
    shared: Arc<Shared>,
    selector: Arc<Selector>,
    recursive: bool,
    native_filters: Vec<String>,
}

impl WatchFilter {
    /// Hook `config.root` through `backend`.
    pub fn hook(
        backend: &dyn WatchBackend,
        config: WatchConfig,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        let WatchConfig {
            root,
            patterns,
            mask,
            recursive,
        } = config;

        if !mask.directories {
            if let Some(pattern) = patterns.directory_only_pattern() {
                return Err(MirrorError::DirectoryPatternWithoutDirectories(
                    pattern.as_str().to_string(),
                ));
            }
        }

        let recursive = recursive.unwrap_or_else(|| patterns.requires_subdirectories());
        let native_filters = patterns.native_filters();

        let shared = Arc::new(Shared {
            root: root.clone(),
            subscriptions: Mutex::new(Subscriptions::default()),
            native: Mutex::new(None),
            disposed: AtomicBool::new(false),
            cancel: cancel.child_token(),
        });

        let sink: RawEventSink = {
            let weak: Weak<Shared> = Arc::downgrade(&shared);
            Arc::new(move |event| {
                if let Some(shared) = weak.upgrade() {
                    shared.deliver(event);
                }
            })
        };

        let native = backend.hook(
            HookRequest {
                path: root.clone(),
                recursive,
                filters: native_filters.clone(),
                mask,
            },
            sink,
        )?;
        shared.store_native(native);

        if shared.cancel.is_cancelled() {
            shared.dispose();
        } else if let Ok(runtime) = Handle::try_current() {
            let weak = Arc::downgrade(&shared);
            let token = shared.cancel.clone();
            runtime.spawn(async move {
                token.cancelled().await;
                if let Some(shared) = weak.upgrade() {
                    shared.dispose();
                }
            });
        }

        debug!(
            "Hooked {} (recursive: {recursive}, filters: {native_filters:?})",
            root.display()
        );

        let selector = Arc::new(Selector {
            canonical_root: root.canonicalize().ok().filter(|canonical| *canonical != root),
            root,
            patterns,
            mask,
        });

        Ok(Self {
            shared,
            selector,
            recursive,
            native_filters,
        })
    }

    /// Subscribe to one kind of change. Fails if `id` is already subscribed
    /// to that kind.
    pub fn add_handler(
        &self,
        kind: FileEventKind,
        id: SubscriberId,
        handler: EventHandler,
    ) -> Result<()> {
        let wrapped = self.wrap(kind, handler);
        let mut subscriptions = self.shared.subscriptions();
        let table = subscriptions.table(kind);
        if table.iter().any(|(existing, _)| *existing == id) {
            return Err(MirrorError::DuplicateSubscriber(id.0));
        }
        table.push((id, wrapped));
        Ok(())
    }

    /// Returns whether a subscription was removed.
    pub fn remove_handler(&self, kind: FileEventKind, id: SubscriberId) -> bool {
        let mut subscriptions = self.shared.subscriptions();
        let table = subscriptions.table(kind);
        let before = table.len();
        table.retain(|(existing, _)| *existing != id);
        table.len() != before
    }

    pub fn add_error_handler(&self, id: SubscriberId, handler: ErrorHandler) -> Result<()> {
        let mut subscriptions = self.shared.subscriptions();
        if subscriptions.errors.iter().any(|(existing, _)| *existing == id) {
            return Err(MirrorError::DuplicateSubscriber(id.0));
        }
        subscriptions.errors.push((id, handler));
        Ok(())
    }

    pub fn remove_error_handler(&self, id: SubscriberId) -> bool {
        let mut subscriptions = self.shared.subscriptions();
        let before = subscriptions.errors.len();
        subscriptions.errors.retain(|(existing, _)| *existing != id);
        subscriptions.errors.len() != before
    }

    /// Stop the native watch. Idempotent.
    pub fn dispose(&self) {
        self.shared.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::Acquire)
    }

    pub fn root(&self) -> &Path {
        &self.selector.root
    }

    pub fn is_recursive(&self) -> bool {
        self.recursive
    }

    pub fn native_filters(&self) -> &[String] {
        &self.native_filters
    }

    fn wrap(&self, kind: FileEventKind, handler: EventHandler) -> PathHandler {
        let selector = Arc::clone(&self.selector);
        Arc::new(move |path: &Path| {
            if let Some(event) = selector.select(kind, path) {
                handler(&event);
            }
        })
    }
}

impl Drop for WatchFilter {
    fn drop(&mut self) {
        self.shared.dispose();
    }
}

impl fmt::Debug for WatchFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchFilter")
            .field("root", &self.selector.root)
            .field("recursive", &self.recursive)
            .field("native_filters", &self.native_filters)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
