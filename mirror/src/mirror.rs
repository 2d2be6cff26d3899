//! Mirrors selected changes from a source tree into a destination tree.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use path_absolutize::Absolutize;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::MirrorConfig;
use crate::error::{MirrorError, Result};
use crate::event::{FileEvent, FileEventKind};
use crate::filter::{EventHandler, WatchConfig};
use crate::glob::{EntryKind, GlobOptions};
use crate::logger::{MirrorLogger, TracingLogger, best_effort};
use crate::native::{NotifyBackend, WatchBackend};
use crate::pattern_set::PatternSet;
use crate::recovery::{HookHandlers, HookStatus, RecoverableHook, RecoveryStrategy};

/// Called after every file action, successful or not.
pub type CompletionHook = Arc<dyn Fn(&ActionOutcome) + Send + Sync>;

/// What is done at the destination for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    /// Copy the file, or create the directory.
    Copy,

    /// Remove the file or directory tree.
    ///
    /// Directory trees are only removed when the patterns can select a
    /// directory; otherwise the directory is left alone.
    Delete,
}

impl FileAction {
    /// Apply the action for `source` to `destination`.
    pub async fn apply(self, source: &Path, destination: &Path) -> Result<()> {
        match self {
            Self::Copy => {
                let metadata = tokio::fs::metadata(source).await?;
                if metadata.is_dir() {
                    tokio::fs::create_dir_all(destination).await?;
                    return Ok(());
                }
                if let Some(parent) = destination.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::copy(source, destination).await?;
                Ok(())
            }
            Self::Delete => {
                let metadata = match tokio::fs::symlink_metadata(destination).await {
                    Ok(metadata) => metadata,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
                    Err(e) => return Err(e.into()),
                };
                let removed = if metadata.is_dir() {
                    tokio::fs::remove_dir_all(destination).await
                } else {
                    tokio::fs::remove_file(destination).await
                };
                match removed {
                    Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
                    _ => Ok(()),
                }
            }
        }
    }
}

/// The result of one file action.
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    pub action: FileAction,

    /// The event that triggered the action.
    pub event: FileEvent,

    /// Path acted upon at the destination.
    pub destination: PathBuf,

    /// Error message if the action failed.
    pub error: Option<String>,
}

impl ActionOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Entry point for mirroring.
pub struct Mirror;

impl Mirror {
    /// Start configuring a mirror from `source` into `destination`.
    pub fn builder(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> MirrorBuilder {
        MirrorBuilder::new(source, destination)
    }

    /// Start configuring a mirror from a loaded configuration.
    pub fn from_config(config: &MirrorConfig) -> Result<MirrorBuilder> {
        let source = config
            .source
            .clone()
            .ok_or_else(|| MirrorError::Config("a source directory is required".to_string()))?;
        let destination = config
            .destination
            .clone()
            .ok_or_else(|| MirrorError::Config("a destination directory is required".to_string()))?;
        Ok(MirrorBuilder::new(source, destination)
            .with_patterns(config.patterns.clone())
            .with_glob_options(config.glob_options())
            .with_mirror_deletions(config.mirror_deletions)
            .with_initial_sync(config.initial_sync)
            .with_recovery(config.recovery_strategy()))
    }
}

/// Builder for a running mirror.
pub struct MirrorBuilder {
    source: PathBuf,
    destination: PathBuf,
    patterns: String,
    pattern_set: Option<PatternSet>,
    glob_options: GlobOptions,
    mirror_deletions: bool,
    initial_sync: bool,
    recovery: RecoveryStrategy,
    logger: Option<Arc<dyn MirrorLogger>>,
    backend: Option<Arc<dyn WatchBackend>>,
    cancel: Option<CancellationToken>,
    on_action_complete: Option<CompletionHook>,
}

impl MirrorBuilder {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            patterns: String::new(),
            pattern_set: None,
            glob_options: GlobOptions::default(),
            mirror_deletions: false,
            initial_sync: false,
            recovery: RecoveryStrategy::None,
            logger: None,
            backend: None,
            cancel: None,
            on_action_complete: None,
        }
    }

    /// Composite pattern string. Empty mirrors everything.
    pub fn with_patterns(mut self, patterns: impl Into<String>) -> Self {
        self.patterns = patterns.into();
        self
    }

    /// Use already compiled patterns instead of a pattern string.
    pub fn with_pattern_set(mut self, patterns: PatternSet) -> Self {
        self.pattern_set = Some(patterns);
        self
    }

    pub fn with_glob_options(mut self, options: GlobOptions) -> Self {
        self.glob_options = options;
        self
    }

    pub fn with_mirror_deletions(mut self, enabled: bool) -> Self {
        self.mirror_deletions = enabled;
        self
    }

    /// Copy existing matching entries whenever the source gets watched.
    pub fn with_initial_sync(mut self, enabled: bool) -> Self {
        self.initial_sync = enabled;
        self
    }

    pub fn with_recovery(mut self, strategy: RecoveryStrategy) -> Self {
        self.recovery = strategy;
        self
    }

    /// Activity logger. Defaults to [`TracingLogger`].
    pub fn with_logger(mut self, logger: Arc<dyn MirrorLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Native watch backend. Defaults to [`NotifyBackend`].
    pub fn with_backend(mut self, backend: Arc<dyn WatchBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Stop mirroring when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn on_action_complete(mut self, hook: CompletionHook) -> Self {
        self.on_action_complete = Some(hook);
        self
    }

    /// Validate the configuration and start watching. Must be called inside
    /// a tokio runtime; file actions run on it.
    pub fn start(self) -> Result<MirrorHandle> {
        let source = absolutize(&self.source)?;
        let destination = absolutize(&self.destination)?;
        ensure_disjoint(&source, &destination)?;

        let patterns = match self.pattern_set {
            Some(patterns) => patterns,
            None => PatternSet::parse(&self.patterns, self.glob_options)?,
        };
        let runtime = Handle::try_current().map_err(|_| MirrorError::NoRuntime)?;
        let cancel = self.cancel.unwrap_or_default().child_token();
        let tracker = TaskTracker::new();

        let dispatcher = Arc::new(Dispatcher {
            runtime,
            tracker: tracker.clone(),
            logger: self.logger.unwrap_or_else(|| Arc::new(TracingLogger)),
            source: source.clone(),
            destination: destination.clone(),
            remove_directories: patterns.selects_directories(),
            on_action_complete: self.on_action_complete,
        });

        let handlers = HookHandlers {
            on_created: Some(dispatcher.handler(FileAction::Copy)),
            on_modified: Some(dispatcher.handler(FileAction::Copy)),
            on_deleted: self
                .mirror_deletions
                .then(|| dispatcher.handler(FileAction::Delete)),
            on_attached: self.initial_sync.then(|| {
                let dispatcher = Arc::clone(&dispatcher);
                let patterns = patterns.clone();
                Arc::new(move |_: &Path| dispatcher.sync_existing(&patterns))
                    as Arc<dyn Fn(&Path) + Send + Sync>
            }),
        };

        info!(
            "Mirroring {} -> {} (deletions: {})",
            source.display(),
            destination.display(),
            self.mirror_deletions
        );

        let backend = self.backend.unwrap_or_else(|| Arc::new(NotifyBackend));
        let hook = RecoverableHook::start(
            backend,
            self.recovery,
            WatchConfig::new(source.clone(), patterns),
            handlers,
            &cancel,
        )?;

        Ok(MirrorHandle {
            hook,
            tracker,
            cancel,
            source,
            destination,
        })
    }
}

/// Mirror `source` into `destination` with the default backend.
pub fn mirror_directory(
    source: impl Into<PathBuf>,
    destination: impl Into<PathBuf>,
    patterns: &str,
    mirror_deletions: bool,
    recovery: RecoveryStrategy,
    logger: Option<Arc<dyn MirrorLogger>>,
    cancel: CancellationToken,
) -> Result<MirrorHandle> {
    let mut builder = Mirror::builder(source, destination)
        .with_patterns(patterns)
        .with_mirror_deletions(mirror_deletions)
        .with_recovery(recovery)
        .with_cancellation(cancel);
    if let Some(logger) = logger {
        builder = builder.with_logger(logger);
    }
    builder.start()
}

/// A running mirror. Dropping it stops watching; in-flight file actions
/// still run to completion.
pub struct MirrorHandle {
    hook: RecoverableHook,
    tracker: TaskTracker,
    cancel: CancellationToken,
    source: PathBuf,
    destination: PathBuf,
}

impl MirrorHandle {
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn status(&self) -> HookStatus {
        self.hook.status()
    }

    pub fn status_updates(&self) -> watch::Receiver<HookStatus> {
        self.hook.status_updates()
    }

    /// Resolves when mirroring stops on its own, i.e. recovery gave up.
    pub async fn finished(&mut self) -> Result<()> {
        self.hook.wait().await
    }

    /// Stop watching and wait for in-flight file actions.
    pub async fn shutdown(mut self) -> Result<()> {
        self.cancel.cancel();
        let result = self.hook.wait().await;
        self.tracker.close();
        self.tracker.wait().await;
        debug!("Mirror of {} shut down", self.source.display());
        result
    }
}

impl Drop for MirrorHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl fmt::Debug for MirrorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MirrorHandle")
            .field("source", &self.source)
            .field("destination", &self.destination)
            .field("status", &self.status())
            .finish()
    }
}

/// Turns selected events into file actions on the runtime.
struct Dispatcher {
    runtime: Handle,
    tracker: TaskTracker,
    logger: Arc<dyn MirrorLogger>,
    source: PathBuf,
    destination: PathBuf,
    remove_directories: bool,
    on_action_complete: Option<CompletionHook>,
}

impl Dispatcher {
    fn handler(self: &Arc<Self>, action: FileAction) -> EventHandler {
        let dispatcher = Arc::clone(self);
        Arc::new(move |event: &FileEvent| dispatcher.dispatch(action, event.clone()))
    }

    fn dispatch(&self, action: FileAction, event: FileEvent) {
        best_effort(|| self.logger.log_entry(&event));

        let destination = self.destination.join(&event.relative_path);
        let logger = Arc::clone(&self.logger);
        let on_action_complete = self.on_action_complete.clone();
        let keep_directories = action == FileAction::Delete && !self.remove_directories;
        self.tracker.spawn_on(
            async move {
                // A deleted entry cannot tell file from directory, so `*` also
                // matches a deleted subdirectory the patterns never selected.
                if keep_directories && is_directory(&destination).await {
                    debug!("Keeping unselected directory {}", destination.display());
                    return;
                }
                let result = action.apply(&event.path, &destination).await;
                match &result {
                    Ok(()) => best_effort(|| logger.log_success(&event)),
                    Err(e) => best_effort(|| logger.log_failure(&event, e)),
                }
                if let Some(hook) = on_action_complete {
                    let outcome = ActionOutcome {
                        action,
                        event,
                        destination,
                        error: result.err().map(|e| e.to_string()),
                    };
                    best_effort(|| {
                        hook(&outcome);
                        Ok(())
                    });
                }
            },
            &self.runtime,
        );
    }

    /// Copy every existing entry the patterns select.
    fn sync_existing(self: &Arc<Self>, patterns: &PatternSet) {
        let dispatcher = Arc::clone(self);
        let patterns = patterns.clone();
        self.tracker.spawn_blocking_on(
            move || {
                let max_depth = if patterns.requires_subdirectories() {
                    usize::MAX
                } else {
                    1
                };
                let mut synced = 0usize;
                for entry in WalkDir::new(&dispatcher.source)
                    .min_depth(1)
                    .max_depth(max_depth)
                    .into_iter()
                    .filter_map(|entry| entry.ok())
                {
                    let Ok(relative) = entry.path().strip_prefix(&dispatcher.source) else {
                        continue;
                    };
                    let kind = if entry.file_type().is_dir() {
                        EntryKind::Directory
                    } else {
                        EntryKind::File
                    };
                    if patterns.selects(relative, kind) {
                        let event = FileEvent::new(FileEventKind::Created, entry.path(), relative);
                        dispatcher.dispatch(FileAction::Copy, event);
                        synced += 1;
                    }
                }
                debug!("Initial sync of {} queued {synced} copies", dispatcher.source.display());
            },
            &self.runtime,
        );
    }
}

async fn is_directory(path: &Path) -> bool {
    tokio::fs::symlink_metadata(path)
        .await
        .is_ok_and(|metadata| metadata.is_dir())
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    Ok(path.absolutize()?.into_owned())
}

/// Source and destination must not contain each other.
fn ensure_disjoint(source: &Path, destination: &Path) -> Result<()> {
    if destination.starts_with(source) || source.starts_with(destination) {
        return Err(MirrorError::OverlappingPaths {
            source_dir: source.display().to_string(),
            destination: destination.display().to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::fake::FakeBackend;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    struct Fixture {
        _temp: TempDir,
        source: PathBuf,
        destination: PathBuf,
        backend: Arc<FakeBackend>,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("src");
        let destination = temp.path().join("dst");
        std::fs::create_dir(&source).unwrap();
        Fixture {
            _temp: temp,
            source,
            destination,
            backend: FakeBackend::new(),
        }
    }

    fn outcomes() -> (CompletionHook, mpsc::UnboundedReceiver<ActionOutcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let hook: CompletionHook = Arc::new(move |outcome: &ActionOutcome| {
            let _ = tx.send(outcome.clone());
        });
        (hook, rx)
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<ActionOutcome>) -> ActionOutcome {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for a file action")
            .expect("completion channel closed")
    }

    #[derive(Default)]
    struct Lines(Mutex<Vec<String>>);

    impl MirrorLogger for Lines {
        fn log(&self, line: &str) -> anyhow::Result<()> {
            self.0.lock().unwrap().push(line.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_overlapping_paths_are_rejected() {
        assert!(ensure_disjoint(Path::new("/a"), Path::new("/b")).is_ok());
        assert!(ensure_disjoint(Path::new("/a/b"), Path::new("/a/bc")).is_ok());
        assert!(ensure_disjoint(Path::new("/a"), Path::new("/a")).is_err());
        assert!(ensure_disjoint(Path::new("/a"), Path::new("/a/b")).is_err());
        assert!(ensure_disjoint(Path::new("/a/b"), Path::new("/a")).is_err());
    }

    #[tokio::test]
    async fn test_start_rejects_nested_destination() {
        let f = fixture();
        let err = Mirror::builder(&f.source, f.source.join("out"))
            .with_backend(f.backend.clone())
            .start()
            .unwrap_err();

        assert!(matches!(err, MirrorError::OverlappingPaths { .. }));
        assert_eq!(f.backend.hook_count(), 0);
    }

    #[test]
    fn test_start_requires_a_runtime() {
        let f = fixture();
        let err = Mirror::builder(&f.source, &f.destination)
            .with_backend(f.backend.clone())
            .start()
            .unwrap_err();

        assert!(matches!(err, MirrorError::NoRuntime));
    }

    #[tokio::test]
    async fn test_created_files_are_copied() {
        let f = fixture();
        let (hook, mut rx) = outcomes();
        let lines = Arc::new(Lines::default());
        let handle = Mirror::builder(&f.source, &f.destination)
            .with_patterns("*.txt")
            .with_backend(f.backend.clone())
            .with_logger(lines.clone())
            .on_action_complete(hook)
            .start()
            .unwrap();

        let file = f.source.join("a.txt");
        std::fs::write(&file, "hello").unwrap();
        f.backend.change(0, FileEventKind::Created, &file);
        f.backend.change(0, FileEventKind::Created, f.source.join("b.md"));

        let outcome = next(&mut rx).await;
        assert!(outcome.is_success(), "{:?}", outcome.error);
        assert_eq!(outcome.action, FileAction::Copy);
        assert_eq!(outcome.destination, f.destination.join("a.txt"));
        assert_eq!(std::fs::read_to_string(f.destination.join("a.txt")).unwrap(), "hello");

        handle.shutdown().await.unwrap();
        assert_eq!(
            *lines.0.lock().unwrap(),
            vec![
                format!("'{}' created", file.display()),
                format!("'{}' copied successfully", file.display()),
            ]
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_deletions_are_mirrored_only_when_enabled() {
        for mirror_deletions in [false, true] {
            let f = fixture();
            std::fs::create_dir_all(&f.destination).unwrap();
            std::fs::write(f.destination.join("a.txt"), "old").unwrap();
            let (hook, mut rx) = outcomes();
            let handle = Mirror::builder(&f.source, &f.destination)
                .with_backend(f.backend.clone())
                .with_mirror_deletions(mirror_deletions)
                .on_action_complete(hook)
                .start()
                .unwrap();

            f.backend.change(0, FileEventKind::Deleted, f.source.join("a.txt"));
            handle.shutdown().await.unwrap();

            if mirror_deletions {
                let outcome = next(&mut rx).await;
                assert_eq!(outcome.action, FileAction::Delete);
                assert!(outcome.is_success());
                assert!(!f.destination.join("a.txt").exists());
            } else {
                assert!(rx.try_recv().is_err());
                assert!(f.destination.join("a.txt").exists());
            }
        }
    }

    #[tokio::test]
    async fn test_directories_are_created_and_removed() {
        let f = fixture();
        let (hook, mut rx) = outcomes();
        let _handle = Mirror::builder(&f.source, &f.destination)
            .with_patterns("")
            .with_backend(f.backend.clone())
            .with_mirror_deletions(true)
            .on_action_complete(hook)
            .start()
            .unwrap();

        let sub = f.source.join("sub");
        std::fs::create_dir(&sub).unwrap();
        f.backend.change(0, FileEventKind::Created, &sub);
        assert!(next(&mut rx).await.is_success());
        assert!(f.destination.join("sub").is_dir());

        std::fs::write(f.destination.join("sub").join("left.txt"), "x").unwrap();
        std::fs::remove_dir(&sub).unwrap();
        f.backend.change(0, FileEventKind::Deleted, &sub);
        assert!(next(&mut rx).await.is_success());
        assert!(!f.destination.join("sub").exists());
    }

    #[tokio::test]
    async fn test_file_patterns_never_delete_directories() {
        let f = fixture();
        let kept = f.destination.join("sub").join("keep.txt");
        std::fs::create_dir_all(kept.parent().unwrap()).unwrap();
        std::fs::write(&kept, "keep").unwrap();
        std::fs::write(f.destination.join("a.txt"), "old").unwrap();
        let (hook, mut rx) = outcomes();
        let handle = Mirror::builder(&f.source, &f.destination)
            .with_patterns("*")
            .with_backend(f.backend.clone())
            .with_mirror_deletions(true)
            .on_action_complete(hook)
            .start()
            .unwrap();

        f.backend.change(0, FileEventKind::Deleted, f.source.join("sub"));
        f.backend.change(0, FileEventKind::Deleted, f.source.join("a.txt"));
        handle.shutdown().await.unwrap();

        let outcome = next(&mut rx).await;
        assert_eq!(outcome.destination, f.destination.join("a.txt"));
        assert!(rx.try_recv().is_err());
        assert!(!f.destination.join("a.txt").exists());
        assert_eq!(std::fs::read_to_string(&kept).unwrap(), "keep");
    }

    #[tokio::test]
    async fn test_compiled_pattern_set_is_used() {
        let f = fixture();
        let patterns = PatternSet::new(["**"], ["**/*.tmp"], GlobOptions::default()).unwrap();
        let (hook, mut rx) = outcomes();
        let handle = Mirror::builder(&f.source, &f.destination)
            .with_patterns("*.md")
            .with_pattern_set(patterns)
            .with_backend(f.backend.clone())
            .on_action_complete(hook)
            .start()
            .unwrap();
        assert!(f.backend.requests()[0].recursive);

        std::fs::create_dir(f.source.join("sub")).unwrap();
        std::fs::write(f.source.join("sub").join("a.txt"), "a").unwrap();
        std::fs::write(f.source.join("sub").join("b.tmp"), "b").unwrap();
        f.backend.change(0, FileEventKind::Created, f.source.join("sub").join("b.tmp"));
        f.backend.change(0, FileEventKind::Created, f.source.join("sub").join("a.txt"));
        handle.shutdown().await.unwrap();

        let outcome = next(&mut rx).await;
        assert_eq!(outcome.destination, f.destination.join("sub").join("a.txt"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_failed_actions_are_reported() {
        let f = fixture();
        let (hook, mut rx) = outcomes();
        let lines = Arc::new(Lines::default());
        let _handle = Mirror::builder(&f.source, &f.destination)
            .with_backend(f.backend.clone())
            .with_logger(lines.clone())
            .on_action_complete(hook)
            .start()
            .unwrap();

        // modified, but already gone when the copy runs
        f.backend.change(0, FileEventKind::Modified, f.source.join("vanished.txt"));
        let outcome = next(&mut rx).await;

        assert!(!outcome.is_success());
        let last = lines.0.lock().unwrap().last().cloned().unwrap();
        assert!(last.contains("copying failed"), "{last}");
    }

    #[tokio::test]
    async fn test_initial_sync_copies_existing_entries() {
        let f = fixture();
        std::fs::write(f.source.join("a.txt"), "a").unwrap();
        std::fs::write(f.source.join("b.md"), "b").unwrap();
        std::fs::create_dir(f.source.join("nested")).unwrap();
        std::fs::write(f.source.join("nested").join("c.txt"), "c").unwrap();
        let (hook, mut rx) = outcomes();

        let handle = Mirror::builder(&f.source, &f.destination)
            .with_patterns("*.txt")
            .with_backend(f.backend.clone())
            .with_initial_sync(true)
            .on_action_complete(hook)
            .start()
            .unwrap();

        let outcome = next(&mut rx).await;
        handle.shutdown().await.unwrap();

        assert_eq!(outcome.destination, f.destination.join("a.txt"));
        assert!(rx.try_recv().is_err());
        assert!(!f.destination.join("b.md").exists());
        assert!(!f.destination.join("nested").exists());
    }

    #[tokio::test]
    async fn test_logger_failures_do_not_stop_mirroring() {
        struct Broken;

        impl MirrorLogger for Broken {
            fn log(&self, _line: &str) -> anyhow::Result<()> {
                panic!("broken logger");
            }
        }

        let f = fixture();
        let (hook, mut rx) = outcomes();
        let _handle = Mirror::builder(&f.source, &f.destination)
            .with_backend(f.backend.clone())
            .with_logger(Arc::new(Broken))
            .on_action_complete(hook)
            .start()
            .unwrap();

        std::fs::write(f.source.join("a.txt"), "a").unwrap();
        f.backend.change(0, FileEventKind::Created, f.source.join("a.txt"));

        assert!(next(&mut rx).await.is_success());
    }

    #[tokio::test]
    async fn test_from_config_requires_paths() {
        let err = Mirror::from_config(&MirrorConfig::default()).err().unwrap();
        assert!(err.is_configuration());
    }
}
