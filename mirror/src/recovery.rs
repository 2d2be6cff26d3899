//! Keeps a watch attached while its directory comes and goes.
//!
//! A [`RecoverableHook`] hooks the target directory. When that fails, or
//! the watch later reports an error, it walks up the target's ancestors,
//! watches the nearest one that exists for the creation of the next path
//! component, and retries once that appears. All attempts run on a single
//! task fed by a signal channel, so at most one attempt is ever in flight.
//! Every installed watch gets a generation number; signals from superseded
//! watches are ignored.
//!
//! ```text
//!   hook target ──ok──▶ Active ──error──┐
//!        │                              │
//!      fail                             ▼
//!        └──────────────▶ walk ancestors ──▶ WatchingAncestor
//!                               ▲                  │
//!                               └── child created ─┘
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{MirrorError, Result};
use crate::event::{FileEvent, FileEventKind, WatchMask};
use crate::filter::{ErrorHandler, EventHandler, SubscriberId, WatchConfig, WatchFilter};
use crate::native::WatchBackend;
use crate::pattern_set::PatternSet;

/// Default pause between consecutive failed attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(250);

/// How a failed hook is recovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryStrategy {
    /// The first failure is final.
    None,

    /// Watch the nearest existing ancestor until the target reappears.
    WalkAncestors(AncestorWalk),
}

impl RecoveryStrategy {
    /// Ancestor walking without an attempt bound.
    pub fn walk_ancestors() -> Self {
        Self::WalkAncestors(AncestorWalk::default())
    }

    fn failure_budget(&self) -> Option<usize> {
        match self {
            Self::None => Some(1),
            Self::WalkAncestors(walk) => walk.max_attempts,
        }
    }

    fn retry_delay(&self) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::WalkAncestors(walk) => walk.retry_delay,
        }
    }

    /// Candidates for hooking, nearest first: the target itself, then each
    /// ancestor paired with the name of its child on the way to the target.
    pub fn hookable_parents(&self, target: &Path) -> Vec<(PathBuf, Option<String>)> {
        match self {
            Self::None => vec![(target.to_path_buf(), None)],
            Self::WalkAncestors(walk) => walk.hookable_parents(target),
        }
    }
}

/// Parameters of ancestor walking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AncestorWalk {
    /// Give up after this many consecutive failures. `None` retries forever.
    pub max_attempts: Option<usize>,

    /// Pause between consecutive failed attempts.
    pub retry_delay: Duration,

    /// Never walk above this directory.
    pub ceiling: Option<PathBuf>,
}

impl Default for AncestorWalk {
    fn default() -> Self {
        Self {
            max_attempts: None,
            retry_delay: DEFAULT_RETRY_DELAY,
            ceiling: None,
        }
    }
}

impl AncestorWalk {
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_ceiling(mut self, ceiling: impl Into<PathBuf>) -> Self {
        self.ceiling = Some(ceiling.into());
        self
    }

    fn hookable_parents(&self, target: &Path) -> Vec<(PathBuf, Option<String>)> {
        let mut parents = vec![(target.to_path_buf(), None)];
        let mut current = target;
        while let Some(parent) = current.parent() {
            if parent.as_os_str().is_empty() {
                break;
            }
            if let Some(ceiling) = &self.ceiling {
                if current == ceiling.as_path() || !current.starts_with(ceiling) {
                    break;
                }
            }
            let Some(name) = current.file_name() else {
                break;
            };
            parents.push((parent.to_path_buf(), Some(name.to_string_lossy().into_owned())));
            current = parent;
        }
        parents
    }
}

/// Observable state of a [`RecoverableHook`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookStatus {
    Idle,
    Attempting,

    /// The target itself is watched.
    Active { path: PathBuf },

    /// An ancestor is watched for the creation of `child`.
    WatchingAncestor {
        ancestor: PathBuf,
        child: String,
        failures: usize,
    },

    /// Recovery gave up or hit a configuration error.
    Failed { reason: String },

    /// Cancelled.
    Stopped,
}

type AttachHandler = Arc<dyn Fn(&Path) + Send + Sync>;

/// Subscribers installed on every watch of the target.
#[derive(Clone, Default)]
pub struct HookHandlers {
    pub on_created: Option<EventHandler>,
    pub on_modified: Option<EventHandler>,
    pub on_deleted: Option<EventHandler>,

    /// Called each time the target itself gets watched.
    pub on_attached: Option<AttachHandler>,
}

impl HookHandlers {
    fn for_kind(&self, kind: FileEventKind) -> Option<&EventHandler> {
        match kind {
            FileEventKind::Created => self.on_created.as_ref(),
            FileEventKind::Modified => self.on_modified.as_ref(),
            FileEventKind::Deleted => self.on_deleted.as_ref(),
        }
    }
}

#[derive(Debug)]
enum Signal {
    Reattempt { generation: u64 },
    Failed { generation: u64, error: Arc<MirrorError> },
}

/// A watch on a directory that survives the directory being removed and
/// recreated.
///
/// The first attempt runs synchronously inside [`RecoverableHook::start`];
/// later ones run on a background task. Dropping the hook cancels it.
pub struct RecoverableHook {
    target: PathBuf,
    cancel: CancellationToken,
    status: watch::Receiver<HookStatus>,
    task: Option<JoinHandle<Result<()>>>,
}

impl RecoverableHook {
    /// Hook `config.root`. Fails on configuration errors and, without a
    /// recovery strategy, when the first attempt fails.
    pub fn start(
        backend: Arc<dyn WatchBackend>,
        strategy: RecoveryStrategy,
        config: WatchConfig,
        handlers: HookHandlers,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| MirrorError::NoRuntime)?;
        let cancel = cancel.child_token();
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(HookStatus::Idle);
        let target = config.root.clone();

        let mut retryer = Retryer {
            backend,
            strategy,
            config,
            handlers,
            cancel: cancel.clone(),
            signals: signal_tx,
            status: status_tx,
            active: Vec::new(),
            failures: Vec::new(),
            generation: 0,
        };

        let retry_pending = match retryer.cycle() {
            Ok(pending) => pending,
            Err(e) => {
                retryer.stop_with(Some(&e));
                return Err(e);
            }
        };

        let task = runtime.spawn(retryer.run(signal_rx, retry_pending));
        Ok(Self {
            target,
            cancel,
            status: status_rx,
            task: Some(task),
        })
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn status(&self) -> HookStatus {
        self.status.borrow().clone()
    }

    /// A receiver for status changes.
    pub fn status_updates(&self) -> watch::Receiver<HookStatus> {
        self.status.clone()
    }

    /// Stop recovering and dispose every watch.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Resolves once the hook stops, either cancelled or after a fatal error.
    pub async fn wait(&mut self) -> Result<()> {
        match self.task.take() {
            Some(task) => task
                .await
                .map_err(|e| MirrorError::Task(e.to_string()))?,
            None => Ok(()),
        }
    }
}

impl Drop for RecoverableHook {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct Retryer {
    backend: Arc<dyn WatchBackend>,
    strategy: RecoveryStrategy,
    config: WatchConfig,
    handlers: HookHandlers,
    cancel: CancellationToken,
    signals: mpsc::UnboundedSender<Signal>,
    status: watch::Sender<HookStatus>,
    active: Vec<WatchFilter>,
    failures: Vec<Arc<MirrorError>>,
    generation: u64,
}

impl Retryer {
    async fn run(
        mut self,
        mut signals: mpsc::UnboundedReceiver<Signal>,
        retry_pending: bool,
    ) -> Result<()> {
        let result = self.drive(&mut signals, retry_pending).await;
        self.stop_with(result.as_ref().err());
        result
    }

    async fn drive(
        &mut self,
        signals: &mut mpsc::UnboundedReceiver<Signal>,
        mut retry_pending: bool,
    ) -> Result<()> {
        loop {
            if retry_pending {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Ok(()),
                    _ = tokio::time::sleep(self.strategy.retry_delay()) => {}
                }
                retry_pending = self.cycle()?;
                continue;
            }

            let signal = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(()),
                signal = signals.recv() => signal,
            };
            let Some(signal) = signal else {
                return Ok(());
            };

            match signal {
                Signal::Reattempt { generation } if generation == self.generation => {
                    info!("Re-attempting to hook {}", self.config.root.display());
                    retry_pending = self.cycle()?;
                }
                Signal::Failed { generation, error } if generation == self.generation => {
                    warn!("Watch on {} failed: {error}", self.config.root.display());
                    self.record_failure(error)?;
                    retry_pending = self.cycle()?;
                }
                stale => debug!("Ignoring signal from a superseded watch: {stale:?}"),
            }
        }
    }

    /// Runs attempts until one succeeds or a retry has to wait. Returns
    /// whether a delayed retry is pending.
    fn cycle(&mut self) -> Result<bool> {
        loop {
            if self.cancel.is_cancelled() {
                return Ok(false);
            }
            let direct = self.failures.is_empty();
            match self.attempt() {
                Ok(()) => return Ok(false),
                Err(e) if e.is_configuration() => return Err(e),
                Err(e) => {
                    debug!("Hook attempt on {} failed: {e}", self.config.root.display());
                    self.record_failure(Arc::new(e))?;
                    if !direct {
                        return Ok(true);
                    }
                }
            }
        }
    }

    fn record_failure(&mut self, error: Arc<MirrorError>) -> Result<()> {
        self.failures.push(error);
        let Some(budget) = self.strategy.failure_budget() else {
            return Ok(());
        };
        if self.failures.len() < budget {
            return Ok(());
        }

        let attempts = self.failures.len();
        let last = self
            .failures
            .pop()
            .map(|last| Arc::try_unwrap(last).unwrap_or_else(MirrorError::Watch));
        Err(match (&self.strategy, last) {
            (RecoveryStrategy::None, Some(last)) => last,
            (_, last) => MirrorError::RecoveryExhausted {
                attempts,
                last: last.map(|e| e.to_string()).unwrap_or_default(),
            },
        })
    }

    fn attempt(&mut self) -> Result<()> {
        self.publish(HookStatus::Attempting);

        if self.failures.is_empty() {
            let watch = self.hook_target()?;
            self.install(watch);
            self.attached();
            return Ok(());
        }

        let target = self.config.root.clone();
        for (directory, child) in self.strategy.hookable_parents(&target) {
            if !directory.is_dir() {
                continue;
            }
            match child {
                None => {
                    let watch = self.hook_target()?;
                    self.install(watch);
                    self.failures.clear();
                    info!("Recovered watch on {}", target.display());
                    self.attached();
                }
                Some(child) => {
                    let watch = self.hook_ancestor(&directory, &child)?;
                    self.install(watch);
                    info!(
                        "Waiting for {} to appear in {}",
                        child,
                        directory.display()
                    );
                    let appeared = directory.join(&child).is_dir();
                    self.publish(HookStatus::WatchingAncestor {
                        ancestor: directory,
                        child,
                        failures: self.failures.len(),
                    });
                    // Created between the existence check and the hook.
                    if appeared {
                        let _ = self.signals.send(Signal::Reattempt {
                            generation: self.generation,
                        });
                    }
                }
            }
            return Ok(());
        }

        Err(MirrorError::NoHookableAncestor(target.display().to_string()))
    }

    fn hook_target(&mut self) -> Result<WatchFilter> {
        self.generation += 1;
        let watch = WatchFilter::hook(self.backend.as_ref(), self.config.clone(), &self.cancel)?;
        for kind in FileEventKind::ALL {
            if let Some(handler) = self.handlers.for_kind(kind) {
                watch.add_handler(kind, SubscriberId::new(), Arc::clone(handler))?;
            }
        }
        watch.add_error_handler(SubscriberId::new(), self.failure_reporter())?;
        Ok(watch)
    }

    fn hook_ancestor(&mut self, directory: &Path, child: &str) -> Result<WatchFilter> {
        self.generation += 1;
        let generation = self.generation;
        // Every creation is seen; the child name is compared literally since
        // a directory name may contain glob metacharacters.
        let config = WatchConfig::new(directory, PatternSet::default())
            .with_mask(WatchMask::CREATIONS)
            .non_recursive();
        let watch = WatchFilter::hook(self.backend.as_ref(), config, &self.cancel)?;

        let signals = self.signals.clone();
        let fired = AtomicBool::new(false);
        let child = child.to_string();
        let case_sensitive = self.config.patterns.options().case_sensitive;
        watch.add_handler(
            FileEventKind::Created,
            SubscriberId::new(),
            Arc::new(move |event: &FileEvent| {
                if !is_child(&event.relative_path, &child, case_sensitive) || !event.path.is_dir() {
                    return;
                }
                if !fired.swap(true, Ordering::AcqRel) {
                    debug!("{} appeared", event.path.display());
                    let _ = signals.send(Signal::Reattempt { generation });
                }
            }),
        )?;
        watch.add_error_handler(SubscriberId::new(), self.failure_reporter())?;
        Ok(watch)
    }

    fn failure_reporter(&self) -> ErrorHandler {
        let signals = self.signals.clone();
        let generation = self.generation;
        Arc::new(move |error| {
            let _ = signals.send(Signal::Failed { generation, error });
        })
    }

    /// Dispose what was active, then record the new watch.
    fn install(&mut self, watch: WatchFilter) {
        for old in self.active.drain(..) {
            old.dispose();
        }
        self.active.push(watch);
    }

    fn attached(&self) {
        let target = &self.config.root;
        self.publish(HookStatus::Active {
            path: target.clone(),
        });
        if let Some(on_attached) = &self.handlers.on_attached {
            on_attached(target);
        }
    }

    fn publish(&self, status: HookStatus) {
        self.status.send_replace(status);
    }

    fn stop_with(&mut self, error: Option<&MirrorError>) {
        for watch in self.active.drain(..) {
            watch.dispose();
        }
        match error {
            None => {
                debug!("Stopped watching {}", self.config.root.display());
                self.publish(HookStatus::Stopped);
            }
            Some(e) => {
                error!("Giving up on {}: {e}", self.config.root.display());
                self.publish(HookStatus::Failed {
                    reason: e.to_string(),
                });
            }
        }
    }
}

fn is_child(relative: &Path, child: &str, case_sensitive: bool) -> bool {
    let name = relative.to_string_lossy();
    if case_sensitive {
        name == child
    } else {
        name.to_lowercase() == child.to_lowercase()
    }
}
