//! # fsmirror
//!
//! Mirrors file changes from a source directory into a destination
//! directory, selecting files with glob patterns and surviving the source
//! directory being removed and recreated.
//!
//! ## Features
//!
//! - **Glob Selection**: `?`, `*` and one recursive `**` per pattern, with
//!   allow and `!`-prefixed deny lists
//! - **Self-Recovering Watches**: when the source disappears, its nearest
//!   existing ancestor is watched until the source comes back
//! - **Concurrent File Actions**: copies and deletions run as tokio tasks
//! - **Activity Logging**: pluggable [`MirrorLogger`] with tracing, stdout
//!   and file implementations
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                             Mirror                               │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  PatternSet ──► WatchFilter ──► RecoverableHook ──► Dispatcher   │
//! │      │              │                 │                 │        │
//! │      ▼              ▼                 ▼                 ▼        │
//! │ GlobPattern   WatchBackend      ancestor watch     FileAction    │
//! │               (notify)                             MirrorLogger  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! # async fn run() -> fsmirror::Result<()> {
//! use fsmirror::{Mirror, RecoveryStrategy};
//!
//! let handle = Mirror::builder("/home/me/notes", "/mnt/backup/notes")
//!     .with_patterns("**/*.md")
//!     .with_mirror_deletions(true)
//!     .with_recovery(RecoveryStrategy::walk_ancestors())
//!     .start()?;
//! // ...
//! handle.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod filter;
pub mod glob;
pub mod logger;
pub mod mirror;
pub mod native;
pub mod pattern_set;
pub mod recovery;

pub use config::{MatchingConfig, MirrorConfig, RecoveryConfig};
pub use error::{MirrorError, Result};
pub use event::{FileEvent, FileEventKind, WatchMask};
pub use filter::{ErrorHandler, EventHandler, SubscriberId, WatchConfig, WatchFilter};
pub use glob::{EntryKind, GlobOptions, GlobPattern};
pub use logger::{
    FileLogger, MirrorLogger, StdoutLogger, TracingLogger, best_effort, logger_for,
};
pub use mirror::{
    ActionOutcome, CompletionHook, FileAction, Mirror, MirrorBuilder, MirrorHandle,
    mirror_directory,
};
pub use native::{HookRequest, NativeWatch, NotifyBackend, RawEvent, RawEventSink, WatchBackend};
pub use pattern_set::{PATTERN_LIST_SEPARATOR, PatternSet};
pub use recovery::{AncestorWalk, HookHandlers, HookStatus, RecoverableHook, RecoveryStrategy};
