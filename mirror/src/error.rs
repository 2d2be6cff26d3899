//! Error types for the mirror.

use std::sync::Arc;

use thiserror::Error;

/// Result type alias for mirror operations.
pub type Result<T> = std::result::Result<T, MirrorError>;

/// Errors that can occur while watching or mirroring.
#[derive(Error, Debug)]
pub enum MirrorError {
    /// A pattern uses the recursive wildcard more than once.
    #[error("pattern contains more than one '**': {0}")]
    MultipleRecursiveWildcards(String),

    /// A directory-only pattern was given to a watch that ignores directories.
    #[error("directory-only pattern '{0}' requires a watch that reports directories")]
    DirectoryPatternWithoutDirectories(String),

    /// Source and destination overlap, which would mirror forever.
    #[error("destination '{destination}' cannot be nested in or contain source '{source_dir}'")]
    OverlappingPaths {
        source_dir: String,
        destination: String,
    },

    /// No ancestor of the target exists, not even the root.
    #[error("no hookable ancestor exists for: {0}")]
    NoHookableAncestor(String),

    /// The file logger needs an absolute path.
    #[error("log path must be absolute: {0}")]
    InvalidLogPath(String),

    /// A handler with the same subscriber id is already registered.
    #[error("subscriber {0} is already registered")]
    DuplicateSubscriber(u64),

    /// Directory not found.
    #[error("directory not found: {0}")]
    DirectoryNotFound(String),

    /// The watched directory disappeared while being watched.
    #[error("watched directory was removed: {0}")]
    WatchedPathRemoved(String),

    /// Recovery gave up.
    #[error("recovery gave up after {attempts} consecutive failures, last: {last}")]
    RecoveryExhausted { attempts: usize, last: String },

    /// Setup happened outside of a tokio runtime.
    #[error("no tokio runtime is available to dispatch file actions")]
    NoRuntime,

    /// A failure reported by a running watch, shared with its other
    /// observers.
    #[error(transparent)]
    Watch(Arc<MirrorError>),

    /// A background task stopped abnormally.
    #[error("background task failed: {0}")]
    Task(String),

    /// Notify error.
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed.
    #[error("invalid configuration file: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl MirrorError {
    /// Whether the error comes from the configuration rather than from the
    /// file system. Such errors are fatal and never retried.
    pub fn is_configuration(&self) -> bool {
        match self {
            Self::Watch(inner) => inner.is_configuration(),
            _ => matches!(
                self,
                Self::MultipleRecursiveWildcards(_)
                    | Self::DirectoryPatternWithoutDirectories(_)
                    | Self::OverlappingPaths { .. }
                    | Self::NoHookableAncestor(_)
                    | Self::InvalidLogPath(_)
                    | Self::DuplicateSubscriber(_)
                    | Self::NoRuntime
                    | Self::Toml(_)
                    | Self::Config(_)
            ),
        }
    }
}
