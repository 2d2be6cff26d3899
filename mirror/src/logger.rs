//! Activity logging for mirrored file actions.
//!
//! A [`MirrorLogger`] receives one line per event and per action outcome.
//! Only [`MirrorLogger::log`] is required; the message formats live in the
//! provided methods. The mirror never lets a logger failure (error or panic)
//! interrupt mirroring, see [`best_effort`].

use std::fs::OpenOptions;
use std::io::Write;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context;
use tracing::{debug, info, warn};

use crate::error::{MirrorError, Result};
use crate::event::{FileEvent, FileEventKind};

/// Destination for activity lines.
pub trait MirrorLogger: Send + Sync {
    /// Write one line.
    fn log(&self, line: &str) -> anyhow::Result<()>;

    /// A selected change was observed.
    fn log_entry(&self, event: &FileEvent) -> anyhow::Result<()> {
        self.log(&format!("'{}' {}", event.path.display(), event.kind.describe()))
    }

    /// The action for `event` completed.
    fn log_success(&self, event: &FileEvent) -> anyhow::Result<()> {
        let done = match event.kind {
            FileEventKind::Deleted => "deleted",
            FileEventKind::Created | FileEventKind::Modified => "copied",
        };
        self.log(&format!("'{}' {done} successfully", event.path.display()))
    }

    /// The action for `event` failed.
    fn log_failure(&self, event: &FileEvent, error: &MirrorError) -> anyhow::Result<()> {
        self.log(&failure_line(event, error))
    }
}

fn failure_line(event: &FileEvent, error: &MirrorError) -> String {
    let doing = match event.kind {
        FileEventKind::Deleted => "deleting",
        FileEventKind::Created | FileEventKind::Modified => "copying",
    };
    format!("'{}' {doing} failed: {error}", event.path.display())
}

/// Run a logging call, discarding its error and any panic.
pub fn best_effort<F>(log: F)
where
    F: FnOnce() -> anyhow::Result<()>,
{
    match catch_unwind(AssertUnwindSafe(log)) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!("Activity logger failed: {e:#}"),
        Err(_) => debug!("Activity logger panicked"),
    }
}

/// Emits activity lines as `tracing` events. The default.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl MirrorLogger for TracingLogger {
    fn log(&self, line: &str) -> anyhow::Result<()> {
        info!(target: "fsmirror::activity", "{line}");
        Ok(())
    }

    fn log_failure(&self, event: &FileEvent, error: &MirrorError) -> anyhow::Result<()> {
        let line = failure_line(event, error);
        warn!(target: "fsmirror::activity", "{line}");
        Ok(())
    }
}

/// Prints activity lines to standard output.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutLogger;

impl MirrorLogger for StdoutLogger {
    fn log(&self, line: &str) -> anyhow::Result<()> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{line}")?;
        Ok(())
    }
}

/// Appends timestamped activity lines to a file.
#[derive(Debug)]
pub struct FileLogger {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileLogger {
    /// Timestamp prefix of every line, in local time.
    pub const TIMESTAMP_FORMAT: &'static str = "%Y-%m-%d %H-%M:%S%.3f - ";

    /// `path` must be absolute. The file and its parent directories are
    /// created on the first write.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.is_absolute() {
            return Err(MirrorError::InvalidLogPath(path.display().to_string()));
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MirrorLogger for FileLogger {
    fn log(&self, line: &str) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening {}", self.path.display()))?;
        let timestamp = chrono::Local::now().format(Self::TIMESTAMP_FORMAT);
        writeln!(file, "{timestamp}{line}")?;
        Ok(())
    }
}

/// Resolve a `--logfile` style target: `stdout` or an absolute file path.
pub fn logger_for(target: &str) -> Result<Arc<dyn MirrorLogger>> {
    if target.eq_ignore_ascii_case("stdout") {
        return Ok(Arc::new(StdoutLogger));
    }
    Ok(Arc::new(FileLogger::new(target)?))
}
