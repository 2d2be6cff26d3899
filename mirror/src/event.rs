//! File events delivered by watches.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A selected file system change.
#[derive(Debug, Clone)]
pub struct FileEvent {
    /// The kind of change.
    pub kind: FileEventKind,

    /// Full path of the affected file or directory.
    pub path: PathBuf,

    /// Path relative to the watched root.
    pub relative_path: PathBuf,

    /// When the event was observed.
    pub timestamp: DateTime<Utc>,
}

impl FileEvent {
    /// Create a new file event.
    pub fn new(
        kind: FileEventKind,
        path: impl Into<PathBuf>,
        relative_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            kind,
            path: path.into(),
            relative_path: relative_path.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Kind of file event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileEventKind {
    /// File or directory was created.
    Created,

    /// File or directory was modified.
    Modified,

    /// File or directory was deleted.
    Deleted,
}

impl FileEventKind {
    /// Every kind, in subscription table order.
    pub const ALL: [Self; 3] = [Self::Created, Self::Modified, Self::Deleted];

    /// Past-tense verb used in activity log lines.
    pub fn describe(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "changed",
            Self::Deleted => "deleted",
        }
    }
}

/// Which changes a native watch reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchMask {
    pub created: bool,
    pub modified: bool,
    pub deleted: bool,

    /// Report changes to directories, not only files.
    pub directories: bool,
}

impl WatchMask {
    /// Every change to files and directories.
    pub const ALL: Self = Self {
        created: true,
        modified: true,
        deleted: true,
        directories: true,
    };

    /// Only creations, including directories.
    pub const CREATIONS: Self = Self {
        created: true,
        modified: false,
        deleted: false,
        directories: true,
    };

    pub fn includes(self, kind: FileEventKind) -> bool {
        match kind {
            FileEventKind::Created => self.created,
            FileEventKind::Modified => self.modified,
            FileEventKind::Deleted => self.deleted,
        }
    }
}

impl Default for WatchMask {
    fn default() -> Self {
        Self::ALL
    }
}

/// Translate a notify event into created/modified/deleted changes.
///
/// Renames become a deletion of the old path and a creation of the new one.
/// Access events carry no change and are dropped.
pub(crate) fn classify(event: &notify::Event) -> Vec<(FileEventKind, PathBuf)> {
    use notify::EventKind;
    use notify::event::{ModifyKind, RenameMode};

    let all = |kind: FileEventKind| -> Vec<(FileEventKind, PathBuf)> {
        event.paths.iter().map(|path| (kind, path.clone())).collect()
    };

    match event.kind {
        EventKind::Create(_) => all(FileEventKind::Created),
        EventKind::Remove(_) => all(FileEventKind::Deleted),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => all(FileEventKind::Deleted),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => all(FileEventKind::Created),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match event.paths.as_slice() {
            [from, to] => vec![
                (FileEventKind::Deleted, from.clone()),
                (FileEventKind::Created, to.clone()),
            ],
            _ => Vec::new(),
        },
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .map(|path| (existence_kind(path), path.clone()))
            .collect(),
        EventKind::Modify(_) => all(FileEventKind::Modified),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

/// Renames of unknown direction: the side that still exists was created.
fn existence_kind(path: &Path) -> FileEventKind {
    if path.exists() {
        FileEventKind::Created
    } else {
        FileEventKind::Deleted
    }
}
