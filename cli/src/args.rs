//! CLI argument parsing using clap.

use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Parser;
use fsmirror::MirrorConfig;

/// Copies all files matching the patterns from source to destination when
/// they are created or modified.
#[derive(Debug, Parser)]
#[command(name = "fsmirror", version)]
pub struct Cli {
    /// Directory to mirror from. Patterns are relative to it.
    pub source: Option<PathBuf>,

    /// Directory to copy into.
    pub destination: Option<PathBuf>,

    /// Patterns of files to mirror, separated like PATH entries
    /// (':' on Unix, ';' on Windows). Prefix a pattern with '!' to exclude
    /// matches. Defaults to '*'.
    pub patterns: Option<String>,

    /// Also delete files at the destination when they are deleted at the source.
    #[arg(long)]
    pub mirror_deletions: bool,

    /// Copy matching files that already exist when watching starts.
    #[arg(long)]
    pub initial_sync: bool,

    /// Activity log file, or 'stdout'. Defaults to a log in the user data directory.
    #[arg(long, value_name = "PATH|stdout")]
    pub logfile: Option<String>,

    /// Tag included in the start-up and stop log lines.
    #[arg(long)]
    pub tag: Option<String>,

    /// Read settings from a TOML file. Command line values take precedence.
    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Give up after this many consecutive failures to watch the source.
    #[arg(long, value_name = "N", conflicts_with = "no_recovery")]
    pub max_attempts: Option<usize>,

    /// Stop at the first failure instead of waiting for the source to reappear.
    #[arg(long)]
    pub no_recovery: bool,

    /// Enable debug output.
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

impl Cli {
    /// Merge the config file (if any) with command line values.
    pub fn resolve(&self) -> anyhow::Result<MirrorConfig> {
        let mut config = match &self.config {
            Some(path) => MirrorConfig::load(path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            None => MirrorConfig::default(),
        };

        if let Some(source) = &self.source {
            config.source = Some(source.clone());
        }
        if let Some(destination) = &self.destination {
            config.destination = Some(destination.clone());
        }
        if let Some(patterns) = &self.patterns {
            config.patterns = patterns.clone();
        }
        if self.mirror_deletions {
            config.mirror_deletions = true;
        }
        if self.initial_sync {
            config.initial_sync = true;
        }
        if let Some(logfile) = &self.logfile {
            config.log_file = Some(logfile.clone());
        }
        if let Some(tag) = &self.tag {
            config.tag = Some(tag.clone());
        }
        if let Some(max_attempts) = self.max_attempts {
            config.recovery.max_attempts = Some(max_attempts);
        }
        if self.no_recovery {
            config.recovery.enabled = false;
        }

        if config.source.is_none() {
            bail!("a source directory is required");
        }
        if config.destination.is_none() {
            bail!("a destination directory is required");
        }
        Ok(config)
    }
}

/// Where the activity log goes when no target is configured.
pub fn default_log_path() -> Option<PathBuf> {
    let folder = if cfg!(windows) { "fsmirror" } else { ".fsmirror" };
    dirs::data_dir().map(|dir| dir.join(folder).join("log.txt"))
}
