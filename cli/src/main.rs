//! `fsmirror`: mirror a directory until interrupted.

mod args;
mod logging;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use fsmirror::{Mirror, MirrorConfig, MirrorLogger, TracingLogger, best_effort, logger_for};
use path_absolutize::Absolutize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::args::{Cli, default_log_path};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = cli.resolve()?;
    if let Err(e) = run(config).await {
        error!("{e:#}");
        return Err(e);
    }
    Ok(())
}

async fn run(config: MirrorConfig) -> anyhow::Result<()> {
    let logger = open_logger(config.log_file.as_deref())?;
    let tag = config
        .tag
        .as_deref()
        .map(|tag| format!("{tag} "))
        .unwrap_or_default();

    announce(
        logger.as_ref(),
        &format!(
            "Start up {tag}(`{}`, `{}`, `{}`, mirror deletions: {}, v{})",
            display(config.source.as_deref()),
            display(config.destination.as_deref()),
            config.patterns,
            config.mirror_deletions,
            env!("CARGO_PKG_VERSION"),
        ),
    );

    let cancel = CancellationToken::new();
    let mut handle = Mirror::from_config(&config)?
        .with_logger(Arc::clone(&logger))
        .with_cancellation(cancel.clone())
        .start()
        .context("failed to start mirroring")?;
    info!("Watching {}, press Ctrl-C to stop", handle.source().display());

    let outcome = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl-C")?;
            info!("Interrupted");
            Ok(())
        }
        finished = handle.finished() => finished.context("mirroring stopped"),
    };

    cancel.cancel();
    let shutdown = handle.shutdown().await;
    announce(logger.as_ref(), &format!("Stopping {tag}"));

    outcome?;
    shutdown.context("failed to shut down cleanly")?;
    Ok(())
}

fn open_logger(target: Option<&str>) -> anyhow::Result<Arc<dyn MirrorLogger>> {
    match target {
        Some(target) if target.eq_ignore_ascii_case("stdout") => Ok(logger_for(target)?),
        Some(target) => {
            let path = std::path::Path::new(target).absolutize()?.into_owned();
            Ok(logger_for(&path.to_string_lossy())?)
        }
        None => match default_log_path() {
            Some(path) => Ok(logger_for(&path.to_string_lossy())?),
            None => Ok(Arc::new(TracingLogger)),
        },
    }
}

/// Write a lifecycle line; a failing logger never stops the CLI.
fn announce(logger: &dyn MirrorLogger, line: &str) {
    best_effort(|| logger.log(line));
}

fn display(path: Option<&std::path::Path>) -> String {
    path.map(|path| path.display().to_string()).unwrap_or_default()
}
