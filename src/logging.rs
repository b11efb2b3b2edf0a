//! Tracing setup: compact console output on stderr, plus a per-run
//! `execution.log` once the run id is known.

use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub const LOG_FILE_NAME: &str = "execution.log";

/// `<agents_dir>/<adw_id>/<component>/execution.log`
pub fn log_file_path(agents_dir: &Path, adw_id: &str, component: &str) -> PathBuf {
    agents_dir.join(adw_id).join(component).join(LOG_FILE_NAME)
}

fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("adw=debug,info")
        } else {
            EnvFilter::new("adw=info,warn")
        }
    })
}

/// Install the global subscriber. Keep the returned guard alive until exit
/// so the file writer flushes.
///
/// Calling this more than once is harmless; later calls are ignored.
pub fn init(verbose: bool, log_file: Option<&Path>) -> Option<WorkerGuard> {
    let console = fmt::layer()
        .compact()
        .with_target(false)
        .with_writer(std::io::stderr);

    let (file_layer, guard) = match log_file.and_then(open_appender) {
        Some((writer, guard)) => (
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_writer(writer),
            ),
            Some(guard),
        ),
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(console)
        .with(file_layer)
        .try_init();
    guard
}

fn open_appender(
    path: &Path,
) -> Option<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let dir = path.parent()?;
    let file_name = path.file_name()?;
    if let Err(e) = std::fs::create_dir_all(dir) {
        eprintln!("Warning: cannot create log directory {}: {}", dir.display(), e);
        return None;
    }
    let appender = tracing_appender::rolling::never(dir, file_name);
    Some(tracing_appender::non_blocking(appender))
}
