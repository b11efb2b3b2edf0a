//! CLI command implementations.
//!
//! | Module  | Commands handled                                  |
//! |---------|---------------------------------------------------|
//! | `phase` | `Classify`, `Plan`, `Build`, `Test`, `Review`     |
//! | `run`   | `Run`                                             |
//! | `state` | `State`                                           |

pub mod phase;
pub mod run;
pub mod state;

pub use phase::run_single_phase;
pub use run::run_pipeline;
pub use state::cmd_state;

use anyhow::Result;
use std::path::{Path, PathBuf};

use adw::config::Config;
use adw::errors::StateError;
use adw::logging;
use adw::phase::PhaseKind;
use adw::state::{RunId, StateStore};

/// Load configuration and check the agent environment before any state is
/// touched.
pub(crate) fn load_config(project_dir: &Path, verbose: bool) -> Result<Config> {
    let config = Config::load(project_dir, verbose)?;
    config.require_agent_env()?;
    Ok(config)
}

pub(crate) fn parse_run_id(raw: Option<&str>) -> Result<Option<RunId>> {
    Ok(raw.map(RunId::parse).transpose()?)
}

/// Resolve the run id up front for phases that may start a run, so logging
/// can go to the run's directory. Later phases keep whatever was supplied.
///
/// A supplied id that belongs to another issue is passed through unchanged;
/// the phase reports the conflict on the issue.
pub(crate) fn resolve_run_id(
    config: &Config,
    kind: PhaseKind,
    issue_ref: &str,
    supplied: Option<RunId>,
) -> Result<Option<RunId>> {
    if !kind.starts_run() {
        return Ok(supplied);
    }
    let store = StateStore::new(config.agents_dir.clone());
    match store.resolve_or_create(issue_ref, supplied.as_ref()) {
        Ok(id) => Ok(Some(id)),
        Err(StateError::IdentifierConflict { .. }) if supplied.is_some() => Ok(supplied),
        Err(e) => Err(e.into()),
    }
}

/// Log file for a run that exists and belongs to `issue_ref`. Anything else
/// logs to the console only, so no run directory is created.
pub(crate) fn run_log_file(
    config: &Config,
    run_id: Option<&RunId>,
    issue_ref: &str,
    component: &str,
) -> Option<PathBuf> {
    let store = StateStore::new(config.agents_dir.clone());
    run_id
        .filter(|id| store.load_for_issue(id, issue_ref).is_ok())
        .map(|id| logging::log_file_path(&config.agents_dir, id.as_str(), component))
}
