//! `adw state <adw_id>`: print a run's persisted document.

use anyhow::Result;
use std::path::Path;

use adw::config::Config;
use adw::state::{RunId, StateStore};

pub fn cmd_state(project_dir: &Path, adw_id: &str) -> Result<()> {
    let config = Config::load(project_dir, false)?;
    let run_id = RunId::parse(adw_id)?;
    let state = StateStore::new(config.agents_dir).load(&run_id)?;
    println!("{}", state.document().to_pretty_json());
    Ok(())
}
