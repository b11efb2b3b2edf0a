//! `adw run`: the full pipeline.

use anyhow::Result;
use std::path::PathBuf;

use adw::logging;
use adw::orchestrator::{InProcessExecutor, PhaseExecutor, Pipeline, SubprocessExecutor};
use adw::phase::{PhaseContext, PhaseKind};

use super::super::{Cli, PhaseArgs};
use super::{load_config, parse_run_id, resolve_run_id, run_log_file};

const PIPELINE_LOG_COMPONENT: &str = "adw_sdlc";

pub async fn run_pipeline(
    cli: &Cli,
    project_dir: PathBuf,
    args: &PhaseArgs,
    isolate_phases: bool,
) -> Result<()> {
    let config = load_config(&project_dir, cli.verbose)?;
    let supplied = parse_run_id(args.adw_id.as_deref())?;
    let run_id = resolve_run_id(&config, PhaseKind::Plan, &args.issue_number, supplied)?
        .ok_or_else(|| anyhow::anyhow!("No workflow id resolved"))?;

    let log_file = run_log_file(
        &config,
        Some(&run_id),
        &args.issue_number,
        PIPELINE_LOG_COMPONENT,
    );
    let _guard = logging::init(cli.verbose, log_file.as_deref());

    println!(
        "{} Workflow {} for issue #{}{}",
        console::style("▶").cyan().bold(),
        console::style(&run_id).bold(),
        args.issue_number,
        if isolate_phases { " (isolated phases)" } else { "" }
    );

    let executor: Box<dyn PhaseExecutor> = if isolate_phases {
        Box::new(SubprocessExecutor::current(project_dir, cli.verbose)?)
    } else {
        Box::new(InProcessExecutor::new(PhaseContext::from_config(config)))
    };

    let outcome = Pipeline::new(executor.as_ref())
        .run(&args.issue_number, &run_id)
        .await;

    if outcome.is_success() {
        println!("{} {}", console::style("✓").green().bold(), outcome);
        Ok(())
    } else {
        anyhow::bail!("{}", outcome)
    }
}
