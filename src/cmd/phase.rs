//! Single-phase entry points: `adw classify|plan|build|test|review`.

use anyhow::Result;
use std::path::PathBuf;

use adw::logging;
use adw::phase::{PhaseContext, PhaseKind, run_phase};

use super::super::{Cli, PhaseArgs};
use super::{load_config, parse_run_id, resolve_run_id, run_log_file};

pub async fn run_single_phase(
    cli: &Cli,
    project_dir: PathBuf,
    kind: PhaseKind,
    args: &PhaseArgs,
) -> Result<()> {
    let config = load_config(&project_dir, cli.verbose)?;
    let supplied = parse_run_id(args.adw_id.as_deref())?;
    let run_id = resolve_run_id(&config, kind, &args.issue_number, supplied)?;

    let log_file = run_log_file(&config, run_id.as_ref(), &args.issue_number, kind.save_tag());
    let _guard = logging::init(cli.verbose, log_file.as_deref());

    println!(
        "{} {} phase for issue #{}",
        console::style("▶").cyan().bold(),
        kind,
        args.issue_number
    );

    let ctx = PhaseContext::from_config(config);
    let run_id = run_phase(&ctx, kind, &args.issue_number, run_id.as_ref()).await?;

    println!(
        "{} {} phase completed (adw_id: {})",
        console::style("✓").green().bold(),
        kind,
        console::style(&run_id).bold()
    );
    Ok(())
}
