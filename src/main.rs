use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use adw::phase::PhaseKind;

mod cmd;

#[derive(Parser)]
#[command(name = "adw")]
#[command(version, about = "AI developer workflow: plan, build, test and review an issue")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Project (git repository) to work in. Defaults to the current directory.
    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct PhaseArgs {
    /// Issue number to work on
    pub issue_number: String,

    /// Workflow run id; generated when omitted (classify, plan and run only)
    pub adw_id: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Classify the issue and record its change type
    Classify(PhaseArgs),
    /// Classify, create a branch, write the implementation plan and open a PR
    Plan(PhaseArgs),
    /// Implement the recorded plan
    Build(PhaseArgs),
    /// Run the test suite and record the results
    Test(PhaseArgs),
    /// Review the implementation against the plan
    Review(PhaseArgs),
    /// Run plan, build, test and review in sequence, stopping at the first failure
    Run {
        #[command(flatten)]
        args: PhaseArgs,

        /// Run every phase as a separate adw process
        #[arg(long)]
        isolate_phases: bool,
    },
    /// Print the persisted state of a workflow run
    State {
        adw_id: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", console::style("Error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Classify(args) => {
            cmd::run_single_phase(&cli, project_dir, PhaseKind::Classify, args).await
        }
        Commands::Plan(args) => {
            cmd::run_single_phase(&cli, project_dir, PhaseKind::Plan, args).await
        }
        Commands::Build(args) => {
            cmd::run_single_phase(&cli, project_dir, PhaseKind::Build, args).await
        }
        Commands::Test(args) => {
            cmd::run_single_phase(&cli, project_dir, PhaseKind::Test, args).await
        }
        Commands::Review(args) => {
            cmd::run_single_phase(&cli, project_dir, PhaseKind::Review, args).await
        }
        Commands::Run {
            args,
            isolate_phases,
        } => cmd::run_pipeline(&cli, project_dir, args, *isolate_phases).await,
        Commands::State { adw_id } => cmd::cmd_state(&project_dir, adw_id),
    }
}
