use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;

use crate::phase::{PhaseContext, PhaseKind, run_phase};
use crate::state::RunId;

/// Runs one phase of a pipeline to completion.
#[async_trait]
pub trait PhaseExecutor: Send + Sync {
    async fn execute(&self, phase: PhaseKind, issue_ref: &str, adw_id: &RunId) -> Result<()>;
}

/// Calls the phase runners directly, sharing one set of collaborators.
pub struct InProcessExecutor {
    ctx: PhaseContext,
}

impl InProcessExecutor {
    pub fn new(ctx: PhaseContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl PhaseExecutor for InProcessExecutor {
    async fn execute(&self, phase: PhaseKind, issue_ref: &str, adw_id: &RunId) -> Result<()> {
        run_phase(&self.ctx, phase, issue_ref, Some(adw_id)).await?;
        Ok(())
    }
}

/// Runs each phase as a child `adw <phase> <issue> <adw_id>` process and
/// judges it by its exit status alone.
pub struct SubprocessExecutor {
    program: PathBuf,
    project_dir: PathBuf,
    verbose: bool,
}

impl SubprocessExecutor {
    pub fn new(program: PathBuf, project_dir: PathBuf, verbose: bool) -> Self {
        Self {
            program,
            project_dir,
            verbose,
        }
    }

    /// Re-invoke the running executable.
    pub fn current(project_dir: PathBuf, verbose: bool) -> Result<Self> {
        let program = std::env::current_exe().context("Failed to locate the adw executable")?;
        Ok(Self::new(program, project_dir, verbose))
    }

    pub fn args(&self, phase: PhaseKind, issue_ref: &str, adw_id: &RunId) -> Vec<String> {
        let mut args = vec![
            "--project-dir".to_string(),
            self.project_dir.display().to_string(),
        ];
        if self.verbose {
            args.push("--verbose".to_string());
        }
        args.extend([
            phase.name().to_string(),
            issue_ref.to_string(),
            adw_id.to_string(),
        ]);
        args
    }
}

#[async_trait]
impl PhaseExecutor for SubprocessExecutor {
    async fn execute(&self, phase: PhaseKind, issue_ref: &str, adw_id: &RunId) -> Result<()> {
        let status = Command::new(&self.program)
            .args(self.args(phase, issue_ref, adw_id))
            .current_dir(&self.project_dir)
            .stdin(Stdio::null())
            .status()
            .await
            .with_context(|| format!("Failed to start {} phase", phase))?;

        if !status.success() {
            anyhow::bail!(
                "{} phase exited with status {}",
                phase,
                status.code().unwrap_or(-1)
            );
        }
        Ok(())
    }
}
