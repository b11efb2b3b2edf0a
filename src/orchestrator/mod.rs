//! Sequential pipeline: plan → build → test → review.
//!
//! The pipeline only threads the run id from one phase to the next; all data
//! moves through the persisted state. A phase that fails halts the pipeline.

pub mod executor;

use std::fmt;

use crate::phase::PhaseKind;
use crate::state::RunId;

pub use executor::{InProcessExecutor, PhaseExecutor, SubprocessExecutor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Plan,
    Build,
    Test,
    Review,
    Done,
}

impl PipelineStage {
    pub const START: PipelineStage = PipelineStage::Plan;

    pub fn next(self) -> Self {
        match self {
            PipelineStage::Plan => PipelineStage::Build,
            PipelineStage::Build => PipelineStage::Test,
            PipelineStage::Test => PipelineStage::Review,
            PipelineStage::Review | PipelineStage::Done => PipelineStage::Done,
        }
    }

    /// Phase executed in this stage; `None` once done.
    pub fn phase(self) -> Option<PhaseKind> {
        match self {
            PipelineStage::Plan => Some(PhaseKind::Plan),
            PipelineStage::Build => Some(PhaseKind::Build),
            PipelineStage::Test => Some(PhaseKind::Test),
            PipelineStage::Review => Some(PhaseKind::Review),
            PipelineStage::Done => None,
        }
    }
}

#[derive(Debug)]
pub enum PipelineOutcome {
    Completed { adw_id: RunId },
    Halted {
        adw_id: RunId,
        at: PhaseKind,
        error: anyhow::Error,
    },
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PipelineOutcome::Completed { .. })
    }
}

impl fmt::Display for PipelineOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineOutcome::Completed { adw_id } => {
                write!(f, "Workflow {} completed all phases", adw_id)
            }
            PipelineOutcome::Halted { adw_id, at, error } => {
                write!(f, "Workflow {} halted at {} phase: {:#}", adw_id, at, error)
            }
        }
    }
}

pub struct Pipeline<'a> {
    executor: &'a dyn PhaseExecutor,
}

impl<'a> Pipeline<'a> {
    pub fn new(executor: &'a dyn PhaseExecutor) -> Self {
        Self { executor }
    }

    /// Run every stage in order for an already resolved run.
    pub async fn run(&self, issue_ref: &str, adw_id: &RunId) -> PipelineOutcome {
        let mut stage = PipelineStage::START;
        while let Some(phase) = stage.phase() {
            tracing::info!(adw_id = %adw_id, phase = %phase, "pipeline stage");
            if let Err(error) = self.executor.execute(phase, issue_ref, adw_id).await {
                tracing::error!(adw_id = %adw_id, phase = %phase, error = %format!("{:#}", error), "pipeline halted");
                return PipelineOutcome::Halted {
                    adw_id: adw_id.clone(),
                    at: phase,
                    error,
                };
            }
            stage = stage.next();
        }
        PipelineOutcome::Completed {
            adw_id: adw_id.clone(),
        }
    }
}
