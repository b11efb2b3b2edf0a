//! Phase runners.
//!
//! Every phase follows the same shape: resolve the run's state, check the
//! fields it depends on, ask the agent for a decision, validate it, persist,
//! then drive the side effects (branch, commit, push). Any failure is logged,
//! posted on the issue and returned; the caller turns it into exit code 1.

pub mod build;
pub mod classify;
pub mod outputs;
pub mod plan;
pub mod review;

#[cfg(test)]
pub(crate) mod testing;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::Instrument;

use crate::agent::{AGENT_OPS, AgentInvoker, AgentRequest, ClaudeInvoker, SlashCommand};
use crate::config::Config;
use crate::errors::{PhaseError, StateError};
use crate::github::{GhIssueTracker, Issue, IssueTracker, format_issue_message};
use crate::state::{RunId, StatePatch, StateStore, WorkflowState};
use crate::tracker::{GitTracker, VersionControl};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseKind {
    Classify,
    Plan,
    Build,
    Test,
    Review,
}

impl PhaseKind {
    pub fn name(&self) -> &'static str {
        match self {
            PhaseKind::Classify => "classify",
            PhaseKind::Plan => "plan",
            PhaseKind::Build => "build",
            PhaseKind::Test => "test",
            PhaseKind::Review => "review",
        }
    }

    /// Tag recorded in the state's save history.
    pub fn save_tag(&self) -> &'static str {
        match self {
            PhaseKind::Classify => "adw_classify",
            PhaseKind::Plan => "adw_plan",
            PhaseKind::Build => "adw_build",
            PhaseKind::Test => "adw_test",
            PhaseKind::Review => "adw_review",
        }
    }

    /// Phases that may start a new run. The others need existing state.
    pub fn starts_run(&self) -> bool {
        matches!(self, PhaseKind::Classify | PhaseKind::Plan)
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Collaborators shared by every phase of a run.
#[derive(Clone)]
pub struct PhaseContext {
    pub config: Arc<Config>,
    pub store: StateStore,
    pub agent: Arc<dyn AgentInvoker>,
    pub issues: Arc<dyn IssueTracker>,
    pub vcs: Arc<dyn VersionControl>,
}

impl PhaseContext {
    /// Wire up the real agent CLI, `gh` and git collaborators.
    pub fn from_config(config: Config) -> Self {
        let agent = Arc::new(ClaudeInvoker::new(&config));
        let issues = Arc::new(GhIssueTracker::new(
            &config.project_dir,
            config.github_repo.clone(),
        ));
        let vcs = Arc::new(GitTracker::new(&config.project_dir));
        Self::new(config, agent, issues, vcs)
    }

    pub fn new(
        config: Config,
        agent: Arc<dyn AgentInvoker>,
        issues: Arc<dyn IssueTracker>,
        vcs: Arc<dyn VersionControl>,
    ) -> Self {
        Self {
            store: StateStore::new(config.agents_dir.clone()),
            config: Arc::new(config),
            agent,
            issues,
            vcs,
        }
    }
}

/// Resolve the run's state and execute one phase against it.
///
/// `adw_id` may be omitted only for phases that start a run. On failure the
/// error is posted on the issue before it is returned. Startup errors and a
/// missing `adw_id` are only logged, since no run id exists to prefix them.
pub async fn run_phase(
    ctx: &PhaseContext,
    kind: PhaseKind,
    issue_ref: &str,
    adw_id: Option<&RunId>,
) -> Result<RunId, PhaseError> {
    ctx.config.require_agent_env()?;

    let state = match resolve_state(ctx, kind, issue_ref, adw_id) {
        Ok(state) => state,
        Err(err) => {
            tracing::error!(phase = %kind, issue = issue_ref, error = %err, "cannot resolve workflow state");
            if let Some(id) = adw_id
                && matches!(
                    err,
                    PhaseError::State(
                        StateError::StateNotFound { .. } | StateError::IdentifierConflict { .. }
                    )
                )
            {
                let text = format_issue_message(
                    id.as_str(),
                    err.label(),
                    &format!("❌ {} phase failed: {}", kind, err),
                );
                if let Err(e) = ctx.issues.post_comment(issue_ref, &text).await {
                    tracing::warn!(error = %format!("{:#}", e), "failed to post issue comment");
                }
            }
            return Err(err);
        }
    };
    let run_id = state.run_id().clone();

    let span = tracing::info_span!("phase", phase = %kind, adw_id = %run_id);
    let mut run = PhaseRun::new(ctx, kind, state);
    let result = async {
        tracing::info!(issue = issue_ref, "starting phase");
        match kind {
            PhaseKind::Classify => classify::run(&mut run).await,
            PhaseKind::Plan => plan::run(&mut run).await,
            PhaseKind::Build => build::run(&mut run).await,
            PhaseKind::Test => test::run(&mut run).await,
            PhaseKind::Review => review::run(&mut run).await,
        }
    }
    .instrument(span)
    .await;

    match result {
        Ok(()) => {
            tracing::info!(phase = %kind, adw_id = %run_id, "phase completed");
            Ok(run_id)
        }
        Err(err) => {
            tracing::error!(phase = %kind, adw_id = %run_id, error = %err, "phase failed");
            run.comment(err.label(), &format!("❌ {} phase failed: {}", kind, err))
                .await;
            Err(err)
        }
    }
}

fn resolve_state(
    ctx: &PhaseContext,
    kind: PhaseKind,
    issue_ref: &str,
    adw_id: Option<&RunId>,
) -> Result<WorkflowState, PhaseError> {
    if kind.starts_run() {
        let run_id = ctx.store.resolve_or_create(issue_ref, adw_id)?;
        Ok(ctx.store.load_for_issue(&run_id, issue_ref)?)
    } else {
        let run_id = adw_id.ok_or_else(|| PhaseError::precondition("adw_id"))?;
        Ok(ctx.store.load_for_issue(run_id, issue_ref)?)
    }
}

/// One phase execution: the loaded state plus helpers for the common steps.
pub struct PhaseRun<'a> {
    ctx: &'a PhaseContext,
    kind: PhaseKind,
    state: WorkflowState,
    issue: Option<Issue>,
}

impl<'a> PhaseRun<'a> {
    fn new(ctx: &'a PhaseContext, kind: PhaseKind, state: WorkflowState) -> Self {
        Self {
            ctx,
            kind,
            state,
            issue: None,
        }
    }

    pub fn run_id(&self) -> &RunId {
        self.state.run_id()
    }

    pub fn issue_ref(&self) -> &str {
        self.state.issue_ref()
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn config(&self) -> &Config {
        &self.ctx.config
    }

    /// Post `<adw_id>_<label>: <message>` on the issue. A failed post is logged
    /// and otherwise ignored.
    pub async fn comment(&self, label: &str, message: &str) {
        let text = format_issue_message(self.run_id().as_str(), label, message);
        if let Err(e) = self.ctx.issues.post_comment(self.issue_ref(), &text).await {
            tracing::warn!(error = %format!("{:#}", e), "failed to post issue comment");
        }
    }

    pub async fn ops(&self, message: &str) {
        self.comment(AGENT_OPS, message).await;
    }

    /// Post the current state document as a fenced JSON block.
    pub async fn post_state(&self, heading: &str) {
        let json = self.state.document().to_pretty_json();
        self.ops(&format!("{}\n```json\n{}\n```", heading, json))
            .await;
    }

    /// Fetch the issue once per phase.
    pub async fn issue(&mut self) -> Result<Issue, PhaseError> {
        if let Some(ref issue) = self.issue {
            return Ok(issue.clone());
        }
        let issue = self
            .ctx
            .issues
            .fetch_issue(self.state.issue_ref())
            .await
            .map_err(|e| PhaseError::collaborator("Fetch issue", &e))?;
        self.issue = Some(issue.clone());
        Ok(issue)
    }

    pub fn request(&self, agent_name: &str, command: SlashCommand) -> AgentRequest {
        AgentRequest::new(agent_name, command, self.run_id())
    }

    /// Invoke the agent. A failed result becomes `PhaseError::Agent`.
    pub async fn invoke(&self, request: AgentRequest) -> Result<String, PhaseError> {
        tracing::debug!(agent = %request.agent_name, prompt = %crate::util::truncate_str(&request.prompt(), 200), "agent request");
        self.ctx
            .agent
            .invoke(&request)
            .await
            .into_result()
            .map_err(|failure| PhaseError::Agent {
                label: request.agent_name.clone(),
                failure,
            })
    }

    /// Merge `patch` and persist it under this phase's save tag.
    pub fn record(&mut self, patch: StatePatch) -> Result<(), PhaseError> {
        self.state.update(patch);
        self.state.save(self.kind.save_tag())?;
        Ok(())
    }

    /// Record a serializable value as an additional state field.
    pub fn record_value<T: Serialize>(&mut self, field: &str, value: &T) -> Result<(), PhaseError> {
        let value = serde_json::to_value(value).map_err(|e| PhaseError::CollaboratorFailure {
            operation: format!("Serialize {}", field),
            message: e.to_string(),
        })?;
        self.record(StatePatch::new().field(field, value))
    }

    pub fn require_branch(&self) -> Result<String, PhaseError> {
        self.state
            .document()
            .branch_name
            .clone()
            .ok_or_else(|| PhaseError::precondition("branch_name"))
    }

    pub fn require_plan(&self) -> Result<PathBuf, PhaseError> {
        self.state
            .document()
            .plan_artifact_ref
            .clone()
            .ok_or_else(|| PhaseError::precondition("plan_artifact_ref"))
    }

    pub fn require_class(&self) -> Result<outputs::IssueClass, PhaseError> {
        self.state
            .document()
            .issue_class
            .ok_or_else(|| PhaseError::precondition("issue_class"))
    }

    pub async fn checkout(&self, branch: &str) -> Result<(), PhaseError> {
        self.ctx
            .vcs
            .create_branch(branch)
            .await
            .map_err(|e| PhaseError::collaborator("Create branch", &e))
    }

    /// Have the agent write a commit message for `agent_name`'s work, then
    /// commit everything.
    pub async fn commit(&mut self, agent_name: &str) -> Result<String, PhaseError> {
        let class = self.require_class()?;
        let issue = self.issue().await?;
        let committer = format!("{}_committer", agent_name);
        let request = self
            .request(&committer, SlashCommand::Commit)
            .arg(agent_name)
            .arg(class.as_command())
            .arg(issue.to_agent_json());
        let raw = self.invoke(request).await?;
        let message = raw.trim().trim_matches('`').trim().to_string();
        if message.is_empty() {
            return Err(PhaseError::invalid_output(&committer, "empty commit message"));
        }

        self.ctx
            .vcs
            .commit_changes(&message)
            .await
            .map_err(|e| PhaseError::collaborator("Commit", &e))?;
        self.comment(agent_name, "✅ Changes committed").await;
        Ok(message)
    }

    /// Push the branch, open or reuse the pull request and record its URL.
    pub async fn finalize(&mut self) -> Result<String, PhaseError> {
        let url = self
            .ctx
            .vcs
            .finalize(self.state.document())
            .await
            .map_err(|e| PhaseError::collaborator("Finalize", &e))?;
        self.record(StatePatch::new().field("pr_url", url.clone()))?;
        self.ops(&format!("✅ Pull request: {}", url)).await;
        Ok(url)
    }
}
