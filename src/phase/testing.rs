//! In-memory collaborators for phase and pipeline tests.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;

use super::PhaseContext;
use crate::agent::{AgentFailure, AgentInvoker, AgentRequest, AgentResult, SlashCommand};
use crate::config::{AdwToml, Config, ENV_API_KEY, ENV_CLAUDE_PATH};
use crate::github::{Issue, IssueTracker};
use crate::state::{RunId, StateDocument, StatePatch};
use crate::tracker::VersionControl;

/// Agent answering each slash command with a scripted result.
#[derive(Default)]
pub struct FakeAgent {
    script: Mutex<Vec<(SlashCommand, AgentResult)>>,
    requests: Mutex<Vec<AgentRequest>>,
}

impl FakeAgent {
    pub fn respond(&self, command: SlashCommand, output: &str) {
        self.set(command, AgentResult::ok(output));
    }

    pub fn fail(&self, command: SlashCommand, failure: AgentFailure) {
        self.set(command, AgentResult::failed(failure));
    }

    fn set(&self, command: SlashCommand, result: AgentResult) {
        let mut script = self.script.lock().unwrap();
        script.retain(|(c, _)| *c != command);
        script.push((command, result));
    }

    pub fn requests(&self) -> Vec<AgentRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<SlashCommand> {
        self.requests().iter().map(|r| r.command).collect()
    }
}

#[async_trait]
impl AgentInvoker for FakeAgent {
    async fn invoke(&self, request: &AgentRequest) -> AgentResult {
        self.requests.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .iter()
            .find(|(c, _)| *c == request.command)
            .map(|(_, r)| r.clone())
            .unwrap_or_else(|| {
                AgentResult::failed(AgentFailure::Reported(format!(
                    "no scripted response for {}",
                    request.command
                )))
            })
    }
}

pub struct FakeIssues {
    issue: Issue,
    comments: Mutex<Vec<String>>,
    fail_fetch: AtomicBool,
    fail_comments: AtomicBool,
}

impl Default for FakeIssues {
    fn default() -> Self {
        Self {
            issue: Issue {
                number: 42,
                title: "Export results to CSV".into(),
                body: "Users need a CSV download of the results table.".into(),
                state: "OPEN".into(),
                url: "https://github.com/acme/app/issues/42".into(),
            },
            comments: Mutex::new(Vec::new()),
            fail_fetch: AtomicBool::new(false),
            fail_comments: AtomicBool::new(false),
        }
    }
}

impl FakeIssues {
    pub fn comments(&self) -> Vec<String> {
        self.comments.lock().unwrap().clone()
    }

    pub fn fail_fetch(&self) {
        self.fail_fetch.store(true, Ordering::SeqCst);
    }

    pub fn fail_comments(&self) {
        self.fail_comments.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl IssueTracker for FakeIssues {
    async fn fetch_issue(&self, _issue_ref: &str) -> Result<Issue> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            anyhow::bail!("gh: HTTP 404");
        }
        Ok(self.issue.clone())
    }

    async fn post_comment(&self, _issue_ref: &str, text: &str) -> Result<()> {
        if self.fail_comments.load(Ordering::SeqCst) {
            anyhow::bail!("gh: rate limited");
        }
        self.comments.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

pub const FAKE_PR_URL: &str = "https://github.com/acme/app/pull/7";

#[derive(Default)]
pub struct FakeVcs {
    branches: Mutex<Vec<String>>,
    commits: Mutex<Vec<String>>,
    finalized: Mutex<Vec<StateDocument>>,
    fail_branch: AtomicBool,
    fail_commit: AtomicBool,
}

impl FakeVcs {
    pub fn branches(&self) -> Vec<String> {
        self.branches.lock().unwrap().clone()
    }

    pub fn commits(&self) -> Vec<String> {
        self.commits.lock().unwrap().clone()
    }

    pub fn finalized(&self) -> Vec<StateDocument> {
        self.finalized.lock().unwrap().clone()
    }

    pub fn fail_branch(&self) {
        self.fail_branch.store(true, Ordering::SeqCst);
    }

    pub fn fail_commit(&self) {
        self.fail_commit.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl VersionControl for FakeVcs {
    async fn create_branch(&self, name: &str) -> Result<()> {
        if self.fail_branch.load(Ordering::SeqCst) {
            anyhow::bail!("cannot lock ref 'refs/heads/{}'", name);
        }
        self.branches.lock().unwrap().push(name.to_string());
        Ok(())
    }

    async fn commit_changes(&self, message: &str) -> Result<()> {
        if self.fail_commit.load(Ordering::SeqCst) {
            anyhow::bail!("index is locked");
        }
        self.commits.lock().unwrap().push(message.to_string());
        Ok(())
    }

    async fn finalize(&self, state: &StateDocument) -> Result<String> {
        self.finalized.lock().unwrap().push(state.clone());
        Ok(FAKE_PR_URL.to_string())
    }
}

/// A scratch project directory wired to fake collaborators.
pub struct Harness {
    pub dir: TempDir,
    pub ctx: PhaseContext,
    pub agent: Arc<FakeAgent>,
    pub issues: Arc<FakeIssues>,
    pub vcs: Arc<FakeVcs>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_env(&[(ENV_API_KEY, "sk-test"), (ENV_CLAUDE_PATH, "claude")])
    }

    pub fn without_env() -> Self {
        Self::with_env(&[])
    }

    fn with_env(pairs: &[(&str, &str)]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let pairs: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let config = Config::from_sources(dir.path(), &AdwToml::default(), false, move |key: &str| {
            pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
        })
        .unwrap();

        let agent = Arc::new(FakeAgent::default());
        let issues = Arc::new(FakeIssues::default());
        let vcs = Arc::new(FakeVcs::default());
        let ctx = PhaseContext::new(config, agent.clone(), issues.clone(), vcs.clone());
        Self {
            dir,
            ctx,
            agent,
            issues,
            vcs,
        }
    }

    /// Write a plan file and return its project-relative path.
    pub fn write_plan(&self, relative: &str) -> PathBuf {
        let path = self.dir.path().join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "# Plan\n").unwrap();
        PathBuf::from(relative)
    }

    /// Create a run for issue 42 with `patch` already saved.
    pub fn seed(&self, patch: StatePatch) -> RunId {
        let id = self.ctx.store.resolve_or_create("42", None).unwrap();
        let mut state = self.ctx.store.load(&id).unwrap();
        state.update(patch);
        state.save("seed").unwrap();
        id
    }

    /// Script the commit-message agent.
    pub fn allow_commits(&self) {
        self.agent
            .respond(SlashCommand::Commit, "feat: export results to CSV");
    }
}
