//! Contract for the external coding agent.
//!
//! A phase builds an [`AgentRequest`], hands it to an [`AgentInvoker`] and
//! gets back an [`AgentResult`]. Agent failures are ordinary values here:
//! invokers never return `Err` and never retry.

pub mod claude;
pub mod stream;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::state::RunId;

pub use claude::ClaudeInvoker;

// Agent labels, used for transcripts directories and issue comment prefixes.
pub const AGENT_OPS: &str = "ops";
pub const AGENT_CLASSIFIER: &str = "issue_classifier";
pub const AGENT_BRANCH_GENERATOR: &str = "branch_generator";
pub const AGENT_PLANNER: &str = "sdlc_planner";
pub const AGENT_IMPLEMENTOR: &str = "sdlc_implementor";
pub const AGENT_TESTER: &str = "test_runner";
pub const AGENT_REVIEWER: &str = "reviewer";

/// Slash commands understood by the agent's project configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlashCommand {
    ClassifyIssue,
    GenerateBranchName,
    Chore,
    Bug,
    Feature,
    Implement,
    Commit,
    Test,
    Review,
}

impl SlashCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlashCommand::ClassifyIssue => "/classify_issue",
            SlashCommand::GenerateBranchName => "/generate_branch_name",
            SlashCommand::Chore => "/chore",
            SlashCommand::Bug => "/bug",
            SlashCommand::Feature => "/feature",
            SlashCommand::Implement => "/implement",
            SlashCommand::Commit => "/commit",
            SlashCommand::Test => "/test",
            SlashCommand::Review => "/review",
        }
    }
}

impl fmt::Display for SlashCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One decision requested from the agent.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentRequest {
    /// Role of the agent for this call (e.g. `sdlc_planner`).
    pub agent_name: String,
    pub command: SlashCommand,
    /// Subject data: issue JSON, plan path, run id, ...
    pub args: Vec<String>,
    pub adw_id: RunId,
    /// Overrides the configured model for this call.
    pub model: Option<String>,
}

impl AgentRequest {
    pub fn new(agent_name: &str, command: SlashCommand, adw_id: &RunId) -> Self {
        Self {
            agent_name: agent_name.to_string(),
            command,
            args: Vec::new(),
            adw_id: adw_id.clone(),
            model: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// The prompt sent to the agent: the slash command followed by its args.
    pub fn prompt(&self) -> String {
        let mut prompt = self.command.as_str().to_string();
        for arg in &self.args {
            prompt.push(' ');
            prompt.push_str(arg);
        }
        prompt
    }
}

/// Why an agent call did not produce a usable answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentFailure {
    /// Agent process could not be started or its output could not be read.
    Transport(String),
    /// Agent did not finish within the configured limit.
    Timeout(Duration),
    /// Agent ran and reported an error itself.
    Reported(String),
}

impl fmt::Display for AgentFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentFailure::Transport(msg) => write!(f, "transport error: {}", msg),
            AgentFailure::Timeout(limit) if limit.subsec_millis() == 0 => {
                write!(f, "timed out after {}s", limit.as_secs())
            }
            AgentFailure::Timeout(limit) => {
                write!(f, "timed out after {}ms", limit.as_millis())
            }
            AgentFailure::Reported(msg) => write!(f, "{}", msg),
        }
    }
}

/// Outcome of an agent call: a success flag plus either the output payload
/// or the failure.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentResult {
    pub success: bool,
    pub output: String,
    pub session_id: Option<String>,
    pub failure: Option<AgentFailure>,
}

impl AgentResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            session_id: None,
            failure: None,
        }
    }

    pub fn failed(failure: AgentFailure) -> Self {
        Self {
            success: false,
            output: String::new(),
            session_id: None,
            failure: Some(failure),
        }
    }

    pub fn with_session(mut self, session_id: Option<String>) -> Self {
        self.session_id = session_id;
        self
    }

    pub fn into_result(self) -> Result<String, AgentFailure> {
        if self.success {
            Ok(self.output)
        } else {
            Err(self
                .failure
                .unwrap_or_else(|| AgentFailure::Reported("agent reported failure".into())))
        }
    }
}

#[async_trait]
pub trait AgentInvoker: Send + Sync {
    /// Run one request to completion. Blocks the calling phase until the agent
    /// finishes or times out.
    async fn invoke(&self, request: &AgentRequest) -> AgentResult;
}
