use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

use super::stream::StreamCollector;
use super::{AgentFailure, AgentInvoker, AgentRequest, AgentResult};
use crate::config::Config;

pub const RAW_OUTPUT_FILE: &str = "raw_output.jsonl";

/// Runs requests through the agent CLI in print mode with `stream-json`
/// output. The raw stream is kept under `<agents_dir>/<adw_id>/<agent_name>/`.
pub struct ClaudeInvoker {
    claude_cmd: PathBuf,
    model: String,
    skip_permissions: bool,
    timeout: Duration,
    agents_dir: PathBuf,
    working_dir: PathBuf,
}

impl ClaudeInvoker {
    pub fn new(config: &Config) -> Self {
        Self {
            claude_cmd: config.claude_cmd.clone(),
            model: config.model.clone(),
            skip_permissions: config.skip_permissions,
            timeout: config.agent_timeout,
            agents_dir: config.agents_dir.clone(),
            working_dir: config.project_dir.clone(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn transcript_path(&self, request: &AgentRequest) -> PathBuf {
        self.agents_dir
            .join(request.adw_id.as_str())
            .join(&request.agent_name)
            .join(RAW_OUTPUT_FILE)
    }

    fn flags(&self, request: &AgentRequest) -> Vec<String> {
        let model = request.model.as_deref().unwrap_or(&self.model);
        let mut flags = vec![
            "-p".to_string(),
            request.prompt(),
            "--model".to_string(),
            model.to_string(),
            "--output-format".to_string(),
            "stream-json".to_string(),
            "--verbose".to_string(),
        ];
        if self.skip_permissions {
            flags.push("--dangerously-skip-permissions".to_string());
        }
        flags
    }

    async fn run(&self, request: &AgentRequest, transcript: &Path) -> AgentResult {
        if let Some(dir) = transcript.parent()
            && let Err(e) = tokio::fs::create_dir_all(dir).await
        {
            return AgentResult::failed(AgentFailure::Transport(format!(
                "failed to create {}: {}",
                dir.display(),
                e
            )));
        }
        let mut raw = match File::create(transcript).await {
            Ok(file) => file,
            Err(e) => {
                return AgentResult::failed(AgentFailure::Transport(format!(
                    "failed to create {}: {}",
                    transcript.display(),
                    e
                )));
            }
        };

        let mut child = match Command::new(&self.claude_cmd)
            .args(self.flags(request))
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                return AgentResult::failed(AgentFailure::Transport(format!(
                    "failed to spawn {}: {}",
                    self.claude_cmd.display(),
                    e
                )));
            }
        };

        let Some(stdout) = child.stdout.take() else {
            return AgentResult::failed(AgentFailure::Transport("agent stdout unavailable".into()));
        };
        // Drained concurrently so a chatty agent cannot fill the pipe and stall.
        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = stderr.read_to_end(&mut buf).await;
                buf
            })
        });
        let mut lines = BufReader::new(stdout).lines();
        let mut collector = StreamCollector::new();

        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if let Err(e) = raw.write_all(format!("{}\n", line).as_bytes()).await {
                        tracing::warn!(error = %e, "failed to write agent transcript");
                    }
                    collector.push_line(&line);
                }
                Ok(None) => break,
                Err(e) => {
                    return AgentResult::failed(AgentFailure::Transport(format!(
                        "failed to read agent output: {}",
                        e
                    )));
                }
            }
        }
        let _ = raw.flush().await;

        let status = match child.wait().await {
            Ok(status) => status,
            Err(e) => {
                return AgentResult::failed(AgentFailure::Transport(format!(
                    "failed to wait for agent: {}",
                    e
                )));
            }
        };
        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => Vec::new(),
        };
        let stderr = String::from_utf8_lossy(&stderr).trim().to_string();
        let exit_code = status.code().unwrap_or(-1);
        let printed = collector.text().trim().to_string();

        match collector.finish() {
            Some(outcome) if outcome.is_error => {
                AgentResult::failed(AgentFailure::Reported(outcome.result))
                    .with_session(outcome.session_id)
            }
            Some(outcome) if status.success() => {
                AgentResult::ok(outcome.result).with_session(outcome.session_id)
            }
            Some(outcome) => AgentResult::failed(AgentFailure::Reported(format!(
                "agent exited with code {}: {}",
                exit_code, outcome.result
            )))
            .with_session(outcome.session_id),
            None => {
                let detail = if !stderr.is_empty() { stderr } else { printed };
                AgentResult::failed(AgentFailure::Transport(format!(
                    "agent exited with code {} without a result: {}",
                    exit_code, detail
                )))
            }
        }
    }
}

#[async_trait]
impl AgentInvoker for ClaudeInvoker {
    async fn invoke(&self, request: &AgentRequest) -> AgentResult {
        let transcript = self.transcript_path(request);
        tracing::info!(
            adw_id = %request.adw_id,
            agent = %request.agent_name,
            command = %request.command,
            "invoking agent"
        );

        let start = Instant::now();
        // Dropping the in-flight future on timeout kills the child (kill_on_drop).
        let result = match tokio::time::timeout(self.timeout, self.run(request, &transcript)).await
        {
            Ok(result) => result,
            Err(_) => AgentResult::failed(AgentFailure::Timeout(self.timeout)),
        };

        if result.success {
            tracing::debug!(
                agent = %request.agent_name,
                elapsed_secs = start.elapsed().as_secs_f64(),
                "agent finished"
            );
        } else if let Some(ref failure) = result.failure {
            tracing::warn!(
                agent = %request.agent_name,
                elapsed_secs = start.elapsed().as_secs_f64(),
                %failure,
                "agent failed"
            );
        }
        result
    }
}
