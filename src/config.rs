//! Runtime configuration.
//!
//! Layered the usual way: optional `adw.toml` in the project directory, then
//! environment variables (a `.env` file is loaded first), then CLI flags.
//!
//! ```toml
//! [agent]
//! model = "sonnet"
//! timeout_secs = 1200
//! skip_permissions = true
//!
//! [paths]
//! agents_dir = "agents"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

pub const CONFIG_FILE_NAME: &str = "adw.toml";
pub const ENV_API_KEY: &str = "ANTHROPIC_API_KEY";
pub const ENV_CLAUDE_PATH: &str = "CLAUDE_CODE_PATH";
pub const ENV_MODEL: &str = "ADW_MODEL";
pub const ENV_TIMEOUT: &str = "ADW_AGENT_TIMEOUT_SECS";
pub const ENV_GITHUB_REPO: &str = "GITHUB_REPO";

pub const DEFAULT_MODEL: &str = "sonnet";
/// Upper bound for a single agent call. Planning and implementation calls on
/// large issues routinely take several minutes.
pub const DEFAULT_AGENT_TIMEOUT_SECS: u64 = 20 * 60;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdwToml {
    #[serde(default)]
    pub agent: AgentSection,
    #[serde(default)]
    pub paths: PathsSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentSection {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub skip_permissions: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathsSection {
    /// Relative paths are resolved against the project directory.
    #[serde(default)]
    pub agents_dir: Option<PathBuf>,
}

impl AdwToml {
    /// Load `adw.toml` from the project directory, or defaults if absent.
    pub fn load_or_default(project_dir: &Path) -> Result<Self, ConfigError> {
        let path = project_dir.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::InvalidFile {
            path: path.clone(),
            message: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::InvalidFile {
            path,
            message: e.to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub project_dir: PathBuf,
    /// Root of per-run directories (state, transcripts, logs).
    pub agents_dir: PathBuf,
    pub claude_cmd: PathBuf,
    pub model: String,
    pub agent_timeout: Duration,
    pub skip_permissions: bool,
    /// `owner/repo` override for the issue tracker.
    pub github_repo: Option<String>,
    pub verbose: bool,
    missing_env: Vec<String>,
}

impl Config {
    /// Load configuration for `project_dir` from `adw.toml`, `.env` and the
    /// process environment. Missing required variables are not an error
    /// here; call [`Config::require_agent_env`] before running a phase.
    pub fn load(project_dir: &Path, verbose: bool) -> Result<Self, ConfigError> {
        let _ = dotenvy::from_path(project_dir.join(".env"));
        let file = AdwToml::load_or_default(project_dir)?;
        Self::from_sources(project_dir, &file, verbose, |key| {
            std::env::var(key).ok()
        })
    }

    pub fn from_sources(
        project_dir: &Path,
        file: &AdwToml,
        verbose: bool,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let missing_env = [ENV_API_KEY, ENV_CLAUDE_PATH]
            .into_iter()
            .filter(|key| env(key).is_none())
            .map(|key| key.to_string())
            .collect();

        let claude_cmd = env(ENV_CLAUDE_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("claude"));

        let model = env(ENV_MODEL)
            .or_else(|| file.agent.model.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let timeout_secs = match env(ENV_TIMEOUT) {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| ConfigError::InvalidFile {
                path: PathBuf::from(ENV_TIMEOUT),
                message: format!("expected a number of seconds, got '{}'", raw),
            })?,
            None => file
                .agent
                .timeout_secs
                .unwrap_or(DEFAULT_AGENT_TIMEOUT_SECS),
        };

        let agents_dir = match &file.paths.agents_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => project_dir.join(dir),
            None => project_dir.join("agents"),
        };

        Ok(Self {
            project_dir: project_dir.to_path_buf(),
            agents_dir,
            claude_cmd,
            model,
            agent_timeout: Duration::from_secs(timeout_secs),
            skip_permissions: file.agent.skip_permissions.unwrap_or(true),
            github_repo: env(ENV_GITHUB_REPO),
            verbose,
            missing_env,
        })
    }

    /// Fail fast when the agent credential or executable is not configured.
    pub fn require_agent_env(&self) -> Result<(), ConfigError> {
        if self.missing_env.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingEnv(self.missing_env.clone()))
        }
    }
}
