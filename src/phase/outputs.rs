//! Validation of agent payloads at the phase boundary.
//!
//! Every decision the agent returns is parsed into a typed value here, or
//! rejected. Nothing downstream sees raw agent text.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::agent::SlashCommand;
use crate::util::{parse_json_array, parse_json_object};

/// Closed set of change types an issue can be classified as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueClass {
    #[serde(rename = "/chore")]
    Chore,
    #[serde(rename = "/bug")]
    Bug,
    #[serde(rename = "/feature")]
    Feature,
}

impl IssueClass {
    pub const ALL: [IssueClass; 3] = [IssueClass::Chore, IssueClass::Bug, IssueClass::Feature];

    /// Serialized tag, e.g. `/bug`.
    pub fn as_command(&self) -> &'static str {
        self.slash_command().as_str()
    }

    /// Bare name, e.g. `bug`. Used as a branch prefix.
    pub fn name(&self) -> &'static str {
        match self {
            IssueClass::Chore => "chore",
            IssueClass::Bug => "bug",
            IssueClass::Feature => "feature",
        }
    }

    /// Planning command for this class of change.
    pub fn slash_command(&self) -> SlashCommand {
        match self {
            IssueClass::Chore => SlashCommand::Chore,
            IssueClass::Bug => SlashCommand::Bug,
            IssueClass::Feature => SlashCommand::Feature,
        }
    }
}

impl fmt::Display for IssueClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_command())
    }
}

impl FromStr for IssueClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_classification(s)
    }
}

fn strip_decoration(raw: &str) -> &str {
    raw.trim().trim_matches('`').trim()
}

/// Parse the classifier's answer. Only the exact tags are accepted; `0` (the
/// classifier's "cannot tell" answer) and anything else is rejected.
pub fn parse_classification(raw: &str) -> Result<IssueClass, String> {
    let tag = strip_decoration(raw);
    IssueClass::ALL
        .into_iter()
        .find(|class| class.as_command() == tag)
        .ok_or_else(|| {
            if tag == "0" {
                "classifier could not determine the issue type".to_string()
            } else {
                format!(
                    "expected one of /chore, /bug, /feature, got '{}'",
                    crate::util::truncate_str(tag, 80)
                )
            }
        })
}

/// Validate a generated branch name.
pub fn parse_branch_name(raw: &str) -> Result<String, String> {
    let name = strip_decoration(raw);
    if name.is_empty() {
        return Err("branch name is empty".to_string());
    }
    if name.contains(char::is_whitespace) {
        return Err(format!("branch name '{}' contains whitespace", name));
    }
    if !git2::Reference::is_valid_name(&format!("refs/heads/{}", name)) {
        return Err(format!("'{}' is not a valid git branch name", name));
    }
    Ok(name.to_string())
}

/// Validate the planner's answer: a path to a plan file that exists now.
///
/// Relative paths are resolved against `project_dir`, but the path is
/// returned as the agent wrote it so the state stays portable.
pub fn parse_plan_path(raw: &str, project_dir: &Path) -> Result<PathBuf, String> {
    let candidate = strip_decoration(raw);
    if candidate.is_empty() {
        return Err("planner returned no plan path".to_string());
    }
    if candidate.lines().count() > 1 {
        return Err(format!(
            "expected a single plan path, got '{}'",
            crate::util::truncate_str(candidate, 80)
        ));
    }
    let path = PathBuf::from(candidate);
    let resolved = if path.is_absolute() {
        path.clone()
    } else {
        project_dir.join(&path)
    };
    if !resolved.is_file() {
        return Err(format!("plan file {} does not exist", resolved.display()));
    }
    Ok(path)
}

/// One entry of the test runner's report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub test_name: String,
    pub passed: bool,
    #[serde(default)]
    pub execution_command: String,
    #[serde(default)]
    pub test_purpose: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate recorded in state as `test_results`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub failures: Vec<TestResult>,
}

impl TestSummary {
    pub fn from_results(results: Vec<TestResult>) -> Self {
        let total = results.len();
        let failures: Vec<TestResult> = results.into_iter().filter(|r| !r.passed).collect();
        Self {
            total,
            passed: total - failures.len(),
            failed: failures.len(),
            failures,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Parse the test runner's JSON array, tolerating prose around it.
pub fn parse_test_results(raw: &str) -> Result<TestSummary, String> {
    let results: Vec<TestResult> = parse_json_array(raw)
        .ok_or_else(|| "no JSON array in test output".to_string())?
        .map_err(|e| format!("malformed test results: {}", e))?;
    Ok(TestSummary::from_results(results))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Skippable,
    TechDebt,
    Blocker,
}

impl IssueSeverity {
    /// Wire tag, e.g. `tech_debt`.
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueSeverity::Skippable => "skippable",
            IssueSeverity::TechDebt => "tech_debt",
            IssueSeverity::Blocker => "blocker",
        }
    }
}

impl fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewIssue {
    pub review_issue_number: u32,
    pub issue_description: String,
    #[serde(default)]
    pub issue_resolution: String,
    pub issue_severity: IssueSeverity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot_path: Option<String>,
}

/// Reviewer verdict, recorded in state as `review_result`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewResult {
    pub success: bool,
    #[serde(default)]
    pub review_summary: String,
    #[serde(default)]
    pub review_issues: Vec<ReviewIssue>,
}

impl ReviewResult {
    pub fn blockers(&self) -> usize {
        self.review_issues
            .iter()
            .filter(|i| i.issue_severity == IssueSeverity::Blocker)
            .count()
    }
}

pub fn parse_review_result(raw: &str) -> Result<ReviewResult, String> {
    parse_json_object(raw)
        .ok_or_else(|| "no JSON object in review output".to_string())?
        .map_err(|e| format!("malformed review result: {}", e))
}
