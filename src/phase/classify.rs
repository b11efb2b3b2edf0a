use super::PhaseRun;
use super::outputs::{IssueClass, parse_classification};
use crate::agent::{AGENT_CLASSIFIER, SlashCommand};
use crate::errors::PhaseError;
use crate::github::Issue;
use crate::state::StatePatch;

/// Ask the classifier for the change type of `issue`.
pub async fn classify_issue(run: &PhaseRun<'_>, issue: &Issue) -> Result<IssueClass, PhaseError> {
    let request = run
        .request(AGENT_CLASSIFIER, SlashCommand::ClassifyIssue)
        .arg(issue.to_agent_json());
    let raw = run.invoke(request).await?;
    let class =
        parse_classification(&raw).map_err(|reason| PhaseError::invalid_output(AGENT_CLASSIFIER, reason))?;
    tracing::info!(issue_class = %class, "issue classified");
    Ok(class)
}

/// Standalone classification: record `issue_class` and stop.
pub async fn run(run: &mut PhaseRun<'_>) -> Result<(), PhaseError> {
    run.ops("✅ Starting classification").await;
    let issue = run.issue().await?;
    let class = classify_issue(run, &issue).await?;
    run.record(StatePatch::new().issue_class(class))?;
    run.comment(AGENT_CLASSIFIER, &format!("✅ Issue classified as: {}", class))
        .await;
    Ok(())
}
