use super::PhaseRun;
use super::classify::classify_issue;
use super::outputs::{parse_branch_name, parse_plan_path};
use crate::agent::{AGENT_BRANCH_GENERATOR, AGENT_PLANNER, SlashCommand};
use crate::errors::PhaseError;
use crate::state::StatePatch;

/// Classify the issue, cut a branch, write the plan and open the pull request.
pub async fn run(run: &mut PhaseRun<'_>) -> Result<(), PhaseError> {
    run.ops("✅ Starting planning phase").await;
    run.post_state("🔍 Using state").await;

    let issue = run.issue().await?;

    let class = classify_issue(run, &issue).await?;
    run.record(StatePatch::new().issue_class(class))?;
    run.ops(&format!("✅ Issue classified as: {}", class)).await;

    let request = run
        .request(AGENT_BRANCH_GENERATOR, SlashCommand::GenerateBranchName)
        .arg(class.name())
        .arg(run.run_id().as_str())
        .arg(issue.to_agent_json());
    let raw = run.invoke(request).await?;
    let branch = parse_branch_name(&raw)
        .map_err(|reason| PhaseError::invalid_output(AGENT_BRANCH_GENERATOR, reason))?;
    run.checkout(&branch).await?;
    run.record(StatePatch::new().branch_name(branch.clone()))?;
    run.ops(&format!("✅ Working on branch: {}", branch)).await;

    run.comment(AGENT_PLANNER, "✅ Building implementation plan")
        .await;
    let request = run
        .request(AGENT_PLANNER, class.slash_command())
        .arg(run.issue_ref())
        .arg(run.run_id().as_str())
        .arg(issue.to_agent_json());
    let raw = run.invoke(request).await?;
    let plan = parse_plan_path(&raw, &run.config().project_dir)
        .map_err(|reason| PhaseError::invalid_output(AGENT_PLANNER, reason))?;
    tracing::info!(plan = %plan.display(), "plan created");
    run.record(StatePatch::new().plan_artifact_ref(plan.clone()))?;
    run.comment(
        AGENT_PLANNER,
        &format!("✅ Implementation plan created: {}", plan.display()),
    )
    .await;

    run.commit(AGENT_PLANNER).await?;
    run.finalize().await?;

    run.ops("✅ Planning phase completed").await;
    run.post_state("📋 Final planning state").await;
    Ok(())
}
