use super::PhaseRun;
use super::outputs::parse_review_result;
use crate::agent::{AGENT_REVIEWER, SlashCommand};
use crate::errors::PhaseError;

/// Review the implementation against the plan and record the verdict.
pub async fn run(run: &mut PhaseRun<'_>) -> Result<(), PhaseError> {
    let plan = run.require_plan()?;
    let branch = run.require_branch()?;
    run.require_class()?;

    run.ops("✅ Starting review phase").await;
    run.checkout(&branch).await?;

    let request = run
        .request(AGENT_REVIEWER, SlashCommand::Review)
        .arg(run.run_id().as_str())
        .arg(plan.display().to_string())
        .arg(AGENT_REVIEWER);
    let raw = run.invoke(request).await?;
    let review = parse_review_result(&raw)
        .map_err(|reason| PhaseError::invalid_output(AGENT_REVIEWER, reason))?;
    let blockers = review.blockers();
    tracing::info!(
        issues = review.review_issues.len(),
        blockers,
        "review finished"
    );
    run.record_value("review_result", &review)?;

    let mut message = if blockers == 0 {
        "✅ Review passed".to_string()
    } else {
        format!("❌ Review found {} blocking issue(s)", blockers)
    };
    if !review.review_summary.is_empty() {
        message.push_str(&format!("\n\n{}", review.review_summary));
    }
    for issue in &review.review_issues {
        message.push_str(&format!(
            "\n- #{} [{}] {}",
            issue.review_issue_number, issue.issue_severity, issue.issue_description
        ));
    }
    run.comment(AGENT_REVIEWER, &message).await;

    run.commit(AGENT_REVIEWER).await?;
    run.finalize().await?;

    if blockers > 0 {
        return Err(PhaseError::ChecksFailed {
            phase: "review".to_string(),
            failures: blockers,
        });
    }
    run.ops("✅ Review phase completed").await;
    Ok(())
}
