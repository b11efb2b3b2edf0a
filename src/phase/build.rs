use super::PhaseRun;
use crate::agent::{AGENT_IMPLEMENTOR, SlashCommand};
use crate::errors::PhaseError;
use crate::state::StatePatch;

/// Implement the recorded plan on the run's branch.
pub async fn run(run: &mut PhaseRun<'_>) -> Result<(), PhaseError> {
    let plan = run.require_plan()?;
    let branch = run.require_branch()?;
    run.require_class()?;

    run.ops("✅ Starting implementation phase").await;
    run.checkout(&branch).await?;

    run.comment(AGENT_IMPLEMENTOR, "✅ Implementing solution").await;
    let request = run
        .request(AGENT_IMPLEMENTOR, SlashCommand::Implement)
        .arg(plan.display().to_string());
    let output = run.invoke(request).await?;
    let summary = output.trim();
    if summary.is_empty() {
        return Err(PhaseError::invalid_output(
            AGENT_IMPLEMENTOR,
            "implementation produced no report",
        ));
    }
    run.record(StatePatch::new().field("implementation_summary", summary))?;
    run.comment(AGENT_IMPLEMENTOR, "✅ Solution implemented").await;

    run.commit(AGENT_IMPLEMENTOR).await?;
    run.finalize().await?;

    run.ops("✅ Implementation phase completed").await;
    Ok(())
}
