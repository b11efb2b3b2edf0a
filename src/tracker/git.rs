use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use git2::{BranchType, IndexAddOption, Repository, Signature, build::CheckoutBuilder};
use tokio::process::Command;

use crate::state::StateDocument;

/// Version-control operations a phase depends on.
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Create `name` from HEAD and check it out. An existing branch of the same
    /// name is checked out instead.
    async fn create_branch(&self, name: &str) -> Result<()>;

    /// Stage everything in the working tree and commit it. A clean tree is not
    /// an error.
    async fn commit_changes(&self, message: &str) -> Result<()>;

    /// Push the run's branch and open (or reuse) its pull request. Returns the
    /// pull request URL.
    async fn finalize(&self, state: &StateDocument) -> Result<String>;
}

pub struct GitTracker {
    project_dir: PathBuf,
}

impl GitTracker {
    pub fn new(project_dir: &Path) -> Self {
        Self {
            project_dir: project_dir.to_path_buf(),
        }
    }

    fn open(&self) -> Result<Repository> {
        Repository::open(&self.project_dir).context("Failed to open git repository")
    }

    fn checkout_branch(&self, name: &str) -> Result<()> {
        let repo = self.open()?;
        let head = repo
            .head()
            .and_then(|h| h.peel_to_commit())
            .context("Repository has no commits to branch from")?;

        if repo.find_branch(name, BranchType::Local).is_err() {
            repo.branch(name, &head, false)
                .with_context(|| format!("Failed to create branch {}", name))?;
            tracing::info!(branch = name, "created branch");
        } else {
            tracing::info!(branch = name, "branch exists, checking it out");
        }

        let refname = format!("refs/heads/{}", name);
        let target = repo.revparse_single(&refname)?;
        repo.checkout_tree(&target, Some(CheckoutBuilder::new().safe()))
            .with_context(|| format!("Failed to check out {}", name))?;
        repo.set_head(&refname)?;
        Ok(())
    }

    /// Returns the new commit id, or `None` when there was nothing to commit.
    fn commit_all(&self, message: &str) -> Result<Option<String>> {
        let repo = self.open()?;
        let mut index = repo.index()?;
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"].iter(), None)?;
        index.write()?;

        let tree_id = index.write_tree()?;
        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        if let Some(ref parent) = parent
            && parent.tree_id() == tree_id
        {
            return Ok(None);
        }

        let tree = repo.find_tree(tree_id)?;
        let sig = repo
            .signature()
            .or_else(|_| Signature::now("adw", "adw@localhost"))?;
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        let id = repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?;
        Ok(Some(id.to_string()))
    }

    async fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        let output = Command::new(program)
            .args(args)
            .current_dir(&self.project_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .with_context(|| format!("Failed to run {}", program))?;

        if !output.status.success() {
            anyhow::bail!(
                "{} {} failed: {}",
                program,
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl VersionControl for GitTracker {
    async fn create_branch(&self, name: &str) -> Result<()> {
        self.checkout_branch(name)
    }

    async fn commit_changes(&self, message: &str) -> Result<()> {
        match self.commit_all(message)? {
            Some(sha) => tracing::info!(commit = %sha, "committed changes"),
            None => tracing::info!("working tree clean, nothing to commit"),
        }
        Ok(())
    }

    async fn finalize(&self, state: &StateDocument) -> Result<String> {
        let branch = state
            .branch_name
            .as_deref()
            .context("Workflow state has no branch_name to push")?;

        self.run("git", &["push", "-u", "origin", branch]).await?;

        let existing = self
            .run(
                "gh",
                &[
                    "pr", "list", "--head", branch, "--state", "open", "--json", "url", "--jq",
                    ".[0].url",
                ],
            )
            .await?;
        if !existing.is_empty() {
            tracing::info!(pr = %existing, "pull request already open");
            return Ok(existing);
        }

        let title = pr_title(state);
        let body = pr_body(state);
        let url = self
            .run(
                "gh",
                &[
                    "pr", "create", "--head", branch, "--title", &title, "--body", &body,
                ],
            )
            .await?;
        tracing::info!(pr = %url, "opened pull request");
        Ok(url)
    }
}

pub fn pr_title(state: &StateDocument) -> String {
    let kind = state
        .issue_class
        .map(|c| c.name())
        .unwrap_or("change");
    format!("{}: #{} (adw {})", kind, state.issue_ref, state.adw_id)
}

pub fn pr_body(state: &StateDocument) -> String {
    let mut body = format!("## Summary\n\nCloses #{}\n\n", state.issue_ref);
    if let Some(class) = state.issue_class {
        body.push_str(&format!("- Type: `{}`\n", class.as_command()));
    }
    if let Some(ref plan) = state.plan_artifact_ref {
        body.push_str(&format!("- Plan: `{}`\n", plan.display()));
    }
    body.push_str(&format!("- Workflow: `{}`\n", state.adw_id));
    body.push_str(&format!(
        "\n<details><summary>Workflow state</summary>\n\n```json\n{}\n```\n</details>\n",
        state.to_pretty_json()
    ));
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::outputs::IssueClass;
    use crate::state::{RunId, StatePatch};
    use std::fs;
    use tempfile::tempdir;

    fn setup_repo() -> (GitTracker, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "test").unwrap();
        config.set_str("user.email", "test@test.com").unwrap();
        drop(config);
        (GitTracker::new(dir.path()), dir)
    }

    fn head_branch(dir: &Path) -> String {
        let repo = Repository::open(dir).unwrap();
        repo.head().unwrap().shorthand().unwrap().to_string()
    }

    fn commit_count(dir: &Path) -> usize {
        let repo = Repository::open(dir).unwrap();
        let mut walk = repo.revwalk().unwrap();
        walk.push_head().unwrap();
        walk.count()
    }

    #[tokio::test]
    async fn test_commit_changes_creates_initial_commit() {
        let (tracker, dir) = setup_repo();
        fs::write(dir.path().join("a.txt"), "hello").unwrap();
        tracker.commit_changes("init").await.unwrap();
        assert_eq!(commit_count(dir.path()), 1);
    }

    #[tokio::test]
    async fn test_commit_changes_on_clean_tree_is_noop() {
        let (tracker, dir) = setup_repo();
        fs::write(dir.path().join("a.txt"), "hello").unwrap();
        tracker.commit_changes("init").await.unwrap();
        tracker.commit_changes("again").await.unwrap();
        assert_eq!(commit_count(dir.path()), 1);
    }

    #[tokio::test]
    async fn test_commit_changes_records_deletions() {
        let (tracker, dir) = setup_repo();
        fs::write(dir.path().join("gone.txt"), "bye").unwrap();
        tracker.commit_changes("add").await.unwrap();
        fs::remove_file(dir.path().join("gone.txt")).unwrap();
        tracker.commit_changes("remove").await.unwrap();

        let repo = Repository::open(dir.path()).unwrap();
        let tree = repo.head().unwrap().peel_to_tree().unwrap();
        assert!(tree.get_name("gone.txt").is_none());
    }

    #[tokio::test]
    async fn test_create_branch_checks_it_out() {
        let (tracker, dir) = setup_repo();
        fs::write(dir.path().join("a.txt"), "hello").unwrap();
        tracker.commit_changes("init").await.unwrap();

        tracker
            .create_branch("feature-issue-42-adw-abc12345-export")
            .await
            .unwrap();
        assert_eq!(
            head_branch(dir.path()),
            "feature-issue-42-adw-abc12345-export"
        );
    }

    #[tokio::test]
    async fn test_create_branch_twice_reuses_branch() {
        let (tracker, dir) = setup_repo();
        fs::write(dir.path().join("a.txt"), "hello").unwrap();
        tracker.commit_changes("init").await.unwrap();

        tracker.create_branch("chore-x").await.unwrap();
        fs::write(dir.path().join("b.txt"), "more").unwrap();
        tracker.commit_changes("work").await.unwrap();
        tracker.create_branch("chore-x").await.unwrap();

        assert_eq!(head_branch(dir.path()), "chore-x");
        assert_eq!(commit_count(dir.path()), 2);
    }

    #[tokio::test]
    async fn test_create_branch_without_commits_fails() {
        let (tracker, _dir) = setup_repo();
        assert!(tracker.create_branch("bug-x").await.is_err());
    }

    #[tokio::test]
    async fn test_outside_repository_fails() {
        let dir = tempdir().unwrap();
        let tracker = GitTracker::new(dir.path());
        assert!(tracker.commit_changes("x").await.is_err());
    }

    #[test]
    fn test_pr_text_includes_state() {
        let mut doc = StateDocument::new(RunId::parse("abc12345").unwrap(), "42");
        doc.apply(
            StatePatch::new()
                .issue_class(IssueClass::Bug)
                .branch_name("bug-issue-42-adw-abc12345-login")
                .plan_artifact_ref("specs/issue-42-plan.md"),
        );

        assert_eq!(pr_title(&doc), "bug: #42 (adw abc12345)");
        let body = pr_body(&doc);
        assert!(body.contains("Closes #42"));
        assert!(body.contains("`/bug`"));
        assert!(body.contains("specs/issue-42-plan.md"));
        assert!(body.contains("\"adw_id\": \"abc12345\""));
    }
}
