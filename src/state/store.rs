use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::Value;
use tempfile::NamedTempFile;

use super::document::{SaveRecord, StateDocument, StatePatch};
use super::RunId;
use crate::errors::StateError;

pub const STATE_FILE_NAME: &str = "adw_state.json";

/// Directory-backed store holding one state document per workflow run:
/// `<agents_dir>/<adw_id>/adw_state.json`.
#[derive(Debug, Clone)]
pub struct StateStore {
    agents_dir: PathBuf,
}

impl StateStore {
    pub fn new(agents_dir: impl Into<PathBuf>) -> Self {
        Self {
            agents_dir: agents_dir.into(),
        }
    }

    pub fn agents_dir(&self) -> &Path {
        &self.agents_dir
    }

    pub fn run_dir(&self, run_id: &RunId) -> PathBuf {
        self.agents_dir.join(run_id.as_str())
    }

    pub fn state_path(&self, run_id: &RunId) -> PathBuf {
        self.run_dir(run_id).join(STATE_FILE_NAME)
    }

    pub fn exists(&self, run_id: &RunId) -> bool {
        self.state_path(run_id).is_file()
    }

    /// Return the identifier a run for `issue_ref` should use.
    ///
    /// A supplied identifier with an existing document is returned unchanged
    /// (after checking it belongs to the same issue). A supplied identifier
    /// without a document, or no identifier at all, gets a freshly
    /// initialized document.
    pub fn resolve_or_create(
        &self,
        issue_ref: &str,
        run_id: Option<&RunId>,
    ) -> Result<RunId, StateError> {
        let run_id = match run_id {
            Some(id) if self.exists(id) => {
                self.load_for_issue(id, issue_ref)?;
                tracing::debug!(adw_id = %id, "using existing workflow state");
                return Ok(id.clone());
            }
            Some(id) => id.clone(),
            None => self.fresh_id(),
        };

        let mut state = WorkflowState {
            path: self.state_path(&run_id),
            doc: StateDocument::new(run_id.clone(), issue_ref),
        };
        state.save("resolve_or_create")?;
        tracing::info!(adw_id = %run_id, issue = issue_ref, "initialized workflow state");
        Ok(run_id)
    }

    pub fn load(&self, run_id: &RunId) -> Result<WorkflowState, StateError> {
        let path = self.state_path(run_id);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StateError::StateNotFound {
                    run_id: run_id.to_string(),
                });
            }
            Err(source) => return Err(StateError::Io { path, source }),
        };

        let doc: StateDocument = serde_json::from_str(&content)
            .map_err(|source| StateError::Corrupt {
                path: path.clone(),
                source,
            })?;

        if &doc.adw_id != run_id {
            return Err(StateError::MismatchedIdentity {
                path,
                expected: run_id.to_string(),
                found: doc.adw_id.to_string(),
            });
        }

        Ok(WorkflowState { path, doc })
    }

    /// Load a document and check it was created for `issue_ref`.
    pub fn load_for_issue(
        &self,
        run_id: &RunId,
        issue_ref: &str,
    ) -> Result<WorkflowState, StateError> {
        let state = self.load(run_id)?;
        if state.doc.issue_ref != issue_ref {
            return Err(StateError::IdentifierConflict {
                run_id: run_id.to_string(),
                existing: state.doc.issue_ref.clone(),
                requested: issue_ref.to_string(),
            });
        }
        Ok(state)
    }

    fn fresh_id(&self) -> RunId {
        loop {
            let id = RunId::generate();
            if !self.run_dir(&id).exists() {
                return id;
            }
        }
    }
}

/// A loaded workflow document bound to its file.
#[derive(Debug, Clone)]
pub struct WorkflowState {
    path: PathBuf,
    doc: StateDocument,
}

impl WorkflowState {
    pub fn run_id(&self) -> &RunId {
        &self.doc.adw_id
    }

    pub fn issue_ref(&self) -> &str {
        &self.doc.issue_ref
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn document(&self) -> &StateDocument {
        &self.doc
    }

    /// Merge fields in memory. Nothing is written until `save`.
    pub fn update(&mut self, patch: StatePatch) {
        self.doc.apply(patch);
    }

    pub fn get(&self, field: &str) -> Option<Value> {
        self.doc.get(field)
    }

    /// Persist the whole document, replacing the previous version atomically.
    pub fn save(&mut self, phase: &str) -> Result<(), StateError> {
        let (next, staged) = self.stage(phase)?;
        staged.commit()?;
        self.doc = next;
        tracing::debug!(
            adw_id = %self.doc.adw_id,
            phase,
            version = self.doc.version,
            "saved workflow state"
        );
        Ok(())
    }

    /// Write the next version to a temporary sibling file without making it
    /// visible yet.
    fn stage(&self, phase: &str) -> Result<(StateDocument, StagedWrite), StateError> {
        let mut next = self.doc.clone();
        next.version += 1;
        next.saves.push(SaveRecord {
            version: next.version,
            phase: phase.to_string(),
            saved_at: Utc::now(),
        });

        let content = serde_json::to_string_pretty(&next).map_err(|source| {
            StateError::Corrupt {
                path: self.path.clone(),
                source,
            }
        })?;
        let staged = StagedWrite::prepare(&self.path, &content)?;
        Ok((next, staged))
    }
}

/// Fully written and fsynced temp file waiting to be renamed over its target.
/// Dropping it without `commit` removes the temp file and leaves the target
/// untouched.
struct StagedWrite {
    temp: NamedTempFile,
    target: PathBuf,
}

impl StagedWrite {
    fn prepare(target: &Path, content: &str) -> Result<Self, StateError> {
        let io_err = |source| StateError::Io {
            path: target.to_path_buf(),
            source,
        };

        let dir = target.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(io_err)?;

        let mut temp = tempfile::Builder::new()
            .prefix(".adw_state")
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(io_err)?;
        temp.write_all(content.as_bytes()).map_err(io_err)?;
        temp.as_file().sync_all().map_err(io_err)?;

        Ok(Self {
            temp,
            target: target.to_path_buf(),
        })
    }

    fn commit(self) -> Result<(), StateError> {
        let target = self.target;
        self.temp
            .persist(&target)
            .map_err(|e| StateError::Io {
                path: target.clone(),
                source: e.error,
            })?;
        Ok(())
    }
}
