//! The persisted workflow document.
//!
//! Known fields are typed; anything a later phase (or another tool) adds lands
//! in `extra` and survives a load/save cycle untouched.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::RunId;
use crate::phase::outputs::IssueClass;

const RESERVED_FIELDS: &[&str] = &[
    "adw_id",
    "issue_ref",
    "issue_class",
    "branch_name",
    "plan_artifact_ref",
    "version",
    "saves",
];

/// One entry of the save audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveRecord {
    pub version: u64,
    pub phase: String,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDocument {
    pub adw_id: RunId,
    pub issue_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_class: Option<IssueClass>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_artifact_ref: Option<PathBuf>,
    /// Incremented on every save.
    #[serde(default)]
    pub version: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub saves: Vec<SaveRecord>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl StateDocument {
    pub fn new(adw_id: RunId, issue_ref: &str) -> Self {
        Self {
            adw_id,
            issue_ref: issue_ref.to_string(),
            issue_class: None,
            branch_name: None,
            plan_artifact_ref: None,
            version: 0,
            saves: Vec::new(),
            extra: BTreeMap::new(),
        }
    }

    /// True when no phase has recorded anything yet.
    pub fn is_blank(&self) -> bool {
        self.issue_class.is_none()
            && self.branch_name.is_none()
            && self.plan_artifact_ref.is_none()
            && self.extra.is_empty()
    }

    /// Merge a patch. Fields are only ever set or overwritten, never removed.
    pub fn apply(&mut self, patch: StatePatch) {
        if let Some(class) = patch.issue_class {
            self.issue_class = Some(class);
        }
        if let Some(branch) = patch.branch_name {
            self.branch_name = Some(branch);
        }
        if let Some(plan) = patch.plan_artifact_ref {
            self.plan_artifact_ref = Some(plan);
        }
        for (name, value) in patch.extra {
            if RESERVED_FIELDS.contains(&name.as_str()) {
                tracing::warn!(field = %name, "ignoring update to reserved state field");
                continue;
            }
            self.extra.insert(name, value);
        }
    }

    /// Look up any field by its serialized name.
    pub fn get(&self, field: &str) -> Option<Value> {
        match field {
            "adw_id" => Some(Value::String(self.adw_id.to_string())),
            "issue_ref" => Some(Value::String(self.issue_ref.clone())),
            "issue_class" => self
                .issue_class
                .map(|c| Value::String(c.as_command().to_string())),
            "branch_name" => self.branch_name.clone().map(Value::String),
            "plan_artifact_ref" => self
                .plan_artifact_ref
                .as_ref()
                .map(|p| Value::String(p.display().to_string())),
            "version" => Some(Value::from(self.version)),
            "saves" => serde_json::to_value(&self.saves).ok(),
            other => self.extra.get(other).cloned(),
        }
    }

    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
    }
}

/// A set of field updates produced by a phase.
#[derive(Debug, Clone, Default)]
pub struct StatePatch {
    issue_class: Option<IssueClass>,
    branch_name: Option<String>,
    plan_artifact_ref: Option<PathBuf>,
    extra: BTreeMap<String, Value>,
}

impl StatePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue_class(mut self, class: IssueClass) -> Self {
        self.issue_class = Some(class);
        self
    }

    pub fn branch_name(mut self, branch: impl Into<String>) -> Self {
        self.branch_name = Some(branch.into());
        self
    }

    pub fn plan_artifact_ref(mut self, path: impl Into<PathBuf>) -> Self {
        self.plan_artifact_ref = Some(path.into());
        self
    }

    /// Set an additional field. Names of typed fields are ignored on apply.
    pub fn field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(name.to_string(), value.into());
        self
    }
}
