use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// GitHub Actions workflow run, reduced to the fields the collector needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    /// Unique identifier for the workflow run
    pub id: u64,
    /// Head branch or tag name
    pub head_branch: Option<String>,
    /// Status of the run
    pub status: Option<String>,
    /// When the run was created
    pub created_at: DateTime<Utc>,
}

/// Job within a GitHub Actions workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique identifier for the job
    pub id: u64,
    /// Workflow run this job belongs to
    #[serde(default)]
    pub run_id: u64,
    /// Name of the job, usually carrying the matrix values in parentheses
    pub name: String,
    /// Steps in this job
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// Step within a GitHub Actions job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    pub status: String,
    pub conclusion: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Step {
    pub fn succeeded(&self) -> bool {
        self.status == "completed" && self.conclusion.as_deref() == Some("success")
    }
}

/// Published release of the tracked repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Release {
    pub tag_name: String,
    pub name: Option<String>,
    /// Normalized to UTC whatever offset the feed used
    pub published_at: DateTime<Utc>,
}

impl Release {
    /// Display name, falling back to the tag.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.tag_name)
    }
}

/// Page of workflow runs.
#[derive(Debug, Deserialize)]
pub(super) struct WorkflowRunsResponse {
    #[serde(default)]
    pub workflow_runs: Vec<serde_json::Value>,
}

/// Page of jobs for one run.
#[derive(Debug, Deserialize)]
pub(super) struct WorkflowJobsResponse {
    #[serde(default)]
    pub jobs: Vec<serde_json::Value>,
}

/// Links for GitHub resources.
pub mod links {
    /// Generate URL for a workflow run.
    pub fn workflow_run_url(repo: &str, run_id: &str) -> String {
        format!("https://github.com/{repo}/actions/runs/{run_id}")
    }

    /// Generate URL for a release.
    pub fn release_url(repo: &str, tag: &str) -> String {
        format!("https://github.com/{repo}/releases/tag/{tag}")
    }
}
